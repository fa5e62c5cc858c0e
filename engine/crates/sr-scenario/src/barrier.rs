//! 在 setup 阶段解析好的 barrier
//!
//! 描述文件中的 barrier 只引用资源的名字，这里把它们换成真正的 Vulkan 句柄，
//! 录制命令时直接转换为 sr-gfx 的 barrier builder。

use ash::vk;
use sr_gfx::commands::barrier::{GfxBarrierMask, GfxBufferBarrier, GfxImageBarrier, GfxTensorBarrier};
use sr_gfx::extensions::arm_tensors::TensorARM;

use crate::desc::{BarrierScopeDesc, BufferBarrierDesc, ImageBarrierDesc, MemoryBarrierDesc, TensorBarrierDesc};
use crate::types::PipelineStage;

fn barrier_mask(scope: &BarrierScopeDesc) -> GfxBarrierMask {
    GfxBarrierMask {
        src_stage: PipelineStage::combine(&scope.src_stage),
        dst_stage: PipelineStage::combine(&scope.dst_stage),
        src_access: scope.src_access.to_vk(),
        dst_access: scope.dst_access.to_vk(),
    }
}

#[derive(Clone, Debug)]
pub struct MemoryBarrierData {
    pub debug_name: String,
    pub mask: GfxBarrierMask,
}
impl MemoryBarrierData {
    pub fn from_desc(desc: &MemoryBarrierDesc) -> Self {
        Self {
            debug_name: desc.uid.name().to_string(),
            mask: barrier_mask(&desc.scope),
        }
    }

    #[inline]
    pub fn vk_barrier(&self) -> vk::MemoryBarrier2<'static> {
        self.mask.memory_barrier()
    }
}

#[derive(Clone, Debug)]
pub struct ImageBarrierData {
    pub debug_name: String,
    pub mask: GfxBarrierMask,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub image: vk::Image,
    pub range: vk::ImageSubresourceRange,
}
impl ImageBarrierData {
    pub fn from_desc(desc: &ImageBarrierDesc, image: vk::Image) -> Self {
        Self {
            debug_name: desc.uid.name().to_string(),
            mask: barrier_mask(&desc.scope),
            old_layout: desc.old_layout.to_vk(),
            new_layout: desc.new_layout.to_vk(),
            image,
            range: desc.subresource_range.to_vk(vk::ImageAspectFlags::COLOR),
        }
    }

    pub fn gfx_barrier(&self) -> GfxImageBarrier {
        GfxImageBarrier::new()
            .mask(self.mask)
            .layout_transfer(self.old_layout, self.new_layout)
            .subresource_range(self.range)
            .image(self.image)
    }
}

#[derive(Clone, Debug)]
pub struct TensorBarrierData {
    pub debug_name: String,
    pub mask: GfxBarrierMask,
    pub tensor: TensorARM,
}
impl TensorBarrierData {
    pub fn from_desc(desc: &TensorBarrierDesc, tensor: TensorARM) -> Self {
        Self {
            debug_name: desc.uid.name().to_string(),
            mask: barrier_mask(&desc.scope),
            tensor,
        }
    }

    #[inline]
    pub fn gfx_barrier(&self) -> GfxTensorBarrier {
        GfxTensorBarrier::new().mask(self.mask).tensor(self.tensor)
    }
}

#[derive(Clone, Debug)]
pub struct BufferBarrierData {
    pub debug_name: String,
    pub mask: GfxBarrierMask,
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}
impl BufferBarrierData {
    pub fn from_desc(desc: &BufferBarrierDesc, buffer: vk::Buffer) -> Self {
        Self {
            debug_name: desc.uid.name().to_string(),
            mask: barrier_mask(&desc.scope),
            buffer,
            offset: desc.offset,
            size: desc.size,
        }
    }

    #[inline]
    pub fn gfx_barrier(&self) -> GfxBufferBarrier {
        GfxBufferBarrier::new().mask(self.mask).buffer(self.buffer, self.offset, self.size)
    }
}

#[cfg(test)]
mod tests {
    use sr_gfx::extensions::arm_data_graph::{ACCESS_2_DATA_GRAPH_READ_ARM, PIPELINE_STAGE_2_DATA_GRAPH_ARM};
    use sr_gfx::extensions::arm_tensors::IMAGE_LAYOUT_TENSOR_ALIASING_ARM;

    use super::*;
    use crate::desc::ResourceDesc;

    #[test]
    fn test_image_barrier_conversion() {
        let json = r#"{"image_barrier": {
            "uid": "to_graph", "src_access": "compute_shader_write", "dst_access": "graph_read",
            "src_stage": ["compute"], "dst_stage": ["graph"],
            "old_layout": "general", "new_layout": "tensor_aliasing", "image_resource": "img",
            "subresource_range": {"base_mip_level": 1, "level_count": 2, "base_array_layer": 0, "layer_count": 1}
        }}"#;
        let ResourceDesc::ImageBarrier(desc) = serde_json::from_str::<ResourceDesc>(json).unwrap() else {
            panic!("expected image barrier");
        };
        let data = ImageBarrierData::from_desc(&desc, vk::Image::null());
        let barrier = data.gfx_barrier();
        let inner = barrier.inner();
        assert_eq!(inner.src_stage_mask, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(inner.dst_stage_mask, PIPELINE_STAGE_2_DATA_GRAPH_ARM);
        assert_eq!(inner.src_access_mask, vk::AccessFlags2::SHADER_WRITE);
        assert_eq!(inner.dst_access_mask, ACCESS_2_DATA_GRAPH_READ_ARM);
        assert_eq!(inner.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(inner.new_layout, IMAGE_LAYOUT_TENSOR_ALIASING_ARM);
        assert_eq!(inner.subresource_range.base_mip_level, 1);
        assert_eq!(inner.subresource_range.level_count, 2);
        assert_eq!(inner.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(data.debug_name, "to_graph");
    }

    #[test]
    fn test_buffer_barrier_range() {
        let json = r#"{"buffer_barrier": {
            "uid": "bb", "src_access": "memory_write", "dst_access": "memory_read",
            "buffer_resource": "buf", "offset": 16, "size": 32
        }}"#;
        let ResourceDesc::BufferBarrier(desc) = serde_json::from_str::<ResourceDesc>(json).unwrap() else {
            panic!("expected buffer barrier");
        };
        let data = BufferBarrierData::from_desc(&desc, vk::Buffer::null());
        let barrier = data.gfx_barrier();
        assert_eq!(barrier.inner().offset, 16);
        assert_eq!(barrier.inner().size, 32);
        assert_eq!(barrier.inner().src_stage_mask, vk::PipelineStageFlags2::ALL_COMMANDS);
    }
}
