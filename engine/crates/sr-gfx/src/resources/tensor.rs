use ash::prelude::VkResult;
use ash::vk;

use crate::extensions::arm_tensors::{
    STRUCTURE_TYPE_TENSOR_CREATE_INFO_ARM, STRUCTURE_TYPE_TENSOR_VIEW_CREATE_INFO_ARM, TensorARM,
    TensorCreateInfoARM, TensorDescriptionARM, TensorTilingARM, TensorUsageFlagsARM, TensorViewARM,
    TensorViewCreateInfoARM,
};
use crate::gfx::Gfx;

/// 持有维度与 stride 数据的 tensor 描述
///
/// `TensorDescriptionARM` 只保存指针，需要由这里保证数据在调用期间存活
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GfxTensorDescription {
    pub tiling: TensorTilingARM,
    pub format: vk::Format,
    pub dimensions: Vec<i64>,
    /// 为空表示 packed 布局
    pub strides: Vec<i64>,
    pub usage: TensorUsageFlagsARM,
}
impl GfxTensorDescription {
    /// 返回的结构体引用了 self 中的数据，不能比 self 活得更久
    #[inline]
    pub fn raw(&self) -> TensorDescriptionARM {
        TensorDescriptionARM::new(self.tiling, self.format, &self.dimensions, &self.strides, self.usage)
    }
}

/// tensor 对象本身，不持有内存
///
/// 内存由外部分配后通过 [`GfxTensor::bind_memory`] 绑定，view 需要在绑定之后创建
pub struct GfxTensor {
    handle: TensorARM,
    view: Option<TensorViewARM>,
    format: vk::Format,
}
// 创建与销毁
impl GfxTensor {
    pub fn new(desc: &GfxTensorDescription, debug_name: &str) -> VkResult<Self> {
        let raw_desc = desc.raw();
        let create_info = TensorCreateInfoARM {
            s_type: STRUCTURE_TYPE_TENSOR_CREATE_INFO_ARM,
            p_next: std::ptr::null(),
            flags: 0,
            p_description: &raw_desc,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: std::ptr::null(),
        };

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.tensors().create_tensor(&create_info)? };
        gfx_device.set_object_debug_name(handle, format!("GfxTensor::{}", debug_name));
        Ok(Self {
            handle,
            view: None,
            format: desc.format,
        })
    }
}
// getters
impl GfxTensor {
    #[inline]
    pub fn handle(&self) -> TensorARM {
        self.handle
    }

    /// 还没有创建 view 时返回 null handle
    #[inline]
    pub fn view(&self) -> TensorViewARM {
        self.view.unwrap_or_default()
    }
}
// tools
impl GfxTensor {
    #[inline]
    pub fn memory_requirements(&self) -> vk::MemoryRequirements {
        unsafe { Gfx::get().gfx_device().tensors().get_tensor_memory_requirements(self.handle) }
    }

    pub fn bind_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { Gfx::get().gfx_device().tensors().bind_tensor_memory(self.handle, memory, offset) }
    }

    /// 创建默认的 tensor view，重复调用会复用已有的 view
    pub fn create_view(&mut self, debug_name: &str) -> VkResult<TensorViewARM> {
        if let Some(view) = self.view {
            return Ok(view);
        }
        let create_info = TensorViewCreateInfoARM {
            s_type: STRUCTURE_TYPE_TENSOR_VIEW_CREATE_INFO_ARM,
            p_next: std::ptr::null(),
            flags: 0,
            tensor: self.handle,
            format: self.format,
        };
        let gfx_device = Gfx::get().gfx_device();
        let view = unsafe { gfx_device.tensors().create_tensor_view(&create_info)? };
        gfx_device.set_object_debug_name(view, format!("GfxTensorView::{}", debug_name));
        self.view = Some(view);
        Ok(view)
    }
}
impl Drop for GfxTensor {
    fn drop(&mut self) {
        let tensors = Gfx::get().gfx_device().tensors();
        unsafe {
            if let Some(view) = self.view.take() {
                tensors.destroy_tensor_view(view);
            }
            tensors.destroy_tensor(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_description_borrows_dimensions() {
        let desc = GfxTensorDescription {
            tiling: TensorTilingARM::OPTIMAL,
            format: vk::Format::R8_SINT,
            dimensions: vec![1, 8, 8, 4],
            strides: vec![256, 32, 4, 1],
            usage: TensorUsageFlagsARM::SHADER,
        };
        let raw = desc.raw();
        assert_eq!(raw.dimension_count, 4);
        assert_eq!(raw.p_dimensions, desc.dimensions.as_ptr());
        assert_eq!(raw.p_strides, desc.strides.as_ptr());
        assert_eq!(raw.tiling, TensorTilingARM::OPTIMAL);
    }
}
