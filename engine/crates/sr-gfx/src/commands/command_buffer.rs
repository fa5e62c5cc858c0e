use std::ptr;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::extensions::arm_data_graph::DataGraphPipelineSessionARM;
use crate::extensions::arm_tensors::{STRUCTURE_TYPE_TENSOR_DEPENDENCY_INFO_ARM, TensorDependencyInfoARM};
use crate::gfx::Gfx;
use crate::{
    basic::color::LabelColor,
    commands::{
        barrier::{GfxBufferBarrier, GfxImageBarrier, GfxTensorBarrier},
        command_pool::GfxCommandPool,
    },
    foundation::debug_messenger::DebugType,
    query::query_pool::GfxQueryPool,
};

/// 命令缓冲封装
///
/// 封装 Vulkan CommandBuffer，提供面向 compute queue 的命令录制接口。
/// 支持计算、data graph、屏障、timestamp、调试标签等功能。
///
/// # 使用示例
/// ```ignore
/// let cmd = GfxCommandBuffer::new(&pool, "my-pass")?;
/// cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "my-pass")?;
/// cmd.cmd_bind_pipeline(vk::PipelineBindPoint::COMPUTE, pipeline);
/// cmd.cmd_dispatch(glam::uvec3(8, 1, 1));
/// cmd.end()?;
/// ```
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    _command_pool_handle: vk::CommandPool,

    #[cfg(debug_assertions)]
    _name: String,
}
// new & init
impl GfxCommandBuffer {
    pub fn new(command_pool: &GfxCommandPool, debug_name: &str) -> VkResult<Self> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.handle())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { Gfx::get().gfx_device().allocate_command_buffers(&info)?[0] };
        let cmd_buffer = GfxCommandBuffer {
            vk_handle: command_buffer,
            _command_pool_handle: command_pool.handle(),

            #[cfg(debug_assertions)]
            _name: debug_name.to_string(),
        };
        Gfx::get().gfx_device().set_debug_name(&cmd_buffer, debug_name);
        Ok(cmd_buffer)
    }
}
// Basic 命令
impl GfxCommandBuffer {
    /// 开始录制 command
    ///
    /// 自动设置 debug label
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags, debug_label_name: &str) -> VkResult<()> {
        unsafe {
            Gfx::get()
                .gfx_device()
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))?;
        }
        self.begin_label(debug_label_name, LabelColor::COLOR_CMD);
        Ok(())
    }

    /// 结束录制 command
    ///
    /// 结束 debug label
    #[inline]
    pub fn end(&self) -> VkResult<()> {
        self.end_label();
        unsafe { Gfx::get().gfx_device().end_command_buffer(self.vk_handle) }
    }
}
// getters
impl GfxCommandBuffer {
    /// getter
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }
}
// 数据传输类型
impl GfxCommandBuffer {
    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe { Gfx::get().gfx_device().cmd_copy_buffer_to_image(self.vk_handle, src, dst, dst_layout, regions) }
    }

    /// - command type: action
    /// - 支持的 queue：transfer，graphics，compute
    #[inline]
    pub fn cmd_copy_image_to_buffer(
        &self,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe { Gfx::get().gfx_device().cmd_copy_image_to_buffer(self.vk_handle, src, src_layout, dst, regions) }
    }

    /// - command type: action
    /// - 支持的 queue：graphics
    #[inline]
    pub fn cmd_blit_image(&self, blit_info: &vk::BlitImageInfo2) {
        unsafe { Gfx::get().gfx_device().cmd_blit_image2(self.vk_handle, blit_info) }
    }

    /// - command type: state
    /// - 支持的 queue: graphics, compute
    #[inline]
    pub fn cmd_push_constants(
        &self,
        pipeline_layout: vk::PipelineLayout,
        stage: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            Gfx::get().gfx_device().cmd_push_constants(self.vk_handle, pipeline_layout, stage, offset, data);
        }
    }
}
// 管线绑定
impl GfxCommandBuffer {
    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn bind_descriptor_sets(
        &self,
        bind_point: vk::PipelineBindPoint,
        pipeline_layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: Option<&[u32]>,
    ) {
        unsafe {
            Gfx::get().gfx_device().cmd_bind_descriptor_sets(
                self.vk_handle,
                bind_point,
                pipeline_layout,
                first_set,
                descriptor_sets,
                dynamic_offsets.unwrap_or(&[]),
            );
        }
    }

    /// - command type: state
    /// - supported queue types: graphics, compute
    #[inline]
    pub fn cmd_bind_pipeline(&self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe {
            Gfx::get().gfx_device().cmd_bind_pipeline(self.vk_handle, bind_point, pipeline);
        }
    }
}
// 计算相关命令
impl GfxCommandBuffer {
    /// - command type: action
    /// - supported queue types: compute
    #[inline]
    pub fn cmd_dispatch(&self, group_cnt: glam::UVec3) {
        unsafe {
            Gfx::get().gfx_device().cmd_dispatch(self.vk_handle, group_cnt.x, group_cnt.y, group_cnt.z);
        }
    }

    /// 执行 data graph pipeline，需要先绑定 pipeline 以及 descriptor sets
    ///
    /// - command type: action
    /// - supported queue types: data graph
    #[inline]
    pub fn cmd_dispatch_data_graph(&self, session: DataGraphPipelineSessionARM) {
        unsafe {
            Gfx::get().gfx_device().data_graph().cmd_dispatch_data_graph(self.vk_handle, session);
        }
    }
}
// 同步相关命令
impl GfxCommandBuffer {
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn memory_barrier(&self, barriers: &[vk::MemoryBarrier2]) {
        let dependency_info = vk::DependencyInfo::default().memory_barriers(barriers);
        unsafe {
            Gfx::get().gfx_device().cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }

    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn image_memory_barrier(&self, dependency_flags: vk::DependencyFlags, barriers: &[GfxImageBarrier]) {
        let barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info =
            vk::DependencyInfo::default().image_memory_barriers(&barriers).dependency_flags(dependency_flags);
        unsafe {
            Gfx::get().gfx_device().cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }

    /// 一次性提交所有类型的 barrier
    ///
    /// tensor barrier 存在时，通过 `TensorDependencyInfoARM` 挂在 pNext 上
    ///
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    pub fn pipeline_barrier(
        &self,
        memory_barriers: &[vk::MemoryBarrier2],
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
        tensor_barriers: &[GfxTensorBarrier],
    ) {
        let image_barriers = image_barriers.iter().map(|b| *b.inner()).collect_vec();
        let buffer_barriers = buffer_barriers.iter().map(|b| *b.inner()).collect_vec();
        let tensor_barriers = tensor_barriers.iter().map(|b| *b.inner()).collect_vec();

        let tensor_dependency_info = TensorDependencyInfoARM {
            s_type: STRUCTURE_TYPE_TENSOR_DEPENDENCY_INFO_ARM,
            p_next: ptr::null(),
            tensor_memory_barrier_count: tensor_barriers.len() as u32,
            p_tensor_memory_barriers: tensor_barriers.as_ptr(),
        };

        let mut dependency_info = vk::DependencyInfo::default()
            .memory_barriers(memory_barriers)
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        if !tensor_barriers.is_empty() {
            dependency_info.p_next = ptr::from_ref(&tensor_dependency_info).cast();
        }

        unsafe {
            Gfx::get().gfx_device().cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}
// query 相关命令
impl GfxCommandBuffer {
    /// - command type: action
    /// - supported queue types: graphics, compute, transfer
    #[inline]
    pub fn write_timestamp(&self, stage: vk::PipelineStageFlags2, query_pool: &GfxQueryPool, query_index: u32) {
        unsafe {
            Gfx::get().gfx_device().cmd_write_timestamp2(self.vk_handle, stage, query_pool.handle(), query_index);
        }
    }
}
// debug 相关命令
impl GfxCommandBuffer {
    /// 没有开启 debug utils 时什么都不做
    ///
    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Some(debug_utils) = Gfx::get().gfx_device().debug_utils() else {
            return;
        };
        let name = std::ffi::CString::new(label_name).unwrap_or_default();
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn end_label(&self) {
        if let Some(debug_utils) = Gfx::get().gfx_device().debug_utils() {
            unsafe { debug_utils.cmd_end_debug_utils_label(self.vk_handle) };
        }
    }

    /// - command type: action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn insert_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Some(debug_utils) = Gfx::get().gfx_device().debug_utils() else {
            return;
        };
        let name = std::ffi::CString::new(label_name).unwrap_or_default();
        unsafe {
            debug_utils.cmd_insert_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }
}
impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
