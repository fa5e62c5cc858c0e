use std::ptr;
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::extensions::arm_tensors::{FrameBoundaryTensorsARM, STRUCTURE_TYPE_FRAME_BOUNDARY_TENSORS_ARM, TensorARM};
use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 一次 frame boundary 提交所携带的资源
///
/// 供 frame capture 工具识别一帧的边界
#[derive(Clone, Debug, Default)]
pub struct GfxFrameBoundary {
    pub frame_id: u64,
    pub images: Vec<vk::Image>,
    pub buffers: Vec<vk::Buffer>,
    pub tensors: Vec<TensorARM>,
}

/// # destroy
///
/// GfxCommandQueue 在 GfxDevice 销毁时会被销毁
pub struct GfxCommandQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) gfx_device: Rc<GfxDevice>,
}
impl DebugType for GfxCommandQueue {
    fn debug_type_name() -> &'static str {
        "GfxCommandQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}

// getter
impl GfxCommandQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxCommandQueue {
    pub fn submit(&self, batches: Vec<GfxSubmitInfo>, fence: Option<&GfxFence>) -> VkResult<()> {
        unsafe {
            // batches 的存在是有必要的，submit_infos 引用的 batches 的内存
            let batches = batches.iter().map(|b| b.submit_info()).collect_vec();
            self.gfx_device.queue_submit2(self.vk_queue, &batches, fence.map_or(vk::Fence::null(), |f| f.handle()))
        }
    }

    /// 提交时附带 `VkFrameBoundaryEXT`（FRAME_END）
    ///
    /// 存在 tensor 时，再通过 `FrameBoundaryTensorsARM` 挂在 frame boundary 的 pNext 上
    pub fn submit_with_frame_boundary(
        &self,
        batch: GfxSubmitInfo,
        boundary: &GfxFrameBoundary,
        fence: Option<&GfxFence>,
    ) -> VkResult<()> {
        let tensors_info = FrameBoundaryTensorsARM {
            s_type: STRUCTURE_TYPE_FRAME_BOUNDARY_TENSORS_ARM,
            p_next: ptr::null(),
            tensor_count: boundary.tensors.len() as u32,
            p_tensors: boundary.tensors.as_ptr(),
        };

        let mut frame_boundary = vk::FrameBoundaryEXT::default()
            .flags(vk::FrameBoundaryFlagsEXT::FRAME_END)
            .frame_id(boundary.frame_id)
            .images(&boundary.images)
            .buffers(&boundary.buffers);
        if !boundary.tensors.is_empty() {
            frame_boundary.p_next = ptr::from_ref(&tensors_info).cast();
        }

        let mut submit_info = batch.submit_info();
        submit_info.p_next = ptr::from_ref(&frame_boundary).cast();
        unsafe {
            self.gfx_device.queue_submit2(
                self.vk_queue,
                std::slice::from_ref(&submit_info),
                fence.map_or(vk::Fence::null(), |f| f.handle()),
            )
        }
    }

    /// 根据 specification，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.gfx_device.queue_wait_idle(self.vk_queue) }
    }
}

// debug 相关命令
impl GfxCommandQueue {
    #[inline]
    pub fn begin_label<S>(&self, label_name: S, label_color: glam::Vec4)
    where
        S: AsRef<str>,
    {
        let Some(debug_utils) = self.gfx_device.debug_utils() else {
            return;
        };
        let name = std::ffi::CString::new(label_name.as_ref()).unwrap_or_default();
        unsafe {
            debug_utils.queue_begin_debug_utils_label(
                self.vk_queue,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    #[inline]
    pub fn end_label(&self) {
        if let Some(debug_utils) = self.gfx_device.debug_utils() {
            unsafe { debug_utils.queue_end_debug_utils_label(self.vk_queue) };
        }
    }
}
