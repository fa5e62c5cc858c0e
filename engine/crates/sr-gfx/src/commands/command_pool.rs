use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::foundation::device::GfxDevice;
use crate::{commands::command_queue::GfxQueueFamily, foundation::debug_messenger::DebugType, gfx::Gfx};

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    _queue_family: GfxQueueFamily,

    _debug_name: String,
    valid: bool,
}
// init & destory
impl GfxCommandPool {
    #[inline]
    pub fn new(queue_family: GfxQueueFamily, flags: vk::CommandPoolCreateFlags, debug_name: &str) -> VkResult<Self> {
        Self::create(Gfx::get().gfx_device(), queue_family, flags, debug_name)
    }

    /// 内部构造函数，用于 Gfx 初始化时使用
    /// 因为在 Gfx 初始化过程中，单例还没有准备好
    #[inline]
    pub(crate) fn new_internal(
        gfx_device: Rc<GfxDevice>,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> VkResult<Self> {
        Self::create(&gfx_device, queue_family, flags, debug_name)
    }

    fn create(
        gfx_device: &GfxDevice,
        queue_family: GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> VkResult<Self> {
        let pool = unsafe {
            gfx_device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family.queue_family_index).flags(flags),
                None,
            )?
        };

        let command_pool = Self {
            handle: pool,
            _queue_family: queue_family,
            _debug_name: debug_name.to_string(),
            valid: true,
        };
        gfx_device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    pub fn destroy(&mut self) {
        if !self.valid {
            return;
        }
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }

    pub fn destroy_internal(mut self, gfx_device: &GfxDevice) {
        unsafe {
            gfx_device.destroy_command_pool(self.handle, None);
        }
        self.valid = false;
    }
}

// getters
impl GfxCommandPool {
    /// getter
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }
}
// tools
impl GfxCommandPool {
    /// 这个调用并不会释放资源，而是将 pool 内的 command buffer 设置到初始状态
    ///
    /// reset 之后，pool 内的 command buffer 又可以重新录制命令
    pub fn reset_all_buffers(&self) -> VkResult<()> {
        let gfx_device = Gfx::get().gfx_device();
        unsafe { gfx_device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES) }
    }

    /// 释放 command buffer
    ///
    /// 释放之后，command buffer 不能再被使用
    pub fn free_command_buffers(&self, command_buffers: Vec<GfxCommandBuffer>) {
        if command_buffers.is_empty() {
            return;
        }
        let command_buffer_handles: Vec<vk::CommandBuffer> =
            command_buffers.iter().map(|cmd| cmd.vk_handle()).collect();
        unsafe {
            Gfx::get().gfx_device().free_command_buffers(self.handle, &command_buffer_handles);
        }
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(!self.valid, "CommandPool must be destroyed manually.");
        log::debug!("Dropping CommandPool: {}", self._debug_name);
    }
}
