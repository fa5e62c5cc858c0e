use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符集布局
///
/// 绑定信息在运行时由场景描述给出，因此这里不使用编译期的布局类型
pub struct GfxDescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
}
impl GfxDescriptorSetLayout {
    /// 每个 binding 的 descriptor count 都为 1
    pub fn new(
        bindings: &[vk::DescriptorSetLayoutBinding<'static>],
        debug_name: impl AsRef<str>,
    ) -> VkResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let gfx_device = Gfx::get().gfx_device();
        let layout = unsafe { gfx_device.create_descriptor_set_layout(&create_info, None)? };
        let layout = Self { layout };
        gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn destroy(self) {
        // drop
    }
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_descriptor_set_layout(self.layout, None);
        }
    }
}
impl DebugType for GfxDescriptorSetLayout {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorSetLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.layout
    }
}
