use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// pipeline layout，push constant 只对 compute stage 可见
pub struct GfxPipelineLayout {
    handle: vk::PipelineLayout,
}
impl GfxPipelineLayout {
    /// `push_constant_size` 为 0 时不声明 push constant range
    pub fn new(
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_size: u32,
        debug_name: impl AsRef<str>,
    ) -> VkResult<Self> {
        let push_constant_ranges = Self::push_constant_ranges(push_constant_size);
        let create_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts).push_constant_ranges(&push_constant_ranges);

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_pipeline_layout(&create_info, None)? };
        let layout = Self { handle };
        gfx_device.set_debug_name(&layout, debug_name);
        Ok(layout)
    }

    fn push_constant_ranges(push_constant_size: u32) -> Vec<vk::PushConstantRange> {
        if push_constant_size == 0 {
            return vec![];
        }
        vec![vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::COMPUTE,
            offset: 0,
            size: push_constant_size,
        }]
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}
impl Drop for GfxPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_pipeline_layout(self.handle, None);
        }
    }
}
impl DebugType for GfxPipelineLayout {
    fn debug_type_name() -> &'static str {
        "GfxPipelineLayout"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_range() {
        assert!(GfxPipelineLayout::push_constant_ranges(0).is_empty());

        let ranges = GfxPipelineLayout::push_constant_ranges(64);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].size, 64);
        assert_eq!(ranges[0].stage_flags, vk::ShaderStageFlags::COMPUTE);
    }
}
