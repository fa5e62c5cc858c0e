use std::ops::Deref;

use ash::prelude::VkResult;
use ash::vk;

/// vk-mem 分配器的封装，所有 buffer / image / tensor 的内存都经由这里分配
pub struct GfxMemAllocator {
    inner: vk_mem::Allocator,
}

impl GfxMemAllocator {
    /// 由于 vma 的生命周期设定：需要引用 Instance 以及
    /// Device，并确保在其声明周期之内这两个的引用是有效的.
    /// 因此需要在 Gfx 的其他部分都初始化完成后再初始化 vma，并且要先于 Device 销毁
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> VkResult<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci)? };

        Ok(Self { inner: vma })
    }

    pub fn destroy(self) {
        // 通过 drop 触发销毁
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
