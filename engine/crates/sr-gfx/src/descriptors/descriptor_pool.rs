use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 描述符池创建信息
///
/// 用于配置描述符池的创建参数，包括：
/// - 标志位
/// - 最大描述符集数量
/// - 每种类型描述符的最大数量
pub struct GfxDescriptorPoolCreateInfo {
    flags: vk::DescriptorPoolCreateFlags,
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl GfxDescriptorPoolCreateInfo {
    #[inline]
    pub fn new(flags: vk::DescriptorPoolCreateFlags, max_sets: u32, pool_sizes: Vec<vk::DescriptorPoolSize>) -> Self {
        Self {
            flags,
            max_sets,
            pool_sizes,
        }
    }

    #[inline]
    pub fn pool_sizes(&self) -> &[vk::DescriptorPoolSize] {
        &self.pool_sizes
    }

    #[inline]
    fn create_info(&self) -> vk::DescriptorPoolCreateInfo<'_> {
        vk::DescriptorPoolCreateInfo::default()
            .flags(self.flags)
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
    }
}

/// 描述符池
///
/// 描述符池用于分配描述符集，随 pool 一起销毁的还有从中分配的所有 set
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    name: String,
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::debug!("destroying descriptor pool: {}", self.name);
        unsafe { Gfx::get().gfx_device().destroy_descriptor_pool(self.handle, None) };
    }
}
impl GfxDescriptorPool {
    #[inline]
    pub fn new(ci: &GfxDescriptorPoolCreateInfo, name: &str) -> VkResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_descriptor_pool(&ci.create_info(), None)? };
        let pool = Self {
            handle,
            name: name.to_string(),
        };
        gfx_device.set_debug_name(&pool, name);
        Ok(pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// 从 pool 中分配一个 descriptor set
    ///
    /// # Destroy
    /// 跟随 descriptor pool 一起销毁
    pub fn allocate_set(&self, layout: vk::DescriptorSetLayout, debug_name: &str) -> VkResult<vk::DescriptorSet> {
        let gfx_device = Gfx::get().gfx_device();
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(std::slice::from_ref(&layout));
        let sets = unsafe { gfx_device.allocate_descriptor_sets(&alloc_info)? };
        let set = sets.first().copied().ok_or(vk::Result::ERROR_OUT_OF_POOL_MEMORY)?;
        gfx_device.set_object_debug_name(set, debug_name);
        Ok(set)
    }
}
