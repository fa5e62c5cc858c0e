use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

pub struct GfxQueryPool {
    handle: vk::QueryPool,
    query_type: vk::QueryType,

    /// pool 的容量
    cnt: u32,
}
impl DebugType for GfxQueryPool {
    fn debug_type_name() -> &'static str {
        "GfxQueryPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxQueryPool {
    fn drop(&mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_query_pool(self.handle, None);
        }
    }
}
impl GfxQueryPool {
    #[inline]
    pub fn new(ty: vk::QueryType, cnt: u32, debug_name: &str) -> VkResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let create_info = vk::QueryPoolCreateInfo {
            query_type: ty,
            query_count: cnt,
            ..Default::default()
        };

        let handle = unsafe { gfx_device.create_query_pool(&create_info, None)? };

        let query_pool = Self {
            handle,
            query_type: ty,
            cnt,
        };
        gfx_device.set_debug_name(&query_pool, debug_name);
        Ok(query_pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::QueryPool {
        self.handle
    }

    #[inline]
    pub fn query_type(&self) -> vk::QueryType {
        self.query_type
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.cnt
    }

    /// 以 64 位读取 query 结果，会阻塞直到结果可用
    #[inline]
    pub fn get_query_result_u64(&self, first_index: u32, query_cnt: u32) -> VkResult<Vec<u64>> {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            let mut res = vec![0u64; query_cnt as usize];
            gfx_device.get_query_pool_results(
                self.handle,
                first_index,
                &mut res,
                vk::QueryResultFlags::TYPE_64 | vk::QueryResultFlags::WAIT,
            )?;
            Ok(res)
        }
    }

    /// host 端 reset，需要开启 hostQueryReset
    #[inline]
    pub fn reset(&self, first_query: u32, query_cnt: u32) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.reset_query_pool(self.handle, first_query, query_cnt);
        }
    }

    #[inline]
    pub fn reset_all(&self) {
        self.reset(0, self.cnt);
    }

    #[inline]
    pub fn destroy(self) {
        drop(self)
    }
}
