use ash::prelude::VkResult;
use ash::vk;
use vk_mem::Alloc;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 由 vk-mem 分配内存的 buffer，主要用作 host 与 image 之间的 staging buffer
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,

    debug_name: String,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.map_ptr.is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }

            allocator.destroy_buffer(self.handle, &mut self.allocation);
        }
    }
}
// init & destroy
impl GfxBuffer {
    /// - mem_map: 是否需要 host 访问，为 true 时会常驻 map
    pub fn new(
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        mem_map: bool,
        name: impl AsRef<str>,
    ) -> VkResult<Self> {
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::Auto,
            flags: if mem_map {
                vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            required_flags: if mem_map {
                vk::MemoryPropertyFlags::HOST_VISIBLE
            } else {
                vk::MemoryPropertyFlags::empty()
            },
            ..Default::default()
        };

        let allocator = Gfx::get().allocator();
        let (buffer, mut alloc) = unsafe { allocator.create_buffer(&buffer_ci, &alloc_ci)? };

        let mut map_ptr = None;
        if mem_map {
            match unsafe { allocator.map_memory(&mut alloc) } {
                Ok(ptr) => map_ptr = Some(ptr),
                Err(e) => {
                    unsafe { allocator.destroy_buffer(buffer, &mut alloc) };
                    return Err(e);
                }
            }
        }

        Gfx::get().gfx_device().set_object_debug_name(buffer, format!("GfxBuffer::{}", name.as_ref()));
        Ok(Self {
            handle: buffer,
            allocation: alloc,
            size: buffer_size,
            map_ptr,
            debug_name: name.as_ref().to_string(),
        })
    }

    #[inline]
    pub fn new_stage_buffer(size: vk::DeviceSize, debug_name: impl AsRef<str>) -> VkResult<Self> {
        Self::new(size, vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST, true, debug_name)
    }

    #[inline]
    pub fn destroy(self) {
        drop(self)
    }
}
// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
// tools
impl GfxBuffer {
    /// 没有 map 的 buffer 返回 `ERROR_MEMORY_MAP_FAILED`
    #[inline]
    pub fn mapped_ptr(&self) -> VkResult<*mut u8> {
        self.map_ptr.ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)
    }

    /// 通过 mem map 写入数据，超出 buffer 大小的部分会被截断
    pub fn write_bytes(&self, data: &[u8]) -> VkResult<()> {
        let len = data.len().min(self.size as usize);
        let dst = self.mapped_ptr()?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, len);
        }
        Gfx::get().allocator().flush_allocation(&self.allocation, 0, len as vk::DeviceSize)
    }

    /// 读回整个 buffer 的内容
    pub fn read_bytes(&self) -> VkResult<Vec<u8>> {
        let src = self.mapped_ptr()?;
        Gfx::get().allocator().invalidate_allocation(&self.allocation, 0, self.size)?;
        let mut data = vec![0u8; self.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(src, data.as_mut_ptr(), data.len());
        }
        Ok(data)
    }
}
