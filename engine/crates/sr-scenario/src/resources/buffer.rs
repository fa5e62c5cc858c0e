use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ash::vk;
use sr_gfx::gfx::Gfx;

use crate::errors::{Result, ScenarioError};
use crate::io::ResourceIo;
use crate::memory::ResourceMemoryManager;

pub struct BufferInfo {
    pub debug_name: String,
    pub size: vk::DeviceSize,
    /// 在 memory group 中的偏移
    pub memory_offset: vk::DeviceSize,
}

/// shader 可读写的 storage buffer，内存来自所在 memory group
pub struct Buffer {
    handle: vk::Buffer,
    size: vk::DeviceSize,
    memory_offset: vk::DeviceSize,
    memory: Rc<RefCell<ResourceMemoryManager>>,
    debug_name: String,
}

// 创建与销毁
impl Buffer {
    /// 创建 buffer 对象，并把内存需求登记到 memory manager 中
    pub fn new(info: &BufferInfo, memory: Rc<RefCell<ResourceMemoryManager>>) -> Result<Self> {
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(info.size)
            .usage(vk::BufferUsageFlags::STORAGE_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let gfx_device = Gfx::get().gfx_device();
        let handle = unsafe { gfx_device.create_buffer(&buffer_ci, None)? };
        gfx_device.set_object_debug_name(handle, format!("Buffer::{}", info.debug_name));

        let reqs = unsafe { gfx_device.get_buffer_memory_requirements(handle) };
        {
            let mut memory = memory.borrow_mut();
            memory.update_size(reqs.size + info.memory_offset);
            memory.update_type_mask(reqs.memory_type_bits);
        }

        Ok(Self {
            handle,
            size: info.size,
            memory_offset: info.memory_offset,
            memory,
            debug_name: info.debug_name.clone(),
        })
    }

    /// group 还没有分配时先分配，然后绑定到自己的偏移上
    pub fn allocate_memory(&mut self) -> Result<()> {
        let mut memory = self.memory.borrow_mut();
        memory.allocate(vk::MemoryPropertyFlags::HOST_VISIBLE)?;
        let offset = memory.memory_offset()? + self.memory_offset;
        unsafe {
            Gfx::get().gfx_device().bind_buffer_memory(self.handle, memory.device_memory()?, offset)?;
        }
        Ok(())
    }
}
impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { Gfx::get().gfx_device().destroy_buffer(self.handle, None) };
    }
}

// getters
impl Buffer {
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

    #[inline]
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.handle,
            offset: 0,
            range: vk::WHOLE_SIZE,
        }
    }
}

// host access
impl Buffer {
    /// 返回 buffer 起始位置的 host 指针
    pub fn map(&self) -> Result<*mut u8> {
        let mut memory = self.memory.borrow_mut();
        if !memory.is_initialized() {
            return Err(ScenarioError::AllocationError(format!(
                "buffer {}: memory has not been allocated",
                self.debug_name
            )));
        }
        let base = memory.map()?;
        Ok(unsafe { base.add(self.memory_offset as usize) })
    }

    pub fn unmap(&self) -> Result<()> {
        let mut memory = self.memory.borrow_mut();
        if !memory.is_initialized() {
            return Err(ScenarioError::AllocationError(format!(
                "buffer {}: memory has not been allocated",
                self.debug_name
            )));
        }
        memory.unmap();
        Ok(())
    }

    /// 数据大小必须与 buffer 完全一致
    pub fn fill(&self, data: &[u8]) -> Result<()> {
        if data.len() as u64 != self.size {
            return Err(ScenarioError::SizeMismatch {
                what: format!("Buffer::fill {}", self.debug_name),
                expected: self.size,
                actual: data.len() as u64,
            });
        }
        let dst = self.map()?;
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
        self.memory.borrow().flush(self.memory_offset, self.size)?;
        self.unmap()
    }

    pub fn fill_zero(&self) -> Result<()> {
        let dst = self.map()?;
        unsafe { std::ptr::write_bytes(dst, 0, self.size as usize) };
        self.memory.borrow().flush(self.memory_offset, self.size)?;
        self.unmap()
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let src = self.map()?;
        self.memory.borrow().invalidate(self.memory_offset, self.size)?;
        let mut data = vec![0u8; self.size as usize];
        unsafe { std::ptr::copy_nonoverlapping(src, data.as_mut_ptr(), data.len()) };
        self.unmap()?;
        Ok(data)
    }

    pub fn store(&self, io: &dyn ResourceIo, path: &Path) -> Result<()> {
        let data = self.read_bytes()?;
        io.store_buffer(path, &data)
    }
}
