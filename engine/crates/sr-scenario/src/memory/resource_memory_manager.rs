use ash::vk;
use sr_gfx::gfx::Gfx;
use vk_mem::Alloc;

use crate::errors::{Result, ScenarioError};

/// 一块已经分配好的设备内存
///
/// 真实实现由 vk-mem 提供；测试中用不依赖设备的假实现替换。
pub trait MemoryBlock {
    fn device_memory(&self) -> vk::DeviceMemory;

    /// 在 device memory 中的起始偏移
    fn offset(&self) -> vk::DeviceSize;

    /// 返回整块分配起始处的 host 指针
    fn map(&mut self) -> Result<*mut u8>;

    fn unmap(&mut self);

    fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()>;

    fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()>;
}

/// 由 vk-mem 分配的 dedicated memory，只允许使用指定的 memory type
pub struct VmaMemoryBlock {
    allocation: vk_mem::Allocation,
    device_memory: vk::DeviceMemory,
    offset: vk::DeviceSize,
    mapped: Option<*mut u8>,
}
// 创建与销毁
impl VmaMemoryBlock {
    pub fn new(size: vk::DeviceSize, memory_type_index: u32) -> Result<Self> {
        let allocator = Gfx::get().allocator();
        let reqs = vk::MemoryRequirements {
            size,
            alignment: 1,
            memory_type_bits: 1 << memory_type_index,
        };
        let alloc_ci = vk_mem::AllocationCreateInfo {
            flags: vk_mem::AllocationCreateFlags::DEDICATED_MEMORY,
            usage: vk_mem::MemoryUsage::Unknown,
            memory_type_bits: 1 << memory_type_index,
            ..Default::default()
        };

        let (allocation, info) = unsafe {
            let allocation = allocator
                .allocate_memory(&reqs, &alloc_ci)
                .map_err(|e| ScenarioError::AllocationError(format!("vmaAllocateMemory failed: {e:?}")))?;
            let info = allocator.get_allocation_info(&allocation);
            (allocation, info)
        };

        Ok(Self {
            allocation,
            device_memory: info.device_memory,
            offset: info.offset,
            mapped: None,
        })
    }
}
impl Drop for VmaMemoryBlock {
    fn drop(&mut self) {
        let allocator = Gfx::get().allocator();
        unsafe {
            if self.mapped.take().is_some() {
                allocator.unmap_memory(&mut self.allocation);
            }
            allocator.free_memory(&mut self.allocation);
        }
    }
}
impl MemoryBlock for VmaMemoryBlock {
    #[inline]
    fn device_memory(&self) -> vk::DeviceMemory {
        self.device_memory
    }

    #[inline]
    fn offset(&self) -> vk::DeviceSize {
        self.offset
    }

    fn map(&mut self) -> Result<*mut u8> {
        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }
        let ptr = unsafe { Gfx::get().allocator().map_memory(&mut self.allocation)? };
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            unsafe { Gfx::get().allocator().unmap_memory(&mut self.allocation) };
        }
    }

    fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()> {
        Ok(Gfx::get().allocator().flush_allocation(&self.allocation, offset, size)?)
    }

    fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()> {
        Ok(Gfx::get().allocator().invalidate_allocation(&self.allocation, offset, size)?)
    }
}

/// 一个 memory group 的内存管理器
///
/// group 内所有资源先登记自己的需求（大小取最大值，memory type 取交集），
/// 然后由第一个调用 [`allocate`](Self::allocate) 的资源完成唯一一次分配。
/// 分配之后的登记都会被忽略并给出警告。
pub struct ResourceMemoryManager {
    size: vk::DeviceSize,
    memory_type_mask: u32,

    /// 与 tensor 别名的 linear image 的 subresource 布局
    subresource_offset: vk::DeviceSize,
    row_pitch: vk::DeviceSize,
    depth_pitch: vk::DeviceSize,
    array_pitch: vk::DeviceSize,
    image_type: vk::ImageType,
    format: vk::Format,

    memory_type_index: Option<u32>,
    block: Option<Box<dyn MemoryBlock>>,
}

impl Default for ResourceMemoryManager {
    fn default() -> Self {
        Self {
            size: 0,
            memory_type_mask: u32::MAX,
            subresource_offset: 0,
            row_pitch: 0,
            depth_pitch: 0,
            array_pitch: 0,
            image_type: vk::ImageType::TYPE_2D,
            format: vk::Format::UNDEFINED,
            memory_type_index: None,
            block: None,
        }
    }
}

// new & init
impl ResourceMemoryManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用 vk-mem 分配
    pub fn allocate(&mut self, required_flags: vk::MemoryPropertyFlags) -> Result<()> {
        let mem_props = *Gfx::get().physical_device().mem_props();
        self.allocate_with(required_flags, &mem_props, |size, type_index| {
            Ok(Box::new(VmaMemoryBlock::new(size, type_index)?) as Box<dyn MemoryBlock>)
        })
    }

    /// 选出 memory type 之后交给 `alloc_fn` 完成实际分配；已经分配过时直接返回
    pub fn allocate_with<F>(
        &mut self,
        required_flags: vk::MemoryPropertyFlags,
        mem_props: &vk::PhysicalDeviceMemoryProperties,
        alloc_fn: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::DeviceSize, u32) -> Result<Box<dyn MemoryBlock>>,
    {
        if self.is_initialized() {
            return Ok(());
        }
        if self.size == 0 {
            return Err(ScenarioError::AllocationError("cannot allocate zero sized memory".to_string()));
        }

        let type_index = sr_gfx::gfx::find_memory_type_index(mem_props, self.memory_type_mask, required_flags)
            .ok_or(ScenarioError::NoSuitableMemoryType {
                type_bits: self.memory_type_mask,
                flags: required_flags,
            })?;

        let block = alloc_fn(self.size, type_index)?;
        log::debug!(
            "allocated {} bytes from memory type {} ({:?})",
            self.size,
            type_index,
            required_flags
        );
        self.memory_type_index = Some(type_index);
        self.block = Some(block);
        Ok(())
    }
}

// update
impl ResourceMemoryManager {
    fn warn_if_initialized(&self, what: &str) -> bool {
        if self.is_initialized() {
            log::warn!("memory already allocated, ignoring {what} update");
        }
        self.is_initialized()
    }

    pub fn update_size(&mut self, size: vk::DeviceSize) {
        if self.warn_if_initialized("size") {
            return;
        }
        self.size = self.size.max(size);
    }

    pub fn update_type_mask(&mut self, bits: u32) {
        if self.warn_if_initialized("memory type") {
            return;
        }
        self.memory_type_mask &= bits;
    }

    pub fn update_subresource_layout(
        &mut self,
        offset: vk::DeviceSize,
        row_pitch: vk::DeviceSize,
        depth_pitch: vk::DeviceSize,
        array_pitch: vk::DeviceSize,
    ) {
        if self.warn_if_initialized("subresource layout") {
            return;
        }
        self.subresource_offset = offset;
        self.row_pitch = row_pitch;
        self.depth_pitch = depth_pitch;
        self.array_pitch = array_pitch;
    }

    pub fn update_format(&mut self, format: vk::Format) {
        if self.warn_if_initialized("format") {
            return;
        }
        self.format = format;
    }

    pub fn update_image_type(&mut self, image_type: vk::ImageType) {
        if self.warn_if_initialized("image type") {
            return;
        }
        self.image_type = image_type;
    }
}

// getters
impl ResourceMemoryManager {
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn memory_type_mask(&self) -> u32 {
        self.memory_type_mask
    }

    #[inline]
    pub fn subresource_offset(&self) -> vk::DeviceSize {
        self.subresource_offset
    }

    #[inline]
    pub fn row_pitch(&self) -> vk::DeviceSize {
        self.row_pitch
    }

    #[inline]
    pub fn depth_pitch(&self) -> vk::DeviceSize {
        self.depth_pitch
    }

    #[inline]
    pub fn array_pitch(&self) -> vk::DeviceSize {
        self.array_pitch
    }

    #[inline]
    pub fn image_type(&self) -> vk::ImageType {
        self.image_type
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.block.is_some()
    }

    #[inline]
    pub fn memory_type_index(&self) -> Option<u32> {
        self.memory_type_index
    }

    pub fn device_memory(&self) -> Result<vk::DeviceMemory> {
        Ok(self.block()?.device_memory())
    }

    /// 分配在 device memory 中的起始偏移，资源绑定时需要加上
    pub fn memory_offset(&self) -> Result<vk::DeviceSize> {
        Ok(self.block()?.offset())
    }

    fn block(&self) -> Result<&dyn MemoryBlock> {
        self.block
            .as_deref()
            .ok_or_else(|| ScenarioError::AllocationError("memory has not been allocated".to_string()))
    }
}

// host access
impl ResourceMemoryManager {
    pub fn map(&mut self) -> Result<*mut u8> {
        self.block
            .as_deref_mut()
            .ok_or_else(|| ScenarioError::AllocationError("cannot map memory before allocation".to_string()))?
            .map()
    }

    pub fn unmap(&mut self) {
        if let Some(block) = self.block.as_deref_mut() {
            block.unmap();
        }
    }

    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()> {
        self.block()?.flush(offset, size)
    }

    pub fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Result<()> {
        self.block()?.invalidate(offset, size)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 用 host 上的 Vec 模拟一块设备内存
    pub(crate) struct HostMemoryBlock {
        pub data: Vec<u8>,
    }
    impl MemoryBlock for HostMemoryBlock {
        fn device_memory(&self) -> vk::DeviceMemory {
            vk::DeviceMemory::null()
        }

        fn offset(&self) -> vk::DeviceSize {
            0
        }

        fn map(&mut self) -> Result<*mut u8> {
            Ok(self.data.as_mut_ptr())
        }

        fn unmap(&mut self) {}

        fn flush(&self, _offset: vk::DeviceSize, _size: vk::DeviceSize) -> Result<()> {
            Ok(())
        }

        fn invalidate(&self, _offset: vk::DeviceSize, _size: vk::DeviceSize) -> Result<()> {
            Ok(())
        }
    }

    /// type 0: DEVICE_LOCAL，type 1: HOST_VISIBLE | HOST_COHERENT
    pub(crate) fn test_mem_props() -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            ..Default::default()
        };
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        props
    }

    pub(crate) fn host_allocate(manager: &mut ResourceMemoryManager, flags: vk::MemoryPropertyFlags) -> Result<()> {
        manager.allocate_with(flags, &test_mem_props(), |size, _| {
            Ok(Box::new(HostMemoryBlock {
                data: vec![0; size as usize],
            }) as Box<dyn MemoryBlock>)
        })
    }

    #[test]
    fn test_size_and_mask_merge() {
        let mut manager = ResourceMemoryManager::new();
        assert_eq!(manager.memory_type_mask(), u32::MAX);
        manager.update_size(64);
        manager.update_size(32);
        manager.update_size(128);
        manager.update_type_mask(0b111);
        manager.update_type_mask(0b110);
        assert_eq!(manager.size(), 128);
        assert_eq!(manager.memory_type_mask(), 0b110);
        assert_eq!(manager.image_type(), vk::ImageType::TYPE_2D);
        assert_eq!(manager.format(), vk::Format::UNDEFINED);
    }

    #[test]
    fn test_allocate_once() {
        let mut manager = ResourceMemoryManager::new();
        manager.update_size(256);
        let mut calls = 0;
        for _ in 0..3 {
            manager
                .allocate_with(vk::MemoryPropertyFlags::HOST_VISIBLE, &test_mem_props(), |size, type_index| {
                    calls += 1;
                    assert_eq!(size, 256);
                    assert_eq!(type_index, 1);
                    Ok(Box::new(HostMemoryBlock {
                        data: vec![0; size as usize],
                    }) as Box<dyn MemoryBlock>)
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
        assert!(manager.is_initialized());
        assert_eq!(manager.memory_type_index(), Some(1));

        // 分配之后的登记被忽略
        manager.update_size(1024);
        manager.update_type_mask(0);
        assert_eq!(manager.size(), 256);
        assert_eq!(manager.memory_type_mask(), u32::MAX);
    }

    #[test]
    fn test_allocate_errors() {
        let mut manager = ResourceMemoryManager::new();
        let err = host_allocate(&mut manager, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, ScenarioError::AllocationError(_)));

        manager.update_size(16);
        manager.update_type_mask(0b01);
        let err = host_allocate(&mut manager, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, ScenarioError::NoSuitableMemoryType { type_bits: 0b01, .. }));
        assert!(!manager.is_initialized());
        assert!(manager.map().is_err());
    }

    #[test]
    fn test_map_after_allocate() {
        let mut manager = ResourceMemoryManager::new();
        manager.update_size(8);
        host_allocate(&mut manager, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(manager.memory_type_index(), Some(0));
        let ptr = manager.map().unwrap();
        unsafe { ptr.add(3).write(7) };
        let ptr = manager.map().unwrap();
        assert_eq!(unsafe { ptr.add(3).read() }, 7);
        assert_eq!(manager.memory_offset().unwrap(), 0);
    }
}
