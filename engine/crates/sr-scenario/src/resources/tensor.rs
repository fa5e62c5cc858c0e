use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ash::vk;
use sr_gfx::extensions::arm_tensors::{TensorARM, TensorTilingARM, TensorUsageFlagsARM, TensorViewARM};
use sr_gfx::resources::tensor::{GfxTensor, GfxTensorDescription};

use crate::errors::{Result, ScenarioError};
use crate::format;
use crate::io::ResourceIo;
use crate::memory::ResourceMemoryManager;
use crate::types::Tiling;

pub struct TensorInfo {
    pub debug_name: String,
    pub shape: Vec<i64>,
    pub format: vk::Format,
    pub tiling: Tiling,
    /// 与 image 共享同一块内存
    pub is_aliased_with_image: bool,
    pub memory_offset: vk::DeviceSize,
}

/// 与 linear image 别名时，tensor 每个维度的 stride 需要与 image 的 subresource 布局一致
///
/// - rank > 3：3D image 使用 depth pitch，2D image 使用整个 group 的内存大小
/// - rank > 2：row pitch
/// - rank > 1：一个 texel 的大小，以及单个元素的大小
pub fn compute_alias_strides(shape: &[i64], tensor_format: vk::Format, memory: &ResourceMemoryManager) -> Result<Vec<i64>> {
    let rank = shape.len();
    let mut strides = Vec::with_capacity(rank);
    let mut push_stride = |stride: u64| -> Result<()> {
        let stride = i64::try_from(stride)
            .map_err(|_| ScenarioError::config(format!("Value out of range for stride: {stride}")))?;
        strides.push(stride);
        Ok(())
    };

    if rank > 3 {
        if memory.image_type() == vk::ImageType::TYPE_3D {
            push_stride(memory.depth_pitch())?;
        } else if memory.image_type() == vk::ImageType::TYPE_2D {
            push_stride(memory.size())?;
        }
    }
    if rank > 2 {
        push_stride(memory.row_pitch())?;
    }
    if rank > 1 {
        let components = format::component_count(memory.format())?;
        let innermost = shape[rank - 1];
        if innermost != components as i64 {
            return Err(ScenarioError::ShapeMismatch(format!(
                "Aliased tensor innermost dimension: {innermost}, must match number of components of image: {components}"
            )));
        }
        let element_size = format::element_size(tensor_format)? as u64;
        push_stride(element_size * components as u64)?;
        push_stride(element_size)?;
    }
    Ok(strides)
}

/// 按照 stride 把 rank 4 tensor 的元素收集成紧密排列的数据
///
/// 任何一个元素落在 `mapped` 之外都是错误
fn gather_strided(mapped: &[u8], shape: &[i64], strides: &[i64], element_size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(format::total_elements(shape) as usize * element_size);
    for a in 0..shape[0] {
        for b in 0..shape[1] {
            for c in 0..shape[2] {
                for d in 0..shape[3] {
                    let offset = a * strides[0] + b * strides[1] + c * strides[2] + d * strides[3];
                    let element = usize::try_from(offset)
                        .ok()
                        .and_then(|base| mapped.get(base..base.checked_add(element_size)?))
                        .ok_or_else(|| ScenarioError::SizeMismatch {
                            what: format!("Strided tensor element at offset {offset} is outside of mapped memory"),
                            expected: mapped.len() as u64,
                            actual: offset.unsigned_abs() + element_size as u64,
                        })?;
                    out.extend_from_slice(element);
                }
            }
        }
    }
    Ok(out)
}

/// group 内存中从 `memory_offset` 开始属于这个 tensor 的字节数
fn host_span(mem_size: u64, memory_offset: u64) -> Result<u64> {
    mem_size.checked_sub(memory_offset).ok_or_else(|| {
        ScenarioError::AllocationError(format!(
            "Tensor memory offset {memory_offset} is beyond memory size {mem_size}"
        ))
    })
}

/// 映射 group 内存，返回从 `memory_offset` 开始到分配末尾的区域
///
/// 返回的 slice 借用了 `memory`，unmap 之前必须结束使用
fn mapped_span<'a>(
    memory: &'a mut ResourceMemoryManager,
    memory_offset: u64,
    debug_name: &str,
) -> Result<&'a mut [u8]> {
    if !memory.is_initialized() {
        return Err(ScenarioError::AllocationError(format!(
            "Uninitialized MemoryManager for Tensor {debug_name}"
        )));
    }
    let span = host_span(memory.size(), memory_offset)?;
    let base = memory.map()?;
    // map 返回整块分配的起始地址，分配大小是 size()
    Ok(unsafe { std::slice::from_raw_parts_mut(base.add(memory_offset as usize), span as usize) })
}

fn fill_mapped(memory: &mut ResourceMemoryManager, memory_offset: u64, debug_name: &str, data: &[u8]) -> Result<()> {
    check_fill_size(data.len() as u64, host_span(memory.size(), memory_offset)?)?;
    let span = mapped_span(memory, memory_offset, debug_name)?;
    span[..data.len()].copy_from_slice(data);
    memory.unmap();
    Ok(())
}

fn zero_mapped(memory: &mut ResourceMemoryManager, memory_offset: u64, debug_name: &str) -> Result<()> {
    mapped_span(memory, memory_offset, debug_name)?.fill(0);
    memory.unmap();
    Ok(())
}

/// 带 stride 的 rank 4 tensor 按照 stride 收集元素，其它情况直接取紧密排列的前缀
fn read_mapped(
    memory: &mut ResourceMemoryManager,
    memory_offset: u64,
    debug_name: &str,
    shape: &[i64],
    strides: &[i64],
    format: vk::Format,
) -> Result<Vec<u8>> {
    let element_size = format::element_size(format)? as usize;
    let data_size = element_size as u64 * format::total_elements(shape);

    let span = mapped_span(memory, memory_offset, debug_name)?;
    let span_size = span.len() as u64;
    let data = if span_size != data_size && shape.len() == 4 && strides.len() == 4 {
        gather_strided(span, shape, strides, element_size)
    } else {
        if span_size != data_size {
            log::warn!("Tensor data size {data_size} is different from allocated memory size {span_size}");
        }
        Ok(span[..data_size.min(span_size) as usize].to_vec())
    };
    memory.unmap();
    data
}

/// 超过内存大小的数据是错误；比内存小只给出警告
fn check_fill_size(data_len: u64, mem_size: u64) -> Result<()> {
    if data_len < mem_size {
        log::warn!("Tensor data size {data_len} is different from allocated memory size {mem_size}");
    } else if data_len > mem_size {
        return Err(ScenarioError::SizeMismatch {
            what: "Allocated Tensor memory is less than data size".to_string(),
            expected: mem_size,
            actual: data_len,
        });
    }
    Ok(())
}

pub struct Tensor {
    inner: GfxTensor,
    shape: Vec<i64>,
    strides: Vec<i64>,
    format: vk::Format,
    tiling: Tiling,
    /// 原始 shape 是 rank 0，存储时恢复为空 shape
    rank_converted: bool,
    memory_offset: vk::DeviceSize,
    memory: Rc<RefCell<ResourceMemoryManager>>,
    debug_name: String,
}

// 创建与销毁
impl Tensor {
    pub fn new(info: &TensorInfo, memory: Rc<RefCell<ResourceMemoryManager>>) -> Result<Self> {
        let mut shape = info.shape.clone();
        let rank_converted = shape.is_empty();
        if rank_converted {
            shape.push(1);
        }

        let strides = if info.is_aliased_with_image && info.tiling != Tiling::Optimal {
            compute_alias_strides(&shape, info.format, &memory.borrow())?
        } else {
            Vec::new()
        };

        let desc = GfxTensorDescription {
            tiling: info.tiling.to_vk_tensor(),
            format: info.format,
            dimensions: shape.clone(),
            strides: strides.clone(),
            usage: TensorUsageFlagsARM::SHADER
                | TensorUsageFlagsARM::TRANSFER_SRC
                | TensorUsageFlagsARM::TRANSFER_DST
                | TensorUsageFlagsARM::DATA_GRAPH,
        };
        let inner = GfxTensor::new(&desc, &info.debug_name)?;

        let reqs = inner.memory_requirements();
        {
            let mut memory = memory.borrow_mut();
            let size = reqs.size + memory.subresource_offset() + info.memory_offset;
            memory.update_size(size);
            memory.update_type_mask(reqs.memory_type_bits);
        }

        Ok(Self {
            inner,
            shape,
            strides,
            format: info.format,
            tiling: info.tiling,
            rank_converted,
            memory_offset: info.memory_offset,
            memory,
            debug_name: info.debug_name.clone(),
        })
    }

    pub fn allocate_memory(&mut self) -> Result<()> {
        let bind_offset = {
            let mut memory = self.memory.borrow_mut();
            memory.allocate(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT)?;
            self.inner.bind_memory(
                memory.device_memory()?,
                memory.memory_offset()? + memory.subresource_offset() + self.memory_offset,
            )?;
            memory.subresource_offset() + self.memory_offset
        };
        self.inner.create_view(&format!("{} view (default)", self.debug_name))?;
        log::debug!("tensor {} bound at offset {}", self.debug_name, bind_offset);
        Ok(())
    }
}

// getters
impl Tensor {
    #[inline]
    pub fn handle(&self) -> TensorARM {
        self.inner.handle()
    }

    #[inline]
    pub fn view(&self) -> TensorViewARM {
        self.inner.view()
    }

    #[inline]
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn tiling(&self) -> Tiling {
        self.tiling
    }

    #[inline]
    pub fn vk_tiling(&self) -> TensorTilingARM {
        self.tiling.to_vk_tensor()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// 紧密排列时的数据大小
    pub fn data_size(&self) -> Result<u64> {
        Ok(format::element_size(self.format)? as u64 * format::total_elements(&self.shape))
    }

    /// 所在 memory group 的内存大小
    #[inline]
    pub fn mem_size(&self) -> u64 {
        self.memory.borrow().size()
    }

    #[inline]
    pub fn memory_manager(&self) -> Rc<RefCell<ResourceMemoryManager>> {
        self.memory.clone()
    }
}

// host access
impl Tensor {
    pub fn fill(&self, data: &[u8]) -> Result<()> {
        fill_mapped(&mut self.memory.borrow_mut(), self.memory_offset, &self.debug_name, data)
    }

    /// 清零从 tensor 偏移开始到 group 内存末尾的区域
    pub fn fill_zero(&self) -> Result<()> {
        zero_mapped(&mut self.memory.borrow_mut(), self.memory_offset, &self.debug_name)
    }

    /// 从文件中读取数据，大小必须与 shape 和 format 一致
    pub fn fill_from_file(&self, io: &dyn ResourceIo, path: &Path) -> Result<()> {
        let data = io.load_tensor(path, self.format)?;
        let expected = self.data_size()?;
        if data.len() as u64 != expected {
            return Err(ScenarioError::SizeMismatch {
                what: format!("Tensor {} and data have different size", self.debug_name),
                expected,
                actual: data.len() as u64,
            });
        }
        self.fill(&data)
    }

    /// 读回 tensor 的数据
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        read_mapped(
            &mut self.memory.borrow_mut(),
            self.memory_offset,
            &self.debug_name,
            &self.shape,
            &self.strides,
            self.format,
        )
    }

    pub fn store(&self, io: &dyn ResourceIo, path: &Path) -> Result<()> {
        let data = self.read_bytes()?;
        let shape: &[i64] = if self.rank_converted { &[] } else { &self.shape };
        io.store_tensor(path, &data, shape, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::resource_memory_manager::tests::host_allocate;

    fn linear_image_memory(image_type: vk::ImageType, format: vk::Format) -> ResourceMemoryManager {
        let mut memory = ResourceMemoryManager::new();
        memory.update_size(4096);
        memory.update_subresource_layout(0, 64, 1024, 1024);
        memory.update_image_type(image_type);
        memory.update_format(format);
        memory
    }

    #[test]
    fn test_strides_for_3d_image() {
        let memory = linear_image_memory(vk::ImageType::TYPE_3D, vk::Format::R8G8B8A8_UNORM);
        let strides = compute_alias_strides(&[1, 4, 16, 4], vk::Format::R8_UINT, &memory).unwrap();
        assert_eq!(strides, vec![1024, 64, 4, 1]);
    }

    #[test]
    fn test_strides_for_2d_image_use_memory_size() {
        let memory = linear_image_memory(vk::ImageType::TYPE_2D, vk::Format::R16G16B16A16_SFLOAT);
        let strides = compute_alias_strides(&[1, 4, 4, 4], vk::Format::R16_SFLOAT, &memory).unwrap();
        assert_eq!(strides, vec![4096, 64, 8, 2]);

        let strides = compute_alias_strides(&[4, 4], vk::Format::R16_SFLOAT, &memory).unwrap();
        assert_eq!(strides, vec![8, 2]);
        assert!(compute_alias_strides(&[16], vk::Format::R16_SFLOAT, &memory).unwrap().is_empty());
    }

    #[test]
    fn test_strides_innermost_must_match_components() {
        let memory = linear_image_memory(vk::ImageType::TYPE_2D, vk::Format::R8G8B8A8_UNORM);
        let err = compute_alias_strides(&[1, 4, 4, 3], vk::Format::R8_UINT, &memory).unwrap_err();
        assert!(matches!(err, ScenarioError::ShapeMismatch(_)));
    }

    #[test]
    fn test_fill_size_check() {
        assert!(check_fill_size(8, 16).is_ok());
        assert!(check_fill_size(16, 16).is_ok());
        let err = check_fill_size(32, 16).unwrap_err();
        assert!(matches!(err, ScenarioError::SizeMismatch { expected: 16, actual: 32, .. }));
    }

    #[test]
    fn test_gather_strided() {
        // 1x2x2x1 的 u8 tensor，每行 pitch 为 4 字节
        let mapped = [1u8, 2, 0, 0, 3, 4, 0, 0];
        let data = gather_strided(&mapped, &[1, 2, 2, 1], &[8, 4, 1, 1], 1).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);

        let err = gather_strided(&mapped, &[1, 2, 2, 1], &[8, 8, 1, 1], 1).unwrap_err();
        assert!(matches!(err, ScenarioError::SizeMismatch { expected: 8, actual: 9, .. }));
        assert!(gather_strided(&mapped, &[1, 1, 1, 2], &[0, 0, 0, -4], 1).is_err());
    }

    fn group_memory(size: u64) -> ResourceMemoryManager {
        let mut memory = ResourceMemoryManager::new();
        memory.update_size(size);
        host_allocate(&mut memory, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        memory
    }

    #[test]
    fn test_host_access_with_memory_offset() {
        let mut memory = group_memory(64);
        mapped_span(&mut memory, 0, "t").unwrap().fill(0xFF);

        // 偏移 16 之后只剩 48 字节
        assert_eq!(mapped_span(&mut memory, 16, "t").unwrap().len(), 48);
        let err = fill_mapped(&mut memory, 16, "t", &[1; 64]).unwrap_err();
        assert!(matches!(err, ScenarioError::SizeMismatch { expected: 48, actual: 64, .. }));

        zero_mapped(&mut memory, 16, "t").unwrap();
        let whole = mapped_span(&mut memory, 0, "t").unwrap().to_vec();
        assert!(whole[..16].iter().all(|b| *b == 0xFF));
        assert!(whole[16..].iter().all(|b| *b == 0));

        fill_mapped(&mut memory, 16, "t", &[7; 48]).unwrap();
        let data = read_mapped(&mut memory, 16, "t", &[48], &[], vk::Format::R8_UINT).unwrap();
        assert_eq!(data, vec![7; 48]);

        // 数据比剩余区域大时只读回剩余部分
        let data = read_mapped(&mut memory, 32, "t", &[64], &[], vk::Format::R8_UINT).unwrap();
        assert_eq!(data.len(), 32);
    }

    #[test]
    fn test_host_access_offset_beyond_memory() {
        let mut memory = group_memory(64);
        assert!(matches!(host_span(64, 80), Err(ScenarioError::AllocationError(_))));
        assert!(matches!(zero_mapped(&mut memory, 80, "t"), Err(ScenarioError::AllocationError(_))));
        assert!(fill_mapped(&mut memory, 80, "t", &[]).is_err());
        assert_eq!(host_span(64, 64).unwrap(), 0);

        let mut unallocated = ResourceMemoryManager::new();
        unallocated.update_size(64);
        assert!(matches!(zero_mapped(&mut unallocated, 0, "t"), Err(ScenarioError::AllocationError(_))));
    }
}
