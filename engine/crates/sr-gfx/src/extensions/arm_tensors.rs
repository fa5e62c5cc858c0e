//! `VK_ARM_tensors`

use std::ffi::{CStr, c_void};
use std::ptr;

use ash::prelude::VkResult;
use ash::vk;

use crate::extensions::loader::{arm_handle, load_device_fn};

pub const NAME: &CStr = c"VK_ARM_tensors";

// region 常量

pub const STRUCTURE_TYPE_TENSOR_CREATE_INFO_ARM: vk::StructureType = vk::StructureType::from_raw(1000460000);
pub const STRUCTURE_TYPE_TENSOR_VIEW_CREATE_INFO_ARM: vk::StructureType = vk::StructureType::from_raw(1000460001);
pub const STRUCTURE_TYPE_BIND_TENSOR_MEMORY_INFO_ARM: vk::StructureType = vk::StructureType::from_raw(1000460002);
pub const STRUCTURE_TYPE_WRITE_DESCRIPTOR_SET_TENSOR_ARM: vk::StructureType = vk::StructureType::from_raw(1000460003);
pub const STRUCTURE_TYPE_TENSOR_DESCRIPTION_ARM: vk::StructureType = vk::StructureType::from_raw(1000460006);
pub const STRUCTURE_TYPE_TENSOR_MEMORY_REQUIREMENTS_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000460007);
pub const STRUCTURE_TYPE_TENSOR_MEMORY_BARRIER_ARM: vk::StructureType = vk::StructureType::from_raw(1000460008);
pub const STRUCTURE_TYPE_PHYSICAL_DEVICE_TENSOR_FEATURES_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000460009);
pub const STRUCTURE_TYPE_TENSOR_DEPENDENCY_INFO_ARM: vk::StructureType = vk::StructureType::from_raw(1000460013);
pub const STRUCTURE_TYPE_FRAME_BOUNDARY_TENSORS_ARM: vk::StructureType = vk::StructureType::from_raw(1000460021);

pub const DESCRIPTOR_TYPE_TENSOR_ARM: vk::DescriptorType = vk::DescriptorType::from_raw(1000460000);
pub const IMAGE_LAYOUT_TENSOR_ALIASING_ARM: vk::ImageLayout = vk::ImageLayout::from_raw(1000460000);
pub const IMAGE_USAGE_TENSOR_ALIASING_ARM: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(0x0080_0000);
pub const OBJECT_TYPE_TENSOR_ARM: vk::ObjectType = vk::ObjectType::from_raw(1000460000);
pub const OBJECT_TYPE_TENSOR_VIEW_ARM: vk::ObjectType = vk::ObjectType::from_raw(1000460001);
/// `VK_FORMAT_R8_BOOL_ARM`
pub const FORMAT_R8_BOOL_ARM: vk::Format = vk::Format::from_raw(1000460000);

// endregion

arm_handle!(
    /// `VkTensorARM`
    TensorARM,
    OBJECT_TYPE_TENSOR_ARM
);
arm_handle!(
    /// `VkTensorViewARM`
    TensorViewARM,
    OBJECT_TYPE_TENSOR_VIEW_ARM
);

#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct TensorTilingARM(i32);
impl TensorTilingARM {
    pub const OPTIMAL: Self = Self(0);
    pub const LINEAR: Self = Self(1);
}

/// `VkTensorUsageFlagsARM`，64 位
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct TensorUsageFlagsARM(u64);
impl TensorUsageFlagsARM {
    pub const SHADER: Self = Self(0x2);
    pub const TRANSFER_SRC: Self = Self(0x4);
    pub const TRANSFER_DST: Self = Self(0x8);
    pub const IMAGE_ALIASING: Self = Self(0x10);
    pub const DATA_GRAPH: Self = Self(0x20);

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}
impl std::ops::BitOr for TensorUsageFlagsARM {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// region 结构体

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorDescriptionARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tiling: TensorTilingARM,
    pub format: vk::Format,
    pub dimension_count: u32,
    pub p_dimensions: *const i64,
    pub p_strides: *const i64,
    pub usage: TensorUsageFlagsARM,
}
impl TensorDescriptionARM {
    /// `strides` 为空时表示 packed 布局
    pub fn new(
        tiling: TensorTilingARM,
        format: vk::Format,
        dimensions: &[i64],
        strides: &[i64],
        usage: TensorUsageFlagsARM,
    ) -> Self {
        Self {
            s_type: STRUCTURE_TYPE_TENSOR_DESCRIPTION_ARM,
            p_next: ptr::null(),
            tiling,
            format,
            dimension_count: dimensions.len() as u32,
            p_dimensions: dimensions.as_ptr(),
            p_strides: if strides.is_empty() { ptr::null() } else { strides.as_ptr() },
            usage,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorCreateInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: u64,
    pub p_description: *const TensorDescriptionARM,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_index_count: u32,
    pub p_queue_family_indices: *const u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorViewCreateInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: u64,
    pub tensor: TensorARM,
    pub format: vk::Format,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorMemoryRequirementsInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tensor: TensorARM,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct BindTensorMemoryInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tensor: TensorARM,
    pub memory: vk::DeviceMemory,
    pub memory_offset: vk::DeviceSize,
}

/// 挂在 `VkWriteDescriptorSet::pNext` 上
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct WriteDescriptorSetTensorARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tensor_view_count: u32,
    pub p_tensor_views: *const TensorViewARM,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorMemoryBarrierARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub src_stage_mask: vk::PipelineStageFlags2,
    pub src_access_mask: vk::AccessFlags2,
    pub dst_stage_mask: vk::PipelineStageFlags2,
    pub dst_access_mask: vk::AccessFlags2,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
    pub tensor: TensorARM,
}
impl Default for TensorMemoryBarrierARM {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_TENSOR_MEMORY_BARRIER_ARM,
            p_next: ptr::null(),
            src_stage_mask: vk::PipelineStageFlags2::NONE,
            src_access_mask: vk::AccessFlags2::NONE,
            dst_stage_mask: vk::PipelineStageFlags2::NONE,
            dst_access_mask: vk::AccessFlags2::NONE,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            tensor: TensorARM::null(),
        }
    }
}

/// 挂在 `VkDependencyInfo::pNext` 上
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct TensorDependencyInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tensor_memory_barrier_count: u32,
    pub p_tensor_memory_barriers: *const TensorMemoryBarrierARM,
}

/// 挂在 `VkFrameBoundaryEXT::pNext` 上
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct FrameBoundaryTensorsARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub tensor_count: u32,
    pub p_tensors: *const TensorARM,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct PhysicalDeviceTensorFeaturesARM {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub tensor_non_packed: vk::Bool32,
    pub shader_tensor_access: vk::Bool32,
    pub shader_storage_tensor_array_dynamic_indexing: vk::Bool32,
    pub shader_storage_tensor_array_non_uniform_indexing: vk::Bool32,
    pub descriptor_binding_storage_tensor_update_after_bind: vk::Bool32,
    pub tensors: vk::Bool32,
}
impl Default for PhysicalDeviceTensorFeaturesARM {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PHYSICAL_DEVICE_TENSOR_FEATURES_ARM,
            p_next: ptr::null_mut(),
            tensor_non_packed: vk::FALSE,
            shader_tensor_access: vk::FALSE,
            shader_storage_tensor_array_dynamic_indexing: vk::FALSE,
            shader_storage_tensor_array_non_uniform_indexing: vk::FALSE,
            descriptor_binding_storage_tensor_update_after_bind: vk::FALSE,
            tensors: vk::FALSE,
        }
    }
}
unsafe impl vk::ExtendsPhysicalDeviceFeatures2 for PhysicalDeviceTensorFeaturesARM {}

// endregion

// region 函数指针

pub type PfnCreateTensorARM = unsafe extern "system" fn(
    device: vk::Device,
    p_create_info: *const TensorCreateInfoARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_tensor: *mut TensorARM,
) -> vk::Result;
pub type PfnDestroyTensorARM = unsafe extern "system" fn(
    device: vk::Device,
    tensor: TensorARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
);
pub type PfnCreateTensorViewARM = unsafe extern "system" fn(
    device: vk::Device,
    p_create_info: *const TensorViewCreateInfoARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_view: *mut TensorViewARM,
) -> vk::Result;
pub type PfnDestroyTensorViewARM = unsafe extern "system" fn(
    device: vk::Device,
    tensor_view: TensorViewARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
);
pub type PfnGetTensorMemoryRequirementsARM = unsafe extern "system" fn(
    device: vk::Device,
    p_info: *const TensorMemoryRequirementsInfoARM,
    p_memory_requirements: *mut vk::MemoryRequirements2<'_>,
);
pub type PfnBindTensorMemoryARM = unsafe extern "system" fn(
    device: vk::Device,
    bind_info_count: u32,
    p_bind_infos: *const BindTensorMemoryInfoARM,
) -> vk::Result;

// endregion

/// `VK_ARM_tensors` 的 device 级函数表
#[derive(Clone)]
pub struct TensorsDevice {
    handle: vk::Device,

    create_tensor: PfnCreateTensorARM,
    destroy_tensor: PfnDestroyTensorARM,
    create_tensor_view: PfnCreateTensorViewARM,
    destroy_tensor_view: PfnDestroyTensorViewARM,
    get_tensor_memory_requirements: PfnGetTensorMemoryRequirementsARM,
    bind_tensor_memory: PfnBindTensorMemoryARM,
}
// new & init
impl TensorsDevice {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> VkResult<Self> {
        let handle = device.handle();
        unsafe {
            Ok(Self {
                handle,
                create_tensor: load_device_fn(instance, handle, c"vkCreateTensorARM")?,
                destroy_tensor: load_device_fn(instance, handle, c"vkDestroyTensorARM")?,
                create_tensor_view: load_device_fn(instance, handle, c"vkCreateTensorViewARM")?,
                destroy_tensor_view: load_device_fn(instance, handle, c"vkDestroyTensorViewARM")?,
                get_tensor_memory_requirements: load_device_fn(
                    instance,
                    handle,
                    c"vkGetTensorMemoryRequirementsARM",
                )?,
                bind_tensor_memory: load_device_fn(instance, handle, c"vkBindTensorMemoryARM")?,
            })
        }
    }
}
// 函数调用
impl TensorsDevice {
    /// # Safety
    /// `create_info` 中的指针在调用期间必须有效
    pub unsafe fn create_tensor(&self, create_info: &TensorCreateInfoARM) -> VkResult<TensorARM> {
        let mut tensor = TensorARM::null();
        unsafe { (self.create_tensor)(self.handle, create_info, ptr::null(), &mut tensor) }.result_with_success(tensor)
    }

    /// # Safety
    /// tensor 不能再被 GPU 使用
    pub unsafe fn destroy_tensor(&self, tensor: TensorARM) {
        unsafe { (self.destroy_tensor)(self.handle, tensor, ptr::null()) }
    }

    /// # Safety
    /// `create_info.tensor` 必须是有效的 tensor
    pub unsafe fn create_tensor_view(&self, create_info: &TensorViewCreateInfoARM) -> VkResult<TensorViewARM> {
        let mut view = TensorViewARM::null();
        unsafe { (self.create_tensor_view)(self.handle, create_info, ptr::null(), &mut view) }
            .result_with_success(view)
    }

    /// # Safety
    /// view 不能再被 GPU 使用
    pub unsafe fn destroy_tensor_view(&self, view: TensorViewARM) {
        unsafe { (self.destroy_tensor_view)(self.handle, view, ptr::null()) }
    }

    /// # Safety
    /// tensor 必须有效
    pub unsafe fn get_tensor_memory_requirements(&self, tensor: TensorARM) -> vk::MemoryRequirements {
        let info = TensorMemoryRequirementsInfoARM {
            s_type: STRUCTURE_TYPE_TENSOR_MEMORY_REQUIREMENTS_INFO_ARM,
            p_next: ptr::null(),
            tensor,
        };
        let mut reqs = vk::MemoryRequirements2::default();
        unsafe { (self.get_tensor_memory_requirements)(self.handle, &info, &mut reqs) };
        reqs.memory_requirements
    }

    /// # Safety
    /// memory 与 offset 必须满足 tensor 的内存需求
    pub unsafe fn bind_tensor_memory(
        &self,
        tensor: TensorARM,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        let info = BindTensorMemoryInfoARM {
            s_type: STRUCTURE_TYPE_BIND_TENSOR_MEMORY_INFO_ARM,
            p_next: ptr::null(),
            tensor,
            memory,
            memory_offset: offset,
        };
        unsafe { (self.bind_tensor_memory)(self.handle, 1, &info) }.result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_tensor_handle_roundtrip() {
        let tensor = TensorARM::from_raw(42);
        assert_eq!(tensor.as_raw(), 42);
        assert!(TensorARM::null().is_null());
        assert_eq!(TensorARM::TYPE, OBJECT_TYPE_TENSOR_ARM);
    }

    #[test]
    fn test_description_without_strides() {
        let dims = [1i64, 2, 3, 4];
        let desc = TensorDescriptionARM::new(
            TensorTilingARM::LINEAR,
            vk::Format::R32_SFLOAT,
            &dims,
            &[],
            TensorUsageFlagsARM::SHADER | TensorUsageFlagsARM::DATA_GRAPH,
        );
        assert_eq!(desc.dimension_count, 4);
        assert!(desc.p_strides.is_null());
        assert_eq!(desc.usage.as_raw(), 0x22);
    }
}
