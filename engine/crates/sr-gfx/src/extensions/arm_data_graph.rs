//! `VK_ARM_data_graph`

use std::ffi::{CStr, c_char, c_void};
use std::ptr;

use ash::prelude::VkResult;
use ash::vk;

use crate::extensions::arm_tensors::TensorDescriptionARM;
use crate::extensions::loader::{arm_handle, load_device_fn};

pub const NAME: &CStr = c"VK_ARM_data_graph";

// region 常量

pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_CREATE_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507000);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_CREATE_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507001);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_RESOURCE_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507002);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_CONSTANT_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507003);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_MEMORY_REQUIREMENTS_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507004);
pub const STRUCTURE_TYPE_BIND_DATA_GRAPH_PIPELINE_SESSION_MEMORY_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507005);
pub const STRUCTURE_TYPE_PHYSICAL_DEVICE_DATA_GRAPH_FEATURES_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507006);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SHADER_MODULE_CREATE_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507007);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_BIND_POINT_REQUIREMENTS_INFO_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507011);
pub const STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_BIND_POINT_REQUIREMENT_ARM: vk::StructureType =
    vk::StructureType::from_raw(1000507012);

pub const PIPELINE_BIND_POINT_DATA_GRAPH_ARM: vk::PipelineBindPoint = vk::PipelineBindPoint::from_raw(1000507000);
pub const OBJECT_TYPE_DATA_GRAPH_PIPELINE_SESSION_ARM: vk::ObjectType = vk::ObjectType::from_raw(1000507000);

pub const PIPELINE_STAGE_2_DATA_GRAPH_ARM: vk::PipelineStageFlags2 =
    vk::PipelineStageFlags2::from_raw(0x0000_0400_0000_0000);
pub const ACCESS_2_DATA_GRAPH_READ_ARM: vk::AccessFlags2 = vk::AccessFlags2::from_raw(0x0000_8000_0000_0000);
pub const ACCESS_2_DATA_GRAPH_WRITE_ARM: vk::AccessFlags2 = vk::AccessFlags2::from_raw(0x0001_0000_0000_0000);

// endregion

arm_handle!(
    /// `VkDataGraphPipelineSessionARM`
    DataGraphPipelineSessionARM,
    OBJECT_TYPE_DATA_GRAPH_PIPELINE_SESSION_ARM
);

#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct DataGraphPipelineSessionBindPointARM(i32);
impl DataGraphPipelineSessionBindPointARM {
    pub const TRANSIENT: Self = Self(0);

    #[inline]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct DataGraphPipelineSessionBindPointTypeARM(i32);
impl DataGraphPipelineSessionBindPointTypeARM {
    pub const MEMORY: Self = Self(0);
}

// region 结构体

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineCreateInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: u64,
    pub layout: vk::PipelineLayout,
    pub resource_info_count: u32,
    pub p_resource_infos: *const DataGraphPipelineResourceInfoARM,
}

/// `pNext` 指向该资源的 [`TensorDescriptionARM`]
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineResourceInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub descriptor_set: u32,
    pub binding: u32,
    pub array_element: u32,
}
impl DataGraphPipelineResourceInfoARM {
    pub fn new(descriptor_set: u32, binding: u32, description: &TensorDescriptionARM) -> Self {
        Self {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_RESOURCE_INFO_ARM,
            p_next: ptr::from_ref(description).cast(),
            descriptor_set,
            binding,
            array_element: 0,
        }
    }
}

/// `pNext` 指向常量的 [`TensorDescriptionARM`]
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineConstantARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub id: u32,
    pub p_constant_data: *const c_void,
}
impl DataGraphPipelineConstantARM {
    pub fn new(id: u32, data: &[u8], description: &TensorDescriptionARM) -> Self {
        Self {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_CONSTANT_ARM,
            p_next: ptr::from_ref(description).cast(),
            id,
            p_constant_data: data.as_ptr().cast(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineShaderModuleCreateInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub module: vk::ShaderModule,
    pub p_name: *const c_char,
    pub p_specialization_info: *const vk::SpecializationInfo<'static>,
    pub constant_count: u32,
    pub p_constants: *const DataGraphPipelineConstantARM,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineSessionCreateInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub flags: u64,
    pub data_graph_pipeline: vk::Pipeline,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineSessionBindPointRequirementsInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub session: DataGraphPipelineSessionARM,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineSessionBindPointRequirementARM {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub bind_point: DataGraphPipelineSessionBindPointARM,
    pub bind_point_type: DataGraphPipelineSessionBindPointTypeARM,
    pub num_objects: u32,
}
impl Default for DataGraphPipelineSessionBindPointRequirementARM {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_BIND_POINT_REQUIREMENT_ARM,
            p_next: ptr::null_mut(),
            bind_point: DataGraphPipelineSessionBindPointARM::default(),
            bind_point_type: DataGraphPipelineSessionBindPointTypeARM::default(),
            num_objects: 0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct DataGraphPipelineSessionMemoryRequirementsInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub session: DataGraphPipelineSessionARM,
    pub bind_point: DataGraphPipelineSessionBindPointARM,
    pub object_index: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct BindDataGraphPipelineSessionMemoryInfoARM {
    pub s_type: vk::StructureType,
    pub p_next: *const c_void,
    pub session: DataGraphPipelineSessionARM,
    pub bind_point: DataGraphPipelineSessionBindPointARM,
    pub object_index: u32,
    pub memory: vk::DeviceMemory,
    pub memory_offset: vk::DeviceSize,
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct PhysicalDeviceDataGraphFeaturesARM {
    pub s_type: vk::StructureType,
    pub p_next: *mut c_void,
    pub data_graph: vk::Bool32,
    pub data_graph_update_after_bind: vk::Bool32,
    pub data_graph_specialization_constants: vk::Bool32,
    pub data_graph_descriptor_buffer: vk::Bool32,
    pub data_graph_shader_module: vk::Bool32,
}
impl Default for PhysicalDeviceDataGraphFeaturesARM {
    fn default() -> Self {
        Self {
            s_type: STRUCTURE_TYPE_PHYSICAL_DEVICE_DATA_GRAPH_FEATURES_ARM,
            p_next: ptr::null_mut(),
            data_graph: vk::FALSE,
            data_graph_update_after_bind: vk::FALSE,
            data_graph_specialization_constants: vk::FALSE,
            data_graph_descriptor_buffer: vk::FALSE,
            data_graph_shader_module: vk::FALSE,
        }
    }
}
unsafe impl vk::ExtendsPhysicalDeviceFeatures2 for PhysicalDeviceDataGraphFeaturesARM {}

// endregion

// region 函数指针

pub type PfnCreateDataGraphPipelinesARM = unsafe extern "system" fn(
    device: vk::Device,
    deferred_operation: vk::DeferredOperationKHR,
    pipeline_cache: vk::PipelineCache,
    create_info_count: u32,
    p_create_infos: *const DataGraphPipelineCreateInfoARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_pipelines: *mut vk::Pipeline,
) -> vk::Result;
pub type PfnCreateDataGraphPipelineSessionARM = unsafe extern "system" fn(
    device: vk::Device,
    p_create_info: *const DataGraphPipelineSessionCreateInfoARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
    p_session: *mut DataGraphPipelineSessionARM,
) -> vk::Result;
pub type PfnDestroyDataGraphPipelineSessionARM = unsafe extern "system" fn(
    device: vk::Device,
    session: DataGraphPipelineSessionARM,
    p_allocator: *const vk::AllocationCallbacks<'_>,
);
pub type PfnGetDataGraphPipelineSessionBindPointRequirementsARM = unsafe extern "system" fn(
    device: vk::Device,
    p_info: *const DataGraphPipelineSessionBindPointRequirementsInfoARM,
    p_count: *mut u32,
    p_requirements: *mut DataGraphPipelineSessionBindPointRequirementARM,
) -> vk::Result;
pub type PfnGetDataGraphPipelineSessionMemoryRequirementsARM = unsafe extern "system" fn(
    device: vk::Device,
    p_info: *const DataGraphPipelineSessionMemoryRequirementsInfoARM,
    p_memory_requirements: *mut vk::MemoryRequirements2<'_>,
);
pub type PfnBindDataGraphPipelineSessionMemoryARM = unsafe extern "system" fn(
    device: vk::Device,
    bind_info_count: u32,
    p_bind_infos: *const BindDataGraphPipelineSessionMemoryInfoARM,
) -> vk::Result;
pub type PfnCmdDispatchDataGraphARM = unsafe extern "system" fn(
    command_buffer: vk::CommandBuffer,
    session: DataGraphPipelineSessionARM,
    p_info: *const c_void,
);

// endregion

/// `VK_ARM_data_graph` 的 device 级函数表
#[derive(Clone)]
pub struct DataGraphDevice {
    handle: vk::Device,

    create_data_graph_pipelines: PfnCreateDataGraphPipelinesARM,
    create_session: PfnCreateDataGraphPipelineSessionARM,
    destroy_session: PfnDestroyDataGraphPipelineSessionARM,
    get_bind_point_requirements: PfnGetDataGraphPipelineSessionBindPointRequirementsARM,
    get_session_memory_requirements: PfnGetDataGraphPipelineSessionMemoryRequirementsARM,
    bind_session_memory: PfnBindDataGraphPipelineSessionMemoryARM,
    cmd_dispatch_data_graph: PfnCmdDispatchDataGraphARM,
}
// new & init
impl DataGraphDevice {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> VkResult<Self> {
        let handle = device.handle();
        unsafe {
            Ok(Self {
                handle,
                create_data_graph_pipelines: load_device_fn(instance, handle, c"vkCreateDataGraphPipelinesARM")?,
                create_session: load_device_fn(instance, handle, c"vkCreateDataGraphPipelineSessionARM")?,
                destroy_session: load_device_fn(instance, handle, c"vkDestroyDataGraphPipelineSessionARM")?,
                get_bind_point_requirements: load_device_fn(
                    instance,
                    handle,
                    c"vkGetDataGraphPipelineSessionBindPointRequirementsARM",
                )?,
                get_session_memory_requirements: load_device_fn(
                    instance,
                    handle,
                    c"vkGetDataGraphPipelineSessionMemoryRequirementsARM",
                )?,
                bind_session_memory: load_device_fn(instance, handle, c"vkBindDataGraphPipelineSessionMemoryARM")?,
                cmd_dispatch_data_graph: load_device_fn(instance, handle, c"vkCmdDispatchDataGraphARM")?,
            })
        }
    }
}
// 函数调用
impl DataGraphDevice {
    /// # Safety
    /// `create_info` 上挂载的所有 pNext 结构在调用期间必须有效
    pub unsafe fn create_data_graph_pipeline(
        &self,
        create_info: &DataGraphPipelineCreateInfoARM,
    ) -> VkResult<vk::Pipeline> {
        let mut pipeline = vk::Pipeline::null();
        unsafe {
            (self.create_data_graph_pipelines)(
                self.handle,
                vk::DeferredOperationKHR::null(),
                vk::PipelineCache::null(),
                1,
                create_info,
                ptr::null(),
                &mut pipeline,
            )
        }
        .result_with_success(pipeline)
    }

    /// # Safety
    /// pipeline 必须是 data graph pipeline
    pub unsafe fn create_session(&self, pipeline: vk::Pipeline) -> VkResult<DataGraphPipelineSessionARM> {
        let create_info = DataGraphPipelineSessionCreateInfoARM {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_CREATE_INFO_ARM,
            p_next: ptr::null(),
            flags: 0,
            data_graph_pipeline: pipeline,
        };
        let mut session = DataGraphPipelineSessionARM::null();
        unsafe { (self.create_session)(self.handle, &create_info, ptr::null(), &mut session) }
            .result_with_success(session)
    }

    /// # Safety
    /// session 不能再被 GPU 使用
    pub unsafe fn destroy_session(&self, session: DataGraphPipelineSessionARM) {
        unsafe { (self.destroy_session)(self.handle, session, ptr::null()) }
    }

    /// 先查询数量，再取回所有 bind point
    ///
    /// # Safety
    /// session 必须有效
    pub unsafe fn get_bind_point_requirements(
        &self,
        session: DataGraphPipelineSessionARM,
    ) -> VkResult<Vec<DataGraphPipelineSessionBindPointRequirementARM>> {
        let info = DataGraphPipelineSessionBindPointRequirementsInfoARM {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_BIND_POINT_REQUIREMENTS_INFO_ARM,
            p_next: ptr::null(),
            session,
        };
        let mut count = 0u32;
        unsafe { (self.get_bind_point_requirements)(self.handle, &info, &mut count, ptr::null_mut()) }.result()?;

        let mut requirements = vec![DataGraphPipelineSessionBindPointRequirementARM::default(); count as usize];
        unsafe {
            (self.get_bind_point_requirements)(self.handle, &info, &mut count, requirements.as_mut_ptr())
        }
        .result()?;
        requirements.truncate(count as usize);
        Ok(requirements)
    }

    /// # Safety
    /// session 必须有效
    pub unsafe fn get_session_memory_requirements(
        &self,
        session: DataGraphPipelineSessionARM,
        bind_point: DataGraphPipelineSessionBindPointARM,
        object_index: u32,
    ) -> vk::MemoryRequirements {
        let info = DataGraphPipelineSessionMemoryRequirementsInfoARM {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SESSION_MEMORY_REQUIREMENTS_INFO_ARM,
            p_next: ptr::null(),
            session,
            bind_point,
            object_index,
        };
        let mut reqs = vk::MemoryRequirements2::default();
        unsafe { (self.get_session_memory_requirements)(self.handle, &info, &mut reqs) };
        reqs.memory_requirements
    }

    /// # Safety
    /// memory 必须满足对应 bind point 的内存需求
    pub unsafe fn bind_session_memory(
        &self,
        session: DataGraphPipelineSessionARM,
        bind_point: DataGraphPipelineSessionBindPointARM,
        object_index: u32,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        let info = BindDataGraphPipelineSessionMemoryInfoARM {
            s_type: STRUCTURE_TYPE_BIND_DATA_GRAPH_PIPELINE_SESSION_MEMORY_INFO_ARM,
            p_next: ptr::null(),
            session,
            bind_point,
            object_index,
            memory,
            memory_offset: offset,
        };
        unsafe { (self.bind_session_memory)(self.handle, 1, &info) }.result()
    }

    /// # Safety
    /// command buffer 必须处于 recording 状态，且已绑定 data graph pipeline
    pub unsafe fn cmd_dispatch_data_graph(
        &self,
        command_buffer: vk::CommandBuffer,
        session: DataGraphPipelineSessionARM,
    ) {
        unsafe { (self.cmd_dispatch_data_graph)(command_buffer, session, ptr::null()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::arm_tensors::{TensorTilingARM, TensorUsageFlagsARM};

    #[test]
    fn test_resource_info_chains_description() {
        let dims = [1i64, 8];
        let desc = TensorDescriptionARM::new(
            TensorTilingARM::OPTIMAL,
            vk::Format::R8_SINT,
            &dims,
            &[],
            TensorUsageFlagsARM::DATA_GRAPH,
        );
        let info = DataGraphPipelineResourceInfoARM::new(0, 3, &desc);
        assert_eq!(info.binding, 3);
        assert_eq!(info.array_element, 0);
        assert_eq!(info.p_next, ptr::from_ref(&desc).cast());
    }

    #[test]
    fn test_bind_point_default() {
        let req = DataGraphPipelineSessionBindPointRequirementARM::default();
        assert_eq!(req.bind_point, DataGraphPipelineSessionBindPointARM::TRANSIENT);
        assert_eq!(req.bind_point_type, DataGraphPipelineSessionBindPointTypeARM::MEMORY);
        assert_eq!(req.num_objects, 0);
    }
}
