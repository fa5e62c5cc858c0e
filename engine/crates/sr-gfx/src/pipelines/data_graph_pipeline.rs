use std::ffi::CString;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;
use vk_mem::Alloc;

use crate::extensions::arm_data_graph::{
    DataGraphPipelineConstantARM, DataGraphPipelineCreateInfoARM, DataGraphPipelineResourceInfoARM,
    DataGraphPipelineSessionARM, DataGraphPipelineSessionBindPointTypeARM,
    DataGraphPipelineShaderModuleCreateInfoARM, STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_CREATE_INFO_ARM,
    STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SHADER_MODULE_CREATE_INFO_ARM,
};
use crate::resources::tensor::GfxTensorDescription;
use crate::{foundation::debug_messenger::DebugType, gfx::Gfx, pipelines::shader::GfxShaderModule};

/// data graph 中绑定到某个 (set, binding) 的 tensor
#[derive(Clone, Debug)]
pub struct GfxGraphResource {
    pub set: u32,
    pub binding: u32,
    pub description: GfxTensorDescription,
}

/// 编译期写入 graph 的常量 tensor
#[derive(Clone, Debug)]
pub struct GfxGraphConstant<'a> {
    pub id: u32,
    pub data: &'a [u8],
    pub description: GfxTensorDescription,
}

pub struct GfxDataGraphPipelineCreateInfo<'a> {
    pub shader: &'a GfxShaderModule,
    pub entry_point: &'a str,
    pub layout: vk::PipelineLayout,
    pub resources: &'a [GfxGraphResource],
    pub constants: &'a [GfxGraphConstant<'a>],
}

/// data graph pipeline，以及运行它所需的 session 和 session memory
pub struct GfxDataGraphPipeline {
    handle: vk::Pipeline,
    session: DataGraphPipelineSessionARM,

    /// 每个 MEMORY 类型 bind point 对应的一块内存
    session_memory: Vec<vk_mem::Allocation>,
    session_memory_sizes: Vec<vk::DeviceSize>,
}
// 创建与销毁
impl GfxDataGraphPipeline {
    /// - host_visible_session_memory: session memory 是否需要 host 可见，用于 dump session memory
    pub fn new(
        ci: &GfxDataGraphPipelineCreateInfo,
        host_visible_session_memory: bool,
        debug_name: impl AsRef<str>,
    ) -> VkResult<Self> {
        let gfx_device = Gfx::get().gfx_device();

        // 所有的 raw 结构体都引用 ci 中的数据，需要在创建 pipeline 之前一直存活
        let resource_descs = ci.resources.iter().map(|r| r.description.raw()).collect_vec();
        let resource_infos = ci
            .resources
            .iter()
            .zip(&resource_descs)
            .map(|(r, desc)| DataGraphPipelineResourceInfoARM::new(r.set, r.binding, desc))
            .collect_vec();

        let constant_descs = ci.constants.iter().map(|c| c.description.raw()).collect_vec();
        let constant_infos = ci
            .constants
            .iter()
            .zip(&constant_descs)
            .map(|(c, desc)| DataGraphPipelineConstantARM::new(c.id, c.data, desc))
            .collect_vec();

        let entry_point = CString::new(ci.entry_point).map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let shader_module_info = DataGraphPipelineShaderModuleCreateInfoARM {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_SHADER_MODULE_CREATE_INFO_ARM,
            p_next: std::ptr::null(),
            module: ci.shader.handle(),
            p_name: entry_point.as_ptr(),
            p_specialization_info: std::ptr::null(),
            constant_count: constant_infos.len() as u32,
            p_constants: constant_infos.as_ptr(),
        };
        let create_info = DataGraphPipelineCreateInfoARM {
            s_type: STRUCTURE_TYPE_DATA_GRAPH_PIPELINE_CREATE_INFO_ARM,
            p_next: std::ptr::from_ref(&shader_module_info).cast(),
            flags: 0,
            layout: ci.layout,
            resource_info_count: resource_infos.len() as u32,
            p_resource_infos: resource_infos.as_ptr(),
        };

        let handle = unsafe { gfx_device.data_graph().create_data_graph_pipeline(&create_info)? };
        gfx_device.set_object_debug_name(handle, format!("GfxDataGraphPipeline::{}", debug_name.as_ref()));

        let session = match unsafe { gfx_device.data_graph().create_session(handle) } {
            Ok(session) => session,
            Err(e) => {
                unsafe { gfx_device.destroy_pipeline(handle, None) };
                return Err(e);
            }
        };

        let mut pipeline = Self {
            handle,
            session,
            session_memory: vec![],
            session_memory_sizes: vec![],
        };
        // 出错时由 Drop 负责清理已经创建的对象
        pipeline.init_session_memory(host_visible_session_memory)?;
        Ok(pipeline)
    }

    fn init_session_memory(&mut self, host_visible: bool) -> VkResult<()> {
        let gfx = Gfx::get();
        let data_graph = gfx.gfx_device().data_graph();
        let allocator = gfx.allocator();

        let bind_point_reqs = unsafe { data_graph.get_bind_point_requirements(self.session)? };
        for bind_point_req in bind_point_reqs {
            if bind_point_req.bind_point_type != DataGraphPipelineSessionBindPointTypeARM::MEMORY {
                continue;
            }

            let mem_reqs = unsafe { data_graph.get_session_memory_requirements(self.session, bind_point_req.bind_point, 0) };
            if mem_reqs.size == 0 {
                continue;
            }

            let required_flags = if host_visible {
                log::warn!("Enabling session memory dumping is known to cause issues on certain GPUs.");
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            } else {
                vk::MemoryPropertyFlags::empty()
            };
            let alloc_ci = vk_mem::AllocationCreateInfo {
                flags: vk_mem::AllocationCreateFlags::DEDICATED_MEMORY,
                usage: vk_mem::MemoryUsage::Unknown,
                required_flags,
                memory_type_bits: mem_reqs.memory_type_bits,
                ..Default::default()
            };

            let allocation = unsafe { allocator.allocate_memory(&mem_reqs, &alloc_ci)? };
            let alloc_info = allocator.get_allocation_info(&allocation);
            self.session_memory.push(allocation);
            self.session_memory_sizes.push(mem_reqs.size);

            unsafe {
                data_graph.bind_session_memory(
                    self.session,
                    bind_point_req.bind_point,
                    0,
                    alloc_info.device_memory,
                    alloc_info.offset,
                )?;
            }
        }
        Ok(())
    }
}
// getters
impl GfxDataGraphPipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    #[inline]
    pub fn session(&self) -> DataGraphPipelineSessionARM {
        self.session
    }

    #[inline]
    pub fn session_memory_count(&self) -> usize {
        self.session_memory.len()
    }

    #[inline]
    pub fn session_memory_sizes(&self) -> &[vk::DeviceSize] {
        &self.session_memory_sizes
    }
}
// tools
impl GfxDataGraphPipeline {
    /// 读回第 `index` 块 session memory，内存必须是 host 可见的
    pub fn read_session_memory(&mut self, index: usize) -> VkResult<Vec<u8>> {
        let size = *self.session_memory_sizes.get(index).ok_or(vk::Result::ERROR_UNKNOWN)? as usize;
        let allocation = self.session_memory.get_mut(index).ok_or(vk::Result::ERROR_UNKNOWN)?;

        let allocator = Gfx::get().allocator();
        unsafe {
            let ptr = allocator.map_memory(allocation)?;
            let mut data = vec![0u8; size];
            std::ptr::copy_nonoverlapping(ptr, data.as_mut_ptr(), size);
            allocator.unmap_memory(allocation);
            Ok(data)
        }
    }
}
impl Drop for GfxDataGraphPipeline {
    fn drop(&mut self) {
        let gfx = Gfx::get();
        unsafe {
            gfx.gfx_device().data_graph().destroy_session(self.session);
            gfx.gfx_device().destroy_pipeline(self.handle, None);
            for allocation in &mut self.session_memory {
                gfx.allocator().free_memory(allocation);
            }
        }
    }
}
impl DebugType for GfxDataGraphPipeline {
    fn debug_type_name() -> &'static str {
        "GfxDataGraphPipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
