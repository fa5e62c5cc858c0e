//! compute pipeline 与 data graph pipeline 的创建
//!
//! descriptor set layout 由 scenario 中的 binding 决定：每个 set index 一个 layout，
//! 中间没有 binding 的 set 也会创建一个空的 layout。

use ash::vk;
use itertools::Itertools;
use sr_gfx::descriptors::descriptor_set_layout::GfxDescriptorSetLayout;
use sr_gfx::extensions::arm_data_graph::{DataGraphPipelineSessionARM, PIPELINE_BIND_POINT_DATA_GRAPH_ARM};
use sr_gfx::extensions::arm_tensors::{TensorTilingARM, TensorUsageFlagsARM};
use sr_gfx::pipelines::compute_pipeline::{GfxComputePipeline, GfxComputePipelineCreateInfo, GfxSpecConstant};
use sr_gfx::pipelines::data_graph_pipeline::{
    GfxDataGraphPipeline, GfxDataGraphPipelineCreateInfo, GfxGraphConstant, GfxGraphResource,
};
use sr_gfx::pipelines::pipeline_layout::GfxPipelineLayout;
use sr_gfx::pipelines::shader::GfxShaderModule;
use sr_gfx::resources::tensor::GfxTensorDescription;

use crate::data_manager::DataManager;
use crate::desc::{BindingDesc, ShaderDesc};
use crate::errors::{Result, ScenarioError};
use crate::graph_module::GraphConstant;
use crate::io::ResourceIo;
use crate::types::{DescriptorType, ShaderType};

/// binding 的实际 descriptor 类型，`Auto` 由资源类型决定
pub fn resolve_descriptor_type(binding: &BindingDesc, data_manager: &DataManager) -> Result<vk::DescriptorType> {
    match binding.descriptor_type {
        DescriptorType::Auto => data_manager.descriptor_type(&binding.resource_ref),
        DescriptorType::StorageImage => Ok(vk::DescriptorType::STORAGE_IMAGE),
    }
}

/// 按 set index 拆分 binding，结果的长度为最大 set index + 1
pub fn split_sets(
    bindings: &[BindingDesc],
    types: &[vk::DescriptorType],
) -> Vec<Vec<vk::DescriptorSetLayoutBinding<'static>>> {
    let mut sets: Vec<Vec<vk::DescriptorSetLayoutBinding<'static>>> = Vec::new();
    for (binding, ty) in bindings.iter().zip(types) {
        let set = binding.set as usize;
        if sets.len() <= set {
            sets.resize_with(set + 1, Vec::new);
        }
        sets[set].push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding.id)
                .descriptor_type(*ty)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::ALL),
        );
    }
    sets
}

/// 从 [`ShaderDesc`] 读取 SPIR-V，GLSL 需要由外部工具预先编译
pub fn load_shader_code(shader: &ShaderDesc, io: &dyn ResourceIo) -> Result<Vec<u8>> {
    match shader.shader_type {
        ShaderType::SpirV => {
            io.load_bytes(std::path::Path::new(&shader.src))
        }
        ShaderType::Glsl => Err(ScenarioError::config(format!(
            "shader {}: GLSL sources must be compiled to SPIR-V before running the scenario",
            shader.uid
        ))),
    }
}

pub struct ComputePipelineInfo<'a> {
    pub debug_name: &'a str,
    pub shader: &'a GfxShaderModule,
    pub entry_point: &'a str,
    pub bindings: &'a [BindingDesc],
    pub push_constants_size: u32,
    pub spec_constants: &'a [GfxSpecConstant],
}

pub struct DataGraphPipelineInfo<'a> {
    pub debug_name: &'a str,
    pub shader: &'a GfxShaderModule,
    pub entry_point: &'a str,
    pub bindings: &'a [BindingDesc],
    pub constants: &'a [GraphConstant],
    /// session memory 需要 dump 时必须是 host 可见的
    pub host_visible_session_memory: bool,
}

enum PipelineKind {
    Compute(GfxComputePipeline),
    DataGraph(GfxDataGraphPipeline),
}

/// 录制 dispatch 所需的 pipeline 以及它的 layout
///
/// 字段的声明顺序就是销毁顺序：pipeline 先于 layout 销毁
pub struct Pipeline {
    kind: PipelineKind,
    layout: GfxPipelineLayout,
    set_layouts: Vec<GfxDescriptorSetLayout>,
    /// 与 bindings 一一对应
    descriptor_types: Vec<vk::DescriptorType>,
    debug_name: String,
}

// 创建与销毁
impl Pipeline {
    fn create_layouts(
        debug_name: &str,
        bindings: &[BindingDesc],
        data_manager: &DataManager,
        push_constants_size: u32,
    ) -> Result<(Vec<vk::DescriptorType>, Vec<GfxDescriptorSetLayout>, GfxPipelineLayout)> {
        let descriptor_types = bindings
            .iter()
            .map(|binding| resolve_descriptor_type(binding, data_manager))
            .collect::<Result<Vec<_>>>()?;
        let set_layouts = split_sets(bindings, &descriptor_types)
            .iter()
            .enumerate()
            .map(|(set, set_bindings)| {
                GfxDescriptorSetLayout::new(set_bindings, format!("{debug_name}-set{set}"))
            })
            .collect::<ash::prelude::VkResult<Vec<_>>>()?;
        let raw_layouts = set_layouts.iter().map(|layout| layout.handle()).collect_vec();
        let layout = GfxPipelineLayout::new(&raw_layouts, push_constants_size, debug_name)?;
        Ok((descriptor_types, set_layouts, layout))
    }

    pub fn new_compute(info: &ComputePipelineInfo, data_manager: &DataManager) -> Result<Self> {
        let (descriptor_types, set_layouts, layout) =
            Self::create_layouts(info.debug_name, info.bindings, data_manager, info.push_constants_size)?;

        let pipeline = GfxComputePipeline::new(
            &GfxComputePipelineCreateInfo {
                shader: info.shader,
                entry_point: info.entry_point,
                layout: layout.handle(),
                spec_constants: info.spec_constants,
            },
            info.debug_name,
        )?;

        Ok(Self {
            kind: PipelineKind::Compute(pipeline),
            layout,
            set_layouts,
            descriptor_types,
            debug_name: info.debug_name.to_string(),
        })
    }

    /// graph pipeline 的 binding 只能是 tensor
    pub fn new_data_graph(info: &DataGraphPipelineInfo, data_manager: &DataManager) -> Result<Self> {
        let (descriptor_types, set_layouts, layout) =
            Self::create_layouts(info.debug_name, info.bindings, data_manager, 0)?;

        let resources = info
            .bindings
            .iter()
            .map(|binding| {
                let tensor = data_manager
                    .get_tensor(&binding.resource_ref)
                    .map_err(|_| ScenarioError::config("Unsupported graph pipeline resource"))?;
                Ok(GfxGraphResource {
                    set: binding.set,
                    binding: binding.id,
                    description: GfxTensorDescription {
                        tiling: tensor.vk_tiling(),
                        format: tensor.format(),
                        dimensions: tensor.shape().to_vec(),
                        strides: tensor.strides().to_vec(),
                        usage: TensorUsageFlagsARM::DATA_GRAPH,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let constants = info
            .constants
            .iter()
            .map(|constant| GfxGraphConstant {
                id: constant.id,
                data: &constant.data,
                description: GfxTensorDescription {
                    tiling: TensorTilingARM::LINEAR,
                    format: constant.format,
                    dimensions: constant.shape.clone(),
                    strides: vec![],
                    usage: TensorUsageFlagsARM::DATA_GRAPH,
                },
            })
            .collect_vec();

        if info.host_visible_session_memory {
            log::warn!("Enabling session memory dumping is known to cause issues on certain GPUs.");
        }
        let pipeline = GfxDataGraphPipeline::new(
            &GfxDataGraphPipelineCreateInfo {
                shader: info.shader,
                entry_point: info.entry_point,
                layout: layout.handle(),
                resources: &resources,
                constants: &constants,
            },
            info.host_visible_session_memory,
            info.debug_name,
        )?;

        Ok(Self {
            kind: PipelineKind::DataGraph(pipeline),
            layout,
            set_layouts,
            descriptor_types,
            debug_name: info.debug_name.to_string(),
        })
    }
}

// getters
impl Pipeline {
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        match &self.kind {
            PipelineKind::Compute(pipeline) => pipeline.handle(),
            PipelineKind::DataGraph(pipeline) => pipeline.handle(),
        }
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        match &self.kind {
            PipelineKind::Compute(_) => vk::PipelineBindPoint::COMPUTE,
            PipelineKind::DataGraph(_) => PIPELINE_BIND_POINT_DATA_GRAPH_ARM,
        }
    }

    #[inline]
    pub fn is_data_graph(&self) -> bool {
        matches!(self.kind, PipelineKind::DataGraph(_))
    }

    /// 只有 data graph pipeline 有 session
    pub fn session(&self) -> Option<DataGraphPipelineSessionARM> {
        match &self.kind {
            PipelineKind::DataGraph(pipeline) => Some(pipeline.session()),
            PipelineKind::Compute(_) => None,
        }
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }

    pub fn set_layout(&self, set: u32) -> Option<vk::DescriptorSetLayout> {
        self.set_layouts.get(set as usize).map(|layout| layout.handle())
    }

    #[inline]
    pub fn set_count(&self) -> usize {
        self.set_layouts.len()
    }

    #[inline]
    pub fn descriptor_types(&self) -> &[vk::DescriptorType] {
        &self.descriptor_types
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn session_memory_count(&self) -> usize {
        match &self.kind {
            PipelineKind::DataGraph(pipeline) => pipeline.session_memory_count(),
            PipelineKind::Compute(_) => 0,
        }
    }

    pub fn read_session_memory(&mut self, index: usize) -> Result<Vec<u8>> {
        match &mut self.kind {
            PipelineKind::DataGraph(pipeline) => Ok(pipeline.read_session_memory(index)?),
            PipelineKind::Compute(_) => Err(ScenarioError::config(format!(
                "pipeline {} is not a data graph pipeline",
                self.debug_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Guid;

    fn binding(set: u32, id: u32, name: &str, descriptor_type: DescriptorType) -> BindingDesc {
        BindingDesc {
            set,
            id,
            resource_ref: Guid::new(name),
            lod: None,
            descriptor_type,
        }
    }

    #[test]
    fn test_split_sets_fills_gaps() {
        let bindings = [
            binding(2, 1, "a", DescriptorType::Auto),
            binding(0, 0, "b", DescriptorType::Auto),
            binding(2, 0, "c", DescriptorType::Auto),
        ];
        let types = [
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::STORAGE_IMAGE,
            vk::DescriptorType::STORAGE_BUFFER,
        ];
        let sets = split_sets(&bindings, &types);

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].len(), 1);
        assert!(sets[1].is_empty());
        assert_eq!(sets[2].iter().map(|b| b.binding).collect_vec(), vec![1, 0]);
        assert_eq!(sets[0][0].descriptor_type, vk::DescriptorType::STORAGE_IMAGE);
        assert_eq!(sets[2][0].stage_flags, vk::ShaderStageFlags::ALL);
    }

    #[test]
    fn test_explicit_storage_image_type() {
        let data_manager = DataManager::new();
        let explicit = binding(0, 0, "missing", DescriptorType::StorageImage);
        assert_eq!(
            resolve_descriptor_type(&explicit, &data_manager).unwrap(),
            vk::DescriptorType::STORAGE_IMAGE
        );
        let auto = binding(0, 0, "missing", DescriptorType::Auto);
        assert!(matches!(
            resolve_descriptor_type(&auto, &data_manager),
            Err(ScenarioError::ResourceNotFound(_))
        ));
    }
}
