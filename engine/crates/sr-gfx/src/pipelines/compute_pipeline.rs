use std::ffi::CString;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx, pipelines::shader::GfxShaderModule};

/// 每个 specialization constant 固定占 4 字节
const SPEC_CONSTANT_SIZE: usize = size_of::<u32>();

/// 一个 specialization constant，值按 32 位保存（int / uint / float 的位模式）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxSpecConstant {
    pub id: u32,
    pub value: u32,
}

/// 由 specialization constant 列表生成 map entries 以及紧凑排列的数据
pub fn specialization_entries(constants: &[GfxSpecConstant]) -> (Vec<vk::SpecializationMapEntry>, Vec<u8>) {
    let entries = constants
        .iter()
        .enumerate()
        .map(|(i, c)| vk::SpecializationMapEntry {
            constant_id: c.id,
            offset: (i * SPEC_CONSTANT_SIZE) as u32,
            size: SPEC_CONSTANT_SIZE,
        })
        .collect_vec();
    let values = constants.iter().map(|c| c.value).collect_vec();
    let data = bytemuck::cast_slice(&values).to_vec();
    (entries, data)
}

pub struct GfxComputePipelineCreateInfo<'a> {
    pub shader: &'a GfxShaderModule,
    pub entry_point: &'a str,
    pub layout: vk::PipelineLayout,
    pub spec_constants: &'a [GfxSpecConstant],
}

pub struct GfxComputePipeline {
    handle: vk::Pipeline,
}
impl GfxComputePipeline {
    pub fn new(ci: &GfxComputePipelineCreateInfo, debug_name: impl AsRef<str>) -> VkResult<Self> {
        let entry_point = CString::new(ci.entry_point).map_err(|_| vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let (map_entries, spec_data) = specialization_entries(ci.spec_constants);
        let spec_info = vk::SpecializationInfo::default().map_entries(&map_entries).data(&spec_data);

        let stage_info = vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::COMPUTE)
            .module(ci.shader.handle())
            .name(entry_point.as_c_str())
            .specialization_info(&spec_info);
        let create_info = vk::ComputePipelineCreateInfo::default().stage(stage_info).layout(ci.layout);

        let gfx_device = Gfx::get().gfx_device();
        let pipelines = unsafe {
            gfx_device
                .create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
                .map_err(|(_, e)| e)?
        };
        let handle = pipelines.first().copied().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;

        let pipeline = Self { handle };
        gfx_device.set_debug_name(&pipeline, debug_name);
        Ok(pipeline)
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}
impl Drop for GfxComputePipeline {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_pipeline(self.handle, None);
        }
    }
}
impl DebugType for GfxComputePipeline {
    fn debug_type_name() -> &'static str {
        "GfxComputePipeline"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialization_entries_are_packed() {
        let constants = [
            GfxSpecConstant { id: 3, value: 7 },
            GfxSpecConstant {
                id: 0,
                value: 1.5f32.to_bits(),
            },
        ];
        let (entries, data) = specialization_entries(&constants);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].constant_id, 3);
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].constant_id, 0);
        assert_eq!(entries[1].offset, 4);
        assert_eq!(entries[1].size, 4);
        assert_eq!(data.len(), 8);
        assert_eq!(&data[4..8], &1.5f32.to_ne_bytes());
    }
}
