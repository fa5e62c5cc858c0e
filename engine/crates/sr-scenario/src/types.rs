use ash::vk;
use serde::{Deserialize, Serialize};
use sr_gfx::descriptors::sampler::GfxSamplerCreateInfo;
use sr_gfx::extensions::arm_data_graph::{
    ACCESS_2_DATA_GRAPH_READ_ARM, ACCESS_2_DATA_GRAPH_WRITE_ARM, PIPELINE_STAGE_2_DATA_GRAPH_ARM,
};
use sr_gfx::extensions::arm_tensors::{DESCRIPTOR_TYPE_TENSOR_ARM, IMAGE_LAYOUT_TENSOR_ALIASING_ARM, TensorTilingARM};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderAccessType {
    #[serde(rename = "readonly")]
    ReadOnly,
    #[serde(rename = "writeonly")]
    WriteOnly,
    #[serde(rename = "readwrite")]
    ReadWrite,
    #[serde(rename = "image_read")]
    ImageRead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryAccess {
    ComputeShaderWrite,
    ComputeShaderRead,
    MemoryWrite,
    MemoryRead,
    GraphWrite,
    GraphRead,
}
impl MemoryAccess {
    pub fn to_vk(self) -> vk::AccessFlags2 {
        match self {
            MemoryAccess::ComputeShaderWrite => vk::AccessFlags2::SHADER_WRITE,
            MemoryAccess::ComputeShaderRead => vk::AccessFlags2::SHADER_READ,
            MemoryAccess::MemoryWrite => vk::AccessFlags2::MEMORY_WRITE,
            MemoryAccess::MemoryRead => vk::AccessFlags2::MEMORY_READ,
            MemoryAccess::GraphWrite => ACCESS_2_DATA_GRAPH_WRITE_ARM,
            MemoryAccess::GraphRead => ACCESS_2_DATA_GRAPH_READ_ARM,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Graph,
    Compute,
    All,
}
impl PipelineStage {
    pub fn to_vk(self) -> vk::PipelineStageFlags2 {
        match self {
            PipelineStage::Graph => PIPELINE_STAGE_2_DATA_GRAPH_ARM,
            PipelineStage::Compute => vk::PipelineStageFlags2::COMPUTE_SHADER,
            PipelineStage::All => vk::PipelineStageFlags2::ALL_COMMANDS,
        }
    }

    /// 多个 stage 按位或
    pub fn combine(stages: &[PipelineStage]) -> vk::PipelineStageFlags2 {
        stages.iter().fold(vk::PipelineStageFlags2::empty(), |acc, s| acc | s.to_vk())
    }
}

/// barrier 描述中的 stage 缺省为 `[All]`
pub fn default_stages() -> Vec<PipelineStage> {
    vec![PipelineStage::All]
}

/// barrier 描述中可以出现的 image layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageLayout {
    General,
    TensorAliasing,
    Undefined,
}
impl ImageLayout {
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            ImageLayout::General => vk::ImageLayout::GENERAL,
            ImageLayout::TensorAliasing => IMAGE_LAYOUT_TENSOR_ALIASING_ARM,
            ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tiling {
    Optimal,
    Linear,
}
impl Tiling {
    #[inline]
    pub fn to_vk_image(self) -> vk::ImageTiling {
        match self {
            Tiling::Optimal => vk::ImageTiling::OPTIMAL,
            Tiling::Linear => vk::ImageTiling::LINEAR,
        }
    }

    #[inline]
    pub fn to_vk_tensor(self) -> TensorTilingARM {
        match self {
            Tiling::Optimal => TensorTilingARM::OPTIMAL,
            Tiling::Linear => TensorTilingARM::LINEAR,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DescriptorType {
    /// 由资源类型推导
    #[default]
    #[serde(rename = "VK_DESCRIPTOR_TYPE_AUTO")]
    Auto,
    #[serde(rename = "VK_DESCRIPTOR_TYPE_STORAGE_IMAGE")]
    StorageImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderType {
    #[serde(rename = "SPIR-V")]
    SpirV,
    #[serde(rename = "GLSL")]
    Glsl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterMode {
    Linear,
    Nearest,
}
impl FilterMode {
    #[inline]
    pub fn to_vk_filter(self) -> vk::Filter {
        match self {
            FilterMode::Linear => vk::Filter::LINEAR,
            FilterMode::Nearest => vk::Filter::NEAREST,
        }
    }

    #[inline]
    pub fn to_vk_mipmap_mode(self) -> vk::SamplerMipmapMode {
        match self {
            FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
            FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressMode {
    ClampBorder,
    ClampEdge,
    Repeat,
    MirroredRepeat,
}
impl AddressMode {
    pub fn to_vk(self) -> vk::SamplerAddressMode {
        match self {
            AddressMode::ClampBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
            AddressMode::ClampEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
            AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
            AddressMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderColor {
    #[serde(rename = "FLOAT_TRANSPARENT_BLACK")]
    FloatTransparentBlack,
    #[serde(rename = "FLOAT_OPAQUE_BLACK")]
    FloatOpaqueBlack,
    #[serde(rename = "FLOAT_OPAQUE_WHITE")]
    FloatOpaqueWhite,
    #[serde(rename = "INT_TRANSPARENT_BLACK")]
    IntTransparentBlack,
    #[serde(rename = "INT_OPAQUE_BLACK")]
    IntOpaqueBlack,
    #[serde(rename = "INT_OPAQUE_WHITE")]
    IntOpaqueWhite,
    #[serde(rename = "FLOAT_CUSTOM_EXT")]
    FloatCustomExt,
    #[serde(rename = "INT_CUSTOM_EXT")]
    IntCustomExt,
}
impl BorderColor {
    pub fn to_vk(self) -> vk::BorderColor {
        match self {
            BorderColor::FloatTransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            BorderColor::FloatOpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
            BorderColor::FloatOpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
            BorderColor::IntTransparentBlack => vk::BorderColor::INT_TRANSPARENT_BLACK,
            BorderColor::IntOpaqueBlack => vk::BorderColor::INT_OPAQUE_BLACK,
            BorderColor::IntOpaqueWhite => vk::BorderColor::INT_OPAQUE_WHITE,
            BorderColor::FloatCustomExt => vk::BorderColor::FLOAT_CUSTOM_EXT,
            BorderColor::IntCustomExt => vk::BorderColor::INT_CUSTOM_EXT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubresourceRange {
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}
impl Default for SubresourceRange {
    fn default() -> Self {
        Self {
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}
impl SubresourceRange {
    #[inline]
    pub fn to_vk(self, aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: self.base_mip_level,
            level_count: self.level_count,
            base_array_layer: self.base_array_layer,
            layer_count: self.layer_count,
        }
    }
}

/// image 附带的 sampler 设置
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerSettings {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub border_address_mode: AddressMode,
    pub border_color: BorderColor,
    /// 只有 custom border color 时才会用到；int 类型时按分量截断
    pub custom_border_color: [f64; 4],
}
impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Nearest,
            mip_filter: FilterMode::Nearest,
            border_address_mode: AddressMode::ClampEdge,
            border_color: BorderColor::FloatTransparentBlack,
            custom_border_color: [0.0; 4],
        }
    }
}
impl SamplerSettings {
    pub fn to_gfx(&self, mip_levels: u32) -> GfxSamplerCreateInfo {
        let c = self.custom_border_color;
        let custom_border_color = match self.border_color {
            BorderColor::IntCustomExt => vk::ClearColorValue {
                int32: [c[0] as i32, c[1] as i32, c[2] as i32, c[3] as i32],
            },
            _ => vk::ClearColorValue {
                float32: [c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32],
            },
        };
        GfxSamplerCreateInfo {
            min_filter: self.min_filter.to_vk_filter(),
            mag_filter: self.mag_filter.to_vk_filter(),
            mipmap_mode: self.mip_filter.to_vk_mipmap_mode(),
            address_mode: self.border_address_mode.to_vk(),
            border_color: self.border_color.to_vk(),
            custom_border_color,
            mip_levels,
        }
    }
}

/// 资源的种类，GroupManager 用它来回答别名查询
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Buffer,
    Image,
    Tensor,
    RawData,
}

/// 统计 descriptor pool 容量时支持的 descriptor 类型，顺序固定
pub const POOL_DESCRIPTOR_TYPES: [vk::DescriptorType; 4] = [
    vk::DescriptorType::STORAGE_BUFFER,
    DESCRIPTOR_TYPE_TENSOR_ARM,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::STORAGE_IMAGE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_combination() {
        let stages = PipelineStage::combine(&[PipelineStage::Compute, PipelineStage::Graph]);
        assert!(stages.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(stages.contains(PIPELINE_STAGE_2_DATA_GRAPH_ARM));
        assert!(!stages.contains(vk::PipelineStageFlags2::ALL_COMMANDS));
    }

    #[test]
    fn test_enum_names_from_json() {
        let access: MemoryAccess = serde_json::from_str("\"compute_shader_write\"").unwrap();
        assert_eq!(access.to_vk(), vk::AccessFlags2::SHADER_WRITE);
        let tiling: Tiling = serde_json::from_str("\"OPTIMAL\"").unwrap();
        assert_eq!(tiling, Tiling::Optimal);
        let mode: AddressMode = serde_json::from_str("\"MIRRORED_REPEAT\"").unwrap();
        assert_eq!(mode, AddressMode::MirroredRepeat);
        let shader: ShaderType = serde_json::from_str("\"SPIR-V\"").unwrap();
        assert_eq!(shader, ShaderType::SpirV);
        assert!(serde_json::from_str::<ShaderAccessType>("\"sometimes\"").is_err());
    }

    #[test]
    fn test_int_custom_border_color() {
        let settings = SamplerSettings {
            border_color: BorderColor::IntCustomExt,
            custom_border_color: [1.0, 2.0, 3.0, 4.0],
            ..Default::default()
        };
        let info = settings.to_gfx(1);
        assert!(info.is_custom_border_color());
        assert_eq!(unsafe { info.custom_border_color.int32 }, [1, 2, 3, 4]);
        assert_eq!(info.min_filter, vk::Filter::NEAREST);
    }
}
