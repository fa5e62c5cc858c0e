use serde::{Deserialize, Serialize};

use crate::guid::Guid;
use crate::types::{
    AddressMode, BorderColor, FilterMode, ImageLayout, MemoryAccess, PipelineStage, SamplerSettings, ShaderAccessType,
    ShaderType, SubresourceRange, Tiling, default_stages,
};

/// scenario 中的一个资源条目
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDesc {
    Shader(ShaderDesc),
    Buffer(BufferDesc),
    Graph(DataGraphDesc),
    RawData(RawDataDesc),
    Tensor(TensorDesc),
    Image(ImageDesc),
    ImageBarrier(ImageBarrierDesc),
    MemoryBarrier(MemoryBarrierDesc),
    TensorBarrier(TensorBarrierDesc),
    BufferBarrier(BufferBarrierDesc),
}
// getters
impl ResourceDesc {
    pub fn uid(&self) -> &Guid {
        match self {
            ResourceDesc::Shader(d) => &d.uid,
            ResourceDesc::Buffer(d) => &d.uid,
            ResourceDesc::Graph(d) => &d.uid,
            ResourceDesc::RawData(d) => &d.uid,
            ResourceDesc::Tensor(d) => &d.uid,
            ResourceDesc::Image(d) => &d.uid,
            ResourceDesc::ImageBarrier(d) => &d.uid,
            ResourceDesc::MemoryBarrier(d) => &d.uid,
            ResourceDesc::TensorBarrier(d) => &d.uid,
            ResourceDesc::BufferBarrier(d) => &d.uid,
        }
    }

    /// 输入文件路径（已经相对于工作目录解析）
    pub fn src(&self) -> Option<&str> {
        match self {
            ResourceDesc::Shader(d) => Some(&d.src),
            ResourceDesc::Graph(d) => Some(&d.src),
            ResourceDesc::RawData(d) => Some(&d.src),
            ResourceDesc::Buffer(d) => d.src.as_deref(),
            ResourceDesc::Tensor(d) => d.src.as_deref(),
            ResourceDesc::Image(d) => d.src.as_deref(),
            _ => None,
        }
    }

    pub fn dst(&self) -> Option<&str> {
        match self {
            ResourceDesc::Buffer(d) => d.dst.as_deref(),
            ResourceDesc::Tensor(d) => d.dst.as_deref(),
            ResourceDesc::Image(d) => d.dst.as_deref(),
            _ => None,
        }
    }

    pub fn memory_group(&self) -> Option<MemoryGroupRef> {
        match self {
            ResourceDesc::Buffer(d) => d.memory_group.clone(),
            ResourceDesc::Tensor(d) => d.memory_group(),
            ResourceDesc::Image(d) => d.memory_group.clone(),
            _ => None,
        }
    }

    pub(crate) fn map_paths(&mut self, src: impl Fn(&str) -> String, dst: impl Fn(&str) -> String) {
        match self {
            ResourceDesc::Shader(d) => d.src = src(&d.src),
            ResourceDesc::Graph(d) => d.src = src(&d.src),
            ResourceDesc::RawData(d) => d.src = src(&d.src),
            ResourceDesc::Buffer(d) => {
                d.src = d.src.as_deref().map(&src);
                d.dst = d.dst.as_deref().map(&dst);
            }
            ResourceDesc::Tensor(d) => {
                d.src = d.src.as_deref().map(&src);
                d.dst = d.dst.as_deref().map(&dst);
            }
            ResourceDesc::Image(d) => {
                d.src = d.src.as_deref().map(&src);
                d.dst = d.dst.as_deref().map(&dst);
            }
            _ => {}
        }
    }
}

/// 资源所在的 memory group，以及在 group 内存中的字节偏移
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryGroupRef {
    pub id: Guid,
    #[serde(default)]
    pub offset: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AliasTarget {
    pub resource_ref: Guid,
}

/// specialization constant 既可以是整数也可以是浮点数，最终都按 32 bit 写入
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecConstantValue {
    Int(i64),
    Float(f64),
}
impl SpecConstantValue {
    pub fn to_bits(self) -> u32 {
        match self {
            SpecConstantValue::Int(v) => v as i32 as u32,
            SpecConstantValue::Float(v) => (v as f32).to_bits(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecConstantDesc {
    pub id: u32,
    pub value: SpecConstantValue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShaderDesc {
    pub uid: Guid,
    pub src: String,
    #[serde(rename = "type")]
    pub shader_type: ShaderType,
    pub entry: String,
    #[serde(default)]
    pub push_constants_size: u32,
    #[serde(default)]
    pub specialization_constants: Vec<SpecConstantDesc>,
    #[serde(default)]
    pub build_options: Option<String>,
    #[serde(default)]
    pub include_dirs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderSubstitutionDesc {
    pub shader_ref: Guid,
    /// data graph 中 shader segment 的 module 名称
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecConstantMapDesc {
    pub shader_target: String,
    pub specialization_constants: Vec<SpecConstantDesc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataGraphDesc {
    pub uid: Guid,
    pub src: String,
    #[serde(default)]
    pub shader_substitutions: Vec<ShaderSubstitutionDesc>,
    #[serde(default)]
    pub specialization_constants: Vec<SpecConstantMapDesc>,
    #[serde(default)]
    pub push_constants_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawDataDesc {
    pub uid: Guid,
    pub src: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BufferDesc {
    pub uid: Guid,
    pub size: u64,
    pub shader_access: ShaderAccessType,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dst: Option<String>,
    #[serde(default)]
    pub memory_group: Option<MemoryGroupRef>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorDesc {
    pub uid: Guid,
    pub dims: Vec<i64>,
    pub format: String,
    pub shader_access: ShaderAccessType,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dst: Option<String>,
    /// 旧格式，等价于 `memory_group: {id: resource_ref}`
    #[serde(default)]
    pub alias_target: Option<AliasTarget>,
    #[serde(default)]
    pub memory_group: Option<MemoryGroupRef>,
    #[serde(default)]
    pub tiling: Option<Tiling>,
}
impl TensorDesc {
    pub fn memory_group(&self) -> Option<MemoryGroupRef> {
        self.memory_group.clone().or_else(|| {
            self.alias_target.as_ref().map(|target| MemoryGroupRef {
                id: target.resource_ref.clone(),
                offset: 0,
            })
        })
    }
}

/// 旧格式中 mips 是一个 bool
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MipsValue {
    Count(u32),
    Flag(bool),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageDesc {
    pub uid: Guid,
    pub dims: Vec<u32>,
    #[serde(default)]
    pub mips: Option<MipsValue>,
    pub format: String,
    pub shader_access: ShaderAccessType,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dst: Option<String>,
    #[serde(default)]
    pub min_filter: Option<FilterMode>,
    #[serde(default)]
    pub mag_filter: Option<FilterMode>,
    #[serde(default)]
    pub mip_filter: Option<FilterMode>,
    #[serde(default)]
    pub border_address_mode: Option<AddressMode>,
    #[serde(default)]
    pub border_color: Option<BorderColor>,
    #[serde(default)]
    pub custom_border_color: Option<[f64; 4]>,
    #[serde(default)]
    pub tiling: Option<Tiling>,
    #[serde(default)]
    pub memory_group: Option<MemoryGroupRef>,
}
impl ImageDesc {
    pub fn mip_levels(&self) -> u32 {
        match self.mips {
            None => 1,
            Some(MipsValue::Count(n)) => n,
            Some(MipsValue::Flag(_)) => {
                log::warn!("image {}: boolean \"mips\" is deprecated, using 1 mip level", self.uid);
                1
            }
        }
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        let default = SamplerSettings::default();
        SamplerSettings {
            min_filter: self.min_filter.unwrap_or(default.min_filter),
            mag_filter: self.mag_filter.unwrap_or(default.mag_filter),
            mip_filter: self.mip_filter.unwrap_or(default.mip_filter),
            border_address_mode: self.border_address_mode.unwrap_or(default.border_address_mode),
            border_color: self.border_color.unwrap_or(default.border_color),
            custom_border_color: self.custom_border_color.unwrap_or(default.custom_border_color),
        }
    }
}

/// 所有 barrier 共有的 access 与 stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarrierScopeDesc {
    pub src_access: MemoryAccess,
    pub dst_access: MemoryAccess,
    #[serde(default = "default_stages")]
    pub src_stage: Vec<PipelineStage>,
    #[serde(default = "default_stages")]
    pub dst_stage: Vec<PipelineStage>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryBarrierDesc {
    pub uid: Guid,
    #[serde(flatten)]
    pub scope: BarrierScopeDesc,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TensorBarrierDesc {
    pub uid: Guid,
    #[serde(flatten)]
    pub scope: BarrierScopeDesc,
    pub tensor_resource: Guid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageBarrierDesc {
    pub uid: Guid,
    #[serde(flatten)]
    pub scope: BarrierScopeDesc,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub image_resource: Guid,
    #[serde(default)]
    pub subresource_range: SubresourceRange,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BufferBarrierDesc {
    pub uid: Guid,
    #[serde(flatten)]
    pub scope: BarrierScopeDesc,
    pub buffer_resource: Guid,
    pub offset: u64,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tensor_with_alias_target() {
        let json = r#"{"tensor": {
            "uid": "t0", "dims": [1, 4, 4, 4], "format": "VK_FORMAT_R8_SINT",
            "shader_access": "readwrite", "alias_target": {"resource_ref": "img"}, "tiling": "LINEAR"
        }}"#;
        let desc: ResourceDesc = serde_json::from_str(json).unwrap();
        let ResourceDesc::Tensor(tensor) = &desc else {
            panic!("expected tensor");
        };
        assert_eq!(tensor.tiling, Some(Tiling::Linear));
        let group = desc.memory_group().unwrap();
        assert_eq!(group.id, Guid::new("img"));
        assert_eq!(group.offset, 0);
        assert_eq!(desc.uid(), &Guid::new("t0"));
    }

    #[test]
    fn test_parse_image_barrier_defaults() {
        let json = r#"{"image_barrier": {
            "uid": "b0", "src_access": "compute_shader_write", "dst_access": "graph_read",
            "old_layout": "general", "new_layout": "tensor_aliasing", "image_resource": "img"
        }}"#;
        let desc: ResourceDesc = serde_json::from_str(json).unwrap();
        let ResourceDesc::ImageBarrier(barrier) = desc else {
            panic!("expected image barrier");
        };
        assert_eq!(barrier.scope.src_stage, vec![PipelineStage::All]);
        assert_eq!(barrier.new_layout, ImageLayout::TensorAliasing);
        assert_eq!(barrier.subresource_range, SubresourceRange::default());
    }

    #[test]
    fn test_image_mips_and_sampler() {
        let json = r#"{
            "uid": "img", "dims": [1, 16, 16, 1], "mips": true, "format": "VK_FORMAT_R8G8B8A8_UNORM",
            "shader_access": "readonly", "min_filter": "LINEAR", "border_color": "FLOAT_CUSTOM_EXT",
            "custom_border_color": [0.5, 0.5, 0.5, 1.0]
        }"#;
        let image: ImageDesc = serde_json::from_str(json).unwrap();
        assert_eq!(image.mip_levels(), 1);
        let settings = image.sampler_settings();
        assert_eq!(settings.min_filter, FilterMode::Linear);
        assert_eq!(settings.mag_filter, FilterMode::Nearest);
        assert_eq!(settings.border_color, BorderColor::FloatCustomExt);

        let counted: ImageDesc =
            serde_json::from_str(&json.replace("\"mips\": true", "\"mips\": 5")).unwrap();
        assert_eq!(counted.mip_levels(), 5);
    }

    #[test]
    fn test_spec_constant_bits() {
        let constants: Vec<SpecConstantDesc> =
            serde_json::from_str(r#"[{"id": 0, "value": -1}, {"id": 1, "value": 1.5}]"#).unwrap();
        assert_eq!(constants[0].value.to_bits(), u32::MAX);
        assert_eq!(constants[1].value.to_bits(), 1.5f32.to_bits());
    }
}
