use serde::{Deserialize, Deserializer, Serialize};

use crate::desc::resource::ShaderSubstitutionDesc;
use crate::guid::Guid;
use crate::types::DescriptorType;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandDesc {
    DispatchCompute(DispatchComputeDesc),
    #[serde(rename = "dispatch_graph")]
    DispatchDataGraph(DispatchDataGraphDesc),
    DispatchBarrier(DispatchBarrierDesc),
    MarkBoundary(MarkBoundaryDesc),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    DispatchCompute,
    DispatchDataGraph,
    DispatchBarrier,
    MarkBoundary,
}

impl CommandDesc {
    pub fn kind(&self) -> CommandKind {
        match self {
            CommandDesc::DispatchCompute(_) => CommandKind::DispatchCompute,
            CommandDesc::DispatchDataGraph(_) => CommandKind::DispatchDataGraph,
            CommandDesc::DispatchBarrier(_) => CommandKind::DispatchBarrier,
            CommandDesc::MarkBoundary(_) => CommandKind::MarkBoundary,
        }
    }

    /// compute 与 data graph dispatch 的 binding，其它命令为空
    pub fn bindings(&self) -> &[BindingDesc] {
        match self {
            CommandDesc::DispatchCompute(d) => &d.bindings,
            CommandDesc::DispatchDataGraph(d) => &d.bindings,
            _ => &[],
        }
    }
}

/// pipeline 的一个 descriptor binding
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BindingDesc {
    pub set: u32,
    pub id: u32,
    pub resource_ref: Guid,
    /// 只对带 mip 的 image 有意义，绑定对应 mip 的 view
    #[serde(default)]
    pub lod: Option<u32>,
    #[serde(default)]
    pub descriptor_type: DescriptorType,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchComputeDesc {
    pub bindings: Vec<BindingDesc>,
    #[serde(rename = "rangeND")]
    pub range_nd: Vec<u32>,
    pub shader_ref: Guid,
    #[serde(default)]
    pub push_data_ref: Option<Guid>,
    #[serde(default = "default_true")]
    pub implicit_barrier: bool,
}
impl DispatchComputeDesc {
    /// 不足三维的部分补 1
    pub fn dispatch_shape(&self) -> glam::UVec3 {
        let dim = |i: usize| self.range_nd.get(i).copied().unwrap_or(1);
        glam::UVec3::new(dim(0), dim(1), dim(2))
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        self.shader_ref.name()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushConstantMapDesc {
    pub push_data_ref: Guid,
    pub shader_target: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchDataGraphDesc {
    pub graph_ref: Guid,
    pub bindings: Vec<BindingDesc>,
    #[serde(default)]
    pub push_constants: Vec<PushConstantMapDesc>,
    #[serde(default)]
    pub shader_substitutions: Vec<ShaderSubstitutionDesc>,
    #[serde(default = "default_true")]
    pub implicit_barrier: bool,
}
impl DispatchDataGraphDesc {
    #[inline]
    pub fn debug_name(&self) -> &str {
        self.graph_ref.name()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DispatchBarrierDesc {
    #[serde(default)]
    pub image_barrier_refs: Vec<Guid>,
    #[serde(default)]
    pub tensor_barrier_refs: Vec<Guid>,
    #[serde(default)]
    pub memory_barrier_refs: Vec<Guid>,
    #[serde(default)]
    pub buffer_barrier_refs: Vec<Guid>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarkBoundaryDesc {
    #[serde(deserialize_with = "deserialize_frame_id")]
    pub frame_id: u64,
    #[serde(default)]
    pub resources: Vec<Guid>,
}

/// frame_id 应该是 u64，但也接受十进制字符串
fn deserialize_frame_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FrameId {
        Number(u64),
        Text(String),
    }

    match FrameId::deserialize(deserializer)? {
        FrameId::Number(id) => Ok(id),
        FrameId::Text(text) => {
            log::warn!("\"frame_id\" should be of type uint64, parsing \"{text}\" as a string");
            text.trim().parse::<u64>().map_err(|_| serde::de::Error::custom("Unable to parse \"frame_id\" as a string"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_compute_defaults() {
        let json = r#"{"dispatch_compute": {
            "bindings": [{"set": 0, "id": 1, "resource_ref": "buf"}],
            "rangeND": [16], "shader_ref": "add_shader"
        }}"#;
        let cmd: CommandDesc = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.kind(), CommandKind::DispatchCompute);
        let CommandDesc::DispatchCompute(dispatch) = &cmd else {
            panic!("expected dispatch_compute");
        };
        assert_eq!(dispatch.dispatch_shape(), glam::UVec3::new(16, 1, 1));
        assert!(dispatch.implicit_barrier);
        assert_eq!(dispatch.debug_name(), "add_shader");
        assert_eq!(cmd.bindings()[0].descriptor_type, DescriptorType::Auto);
    }

    #[test]
    fn test_frame_id_from_string() {
        let desc: MarkBoundaryDesc = serde_json::from_str(r#"{"frame_id": "42", "resources": ["t"]}"#).unwrap();
        assert_eq!(desc.frame_id, 42);
        let desc: MarkBoundaryDesc = serde_json::from_str(r#"{"frame_id": 7, "resources": []}"#).unwrap();
        assert_eq!(desc.frame_id, 7);
        assert!(serde_json::from_str::<MarkBoundaryDesc>(r#"{"frame_id": "seven", "resources": []}"#).is_err());
    }

    #[test]
    fn test_graph_and_barrier_commands() {
        let json = r#"[
            {"dispatch_graph": {"graph_ref": "g", "bindings": [], "implicit_barrier": false}},
            {"dispatch_barrier": {"image_barrier_refs": ["ib"], "memory_barrier_refs": [], "buffer_barrier_refs": []}}
        ]"#;
        let cmds: Vec<CommandDesc> = serde_json::from_str(json).unwrap();
        let CommandDesc::DispatchDataGraph(graph) = &cmds[0] else {
            panic!("expected dispatch_graph");
        };
        assert!(!graph.implicit_barrier);
        let CommandDesc::DispatchBarrier(barrier) = &cmds[1] else {
            panic!("expected dispatch_barrier");
        };
        assert_eq!(barrier.image_barrier_refs, vec![Guid::new("ib")]);
        assert!(barrier.tensor_barrier_refs.is_empty());
    }
}
