use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::desc::command::{CommandDesc, CommandKind};
use crate::desc::resource::{ResourceDesc, ShaderDesc, ShaderSubstitutionDesc};
use crate::errors::{Result, ScenarioError};
use crate::guid::Guid;

/// 一个完整的 scenario：资源列表与按顺序执行的命令列表
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub resources: Vec<ResourceDesc>,
    pub commands: Vec<CommandDesc>,
}

// new & init
impl ScenarioSpec {
    /// 解析 JSON，并把 `src` 解析到 `work_dir`、`dst` 解析到 `output_dir` 之下
    pub fn from_json(json: &str, work_dir: &Path, output_dir: &Path) -> Result<Self> {
        let mut spec: ScenarioSpec = serde_json::from_str(json)?;

        let mut uids = HashSet::new();
        for resource in &spec.resources {
            if !uids.insert(resource.uid().clone()) {
                return Err(ScenarioError::config(format!("Not unique uid: {}", resource.uid())));
            }
        }

        for resource in &mut spec.resources {
            resource.map_paths(
                |src| work_dir.join(src).to_string_lossy().into_owned(),
                |dst| output_dir.join(dst).to_string_lossy().into_owned(),
            );
        }
        Ok(spec)
    }

    pub fn load(path: &Path, output_dir: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let work_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&json, work_dir, output_dir)
    }
}

// tools
impl ScenarioSpec {
    pub fn is_last_command(&self, kind: CommandKind) -> bool {
        self.commands.last().is_some_and(|cmd| cmd.kind() == kind)
    }

    pub fn command_count(&self, kind: CommandKind) -> u64 {
        self.commands.iter().filter(|cmd| cmd.kind() == kind).count() as u64
    }

    pub fn find_resource(&self, uid: &Guid) -> Option<&ResourceDesc> {
        self.resources.iter().find(|res| res.uid() == uid)
    }

    pub fn shader(&self, uid: &Guid) -> Result<&ShaderDesc> {
        match self.find_resource(uid) {
            Some(ResourceDesc::Shader(shader)) => Ok(shader),
            _ => Err(ScenarioError::ResourceNotFound(format!("shader {uid}"))),
        }
    }

    /// 根据 target 名称找到替换 data graph shader segment 的 shader
    pub fn substitution_shader(
        &self,
        substitutions: &[ShaderSubstitutionDesc],
        module_name: &str,
    ) -> Option<Result<&ShaderDesc>> {
        substitutions.iter().find(|sub| sub.target == module_name).map(|sub| self.shader(&sub.shader_ref))
    }

    /// 以 `memory_group` 引用某个资源的 tensor
    pub fn tensors_in_group(&self, group: &Guid) -> impl Iterator<Item = &crate::desc::TensorDesc> {
        self.resources.iter().filter_map(move |res| match res {
            ResourceDesc::Tensor(tensor) if tensor.memory_group().is_some_and(|g| &g.id == group) => Some(tensor),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "resources": [
            {"shader": {"uid": "add", "src": "add.spv", "type": "SPIR-V", "entry": "main"}},
            {"buffer": {"uid": "in", "size": 16, "shader_access": "readonly", "src": "in.npy"}},
            {"buffer": {"uid": "out", "size": 16, "shader_access": "writeonly", "dst": "out.npy"}}
        ],
        "commands": [
            {"dispatch_compute": {"bindings": [], "rangeND": [1, 1, 1], "shader_ref": "add"}},
            {"mark_boundary": {"frame_id": 0, "resources": ["out"]}}
        ]
    }"#;

    #[test]
    fn test_paths_are_resolved() {
        let spec = ScenarioSpec::from_json(SCENARIO, Path::new("work"), Path::new("results")).unwrap();
        let input = spec.find_resource(&Guid::new("in")).unwrap();
        assert_eq!(Path::new(input.src().unwrap()), Path::new("work").join("in.npy"));
        let output = spec.find_resource(&Guid::new("out")).unwrap();
        assert_eq!(Path::new(output.dst().unwrap()), Path::new("results").join("out.npy"));
        assert_eq!(spec.shader(&Guid::new("add")).unwrap().entry, "main");
        assert!(spec.shader(&Guid::new("in")).is_err());
    }

    #[test]
    fn test_command_queries() {
        let spec = ScenarioSpec::from_json(SCENARIO, Path::new("."), Path::new(".")).unwrap();
        assert!(spec.is_last_command(CommandKind::MarkBoundary));
        assert!(!spec.is_last_command(CommandKind::DispatchCompute));
        assert_eq!(spec.command_count(CommandKind::MarkBoundary), 1);
        assert_eq!(spec.command_count(CommandKind::DispatchBarrier), 0);
        assert!(!ScenarioSpec::default().is_last_command(CommandKind::MarkBoundary));
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let json = r#"{"resources": [
            {"raw_data": {"uid": "a", "src": "a.bin"}},
            {"raw_data": {"uid": "a", "src": "b.bin"}}
        ], "commands": []}"#;
        let err = ScenarioSpec::from_json(json, Path::new("."), Path::new(".")).unwrap_err();
        assert!(matches!(err, ScenarioError::Config(msg) if msg.contains("Not unique uid")));
    }
}
