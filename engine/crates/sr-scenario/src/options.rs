use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sr_gfx::gfx::GfxInitInfo;

/// 运行参数，可以从 TOML 文件加载
///
/// ```toml
/// profiling_path = "out/profiling.json"
/// perf_counters_path = "out/perf.json"
/// enable_gpu_debug_markers = true
/// disabled_extensions = ["VK_EXT_frame_boundary"]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOptions {
    /// dispatch 的 GPU 计时，为空时不创建 query pool
    pub profiling_path: Option<PathBuf>,
    /// host 端耗时统计
    pub perf_counters_path: Option<PathBuf>,
    /// data graph session memory 的 hexdump 目录
    pub session_memory_dump_dir: Option<PathBuf>,
    pub enable_gpu_debug_markers: bool,
    /// 即使受支持也不开启的 device extension
    pub disabled_extensions: Vec<String>,
}

impl ScenarioOptions {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        sr_crate_tools::toml_file::load_toml(path).with_context(|| format!("加载 scenario 参数失败: {}", path.display()))
    }

    pub fn gfx_init_info(&self) -> GfxInitInfo {
        GfxInitInfo {
            app_name: "Scenario-Runner".to_string(),
            enable_gpu_debug_markers: self.enable_gpu_debug_markers,
            disabled_extensions: self.disabled_extensions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let options: ScenarioOptions = sr_crate_tools::toml_file::parse_toml(
            r#"
            profiling_path = "out/profiling.json"
            enable_gpu_debug_markers = true
            disabled_extensions = ["VK_EXT_frame_boundary"]
            "#,
        )
        .unwrap();
        assert_eq!(options.profiling_path, Some(PathBuf::from("out/profiling.json")));
        assert!(options.perf_counters_path.is_none());
        assert!(options.session_memory_dump_dir.is_none());

        let info = options.gfx_init_info();
        assert!(info.enable_gpu_debug_markers);
        assert_eq!(info.disabled_extensions, vec!["VK_EXT_frame_boundary".to_string()]);
    }

    #[test]
    fn test_empty_options() {
        let options: ScenarioOptions = sr_crate_tools::toml_file::parse_toml("").unwrap();
        assert_eq!(options, ScenarioOptions::default());
        assert!(ScenarioOptions::load("/definitely/not/here.toml").is_err());
    }
}
