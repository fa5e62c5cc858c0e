use std::path::Path;

use ash::vk;

use crate::errors::{Result, ScenarioError};
use crate::graph_module::GraphModuleView;

/// 资源文件的读写
///
/// 默认实现直接读写原始字节；numpy / dds 等格式由调用者提供的实现负责。
pub trait ResourceIo {
    fn load_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    fn store_bytes(&self, path: &Path, data: &[u8]) -> Result<()>;

    fn load_buffer(&self, path: &Path) -> Result<Vec<u8>> {
        self.load_bytes(path)
    }

    fn store_buffer(&self, path: &Path, data: &[u8]) -> Result<()> {
        self.store_bytes(path, data)
    }

    fn load_tensor(&self, path: &Path, _format: vk::Format) -> Result<Vec<u8>> {
        self.load_bytes(path)
    }

    /// rank 0 的 tensor 以空 shape 写出
    fn store_tensor(&self, path: &Path, data: &[u8], _shape: &[i64], _format: vk::Format) -> Result<()> {
        self.store_bytes(path, data)
    }

    fn load_image(&self, path: &Path, _format: vk::Format) -> Result<Vec<u8>> {
        self.load_bytes(path)
    }

    fn store_image(&self, path: &Path, data: &[u8], _extent: vk::Extent3D, _format: vk::Format) -> Result<()> {
        self.store_bytes(path, data)
    }

    fn load_graph_module(&self, path: &Path) -> Result<Box<dyn GraphModuleView>> {
        Err(ScenarioError::config(format!("no graph module decoder available for {}", path.display())))
    }
}

/// 按原始字节读写文件
#[derive(Clone, Copy, Debug, Default)]
pub struct RawFileIo;

impl ResourceIo for RawFileIo {
    fn load_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| {
            log::error!("failed to read {}: {}", path.display(), e);
            ScenarioError::Io(e)
        })
    }

    fn store_bytes(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("sr-scenario-io-{}", std::process::id()));
        let path = dir.join("nested").join("data.bin");
        RawFileIo.store_tensor(&path, &[1, 2, 3], &[3], vk::Format::R8_UINT).unwrap();
        assert_eq!(RawFileIo.load_buffer(&path).unwrap(), vec![1, 2, 3]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_graph_module_needs_decoder() {
        let err = RawFileIo.load_graph_module(Path::new("model.vgf")).err().unwrap();
        assert!(matches!(err, ScenarioError::Config(_)));
        assert!(matches!(RawFileIo.load_bytes(Path::new("/nonexistent/file")), Err(ScenarioError::Io(_))));
    }
}
