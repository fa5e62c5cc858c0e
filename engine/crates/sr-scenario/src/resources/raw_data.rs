use std::path::Path;

use crate::errors::Result;
use crate::io::ResourceIo;

/// 从文件读入的原始字节，用作 push constant 数据
pub struct RawData {
    data: Vec<u8>,
    debug_name: String,
}

impl RawData {
    pub fn new(debug_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            data,
            debug_name: debug_name.into(),
        }
    }

    pub fn load(debug_name: impl Into<String>, io: &dyn ResourceIo, path: &Path) -> Result<Self> {
        Ok(Self::new(debug_name, io.load_bytes(path)?))
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}
