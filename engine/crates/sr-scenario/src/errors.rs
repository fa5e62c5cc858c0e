use ash::vk;

/// scenario 执行过程中的所有错误
///
/// 没有任何重试：错误会一路传播到调用者，终止本次运行
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// scenario 描述或者运行参数不合法
    #[error("invalid scenario: {0}")]
    Config(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("unknown barrier target: {0}")]
    UnknownBarrierTarget(String),

    /// 同一个 memory group 内的资源 tiling 不一致
    #[error("aliased resources must have identical tiling: {0}")]
    TilingMismatch(String),

    #[error("memory allocation failed: {0}")]
    AllocationError(String),

    #[error("no memory type matches type bits {type_bits:#x} with flags {flags:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("{what}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        what: String,
        expected: u64,
        actual: u64,
    },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("cannot count unsupported descriptor type {0:?}")]
    UnsupportedDescriptorType(vk::DescriptorType),

    #[error("no command buffer is being recorded")]
    NoCommandBuffer,

    #[error("no timestamp query pool has been set up")]
    NoQueryPool,

    #[error("cannot map {timestamps} timestamps to {commands} profiled commands")]
    TimestampCountMismatch { timestamps: usize, commands: usize },

    #[error("vulkan error: {0}")]
    Device(#[from] vk::Result),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

impl ScenarioError {
    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_converts() {
        fn device_call() -> std::result::Result<(), vk::Result> {
            Err(vk::Result::ERROR_DEVICE_LOST)
        }
        fn fails() -> Result<()> {
            device_call()?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, ScenarioError::Device(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn test_size_mismatch_message() {
        let err = ScenarioError::SizeMismatch {
            what: "buffer fill".to_string(),
            expected: 16,
            actual: 8,
        };
        assert_eq!(err.to_string(), "buffer fill: expected 16 bytes, got 8");
    }
}
