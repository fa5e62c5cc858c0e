//! Scenario Runner 工具集
//!
//! 提供日志初始化以及 TOML 配置文件的读写。

pub mod init_log;
pub mod toml_file;
