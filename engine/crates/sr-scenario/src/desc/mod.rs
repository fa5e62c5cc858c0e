//! scenario 描述文件的数据结构
//!
//! 与 JSON 格式一一对应，只做 serde 反序列化以及少量的默认值处理。
//! 资源与命令都是 externally tagged：`{"buffer": {...}}`、`{"dispatch_compute": {...}}`。

pub mod command;
pub mod resource;
pub mod scenario_spec;

pub use command::*;
pub use resource::*;
pub use scenario_spec::ScenarioSpec;
