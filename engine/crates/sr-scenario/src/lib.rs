//! Scenario 执行层
//!
//! 根据 [`desc::ScenarioSpec`] 创建 buffer / image / tensor，按照 memory group 让多个资源共享同一块内存，
//! 把 compute 与 data graph 的 dispatch 录制为延迟执行的命令列表，回放到 command buffer 中提交并等待。
//!
//! 所有对象都是单线程使用的：共享状态通过 `Rc<RefCell<_>>` 表达。

pub mod barrier;
pub mod compute;
pub mod data_manager;
pub mod desc;
pub mod errors;
pub mod format;
pub mod graph_module;
pub mod guid;
pub mod io;
pub mod layout_transition;
pub mod memory;
pub mod options;
pub mod perf_counter;
pub mod pipeline;
pub mod resources;
pub mod scenario;
pub mod types;

pub use errors::{Result, ScenarioError};
pub use guid::Guid;
pub use options::ScenarioOptions;
pub use scenario::Scenario;
