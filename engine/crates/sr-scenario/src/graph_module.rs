//! data graph 模块的只读视图
//!
//! 二进制格式的解码不在这里实现：调用者通过 [`crate::io::ResourceIo::load_graph_module`]
//! 提供一个实现了 [`GraphModuleView`] 的对象。

use ash::vk;

use crate::desc::{BindingDesc, TensorDesc};
use crate::errors::Result;

/// 一个 segment 由 data graph pipeline 还是 compute shader 执行
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Graph,
    Shader,
}

/// graph pipeline 的常量 tensor
#[derive(Clone, Debug, PartialEq)]
pub struct GraphConstant {
    pub id: u32,
    pub format: vk::Format,
    pub shape: Vec<i64>,
    pub data: Vec<u8>,
}

pub trait GraphModuleView {
    fn segment_count(&self) -> usize;

    fn segment_kind(&self, segment: usize) -> SegmentKind;

    fn has_spirv(&self, segment: usize) -> bool;

    fn module_name(&self, segment: usize) -> String;

    fn entry_point(&self, segment: usize) -> String;

    /// segment 自带的 SPIR-V 代码，没有时为空
    fn spirv(&self, segment: usize) -> &[u32];

    /// shader segment 的 dispatch 大小
    fn dispatch_shape(&self, segment: usize) -> glam::UVec3;

    fn segment_constants(&self, segment: usize) -> Vec<GraphConstant>;

    /// 把 scenario 中的外部 binding 与模块内部的 binding 合并成该 segment 使用的 binding
    fn resolve_bindings(&self, segment: usize, external: &[BindingDesc]) -> Result<Vec<BindingDesc>>;

    /// 模块内部各 segment 之间传递数据用的 tensor，由 scenario 负责创建
    fn intermediate_resources(&self) -> Vec<TensorDesc>;
}
