//! ash 0.38 尚未收录的 ARM 扩展
//!
//! 结构体布局与 Vulkan 头文件保持一致，函数指针在 device 创建后通过
//! `vkGetDeviceProcAddr` 加载。

pub mod arm_data_graph;
pub mod arm_tensors;
mod loader;
