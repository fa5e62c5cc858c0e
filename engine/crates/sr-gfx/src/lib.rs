//! Vulkan GFX 抽象层
//!
//! 面向 compute queue 的精简封装：设备管理、命令缓冲、描述符、compute 管线，
//! 以及 ash 尚未收录的 `VK_ARM_tensors` / `VK_ARM_data_graph` 扩展。
//! 所有 Vulkan 资源通过 [`gfx::Gfx`] 单例统一管理，简化生命周期和借用关系。

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod extensions;
pub mod foundation;
pub mod gfx;
pub mod gfx_core;
pub mod pipelines;
pub mod query;
pub mod resources;
