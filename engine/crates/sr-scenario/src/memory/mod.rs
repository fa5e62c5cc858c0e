pub mod group_manager;
pub mod resource_memory_manager;

pub use group_manager::GroupManager;
pub use resource_memory_manager::{MemoryBlock, ResourceMemoryManager, VmaMemoryBlock};
