pub mod descriptor_pool;
pub mod descriptor_set_layout;
pub mod descriptor_write;
pub mod sampler;
