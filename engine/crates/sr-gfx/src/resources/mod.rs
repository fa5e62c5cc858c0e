pub mod buffer;
pub mod tensor;
