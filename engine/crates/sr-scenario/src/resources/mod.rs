pub mod buffer;
pub mod image;
pub mod raw_data;
pub mod tensor;

pub use buffer::{Buffer, BufferInfo};
pub use image::{Image, ImageInfo};
pub use raw_data::RawData;
pub use tensor::{Tensor, TensorInfo};
