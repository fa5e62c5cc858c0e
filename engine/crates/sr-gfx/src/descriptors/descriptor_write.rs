use std::ptr;

use ash::vk;

use crate::extensions::arm_tensors::{
    DESCRIPTOR_TYPE_TENSOR_ARM, STRUCTURE_TYPE_WRITE_DESCRIPTOR_SET_TENSOR_ARM, TensorViewARM,
    WriteDescriptorSetTensorARM,
};
use crate::gfx::Gfx;

/// 描述符更新信息
///
/// - 缓冲区描述符：storage buffer
/// - 图像描述符：storage image 或者 combined image sampler
/// - tensor 描述符：通过 `WriteDescriptorSetTensorARM` 挂在 pNext 上
#[derive(Clone, Copy, Debug)]
pub enum GfxDescriptorUpdateInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
    Tensor(TensorViewARM),
}

/// 向一个 descriptor set 写入单个 descriptor
pub fn write_descriptor(
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: GfxDescriptorUpdateInfo,
) {
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(descriptor_type);

    let gfx_device = Gfx::get().gfx_device();
    match info {
        GfxDescriptorUpdateInfo::Buffer(buffer_info) => {
            let write = write.buffer_info(std::slice::from_ref(&buffer_info));
            unsafe { gfx_device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
        }
        GfxDescriptorUpdateInfo::Image(image_info) => {
            let write = write.image_info(std::slice::from_ref(&image_info));
            unsafe { gfx_device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
        }
        GfxDescriptorUpdateInfo::Tensor(view) => {
            debug_assert_eq!(descriptor_type, DESCRIPTOR_TYPE_TENSOR_ARM);
            let tensor_write = WriteDescriptorSetTensorARM {
                s_type: STRUCTURE_TYPE_WRITE_DESCRIPTOR_SET_TENSOR_ARM,
                p_next: ptr::null(),
                tensor_view_count: 1,
                p_tensor_views: &view,
            };
            let mut write = write;
            write.descriptor_count = 1;
            write.p_next = ptr::from_ref(&tensor_write).cast();
            unsafe { gfx_device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };
        }
    }
}
