use ash::vk;

use crate::errors::{Result, ScenarioError};
use crate::types::POOL_DESCRIPTOR_TYPES;

/// 统计 pipeline 用到的每种 descriptor 的数量
///
/// 顺序固定为 storage buffer、tensor、combined image sampler、storage image，数量为 0 的类型不出现
pub fn descriptor_pool_sizes(types: &[vk::DescriptorType]) -> Result<Vec<vk::DescriptorPoolSize>> {
    let mut counts = [0u32; POOL_DESCRIPTOR_TYPES.len()];
    for ty in types {
        let slot = POOL_DESCRIPTOR_TYPES
            .iter()
            .position(|t| t == ty)
            .ok_or(ScenarioError::UnsupportedDescriptorType(*ty))?;
        counts[slot] += 1;
    }

    Ok(POOL_DESCRIPTOR_TYPES
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(ty, count)| vk::DescriptorPoolSize {
            ty: *ty,
            descriptor_count: count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_gfx::extensions::arm_tensors::DESCRIPTOR_TYPE_TENSOR_ARM;

    #[test]
    fn test_pool_sizes_histogram() {
        let types = [
            DESCRIPTOR_TYPE_TENSOR_ARM,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            DESCRIPTOR_TYPE_TENSOR_ARM,
            vk::DescriptorType::STORAGE_BUFFER,
        ];
        let sizes = descriptor_pool_sizes(&types).unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
        assert_eq!(sizes[1].ty, DESCRIPTOR_TYPE_TENSOR_ARM);
        assert_eq!(sizes[1].descriptor_count, 2);
    }

    #[test]
    fn test_pool_sizes_order_and_errors() {
        let sizes = descriptor_pool_sizes(&[
            vk::DescriptorType::STORAGE_IMAGE,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        ])
        .unwrap();
        assert_eq!(sizes[0].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[1].ty, vk::DescriptorType::STORAGE_IMAGE);
        assert!(descriptor_pool_sizes(&[]).unwrap().is_empty());

        let err = descriptor_pool_sizes(&[vk::DescriptorType::UNIFORM_BUFFER]).unwrap_err();
        assert!(matches!(err, ScenarioError::UnsupportedDescriptorType(vk::DescriptorType::UNIFORM_BUFFER)));
    }
}
