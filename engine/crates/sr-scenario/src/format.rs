use ash::vk;
use sr_gfx::extensions::arm_tensors::FORMAT_R8_BOOL_ARM;

use crate::errors::{Result, ScenarioError};

/// scenario 中以字符串出现的 format 名称
const FORMAT_NAMES: &[(&str, vk::Format)] = &[
    ("VK_FORMAT_R8_BOOL_ARM", FORMAT_R8_BOOL_ARM),
    ("VK_FORMAT_R8_UINT", vk::Format::R8_UINT),
    ("VK_FORMAT_R8_SINT", vk::Format::R8_SINT),
    ("VK_FORMAT_R8_SNORM", vk::Format::R8_SNORM),
    ("VK_FORMAT_R8_UNORM", vk::Format::R8_UNORM),
    ("VK_FORMAT_R16_UINT", vk::Format::R16_UINT),
    ("VK_FORMAT_R16_SINT", vk::Format::R16_SINT),
    ("VK_FORMAT_R16_SFLOAT", vk::Format::R16_SFLOAT),
    ("VK_FORMAT_R8G8_SINT", vk::Format::R8G8_SINT),
    ("VK_FORMAT_R8G8_UNORM", vk::Format::R8G8_UNORM),
    ("VK_FORMAT_R8G8B8_SINT", vk::Format::R8G8B8_SINT),
    ("VK_FORMAT_R8G8B8_SNORM", vk::Format::R8G8B8_SNORM),
    ("VK_FORMAT_R32_SINT", vk::Format::R32_SINT),
    ("VK_FORMAT_R32_UINT", vk::Format::R32_UINT),
    ("VK_FORMAT_R32_SFLOAT", vk::Format::R32_SFLOAT),
    ("VK_FORMAT_R64_SINT", vk::Format::R64_SINT),
    ("VK_FORMAT_R16G16_SFLOAT", vk::Format::R16G16_SFLOAT),
    ("VK_FORMAT_R8G8B8A8_UNORM", vk::Format::R8G8B8A8_UNORM),
    ("VK_FORMAT_R8G8B8A8_SNORM", vk::Format::R8G8B8A8_SNORM),
    ("VK_FORMAT_R8G8B8A8_SINT", vk::Format::R8G8B8A8_SINT),
    ("VK_FORMAT_R16G16B16A16_UNORM", vk::Format::R16G16B16A16_UNORM),
    ("VK_FORMAT_R16G16B16A16_SNORM", vk::Format::R16G16B16A16_SNORM),
    ("VK_FORMAT_R16G16B16A16_SFLOAT", vk::Format::R16G16B16A16_SFLOAT),
    ("VK_FORMAT_R16G16B16A16_SINT", vk::Format::R16G16B16A16_SINT),
    ("VK_FORMAT_R32G32B32A32_SFLOAT", vk::Format::R32G32B32A32_SFLOAT),
    ("VK_FORMAT_B10G11R11_UFLOAT_PACK32", vk::Format::B10G11R11_UFLOAT_PACK32),
    ("VK_FORMAT_D32_SFLOAT", vk::Format::D32_SFLOAT),
    ("VK_FORMAT_D32_SFLOAT_S8_UINT", vk::Format::D32_SFLOAT_S8_UINT),
];

pub fn parse_format(name: &str) -> Result<vk::Format> {
    FORMAT_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
        .ok_or_else(|| ScenarioError::config(format!("Unknown VkFormat: {name}")))
}

pub fn format_name(format: vk::Format) -> Option<&'static str> {
    FORMAT_NAMES.iter().find(|(_, f)| *f == format).map(|(n, _)| *n)
}

/// (texel block 字节数, component 数量)
fn block_layout(format: vk::Format) -> Option<(u32, u32)> {
    let layout = match format {
        f if f == FORMAT_R8_BOOL_ARM => (1, 1),
        vk::Format::R8_UINT | vk::Format::R8_SINT | vk::Format::R8_SNORM | vk::Format::R8_UNORM => (1, 1),
        vk::Format::R16_UINT | vk::Format::R16_SINT | vk::Format::R16_SFLOAT => (2, 1),
        vk::Format::R8G8_SINT | vk::Format::R8G8_UNORM => (2, 2),
        vk::Format::R8G8B8_SINT | vk::Format::R8G8B8_SNORM => (3, 3),
        vk::Format::R32_SINT | vk::Format::R32_UINT | vk::Format::R32_SFLOAT | vk::Format::D32_SFLOAT => (4, 1),
        vk::Format::R64_SINT => (8, 1),
        vk::Format::R16G16_SFLOAT => (4, 2),
        vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_SNORM | vk::Format::R8G8B8A8_SINT => (4, 4),
        vk::Format::R16G16B16A16_UNORM
        | vk::Format::R16G16B16A16_SNORM
        | vk::Format::R16G16B16A16_SFLOAT
        | vk::Format::R16G16B16A16_SINT => (8, 4),
        vk::Format::R32G32B32A32_SFLOAT => (16, 4),
        vk::Format::B10G11R11_UFLOAT_PACK32 => (4, 3),
        vk::Format::D32_SFLOAT_S8_UINT => (5, 2),
        _ => return None,
    };
    Some(layout)
}

/// 单个元素占用的字节数，texel block 大小向上取整到 2 的幂
pub fn element_size(format: vk::Format) -> Result<u32> {
    let (block_size, _) =
        block_layout(format).ok_or_else(|| ScenarioError::config(format!("Unsupported VkFormat: {format:?}")))?;
    Ok(block_size.next_power_of_two())
}

pub fn component_count(format: vk::Format) -> Result<u32> {
    let (_, components) =
        block_layout(format).ok_or_else(|| ScenarioError::config(format!("Unsupported VkFormat: {format:?}")))?;
    Ok(components)
}

pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    if format == vk::Format::D32_SFLOAT {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// shape 中所有维度的乘积，rank 0 时为 1
pub fn total_elements(shape: &[i64]) -> u64 {
    shape.iter().product::<i64>().unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("VK_FORMAT_R8_SINT").unwrap(), vk::Format::R8_SINT);
        assert_eq!(parse_format("VK_FORMAT_R8_BOOL_ARM").unwrap(), FORMAT_R8_BOOL_ARM);
        assert!(matches!(parse_format("VK_FORMAT_NOPE"), Err(ScenarioError::Config(_))));
        assert_eq!(format_name(vk::Format::R32_SFLOAT), Some("VK_FORMAT_R32_SFLOAT"));
    }

    #[test]
    fn test_element_size_rounds_to_power_of_two() {
        assert_eq!(element_size(vk::Format::R8_UINT).unwrap(), 1);
        assert_eq!(element_size(vk::Format::R8G8B8_SINT).unwrap(), 4);
        assert_eq!(element_size(vk::Format::D32_SFLOAT_S8_UINT).unwrap(), 8);
        assert_eq!(element_size(vk::Format::R32G32B32A32_SFLOAT).unwrap(), 16);
        assert_eq!(component_count(vk::Format::R8G8B8A8_UNORM).unwrap(), 4);
        assert!(element_size(vk::Format::BC1_RGB_UNORM_BLOCK).is_err());
    }

    #[test]
    fn test_total_elements() {
        assert_eq!(total_elements(&[]), 1);
        assert_eq!(total_elements(&[1, 8, 8, 4]), 256);
        assert_eq!(total_elements(&[2, 0, 3]), 0);
    }
}
