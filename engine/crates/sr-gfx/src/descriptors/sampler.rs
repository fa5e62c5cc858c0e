use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

#[derive(Clone, Copy)]
pub struct GfxSamplerCreateInfo {
    pub min_filter: vk::Filter,
    pub mag_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    /// u v w 三个方向使用同一个 address mode
    pub address_mode: vk::SamplerAddressMode,
    pub border_color: vk::BorderColor,
    /// 仅当 `border_color` 为 `FLOAT_CUSTOM_EXT` / `INT_CUSTOM_EXT` 时使用
    pub custom_border_color: vk::ClearColorValue,
    pub mip_levels: u32,
}

impl Default for GfxSamplerCreateInfo {
    fn default() -> Self {
        Self {
            min_filter: vk::Filter::LINEAR,
            mag_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            custom_border_color: vk::ClearColorValue::default(),
            mip_levels: 1,
        }
    }
}

impl GfxSamplerCreateInfo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_custom_border_color(&self) -> bool {
        self.border_color == vk::BorderColor::FLOAT_CUSTOM_EXT || self.border_color == vk::BorderColor::INT_CUSTOM_EXT
    }

    /// max lod 由 mip 数量决定
    #[inline]
    pub fn max_lod(&self) -> f32 {
        self.mip_levels.saturating_sub(1) as f32
    }

    fn create_info(&self) -> vk::SamplerCreateInfo<'static> {
        vk::SamplerCreateInfo::default()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .mipmap_mode(self.mipmap_mode)
            .address_mode_u(self.address_mode)
            .address_mode_v(self.address_mode)
            .address_mode_w(self.address_mode)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(self.border_color)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::NEVER)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(self.max_lod())
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,
}
impl DebugType for GfxSampler {
    fn debug_type_name() -> &'static str {
        "GfxSampler"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_sampler(self.handle, None);
        }
    }
}

impl GfxSampler {
    /// 自定义 border color 需要 `VK_EXT_custom_border_color`，不支持时返回 `ERROR_EXTENSION_NOT_PRESENT`
    pub fn new(info: &GfxSamplerCreateInfo, debug_name: &str) -> VkResult<Self> {
        let gfx = Gfx::get();
        let gfx_device = gfx.gfx_device();

        let mut custom_border_info = vk::SamplerCustomBorderColorCreateInfoEXT::default()
            .custom_border_color(info.custom_border_color)
            .format(vk::Format::UNDEFINED);
        let mut create_info = info.create_info();
        if info.is_custom_border_color() {
            if !gfx.optional_exts().custom_border_color {
                log::error!("custom border color requires {:?}", ash::ext::custom_border_color::NAME);
                return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
            }
            create_info = create_info.push_next(&mut custom_border_info);
        }

        let handle = unsafe { gfx_device.create_sampler(&create_info, None)? };
        let sampler = Self { handle };
        gfx_device.set_debug_name(&sampler, debug_name);
        Ok(sampler)
    }

    /// getter
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_lod_follows_mips() {
        let mut info = GfxSamplerCreateInfo::new();
        assert_eq!(info.max_lod(), 0.0);
        info.mip_levels = 4;
        assert_eq!(info.max_lod(), 3.0);
        assert_eq!(info.create_info().max_lod, 3.0);
    }

    #[test]
    fn test_custom_border_color_detection() {
        let mut info = GfxSamplerCreateInfo::new();
        assert!(!info.is_custom_border_color());
        info.border_color = vk::BorderColor::INT_CUSTOM_EXT;
        assert!(info.is_custom_border_color());
    }
}
