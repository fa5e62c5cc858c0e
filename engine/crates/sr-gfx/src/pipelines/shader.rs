use std::io::Cursor;

use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// SPIR-V 文件头的 magic number
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// SPIR-V header 固定为 5 个 word
const SPIRV_HEADER_WORDS: usize = 5;

/// 对 SPIR-V 做最基础的检查：长度以及 magic number
pub fn validate_spirv(code: &[u32]) -> bool {
    code.len() >= SPIRV_HEADER_WORDS && code[0] == SPIRV_MAGIC
}

/// # Destroy
///
/// drop 时自动销毁
pub struct GfxShaderModule {
    handle: vk::ShaderModule,
}
impl GfxShaderModule {
    /// 校验失败时返回 `ERROR_INVALID_SHADER_NV`
    pub fn from_code(code: &[u32], debug_name: &str) -> VkResult<Self> {
        if !validate_spirv(code) {
            log::error!("Failed to validate SPIR-V module: {}", debug_name);
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }

        let gfx_device = Gfx::get().gfx_device();
        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(code);
        let handle = unsafe { gfx_device.create_shader_module(&shader_module_info, None)? };
        let shader_module = Self { handle };
        gfx_device.set_debug_name(&shader_module, debug_name);
        Ok(shader_module)
    }

    /// 字节流需要满足 4 字节对齐的长度，否则视为非法的 SPIR-V
    pub fn from_bytes(bytes: &[u8], debug_name: &str) -> VkResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| {
            log::error!("Failed to read SPIR-V {}: {}", debug_name, e);
            vk::Result::ERROR_INVALID_SHADER_NV
        })?;
        Self::from_code(&code, debug_name)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        unsafe {
            Gfx::get().gfx_device().destroy_shader_module(self.handle, None);
        }
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_spirv() {
        assert!(validate_spirv(&[SPIRV_MAGIC, 0x0001_0600, 0, 8, 0]));
        assert!(!validate_spirv(&[SPIRV_MAGIC, 0x0001_0600]));
        assert!(!validate_spirv(&[0xdead_beef, 0, 0, 0, 0]));
        assert!(!validate_spirv(&[]));
    }
}
