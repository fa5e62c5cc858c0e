use std::collections::HashSet;
use std::ffi::{CStr, CString, c_char};

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::foundation::debug_messenger::GfxDebugMsger;

pub struct GfxInstance {
    /// 仅仅是函数指针，以及一个裸的 handle，可以随意 clone
    pub(crate) ash_instance: ash::Instance,
}

// 创建与销毁
impl GfxInstance {
    /// 设置所需的 extensions，创建 vk instance
    ///
    /// 开启 debug utils 时，同时为 instance 挂上 debug messenger 的创建信息
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: &str,
        engine_name: &str,
        enable_debug_utils: bool,
    ) -> anyhow::Result<Self> {
        let app_name = CString::new(app_name).context("app name 中包含 \\0")?;
        let engine_name = CString::new(engine_name).context("engine name 中包含 \\0")?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_ref())
            .application_version(1)
            .engine_name(engine_name.as_ref())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, enable_debug_utils)?;
        // 多行输出到一个字符串
        let mut enabled_extensions_str = String::new();
        for ext in &enabled_extensions {
            enabled_extensions_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance extensions: {}", enabled_extensions_str);

        let mut instance_ci = vk::InstanceCreateInfo::default().application_info(&app_info);
        instance_ci = instance_ci.enabled_extension_names(&enabled_extensions);

        // 为 instance info 添加 debug messenger
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        if enable_debug_utils {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None) }.context("创建 vk instance 失败")?;

        Ok(Self { ash_instance: handle })
    }

    pub fn destroy(self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 构造过程
impl GfxInstance {
    /// instance 所需的，且受支持的 extension
    fn get_extensions(vk_entry: &ash::Entry, enable_debug_utils: bool) -> anyhow::Result<Vec<*const c_char>> {
        let all_ext_props =
            unsafe { vk_entry.enumerate_instance_extension_properties(None) }.context("查询 instance 扩展失败")?;
        let mut enabled_extensions: HashSet<&'static CStr> = HashSet::new();

        // 检查某个 instance ext 并启用
        let mut enable_ext = |ext: &'static CStr| -> anyhow::Result<()> {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| supported_ext.extension_name_as_c_str().is_ok_and(|name| name == ext));
            anyhow::ensure!(supported, "Required instance extensions ({:?}) are missing", ext);
            enabled_extensions.insert(ext);
            Ok(())
        };

        // debug utils 只在需要 GPU debug marker 时启用：
        // 1. debug messenger
        // 2. 为 vulkan object 设置 debug name
        // 3. 使用 label 标记 command buffer 中的一个一个 section
        if enable_debug_utils {
            enable_ext(vk::EXT_DEBUG_UTILS_NAME)?;
        }

        Ok(enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec())
    }
}
