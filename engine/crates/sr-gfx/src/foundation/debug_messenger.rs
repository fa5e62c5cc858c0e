use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};

use ash::prelude::VkResult;
use ash::vk;

/// 从 validation layer 收到的 error 和 warning 数量，整个进程共用
static VALIDATION_ERRORS: AtomicU32 = AtomicU32::new(0);
static VALIDATION_WARNINGS: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidationCounts {
    pub errors: u32,
    pub warnings: u32,
}

impl ValidationCounts {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.warnings == 0
    }
}

/// 到目前为止 debug messenger 收到的 error / warning 数量
pub fn validation_counts() -> ValidationCounts {
    ValidationCounts {
        errors: VALIDATION_ERRORS.load(Ordering::Relaxed),
        warnings: VALIDATION_WARNINGS.load(Ordering::Relaxed),
    }
}

/// 将 validation 消息转发到 `log`，并统计 error / warning 的数量
///
/// 只在开启 GPU debug marker 时创建
pub struct GfxDebugMsger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

// 创建与销毁
impl GfxDebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> VkResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_entry, instance);
        let messenger = unsafe { loader.create_debug_utils_messenger(&Self::debug_utils_messenger_ci(), None)? };
        Ok(Self { loader, messenger })
    }

    /// 销毁 messenger，并输出这次运行中 validation 的统计
    pub fn destroy(self) {
        let counts = validation_counts();
        if counts.is_clean() {
            log::info!("no validation messages");
        } else {
            log::warn!("validation reported {} errors and {} warnings", counts.errors, counts.warnings);
        }
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }

    /// 同时用于 instance 的 pNext，以覆盖 instance 创建和销毁期间的消息
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// 计数并返回对应的 log level
fn record_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        VALIDATION_ERRORS.fetch_add(1, Ordering::Relaxed);
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        VALIDATION_WARNINGS.fetch_add(1, Ordering::Relaxed);
        log::Level::Warn
    } else {
        log::Level::Info
    }
}

/// 拼出输出到 log 的文本
///
/// 消息是 json 时，`MainMessage` 里带有换行，放到最后单独输出，其余字段格式化后放在前面
fn format_message(message_type: vk::DebugUtilsMessageTypeFlagsEXT, id_name: &str, msg: &str) -> String {
    let mut body = msg.to_string();
    let mut main_msg = String::new();
    if let Ok(serde_json::Value::Object(mut obj)) = serde_json::from_str::<serde_json::Value>(msg) {
        if let Some(serde_json::Value::String(main)) = obj.remove("MainMessage") {
            main_msg = main;
        }
        body = serde_json::to_string_pretty(&obj).unwrap_or(body);
    }
    format!("[{message_type:?}] {id_name}\n{body}\n{main_msg}\n")
}

unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };
    let msg = unsafe { callback_data.message_as_c_str() }.map(CStr::to_string_lossy).unwrap_or_default();
    let id_name = unsafe { callback_data.message_id_name_as_c_str() }.map(CStr::to_string_lossy).unwrap_or_default();

    let level = record_severity(message_severity);
    log::log!(level, "{}", format_message(message_type, &id_name, &msg));

    // 返回 TRUE 会让触发消息的调用失败，只有 layer 自身需要
    vk::FALSE
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_json_message() {
        let msg = r#"{"MessageID": 12, "MainMessage": "line 1\nline 2"}"#;
        let text = format_message(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, "VUID-x", msg);
        assert!(text.contains("VUID-x"));
        assert!(text.contains("\"MessageID\": 12"));
        assert!(!text.contains("MainMessage"));
        assert!(text.trim_end().ends_with("line 1\nline 2"));
    }

    #[test]
    fn test_format_plain_message() {
        let text = format_message(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "", "tensor aliasing is fine");
        assert!(text.contains("\ntensor aliasing is fine\n"));
    }

    #[test]
    fn test_record_severity() {
        let before = validation_counts();
        assert_eq!(record_severity(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), log::Level::Error);
        assert_eq!(record_severity(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), log::Level::Warn);
        assert_eq!(record_severity(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), log::Level::Info);

        // 其它测试可能并发地增加计数
        let after = validation_counts();
        assert!(after.errors > before.errors);
        assert!(after.warnings > before.warnings);
        assert!(!after.is_clean());
    }
}
