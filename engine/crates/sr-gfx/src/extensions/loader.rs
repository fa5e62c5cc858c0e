use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;

/// 通过 `vkGetDeviceProcAddr` 加载一个 device 级别的函数指针
///
/// # Safety
/// `F` 必须是与 `name` 对应的 `unsafe extern "system" fn` 类型
pub(crate) unsafe fn load_device_fn<F: Copy>(instance: &ash::Instance, device: vk::Device, name: &CStr) -> VkResult<F> {
    debug_assert_eq!(size_of::<F>(), size_of::<unsafe extern "system" fn()>());

    let fp = unsafe { instance.get_device_proc_addr(device, name.as_ptr()) };
    match fp {
        Some(fp) => Ok(unsafe { std::mem::transmute_copy::<unsafe extern "system" fn(), F>(&fp) }),
        None => {
            log::error!("failed to load device function: {:?}", name);
            Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT)
        }
    }
}

/// 为 non-dispatchable handle 生成类型
macro_rules! arm_handle {
    ($(#[$meta:meta])* $name:ident, $object_type:expr) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Debug)]
        pub struct $name(u64);

        impl ash::vk::Handle for $name {
            const TYPE: ash::vk::ObjectType = $object_type;

            fn as_raw(self) -> u64 {
                self.0
            }

            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl $name {
            #[inline]
            pub const fn null() -> Self {
                Self(0)
            }
        }
    };
}
pub(crate) use arm_handle;
