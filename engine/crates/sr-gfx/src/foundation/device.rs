use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::ops::Deref;

use ash::prelude::VkResult;
use ash::vk;
use itertools::Itertools;

use crate::extensions::arm_data_graph::{self, DataGraphDevice, PhysicalDeviceDataGraphFeaturesARM};
use crate::extensions::arm_tensors::{self, PhysicalDeviceTensorFeaturesARM, TensorsDevice};
use crate::foundation::debug_messenger::DebugType;
use crate::foundation::physical_device::GfxPhysicalDevice;

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及各种扩展的函数指针。
/// 这些函数指针在应用生命周期中保持不变，可以安全共享。
///
/// # 扩展支持
/// - Tensors (ARM)
/// - Data Graph (ARM)
/// - Debug Utils (EXT)，仅在开启 GPU debug marker 时存在
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// tensor 扩展 API
    pub(crate) tensors: TensorsDevice,
    /// data graph 扩展 API
    pub(crate) data_graph: DataGraphDevice,
    /// 调试工具扩展 API
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(
        instance: &ash::Instance,
        pdevice: &GfxPhysicalDevice,
        queue_create_info: &[vk::DeviceQueueCreateInfo],
        enable_debug_utils: bool,
    ) -> VkResult<Self> {
        let _span = tracy_client::span!("GfxDevice::new");

        // device 所需的所有 extension
        let device_exts = Self::basic_device_exts()
            .into_iter()
            .chain(pdevice.optional_exts.extension_names())
            .map(|e| e.as_ptr())
            .collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        // device 所需的所有 features
        let mut all_features = vk::PhysicalDeviceFeatures2::default().features(Self::physical_device_basic_features());
        let mut physical_device_ext_features = Self::physical_device_extra_features(pdevice);
        unsafe {
            physical_device_ext_features.iter_mut().for_each(|f| {
                let ptr = <*mut dyn vk::ExtendsPhysicalDeviceFeatures2>::cast::<vk::BaseOutStructure>(f.as_mut());
                (*ptr).p_next = all_features.p_next as _;
                all_features.p_next = ptr as _;
            });
        }

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_info)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.create_device(pdevice.vk_handle, &device_create_info, None)? };

        let load_exts = || -> VkResult<(TensorsDevice, DataGraphDevice)> {
            Ok((TensorsDevice::new(instance, &device)?, DataGraphDevice::new(instance, &device)?))
        };
        let (tensors, data_graph) = match load_exts() {
            Ok(exts) => exts,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };
        let debug_utils = enable_debug_utils.then(|| ash::ext::debug_utils::Device::new(instance, &device));

        Ok(Self {
            device,
            tensors,
            data_graph,
            debug_utils,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        })
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default().shader_int16(true).shader_int64(true)
    }

    /// 必要的 physical device extension features
    ///
    /// 8bit / 16bit 访问以及 float16 按照 gpu 的实际支持情况开启
    fn physical_device_extra_features(pdevice: &GfxPhysicalDevice) -> Vec<Box<dyn vk::ExtendsPhysicalDeviceFeatures2>> {
        let avail11 = &pdevice.features11;
        let avail12 = &pdevice.features12;

        let mut features: Vec<Box<dyn vk::ExtendsPhysicalDeviceFeatures2>> = vec![
            Box::new(
                vk::PhysicalDeviceVulkan11Features::default()
                    .storage_buffer16_bit_access(avail11.storage_buffer16_bit_access == vk::TRUE)
                    .uniform_and_storage_buffer16_bit_access(
                        avail11.uniform_and_storage_buffer16_bit_access == vk::TRUE,
                    ),
            ),
            Box::new(
                vk::PhysicalDeviceVulkan12Features::default()
                    .host_query_reset(true)
                    .storage_buffer8_bit_access(true)
                    .uniform_and_storage_buffer8_bit_access(avail12.uniform_and_storage_buffer8_bit_access == vk::TRUE)
                    .shader_int8(true)
                    .shader_float16(avail12.shader_float16 == vk::TRUE)
                    .vulkan_memory_model(true)
                    .vulkan_memory_model_device_scope(avail12.vulkan_memory_model_device_scope == vk::TRUE),
            ),
            Box::new(
                vk::PhysicalDeviceVulkan13Features::default()
                    .synchronization2(true)
                    .maintenance4(true)
                    .pipeline_creation_cache_control(true),
            ),
            Box::new(PhysicalDeviceTensorFeaturesARM {
                shader_tensor_access: vk::TRUE,
                tensors: vk::TRUE,
                ..Default::default()
            }),
            Box::new(PhysicalDeviceDataGraphFeaturesARM {
                data_graph: vk::TRUE,
                ..Default::default()
            }),
        ];

        if pdevice.optional_exts.custom_border_color {
            features.push(Box::new(
                vk::PhysicalDeviceCustomBorderColorFeaturesEXT::default().custom_border_colors(true),
            ));
        }
        if pdevice.optional_exts.frame_boundary {
            features.push(Box::new(vk::PhysicalDeviceFrameBoundaryFeaturesEXT::default().frame_boundary(true)));
        }

        features
    }

    /// 必要的 device extensions
    fn basic_device_exts() -> Vec<&'static CStr> {
        vec![arm_data_graph::NAME, arm_tensors::NAME, ash::khr::maintenance4::NAME]
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }
    #[inline]
    pub fn tensors(&self) -> &TensorsDevice {
        &self.tensors
    }
    #[inline]
    pub fn data_graph(&self) -> &DataGraphDevice {
        &self.data_graph
    }
    #[inline]
    pub fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_utils.as_ref()
    }
}

// tools
impl GfxDevice {
    /// 没有开启 debug utils 时什么都不做
    pub fn set_object_debug_name<T: vk::Handle>(&self, handle: T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name.as_ref()) else {
            log::warn!("invalid debug name: {}", name.as_ref());
            return;
        };
        let result = unsafe {
            debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {:?}", name, e);
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        self.set_object_debug_name(handle.vk_handle(), debug_name);
    }

    #[inline]
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}
