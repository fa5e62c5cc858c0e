use std::ffi::CStr;

use anyhow::Context;
use ash::vk;
use itertools::Itertools;

use crate::commands::command_queue::GfxQueueFamily;
use crate::foundation::debug_messenger::DebugType;

/// ash 0.38 尚未收录该扩展
pub const SHADER_REPLICATED_COMPOSITES_NAME: &CStr = c"VK_EXT_shader_replicated_composites";

/// 可选的 device extensions，受支持且没有被禁用时才会开启
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GfxOptionalExts {
    pub custom_border_color: bool,
    pub frame_boundary: bool,
    pub maintenance5: bool,
    pub deferred_host_operations: bool,
    pub replicated_composites: bool,
}
impl GfxOptionalExts {
    /// `supported` 中存在、且不在 `disabled` 中的扩展才会被开启
    pub fn detect(supported: &[&str], disabled: &[String]) -> Self {
        let has_ext = |name: &CStr| {
            let name = name.to_str().unwrap_or_default();
            !disabled.iter().any(|d| d == name) && supported.contains(&name)
        };
        Self {
            custom_border_color: has_ext(ash::ext::custom_border_color::NAME),
            frame_boundary: has_ext(ash::ext::frame_boundary::NAME),
            maintenance5: has_ext(ash::khr::maintenance5::NAME),
            deferred_host_operations: has_ext(ash::khr::deferred_host_operations::NAME),
            replicated_composites: has_ext(SHADER_REPLICATED_COMPOSITES_NAME),
        }
    }

    /// 需要额外开启的 device extensions
    pub fn extension_names(&self) -> Vec<&'static CStr> {
        let mut exts = vec![];
        if self.custom_border_color {
            exts.push(ash::ext::custom_border_color::NAME);
        }
        if self.frame_boundary {
            exts.push(ash::ext::frame_boundary::NAME);
        }
        if self.maintenance5 {
            exts.push(ash::khr::maintenance5::NAME);
        }
        if self.deferred_host_operations {
            exts.push(ash::khr::deferred_host_operations::NAME);
        }
        if self.replicated_composites {
            exts.push(SHADER_REPLICATED_COMPOSITES_NAME);
        }
        exts
    }
}

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) mem_props: vk::PhysicalDeviceMemoryProperties,

    /// 当前 gpu 支持的 1.1 / 1.2 features，用于按需开启 8bit / 16bit 访问
    pub(crate) features11: vk::PhysicalDeviceVulkan11Features<'static>,
    pub(crate) features12: vk::PhysicalDeviceVulkan12Features<'static>,

    pub(crate) optional_exts: GfxOptionalExts,

    pub(crate) compute_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 优先选择独立显卡，其次集成显卡，最后是其他类型
    pub fn new_preferred_physical_device(
        instance: &ash::Instance,
        disabled_exts: &[String],
    ) -> anyhow::Result<Self> {
        let pdevices = unsafe { instance.enumerate_physical_devices() }.context("枚举 physical device 失败")?;
        let pdevice = pdevices
            .into_iter()
            .max_by_key(|pdevice| {
                let props = unsafe { instance.get_physical_device_properties(*pdevice) };
                Self::device_type_priority(props.device_type)
            })
            .context("没有可用的 physical device")?;

        Self::new(pdevice, instance, disabled_exts)
    }

    fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance, disabled_exts: &[String]) -> anyhow::Result<Self> {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            log::info!(
                "Device: {:?}, Type: {:?}, Vendor: 0x{:04x}",
                basic_props.device_name_as_c_str().unwrap_or_default(),
                basic_props.device_type,
                basic_props.vendor_id
            );

            let mut features11 = vk::PhysicalDeviceVulkan11Features::default();
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
            {
                let mut features2 =
                    vk::PhysicalDeviceFeatures2::default().push_next(&mut features11).push_next(&mut features12);
                instance.get_physical_device_features2(pdevice, &mut features2);
            }
            features11.p_next = std::ptr::null_mut();
            features12.p_next = std::ptr::null_mut();

            // 找到当前 gpu 支持的 extensions，并打印出来
            let device_extensions =
                instance.enumerate_device_extension_properties(pdevice).context("查询 device 扩展失败")?;
            let device_extension_strs = device_extensions
                .iter()
                .filter_map(|ext| ext.extension_name_as_c_str().ok())
                .filter_map(|name| name.to_str().ok())
                .collect_vec();
            log::debug!("physical device supports extensions: {}", device_extension_strs.iter().join("\n"));

            let optional_exts = GfxOptionalExts::detect(&device_extension_strs, disabled_exts);
            log::info!("optional device extensions: {:?}", optional_exts);

            // 找到所有的队列信息
            let queue_familiy_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_familiy_props);

            // 找到符合条的 queue family
            let find_queue_family = |name: String, include_flags: vk::QueueFlags| {
                queue_familiy_props
                    .iter()
                    .enumerate()
                    .find(|(_, props)| props.queue_flags.contains(include_flags))
                    .map(|(family_idx, props)| GfxQueueFamily {
                        name,
                        queue_family_index: family_idx as u32,
                        queue_flags: props.queue_flags,
                        queue_count: props.queue_count,
                    })
            };
            let compute_queue_family = find_queue_family("compute".to_string(), vk::QueueFlags::COMPUTE)
                .context("Cannot find queue index")?;

            Ok(Self {
                vk_handle: pdevice,
                basic_props,
                mem_props: instance.get_physical_device_memory_properties(pdevice),
                features11,
                features12,
                optional_exts,
                compute_queue_family,
            })
        }
    }

    pub fn destroy(self) {
        // 无需销毁
    }

    fn device_type_priority(device_type: vk::PhysicalDeviceType) -> u32 {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 5,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 4,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 3,
            vk::PhysicalDeviceType::CPU => 2,
            _ => 1,
        }
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn mem_props(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.mem_props
    }

    #[inline]
    pub fn optional_exts(&self) -> &GfxOptionalExts {
        &self.optional_exts
    }

    /// 一个 timestamp tick 对应的纳秒数
    #[inline]
    pub fn timestamp_period(&self) -> f32 {
        self.basic_props.limits.timestamp_period
    }

    #[inline]
    pub fn compute_queue_family(&self) -> &GfxQueueFamily {
        &self.compute_queue_family
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_exts_honor_disabled_list() {
        let supported = ["VK_EXT_frame_boundary", "VK_EXT_custom_border_color", "VK_KHR_maintenance5"];
        let disabled = vec!["VK_EXT_custom_border_color".to_string()];
        let exts = GfxOptionalExts::detect(&supported, &disabled);

        assert!(exts.frame_boundary);
        assert!(exts.maintenance5);
        assert!(!exts.custom_border_color);
        assert!(!exts.deferred_host_operations);
        assert_eq!(exts.extension_names().len(), 2);
    }

    #[test]
    fn test_discrete_gpu_preferred() {
        assert!(
            GfxPhysicalDevice::device_type_priority(vk::PhysicalDeviceType::DISCRETE_GPU)
                > GfxPhysicalDevice::device_type_priority(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            GfxPhysicalDevice::device_type_priority(vk::PhysicalDeviceType::CPU)
                > GfxPhysicalDevice::device_type_priority(vk::PhysicalDeviceType::OTHER)
        );
    }
}
