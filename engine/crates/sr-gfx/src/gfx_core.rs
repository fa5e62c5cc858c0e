use std::rc::Rc;

use anyhow::Context;
use ash::vk;

use crate::{
    commands::command_queue::GfxCommandQueue,
    foundation::{
        debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
};

pub struct GfxCore {
    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,

    pub(crate) instance: GfxInstance,
    pub(crate) physical_device: GfxPhysicalDevice,

    /// 使用 Rc<> 的时机：在 Gfx 内部的对象，可以通过 Rc 去访问 GfxDevice
    pub(crate) gfx_device: Rc<GfxDevice>,

    /// 只有开启 GPU debug marker 时才会创建
    pub(crate) debug_utils: Option<GfxDebugMsger>,

    /// 唯一的 compute queue，所有的命令都提交到这里
    pub(crate) compute_queue: GfxCommandQueue,
}

// 创建与销毁
impl GfxCore {
    pub fn new(
        app_name: &str,
        engine_name: &str,
        enable_debug_utils: bool,
        disabled_exts: &[String],
    ) -> anyhow::Result<Self> {
        let vk_pf = unsafe { ash::Entry::load() }.context("Failed to load vulkan entry")?;
        let instance = GfxInstance::new(&vk_pf, app_name, engine_name, enable_debug_utils)?;
        let physical_device = GfxPhysicalDevice::new_preferred_physical_device(instance.ash_instance(), disabled_exts)?;

        // 只使用一个 compute queue
        let queue_priorities = [1.0];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(physical_device.compute_queue_family.queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device = Rc::new(
            GfxDevice::new(&instance.ash_instance, &physical_device, &queue_create_infos, enable_debug_utils)
                .context("创建 vk device 失败")?,
        );
        let compute_queue = GfxCommandQueue {
            vk_queue: unsafe { device.get_device_queue(physical_device.compute_queue_family.queue_family_index, 0) },
            queue_family: physical_device.compute_queue_family.clone(),
            gfx_device: device.clone(),
        };

        let debug_utils = if enable_debug_utils {
            Some(GfxDebugMsger::new(&vk_pf, &instance.ash_instance).context("创建 debug messenger 失败")?)
        } else {
            None
        };

        log::info!("compute queue's queue family:\n{:#?}", compute_queue.queue_family);

        // 在 device 以及 debug_utils 之前创建的 vk::Handle
        {
            device.set_object_debug_name(instance.vk_instance(), "GfxInstance");
            device.set_object_debug_name(physical_device.vk_handle, "GfxPhysicalDevice");

            device.set_object_debug_name(device.vk_handle(), "GfxDevice");
            device.set_debug_name(&compute_queue, "compute");
        }

        Ok(Self {
            vk_entry: vk_pf,
            instance,
            physical_device,
            gfx_device: device,
            debug_utils,
            compute_queue,
        })
    }

    pub fn destroy(self) {
        if let Some(debug_utils) = self.debug_utils {
            debug_utils.destroy();
        }
        self.gfx_device.destroy();
        self.physical_device.destroy();
        self.instance.destroy();
        drop(self.vk_entry);
    }
}
