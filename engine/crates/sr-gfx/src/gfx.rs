use anyhow::Context;
use ash::prelude::VkResult;
use ash::vk;

use crate::gfx_core::GfxCore;
use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        fence::GfxFence, submit_info::GfxSubmitInfo,
    },
    foundation::{
        device::GfxDevice,
        instance::GfxInstance,
        mem_allocator::GfxMemAllocator,
        physical_device::{GfxOptionalExts, GfxPhysicalDevice},
    },
};

/// Gfx 初始化参数
#[derive(Clone, Debug, Default)]
pub struct GfxInitInfo {
    pub app_name: String,
    /// 开启 debug utils：debug label，object name，validation 信息
    pub enable_gpu_debug_markers: bool,
    /// 即使受支持也不开启的可选 device extension
    pub disabled_extensions: Vec<String>,
}

/// Vulkan 上下文单例
///
/// 管理所有 Vulkan 核心资源，包括实例、设备、队列、内存分配器等。
/// 采用单例模式简化参数传递和生命周期管理，仅适用于单线程环境。
///
/// # 初始化流程
/// ```ignore
/// Gfx::init(GfxInitInfo { app_name: "Scenario-Runner".to_string(), ..Default::default() })?;
/// let device = Gfx::get().gfx_device();
/// // 使用...
/// Gfx::destroy();
/// ```
pub struct Gfx {
    pub(crate) gfx_core: GfxCore,
    pub(crate) allocator: GfxMemAllocator,

    /// 临时的 compute command pool，用于 one-time 命令
    pub(crate) temp_compute_command_pool: GfxCommandPool,

    pub(crate) enable_gpu_debug_markers: bool,
}

// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "Scenario-Runner";

    fn new(init_info: &GfxInitInfo) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("Gfx::new");
        let gfx_core = GfxCore::new(
            &init_info.app_name,
            Self::ENGINE_NAME,
            init_info.enable_gpu_debug_markers,
            &init_info.disabled_extensions,
        )?;

        // 注意：在初始化过程中，我们需要使用传统的参数传递方式
        // 因为 Gfx 单例还没有被初始化
        let temp_pool = GfxCommandPool::new_internal(
            gfx_core.gfx_device.clone(),
            gfx_core.physical_device.compute_queue_family.clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "gfx-temp-compute",
        )
        .context("创建临时 command pool 失败")?;

        let allocator = GfxMemAllocator::new(
            &gfx_core.instance.ash_instance,
            gfx_core.physical_device.vk_handle,
            &gfx_core.gfx_device,
        )
        .context("创建 vk-mem allocator 失败")?;

        Ok(Self {
            gfx_core,
            allocator,
            temp_compute_command_pool: temp_pool,
            enable_gpu_debug_markers: init_info.enable_gpu_debug_markers,
        })
    }
}

// 注意：此静态变量仅用于单线程环境
static mut G_GFX: Option<Gfx> = None;

// 单例模式
// - Gfx 自身的生命周期管理比较简单，因此适合使用单例模式
// - 让代码变得简单，不再需要考虑复杂的借用规则
// - 其他类的类型签名也会变得更简单
impl Gfx {
    /// 获取单例实例
    ///
    /// # Panics
    /// 如果 Gfx 还未初始化，此方法会 panic
    #[inline]
    pub fn get() -> &'static Gfx {
        unsafe {
            // 使用 addr_of! 避免直接对 static mut 创建引用，编译器不允许这种行为
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).as_ref().expect("Gfx not initialized. Call Gfx::init() first.")
        }
    }

    /// 是否已经初始化
    #[inline]
    pub fn is_initialized() -> bool {
        unsafe {
            let ptr = std::ptr::addr_of!(G_GFX);
            (*ptr).is_some()
        }
    }

    /// 初始化 Gfx 单例，重复初始化会返回错误
    pub fn init(init_info: &GfxInitInfo) -> anyhow::Result<()> {
        anyhow::ensure!(!Self::is_initialized(), "Gfx already initialized");
        // span! 需要一个正在运行的 client
        tracy_client::Client::start();
        let gfx = Self::new(init_info)?;
        unsafe {
            // 使用 addr_of_mut! 避免直接对 static mut 创建可变引用
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            *ptr = Some(gfx);
        }
        Ok(())
    }

    /// 销毁 Gfx 单例
    ///
    /// 调用此方法后，不应再使用 Gfx::get()
    pub fn destroy() {
        let gfx = unsafe {
            let ptr = std::ptr::addr_of_mut!(G_GFX);
            (*ptr).take()
        };
        let Some(gfx) = gfx else {
            log::warn!("Gfx::destroy called before Gfx::init");
            return;
        };

        if let Err(e) = gfx.gfx_core.gfx_device.wait_idle() {
            log::error!("device wait idle failed: {:?}", e);
        }
        gfx.allocator.destroy();
        gfx.temp_compute_command_pool.destroy_internal(&gfx.gfx_core.gfx_device);
        gfx.gfx_core.destroy();
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.gfx_core.instance
    }

    #[inline]
    pub fn gfx_device(&self) -> &GfxDevice {
        &self.gfx_core.gfx_device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.gfx_core.physical_device
    }

    #[inline]
    pub fn compute_queue(&self) -> &GfxCommandQueue {
        &self.gfx_core.compute_queue
    }

    #[inline]
    pub fn optional_exts(&self) -> &GfxOptionalExts {
        self.gfx_core.physical_device.optional_exts()
    }

    #[inline]
    pub fn gpu_debug_markers_enabled(&self) -> bool {
        self.enable_gpu_debug_markers
    }

    /// 一个 timestamp tick 对应的纳秒数
    #[inline]
    pub fn timestamp_period(&self) -> f32 {
        self.gfx_core.physical_device.timestamp_period()
    }
}

// tools
impl Gfx {
    #[inline]
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance()
                .ash_instance
                .get_physical_device_format_properties(self.physical_device().vk_handle, format)
        }
    }

    /// 查询某个 tiling 下的 image format properties，不支持时返回 Err
    pub fn image_format_properties(
        &self,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
    ) -> VkResult<vk::ImageFormatProperties> {
        unsafe {
            self.instance().ash_instance.get_physical_device_image_format_properties(
                self.physical_device().vk_handle,
                format,
                vk::ImageType::TYPE_2D,
                tiling,
                usage,
                vk::ImageCreateFlags::empty(),
            )
        }
    }

    /// 第一个同时满足 type bits 以及 property flags 的 memory type
    pub fn find_memory_type_index(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> Option<u32> {
        find_memory_type_index(self.physical_device().mem_props(), type_bits, flags)
    }

    /// 立即执行某个 command，并同步等待执行结果
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> VkResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let command_buffer =
            GfxCommandBuffer::new(&self.temp_compute_command_pool, &format!("one-time-{}", name.as_ref()))?;
        let fence = GfxFence::new(&format!("one-time-{}", name.as_ref()))?;
        let free = scopeguard::guard((command_buffer.clone(), fence.clone()), |(cmd, fence)| {
            self.temp_compute_command_pool.free_command_buffers(vec![cmd]);
            fence.destroy();
        });

        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref())?;
        let result = func(&command_buffer);
        command_buffer.end()?;

        self.compute_queue().submit(vec![GfxSubmitInfo::new(&[command_buffer])], Some(&fence))?;
        fence.wait()?;
        drop(free);

        Ok(result)
    }

    #[inline]
    pub fn wait_idle(&self) -> VkResult<()> {
        self.gfx_device().wait_idle()
    }
}

/// 第一个 bit 在 `type_bits` 中、且 property flags 包含 `flags` 的 memory type
pub fn find_memory_type_index(
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    mem_props.memory_types[..mem_props.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            (1 << index) & type_bits != 0 && memory_type.property_flags.contains(flags)
        })
        .map(|(index, _)| index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_props(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: flags.len() as u32,
            ..Default::default()
        };
        for (i, f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = *f;
        }
        props
    }

    #[test]
    fn test_find_memory_type_index() {
        let props = mem_props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        assert_eq!(find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE), Some(1));
        assert_eq!(find_memory_type_index(&props, 0b100, vk::MemoryPropertyFlags::HOST_VISIBLE), Some(2));
        assert_eq!(find_memory_type_index(&props, 0b001, vk::MemoryPropertyFlags::HOST_VISIBLE), None);
        assert_eq!(find_memory_type_index(&props, u32::MAX, vk::MemoryPropertyFlags::empty()), Some(0));
    }
}
