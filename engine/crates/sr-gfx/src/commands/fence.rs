use std::time::Duration;

use ash::prelude::VkResult;
use ash::vk;

use crate::{foundation::debug_messenger::DebugType, gfx::Gfx};

/// 等待 GPU 时，每隔这么久输出一次仍在等待的日志
pub const FENCE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// # Destroy
/// 可以 Clone，需要手动 destroy
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
    debug_name: String,
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// 创建与销毁
impl GfxFence {
    /// 创建时处于 unsignaled 状态，第一次提交前不需要 reset
    pub fn new(debug_name: &str) -> VkResult<Self> {
        let gfx_device = Gfx::get().gfx_device();
        let fence = unsafe { gfx_device.create_fence(&vk::FenceCreateInfo::default(), None)? };

        let fence = Self {
            fence,
            debug_name: debug_name.to_string(),
        };
        gfx_device.set_debug_name(&fence, debug_name);
        Ok(fence)
    }

    #[inline]
    pub fn destroy(self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            gfx_device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

// 同步
impl GfxFence {
    /// 超时返回 `Ok(false)`
    pub fn wait_timeout(&self, timeout: Duration) -> VkResult<bool> {
        let gfx_device = Gfx::get().gfx_device();
        match unsafe { gfx_device.wait_for_fences(std::slice::from_ref(&self.fence), true, timeout_nanos(timeout)) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 阻塞直到 signaled，dispatch 耗时较长时定期输出等待时间
    pub fn wait(&self) -> VkResult<()> {
        let waited = poll_until_signaled(
            |interval| self.wait_timeout(interval),
            FENCE_POLL_INTERVAL,
            |elapsed| log::warn!("still waiting for {} after {:?}", self.debug_name, elapsed),
        )?;
        if waited > 0 {
            log::info!("{} signaled after {} polls", self.debug_name, waited + 1);
        }
        Ok(())
    }

    #[inline]
    pub fn reset(&self) -> VkResult<()> {
        let gfx_device = Gfx::get().gfx_device();
        unsafe { gfx_device.reset_fences(std::slice::from_ref(&self.fence)) }
    }

    /// 等待完成后 reset，fence 可以直接用于下一次提交
    pub fn wait_and_reset(&self) -> VkResult<()> {
        self.wait()?;
        self.reset()
    }

    /// 不阻塞地查询 fence 的状态
    #[inline]
    pub fn is_signaled(&self) -> VkResult<bool> {
        unsafe { Gfx::get().gfx_device().get_fence_status(self.fence) }
    }
}

/// `vkWaitForFences` 的超时以纳秒计，超出 u64 时视为无限等待
#[inline]
fn timeout_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// 以 `interval` 为超时反复调用 `wait`，直到返回 true
///
/// 每次超时调用一次 `on_pending`，参数是累计的等待时间；返回超时的次数
fn poll_until_signaled(
    mut wait: impl FnMut(Duration) -> VkResult<bool>,
    interval: Duration,
    mut on_pending: impl FnMut(Duration),
) -> VkResult<u32> {
    let mut timeouts = 0;
    while !wait(interval)? {
        timeouts += 1;
        on_pending(interval * timeouts);
    }
    Ok(timeouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_nanos() {
        assert_eq!(timeout_nanos(Duration::from_millis(3)), 3_000_000);
        assert_eq!(timeout_nanos(Duration::ZERO), 0);
        assert_eq!(timeout_nanos(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_poll_until_signaled() {
        let mut remaining = 2;
        let mut pending = vec![];
        let timeouts = poll_until_signaled(
            |_| {
                remaining -= 1;
                Ok(remaining < 0)
            },
            Duration::from_secs(5),
            |elapsed| pending.push(elapsed),
        )
        .unwrap();
        assert_eq!(timeouts, 2);
        assert_eq!(pending, vec![Duration::from_secs(5), Duration::from_secs(10)]);

        let timeouts = poll_until_signaled(|_| Ok(true), Duration::from_secs(5), |_| unreachable!()).unwrap();
        assert_eq!(timeouts, 0);
    }

    #[test]
    fn test_poll_stops_on_device_lost() {
        let mut calls = 0;
        let result = poll_until_signaled(
            |_| {
                calls += 1;
                if calls == 1 { Ok(false) } else { Err(vk::Result::ERROR_DEVICE_LOST) }
            },
            Duration::from_millis(1),
            |_| {},
        );
        assert_eq!(result, Err(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(calls, 2);
    }
}
