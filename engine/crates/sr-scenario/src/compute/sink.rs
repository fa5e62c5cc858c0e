use ash::vk;
use sr_gfx::basic::color::LabelColor;
use sr_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier, GfxTensorBarrier};
use sr_gfx::commands::command_buffer::GfxCommandBuffer;
use sr_gfx::commands::command_pool::GfxCommandPool;
use sr_gfx::commands::command_queue::GfxFrameBoundary;
use sr_gfx::commands::fence::GfxFence;
use sr_gfx::commands::submit_info::GfxSubmitInfo;
use sr_gfx::extensions::arm_data_graph::DataGraphPipelineSessionARM;
use sr_gfx::gfx::Gfx;
use sr_gfx::query::query_pool::GfxQueryPool;

use crate::errors::{Result, ScenarioError};

/// 回放的目标
///
/// 没有处于录制状态的 command buffer 时，每个方法都返回 [`ScenarioError::NoCommandBuffer`]
pub trait CommandSink {
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) -> Result<()>;
    fn bind_descriptor_set(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set_index: u32,
        descriptor_set: vk::DescriptorSet,
    ) -> Result<()>;
    fn push_constants(&mut self, layout: vk::PipelineLayout, data: &[u8]) -> Result<()>;
    fn dispatch(&mut self, group_count: glam::UVec3) -> Result<()>;
    fn dispatch_data_graph(&mut self, session: DataGraphPipelineSessionARM) -> Result<()>;
    fn pipeline_barrier(
        &mut self,
        memory_barriers: &[vk::MemoryBarrier2],
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
        tensor_barriers: &[GfxTensorBarrier],
    ) -> Result<()>;
    /// 没有 query pool 时返回 [`ScenarioError::NoQueryPool`]
    fn write_timestamp(&mut self, stage: vk::PipelineStageFlags2, query: u32) -> Result<()>;
    /// 结束当前 command buffer 并带着 frame boundary 提交，等待完成后开始新的 command buffer
    fn mark_frame_boundary(&mut self, boundary: &GfxFrameBoundary) -> Result<()>;
    fn begin_label(&mut self, name: &str) -> Result<()>;
    fn end_label(&mut self) -> Result<()>;
}

/// 设备上的 command buffer、fence 和 timestamp query pool
///
/// 同一时刻最多只有一个 command buffer 处于录制状态
pub struct GfxCommandSink {
    command_pool: GfxCommandPool,
    fence: GfxFence,
    command_buffers: Vec<GfxCommandBuffer>,
    recording: bool,
    query_pool: Option<GfxQueryPool>,
}

// 创建与销毁
impl GfxCommandSink {
    pub fn new() -> Result<Self> {
        let queue_family = Gfx::get().compute_queue().queue_family().clone();
        let command_pool = GfxCommandPool::new(
            queue_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "scenario-command-pool",
        )?;
        let fence = GfxFence::new("scenario-fence")?;

        Ok(Self {
            command_pool,
            fence,
            command_buffers: vec![],
            recording: false,
            query_pool: None,
        })
    }

    /// 释放所有 command buffer 和 query pool，重建 fence
    pub fn reset(&mut self) -> Result<()> {
        self.command_pool.free_command_buffers(std::mem::take(&mut self.command_buffers));
        self.recording = false;
        self.query_pool = None;

        let fence = std::mem::replace(&mut self.fence, GfxFence::new("scenario-fence")?);
        fence.destroy();
        Ok(())
    }
}

impl Drop for GfxCommandSink {
    fn drop(&mut self) {
        if let Err(e) = Gfx::get().compute_queue().wait_idle() {
            log::error!("Failed to wait for compute queue: {e:?}");
        }
        self.command_pool.free_command_buffers(std::mem::take(&mut self.command_buffers));
        self.query_pool = None;
        self.fence.clone().destroy();
        self.command_pool.destroy();
    }
}

// command buffer
impl GfxCommandSink {
    /// 没有处于录制状态的 command buffer 时，分配一个新的并开始录制
    pub fn prepare_command_buffer(&mut self) -> Result<()> {
        if self.recording {
            return Ok(());
        }
        let name = format!("scenario-cmd-{}", self.command_buffers.len());
        let command_buffer = GfxCommandBuffer::new(&self.command_pool, &name)?;
        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &name)?;
        self.command_buffers.push(command_buffer);
        self.recording = true;
        Ok(())
    }

    pub fn command_buffer(&self) -> Result<&GfxCommandBuffer> {
        if !self.recording {
            return Err(ScenarioError::NoCommandBuffer);
        }
        self.command_buffers.last().ok_or(ScenarioError::NoCommandBuffer)
    }

    /// 结束录制并提交
    pub fn submit(&mut self) -> Result<()> {
        let command_buffer = self.command_buffer()?.clone();
        command_buffer.end()?;
        self.recording = false;

        Gfx::get().compute_queue().submit(vec![GfxSubmitInfo::new(&[command_buffer])], Some(&self.fence))?;
        Ok(())
    }

    /// 阻塞等待上一次提交完成，然后 reset fence
    pub fn wait(&self) -> Result<()> {
        Ok(self.fence.wait_and_reset()?)
    }
}

// query pool
impl GfxCommandSink {
    /// 创建可容纳 `query_count` 个 timestamp 的 query pool，替换已有的
    pub fn setup_query_pool(&mut self, query_count: u32) -> Result<()> {
        let query_pool = GfxQueryPool::new(vk::QueryType::TIMESTAMP, query_count, "scenario-timestamps")?;
        query_pool.reset_all();
        self.query_pool = Some(query_pool);
        Ok(())
    }

    #[inline]
    pub fn query_pool(&self) -> Option<&GfxQueryPool> {
        self.query_pool.as_ref()
    }

    #[inline]
    pub fn has_query_pool(&self) -> bool {
        self.query_pool.is_some()
    }

    /// host 端 reset 所有 query
    pub fn reset_query_pool(&self) {
        if let Some(query_pool) = &self.query_pool {
            query_pool.reset_all();
        }
    }

    pub fn query_timestamps(&self) -> Result<Vec<u64>> {
        let query_pool = self.query_pool.as_ref().ok_or(ScenarioError::NoQueryPool)?;
        Ok(query_pool.get_query_result_u64(0, query_pool.count())?)
    }
}

fn label_color(name: &str) -> glam::Vec4 {
    if name.starts_with("dispatch") {
        LabelColor::COLOR_DISPATCH
    } else if name.starts_with("barriers") {
        LabelColor::COLOR_BARRIER
    } else {
        LabelColor::COLOR_CMD
    }
}

impl CommandSink for GfxCommandSink {
    fn bind_pipeline(&mut self, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) -> Result<()> {
        self.command_buffer()?.cmd_bind_pipeline(bind_point, pipeline);
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set_index: u32,
        descriptor_set: vk::DescriptorSet,
    ) -> Result<()> {
        self.command_buffer()?.bind_descriptor_sets(bind_point, layout, set_index, &[descriptor_set], None);
        Ok(())
    }

    fn push_constants(&mut self, layout: vk::PipelineLayout, data: &[u8]) -> Result<()> {
        self.command_buffer()?.cmd_push_constants(layout, vk::ShaderStageFlags::COMPUTE, 0, data);
        Ok(())
    }

    fn dispatch(&mut self, group_count: glam::UVec3) -> Result<()> {
        self.command_buffer()?.cmd_dispatch(group_count);
        Ok(())
    }

    fn dispatch_data_graph(&mut self, session: DataGraphPipelineSessionARM) -> Result<()> {
        self.command_buffer()?.cmd_dispatch_data_graph(session);
        Ok(())
    }

    fn pipeline_barrier(
        &mut self,
        memory_barriers: &[vk::MemoryBarrier2],
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
        tensor_barriers: &[GfxTensorBarrier],
    ) -> Result<()> {
        self.command_buffer()?.pipeline_barrier(memory_barriers, image_barriers, buffer_barriers, tensor_barriers);
        Ok(())
    }

    fn write_timestamp(&mut self, stage: vk::PipelineStageFlags2, query: u32) -> Result<()> {
        let query_pool = self.query_pool.as_ref().ok_or(ScenarioError::NoQueryPool)?;
        self.command_buffer()?.write_timestamp(stage, query_pool, query);
        Ok(())
    }

    fn mark_frame_boundary(&mut self, boundary: &GfxFrameBoundary) -> Result<()> {
        let command_buffer = self.command_buffer()?.clone();
        command_buffer.end()?;
        self.recording = false;

        Gfx::get().compute_queue().submit_with_frame_boundary(
            GfxSubmitInfo::new(&[command_buffer]),
            boundary,
            Some(&self.fence),
        )?;
        self.wait()?;

        self.prepare_command_buffer()
    }

    fn begin_label(&mut self, name: &str) -> Result<()> {
        self.command_buffer()?.begin_label(name, label_color(name));
        Ok(())
    }

    fn end_label(&mut self) -> Result<()> {
        self.command_buffer()?.end_label();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum SinkCall {
        BindPipeline,
        BindDescriptorSet(u32),
        PushConstants(Vec<u8>),
        Dispatch(glam::UVec3),
        DataGraphDispatch,
        Barrier { memory: usize, image: usize },
        Timestamp(u32),
        FrameBoundary(u64),
        BeginLabel(String),
        EndLabel,
    }

    /// 只记录调用顺序；`closed` 为 true 时模拟没有处于录制状态的 command buffer
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) calls: Vec<SinkCall>,
        pub(crate) closed: bool,
    }

    impl RecordingSink {
        fn record(&mut self, call: SinkCall) -> Result<()> {
            if self.closed {
                return Err(ScenarioError::NoCommandBuffer);
            }
            self.calls.push(call);
            Ok(())
        }
    }

    impl CommandSink for RecordingSink {
        fn bind_pipeline(&mut self, _: vk::PipelineBindPoint, _: vk::Pipeline) -> Result<()> {
            self.record(SinkCall::BindPipeline)
        }

        fn bind_descriptor_set(
            &mut self,
            _: vk::PipelineBindPoint,
            _: vk::PipelineLayout,
            set_index: u32,
            _: vk::DescriptorSet,
        ) -> Result<()> {
            self.record(SinkCall::BindDescriptorSet(set_index))
        }

        fn push_constants(&mut self, _: vk::PipelineLayout, data: &[u8]) -> Result<()> {
            self.record(SinkCall::PushConstants(data.to_vec()))
        }

        fn dispatch(&mut self, group_count: glam::UVec3) -> Result<()> {
            self.record(SinkCall::Dispatch(group_count))
        }

        fn dispatch_data_graph(&mut self, _: DataGraphPipelineSessionARM) -> Result<()> {
            self.record(SinkCall::DataGraphDispatch)
        }

        fn pipeline_barrier(
            &mut self,
            memory_barriers: &[vk::MemoryBarrier2],
            image_barriers: &[GfxImageBarrier],
            _: &[GfxBufferBarrier],
            _: &[GfxTensorBarrier],
        ) -> Result<()> {
            self.record(SinkCall::Barrier {
                memory: memory_barriers.len(),
                image: image_barriers.len(),
            })
        }

        fn write_timestamp(&mut self, _: vk::PipelineStageFlags2, query: u32) -> Result<()> {
            self.record(SinkCall::Timestamp(query))
        }

        fn mark_frame_boundary(&mut self, boundary: &GfxFrameBoundary) -> Result<()> {
            self.record(SinkCall::FrameBoundary(boundary.frame_id))
        }

        fn begin_label(&mut self, name: &str) -> Result<()> {
            self.record(SinkCall::BeginLabel(name.to_string()))
        }

        fn end_label(&mut self) -> Result<()> {
            self.record(SinkCall::EndLabel)
        }
    }

    #[test]
    fn test_label_color() {
        assert_eq!(label_color("dispatch (add)"), LabelColor::COLOR_DISPATCH);
        assert_eq!(label_color("barriers (pipeline implicit)"), LabelColor::COLOR_BARRIER);
        assert_eq!(label_color("layout transitions"), LabelColor::COLOR_CMD);
    }
}
