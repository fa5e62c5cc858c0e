use ash::vk;
use sr_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier, GfxTensorBarrier};
use sr_gfx::commands::command_queue::GfxFrameBoundary;
use sr_gfx::extensions::arm_data_graph::DataGraphPipelineSessionARM;

use crate::compute::sink::CommandSink;
use crate::errors::{Result, ScenarioError};

/// 延迟执行的命令
///
/// 录制阶段只追加，提交时按顺序回放到 command buffer 中
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindDescriptorSet {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        /// shader 中的 set index
        set_index: u32,
        /// 在 recorder 所有 descriptor set 中的位置
        descriptor_set: usize,
    },
    Dispatch {
        group_count: glam::UVec3,
    },
    DataGraphDispatch {
        session: DataGraphPipelineSessionARM,
    },
    /// 指向 recorder 中的一组 barrier
    MemoryBarrierGroup {
        group: usize,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        data: Vec<u8>,
    },
    WriteTimestamp {
        query: u32,
        stage: vk::PipelineStageFlags2,
    },
    MarkFrameBoundary {
        boundary: usize,
    },
    PushDebugLabel {
        name: String,
    },
    PopDebugLabel,
}

impl Command {
    /// profiling 文件中的命令类型，只有 dispatch 会被计时
    pub fn profiled_type(&self) -> Option<&'static str> {
        match self {
            Command::Dispatch { .. } => Some("ComputeDispatch"),
            Command::DataGraphDispatch { .. } => Some("DataGraphDispatch"),
            _ => None,
        }
    }
}

/// 录制好的命令，以及命令引用的 descriptor set、barrier 和 frame boundary
///
/// barrier 按组保存在四个平行的数组中，第 `i` 组由 `MemoryBarrierGroup { group: i }` 引用
#[derive(Default)]
pub struct CommandList {
    pub(crate) commands: Vec<Command>,
    pub(crate) descriptor_sets: Vec<vk::DescriptorSet>,

    pub(crate) memory_barriers: Vec<Vec<vk::MemoryBarrier2<'static>>>,
    pub(crate) image_barriers: Vec<Vec<GfxImageBarrier>>,
    pub(crate) tensor_barriers: Vec<Vec<GfxTensorBarrier>>,
    pub(crate) buffer_barriers: Vec<Vec<GfxBufferBarrier>>,

    pub(crate) frame_boundaries: Vec<GfxFrameBoundary>,
}

/// 一次 dispatch 需要追加的所有命令
pub struct DispatchRecord<'a> {
    pub debug_name: &'a str,
    pub bind_point: vk::PipelineBindPoint,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    /// 本次 dispatch 的 set 0 在 descriptor set 数组中的位置
    pub base_set: usize,
    /// 绑定 set `0..set_count`
    pub set_count: u32,
    pub push_constants: Option<&'a [u8]>,
    pub dispatch: DispatchKind,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DispatchKind {
    Compute(glam::UVec3),
    DataGraph(DataGraphPipelineSessionARM),
}

// 追加
impl CommandList {
    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// debug marker 关闭时不追加 label
    pub fn push_label(&mut self, name: impl Into<String>, debug_markers: bool) {
        if debug_markers {
            self.commands.push(Command::PushDebugLabel { name: name.into() });
        }
    }

    pub fn pop_label(&mut self, debug_markers: bool) {
        if debug_markers {
            self.commands.push(Command::PopDebugLabel);
        }
    }

    pub fn append_dispatch(&mut self, record: &DispatchRecord, debug_markers: bool) {
        self.push_label(format!("dispatch ({})", record.debug_name), debug_markers);

        self.commands.push(Command::BindPipeline {
            bind_point: record.bind_point,
            pipeline: record.pipeline,
        });
        for set_index in 0..record.set_count {
            self.commands.push(Command::BindDescriptorSet {
                bind_point: record.bind_point,
                layout: record.layout,
                set_index,
                descriptor_set: record.base_set + set_index as usize,
            });
        }
        if let Some(data) = record.push_constants {
            self.commands.push(Command::PushConstants {
                layout: record.layout,
                data: data.to_vec(),
            });
        }
        self.commands.push(match record.dispatch {
            DispatchKind::Compute(group_count) => Command::Dispatch { group_count },
            DispatchKind::DataGraph(session) => Command::DataGraphDispatch { session },
        });

        self.pop_label(debug_markers);
    }

    /// 追加一组 barrier，以及引用它的命令
    pub fn append_barrier_group(
        &mut self,
        debug_name: &str,
        memory: Vec<vk::MemoryBarrier2<'static>>,
        image: Vec<GfxImageBarrier>,
        tensor: Vec<GfxTensorBarrier>,
        buffer: Vec<GfxBufferBarrier>,
        debug_markers: bool,
    ) {
        let group = self.memory_barriers.len();
        self.memory_barriers.push(memory);
        self.image_barriers.push(image);
        self.tensor_barriers.push(tensor);
        self.buffer_barriers.push(buffer);

        self.push_label(debug_name, debug_markers);
        self.commands.push(Command::MemoryBarrierGroup { group });
        self.pop_label(debug_markers);
    }

    pub fn append_frame_boundary(&mut self, boundary: GfxFrameBoundary) {
        self.frame_boundaries.push(boundary);
        self.commands.push(Command::MarkFrameBoundary {
            boundary: self.frame_boundaries.len() - 1,
        });
    }

    /// 被计时的命令类型，按录制顺序
    pub fn profiled_commands(&self) -> Vec<&'static str> {
        self.commands.iter().filter_map(Command::profiled_type).collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// 回放
impl CommandList {
    /// 按录制顺序回放；`timestamps_enabled` 为 false 时跳过 timestamp
    pub fn replay(&self, sink: &mut dyn CommandSink, timestamps_enabled: bool) -> Result<()> {
        for command in &self.commands {
            match command {
                Command::BindPipeline { bind_point, pipeline } => sink.bind_pipeline(*bind_point, *pipeline)?,
                Command::BindDescriptorSet {
                    bind_point,
                    layout,
                    set_index,
                    descriptor_set,
                } => {
                    let set = self.descriptor_sets.get(*descriptor_set).copied().ok_or_else(|| {
                        ScenarioError::ResourceNotFound(format!("descriptor set #{descriptor_set}"))
                    })?;
                    sink.bind_descriptor_set(*bind_point, *layout, *set_index, set)?;
                }
                Command::Dispatch { group_count } => {
                    log::info!("Dispatch compute");
                    sink.dispatch(*group_count)?;
                }
                Command::DataGraphDispatch { session } => {
                    log::info!("Dispatch graph");
                    sink.dispatch_data_graph(*session)?;
                }
                Command::MemoryBarrierGroup { group } => sink.pipeline_barrier(
                    &self.memory_barriers[*group],
                    &self.image_barriers[*group],
                    &self.buffer_barriers[*group],
                    &self.tensor_barriers[*group],
                )?,
                Command::PushConstants { layout, data } => sink.push_constants(*layout, data)?,
                Command::WriteTimestamp { query, stage } => {
                    if timestamps_enabled {
                        sink.write_timestamp(*stage, *query)?;
                    }
                }
                Command::MarkFrameBoundary { boundary } => {
                    sink.mark_frame_boundary(&self.frame_boundaries[*boundary])?;
                }
                Command::PushDebugLabel { name } => sink.begin_label(name)?,
                Command::PopDebugLabel => sink.end_label()?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::sink::tests::{RecordingSink, SinkCall};

    fn compute_record(base_set: usize, set_count: u32, push: Option<&[u8]>) -> DispatchRecord<'_> {
        DispatchRecord {
            debug_name: "add",
            bind_point: vk::PipelineBindPoint::COMPUTE,
            pipeline: vk::Pipeline::null(),
            layout: vk::PipelineLayout::null(),
            base_set,
            set_count,
            push_constants: push,
            dispatch: DispatchKind::Compute(glam::UVec3::new(4, 2, 1)),
        }
    }

    #[test]
    fn test_dispatch_command_order() {
        let mut list = CommandList::default();
        list.append_dispatch(&compute_record(0, 2, Some(&[1, 2, 3, 4])), true);

        let commands = list.commands();
        assert_eq!(commands.len(), 7);
        assert_eq!(commands[0], Command::PushDebugLabel { name: "dispatch (add)".to_string() });
        assert!(matches!(commands[1], Command::BindPipeline { .. }));
        assert!(matches!(commands[2], Command::BindDescriptorSet { set_index: 0, descriptor_set: 0, .. }));
        assert!(matches!(commands[3], Command::BindDescriptorSet { set_index: 1, descriptor_set: 1, .. }));
        assert!(matches!(commands[4], Command::PushConstants { .. }));
        assert!(matches!(commands[5], Command::Dispatch { .. }));
        assert_eq!(commands[6], Command::PopDebugLabel);
    }

    #[test]
    fn test_labels_skipped_without_debug_markers() {
        let mut list = CommandList::default();
        list.append_dispatch(&compute_record(3, 1, None), false);
        list.append_barrier_group("barriers (pipeline implicit)", vec![], vec![], vec![], vec![], false);

        assert_eq!(list.commands().len(), 4);
        assert!(matches!(list.commands()[1], Command::BindDescriptorSet { descriptor_set: 3, .. }));
        assert_eq!(list.commands()[3], Command::MemoryBarrierGroup { group: 0 });
    }

    #[test]
    fn test_replay_follows_recording_order() {
        let mut list = CommandList::default();
        list.descriptor_sets.push(vk::DescriptorSet::null());
        list.push(Command::WriteTimestamp {
            query: 0,
            stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        });
        list.append_dispatch(&compute_record(0, 1, None), false);
        list.push(Command::WriteTimestamp {
            query: 1,
            stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        });
        list.append_barrier_group(
            "barriers (pipeline implicit)",
            vec![vk::MemoryBarrier2::default()],
            vec![],
            vec![],
            vec![],
            true,
        );

        let mut sink = RecordingSink::default();
        list.replay(&mut sink, true).unwrap();
        assert_eq!(
            sink.calls,
            vec![
                SinkCall::Timestamp(0),
                SinkCall::BindPipeline,
                SinkCall::BindDescriptorSet(0),
                SinkCall::Dispatch(glam::UVec3::new(4, 2, 1)),
                SinkCall::Timestamp(1),
                SinkCall::BeginLabel("barriers (pipeline implicit)".to_string()),
                SinkCall::Barrier { memory: 1, image: 0 },
                SinkCall::EndLabel,
            ]
        );

        let mut sink = RecordingSink::default();
        list.replay(&mut sink, false).unwrap();
        assert!(!sink.calls.iter().any(|call| matches!(call, SinkCall::Timestamp(_))));
        assert_eq!(list.profiled_commands(), vec!["ComputeDispatch"]);
    }

    #[test]
    fn test_missing_descriptor_set_fails_replay() {
        let mut list = CommandList::default();
        list.append_dispatch(&compute_record(0, 1, None), false);
        let mut sink = RecordingSink::default();
        assert!(matches!(list.replay(&mut sink, false), Err(ScenarioError::ResourceNotFound(_))));
    }

    #[test]
    fn test_replay_without_recording_buffer_fails() {
        let mut list = CommandList::default();
        list.descriptor_sets.push(vk::DescriptorSet::null());
        list.append_dispatch(&compute_record(0, 1, None), false);
        let mut sink = RecordingSink {
            closed: true,
            ..Default::default()
        };
        assert!(matches!(list.replay(&mut sink, true), Err(ScenarioError::NoCommandBuffer)));
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn test_frame_boundary_replay() {
        let mut list = CommandList::default();
        list.append_frame_boundary(GfxFrameBoundary {
            frame_id: 9,
            ..Default::default()
        });
        let mut sink = RecordingSink::default();
        list.replay(&mut sink, false).unwrap();
        assert_eq!(sink.calls, vec![SinkCall::FrameBoundary(9)]);

        list.clear();
        assert!(list.is_empty());
        assert!(list.frame_boundaries.is_empty());
    }
}
