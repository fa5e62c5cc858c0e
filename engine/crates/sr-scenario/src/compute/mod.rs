//! 延迟执行的命令录制器
//!
//! setup 阶段把 dispatch、barrier、timestamp 等追加到 [`CommandList`]，
//! 提交时在同一个 command buffer 中按顺序回放，然后阻塞等待 fence。

pub mod command;
pub mod descriptor_pools;
pub mod profiling;
pub mod sink;

use ash::vk;
use sr_gfx::commands::barrier::GfxBarrierMask;
use sr_gfx::commands::command_buffer::GfxCommandBuffer;
use sr_gfx::commands::command_queue::GfxFrameBoundary;
use sr_gfx::descriptors::descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo};
use sr_gfx::descriptors::descriptor_write::{GfxDescriptorUpdateInfo, write_descriptor};
use sr_gfx::extensions::arm_tensors::DESCRIPTOR_TYPE_TENSOR_ARM;

use crate::data_manager::DataManager;
use crate::desc::{BindingDesc, DispatchBarrierDesc, MarkBoundaryDesc};
use crate::errors::{Result, ScenarioError};
use crate::perf_counter::PerfCounters;
use crate::pipeline::Pipeline;
use crate::types::ResourceKind;

pub use command::{Command, CommandList, DispatchKind, DispatchRecord};
pub use sink::{CommandSink, GfxCommandSink};

const IMPLICIT_BARRIER_NAME: &str = "barriers (pipeline implicit)";
const RUN_CATEGORY: &str = "Run Scenario";

/// 每个 binding 对应 pipeline 的一个 descriptor 类型，set 必须在 pipeline 的 set 范围内
pub fn typed_bindings<'a>(
    bindings: &'a [BindingDesc],
    descriptor_types: &[vk::DescriptorType],
    set_count: usize,
) -> Result<Vec<(&'a BindingDesc, vk::DescriptorType)>> {
    if bindings.len() != descriptor_types.len() {
        return Err(ScenarioError::config(format!(
            "{} bindings but pipeline has {} descriptor types",
            bindings.len(),
            descriptor_types.len()
        )));
    }
    bindings
        .iter()
        .zip(descriptor_types.iter().copied())
        .map(|(binding, descriptor_type)| {
            if binding.set as usize >= set_count {
                return Err(ScenarioError::config(format!(
                    "binding {} of {} uses set {} but pipeline has {set_count} sets",
                    binding.id, binding.resource_ref, binding.set
                )));
            }
            Ok((binding, descriptor_type))
        })
        .collect()
}

/// `barriers (a,b,...)`，没有名字时为空
pub fn barrier_group_name<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let names = names.into_iter().filter(|name| !name.is_empty()).collect::<Vec<_>>();
    if names.is_empty() {
        String::new()
    } else {
        format!("barriers ({})", names.join(","))
    }
}

fn ensure_sink(slot: &mut Option<GfxCommandSink>) -> Result<&mut GfxCommandSink> {
    if slot.is_none() {
        *slot = Some(GfxCommandSink::new()?);
    }
    slot.as_mut().ok_or(ScenarioError::NoCommandBuffer)
}

/// # destroy
///
/// descriptor set 随 descriptor pool 一起释放；command buffer 与 fence 由 [`GfxCommandSink`] 负责
pub struct Compute {
    /// 第一次需要 command buffer 时才创建；最先销毁，销毁前等待队列空闲
    sink: Option<GfxCommandSink>,
    list: CommandList,
    descriptor_pools: Vec<GfxDescriptorPool>,
    debug_markers: bool,
}

// 创建与销毁
impl Compute {
    pub fn new(debug_markers: bool) -> Self {
        Self {
            sink: None,
            list: CommandList::default(),
            descriptor_pools: vec![],
            debug_markers,
        }
    }

    /// 清空录制的命令与 descriptor，释放 command buffer 并重建 fence
    pub fn reset(&mut self) -> Result<()> {
        self.list.clear();
        self.descriptor_pools.clear();
        if let Some(sink) = &mut self.sink {
            sink.reset()?;
        }
        Ok(())
    }
}

// 录制
impl Compute {
    /// 为 pipeline 分配 descriptor set 并写入 bindings，然后追加一次 dispatch
    ///
    /// `implicit_barrier` 为 true 时在 dispatch 之后追加一个覆盖所有命令的 memory barrier
    pub fn register_pipeline_fenced(
        &mut self,
        pipeline: &Pipeline,
        data_manager: &DataManager,
        bindings: &[BindingDesc],
        push_constants: Option<&[u8]>,
        implicit_barrier: bool,
        dispatch_shape: glam::UVec3,
    ) -> Result<()> {
        let base_set = self.list.descriptor_sets.len();
        self.add_descriptor_sets(pipeline, base_set)?;
        self.write_descriptors(pipeline, data_manager, bindings, base_set)?;

        let dispatch = match pipeline.session() {
            Some(session) => DispatchKind::DataGraph(session),
            None => DispatchKind::Compute(dispatch_shape),
        };
        self.list.append_dispatch(
            &DispatchRecord {
                debug_name: pipeline.debug_name(),
                bind_point: pipeline.bind_point(),
                pipeline: pipeline.handle(),
                layout: pipeline.layout(),
                base_set,
                set_count: pipeline.set_count() as u32,
                push_constants,
                dispatch,
            },
            self.debug_markers,
        );

        if implicit_barrier {
            self.list.append_barrier_group(
                IMPLICIT_BARRIER_NAME,
                vec![GfxBarrierMask::all_commands_read_write().memory_barrier()],
                vec![],
                vec![],
                vec![],
                self.debug_markers,
            );
        }
        Ok(())
    }

    /// 每个 set 一个 pool，pool 的大小按整个 pipeline 的 descriptor 类型统计
    fn add_descriptor_sets(&mut self, pipeline: &Pipeline, base_set: usize) -> Result<()> {
        if pipeline.set_count() == 0 {
            return Ok(());
        }
        let pool_sizes = descriptor_pools::descriptor_pool_sizes(pipeline.descriptor_types())?;
        for set in 0..pipeline.set_count() as u32 {
            let layout = pipeline.set_layout(set).ok_or_else(|| {
                ScenarioError::ResourceNotFound(format!("set {set} of pipeline {}", pipeline.debug_name()))
            })?;
            let name = format!("{}-set{set}", pipeline.debug_name());
            let pool = GfxDescriptorPool::new(
                &GfxDescriptorPoolCreateInfo::new(
                    vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
                    1,
                    pool_sizes.clone(),
                ),
                &name,
            )?;
            let descriptor_set = pool.allocate_set(layout, &name)?;
            self.descriptor_pools.push(pool);
            self.list.descriptor_sets.push(descriptor_set);
        }
        debug_assert_eq!(self.list.descriptor_sets.len(), base_set + pipeline.set_count());
        Ok(())
    }

    fn write_descriptors(
        &self,
        pipeline: &Pipeline,
        data_manager: &DataManager,
        bindings: &[BindingDesc],
        base_set: usize,
    ) -> Result<()> {
        let typed = typed_bindings(bindings, pipeline.descriptor_types(), pipeline.set_count())?;
        for (binding, descriptor_type) in typed {
            let descriptor_set = self.list.descriptor_sets[base_set + binding.set as usize];
            let info = match descriptor_type {
                vk::DescriptorType::STORAGE_BUFFER => {
                    GfxDescriptorUpdateInfo::Buffer(data_manager.get_buffer(&binding.resource_ref)?.descriptor_info())
                }
                DESCRIPTOR_TYPE_TENSOR_ARM => {
                    GfxDescriptorUpdateInfo::Tensor(data_manager.get_tensor(&binding.resource_ref)?.view())
                }
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER | vk::DescriptorType::STORAGE_IMAGE => {
                    let image = data_manager.get_image(&binding.resource_ref)?;
                    let view = match binding.lod {
                        Some(lod) => image.image_view(lod)?,
                        None => image.view(),
                    };
                    GfxDescriptorUpdateInfo::Image(
                        vk::DescriptorImageInfo::default()
                            .sampler(image.sampler())
                            .image_view(view)
                            .image_layout(image.layout()),
                    )
                }
                other => return Err(ScenarioError::UnsupportedDescriptorType(other)),
            };
            write_descriptor(descriptor_set, binding.id, descriptor_type, info);
        }
        Ok(())
    }

    /// 按 memory、image、tensor、buffer 的顺序解析 barrier，作为一组追加
    pub fn register_pipeline_barrier(&mut self, desc: &DispatchBarrierDesc, data_manager: &DataManager) -> Result<()> {
        let mut names = vec![];

        let mut memory = vec![];
        for guid in &desc.memory_barrier_refs {
            let barrier = data_manager.get_memory_barrier(guid)?;
            names.push(barrier.debug_name.as_str());
            memory.push(barrier.vk_barrier());
        }

        let mut image = vec![];
        for guid in &desc.image_barrier_refs {
            let barrier = data_manager.get_image_barrier(guid)?;
            names.push(barrier.debug_name.as_str());
            image.push(barrier.gfx_barrier());
        }

        let mut tensor = vec![];
        for guid in &desc.tensor_barrier_refs {
            let barrier = data_manager.get_tensor_barrier(guid)?;
            names.push(barrier.debug_name.as_str());
            tensor.push(barrier.gfx_barrier());
        }

        // buffer barrier 不参与命名
        let buffer = desc
            .buffer_barrier_refs
            .iter()
            .map(|guid| data_manager.get_buffer_barrier(guid).map(|barrier| barrier.gfx_barrier()))
            .collect::<Result<Vec<_>>>()?;

        let name = barrier_group_name(names);
        self.list.append_barrier_group(&name, memory, image, tensor, buffer, self.debug_markers);
        Ok(())
    }

    pub fn register_write_timestamp(&mut self, query: u32, stage: Option<vk::PipelineStageFlags2>) {
        self.list.push(Command::WriteTimestamp {
            query,
            stage: stage.unwrap_or(vk::PipelineStageFlags2::BOTTOM_OF_PIPE),
        });
    }

    /// 记录 frame boundary 中的资源句柄，回放时提交当前 command buffer
    pub fn register_mark_boundary(&mut self, desc: &MarkBoundaryDesc, data_manager: &DataManager) -> Result<()> {
        let mut boundary = GfxFrameBoundary {
            frame_id: desc.frame_id,
            ..Default::default()
        };
        for guid in &desc.resources {
            match data_manager.kind_of(guid) {
                Some(ResourceKind::Buffer) => boundary.buffers.push(data_manager.get_buffer(guid)?.vk_buffer()),
                Some(ResourceKind::Image) => boundary.images.push(data_manager.get_image(guid)?.handle()),
                Some(ResourceKind::Tensor) => boundary.tensors.push(data_manager.get_tensor(guid)?.handle()),
                Some(ResourceKind::RawData) | None => {
                    return Err(ScenarioError::ResourceNotFound(format!("frame boundary resource {guid}")));
                }
            }
        }
        self.list.append_frame_boundary(boundary);
        Ok(())
    }
}

// 提交
impl Compute {
    /// 确保有一个处于录制状态的 command buffer
    pub fn prepare_command_buffer(&mut self) -> Result<()> {
        ensure_sink(&mut self.sink)?.prepare_command_buffer()
    }

    pub fn command_buffer(&self) -> Result<&GfxCommandBuffer> {
        self.sink.as_ref().ok_or(ScenarioError::NoCommandBuffer)?.command_buffer()
    }

    /// 回放所有命令，提交并阻塞等待完成
    ///
    /// 每个阶段的耗时记录在 `perf_counters` 中，不计入 time to inference
    pub fn submit_and_wait(&mut self, perf_counters: &mut PerfCounters, iteration: u32) -> Result<()> {
        let _span = tracy_client::span!("Compute::submit_and_wait");
        let Self { list, sink, .. } = self;
        let sink = ensure_sink(sink)?;
        let iteration = iteration + 1;

        let counter = perf_counters.start(format!("Reset Query Pool. Iteration: {iteration}"), RUN_CATEGORY, false);
        sink.reset_query_pool();
        perf_counters.stop(counter);

        let counter =
            perf_counters.start(format!("Creating Command Buffer. Iteration: {iteration}"), RUN_CATEGORY, false);
        sink.prepare_command_buffer()?;
        let timestamps_enabled = sink.has_query_pool();
        list.replay(sink, timestamps_enabled)?;
        perf_counters.stop(counter);

        let counter = perf_counters.start(format!("Submit Commands. Iteration: {iteration}"), RUN_CATEGORY, false);
        sink.submit()?;
        perf_counters.stop(counter);

        let counter = perf_counters.start(format!("Wait for Fence. Iteration: {iteration}"), RUN_CATEGORY, false);
        sink.wait()?;
        perf_counters.stop(counter);

        Ok(())
    }

    pub fn setup_query_pool(&mut self, query_count: u32) -> Result<()> {
        ensure_sink(&mut self.sink)?.setup_query_pool(query_count)
    }

    pub fn query_timestamps(&self) -> Result<Vec<u64>> {
        self.sink.as_ref().ok_or(ScenarioError::NoQueryPool)?.query_timestamps()
    }
}

// getters
impl Compute {
    #[inline]
    pub fn commands(&self) -> &[Command] {
        self.list.commands()
    }

    #[inline]
    pub fn profiled_commands(&self) -> Vec<&'static str> {
        self.list.profiled_commands()
    }

    #[inline]
    pub fn debug_markers(&self) -> bool {
        self.debug_markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::{ImageBarrierData, MemoryBarrierData};
    use crate::guid::Guid;

    fn binding(set: u32, id: u32, uid: &str) -> BindingDesc {
        BindingDesc {
            set,
            id,
            resource_ref: Guid::new(uid),
            lod: None,
            descriptor_type: Default::default(),
        }
    }

    #[test]
    fn test_typed_bindings() {
        let bindings = [binding(0, 0, "in"), binding(1, 0, "out")];
        let types = [vk::DescriptorType::STORAGE_BUFFER, DESCRIPTOR_TYPE_TENSOR_ARM];

        let typed = typed_bindings(&bindings, &types, 2).unwrap();
        assert_eq!(typed.len(), 2);
        assert_eq!(typed[1].0.resource_ref, Guid::new("out"));
        assert_eq!(typed[1].1, DESCRIPTOR_TYPE_TENSOR_ARM);

        // 数量不一致时不能静默丢掉多出来的 binding
        let err = typed_bindings(&bindings, &types[..1], 2).unwrap_err();
        assert!(matches!(err, ScenarioError::Config(_)));
        assert!(typed_bindings(&bindings[..1], &types, 2).is_err());

        // set 超出 pipeline 的范围
        assert!(matches!(typed_bindings(&bindings, &types, 1), Err(ScenarioError::Config(_))));
        assert!(typed_bindings(&[], &[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_barrier_group_name() {
        assert_eq!(barrier_group_name(["a", "", "b"]), "barriers (a,b)");
        assert_eq!(barrier_group_name(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_register_pipeline_barrier() {
        let mut data_manager = DataManager::new();
        let mem = Guid::new("mem");
        let img = Guid::new("img");
        data_manager.add_memory_barrier(
            &mem,
            MemoryBarrierData {
                debug_name: "mem".to_string(),
                mask: GfxBarrierMask::all_commands_read_write(),
            },
        );
        data_manager.add_image_barrier(
            &img,
            ImageBarrierData {
                debug_name: "img".to_string(),
                mask: GfxBarrierMask::all_commands_read_write(),
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::GENERAL,
                image: vk::Image::null(),
                range: vk::ImageSubresourceRange::default(),
            },
        );

        let mut compute = Compute::new(true);
        compute
            .register_pipeline_barrier(
                &DispatchBarrierDesc {
                    image_barrier_refs: vec![img],
                    tensor_barrier_refs: vec![],
                    memory_barrier_refs: vec![mem],
                    buffer_barrier_refs: vec![],
                },
                &data_manager,
            )
            .unwrap();

        assert_eq!(
            compute.commands(),
            &[
                Command::PushDebugLabel {
                    name: "barriers (mem,img)".to_string()
                },
                Command::MemoryBarrierGroup { group: 0 },
                Command::PopDebugLabel,
            ]
        );
        assert_eq!(compute.list.memory_barriers[0].len(), 1);
        assert_eq!(compute.list.image_barriers[0].len(), 1);
        assert!(compute.list.buffer_barriers[0].is_empty());
    }

    #[test]
    fn test_unknown_barrier_is_an_error() {
        let mut compute = Compute::new(false);
        let result = compute.register_pipeline_barrier(
            &DispatchBarrierDesc {
                image_barrier_refs: vec![],
                tensor_barrier_refs: vec![Guid::new("missing")],
                memory_barrier_refs: vec![],
                buffer_barrier_refs: vec![],
            },
            &DataManager::new(),
        );
        assert!(matches!(result, Err(ScenarioError::UnknownBarrierTarget(_))));
    }

    #[test]
    fn test_timestamps_and_boundaries() {
        let mut compute = Compute::new(false);
        compute.register_write_timestamp(0, None);
        compute.register_write_timestamp(1, Some(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert_eq!(
            compute.commands()[0],
            Command::WriteTimestamp {
                query: 0,
                stage: vk::PipelineStageFlags2::BOTTOM_OF_PIPE
            }
        );

        compute
            .register_mark_boundary(
                &MarkBoundaryDesc {
                    frame_id: 4,
                    resources: vec![],
                },
                &DataManager::new(),
            )
            .unwrap();
        assert_eq!(compute.commands()[2], Command::MarkFrameBoundary { boundary: 0 });
        assert_eq!(compute.list.frame_boundaries[0].frame_id, 4);

        let missing = compute.register_mark_boundary(
            &MarkBoundaryDesc {
                frame_id: 5,
                resources: vec![Guid::new("missing")],
            },
            &DataManager::new(),
        );
        assert!(matches!(missing, Err(ScenarioError::ResourceNotFound(_))));
        assert!(compute.profiled_commands().is_empty());
    }

    #[test]
    fn test_no_command_buffer_or_query_pool_before_submit() {
        let mut compute = Compute::new(false);
        assert!(matches!(compute.command_buffer(), Err(ScenarioError::NoCommandBuffer)));
        assert!(matches!(compute.query_timestamps(), Err(ScenarioError::NoQueryPool)));

        compute.register_write_timestamp(0, None);
        compute.reset().unwrap();
        assert!(compute.commands().is_empty());
    }
}
