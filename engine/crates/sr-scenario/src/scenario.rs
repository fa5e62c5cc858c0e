//! scenario 的执行流程：创建资源，录制命令，提交，保存结果

use std::path::Path;

use sr_crate_tools::init_log::init_log;
use sr_gfx::gfx::Gfx;
use sr_gfx::pipelines::compute_pipeline::GfxSpecConstant;
use sr_gfx::pipelines::shader::GfxShaderModule;

use crate::barrier::{BufferBarrierData, ImageBarrierData, MemoryBarrierData, TensorBarrierData};
use crate::compute::Compute;
use crate::compute::profiling::{ProfilingLog, pair_timestamps};
use crate::data_manager::DataManager;
use crate::desc::{
    CommandDesc, CommandKind, DispatchComputeDesc, DispatchDataGraphDesc, ImageDesc, MarkBoundaryDesc, ResourceDesc,
    ScenarioSpec, SpecConstantDesc, TensorDesc,
};
use crate::errors::{Result, ScenarioError};
use crate::format;
use crate::graph_module::SegmentKind;
use crate::io::ResourceIo;
use crate::layout_transition;
use crate::memory::GroupManager;
use crate::options::ScenarioOptions;
use crate::perf_counter::PerfCounters;
use crate::pipeline::{ComputePipelineInfo, DataGraphPipelineInfo, Pipeline, load_shader_code};
use crate::resources::{BufferInfo, ImageInfo, RawData, TensorInfo};
use crate::types::{ResourceKind, ShaderAccessType, Tiling};

const SETUP_CATEGORY: &str = "Scenario Setup";
const PIPELINE_CATEGORY: &str = "Pipeline Setup";

/// 上一轮以 frame boundary 结束、且本轮还没有录制任何命令时，跳过这个 boundary
pub fn skip_frame_boundary(iteration: u32, last_command_is_boundary: bool, nothing_recorded: bool) -> bool {
    iteration > 0 && last_command_is_boundary && nothing_recorded
}

/// 每一轮的 frame id 接着上一轮继续编号
pub fn frame_boundary_id(frame_id: u64, iteration: u32, boundary_count: u64, skipped: u64) -> u64 {
    frame_id + iteration as u64 * boundary_count.saturating_sub(skipped)
}

/// 每 16 个字节一行：`\n{偏移:08X}:   ` 之后是大写的十六进制字节
pub fn session_memory_hexdump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + data.len().div_ceil(16) * 13);
    for (row, chunk) in data.chunks(16).enumerate() {
        out.push_str(&format!("\n{:08X}:   ", row * 16));
        for byte in chunk {
            out.push_str(&format!("{byte:02X} "));
        }
    }
    out
}

fn spec_constants(constants: &[SpecConstantDesc]) -> Vec<GfxSpecConstant> {
    constants
        .iter()
        .map(|constant| GfxSpecConstant {
            id: constant.id,
            value: constant.value.to_bits(),
        })
        .collect()
}

fn tensor_info(desc: &TensorDesc, group_manager: &GroupManager) -> Result<TensorInfo> {
    Ok(TensorInfo {
        debug_name: desc.uid.name().to_string(),
        shape: desc.dims.clone(),
        format: format::parse_format(&desc.format)?,
        tiling: desc.tiling.unwrap_or(Tiling::Linear),
        is_aliased_with_image: group_manager.is_aliased_to(&desc.uid, ResourceKind::Image),
        memory_offset: desc.memory_group().map_or(0, |group| group.offset),
    })
}

fn image_info(desc: &ImageDesc, group_manager: &GroupManager) -> Result<ImageInfo> {
    let (is_sampled, is_storage) = match desc.shader_access {
        ShaderAccessType::ReadOnly => (true, false),
        ShaderAccessType::WriteOnly | ShaderAccessType::ImageRead => (false, true),
        ShaderAccessType::ReadWrite => (true, true),
    };
    Ok(ImageInfo {
        debug_name: desc.uid.name().to_string(),
        shape: desc.dims.iter().map(|dim| *dim as i64).collect(),
        format: format::parse_format(&desc.format)?,
        is_input: desc.src.is_some(),
        is_sampled,
        is_storage,
        is_aliased: group_manager.is_aliased_to(&desc.uid, ResourceKind::Tensor),
        mips: desc.mip_levels(),
        tiling: desc.tiling,
        sampler_settings: desc.sampler_settings(),
        memory_offset: desc.memory_group.as_ref().map_or(0, |group| group.offset),
    })
}

fn resource_kind(desc: &ResourceDesc) -> Option<ResourceKind> {
    match desc {
        ResourceDesc::Buffer(_) => Some(ResourceKind::Buffer),
        ResourceDesc::Image(_) => Some(ResourceKind::Image),
        ResourceDesc::Tensor(_) => Some(ResourceKind::Tensor),
        _ => None,
    }
}

/// # destroy
///
/// 字段的声明顺序就是销毁顺序：recorder 先等待队列空闲，然后是 pipeline，最后是资源
pub struct Scenario {
    compute: Compute,
    pipelines: Vec<Pipeline>,
    data_manager: DataManager,

    options: ScenarioOptions,
    spec: ScenarioSpec,
    io: Box<dyn ResourceIo>,

    perf_counters: PerfCounters,
    profiling: ProfilingLog,
}

// 创建与销毁
impl Scenario {
    /// 初始化日志以及 Gfx 单例，进程结束前调用 `Gfx::destroy`
    pub fn init_env(options: &ScenarioOptions) -> anyhow::Result<()> {
        init_log();
        Gfx::init(&options.gfx_init_info())
    }

    /// 需要先调用 [`Scenario::init_env`]
    pub fn new(options: ScenarioOptions, spec: ScenarioSpec, io: Box<dyn ResourceIo>) -> Result<Self> {
        let _span = tracy_client::span!("Scenario::new");
        let debug_markers = options.enable_gpu_debug_markers && Gfx::get().gpu_debug_markers_enabled();

        let mut scenario = Self {
            compute: Compute::new(debug_markers),
            pipelines: vec![],
            data_manager: DataManager::new(),
            options,
            spec,
            io,
            perf_counters: PerfCounters::new(),
            profiling: ProfilingLog::new(),
        };
        scenario.setup_resources()?;
        Ok(scenario)
    }

    fn register_memory_groups(&mut self) {
        let group_manager = self.data_manager.group_manager_mut();
        for resource in &self.spec.resources {
            let (Some(kind), Some(group)) = (resource_kind(resource), resource.memory_group()) else {
                continue;
            };
            group_manager.add_to_group(&group.id, resource.uid(), kind);

            // alias target 直接引用另一个资源时，该资源也加入同一个 group
            if let Some(target) = self.spec.find_resource(&group.id)
                && let Some(target_kind) = resource_kind(target)
                && target.memory_group().is_none()
            {
                group_manager.add_to_group(&group.id, target.uid(), target_kind);
            }
        }
    }

    fn setup_resources(&mut self) -> Result<()> {
        log::info!("Setup resources");
        self.register_memory_groups();

        // 第一遍：创建对象，登记内存需求
        for resource in &self.spec.resources {
            let uid = resource.uid();
            match resource {
                ResourceDesc::Buffer(desc) => {
                    let info = BufferInfo {
                        debug_name: uid.name().to_string(),
                        size: desc.size,
                        memory_offset: desc.memory_group.as_ref().map_or(0, |group| group.offset),
                    };
                    self.data_manager.create_buffer(uid, &info)?;
                }
                ResourceDesc::RawData(desc) => {
                    let raw_data = RawData::load(uid.name(), self.io.as_ref(), Path::new(&desc.src))?;
                    self.data_manager.add_raw_data(uid, raw_data);
                }
                ResourceDesc::Image(desc) => {
                    let info = image_info(desc, self.data_manager.group_manager())?;
                    self.data_manager.create_image(uid, &info)?;
                }
                ResourceDesc::Graph(desc) => {
                    let counter = self.perf_counters.start(format!("Parse VGF: {}", uid.name()), SETUP_CATEGORY, true);
                    let module = self.io.load_graph_module(Path::new(&desc.src))?;
                    self.perf_counters.stop(counter);
                    self.data_manager.add_graph_module(uid, module);
                }
                ResourceDesc::ImageBarrier(desc) => {
                    let image = self.data_manager.get_image(&desc.image_resource)?.handle();
                    self.data_manager.add_image_barrier(uid, ImageBarrierData::from_desc(desc, image));
                }
                ResourceDesc::MemoryBarrier(desc) => {
                    self.data_manager.add_memory_barrier(uid, MemoryBarrierData::from_desc(desc));
                }
                ResourceDesc::TensorBarrier(desc) => {
                    let tensor = self.data_manager.get_tensor(&desc.tensor_resource)?.handle();
                    self.data_manager.add_tensor_barrier(uid, TensorBarrierData::from_desc(desc, tensor));
                }
                ResourceDesc::BufferBarrier(desc) => {
                    let buffer = self.data_manager.get_buffer(&desc.buffer_resource)?.vk_buffer();
                    self.data_manager.add_buffer_barrier(uid, BufferBarrierData::from_desc(desc, buffer));
                }
                ResourceDesc::Tensor(desc) => {
                    if desc.src.is_some() && self.data_manager.group_manager().is_aliased(uid) {
                        return Err(ScenarioError::config(format!(
                            "Tensor {uid} cannot have src file and alias other resource"
                        )));
                    }
                    let info = tensor_info(desc, self.data_manager.group_manager())?;
                    self.data_manager.create_tensor(uid, &info)?;
                }
                ResourceDesc::Shader(_) => continue,
            }
            log::debug!("{uid} created");
        }

        // 第二遍：每个 group 分配一次内存，然后填充数据
        for resource in &self.spec.resources {
            let uid = resource.uid();
            match resource {
                ResourceDesc::Buffer(desc) => {
                    let counter =
                        self.perf_counters.start(format!("Load Buffer: {}", uid.name()), SETUP_CATEGORY, false);
                    let buffer = self.data_manager.get_buffer_mut(uid)?;
                    buffer.allocate_memory()?;
                    match &desc.src {
                        Some(src) => buffer.fill(&self.io.load_buffer(Path::new(src))?)?,
                        None => buffer.fill_zero()?,
                    }
                    self.perf_counters.stop(counter);
                }
                ResourceDesc::Tensor(desc) => {
                    let aliased = self.data_manager.group_manager().is_aliased(uid);
                    let tensor = self.data_manager.get_tensor_mut(uid)?;
                    tensor.allocate_memory()?;
                    // 别名 tensor 的内容来自共享内存的其它资源
                    if !aliased {
                        let counter =
                            self.perf_counters.start(format!("Load Tensor: {}", uid.name()), SETUP_CATEGORY, false);
                        match &desc.src {
                            Some(src) => tensor.fill_from_file(self.io.as_ref(), Path::new(src))?,
                            None => tensor.fill_zero()?,
                        }
                        self.perf_counters.stop(counter);
                    }
                }
                ResourceDesc::Image(desc) => {
                    let image = self.data_manager.get_image_mut(uid)?;
                    image.allocate_memory()?;
                    let counter = self.perf_counters.start(format!("Load Image: {}", uid.name()), SETUP_CATEGORY, false);
                    match &desc.src {
                        Some(src) => image.fill_from_file(self.io.as_ref(), Path::new(src))?,
                        None => image.fill_zero()?,
                    }
                    self.perf_counters.stop(counter);
                }
                _ => continue,
            }
            log::debug!("{uid} loaded");
        }
        Ok(())
    }

    /// data graph 内部各 segment 之间传递数据的 tensor，只在第一次 dispatch 时创建
    fn create_intermediate_resources(&mut self, dispatch: &DispatchDataGraphDesc) -> Result<()> {
        let intermediates = self.data_manager.get_graph_module(&dispatch.graph_ref)?.intermediate_resources();
        for desc in intermediates {
            if self.data_manager.has_tensor(&desc.uid) {
                continue;
            }
            let info = tensor_info(&desc, self.data_manager.group_manager())?;
            self.data_manager.create_tensor(&desc.uid, &info)?;
            let tensor = self.data_manager.get_tensor_mut(&desc.uid)?;
            tensor.allocate_memory()?;
            tensor.fill_zero()?;
        }
        Ok(())
    }
}

// 录制
impl Scenario {
    pub fn setup_commands(&mut self, iteration: u32) -> Result<()> {
        let _span = tracy_client::span!("Scenario::setup_commands");
        log::info!("Setup commands");

        let boundary_count = self.spec.command_count(CommandKind::MarkBoundary);
        let last_is_boundary = self.spec.is_last_command(CommandKind::MarkBoundary);
        let mut skipped_boundaries = 0;
        let mut query_count = 0;

        let commands = self.spec.commands.clone();
        for command in &commands {
            match command {
                CommandDesc::DispatchCompute(dispatch) => {
                    self.setup_dispatch_compute(dispatch, iteration, &mut query_count)?;
                }
                CommandDesc::DispatchBarrier(dispatch) => {
                    self.compute.register_pipeline_barrier(dispatch, &self.data_manager)?;
                }
                CommandDesc::DispatchDataGraph(dispatch) => {
                    self.setup_dispatch_data_graph(dispatch, iteration, &mut query_count)?;
                }
                CommandDesc::MarkBoundary(boundary) => {
                    if !Gfx::get().optional_exts().frame_boundary {
                        log::warn!("Frame boundary extension not present");
                        continue;
                    }
                    if skip_frame_boundary(iteration, last_is_boundary, self.compute.commands().is_empty()) {
                        skipped_boundaries = 1;
                        continue;
                    }
                    let desc = MarkBoundaryDesc {
                        frame_id: frame_boundary_id(boundary.frame_id, iteration, boundary_count, skipped_boundaries),
                        resources: boundary.resources.clone(),
                    };
                    self.compute.register_mark_boundary(&desc, &self.data_manager)?;
                }
            }
        }

        if self.options.profiling_path.is_some() && query_count != 0 {
            log::info!("Setup profiling");
            self.compute.setup_query_pool(query_count)?;
        }
        Ok(())
    }

    fn setup_dispatch_compute(
        &mut self,
        dispatch: &DispatchComputeDesc,
        iteration: u32,
        query_count: &mut u32,
    ) -> Result<()> {
        let shader = self.spec.shader(&dispatch.shader_ref)?;
        let counter = self.perf_counters.start(
            format!("Create Pipeline: {}. Iteration: {}", shader.uid.name(), iteration + 1),
            PIPELINE_CATEGORY,
            true,
        );

        let code = load_shader_code(shader, self.io.as_ref())?;
        let module = GfxShaderModule::from_bytes(&code, shader.uid.name())?;
        let pipeline = Pipeline::new_compute(
            &ComputePipelineInfo {
                debug_name: dispatch.debug_name(),
                shader: &module,
                entry_point: &shader.entry,
                bindings: &dispatch.bindings,
                push_constants_size: shader.push_constants_size,
                spec_constants: &spec_constants(&shader.specialization_constants),
            },
            &self.data_manager,
        )?;

        let push_constants = match &dispatch.push_data_ref {
            Some(guid) => Some(self.data_manager.get_raw_data(guid)?.data()),
            None => None,
        };
        self.compute.register_write_timestamp(*query_count, None);
        self.compute.register_pipeline_fenced(
            &pipeline,
            &self.data_manager,
            &dispatch.bindings,
            push_constants,
            dispatch.implicit_barrier,
            dispatch.dispatch_shape(),
        )?;
        self.compute.register_write_timestamp(*query_count + 1, None);
        *query_count += 2;

        self.pipelines.push(pipeline);
        self.perf_counters.stop(counter);
        log::debug!("Shader Pipeline: {} created", shader.uid);
        Ok(())
    }

    fn setup_dispatch_data_graph(
        &mut self,
        dispatch: &DispatchDataGraphDesc,
        iteration: u32,
        query_count: &mut u32,
    ) -> Result<()> {
        self.create_intermediate_resources(dispatch)?;
        let graph_desc = match self.spec.find_resource(&dispatch.graph_ref) {
            Some(ResourceDesc::Graph(desc)) => desc.clone(),
            _ => return Err(ScenarioError::ResourceNotFound(format!("graph {}", dispatch.graph_ref))),
        };

        let segment_count = self.data_manager.get_graph_module(&dispatch.graph_ref)?.segment_count();
        for segment in 0..segment_count {
            let module = self.data_manager.get_graph_module(&dispatch.graph_ref)?;
            let bindings = module.resolve_bindings(segment, &dispatch.bindings)?;
            let module_name = module.module_name(segment);
            let entry_point = module.entry_point(segment);
            let kind = module.segment_kind(segment);
            let has_spirv = module.has_spirv(segment);
            let spirv = module.spirv(segment).to_vec();
            let dispatch_shape = module.dispatch_shape(segment);
            let constants = module.segment_constants(segment);

            let counter = self.perf_counters.start(
                format!("Create Pipeline: {module_name}. Iteration: {}", iteration + 1),
                PIPELINE_CATEGORY,
                true,
            );

            let (pipeline, push_constants) = match kind {
                SegmentKind::Graph => {
                    let shader = GfxShaderModule::from_code(&spirv, &module_name)?;
                    let pipeline = Pipeline::new_data_graph(
                        &DataGraphPipelineInfo {
                            debug_name: dispatch.debug_name(),
                            shader: &shader,
                            entry_point: &entry_point,
                            bindings: &bindings,
                            constants: &constants,
                            host_visible_session_memory: self.options.session_memory_dump_dir.is_some(),
                        },
                        &self.data_manager,
                    )?;
                    (pipeline, None)
                }
                SegmentKind::Shader => {
                    let push_constants = match dispatch.push_constants.iter().find(|p| p.shader_target == module_name) {
                        Some(map) => Some(self.data_manager.get_raw_data(&map.push_data_ref)?.data()),
                        None => None,
                    };
                    let graph_spec_constants = graph_desc
                        .specialization_constants
                        .iter()
                        .find(|map| map.shader_target == module_name)
                        .map(|map| spec_constants(&map.specialization_constants));

                    let pipeline = if dispatch.shader_substitutions.is_empty() {
                        if !has_spirv {
                            return Err(ScenarioError::config(
                                "No SPIR-V module present and no shader substitution defined.",
                            ));
                        }
                        let shader = GfxShaderModule::from_code(&spirv, &module_name)?;
                        Pipeline::new_compute(
                            &ComputePipelineInfo {
                                debug_name: dispatch.debug_name(),
                                shader: &shader,
                                entry_point: &entry_point,
                                bindings: &bindings,
                                push_constants_size: graph_desc.push_constants_size,
                                spec_constants: &graph_spec_constants.unwrap_or_default(),
                            },
                            &self.data_manager,
                        )?
                    } else {
                        let shader_desc = self
                            .spec
                            .substitution_shader(&dispatch.shader_substitutions, &module_name)
                            .ok_or_else(|| ScenarioError::config("Could not perform shader substitution"))??;
                        if has_spirv {
                            log::warn!("Performing shader substitution despite shader module containing code");
                        }
                        let code = load_shader_code(shader_desc, self.io.as_ref())?;
                        let shader = GfxShaderModule::from_bytes(&code, shader_desc.uid.name())?;
                        Pipeline::new_compute(
                            &ComputePipelineInfo {
                                debug_name: dispatch.debug_name(),
                                shader: &shader,
                                entry_point: &shader_desc.entry,
                                bindings: &bindings,
                                push_constants_size: shader_desc.push_constants_size,
                                spec_constants: &graph_spec_constants
                                    .unwrap_or_else(|| spec_constants(&shader_desc.specialization_constants)),
                            },
                            &self.data_manager,
                        )?
                    };
                    (pipeline, push_constants)
                }
            };

            self.compute.register_write_timestamp(*query_count, None);
            self.compute.register_pipeline_fenced(
                &pipeline,
                &self.data_manager,
                &bindings,
                push_constants,
                dispatch.implicit_barrier,
                dispatch_shape,
            )?;
            self.compute.register_write_timestamp(*query_count + 1, None);
            *query_count += 2;

            self.pipelines.push(pipeline);
            self.perf_counters.stop(counter);
            log::debug!("{kind:?} Pipeline: {module_name} created");
        }
        Ok(())
    }
}

// 执行
impl Scenario {
    /// 重复执行 `repeat_count` 次；`dry_run` 时只录制命令，不提交也不保存输出
    pub fn run(&mut self, repeat_count: u32, dry_run: bool) -> Result<()> {
        for iteration in 0..repeat_count {
            log::debug!("Iteration: {iteration}");
            self.setup_commands(iteration)?;

            if !dry_run {
                if layout_transition::has_aliased_optimal_tensors(&self.spec) {
                    self.handle_aliased_layout_transitions()?;
                }
                self.compute.submit_and_wait(&mut self.perf_counters, iteration)?;
                self.save_profiling_data(iteration, repeat_count)?;
            }

            // 最后一轮之后保留 pipeline，session memory 还需要 dump
            if iteration + 1 < repeat_count {
                self.pipelines.clear();
                self.compute.reset()?;
                self.reset_optimal_image_layouts();
            }
        }
        self.save_results(dry_run)
    }

    fn handle_aliased_layout_transitions(&mut self) -> Result<()> {
        self.compute.prepare_command_buffer()?;
        let data_manager = &self.data_manager;
        let plan = layout_transition::plan_transitions(&self.spec, |guid| {
            data_manager.get_image(guid).ok().map(|image| image.layout())
        })?;
        layout_transition::record_transitions(&plan, &mut self.data_manager, self.compute.command_buffer()?)
    }

    fn reset_optimal_image_layouts(&mut self) {
        for resource in &self.spec.resources {
            if let ResourceDesc::Image(desc) = resource
                && desc.tiling == Some(Tiling::Optimal)
                && let Ok(image) = self.data_manager.get_image_mut(&desc.uid)
            {
                image.reset_layout();
            }
        }
    }

    fn save_profiling_data(&mut self, iteration: u32, repeat_count: u32) -> Result<()> {
        let Some(path) = &self.options.profiling_path else {
            return Ok(());
        };
        let timestamps = self.compute.query_timestamps()?;
        let commands = self.compute.profiled_commands();
        let records = pair_timestamps(&timestamps, &commands, Gfx::get().timestamp_period(), iteration)?;
        self.profiling.extend(records);

        if iteration + 1 == repeat_count {
            self.profiling.write(path)?;
            log::info!("Profiling data stored");
        }
        Ok(())
    }

    /// 性能计数器无论是否 dry run、是否出错都会写出
    pub fn save_results(&mut self, dry_run: bool) -> Result<()> {
        let result = if dry_run { Ok(()) } else { self.store_outputs() };

        if let Some(path) = &self.options.perf_counters_path {
            self.perf_counters.write(path)?;
            log::info!("Performance stats stored");
        }
        result
    }

    fn store_outputs(&mut self) -> Result<()> {
        let counter = self.perf_counters.start("Save Resources", "Save Results", false);
        for resource in &self.spec.resources {
            let Some(dst) = resource.dst() else {
                continue;
            };
            let uid = resource.uid();
            let dst = Path::new(dst);
            match resource {
                ResourceDesc::Buffer(_) => self.data_manager.get_buffer(uid)?.store(self.io.as_ref(), dst)?,
                ResourceDesc::Tensor(_) => self.data_manager.get_tensor(uid)?.store(self.io.as_ref(), dst)?,
                ResourceDesc::Image(_) => self.data_manager.get_image_mut(uid)?.store(self.io.as_ref(), dst)?,
                _ => continue,
            }
            log::debug!("{uid} output stored");
        }
        self.perf_counters.stop(counter);
        log::info!("Results stored");

        if let Some(dir) = &self.options.session_memory_dump_dir {
            std::fs::create_dir_all(dir)?;
            let graph_pipelines = self.pipelines.iter_mut().filter(|pipeline| pipeline.is_data_graph());
            for (pipeline_index, pipeline) in graph_pipelines.enumerate() {
                for memory_index in 0..pipeline.session_memory_count() {
                    let data = pipeline.read_session_memory(memory_index)?;
                    let file = dir.join(format!("Graph_Pipeline_{pipeline_index}_Session_RAM_{memory_index}.txt"));
                    std::fs::write(file, session_memory_hexdump(&data))?;
                }
                log::info!("Session RAM dump stored");
            }
        }
        Ok(())
    }
}

// getters
impl Scenario {
    #[inline]
    pub fn perf_counters(&self) -> &PerfCounters {
        &self.perf_counters
    }

    #[inline]
    pub fn data_manager(&self) -> &DataManager {
        &self.data_manager
    }

    #[inline]
    pub fn spec(&self) -> &ScenarioSpec {
        &self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_memory_hexdump() {
        let data = (0u8..20).collect::<Vec<_>>();
        let dump = session_memory_hexdump(&data);
        assert_eq!(
            dump,
            "\n00000000:   00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F \n00000010:   10 11 12 13 "
        );
        assert_eq!(session_memory_hexdump(&[]), "");
        assert_eq!(session_memory_hexdump(&[0xAB]), "\n00000000:   AB ");
    }

    #[test]
    fn test_frame_boundary_ids() {
        assert_eq!(frame_boundary_id(3, 0, 2, 0), 3);
        assert_eq!(frame_boundary_id(3, 2, 2, 0), 7);
        assert_eq!(frame_boundary_id(3, 2, 2, 1), 5);
        assert_eq!(frame_boundary_id(0, 1, 1, 1), 0);
    }

    #[test]
    fn test_skip_frame_boundary() {
        assert!(!skip_frame_boundary(0, true, true));
        assert!(skip_frame_boundary(1, true, true));
        assert!(!skip_frame_boundary(1, false, true));
        assert!(!skip_frame_boundary(1, true, false));
    }

    #[test]
    fn test_resource_infos() {
        init_log();
        let image: ImageDesc = serde_json::from_str(
            r#"{"uid": "img", "dims": [1, 8, 4, 1], "format": "VK_FORMAT_R8G8B8A8_UNORM",
                "shader_access": "readwrite", "tiling": "OPTIMAL",
                "memory_group": {"id": "group", "offset": 64}}"#,
        )
        .unwrap();
        let tensor: TensorDesc = serde_json::from_str(
            r#"{"uid": "t", "dims": [1, 8, 4, 4], "format": "VK_FORMAT_R8_UINT",
                "shader_access": "readonly", "memory_group": {"id": "group"}}"#,
        )
        .unwrap();

        let mut groups = GroupManager::new();
        groups.add_to_group(&crate::Guid::new("group"), &image.uid, ResourceKind::Image);
        groups.add_to_group(&crate::Guid::new("group"), &tensor.uid, ResourceKind::Tensor);

        let info = image_info(&image, &groups).unwrap();
        assert!(info.is_sampled && info.is_storage && info.is_aliased);
        assert_eq!(info.memory_offset, 64);
        assert_eq!(info.shape, vec![1, 8, 4, 1]);
        assert_eq!(info.tiling, Some(Tiling::Optimal));

        let info = tensor_info(&tensor, &groups).unwrap();
        assert!(info.is_aliased_with_image);
        assert_eq!(info.tiling, Tiling::Linear);
        assert_eq!(info.memory_offset, 0);
    }
}
