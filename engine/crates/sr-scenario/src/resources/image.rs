use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use sr_gfx::commands::barrier::GfxImageBarrier;
use sr_gfx::commands::command_buffer::GfxCommandBuffer;
use sr_gfx::descriptors::sampler::GfxSampler;
use sr_gfx::extensions::arm_tensors::IMAGE_USAGE_TENSOR_ALIASING_ARM;
use sr_gfx::gfx::Gfx;
use sr_gfx::resources::buffer::GfxBuffer;

use crate::errors::{Result, ScenarioError};
use crate::format;
use crate::io::ResourceIo;
use crate::memory::ResourceMemoryManager;
use crate::types::{SamplerSettings, Tiling};

pub struct ImageInfo {
    pub debug_name: String,
    /// `[N, W, H, D]`
    pub shape: Vec<i64>,
    pub format: vk::Format,
    /// 有输入文件，需要作为 transfer dst
    pub is_input: bool,
    pub is_sampled: bool,
    pub is_storage: bool,
    pub is_aliased: bool,
    pub mips: u32,
    pub tiling: Option<Tiling>,
    pub sampler_settings: SamplerSettings,
    pub memory_offset: vk::DeviceSize,
}

/// image 当前所处的 layout
///
/// 只在 layout 真正变化时才需要 barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageLayoutState {
    current: vk::ImageLayout,
}
impl Default for ImageLayoutState {
    fn default() -> Self {
        Self {
            current: vk::ImageLayout::UNDEFINED,
        }
    }
}
impl ImageLayoutState {
    #[inline]
    pub fn current(&self) -> vk::ImageLayout {
        self.current
    }

    /// 返回需要执行的 `(old, new)`，layout 没有变化时返回 None
    pub fn transition(&mut self, new_layout: vk::ImageLayout) -> Option<(vk::ImageLayout, vk::ImageLayout)> {
        if self.current == new_layout {
            return None;
        }
        let old_layout = std::mem::replace(&mut self.current, new_layout);
        Some((old_layout, new_layout))
    }

    /// 不产生 barrier，直接记录新的 layout
    #[inline]
    pub fn set(&mut self, layout: vk::ImageLayout) {
        self.current = layout;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.current = vk::ImageLayout::UNDEFINED;
    }
}

/// mip 数量在 `1..=floor(log2(max(w, h))) + 1` 之间，带 mip 的 image 不能被别名
pub fn validate_mips(mips: u32, width: u32, height: u32, is_aliased: bool) -> Result<()> {
    if mips == 0 {
        return Err(ScenarioError::config("Number of mips cannot be 0"));
    }
    let max_mips = width.max(height).max(1).ilog2() + 1;
    if mips > max_mips {
        return Err(ScenarioError::config(format!(
            "Number of mips {mips} exceeds maximum number allowed for the image size ({max_mips})"
        )));
    }
    if is_aliased && mips > 1 {
        return Err(ScenarioError::config("A mipped image cannot be aliased"));
    }
    Ok(())
}

/// 选择 image tiling
///
/// - 指定了 tiling：检查 format feature 是否满足
/// - 没有指定：优先 linear，其次 optimal
pub fn select_tiling(
    explicit: Option<Tiling>,
    format_props: &vk::FormatProperties,
    required: vk::FormatFeatureFlags,
    mips: u32,
    linear_max_mips: u32,
    is_aliased: bool,
) -> Result<vk::ImageTiling> {
    let linear_ok = format_props.linear_tiling_features.contains(required);
    let optimal_ok = format_props.optimal_tiling_features.contains(required);
    match explicit {
        Some(Tiling::Linear) if !linear_ok => {
            Err(ScenarioError::config("Tiling type: LINEAR is not supported for this format type"))
        }
        Some(Tiling::Optimal) if !optimal_ok => {
            Err(ScenarioError::config("Tiling type: OPTIMAL is not supported for this format type"))
        }
        Some(tiling) => {
            if tiling == Tiling::Optimal && is_aliased {
                log::info!("Allowing OPTIMAL tiling with aliasing for image");
            }
            Ok(tiling.to_vk_image())
        }
        None if linear_ok && mips <= linear_max_mips => Ok(vk::ImageTiling::LINEAR),
        None if optimal_ok => Ok(vk::ImageTiling::OPTIMAL),
        None => Err(ScenarioError::config("No supported tiling for this data type")),
    }
}

/// 每一级 mip 的宽高，向下取整且最小为 1
pub fn mip_extents(width: u32, height: u32, mips: u32) -> Vec<(u32, u32)> {
    (0..mips).map(|level| ((width >> level).max(1), (height >> level).max(1))).collect_vec()
}

pub struct Image {
    handle: vk::Image,
    view: vk::ImageView,
    mip_views: Vec<vk::ImageView>,
    sampler: GfxSampler,
    staging: GfxBuffer,

    extent: vk::Extent3D,
    shape: Vec<i64>,
    format: vk::Format,
    tiling: vk::ImageTiling,
    explicit_tiling: Option<Tiling>,
    mips: u32,
    is_sampled: bool,
    is_aliased: bool,
    layout: ImageLayoutState,

    memory_offset: vk::DeviceSize,
    memory: Rc<RefCell<ResourceMemoryManager>>,
    debug_name: String,
}

// 创建与销毁
impl Image {
    pub fn new(info: &ImageInfo, memory: Rc<RefCell<ResourceMemoryManager>>) -> Result<Self> {
        if info.shape.len() != 4 {
            return Err(ScenarioError::ShapeMismatch(format!(
                "image {} expects [N, W, H, D] dims, got {:?}",
                info.debug_name, info.shape
            )));
        }
        let extent = vk::Extent3D {
            width: info.shape[1] as u32,
            height: info.shape[2] as u32,
            depth: info.shape[3] as u32,
        };
        validate_mips(info.mips, extent.width, extent.height, info.is_aliased)?;

        let mut usage = vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        let mut required = vk::FormatFeatureFlags::empty();
        if info.is_input {
            required |= vk::FormatFeatureFlags::TRANSFER_DST;
        }
        if info.is_sampled {
            usage |= vk::ImageUsageFlags::SAMPLED;
            required |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
        }
        if info.is_storage {
            usage |= vk::ImageUsageFlags::STORAGE;
            required |= vk::FormatFeatureFlags::STORAGE_IMAGE | vk::FormatFeatureFlags::TRANSFER_SRC;
        }
        if info.mips > 1 {
            required |= vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST;
        }

        // stencil 被丢弃
        let format = if info.format == vk::Format::D32_SFLOAT_S8_UINT {
            vk::Format::D32_SFLOAT
        } else {
            info.format
        };

        let gfx = Gfx::get();
        let max_mips = |tiling: vk::ImageTiling| {
            gfx.image_format_properties(format, tiling, usage).map_or(0, |props| props.max_mip_levels)
        };
        let tiling = select_tiling(
            info.tiling,
            &gfx.format_properties(format),
            required,
            info.mips,
            max_mips(vk::ImageTiling::LINEAR),
            info.is_aliased,
        )?;
        if info.mips > max_mips(tiling) {
            return Err(ScenarioError::config(format!(
                "The mip level provided is not supported for {}",
                info.debug_name
            )));
        }
        if info.is_aliased && tiling != vk::ImageTiling::LINEAR {
            usage |= IMAGE_USAGE_TENSOR_ALIASING_ARM;
        }

        let sampler_info = info.sampler_settings.to_gfx(info.mips);
        if sampler_info.is_custom_border_color() && !gfx.optional_exts().custom_border_color {
            return Err(ScenarioError::config(
                "Error sampler custom border color extension is unsupported on this device/driver",
            ));
        }

        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(info.mips)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(tiling)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let gfx_device = gfx.gfx_device();
        let handle = unsafe { gfx_device.create_image(&image_ci, None)? };
        // 之后的步骤失败时销毁 image
        let handle_guard = scopeguard::guard(handle, |handle| unsafe {
            Gfx::get().gfx_device().destroy_image(handle, None);
        });
        gfx_device.set_object_debug_name(handle, format!("Image::{}", info.debug_name));

        let sampler = GfxSampler::new(&sampler_info, &info.debug_name)?;

        let reqs = unsafe { gfx_device.get_image_memory_requirements(handle) };
        {
            let mut memory = memory.borrow_mut();
            memory.update_size(reqs.size + info.memory_offset);
            memory.update_type_mask(reqs.memory_type_bits);

            if info.mips == 1 && tiling == vk::ImageTiling::LINEAR {
                let subresource = vk::ImageSubresource {
                    aspect_mask: format::aspect_mask(format),
                    mip_level: 0,
                    array_layer: 0,
                };
                let layout = unsafe { gfx_device.get_image_subresource_layout(handle, subresource) };
                memory.update_subresource_layout(layout.offset, layout.row_pitch, layout.depth_pitch, layout.array_pitch);
            }
            memory.update_format(format);
            memory.update_image_type(vk::ImageType::TYPE_2D);
        }

        let data_size = format::element_size(format)? as u64 * format::total_elements(&info.shape);
        let staging = GfxBuffer::new_stage_buffer(data_size, format!("{}-staging", info.debug_name))?;

        Ok(Self {
            handle: scopeguard::ScopeGuard::into_inner(handle_guard),
            view: vk::ImageView::null(),
            mip_views: Vec::new(),
            sampler,
            staging,
            extent,
            shape: info.shape.clone(),
            format,
            tiling,
            explicit_tiling: info.tiling,
            mips: info.mips,
            is_sampled: info.is_sampled,
            is_aliased: info.is_aliased,
            layout: ImageLayoutState::default(),
            memory_offset: info.memory_offset,
            memory,
            debug_name: info.debug_name.clone(),
        })
    }

    /// 别名的 image 需要 host 可见，否则使用 device local
    pub fn allocate_memory(&mut self) -> Result<()> {
        let flags = if self.is_aliased {
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
        } else {
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        };
        let gfx_device = Gfx::get().gfx_device();
        {
            let mut memory = self.memory.borrow_mut();
            memory.allocate(flags)?;
            let offset = memory.memory_offset()? + self.memory_offset;
            unsafe { gfx_device.bind_image_memory(self.handle, memory.device_memory()?, offset)? };
        }

        self.view = self.create_view(0, self.mips, "default")?;
        if self.mips > 1 {
            for level in 0..self.mips {
                let view = self.create_view(level, 1, &format!("mip {level}"))?;
                self.mip_views.push(view);
            }
        }
        Ok(())
    }

    fn create_view(&self, base_mip_level: u32, level_count: u32, label: &str) -> Result<vk::ImageView> {
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(self.handle)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: format::aspect_mask(self.format),
                base_mip_level,
                level_count,
                base_array_layer: 0,
                layer_count: 1,
            });
        let gfx_device = Gfx::get().gfx_device();
        let view = unsafe { gfx_device.create_image_view(&view_ci, None)? };
        gfx_device.set_object_debug_name(view, format!("{} view ({})", self.debug_name, label));
        Ok(view)
    }
}
impl Drop for Image {
    fn drop(&mut self) {
        let gfx_device = Gfx::get().gfx_device();
        unsafe {
            for view in self.mip_views.drain(..) {
                gfx_device.destroy_image_view(view, None);
            }
            if self.view != vk::ImageView::null() {
                gfx_device.destroy_image_view(self.view, None);
            }
            gfx_device.destroy_image(self.handle, None);
        }
    }
}

// getters
impl Image {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// 某一级 mip 的 view
    pub fn image_view(&self, lod: u32) -> Result<vk::ImageView> {
        if lod >= self.mips {
            return Err(ScenarioError::config(format!(
                "Requested level of details for the Image is greater than configured mipmaps. \
                 MipMaps configured: {}, lod index requested: {}",
                self.mips, lod
            )));
        }
        Ok(self.mip_views.get(lod as usize).copied().unwrap_or(self.view))
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        self.extent
    }

    #[inline]
    pub fn tiling(&self) -> vk::ImageTiling {
        self.tiling
    }

    /// 描述文件中显式指定的 tiling
    #[inline]
    pub fn explicit_tiling(&self) -> Option<Tiling> {
        self.explicit_tiling
    }

    #[inline]
    pub fn mips(&self) -> u32 {
        self.mips
    }

    #[inline]
    pub fn is_sampled(&self) -> bool {
        self.is_sampled
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout.current()
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn data_size(&self) -> Result<u64> {
        Ok(format::element_size(self.format)? as u64 * format::total_elements(&self.shape))
    }

    #[inline]
    pub fn mem_size(&self) -> u64 {
        self.memory.borrow().size()
    }
}

// layout
impl Image {
    /// layout 已经是目标值时什么都不做
    pub fn transition_layout(&mut self, cmd: &GfxCommandBuffer, new_layout: vk::ImageLayout) {
        let Some((old_layout, new_layout)) = self.layout.transition(new_layout) else {
            return;
        };

        let src_stage = vk::PipelineStageFlags2::COMPUTE_SHADER;
        let src_access = vk::AccessFlags2::SHADER_WRITE;
        let dst_stage = vk::PipelineStageFlags2::FRAGMENT_SHADER | vk::PipelineStageFlags2::COMPUTE_SHADER;
        let dst_access = vk::AccessFlags2::SHADER_READ;

        let memory_barrier = vk::MemoryBarrier2::default()
            .src_stage_mask(src_stage)
            .src_access_mask(src_access)
            .dst_stage_mask(dst_stage)
            .dst_access_mask(dst_access);
        let image_barrier = GfxImageBarrier::new()
            .src_mask(src_stage, src_access)
            .dst_mask(dst_stage, dst_access)
            .layout_transfer(old_layout, new_layout)
            .image(self.handle);
        cmd.pipeline_barrier(&[memory_barrier], &[image_barrier], &[], &[]);
    }

    #[inline]
    pub fn reset_layout(&mut self) {
        self.layout.reset();
    }
}

// 数据传输
impl Image {
    fn copy_region(&self) -> vk::BufferImageCopy {
        vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: format::aspect_mask(self.format),
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: self.extent,
        }
    }

    /// 写入 mip 0，然后逐级 blit 生成其余的 mip，最终停在 General layout
    pub fn fill(&mut self, data: &[u8]) -> Result<()> {
        let data_size = self.data_size()?;
        if data.len() as u64 != data_size {
            return Err(ScenarioError::SizeMismatch {
                what: format!("image {} input", self.debug_name),
                expected: data_size,
                actual: data.len() as u64,
            });
        }
        self.staging.write_bytes(data)?;

        let target_layout = vk::ImageLayout::GENERAL;
        let aspect = format::aspect_mask(self.format);
        let host_access = vk::AccessFlags2::MEMORY_READ
            | vk::AccessFlags2::MEMORY_WRITE
            | vk::AccessFlags2::HOST_READ
            | vk::AccessFlags2::HOST_WRITE;
        let memory_barrier = vk::MemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .src_access_mask(host_access)
            .dst_stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)
            .dst_access_mask(host_access);
        let to_transfer_src = |level: u32| {
            GfxImageBarrier::new()
                .image(self.handle)
                .image_aspect_flag(aspect)
                .mip_range(level, 1)
                .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .src_mask(vk::PipelineStageFlags2::ALL_TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                .dst_mask(vk::PipelineStageFlags2::ALL_TRANSFER, vk::AccessFlags2::TRANSFER_READ)
        };
        let region = self.copy_region();
        let extents = mip_extents(self.extent.width, self.extent.height, self.mips);

        Gfx::get().one_time_exec(
            |cmd| {
                let to_transfer_dst = GfxImageBarrier::new()
                    .image(self.handle)
                    .image_aspect_flag(aspect)
                    .mip_range(0, self.mips)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE)
                    .dst_mask(vk::PipelineStageFlags2::ALL_TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
                cmd.pipeline_barrier(&[memory_barrier], &[to_transfer_dst], &[], &[]);
                cmd.cmd_copy_buffer_to_image(
                    self.staging.vk_buffer(),
                    self.handle,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(&region),
                );

                for (level, ((src_w, src_h), (dst_w, dst_h))) in extents.iter().tuple_windows().enumerate() {
                    let level = level as u32 + 1;
                    cmd.pipeline_barrier(&[memory_barrier], &[to_transfer_src(level - 1)], &[], &[]);

                    let subresource = |mip_level| vk::ImageSubresourceLayers {
                        aspect_mask: aspect,
                        mip_level,
                        base_array_layer: 0,
                        layer_count: 1,
                    };
                    let blit = vk::ImageBlit2::default()
                        .src_subresource(subresource(level - 1))
                        .src_offsets([
                            vk::Offset3D::default(),
                            vk::Offset3D {
                                x: *src_w as i32,
                                y: *src_h as i32,
                                z: 1,
                            },
                        ])
                        .dst_subresource(subresource(level))
                        .dst_offsets([
                            vk::Offset3D::default(),
                            vk::Offset3D {
                                x: *dst_w as i32,
                                y: *dst_h as i32,
                                z: 1,
                            },
                        ]);
                    let blit_info = vk::BlitImageInfo2::default()
                        .src_image(self.handle)
                        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                        .dst_image(self.handle)
                        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .regions(std::slice::from_ref(&blit))
                        .filter(vk::Filter::LINEAR);
                    cmd.cmd_blit_image(&blit_info);
                }

                cmd.pipeline_barrier(&[memory_barrier], &[to_transfer_src(self.mips - 1)], &[], &[]);
                let to_target = GfxImageBarrier::new()
                    .image(self.handle)
                    .image_aspect_flag(aspect)
                    .mip_range(0, self.mips)
                    .layout_transfer(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, target_layout)
                    .src_mask(vk::PipelineStageFlags2::ALL_TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .dst_mask(vk::PipelineStageFlags2::ALL_COMMANDS, vk::AccessFlags2::TRANSFER_READ);
                cmd.pipeline_barrier(&[memory_barrier], &[to_target], &[], &[]);
            },
            format!("fill-{}", self.debug_name),
        )?;

        self.layout.set(target_layout);
        Ok(())
    }

    pub fn fill_zero(&mut self) -> Result<()> {
        let zeros = vec![0u8; self.data_size()? as usize];
        self.fill(&zeros)
    }

    pub fn fill_from_file(&mut self, io: &dyn ResourceIo, path: &Path) -> Result<()> {
        let data = io.load_image(path, self.format)?;
        self.fill(&data)
    }

    /// 把 mip 0 拷贝到 staging buffer 后读回
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let region = self.copy_region();
        let handle = self.handle;
        let staging = self.staging.vk_buffer();
        let name = format!("store-{}", self.debug_name);
        Gfx::get().one_time_exec(
            |cmd| {
                self.transition_layout(cmd, vk::ImageLayout::GENERAL);
                cmd.cmd_copy_image_to_buffer(handle, vk::ImageLayout::GENERAL, staging, std::slice::from_ref(&region));
            },
            name,
        )?;

        let mut data = self.staging.read_bytes()?;
        data.truncate(self.data_size()? as usize);
        Ok(data)
    }

    pub fn store(&mut self, io: &dyn ResourceIo, path: &Path) -> Result<()> {
        let data = self.read_bytes()?;
        io.store_image(path, &data, self.extent, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_transition_noop() {
        let mut state = ImageLayoutState::default();
        assert_eq!(
            state.transition(vk::ImageLayout::GENERAL),
            Some((vk::ImageLayout::UNDEFINED, vk::ImageLayout::GENERAL))
        );
        assert_eq!(state.transition(vk::ImageLayout::GENERAL), None);
        assert_eq!(state.current(), vk::ImageLayout::GENERAL);
        state.reset();
        assert_eq!(state.current(), vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn test_validate_mips() {
        assert!(validate_mips(1, 16, 16, true).is_ok());
        assert!(validate_mips(5, 16, 8, false).is_ok());
        assert!(validate_mips(6, 16, 8, false).is_err());
        assert!(validate_mips(0, 16, 16, false).is_err());
        assert!(validate_mips(2, 16, 16, true).is_err());
    }

    #[test]
    fn test_select_tiling() {
        let props = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::TRANSFER_DST,
            optimal_tiling_features: vk::FormatFeatureFlags::TRANSFER_DST | vk::FormatFeatureFlags::SAMPLED_IMAGE,
            ..Default::default()
        };
        let transfer = vk::FormatFeatureFlags::TRANSFER_DST;
        let sampled = transfer | vk::FormatFeatureFlags::SAMPLED_IMAGE;

        assert_eq!(select_tiling(None, &props, transfer, 1, 1, false).unwrap(), vk::ImageTiling::LINEAR);
        // linear 不支持足够多的 mip
        assert_eq!(select_tiling(None, &props, transfer, 2, 1, false).unwrap(), vk::ImageTiling::OPTIMAL);
        assert_eq!(select_tiling(None, &props, sampled, 1, 1, false).unwrap(), vk::ImageTiling::OPTIMAL);
        assert!(select_tiling(Some(Tiling::Linear), &props, sampled, 1, 1, false).is_err());
        assert_eq!(
            select_tiling(Some(Tiling::Optimal), &props, sampled, 1, 1, true).unwrap(),
            vk::ImageTiling::OPTIMAL
        );
        let storage = vk::FormatFeatureFlags::STORAGE_IMAGE;
        assert!(select_tiling(None, &props, storage, 1, 1, false).is_err());
    }

    #[test]
    fn test_mip_extents() {
        assert_eq!(mip_extents(16, 4, 5), vec![(16, 4), (8, 2), (4, 1), (2, 1), (1, 1)]);
        assert_eq!(mip_extents(7, 7, 1), vec![(7, 7)]);
    }
}
