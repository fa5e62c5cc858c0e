use ash::vk;
use indexmap::IndexMap;
use sr_gfx::extensions::arm_tensors::DESCRIPTOR_TYPE_TENSOR_ARM;

use crate::barrier::{BufferBarrierData, ImageBarrierData, MemoryBarrierData, TensorBarrierData};
use crate::errors::{Result, ScenarioError};
use crate::graph_module::GraphModuleView;
use crate::guid::Guid;
use crate::memory::GroupManager;
use crate::resources::{Buffer, BufferInfo, Image, ImageInfo, RawData, Tensor, TensorInfo};
use crate::types::ResourceKind;

fn not_found(kind: &str, guid: &Guid) -> ScenarioError {
    ScenarioError::ResourceNotFound(format!("{kind} {guid}"))
}

/// scenario 中所有资源的持有者，按 [`Guid`] 查找
///
/// 资源的内存来自 [`GroupManager`]：同一个 memory group 的资源拿到同一个 manager
#[derive(Default)]
pub struct DataManager {
    buffers: IndexMap<Guid, Buffer>,
    images: IndexMap<Guid, Image>,
    tensors: IndexMap<Guid, Tensor>,
    raw_data: IndexMap<Guid, RawData>,
    graph_modules: IndexMap<Guid, Box<dyn GraphModuleView>>,

    memory_barriers: IndexMap<Guid, MemoryBarrierData>,
    image_barriers: IndexMap<Guid, ImageBarrierData>,
    tensor_barriers: IndexMap<Guid, TensorBarrierData>,
    buffer_barriers: IndexMap<Guid, BufferBarrierData>,

    group_manager: GroupManager,
}

// 创建资源
impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_buffer(&mut self, guid: &Guid, info: &BufferInfo) -> Result<()> {
        let memory = self.group_manager.get_memory_manager(guid);
        let buffer = Buffer::new(info, memory)?;
        self.buffers.insert(guid.clone(), buffer);
        Ok(())
    }

    pub fn create_image(&mut self, guid: &Guid, info: &ImageInfo) -> Result<()> {
        let memory = self.group_manager.get_memory_manager(guid);
        let image = Image::new(info, memory)?;
        self.images.insert(guid.clone(), image);
        Ok(())
    }

    pub fn create_tensor(&mut self, guid: &Guid, info: &TensorInfo) -> Result<()> {
        let memory = self.group_manager.get_memory_manager(guid);
        let tensor = Tensor::new(info, memory)?;
        self.tensors.insert(guid.clone(), tensor);
        Ok(())
    }

    pub fn add_raw_data(&mut self, guid: &Guid, raw_data: RawData) {
        self.raw_data.insert(guid.clone(), raw_data);
    }

    pub fn add_graph_module(&mut self, guid: &Guid, module: Box<dyn GraphModuleView>) {
        self.graph_modules.insert(guid.clone(), module);
    }

    pub fn add_memory_barrier(&mut self, guid: &Guid, barrier: MemoryBarrierData) {
        self.memory_barriers.insert(guid.clone(), barrier);
    }

    pub fn add_image_barrier(&mut self, guid: &Guid, barrier: ImageBarrierData) {
        self.image_barriers.insert(guid.clone(), barrier);
    }

    pub fn add_tensor_barrier(&mut self, guid: &Guid, barrier: TensorBarrierData) {
        self.tensor_barriers.insert(guid.clone(), barrier);
    }

    pub fn add_buffer_barrier(&mut self, guid: &Guid, barrier: BufferBarrierData) {
        self.buffer_barriers.insert(guid.clone(), barrier);
    }
}

// 查询
impl DataManager {
    #[inline]
    pub fn has_buffer(&self, guid: &Guid) -> bool {
        self.buffers.contains_key(guid)
    }

    #[inline]
    pub fn has_image(&self, guid: &Guid) -> bool {
        self.images.contains_key(guid)
    }

    #[inline]
    pub fn has_tensor(&self, guid: &Guid) -> bool {
        self.tensors.contains_key(guid)
    }

    pub fn get_buffer(&self, guid: &Guid) -> Result<&Buffer> {
        self.buffers.get(guid).ok_or_else(|| not_found("buffer", guid))
    }

    pub fn get_buffer_mut(&mut self, guid: &Guid) -> Result<&mut Buffer> {
        self.buffers.get_mut(guid).ok_or_else(|| not_found("buffer", guid))
    }

    pub fn get_image(&self, guid: &Guid) -> Result<&Image> {
        self.images.get(guid).ok_or_else(|| not_found("image", guid))
    }

    pub fn get_image_mut(&mut self, guid: &Guid) -> Result<&mut Image> {
        self.images.get_mut(guid).ok_or_else(|| not_found("image", guid))
    }

    pub fn get_tensor(&self, guid: &Guid) -> Result<&Tensor> {
        self.tensors.get(guid).ok_or_else(|| not_found("tensor", guid))
    }

    pub fn get_tensor_mut(&mut self, guid: &Guid) -> Result<&mut Tensor> {
        self.tensors.get_mut(guid).ok_or_else(|| not_found("tensor", guid))
    }

    pub fn get_raw_data(&self, guid: &Guid) -> Result<&RawData> {
        self.raw_data.get(guid).ok_or_else(|| not_found("raw data", guid))
    }

    pub fn get_graph_module(&self, guid: &Guid) -> Result<&dyn GraphModuleView> {
        self.graph_modules.get(guid).map(|m| m.as_ref()).ok_or_else(|| not_found("graph", guid))
    }

    pub fn get_memory_barrier(&self, guid: &Guid) -> Result<&MemoryBarrierData> {
        self.memory_barriers
            .get(guid)
            .ok_or_else(|| ScenarioError::UnknownBarrierTarget(format!("memory barrier {guid}")))
    }

    pub fn get_image_barrier(&self, guid: &Guid) -> Result<&ImageBarrierData> {
        self.image_barriers
            .get(guid)
            .ok_or_else(|| ScenarioError::UnknownBarrierTarget(format!("image barrier {guid}")))
    }

    pub fn get_tensor_barrier(&self, guid: &Guid) -> Result<&TensorBarrierData> {
        self.tensor_barriers
            .get(guid)
            .ok_or_else(|| ScenarioError::UnknownBarrierTarget(format!("tensor barrier {guid}")))
    }

    pub fn get_buffer_barrier(&self, guid: &Guid) -> Result<&BufferBarrierData> {
        self.buffer_barriers
            .get(guid)
            .ok_or_else(|| ScenarioError::UnknownBarrierTarget(format!("buffer barrier {guid}")))
    }

    pub fn kind_of(&self, guid: &Guid) -> Option<ResourceKind> {
        if self.has_buffer(guid) {
            Some(ResourceKind::Buffer)
        } else if self.has_image(guid) {
            Some(ResourceKind::Image)
        } else if self.has_tensor(guid) {
            Some(ResourceKind::Tensor)
        } else if self.raw_data.contains_key(guid) {
            Some(ResourceKind::RawData)
        } else {
            None
        }
    }

    /// binding 没有显式指定类型时，根据资源推导 descriptor 类型
    pub fn descriptor_type(&self, guid: &Guid) -> Result<vk::DescriptorType> {
        if self.has_buffer(guid) {
            return Ok(vk::DescriptorType::STORAGE_BUFFER);
        }
        if self.has_tensor(guid) {
            return Ok(DESCRIPTOR_TYPE_TENSOR_ARM);
        }
        if let Some(image) = self.images.get(guid) {
            return Ok(if image.is_sampled() {
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            } else {
                vk::DescriptorType::STORAGE_IMAGE
            });
        }
        Err(not_found("resource", guid))
    }
}

// 遍历
impl DataManager {
    pub fn buffers(&self) -> impl Iterator<Item = (&Guid, &Buffer)> {
        self.buffers.iter()
    }

    pub fn images(&self) -> impl Iterator<Item = (&Guid, &Image)> {
        self.images.iter()
    }

    pub fn images_mut(&mut self) -> impl Iterator<Item = (&Guid, &mut Image)> {
        self.images.iter_mut()
    }

    pub fn tensors(&self) -> impl Iterator<Item = (&Guid, &Tensor)> {
        self.tensors.iter()
    }

    #[inline]
    pub fn group_manager(&self) -> &GroupManager {
        &self.group_manager
    }

    #[inline]
    pub fn group_manager_mut(&mut self) -> &mut GroupManager {
        &mut self.group_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr_gfx::commands::barrier::GfxBarrierMask;

    #[test]
    fn test_missing_resources() {
        let data_manager = DataManager::new();
        let guid = Guid::new("missing");
        assert!(!data_manager.has_buffer(&guid));
        assert!(!data_manager.has_image(&guid));
        assert!(!data_manager.has_tensor(&guid));
        assert!(matches!(data_manager.get_buffer(&guid), Err(ScenarioError::ResourceNotFound(_))));
        assert!(matches!(data_manager.get_tensor(&guid), Err(ScenarioError::ResourceNotFound(_))));
        assert!(matches!(data_manager.descriptor_type(&guid), Err(ScenarioError::ResourceNotFound(_))));
        assert!(data_manager.kind_of(&guid).is_none());
    }

    #[test]
    fn test_raw_data_and_barriers() {
        let mut data_manager = DataManager::new();
        let push = Guid::new("push");
        data_manager.add_raw_data(&push, RawData::new("push", vec![1, 2, 3, 4]));
        assert_eq!(data_manager.get_raw_data(&push).unwrap().data(), &[1, 2, 3, 4]);
        assert_eq!(data_manager.kind_of(&push), Some(ResourceKind::RawData));

        let barrier = Guid::new("mem_barrier");
        data_manager.add_memory_barrier(
            &barrier,
            MemoryBarrierData {
                debug_name: "mem_barrier".to_string(),
                mask: GfxBarrierMask::all_commands_read_write(),
            },
        );
        assert!(data_manager.get_memory_barrier(&barrier).is_ok());
        assert!(matches!(
            data_manager.get_image_barrier(&barrier),
            Err(ScenarioError::UnknownBarrierTarget(_))
        ));
    }
}
