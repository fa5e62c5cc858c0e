use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::guid::Guid;
use crate::memory::resource_memory_manager::ResourceMemoryManager;
use crate::types::ResourceKind;

/// 资源到 memory group 的映射
///
/// 同一个 group 的资源共享一个 [`ResourceMemoryManager`]，不在任何 group 中的资源各自拥有独立的 manager。
#[derive(Default)]
pub struct GroupManager {
    /// group -> 成员（按加入顺序）
    groups: IndexMap<Guid, IndexSet<Guid>>,
    resource_group: IndexMap<Guid, Guid>,
    resource_kind: IndexMap<Guid, ResourceKind>,
    managers: IndexMap<Guid, Rc<RefCell<ResourceMemoryManager>>>,
}

impl GroupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重复加入是无害的；一个资源只能属于一个 group，以第一次加入为准
    pub fn add_to_group(&mut self, group: &Guid, resource: &Guid, kind: ResourceKind) {
        if let Some(existing) = self.resource_group.get(resource)
            && existing != group
        {
            log::warn!("resource {resource} already belongs to memory group {existing}, ignoring {group}");
            return;
        }
        self.groups.entry(group.clone()).or_default().insert(resource.clone());
        self.resource_group.insert(resource.clone(), group.clone());
        self.resource_kind.insert(resource.clone(), kind);
    }

    pub fn get_memory_manager(&mut self, resource: &Guid) -> Rc<RefCell<ResourceMemoryManager>> {
        match self.resource_group.get(resource) {
            Some(group) => self.managers.entry(group.clone()).or_default().clone(),
            None => Rc::new(RefCell::new(ResourceMemoryManager::new())),
        }
    }

    pub fn group_of(&self, resource: &Guid) -> Option<&Guid> {
        self.resource_group.get(resource)
    }

    pub fn group_members(&self, group: &Guid) -> impl Iterator<Item = &Guid> {
        self.groups.get(group).into_iter().flatten()
    }

    /// 所在 group 的资源数量（包括自身），不在任何 group 中时为 0
    pub fn alias_count(&self, resource: &Guid) -> usize {
        self.group_of(resource).and_then(|group| self.groups.get(group)).map_or(0, |members| members.len())
    }

    /// 只要声明了 group 就视为别名资源，即使 group 中只有自己
    #[inline]
    pub fn is_aliased(&self, resource: &Guid) -> bool {
        self.alias_count(resource) > 0
    }

    /// 是否与某种类型的资源共享内存
    pub fn is_aliased_to(&self, resource: &Guid, kind: ResourceKind) -> bool {
        self.aliases_of(resource).any(|other| self.resource_kind.get(other) == Some(&kind))
    }

    /// 同一 group 中除自身以外的资源
    pub fn aliases_of<'a>(&'a self, resource: &'a Guid) -> impl Iterator<Item = &'a Guid> + 'a {
        self.group_of(resource)
            .into_iter()
            .flat_map(|group| self.group_members(group))
            .filter(move |other| *other != resource)
    }

    pub fn kind_of(&self, resource: &Guid) -> Option<ResourceKind> {
        self.resource_kind.get(resource).copied()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Guid> {
        self.groups.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_queries() {
        let mut groups = GroupManager::new();
        let (group, tensor, image, lonely) =
            (Guid::new("mem"), Guid::new("tensor"), Guid::new("image"), Guid::new("lonely"));
        groups.add_to_group(&group, &tensor, ResourceKind::Tensor);
        groups.add_to_group(&group, &image, ResourceKind::Image);
        groups.add_to_group(&group, &image, ResourceKind::Image);

        assert_eq!(groups.alias_count(&tensor), 2);
        assert_eq!(groups.alias_count(&image), 2);
        assert!(groups.is_aliased(&image));
        assert!(groups.is_aliased_to(&tensor, ResourceKind::Image));
        assert!(!groups.is_aliased_to(&tensor, ResourceKind::Buffer));
        assert!(!groups.is_aliased_to(&image, ResourceKind::Image));
        assert_eq!(groups.alias_count(&lonely), 0);
        assert!(!groups.is_aliased(&lonely));
        assert_eq!(groups.group_members(&group).count(), 2);
        assert_eq!(groups.aliases_of(&tensor).collect::<Vec<_>>(), vec![&image]);
    }

    #[test]
    fn test_single_member_group_is_aliased() {
        let mut groups = GroupManager::new();
        let buf = Guid::new("buf");
        groups.add_to_group(&Guid::new("g"), &buf, ResourceKind::Buffer);
        assert_eq!(groups.alias_count(&buf), 1);
        assert!(groups.is_aliased(&buf));
        assert!(!groups.is_aliased_to(&buf, ResourceKind::Buffer));
        assert_eq!(groups.aliases_of(&buf).count(), 0);
        assert_eq!(groups.group_of(&buf), Some(&Guid::new("g")));
    }

    #[test]
    fn test_shared_manager() {
        let mut groups = GroupManager::new();
        let group = Guid::new("mem");
        groups.add_to_group(&group, &Guid::new("a"), ResourceKind::Tensor);
        groups.add_to_group(&group, &Guid::new("b"), ResourceKind::Image);

        let a = groups.get_memory_manager(&Guid::new("a"));
        let b = groups.get_memory_manager(&Guid::new("b"));
        assert!(Rc::ptr_eq(&a, &b));
        a.borrow_mut().update_size(100);
        assert_eq!(b.borrow().size(), 100);

        let c = groups.get_memory_manager(&Guid::new("c"));
        let c2 = groups.get_memory_manager(&Guid::new("c"));
        assert!(!Rc::ptr_eq(&c, &c2));
    }
}
