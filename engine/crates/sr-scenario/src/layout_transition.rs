//! tensor 与 optimal image 共享内存时的 layout 切换
//!
//! tensor 访问时 image 必须处于 `TENSOR_ALIASING`，image 被 shader 访问时再切换回来。
//! 先根据 scenario 描述生成一个纯数据的计划，再把计划写入当前的 command buffer。

use std::collections::{HashMap, HashSet};

use ash::vk;
use sr_gfx::commands::command_buffer::GfxCommandBuffer;
use sr_gfx::extensions::arm_tensors::IMAGE_LAYOUT_TENSOR_ALIASING_ARM;

use crate::data_manager::DataManager;
use crate::desc::{ImageDesc, ResourceDesc, ScenarioSpec, TensorDesc};
use crate::errors::{Result, ScenarioError};
use crate::guid::Guid;
use crate::types::{ShaderAccessType, Tiling};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub image: Guid,
    pub new_layout: vk::ImageLayout,
}

fn tensors(spec: &ScenarioSpec) -> impl Iterator<Item = &TensorDesc> {
    spec.resources.iter().filter_map(|res| match res {
        ResourceDesc::Tensor(tensor) => Some(tensor),
        _ => None,
    })
}

fn images(spec: &ScenarioSpec) -> impl Iterator<Item = &ImageDesc> {
    spec.resources.iter().filter_map(|res| match res {
        ResourceDesc::Image(image) => Some(image),
        _ => None,
    })
}

/// tensor 的 memory group 指向 image 本身，或者与 image 处于同一个 memory group
fn aliases(tensor: &TensorDesc, image: &ImageDesc) -> bool {
    let Some(group) = tensor.memory_group() else {
        return false;
    };
    group.id == image.uid || image.memory_group.as_ref().is_some_and(|g| g.id == group.id)
}

pub fn has_aliased_optimal_tensors(spec: &ScenarioSpec) -> bool {
    tensors(spec).any(|tensor| tensor.memory_group().is_some() && tensor.tiling == Some(Tiling::Optimal))
}

/// 两个资源是否在同一个 alias group 中
fn same_group(a: &ResourceDesc, b: &ResourceDesc) -> bool {
    match (a, b) {
        (ResourceDesc::Tensor(a), ResourceDesc::Tensor(b)) => {
            a.memory_group().zip(b.memory_group()).is_some_and(|(a, b)| a.id == b.id)
        }
        (ResourceDesc::Tensor(tensor), ResourceDesc::Image(image))
        | (ResourceDesc::Image(image), ResourceDesc::Tensor(tensor)) => aliases(tensor, image),
        (ResourceDesc::Image(a), ResourceDesc::Image(b)) => {
            a.memory_group.as_ref().zip(b.memory_group.as_ref()).is_some_and(|(a, b)| a.id == b.id)
        }
        _ => false,
    }
}

fn explicit_tiling(resource: &ResourceDesc) -> Option<Tiling> {
    match resource {
        ResourceDesc::Tensor(tensor) => tensor.tiling,
        ResourceDesc::Image(image) => image.tiling,
        _ => None,
    }
}

/// 同一个 alias group 中显式指定了 tiling 的成员必须一致，没有指定的成员不参与检查
pub fn validate_alias_tiling(spec: &ScenarioSpec) -> Result<()> {
    let members = spec
        .resources
        .iter()
        .filter_map(|res| explicit_tiling(res).map(|tiling| (res, tiling)))
        .collect::<Vec<_>>();
    for (i, (a, a_tiling)) in members.iter().enumerate() {
        for (b, b_tiling) in &members[i + 1..] {
            if a_tiling != b_tiling && same_group(a, b) {
                return Err(ScenarioError::TilingMismatch(format!(
                    "{} is {:?}, {} is {:?}",
                    a.uid(),
                    a_tiling,
                    b.uid(),
                    b_tiling
                )));
            }
        }
    }
    Ok(())
}

/// compute 与 data graph dispatch 绑定的所有资源
pub fn used_resources(spec: &ScenarioSpec) -> HashSet<&Guid> {
    spec.commands.iter().flat_map(|cmd| cmd.bindings()).map(|binding| &binding.resource_ref).collect()
}

/// 按资源声明的顺序生成 layout 切换，已经处于目标 layout 的 image 不切换
///
/// `current_layout` 返回 image 当前的 layout
pub fn plan_transitions(
    spec: &ScenarioSpec,
    current_layout: impl Fn(&Guid) -> Option<vk::ImageLayout>,
) -> Result<Vec<LayoutTransition>> {
    validate_alias_tiling(spec)?;
    let used = used_resources(spec);

    let mut layouts: HashMap<Guid, vk::ImageLayout> = HashMap::new();
    let mut plan = vec![];
    let mut transition = |image: &Guid, new_layout: vk::ImageLayout| -> Result<()> {
        let current = match layouts.get(image) {
            Some(layout) => *layout,
            None => current_layout(image).ok_or_else(|| ScenarioError::ResourceNotFound(format!("image {image}")))?,
        };
        if current != new_layout {
            plan.push(LayoutTransition {
                image: image.clone(),
                new_layout,
            });
            layouts.insert(image.clone(), new_layout);
        }
        Ok(())
    };

    for resource in spec.resources.iter().filter(|res| used.contains(res.uid())) {
        match resource {
            ResourceDesc::Tensor(tensor) if tensor.tiling == Some(Tiling::Optimal) => {
                for image in images(spec).filter(|image| image.tiling.is_some() && aliases(tensor, image)) {
                    transition(&image.uid, IMAGE_LAYOUT_TENSOR_ALIASING_ARM)?;
                }
            }
            ResourceDesc::Image(image) if image.tiling == Some(Tiling::Optimal) => {
                let aliased = tensors(spec).any(|tensor| tensor.tiling.is_some() && aliases(tensor, image));
                if aliased {
                    let new_layout = if image.shader_access == ShaderAccessType::ReadOnly {
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                    } else {
                        vk::ImageLayout::GENERAL
                    };
                    transition(&image.uid, new_layout)?;
                }
            }
            _ => {}
        }
    }
    Ok(plan)
}

/// 把计划中的切换写入 command buffer，并更新 image 记录的 layout
pub fn record_transitions(
    plan: &[LayoutTransition],
    data_manager: &mut DataManager,
    cmd: &GfxCommandBuffer,
) -> Result<()> {
    for transition in plan {
        log::debug!("transition image {} to {:?}", transition.image, transition.new_layout);
        data_manager.get_image_mut(&transition.image)?.transition_layout(cmd, transition.new_layout);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;

    fn image(uid: &str, tiling: &str, access: &str) -> String {
        format!(
            r#"{{"image": {{"uid": "{uid}", "dims": [1, 8, 8, 1], "format": "VK_FORMAT_R8_UNORM",
                "shader_access": "{access}"{tiling}}}}}"#
        )
    }

    fn tensor(uid: &str, target: &str, tiling: &str) -> String {
        format!(
            r#"{{"tensor": {{"uid": "{uid}", "dims": [1, 8, 8, 1], "format": "VK_FORMAT_R8_UINT",
                "shader_access": "readwrite", "alias_target": {{"resource_ref": "{target}"}}{tiling}}}}}"#
        )
    }

    /// `tiling` 为空时不写入 tiling 字段
    fn tiling(value: &str) -> String {
        if value.is_empty() {
            String::new()
        } else {
            format!(r#", "tiling": "{value}""#)
        }
    }

    fn scenario(resources: &[String], bound: &[&str]) -> ScenarioSpec {
        let bindings = bound
            .iter()
            .enumerate()
            .map(|(id, uid)| format!(r#"{{"set": 0, "id": {id}, "resource_ref": "{uid}"}}"#))
            .collect::<Vec<_>>()
            .join(", ");
        let json = format!(
            r#"{{
            "resources": [{}],
            "commands": [
                {{"dispatch_compute": {{"bindings": [{bindings}], "rangeND": [1], "shader_ref": "s"}}}}
            ]
        }}"#,
            resources.join(", ")
        );
        ScenarioSpec::from_json(&json, Path::new("."), Path::new(".")).unwrap()
    }

    fn pair(tensor_tiling: &str, image_tiling: &str, image_access: &str, bound: &[&str]) -> ScenarioSpec {
        scenario(
            &[
                image("img", &tiling(image_tiling), image_access),
                tensor("t", "img", &tiling(tensor_tiling)),
            ],
            bound,
        )
    }

    #[test]
    fn test_tiling_mismatch() {
        let spec = pair("OPTIMAL", "LINEAR", "readonly", &["t", "img"]);
        assert!(has_aliased_optimal_tensors(&spec));
        assert!(matches!(validate_alias_tiling(&spec), Err(ScenarioError::TilingMismatch(_))));
        let result = plan_transitions(&spec, |_| Some(vk::ImageLayout::GENERAL));
        assert!(matches!(result, Err(ScenarioError::TilingMismatch(_))));
    }

    #[test]
    fn test_mismatch_rejected_before_any_transition() {
        // 第一对 tiling 一致，本可以生成切换；第二对不一致
        let spec = scenario(
            &[
                image("img_a", &tiling("OPTIMAL"), "readonly"),
                tensor("t_a", "img_a", &tiling("OPTIMAL")),
                image("img_b", &tiling("LINEAR"), "readwrite"),
                tensor("t_b", "img_b", &tiling("OPTIMAL")),
            ],
            &["t_a", "img_a", "t_b", "img_b"],
        );
        let queried = Cell::new(0);
        let result = plan_transitions(&spec, |_| {
            queried.set(queried.get() + 1);
            Some(vk::ImageLayout::UNDEFINED)
        });
        assert!(matches!(result, Err(ScenarioError::TilingMismatch(msg)) if msg.contains("img_b")));
        assert_eq!(queried.get(), 0);
    }

    #[test]
    fn test_tiling_checked_across_whole_group() {
        let member = |uid: &str, group: &str, tiling: &str| {
            format!(
                r#"{{"tensor": {{"uid": "{uid}", "dims": [4], "format": "VK_FORMAT_R8_UINT",
                    "shader_access": "readwrite", "memory_group": {{"id": "{group}"}}, "tiling": "{tiling}"}}}}"#
            )
        };
        let spec = scenario(&[member("a", "g", "LINEAR"), member("b", "g", "OPTIMAL")], &[]);
        assert!(matches!(validate_alias_tiling(&spec), Err(ScenarioError::TilingMismatch(_))));

        let spec = scenario(&[member("a", "g1", "LINEAR"), member("b", "g2", "OPTIMAL")], &[]);
        assert!(validate_alias_tiling(&spec).is_ok());

        // 没有显式 tiling 的成员不参与检查
        let spec = pair("", "LINEAR", "readonly", &[]);
        assert!(validate_alias_tiling(&spec).is_ok());
    }

    #[test]
    fn test_plan_for_aliased_pair() {
        let spec = pair("OPTIMAL", "OPTIMAL", "readonly", &["t", "img"]);
        let plan = plan_transitions(&spec, |_| Some(vk::ImageLayout::UNDEFINED)).unwrap();
        assert_eq!(
            plan,
            vec![
                LayoutTransition {
                    image: Guid::new("img"),
                    new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
                LayoutTransition {
                    image: Guid::new("img"),
                    new_layout: IMAGE_LAYOUT_TENSOR_ALIASING_ARM,
                },
            ]
        );
    }

    #[test]
    fn test_only_used_resources_transition() {
        let spec = pair("OPTIMAL", "OPTIMAL", "readwrite", &["t"]);
        let plan = plan_transitions(&spec, |_| Some(vk::ImageLayout::GENERAL)).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].new_layout, IMAGE_LAYOUT_TENSOR_ALIASING_ARM);

        let plan = plan_transitions(&spec, |_| Some(IMAGE_LAYOUT_TENSOR_ALIASING_ARM)).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_no_transition_without_optimal_tensor() {
        let linear = pair("LINEAR", "LINEAR", "readwrite", &["t", "img"]);
        assert!(!has_aliased_optimal_tensors(&linear));
        assert!(plan_transitions(&linear, |_| Some(vk::ImageLayout::GENERAL)).unwrap().is_empty());

        // image 是 optimal，但 tensor 没有指定 tiling
        let untiled = pair("", "OPTIMAL", "readwrite", &["t", "img"]);
        assert!(!has_aliased_optimal_tensors(&untiled));
        assert!(plan_transitions(&untiled, |_| Some(vk::ImageLayout::UNDEFINED)).unwrap().is_empty());

        // 没有别名的 optimal tensor 也不需要切换
        let standalone = scenario(
            &[
                image("img", &tiling("OPTIMAL"), "readonly"),
                r#"{"tensor": {"uid": "t", "dims": [4], "format": "VK_FORMAT_R8_UINT",
                    "shader_access": "readwrite", "tiling": "OPTIMAL"}}"#
                    .to_string(),
            ],
            &["t", "img"],
        );
        assert!(!has_aliased_optimal_tensors(&standalone));
        assert!(plan_transitions(&standalone, |_| Some(vk::ImageLayout::UNDEFINED)).unwrap().is_empty());
    }
}
