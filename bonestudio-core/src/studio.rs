//! Turns discovered bones and stored presets into a setup plan for the host editor.

use serde::Serialize;

use crate::preset::{Preset, HAIR_PRESET};
use crate::rig::{NodeId, Skeleton};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hair,
    Accessory,
}

/// One spring component to attach: `bone` hosts it and is also its chain root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneAssignment {
    pub bone: String,
    #[serde(skip)]
    pub node: NodeId,
    pub role: Role,
    pub preset: Preset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupPlan {
    pub rig: String,
    /// Existing spring components anywhere under the avatar are removed first.
    pub replace_existing: bool,
    pub assignments: Vec<BoneAssignment>,
}

impl SetupPlan {
    pub fn bones(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.bone.as_str())
    }
}

/// Hair root gets the `Hair` preset when one is stored; accessories get defaults.
pub fn plan_setup(
    rig: &Skeleton,
    hair_root: Option<NodeId>,
    accessories: &[NodeId],
    presets: &[Preset],
) -> SetupPlan {
    let mut assignments = Vec::new();
    match hair_root.filter(|&id| rig.contains(id)) {
        Some(id) => {
            let preset = presets.iter().find(|p| p.name == HAIR_PRESET).cloned().unwrap_or_else(|| {
                log::warn!("no '{HAIR_PRESET}' preset stored, hair uses default settings");
                Preset::named(HAIR_PRESET)
            });
            let bone = rig.name_of(id).to_string();
            assignments.push(BoneAssignment { bone, node: id, role: Role::Hair, preset });
        }
        None => log::warn!("no hair root set, only accessories will get spring bones"),
    }
    for &id in accessories {
        if !rig.contains(id) {
            log::warn!("accessory {:?} is not part of rig '{}', skipping", id, rig.name);
            continue;
        }
        if assignments.iter().any(|a| a.node == id) {
            continue;
        }
        let bone = rig.name_of(id).to_string();
        let preset = Preset::named(&bone);
        assignments.push(BoneAssignment { preset, bone, node: id, role: Role::Accessory });
    }
    log::info!("planned {} spring bones for '{}'", assignments.len(), rig.name);
    SetupPlan { rig: rig.name.clone(), replace_existing: true, assignments }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hair_uses_stored_preset_and_accessories_get_defaults() {
        let rig = Skeleton::from_names(["Hair_Root", "Skirt", "Tail"]);
        let stored = Preset { stiffness: 0.7, ..Preset::hair() };
        let plan = plan_setup(&rig, Some(NodeId(0)), &[NodeId(1), NodeId(2)], &[stored.clone()]);
        assert!(plan.replace_existing);
        assert_eq!(plan.bones().collect::<Vec<_>>(), ["Hair_Root", "Skirt", "Tail"]);
        assert_eq!(plan.assignments[0].preset, stored);
        assert_eq!(plan.assignments[1].role, Role::Accessory);
        assert_eq!(plan.assignments[1].preset.damping, Preset::default().damping);
    }

    #[test]
    fn missing_hair_root_plans_accessories_only() {
        let rig = Skeleton::from_names(["Skirt"]);
        let plan = plan_setup(&rig, None, &[NodeId(0), NodeId(5)], &[]);
        assert_eq!(plan.bones().collect::<Vec<_>>(), ["Skirt"]);
    }

    #[test]
    fn hair_root_is_not_doubled_as_accessory() {
        let rig = Skeleton::from_names(["Hair"]);
        let plan = plan_setup(&rig, Some(NodeId(0)), &[NodeId(0)], &[]);
        assert_eq!(plan.assignments.len(), 1);
        assert_eq!(plan.assignments[0].role, Role::Hair);
    }

    #[test]
    fn plan_serializes_without_internal_ids() {
        let rig = Skeleton::from_names(["Tail"]);
        let json = serde_json::to_value(plan_setup(&rig, None, &[NodeId(0)], &[])).unwrap();
        assert_eq!(json["assignments"][0]["bone"], "Tail");
        assert_eq!(json["assignments"][0]["role"], "accessory");
        assert!(json["assignments"][0].get("node").is_none());
    }
}
