//! Rig hierarchy: a flat, ordered list of named nodes with parent links.

pub mod schema;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RigError;
use schema::{Humanoid, RigDoc};

/// Index of a node inside its owning [`Skeleton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanoidSlot {
    Head,
    Neck,
    Hips,
}

impl HumanoidSlot {
    fn key(self) -> &'static str {
        match self {
            HumanoidSlot::Head => "head",
            HumanoidSlot::Neck => "neck",
            HumanoidSlot::Hips => "hips",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    nodes: Vec<Node>,
    head: Option<NodeId>,
    neck: Option<NodeId>,
    hips: Option<NodeId>,
}

impl Skeleton {
    /// Build from a parsed document. Parents must be declared before their children.
    pub fn from_doc(doc: RigDoc) -> Result<Self, RigError> {
        if doc.bones.is_empty() {
            return Err(RigError::Empty);
        }
        let mut skel = Skeleton { name: doc.name, ..Default::default() };
        for bone in doc.bones {
            let parent = match bone.parent {
                Some(p) => Some(skel.find(&p).ok_or_else(|| RigError::UnknownParent {
                    bone: bone.name.clone(),
                    parent: p.clone(),
                })?),
                None => None,
            };
            skel.nodes.push(Node { name: bone.name, parent });
        }
        let Humanoid { head, neck, hips } = doc.humanoid;
        skel.head = skel.resolve_slot(HumanoidSlot::Head, head)?;
        skel.neck = skel.resolve_slot(HumanoidSlot::Neck, neck)?;
        skel.hips = skel.resolve_slot(HumanoidSlot::Hips, hips)?;
        log::debug!("loaded rig '{}' with {} bones", skel.name, skel.nodes.len());
        Ok(skel)
    }

    /// Parentless nodes, for tests and ad-hoc lists.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = names.into_iter().map(|n| Node { name: n.into(), parent: None }).collect();
        Skeleton { nodes, ..Default::default() }
    }

    fn resolve_slot(
        &self,
        slot: HumanoidSlot,
        bone: Option<String>,
    ) -> Result<Option<NodeId>, RigError> {
        match bone {
            None => Ok(None),
            Some(b) => self
                .find(&b)
                .map(Some)
                .ok_or(RigError::UnknownHumanoidBone { slot: slot.key(), bone: b }),
        }
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn nodes(&self) -> &[Node] { &self.nodes }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ { (0..self.nodes.len()).map(NodeId) }

    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id.0) }

    pub fn contains(&self, id: NodeId) -> bool { id.0 < self.nodes.len() }

    /// Display name, or `"?"` for ids from another rig.
    pub fn name_of(&self, id: NodeId) -> &str {
        self.node(id).map(|n| n.name.as_str()).unwrap_or("?")
    }

    /// First node with exactly this name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.ids().filter(|&c| self.nodes[c.0].parent == Some(id)).collect()
    }

    /// Depth-first walk of the subtree rooted at `id`, `id` first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            let mut kids = self.children(cur);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    pub fn humanoid_bone(&self, slot: HumanoidSlot) -> Option<NodeId> {
        match slot {
            HumanoidSlot::Head => self.head,
            HumanoidSlot::Neck => self.neck,
            HumanoidSlot::Hips => self.hips,
        }
    }
}

pub fn load_from_yaml_str(s: &str) -> Result<Skeleton, RigError> {
    let doc: RigDoc = serde_yaml::from_str(s)?;
    Skeleton::from_doc(doc)
}

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Skeleton, RigError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .map_err(|source| RigError::Io { path: path.to_path_buf(), source })?;
    load_from_yaml_str(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIG: &str = r#"
name: Kaori
bones:
  - name: Hips
  - name: Spine
    parent: Hips
  - name: Neck
    parent: Spine
  - name: Head
    parent: Neck
  - name: Hair_Root
    parent: Head
  - name: Hair_Front
    parent: Hair_Root
  - name: Skirt
    parent: Hips
humanoid:
  head: Head
  neck: Neck
  hips: Hips
"#;

    #[test]
    fn loads_hierarchy_and_humanoid_slots() {
        let rig = load_from_yaml_str(RIG).unwrap();
        assert_eq!(rig.name, "Kaori");
        assert_eq!(rig.len(), 7);
        let head = rig.humanoid_bone(HumanoidSlot::Head).unwrap();
        assert_eq!(rig.name_of(head), "Head");
        assert_eq!(rig.node(rig.find("Hair_Root").unwrap()).unwrap().parent, Some(head));
    }

    #[test]
    fn descendants_are_depth_first_self_first() {
        let rig = load_from_yaml_str(RIG).unwrap();
        let hips = rig.find("Hips").unwrap();
        let names: Vec<_> = rig.descendants(hips).into_iter().map(|id| rig.name_of(id)).collect();
        assert_eq!(names, ["Hips", "Spine", "Neck", "Head", "Hair_Root", "Hair_Front", "Skirt"]);
    }

    #[test]
    fn parent_must_be_declared_first() {
        let yaml = "bones:\n  - name: A\n    parent: B\n  - name: B\n";
        let err = load_from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RigError::UnknownParent { .. }));
    }

    #[test]
    fn unknown_humanoid_bone_is_rejected() {
        let err = load_from_yaml_str("bones:\n  - name: A\nhumanoid:\n  head: Head\n").unwrap_err();
        assert!(matches!(err, RigError::UnknownHumanoidBone { slot: "head", .. }));
    }

    #[test]
    fn empty_rig_is_rejected() {
        assert!(matches!(load_from_yaml_str("bones: []").unwrap_err(), RigError::Empty));
    }
}
