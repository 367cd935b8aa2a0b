use serde::{Deserialize, Serialize};

/// On-disk rig description, one entry per transform in hierarchy order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigDoc {
    #[serde(default)]
    pub name: String,
    pub bones: Vec<BoneDoc>,
    #[serde(default)]
    pub humanoid: Humanoid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Humanoid avatar slots the discovery heuristics care about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Humanoid {
    pub head: Option<String>,
    pub neck: Option<String>,
    pub hips: Option<String>,
}
