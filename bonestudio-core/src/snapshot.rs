//! Per-bone settings captured during a simulation run and restored afterwards.
//!
//! Colliders and exclusions are not captured.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::preset::{Preset, PresetStore};

pub const SNAPSHOT_SECTION: &str = "PlayModeSnapshot";
const SAVED_MARKER: &str = "Saved";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneSettings {
    pub damping: f32,
    pub elasticity: f32,
    pub stiffness: f32,
    pub inert: f32,
    pub radius: f32,
    pub end_offset: Vec3,
    pub gravity: Vec3,
    pub force: Vec3,
}

impl Default for BoneSettings {
    fn default() -> Self { Self::from(&Preset::default()) }
}

impl From<&Preset> for BoneSettings {
    fn from(p: &Preset) -> Self {
        Self {
            damping: p.damping,
            elasticity: p.elasticity,
            stiffness: p.stiffness,
            inert: p.inert,
            radius: p.radius,
            end_offset: p.end_offset,
            gravity: p.gravity,
            force: p.force,
        }
    }
}

const SCALARS: [&str; 5] = ["Damping", "Elasticity", "Stiffness", "Inert", "Radius"];
const VECTORS: [&str; 3] = ["EndOffset", "Gravity", "Force"];

impl BoneSettings {
    fn scalars(&self) -> [f32; 5] {
        [self.damping, self.elasticity, self.stiffness, self.inert, self.radius]
    }

    fn vectors(&self) -> [Vec3; 3] { [self.end_offset, self.gravity, self.force] }
}

fn key(bone: &str, field: &str) -> String { format!("{bone}.{field}") }

/// Store settings for each bone, replacing any previous snapshot.
pub fn save_snapshot(store: &mut PresetStore, bones: &[(String, BoneSettings)]) {
    let ini = store.ini_mut();
    ini.remove_section(SNAPSHOT_SECTION);
    for (bone, s) in bones {
        for (field, v) in SCALARS.iter().zip(s.scalars()) {
            ini.set(SNAPSHOT_SECTION, &key(bone, field), v.to_string());
        }
        for (field, v) in VECTORS.iter().zip(s.vectors()) {
            for (axis, c) in ["X", "Y", "Z"].iter().zip(v.to_array()) {
                ini.set(SNAPSHOT_SECTION, &key(bone, &format!("{field}{axis}")), c.to_string());
            }
        }
    }
    ini.set(SNAPSHOT_SECTION, SAVED_MARKER, "true");
    log::info!("saved play-mode settings for {} bones", bones.len());
}

pub fn has_snapshot(store: &PresetStore) -> bool {
    store.get(SNAPSHOT_SECTION, SAVED_MARKER).is_ok()
}

fn read_bone(store: &PresetStore, bone: &str) -> StoreResult<BoneSettings> {
    let ini = store.ini();
    let f = |field: &str| ini.get_parsed::<f32>(SNAPSHOT_SECTION, &key(bone, field));
    let v = |field: &str| -> StoreResult<Vec3> {
        Ok(Vec3::new(f(&format!("{field}X"))?, f(&format!("{field}Y"))?, f(&format!("{field}Z"))?))
    };
    Ok(BoneSettings {
        damping: f("Damping")?,
        elasticity: f("Elasticity")?,
        stiffness: f("Stiffness")?,
        inert: f("Inert")?,
        radius: f("Radius")?,
        end_offset: v("EndOffset")?,
        gravity: v("Gravity")?,
        force: v("Force")?,
    })
}

/// Read settings for `bones` and delete the snapshot.
///
/// Bones missing from the snapshot are skipped. A malformed value aborts and
/// leaves the snapshot in place.
pub fn take_snapshot<S: AsRef<str>>(
    store: &mut PresetStore,
    bones: &[S],
) -> StoreResult<Vec<(String, BoneSettings)>> {
    let mut out = Vec::new();
    for bone in bones {
        let bone = bone.as_ref();
        match read_bone(store, bone) {
            Ok(s) => out.push((bone.to_string(), s)),
            Err(e) if e.is_not_found() => log::warn!("no saved settings for '{bone}', skipping"),
            Err(e) => return Err(e),
        }
    }
    store.ini_mut().remove_section(SNAPSHOT_SECTION);
    log::info!("restored play-mode settings for {} bones", out.len());
    Ok(out)
}
