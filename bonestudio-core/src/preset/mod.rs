//! Named spring-bone presets and the per-project preset file.

pub mod validate;

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::ini::IniFile;
use crate::matcher::Whitelist;
use crate::rig::{NodeId, Skeleton};
use validate::{PresetChecks, ValidateExt};

pub const WHITELIST_SECTION: &str = "AccessoryWhitelist";
pub const PRESET_SECTION_PREFIX: &str = "DynamicBonePreset:";
pub const SELECTION_SECTION: &str = "AccessorySelection";
pub const HAIR_PRESET: &str = "Hair";

/// Physics parameters for one spring-bone chain.
///
/// `colliders` and `exclusions` hold bone names in the host hierarchy; the
/// preset does not own those bones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub name: String,
    pub update_rate: f32,
    pub damping: f32,
    pub elasticity: f32,
    pub stiffness: f32,
    pub inert: f32,
    pub radius: f32,
    pub end_length: f32,
    pub end_offset: Vec3,
    pub gravity: Vec3,
    pub force: Vec3,
    pub colliders: Vec<String>,
    pub exclusions: Vec<String>,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: String::new(),
            update_rate: 60.0,
            damping: 0.1,
            elasticity: 0.1,
            stiffness: 0.1,
            inert: 0.0,
            radius: 0.0,
            end_length: 0.0,
            end_offset: Vec3::ZERO,
            gravity: Vec3::ZERO,
            force: Vec3::ZERO,
            colliders: Vec::new(),
            exclusions: Vec::new(),
        }
    }
}

impl Preset {
    pub fn named(name: &str) -> Self { Self { name: name.to_string(), ..Self::default() } }

    /// Built-in hair chain: stiff, lightly damped, barely elastic.
    pub fn hair() -> Self {
        Self {
            name: HAIR_PRESET.to_string(),
            update_rate: 60.0,
            damping: 0.2,
            elasticity: 0.05,
            stiffness: 0.8,
            inert: 0.0,
            radius: 0.0,
            ..Self::default()
        }
    }

    /// Set one field from text. Accepts the file key (`Damp`) or the field name (`damping`).
    pub fn set_field(&mut self, field: &str, value: &str) -> StoreResult<()> {
        let section = section_name(&self.name);
        let Some(key) = Key::from_field(field) else {
            return Err(StoreError::not_found(&section, field));
        };
        let f = |k: Key| parse_f32(&section, k.as_str(), value);
        match key {
            Key::UpdateRate => self.update_rate = f(key)?,
            Key::Damp => self.damping = f(key)?,
            Key::Elasticity => self.elasticity = f(key)?,
            Key::Stiff => self.stiffness = f(key)?,
            Key::Inert => self.inert = f(key)?,
            Key::Radius => self.radius = f(key)?,
            Key::EndLength => self.end_length = f(key)?,
            Key::EndOffset => self.end_offset = parse_vec3(&section, key.as_str(), value)?,
            Key::Gravity => self.gravity = parse_vec3(&section, key.as_str(), value)?,
            Key::Force => self.force = parse_vec3(&section, key.as_str(), value)?,
            Key::Colliders => self.colliders = split_list(value),
            Key::Exclusions => self.exclusions = split_list(value),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    UpdateRate,
    Damp,
    Elasticity,
    Stiff,
    Inert,
    Radius,
    EndLength,
    EndOffset,
    Gravity,
    Force,
    Colliders,
    Exclusions,
}

impl Key {
    const ALL: [Key; 12] = [
        Key::UpdateRate,
        Key::Damp,
        Key::Elasticity,
        Key::Stiff,
        Key::Inert,
        Key::Radius,
        Key::EndLength,
        Key::EndOffset,
        Key::Gravity,
        Key::Force,
        Key::Colliders,
        Key::Exclusions,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Key::UpdateRate => "UpdateRate",
            Key::Damp => "Damp",
            Key::Elasticity => "Elasticity",
            Key::Stiff => "Stiff",
            Key::Inert => "Inert",
            Key::Radius => "Radius",
            Key::EndLength => "EndLength",
            Key::EndOffset => "EndOffset",
            Key::Gravity => "Gravity",
            Key::Force => "Force",
            Key::Colliders => "Colliders",
            Key::Exclusions => "Exclusions",
        }
    }

    fn from_field(field: &str) -> Option<Key> {
        let norm = field.chars().filter(|c| *c != '_').collect::<String>().to_ascii_lowercase();
        let key = match norm.as_str() {
            "damping" => Key::Damp,
            "stiffness" => Key::Stiff,
            "inertia" => Key::Inert,
            _ => return Key::ALL.into_iter().find(|k| k.as_str().eq_ignore_ascii_case(&norm)),
        };
        Some(key)
    }
}

pub fn section_name(preset: &str) -> String { format!("{PRESET_SECTION_PREFIX}{preset}") }

fn parse_error(section: &str, key: &str, raw: &str, expected: &'static str) -> StoreError {
    StoreError::Parse {
        section: section.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    }
}

fn parse_f32(section: &str, key: &str, raw: &str) -> StoreResult<f32> {
    raw.trim().parse().map_err(|_| parse_error(section, key, raw, "f32"))
}

fn parse_vec3(section: &str, key: &str, raw: &str) -> StoreResult<Vec3> {
    let bad = || parse_error(section, key, raw, "Vec3");
    let parts: Vec<f32> = raw
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    match parts[..] {
        [x, y, z] => Ok(Vec3::new(x, y, z)),
        _ => Err(bad()),
    }
}

fn optional_value<'a>(ini: &'a IniFile, section: &str, key: Key) -> StoreResult<Option<&'a str>> {
    match ini.get(section, key.as_str()) {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn format_vec3(v: Vec3) -> String { format!("{},{},{}", v.x, v.y, v.z) }

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// The preset file of one avatar project: whitelist, presets and snapshots.
#[derive(Debug, Clone, Default)]
pub struct PresetStore {
    ini: IniFile,
    path: Option<PathBuf>,
}

impl PresetStore {
    pub fn in_memory() -> Self { Self::default() }

    /// Open the store backed by `path`. A missing file opens empty.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let ini = IniFile::load(path)?;
        log::info!("opened preset store {}", path.display());
        Ok(Self { ini, path: Some(path.to_path_buf()) })
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    pub fn ini(&self) -> &IniFile { &self.ini }

    pub fn ini_mut(&mut self) -> &mut IniFile { &mut self.ini }

    pub fn get(&self, section: &str, key: &str) -> StoreResult<&str> { self.ini.get(section, key) }

    pub fn set(&mut self, section: &str, key: &str, value: impl AsRef<str>) {
        self.ini.set(section, key, value)
    }

    /// Replace contents with the file at `path` and make it the backing file.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> StoreResult<()> {
        *self = Self::open(path)?;
        Ok(())
    }

    /// Write to `path` and make it the backing file.
    pub fn save_to<P: AsRef<Path>>(&mut self, path: P) -> StoreResult<()> {
        let path = path.as_ref();
        self.ini.save(path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Write back to the backing file. In-memory stores have nowhere to go.
    pub fn save(&self) -> StoreResult<()> {
        match &self.path {
            Some(p) => self.ini.save(p),
            None => Err(StoreError::Io {
                path: PathBuf::new(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "store has no backing file",
                ),
            }),
        }
    }

    /// Stored whitelist, or the built-in accessory list when no whitelist section exists.
    /// A section whose terms were all removed is an empty whitelist.
    pub fn whitelist(&self) -> Whitelist {
        match self.ini.section(WHITELIST_SECTION) {
            Some(sec) => {
                if sec.is_empty() {
                    log::info!("stored accessory whitelist is empty, nothing will match");
                }
                sec.values().collect()
            }
            None => Whitelist::defaults(),
        }
    }

    /// Forget the stored whitelist so the built-in list applies again.
    pub fn reset_whitelist(&mut self) -> bool {
        self.ini.remove_section(WHITELIST_SECTION).is_some()
    }

    /// Returns false when the term was already present.
    pub fn add_whitelist_term(&mut self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() || self.ini.has(WHITELIST_SECTION, &term) {
            return false;
        }
        self.ini.set(WHITELIST_SECTION, &term, &term);
        log::info!("added '{term}' to accessory whitelist");
        true
    }

    pub fn remove_whitelist_term(&mut self, term: &str) -> bool {
        self.ini.remove(WHITELIST_SECTION, &term.trim().to_lowercase()).is_some()
    }

    /// Bone names of the last accessory selection, in stored order.
    pub fn accessory_selection(&self) -> Vec<String> {
        self.ini
            .section(SELECTION_SECTION)
            .map(|s| s.values().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Replace the stored accessory selection.
    pub fn set_accessory_selection<S: AsRef<str>>(&mut self, bones: &[S]) {
        self.ini.remove_section(SELECTION_SECTION);
        for (i, bone) in bones.iter().enumerate() {
            self.ini.set(SELECTION_SECTION, &i.to_string(), bone.as_ref());
        }
        log::debug!("stored {} selected accessories", bones.len());
    }

    /// Previous selection resolved against `rig`; bones the rig lacks are skipped.
    pub fn previous_accessories(&self, rig: &Skeleton) -> Vec<NodeId> {
        self.accessory_selection()
            .iter()
            .filter_map(|name| {
                let id = rig.find(name);
                if id.is_none() {
                    log::debug!("previously selected '{name}' is not in rig '{}'", rig.name);
                }
                id
            })
            .collect()
    }

    /// Remember `ids` as the accessory selection for the next run.
    pub fn remember_accessories(&mut self, rig: &Skeleton, ids: &[NodeId]) {
        let names: Vec<&str> = ids.iter().map(|&id| rig.name_of(id)).collect();
        self.set_accessory_selection(&names);
    }

    pub fn preset_names(&self) -> Vec<String> {
        self.ini
            .section_names()
            .filter_map(|s| s.strip_prefix(PRESET_SECTION_PREFIX))
            .map(str::to_string)
            .collect()
    }

    pub fn has_preset(&self, name: &str) -> bool { self.ini.section(&section_name(name)).is_some() }

    pub fn preset(&self, name: &str) -> StoreResult<Preset> {
        let sec = section_name(name);
        let ini = &self.ini;
        let scalar = |k: Key| ini.get_parsed::<f32>(&sec, k.as_str());
        let optional = |k: Key| optional_value(ini, &sec, k);
        let vec3 = |k: Key| -> StoreResult<Vec3> {
            optional(k)?.map_or(Ok(Vec3::ZERO), |raw| parse_vec3(&sec, k.as_str(), raw))
        };
        let end_length = match optional(Key::EndLength)? {
            Some(_) => scalar(Key::EndLength)?,
            None => 0.0,
        };
        Ok(Preset {
            name: name.to_string(),
            update_rate: scalar(Key::UpdateRate)?,
            damping: scalar(Key::Damp)?,
            elasticity: scalar(Key::Elasticity)?,
            stiffness: scalar(Key::Stiff)?,
            inert: scalar(Key::Inert)?,
            radius: scalar(Key::Radius)?,
            end_length,
            end_offset: vec3(Key::EndOffset)?,
            gravity: vec3(Key::Gravity)?,
            force: vec3(Key::Force)?,
            colliders: optional(Key::Colliders)?.map(split_list).unwrap_or_default(),
            exclusions: optional(Key::Exclusions)?.map(split_list).unwrap_or_default(),
        })
    }

    /// All presets in file order. A malformed preset fails the whole read.
    pub fn presets(&self) -> StoreResult<Vec<Preset>> {
        self.preset_names().iter().map(|n| self.preset(n)).collect()
    }

    /// Validate and write `preset`, replacing any preset of the same name.
    pub fn put_preset(&mut self, preset: &Preset) -> StoreResult<()> {
        let name = preset.name.trim();
        if name.is_empty() || name.contains([']', '\n', '\r']) {
            return Err(StoreError::InvalidPreset {
                name: preset.name.clone(),
                msg: "name must be non-empty and must not contain ']' or line breaks".to_string(),
            });
        }
        preset.validate_with::<PresetChecks>()?;
        let sec = section_name(name);
        self.ini.remove_section(&sec);
        let p = preset;
        let fields = [
            (Key::UpdateRate, p.update_rate.to_string()),
            (Key::Damp, p.damping.to_string()),
            (Key::Elasticity, p.elasticity.to_string()),
            (Key::Stiff, p.stiffness.to_string()),
            (Key::Inert, p.inert.to_string()),
            (Key::Radius, p.radius.to_string()),
            (Key::EndLength, p.end_length.to_string()),
            (Key::EndOffset, format_vec3(p.end_offset)),
            (Key::Gravity, format_vec3(p.gravity)),
            (Key::Force, format_vec3(p.force)),
            (Key::Colliders, p.colliders.join(",")),
            (Key::Exclusions, p.exclusions.join(",")),
        ];
        for (k, v) in fields {
            self.ini.set(&sec, k.as_str(), v);
        }
        log::debug!("stored preset '{name}'");
        Ok(())
    }

    pub fn remove_preset(&mut self, name: &str) -> bool {
        self.ini.remove_section(&section_name(name)).is_some()
    }

    /// Write the built-in presets that are missing. Returns true if anything was added.
    pub fn seed_defaults(&mut self) -> StoreResult<bool> {
        if self.has_preset(HAIR_PRESET) {
            return Ok(false);
        }
        self.put_preset(&Preset::hair())?;
        log::info!("seeded default '{HAIR_PRESET}' preset");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_hair_preset_reads_back() {
        let mut store = PresetStore::in_memory();
        assert!(store.seed_defaults().unwrap());
        assert!(!store.seed_defaults().unwrap());
        let hair = store.preset(HAIR_PRESET).unwrap();
        assert_eq!(hair, Preset::hair());
        assert_eq!(store.get("DynamicBonePreset:Hair", "Stiff").unwrap(), "0.8");
    }

    #[test]
    fn seed_keeps_user_edits() {
        let mut store = PresetStore::in_memory();
        store.put_preset(&Preset { stiffness: 0.3, ..Preset::hair() }).unwrap();
        store.seed_defaults().unwrap();
        assert_eq!(store.preset(HAIR_PRESET).unwrap().stiffness, 0.3);
    }

    #[test]
    fn vectors_and_lists_round_trip() {
        let mut store = PresetStore::in_memory();
        let p = Preset {
            gravity: Vec3::new(0.0, -0.01, 0.0),
            end_offset: Vec3::new(0.0, 0.1, 0.0),
            colliders: vec!["Head".into(), "Chest".into()],
            exclusions: vec!["Hair_Ahoge".into()],
            ..Preset::named("Ponytail")
        };
        store.put_preset(&p).unwrap();
        assert_eq!(store.preset("Ponytail").unwrap(), p);
    }

    #[test]
    fn names_are_unique_per_store() {
        let mut store = PresetStore::in_memory();
        store.put_preset(&Preset::named("Skirt")).unwrap();
        store.put_preset(&Preset { damping: 0.5, ..Preset::named("Skirt") }).unwrap();
        assert_eq!(store.preset_names(), ["Skirt"]);
        assert_eq!(store.preset("Skirt").unwrap().damping, 0.5);
    }

    #[test]
    fn missing_preset_is_not_found() {
        let store = PresetStore::in_memory();
        assert!(store.preset("Tail").unwrap_err().is_not_found());
    }

    #[test]
    fn hand_written_preset_uses_defaults_for_optional_keys() {
        let mut store = PresetStore::in_memory();
        let keys = [
            ("UpdateRate", "30"),
            ("Damp", "0.2"),
            ("Elasticity", "0.05"),
            ("Stiff", "0.8"),
            ("Inert", "0"),
            ("Radius", "0"),
        ];
        for (k, v) in keys {
            store.set("DynamicBonePreset:Ears", k, v);
        }
        let p = store.preset("Ears").unwrap();
        assert_eq!(p.update_rate, 30.0);
        assert_eq!(p.gravity, Vec3::ZERO);
        assert!(p.colliders.is_empty());
    }

    #[test]
    fn malformed_vector_is_parse_error() {
        let mut store = PresetStore::in_memory();
        store.put_preset(&Preset::named("Tail")).unwrap();
        store.set("DynamicBonePreset:Tail", "Gravity", "0,1");
        let err = store.preset("Tail").unwrap_err();
        assert!(matches!(err, StoreError::Parse { expected: "Vec3", .. }));
    }

    #[test]
    fn invalid_values_are_rejected_on_put() {
        let mut store = PresetStore::in_memory();
        assert!(store.put_preset(&Preset { damping: -1.0, ..Preset::named("Bad") }).is_err());
        assert!(store.put_preset(&Preset::named("  ")).is_err());
        assert!(!store.has_preset("Bad"));
    }

    #[test]
    fn whitelist_falls_back_to_defaults_only_when_absent() {
        let mut store = PresetStore::in_memory();
        assert_eq!(store.whitelist(), Whitelist::defaults());
        assert!(store.add_whitelist_term("  Ribbon "));
        assert!(!store.add_whitelist_term("RIBBON"));
        let terms: Vec<_> = store.whitelist().iter().map(str::to_string).collect();
        assert_eq!(terms, ["ribbon"]);
        assert!(store.remove_whitelist_term("Ribbon"));
        assert!(store.whitelist().is_empty());
        assert!(store.reset_whitelist());
        assert_eq!(store.whitelist(), Whitelist::defaults());
    }

    #[test]
    fn accessory_selection_replaces_previous() {
        let mut store = PresetStore::in_memory();
        assert!(store.accessory_selection().is_empty());
        store.set_accessory_selection(&["Skirt_Root", "Ribbon=Back"]);
        store.set_accessory_selection(&["Tail"]);
        assert_eq!(store.accessory_selection(), ["Tail"]);
    }

    #[test]
    fn previous_accessories_skip_missing_bones() {
        let rig = Skeleton::from_names(["Hips", "Tail", "Ribbon"]);
        let mut store = PresetStore::in_memory();
        store.set_accessory_selection(&["Ribbon", "Cape", "Tail"]);
        assert_eq!(store.previous_accessories(&rig), [NodeId(2), NodeId(1)]);
        store.remember_accessories(&rig, &[NodeId(1)]);
        assert_eq!(store.accessory_selection(), ["Tail"]);
    }

    #[test]
    fn set_field_accepts_file_keys_and_field_names() {
        let mut p = Preset::named("Tail");
        p.set_field("Damp", "0.4").unwrap();
        p.set_field("stiffness", "0.9").unwrap();
        p.set_field("end_offset", "0, 0.2, 0").unwrap();
        p.set_field("colliders", "Hips, Chest").unwrap();
        assert_eq!(p.damping, 0.4);
        assert_eq!(p.stiffness, 0.9);
        assert_eq!(p.end_offset, Vec3::new(0.0, 0.2, 0.0));
        assert_eq!(p.colliders, ["Hips", "Chest"]);
        assert!(p.set_field("wobble", "1").unwrap_err().is_not_found());
        assert!(matches!(p.set_field("radius", "wide").unwrap_err(), StoreError::Parse { .. }));
    }

    #[test]
    fn set_field_errors_name_the_preset_section_and_key() {
        let mut p = Preset::named("Tail");
        p.set_field("update_rate", " 30 ").unwrap();
        assert_eq!(p.update_rate, 30.0);
        match p.set_field("inertia", "heavy").unwrap_err() {
            StoreError::Parse { section, key, value, expected } => {
                assert_eq!(section, "DynamicBonePreset:Tail");
                assert_eq!(key, "Inert");
                assert_eq!(value, "heavy");
                assert_eq!(expected, "f32");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(p.inert, 0.0);
    }
}
