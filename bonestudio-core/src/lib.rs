pub mod config;
pub mod error;
pub mod ini;
pub mod matcher;
pub mod preset;
pub mod rig;
pub mod snapshot;
pub mod studio;

pub use error::{RigError, StoreError};
pub use ini::IniFile;
pub use matcher::{find_accessories, find_matches, EarChoice, Whitelist};
pub use preset::{Preset, PresetStore};
pub use rig::{NodeId, Skeleton};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
