//! Error types shared by the preset store and rig loader.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key '{key}' not found in section [{section}]")]
    NotFound { section: String, key: String },

    #[error("[{section}] {key}={value:?} is not a valid {expected}")]
    Parse {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{path}:{line}: {msg}")]
    Syntax { path: String, line: usize, msg: String },

    #[error("invalid preset '{name}': {msg}")]
    InvalidPreset { name: String, msg: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn not_found(section: &str, key: &str) -> Self {
        Self::NotFound { section: section.to_string(), key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

#[derive(Debug, Error)]
pub enum RigError {
    #[error("rig has no bones")]
    Empty,

    #[error("bone '{bone}' names unknown parent '{parent}'")]
    UnknownParent { bone: String, parent: String },

    #[error("humanoid mapping '{slot}' names unknown bone '{bone}'")]
    UnknownHumanoidBone { slot: &'static str, bone: String },

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
