//! Error taxonomy
//!
//! Configuration problems are fatal and surface before a world exists.
//! Simulation errors are either recoverable (`CapacityExceeded`) or contract
//! violations that invalidate the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::sim::entity::{EntityId, EntityKind};
use crate::sim::physics::BodyHandle;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format for {0} (expected .yml, .yaml or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
    #[error("scenario '{scenario}' requires structural key '{key}'")]
    MissingKey { scenario: String, key: String },
    #[error("structural key '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("cannot spawn {kind:?}: {limit} entities already live")]
    CapacityExceeded { kind: EntityKind, limit: usize },
    #[error("physics handle {0:?} is not registered (released or never issued)")]
    InvalidHandle(BodyHandle),
    #[error("physics step must be the fixed step {expected}s, got {got}s")]
    StepMismatch { expected: f32, got: f32 },
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("run has finished; build a fresh simulation to continue")]
    RunFinished,
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
