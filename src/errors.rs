// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::unit::UnitStatus;

#[derive(Error, Debug)]
pub enum FanrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("command descriptor is not valid JSON: {0}")]
    CommandJson(#[from] serde_json::Error),

    #[error("invalid command descriptor: {0}")]
    InvalidCommand(String),

    #[error("invalid target pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no target matches pattern: {0}")]
    NoMatch(String),

    #[error("lost {missing} of {expected} completion signals")]
    MissingCompletions { expected: usize, missing: usize },

    #[error("target {target}: command finished with {status}")]
    CommandFailed { target: String, status: UnitStatus },

    #[error("target {target}: {source}")]
    TargetFailed { target: String, source: UnitError },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FanrunError>;

/// A per-target lifecycle failure, attributed to the step that hit it.
///
/// Carried inside a completion signal; one target failing this way never
/// aborts its siblings.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("creating execution unit: {0}")]
    Create(anyhow::Error),

    #[error("closing unit stdin: {0}")]
    CloseStdin(anyhow::Error),

    #[error("draining unit {stream}: {source}")]
    Drain {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("waiting for unit termination: {0}")]
    Wait(anyhow::Error),
}
