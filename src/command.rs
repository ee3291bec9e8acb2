// src/command.rs

//! The command descriptor dispatched to every target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

use crate::errors::{FanrunError, Result};

/// One command, as read from the JSON descriptor on stdin.
///
/// Every dispatched target receives its own copy; the unit kind behind the
/// target decides which fields apply (`image` and the resource limits only
/// matter to container units).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Executable path, or the entrypoint inside a container image.
    pub path: String,

    /// Arguments, not including the executable itself.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment passed to the command. Merged over the roster entry's
    /// env; on key collision the command wins.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Working directory. Falls back to the roster entry's `dir`.
    #[serde(default)]
    pub dir: Option<String>,

    /// Container image. Required by docker targets, ignored by process ones.
    #[serde(default)]
    pub image: Option<String>,

    /// Container memory limit in bytes.
    #[serde(default)]
    pub memory: Option<i64>,

    /// Relative CPU weight for container units.
    #[serde(default)]
    pub cpu_shares: Option<i64>,

    /// Keep the command text out of logs and leave no terminated container
    /// records behind.
    #[serde(default)]
    pub scrub: bool,
}

impl CommandSpec {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Batch-level validation, run once before any unit is created.
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(FanrunError::InvalidCommand(
                "command path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a JSON command descriptor from this process's stdin.
///
/// The whole stream is consumed; the descriptor ends at EOF.
pub async fn read_from_stdin() -> Result<CommandSpec> {
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    CommandSpec::from_json(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_descriptor() {
        let spec = CommandSpec::from_json(r#"{ "path": "/bin/date" }"#).unwrap();
        assert_eq!(spec.path, "/bin/date");
        assert!(spec.args.is_empty());
        assert!(spec.env.is_empty());
        assert!(!spec.scrub);
    }

    #[test]
    fn parses_full_descriptor() {
        let json = r#"
        {
            "path": "/bin/sh",
            "args": ["-c", "echo hi"],
            "env": { "A": "1" },
            "dir": "/tmp",
            "image": "ubuntu:24.04",
            "memory": 1000000000,
            "cpu_shares": 512,
            "scrub": true
        }"#;
        let spec = CommandSpec::from_json(json).unwrap();
        assert_eq!(spec.args, vec!["-c", "echo hi"]);
        assert_eq!(spec.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(spec.image.as_deref(), Some("ubuntu:24.04"));
        assert_eq!(spec.memory, Some(1_000_000_000));
        assert!(spec.scrub);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(CommandSpec::from_json("{ not json").is_err());
    }

    #[test]
    fn rejects_empty_path() {
        let spec = CommandSpec::from_json(r#"{ "path": "  " }"#).unwrap();
        assert!(spec.validate().is_err());
    }
}
