// src/unit/factory.rs

//! The production unit factory, backed by the roster config.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::debug;

use crate::command::CommandSpec;
use crate::config::model::ConfigFile;
use crate::resolve::Target;

use super::{DockerUnit, ExecUnit, ProcessUnit, UnitFactory, UnitKind};

/// Launch settings for one address, with `[default]` already folded in.
#[derive(Debug, Clone)]
struct RosterEntry {
    kind: UnitKind,
    dir: Option<String>,
    env: BTreeMap<String, String>,
}

/// Creates units according to each target's roster entry.
#[derive(Debug, Clone)]
pub struct RosterUnitFactory {
    entries: BTreeMap<String, RosterEntry>,
}

impl RosterUnitFactory {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let defaults = cfg.default_section();
        let entries = cfg
            .targets()
            .iter()
            .map(|(addr, tc)| {
                let entry = RosterEntry {
                    kind: tc.kind.or(defaults.kind).unwrap_or_default(),
                    dir: tc.dir.clone().or_else(|| defaults.dir.clone()),
                    env: tc.env.clone(),
                };
                (addr.clone(), entry)
            })
            .collect();
        Self { entries }
    }

    /// Fold the roster entry's settings into the command. The command's own
    /// settings win on collision.
    fn merged_spec(entry: &RosterEntry, command: &CommandSpec) -> CommandSpec {
        let mut spec = command.clone();
        if spec.dir.is_none() {
            spec.dir = entry.dir.clone();
        }
        for (key, value) in &entry.env {
            spec.env
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        spec
    }
}

#[async_trait]
impl UnitFactory for RosterUnitFactory {
    async fn create(
        &self,
        target: &Target,
        command: &CommandSpec,
    ) -> Result<Box<dyn ExecUnit>> {
        let Some(entry) = self.entries.get(target.addr()) else {
            bail!("target '{target}' is not in the roster");
        };

        debug!(addr = %target, kind = %entry.kind, "creating execution unit");

        let spec = Self::merged_spec(entry, command);
        let unit: Box<dyn ExecUnit> = match entry.kind {
            UnitKind::Process => Box::new(ProcessUnit::spawn(target, &spec)?),
            UnitKind::Docker => Box::new(DockerUnit::launch(target, &spec)?),
        };
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dir: Option<&str>, env: &[(&str, &str)]) -> RosterEntry {
        RosterEntry {
            kind: UnitKind::Process,
            dir: dir.map(str::to_string),
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn command() -> CommandSpec {
        CommandSpec {
            path: "/bin/date".to_string(),
            args: vec![],
            env: BTreeMap::new(),
            dir: None,
            image: None,
            memory: None,
            cpu_shares: None,
            scrub: false,
        }
    }

    #[test]
    fn entry_dir_fills_in_when_command_has_none() {
        let spec = RosterUnitFactory::merged_spec(&entry(Some("/srv"), &[]), &command());
        assert_eq!(spec.dir.as_deref(), Some("/srv"));
    }

    #[test]
    fn command_dir_wins_over_entry_dir() {
        let mut cmd = command();
        cmd.dir = Some("/cmd".to_string());
        let spec = RosterUnitFactory::merged_spec(&entry(Some("/srv"), &[]), &cmd);
        assert_eq!(spec.dir.as_deref(), Some("/cmd"));
    }

    #[test]
    fn command_env_wins_on_key_collision() {
        let mut cmd = command();
        cmd.env.insert("A".to_string(), "cmd".to_string());
        let spec =
            RosterUnitFactory::merged_spec(&entry(None, &[("A", "entry"), ("B", "2")]), &cmd);
        assert_eq!(spec.env.get("A").map(String::as_str), Some("cmd"));
        assert_eq!(spec.env.get("B").map(String::as_str), Some("2"));
    }
}
