use std::collections::BTreeMap;

use fanrun::command::CommandSpec;
use fanrun::config::{ConfigFile, DefaultSection, RawConfigFile, TargetConfig};
use fanrun::unit::UnitKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                default: DefaultSection::default(),
                target: BTreeMap::new(),
            },
        }
    }

    pub fn with_target(mut self, addr: &str, target: TargetConfig) -> Self {
        self.config.target.insert(addr.to_string(), target);
        self
    }

    pub fn with_default_kind(mut self, kind: UnitKind) -> Self {
        self.config.default.kind = Some(kind);
        self
    }

    pub fn with_default_dir(mut self, dir: &str) -> Self {
        self.config.default.dir = Some(dir.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
pub struct TargetConfigBuilder {
    target: TargetConfig,
}

impl TargetConfigBuilder {
    pub fn new() -> Self {
        Self {
            target: TargetConfig {
                kind: None,
                dir: None,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn kind(mut self, kind: UnitKind) -> Self {
        self.target.kind = Some(kind);
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.target.dir = Some(dir.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.target.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}

impl Default for TargetConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `CommandSpec`.
pub struct CommandSpecBuilder {
    spec: CommandSpec,
}

impl CommandSpecBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            spec: CommandSpec {
                path: path.to_string(),
                args: vec![],
                env: BTreeMap::new(),
                dir: None,
                image: None,
                memory: None,
                cpu_shares: None,
                scrub: false,
            },
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.spec.args.push(arg.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.spec.dir = Some(dir.to_string());
        self
    }

    pub fn image(mut self, image: &str) -> Self {
        self.spec.image = Some(image.to_string());
        self
    }

    pub fn scrub(mut self, val: bool) -> Self {
        self.spec.scrub = val;
        self
    }

    pub fn build(self) -> CommandSpec {
        self.spec
    }
}
