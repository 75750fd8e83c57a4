use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

use nw_sandbox::SandboxLevel;

/// Device name meaning "no real tunnel device": traffic is discarded.
/// Excluded from sandbox path rules, since there is nothing to open.
pub const DUMMY_DEVICE: &str = "dummy";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Network name. Scopes the configuration directory and the runtime
    /// file names, so several daemons can coexist.
    pub network: Option<String>,
    /// Tunnel device path, or [`DUMMY_DEVICE`].
    pub device: String,
    /// Whether user scripts (host-up, subnet-up, ...) may be executed.
    pub scripts: bool,
    /// Interpreter override for user scripts. When set, only this binary
    /// is granted execute access instead of the system binary directories.
    pub interpreter: Option<String>,
    /// Outbound proxy specification, first token selecting the type:
    /// `"exec <command...>"` spawns a helper binary; other types are
    /// handled in-process.
    pub proxy: Option<String>,
    /// Log file path; stderr when unset.
    pub log_file: Option<String>,
    /// Configuration directory override.
    pub config_dir: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            network: None,
            device: "/dev/net/tun".to_string(),
            scripts: false,
            interpreter: None,
            proxy: None,
            log_file: None,
            config_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Confinement level entered after startup.
    pub level: SandboxLevel,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            level: SandboxLevel::Normal,
        }
    }
}

impl Config {
    /// Parse a TOML config file.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl DaemonConfig {
    /// The configured device, with the dummy sentinel resolved to `None`.
    pub fn device_path(&self) -> Option<PathBuf> {
        if self.device == DUMMY_DEVICE {
            None
        } else {
            Some(PathBuf::from(&self.device))
        }
    }

    /// The helper binary of an exec-type proxy: the first token of the
    /// command. Non-exec proxy types run in-process and need no grant.
    pub fn proxy_exec(&self) -> Option<PathBuf> {
        let spec = self.proxy.as_deref()?;
        let mut tokens = spec.split_whitespace();
        match tokens.next()? {
            "exec" => tokens.next().map(PathBuf::from),
            _ => None,
        }
    }
}
