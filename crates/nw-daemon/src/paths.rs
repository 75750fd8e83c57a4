//! Runtime path resolution.
//!
//! Derives the concrete file locations from the configuration and the
//! optional network name, and assembles the facts the sandbox needs.

use std::path::PathBuf;

use nw_sandbox::SandboxParams;

use crate::config::Config;

const CONF_ROOT: &str = "/etc/netweave";
const RUN_DIR: &str = "/run";

/// Everything the daemon opens by name during startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub config_dir: PathBuf,
    pub pid_file: PathBuf,
    pub control_socket: PathBuf,
    pub log_file: Option<PathBuf>,
}

/// With a network name the daemon uses `/etc/netweave/<net>` and
/// `netweaved.<net>.*` runtime files; without one, the unscoped defaults.
pub fn resolve(config: &Config) -> RuntimePaths {
    let config_dir = match &config.daemon.config_dir {
        Some(dir) => PathBuf::from(dir),
        None => match &config.daemon.network {
            Some(net) => PathBuf::from(CONF_ROOT).join(net),
            None => PathBuf::from(CONF_ROOT),
        },
    };

    let runtime_name = |suffix: &str| match &config.daemon.network {
        Some(net) => format!("netweaved.{net}.{suffix}"),
        None => format!("netweaved.{suffix}"),
    };

    RuntimePaths {
        config_dir,
        pid_file: PathBuf::from(RUN_DIR).join(runtime_name("pid")),
        control_socket: PathBuf::from(RUN_DIR).join(runtime_name("socket")),
        log_file: config.daemon.log_file.as_deref().map(PathBuf::from),
    }
}

/// Collect the sandbox inputs. Called once, just before `enter()`.
pub fn sandbox_params(config: &Config, paths: &RuntimePaths) -> SandboxParams {
    SandboxParams {
        config_dir: paths.config_dir.clone(),
        log_file: paths.log_file.clone(),
        pid_file: paths.pid_file.clone(),
        control_socket: paths.control_socket.clone(),
        device: config.daemon.device_path(),
        scripts_enabled: config.daemon.scripts,
        proxy_exec: config.daemon.proxy_exec(),
        script_interpreter: config.daemon.interpreter.as_deref().map(PathBuf::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DUMMY_DEVICE;

    #[test]
    fn unscoped_defaults() {
        let paths = resolve(&Config::default());
        assert_eq!(paths.config_dir, PathBuf::from("/etc/netweave"));
        assert_eq!(paths.pid_file, PathBuf::from("/run/netweaved.pid"));
        assert_eq!(paths.control_socket, PathBuf::from("/run/netweaved.socket"));
        assert_eq!(paths.log_file, None);
    }

    #[test]
    fn network_name_scopes_everything() {
        let mut config = Config::default();
        config.daemon.network = Some("vpn0".to_string());
        let paths = resolve(&config);
        assert_eq!(paths.config_dir, PathBuf::from("/etc/netweave/vpn0"));
        assert_eq!(paths.pid_file, PathBuf::from("/run/netweaved.vpn0.pid"));
        assert_eq!(
            paths.control_socket,
            PathBuf::from("/run/netweaved.vpn0.socket")
        );
    }

    #[test]
    fn explicit_config_dir_wins_over_network_name() {
        let mut config = Config::default();
        config.daemon.network = Some("vpn0".to_string());
        config.daemon.config_dir = Some("/opt/netweave".to_string());
        let paths = resolve(&config);
        assert_eq!(paths.config_dir, PathBuf::from("/opt/netweave"));
    }

    #[test]
    fn params_carry_device_sentinel_as_none() {
        let mut config = Config::default();
        config.daemon.device = DUMMY_DEVICE.to_string();
        let paths = resolve(&config);
        let params = sandbox_params(&config, &paths);
        assert_eq!(params.device, None);
        assert!(!params.scripts_enabled);
    }

    #[test]
    fn params_carry_exec_facts() {
        let mut config = Config::default();
        config.daemon.scripts = true;
        config.daemon.interpreter = Some("/bin/sh".to_string());
        config.daemon.proxy = Some("exec /usr/libexec/nw-helper".to_string());
        let paths = resolve(&config);
        let params = sandbox_params(&config, &paths);
        assert!(params.scripts_enabled);
        assert_eq!(params.script_interpreter, Some(PathBuf::from("/bin/sh")));
        assert_eq!(
            params.proxy_exec,
            Some(PathBuf::from("/usr/libexec/nw-helper"))
        );
    }
}
