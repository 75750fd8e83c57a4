//! End-to-end policy checks through the crate's public surface.
//!
//! Nothing here installs a real filter or ruleset — entering an actual
//! sandbox would confine the test harness itself. These tests pin the
//! observable policy: what the controller answers, which rules and
//! categories a given daemon role composes.

use std::path::{Path, PathBuf};

use nw_sandbox::policy::{self, active_rules};
use nw_sandbox::{FsAccess, PathRule, Sandbox, SandboxAction, SandboxLevel, SandboxParams, SandboxTiming};

fn daemon_params(scripts: bool) -> SandboxParams {
    SandboxParams {
        config_dir: PathBuf::from("/etc/netweave/vpn0"),
        log_file: Some(PathBuf::from("/var/log/netweaved.vpn0.log")),
        pid_file: PathBuf::from("/run/netweaved.vpn0.pid"),
        control_socket: PathBuf::from("/run/netweaved.vpn0.socket"),
        device: Some(PathBuf::from("/dev/net/tun")),
        scripts_enabled: scripts,
        proxy_exec: None,
        script_interpreter: None,
    }
}

#[test]
fn queries_before_restriction_always_pass() {
    for level in [SandboxLevel::None, SandboxLevel::Normal, SandboxLevel::High] {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(level);
        assert!(sandbox.can(SandboxAction::StartProcesses, SandboxTiming::BeforeRestriction));
        assert!(sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::BeforeRestriction));
    }
}

#[test]
fn high_level_revokes_exec_and_new_paths() {
    let mut sandbox = Sandbox::new();
    sandbox.set_level(SandboxLevel::High);
    assert!(!sandbox.can(SandboxAction::StartProcesses, SandboxTiming::AfterRestriction));
    assert!(!sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::AfterRestriction));
}

#[test]
fn disabled_sandbox_enters_and_stays_permissive() {
    let mut sandbox = Sandbox::new();
    sandbox.set_level(SandboxLevel::None);
    sandbox.enter(&daemon_params(true)).unwrap();
    assert!(sandbox.can(SandboxAction::StartProcesses, SandboxTiming::AfterRestriction));
    assert!(sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::AfterRestriction));
}

#[test]
#[should_panic(expected = "entered twice")]
fn entering_twice_panics() {
    let mut sandbox = Sandbox::new();
    sandbox.set_level(SandboxLevel::None);
    let _ = sandbox.enter(&daemon_params(false));
    let _ = sandbox.enter(&daemon_params(false));
}

#[test]
fn rule_list_for_locked_down_daemon_has_no_exec_grants() {
    // High level: no scripts will ever run, so nothing may be executable.
    let rules = policy::daemon_rules(&daemon_params(true), false);
    for rule in active_rules(&rules) {
        assert!(
            !rule.access.contains(FsAccess::EXEC),
            "unexpected exec grant for {:?}",
            rule.path
        );
    }
}

#[test]
fn dummy_device_is_excluded_from_rules() {
    let mut params = daemon_params(false);
    params.device = None;
    let rules = policy::daemon_rules(&params, true);
    assert!(active_rules(&rules)
        .all(|r| r.path.as_deref() != Some(Path::new("/dev/net/tun"))));
}

#[test]
fn sentinel_closes_the_composed_list() {
    let rules = policy::daemon_rules(&daemon_params(true), true);
    assert!(rules.last().unwrap().is_sentinel());
    // Every path in daemon_params is configured, so everything but the
    // sentinel is applied.
    assert_eq!(active_rules(&rules).count(), rules.len() - 1);
}

#[test]
fn hand_built_list_skips_null_paths() {
    let rules = vec![
        PathRule::optional(None, FsAccess::READ | FsAccess::WRITE),
        PathRule::new("/dev/urandom", FsAccess::READ),
        PathRule::sentinel(),
    ];
    let applied: Vec<_> = active_rules(&rules).collect();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].path.as_deref(), Some(Path::new("/dev/urandom")));
}

#[cfg(target_os = "linux")]
mod linux {
    use super::daemon_params;
    use nw_sandbox::seccomp;
    use nw_sandbox::syscalls::{denied_categories, SyscallCategory};

    #[test]
    fn normal_unprivileged_daemon_without_scripts_loses_everything() {
        // level=Normal allows spawning, but with scripts disabled and no
        // exec proxy the daemon will never spawn anything.
        let will_exec = daemon_params(false).exec_in_scope(true);
        assert!(!will_exec);

        let cats = denied_categories(false, will_exec);
        assert!(cats.contains(&SyscallCategory::Privileged));
        assert!(cats.contains(&SyscallCategory::SafeObsolete));
        assert!(cats.contains(&SyscallCategory::WritableCode));
        assert!(cats.contains(&SyscallCategory::ProcessExec));
        assert!(cats.contains(&SyscallCategory::UnusedByDaemon));
    }

    #[test]
    fn privileged_daemon_with_scripts_keeps_privileged_calls() {
        let will_exec = daemon_params(true).exec_in_scope(true);
        assert!(will_exec);

        let cats = denied_categories(true, will_exec);
        assert!(!cats.contains(&SyscallCategory::Privileged));
        assert!(!cats.contains(&SyscallCategory::ProcessExec));
        assert!(cats.contains(&SyscallCategory::SafeObsolete));
        assert!(cats.contains(&SyscallCategory::WritableCode));
    }

    #[test]
    fn filters_compile_for_daemon_roles() {
        for (privileged, will_exec) in [(false, false), (false, true), (true, false), (true, true)] {
            seccomp::build_filter(privileged, will_exec).expect("filter must compile");
        }
    }
}
