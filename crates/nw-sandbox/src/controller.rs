//! The sandbox state machine.
//!
//! One [`Sandbox`] value is created at daemon startup, its level may be
//! adjusted until [`Sandbox::enter`] runs, and from then on it only answers
//! capability queries. `enter` happens on the main thread before any worker
//! is started; afterwards every access is a plain read, so the value can be
//! shared by reference without locking.

use tracing::debug;

use crate::policy::SandboxParams;
use crate::SandboxError;

/// How aggressively confinement is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxLevel {
    /// Explicit opt-out: `enter` records state but performs no OS call.
    None,
    /// Syscall filtering, but the daemon may still spawn scripts and open
    /// new paths.
    Normal,
    /// Full confinement: no child processes, no paths beyond the rule set.
    High,
}

/// A capability other daemon components may need to check before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxAction {
    /// Spawn a script or helper process.
    StartProcesses,
    /// Open a path outside the set granted at enter time.
    UseNewPaths,
}

/// When a capability query is being asked relative to restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxTiming {
    BeforeRestriction,
    AfterRestriction,
}

/// The controller. See module docs for the lifecycle.
#[derive(Debug)]
pub struct Sandbox {
    level: SandboxLevel,
    entered: bool,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub const fn new() -> Self {
        Self {
            level: SandboxLevel::Normal,
            entered: false,
        }
    }

    pub fn level(&self) -> SandboxLevel {
        self.level
    }

    /// Select the level. Must happen strictly before [`Sandbox::enter`];
    /// calling it afterwards is a logic error in the daemon, not a runtime
    /// condition.
    pub fn set_level(&mut self, level: SandboxLevel) {
        assert!(!self.entered, "sandbox level changed after enter()");
        self.level = level;
    }

    /// Is `action` still available? Before restriction everything is
    /// allowed; after it the decision table applies. The action enum is
    /// closed — the match below is exhaustive by construction, which is
    /// what makes an unknown action unrepresentable rather than a runtime
    /// error.
    pub fn can(&self, action: SandboxAction, timing: SandboxTiming) -> bool {
        if timing == SandboxTiming::AfterRestriction || self.entered {
            self.can_after_enter(action)
        } else {
            true
        }
    }

    fn can_after_enter(&self, action: SandboxAction) -> bool {
        match action {
            SandboxAction::StartProcesses | SandboxAction::UseNewPaths => {
                self.level < SandboxLevel::High
            }
        }
    }

    /// Enter the sandbox. Callable exactly once; a second call panics.
    ///
    /// On failure the daemon must treat the error as fatal — a partially
    /// installed sandbox must not be left running the daemon unconfined.
    pub fn enter(&mut self, params: &SandboxParams) -> Result<(), SandboxError> {
        assert!(!self.entered, "sandbox entered twice");
        self.entered = true;

        if self.level == SandboxLevel::None {
            debug!("sandbox is disabled");
            return Ok(());
        }

        self.enter_os(params)?;
        debug!(level = ?self.level, "entered sandbox");
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn enter_os(&self, params: &SandboxParams) -> Result<(), SandboxError> {
        use crate::{landlock, policy, privilege, seccomp};

        drop_privilege_escalation()?;

        // Both facts must be collected before any filter is in place:
        // reading them afterwards may itself be blocked. Whether the
        // daemon will still spawn children combines the level about to be
        // entered with what the configuration actually asks for.
        let privileged = privilege::is_privileged();
        let level_allows_exec = self.can_after_enter(SandboxAction::StartProcesses);
        let will_exec = params.exec_in_scope(level_allows_exec);

        if !self.can_after_enter(SandboxAction::UseNewPaths) {
            landlock::allow_paths(&policy::daemon_rules(params, level_allows_exec))?;
        }

        seccomp::install_filter(privileged, will_exec)
    }

    #[cfg(target_os = "openbsd")]
    fn enter_os(&self, params: &SandboxParams) -> Result<(), SandboxError> {
        use crate::{openbsd, policy};

        let level_allows_exec = self.can_after_enter(SandboxAction::StartProcesses);
        let will_exec = params.exec_in_scope(level_allows_exec);

        openbsd::allow_paths(&policy::daemon_rules(params, level_allows_exec));
        openbsd::restrict_promises(&policy::daemon_promises(will_exec))
    }

    #[cfg(not(any(target_os = "linux", target_os = "openbsd")))]
    fn enter_os(&self, _params: &SandboxParams) -> Result<(), SandboxError> {
        tracing::warn!("no confinement backend for this platform, continuing unrestricted");
        Ok(())
    }
}

/// Turn off every privilege-escalation path before installing filters.
/// Without `NO_NEW_PRIVS` the kernel would refuse the seccomp filter from
/// an unprivileged process anyway, and a setuid child could escape it.
#[cfg(target_os = "linux")]
fn drop_privilege_escalation() -> Result<(), SandboxError> {
    let ok = unsafe {
        libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != -1
            && libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) != -1
    };
    if ok {
        Ok(())
    } else {
        Err(SandboxError::PrivilegeEscalation(
            std::io::Error::last_os_error(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_allowed_before_restriction() {
        for level in [SandboxLevel::None, SandboxLevel::Normal, SandboxLevel::High] {
            let mut sandbox = Sandbox::new();
            sandbox.set_level(level);
            for action in [SandboxAction::StartProcesses, SandboxAction::UseNewPaths] {
                assert!(sandbox.can(action, SandboxTiming::BeforeRestriction));
            }
        }
    }

    #[test]
    fn high_denies_both_actions_after_restriction() {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(SandboxLevel::High);
        assert!(!sandbox.can(SandboxAction::StartProcesses, SandboxTiming::AfterRestriction));
        assert!(!sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::AfterRestriction));
    }

    #[test]
    fn normal_keeps_both_actions_after_restriction() {
        let sandbox = Sandbox::new();
        assert_eq!(sandbox.level(), SandboxLevel::Normal);
        assert!(sandbox.can(SandboxAction::StartProcesses, SandboxTiming::AfterRestriction));
        assert!(sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::AfterRestriction));
    }

    #[test]
    fn disabled_level_enters_without_os_calls() {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(SandboxLevel::None);
        sandbox.enter(&SandboxParams::default()).unwrap();
        assert!(sandbox.can(SandboxAction::StartProcesses, SandboxTiming::BeforeRestriction));
        assert!(sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::AfterRestriction));
    }

    #[test]
    #[should_panic(expected = "entered twice")]
    fn double_enter_is_a_programming_error() {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(SandboxLevel::None);
        let _ = sandbox.enter(&SandboxParams::default());
        let _ = sandbox.enter(&SandboxParams::default());
    }

    #[test]
    #[should_panic(expected = "after enter()")]
    fn set_level_after_enter_is_a_programming_error() {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(SandboxLevel::None);
        let _ = sandbox.enter(&SandboxParams::default());
        sandbox.set_level(SandboxLevel::High);
    }

    #[test]
    fn entered_forces_decision_table_for_before_queries() {
        let mut sandbox = Sandbox::new();
        sandbox.set_level(SandboxLevel::None);
        sandbox.enter(&SandboxParams::default()).unwrap();
        // Level None never reaches High, so the table still answers true,
        // but it is the table answering now, not the pre-enter shortcut.
        assert!(sandbox.can(SandboxAction::UseNewPaths, SandboxTiming::BeforeRestriction));
    }

    #[test]
    fn level_ordering() {
        assert!(SandboxLevel::None < SandboxLevel::Normal);
        assert!(SandboxLevel::Normal < SandboxLevel::High);
    }
}
