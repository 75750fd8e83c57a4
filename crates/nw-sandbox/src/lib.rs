//! OS-level privilege reduction for the netweave daemon.
//!
//! Once the daemon has opened every file, socket and device it will ever
//! need, it enters the sandbox: the process irreversibly gives up the
//! syscalls and filesystem paths its remaining lifetime does not use. On
//! Linux this is seccomp-BPF filtering plus Landlock path rules; on OpenBSD
//! it is `pledge` and `unveil`. Restrictions can only get stricter — there
//! is no teardown.
//!
//! # Architecture
//!
//! [`Sandbox`] is the controller: it owns the level/entered state machine,
//! decides which syscall categories and path rules apply for the daemon's
//! role, and answers [`Sandbox::can`] queries from the rest of the daemon
//! after restriction. The policy itself is data ([`policy::PathRule`] lists
//! and per-category syscall tables), handed to whichever platform backend
//! is compiled in.
//!
//! # Usage
//!
//! ```no_run
//! use nw_sandbox::{Sandbox, SandboxLevel, SandboxParams};
//!
//! let mut sandbox = Sandbox::new();
//! sandbox.set_level(SandboxLevel::Normal);
//! let params = SandboxParams::default();
//! sandbox.enter(&params).expect("cannot run unconfined");
//! // From here on, denied syscalls kill the process.
//! ```

pub mod controller;
pub mod policy;

#[cfg(target_os = "linux")]
pub mod landlock;
#[cfg(target_os = "linux")]
pub mod privilege;
#[cfg(target_os = "linux")]
pub mod seccomp;
#[cfg(target_os = "linux")]
pub mod syscalls;

#[cfg(target_os = "openbsd")]
pub mod openbsd;

pub use controller::{Sandbox, SandboxAction, SandboxLevel, SandboxTiming};
pub use policy::{FsAccess, PathRule, SandboxParams};

use thiserror::Error;

/// Errors from entering the sandbox. Every variant is fatal to daemon
/// startup: a failure here means the promised confinement cannot be
/// guaranteed, which is worse than not starting.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// `prctl(PR_SET_NO_NEW_PRIVS)` or `prctl(PR_SET_DUMPABLE)` failed.
    #[error("failed to disable privilege escalation: {0}")]
    PrivilegeEscalation(#[source] std::io::Error),

    /// The path backend could not apply a supported filesystem ruleset.
    #[error("failed to restrict filesystem access: {0}")]
    PathRules(String),

    /// The syscall backend could not build or install the final filter.
    #[error("failed to install syscall filter: {0}")]
    SyscallFilter(String),

    /// `pledge` rejected the composed promise set.
    #[error("failed to restrict promises: {0}")]
    Promises(#[source] std::io::Error),
}
