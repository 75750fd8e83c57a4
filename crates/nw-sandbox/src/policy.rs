//! Declarative sandbox policy: filesystem rules and pledge promises.
//!
//! Nothing in this module touches the OS. It composes the daemon's path
//! rule list and promise set from runtime facts; the platform backends
//! (`landlock`, `openbsd`) realize them with their native primitive.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;

/// Paths granting read access to the system entropy pool.
pub const ENTROPY_PATHS: &[&str] = &["/dev/random", "/dev/urandom"];

/// Shared library roots a child process needs to start at all.
pub const LIBRARY_PATHS: &[&str] = &["/usr/lib", "/usr/local/lib"];

/// Runtime-state roots (pid files, sockets, caches live below these).
pub const STATE_PATHS: &[&str] = &["/run", "/var"];

/// Standard binary directories, granted only when no specific interpreter
/// is configured and child processes are still in scope.
pub const BIN_PATHS: &[&str] = &["/bin", "/sbin", "/usr/bin", "/usr/local/bin"];

bitflags! {
    /// Platform-neutral filesystem access bits. Each backend maps these to
    /// its own vocabulary: Landlock access rights on Linux, an `unveil`
    /// permission string on OpenBSD.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FsAccess: u32 {
        const READ = 1;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const EXEC = 1 << 3;
        const READ_DIR = 1 << 4;
        const REMOVE_DIR = 1 << 5;
        const REMOVE_FILE = 1 << 6;
        const MAKE_SOCK = 1 << 7;
        const MAKE_CHAR = 1 << 8;
    }
}

impl FsAccess {
    /// Serialize to the `unveil(2)` permission vocabulary.
    pub fn unveil_perms(self) -> String {
        let mut s = String::new();
        if self.intersects(FsAccess::READ | FsAccess::READ_DIR) {
            s.push('r');
        }
        if self.contains(FsAccess::WRITE) {
            s.push('w');
        }
        if self.intersects(
            FsAccess::CREATE
                | FsAccess::REMOVE_DIR
                | FsAccess::REMOVE_FILE
                | FsAccess::MAKE_SOCK
                | FsAccess::MAKE_CHAR,
        ) {
            s.push('c');
        }
        if self.contains(FsAccess::EXEC) {
            s.push('x');
        }
        s
    }
}

/// One filesystem permission grant.
///
/// A rule with a `None` path is skipped by the backends — several daemon
/// paths are optional and may simply not be configured. A rule with empty
/// access flags is the list sentinel; nothing after it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub path: Option<PathBuf>,
    pub access: FsAccess,
}

impl PathRule {
    pub fn new(path: impl Into<PathBuf>, access: FsAccess) -> Self {
        Self {
            path: Some(path.into()),
            access,
        }
    }

    pub fn optional(path: Option<PathBuf>, access: FsAccess) -> Self {
        Self { path, access }
    }

    pub fn sentinel() -> Self {
        Self {
            path: None,
            access: FsAccess::empty(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.access.is_empty()
    }
}

/// The rules a backend must actually apply: everything before the sentinel
/// that has a concrete path.
pub fn active_rules(rules: &[PathRule]) -> impl Iterator<Item = &PathRule> {
    rules
        .iter()
        .take_while(|r| !r.is_sentinel())
        .filter(|r| r.path.is_some())
}

/// Runtime facts the policy is composed from, collected by the daemon
/// before it enters the sandbox.
#[derive(Debug, Clone, Default)]
pub struct SandboxParams {
    /// Configuration directory (host files, keys, scripts).
    pub config_dir: PathBuf,
    /// Log file, if logging to a file at all.
    pub log_file: Option<PathBuf>,
    /// Pid file; removed again at shutdown.
    pub pid_file: PathBuf,
    /// Control socket; removed again at shutdown.
    pub control_socket: PathBuf,
    /// Tunnel device. `None` means the configured device is the "no real
    /// device" sentinel and must not appear in any path rule.
    pub device: Option<PathBuf>,
    /// Whether user scripts may be executed.
    pub scripts_enabled: bool,
    /// Resolved helper binary of an exec-type proxy, if one is configured.
    pub proxy_exec: Option<PathBuf>,
    /// Interpreter override for user scripts.
    pub script_interpreter: Option<PathBuf>,
}

impl SandboxParams {
    /// Whether the daemon will still spawn child processes after
    /// restriction: the level must permit it, and the configuration must
    /// actually want children.
    pub fn exec_in_scope(&self, can_exec: bool) -> bool {
        can_exec && (self.scripts_enabled || self.proxy_exec.is_some())
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}

/// Compose the daemon's path rule list.
///
/// Only the containing directories of the log/pid/socket files need to
/// exist beforehand, so grants for creation and removal go to the parent
/// directory, resolved here rather than configured.
pub fn daemon_rules(params: &SandboxParams, can_exec: bool) -> Vec<PathRule> {
    let exec_scope = params.exec_in_scope(can_exec);

    let conf_access = if params.scripts_enabled && exec_scope {
        FsAccess::READ | FsAccess::READ_DIR | FsAccess::EXEC
    } else {
        FsAccess::READ | FsAccess::READ_DIR
    };
    let state_access = FsAccess::READ | FsAccess::WRITE | FsAccess::CREATE | FsAccess::READ_DIR;
    let conf_subdir_access = FsAccess::READ
        | FsAccess::WRITE
        | FsAccess::CREATE
        | FsAccess::REMOVE_FILE
        | FsAccess::READ_DIR;

    let mut rules = Vec::new();

    for path in ENTROPY_PATHS {
        rules.push(PathRule::new(*path, FsAccess::READ));
    }
    for path in LIBRARY_PATHS {
        rules.push(PathRule::new(*path, FsAccess::READ | FsAccess::READ_DIR));
    }
    for path in STATE_PATHS {
        rules.push(PathRule::new(*path, state_access));
    }

    rules.push(PathRule::optional(
        params.device.clone(),
        FsAccess::READ | FsAccess::WRITE,
    ));

    rules.push(PathRule::optional(
        params.log_file.as_deref().and_then(parent_of),
        FsAccess::CREATE,
    ));
    rules.push(PathRule::optional(
        params.log_file.clone(),
        FsAccess::WRITE,
    ));
    rules.push(PathRule::optional(
        parent_of(&params.pid_file),
        FsAccess::REMOVE_FILE,
    ));
    rules.push(PathRule::optional(
        parent_of(&params.control_socket),
        FsAccess::REMOVE_FILE,
    ));

    rules.push(PathRule::new(&params.config_dir, conf_access));
    for subdir in ["cache", "hosts", "invitations"] {
        rules.push(PathRule::new(
            params.config_dir.join(subdir),
            conf_subdir_access,
        ));
    }

    if exec_scope {
        if params.scripts_enabled {
            match &params.script_interpreter {
                // A known interpreter gets granted directly; the broad
                // binary-directory grants are omitted.
                Some(interp) => {
                    rules.push(PathRule::new(interp, FsAccess::READ | FsAccess::EXEC));
                }
                None => {
                    for path in BIN_PATHS {
                        rules.push(PathRule::new(
                            *path,
                            FsAccess::READ | FsAccess::READ_DIR | FsAccess::EXEC,
                        ));
                    }
                }
            }
        }
        if let Some(proxy) = &params.proxy_exec {
            rules.push(PathRule::new(proxy, FsAccess::READ | FsAccess::EXEC));
        }
    }

    rules.push(PathRule::sentinel());
    rules
}

/// A single `pledge(2)` promise token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Promise {
    Stdio,
    Rpath,
    Wpath,
    Cpath,
    Fattr,
    Dns,
    Inet,
    Unix,
    Proc,
    Exec,
}

impl Promise {
    pub fn as_str(self) -> &'static str {
        match self {
            Promise::Stdio => "stdio",
            Promise::Rpath => "rpath",
            Promise::Wpath => "wpath",
            Promise::Cpath => "cpath",
            Promise::Fattr => "fattr",
            Promise::Dns => "dns",
            Promise::Inet => "inet",
            Promise::Unix => "unix",
            Promise::Proc => "proc",
            Promise::Exec => "exec",
        }
    }
}

/// A set of promise tokens, serialized to the `pledge` string only at the
/// boundary call. Growing the set never involves string arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromiseSet(BTreeSet<Promise>);

impl PromiseSet {
    pub fn new(promises: impl IntoIterator<Item = Promise>) -> Self {
        Self(promises.into_iter().collect())
    }

    pub fn insert(&mut self, promise: Promise) {
        self.0.insert(promise);
    }

    pub fn contains(&self, promise: Promise) -> bool {
        self.0.contains(&promise)
    }
}

impl fmt::Display for PromiseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(p.as_str())?;
        }
        Ok(())
    }
}

/// Compose the daemon's promise set. Multicast setup is finished by enter
/// time, so `mcast` is never requested.
pub fn daemon_promises(exec_in_scope: bool) -> PromiseSet {
    let mut promises = PromiseSet::new([
        Promise::Stdio,
        Promise::Rpath,
        Promise::Wpath,
        Promise::Cpath,
        Promise::Dns,
        Promise::Inet,
        Promise::Unix,
    ]);

    if exec_in_scope {
        promises.insert(Promise::Proc);
        promises.insert(Promise::Exec);
    }

    promises
}
