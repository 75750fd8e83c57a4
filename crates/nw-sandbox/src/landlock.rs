//! Landlock realization of the path rule set.
//!
//! One path-beneath rule per entry, default-deny for every handled access
//! kind. Path confinement is advisory hardening on top of the syscall
//! filter, not the sole guarantee: a kernel without Landlock downgrades to
//! a logged no-op instead of refusing to start.

use landlock::{
    Access, AccessFs, BitFlags, CompatLevel, Compatible, PathBeneath, PathFd, Ruleset, RulesetAttr,
    RulesetCreatedAttr, RulesetStatus, ABI,
};
use tracing::{debug, warn};

use crate::policy::{active_rules, FsAccess, PathRule};
use crate::SandboxError;

/// Map the platform-neutral bitset onto Landlock access rights.
pub fn to_access_fs(access: FsAccess) -> BitFlags<AccessFs> {
    let mut out = BitFlags::<AccessFs>::empty();

    if access.contains(FsAccess::READ) {
        out |= AccessFs::ReadFile;
    }
    if access.contains(FsAccess::WRITE) {
        out |= AccessFs::WriteFile;
    }
    if access.contains(FsAccess::CREATE) {
        out |= AccessFs::MakeReg | AccessFs::MakeDir;
    }
    if access.contains(FsAccess::EXEC) {
        out |= AccessFs::Execute;
    }
    if access.contains(FsAccess::READ_DIR) {
        out |= AccessFs::ReadDir;
    }
    if access.contains(FsAccess::REMOVE_DIR) {
        out |= AccessFs::RemoveDir;
    }
    if access.contains(FsAccess::REMOVE_FILE) {
        out |= AccessFs::RemoveFile;
    }
    if access.contains(FsAccess::MAKE_SOCK) {
        out |= AccessFs::MakeSock;
    }
    if access.contains(FsAccess::MAKE_CHAR) {
        out |= AccessFs::MakeChar;
    }

    out
}

fn apply_outcome(status: RulesetStatus) -> Result<(), SandboxError> {
    match status {
        RulesetStatus::FullyEnforced => {
            debug!("path rules fully enforced");
            Ok(())
        }
        RulesetStatus::PartiallyEnforced => {
            warn!("path rules only partially enforced by this kernel");
            Ok(())
        }
        // No Landlock at all: syscall filtering still applies, so this is
        // a downgrade, not a failure.
        RulesetStatus::NotEnforced => {
            warn!("path protection is not supported by this kernel");
            Ok(())
        }
    }
}

/// Apply the rule list to the current process. Irreversible.
///
/// Rules whose path cannot be opened are logged and skipped — optional
/// paths may be absent or misconfigured without invalidating the rest of
/// the policy. Failing to register an opened path, or to commit the
/// ruleset, is fatal.
pub fn allow_paths(rules: &[PathRule]) -> Result<(), SandboxError> {
    let handled = AccessFs::from_all(ABI::V1);

    let mut ruleset = Ruleset::default()
        .set_compatibility(CompatLevel::BestEffort)
        .handle_access(handled)
        .map_err(|e| SandboxError::PathRules(format!("ruleset access: {e}")))?
        .create()
        .map_err(|e| SandboxError::PathRules(format!("ruleset creation: {e}")))?;

    for rule in active_rules(rules) {
        let Some(path) = rule.path.as_deref() else {
            continue;
        };
        let access = to_access_fs(rule.access);
        debug!(path = %path.display(), access = ?access, "allowing path");

        let fd = match PathFd::new(path) {
            Ok(fd) => fd,
            Err(e) => {
                warn!(path = %path.display(), "could not open path, skipping: {e}");
                continue;
            }
        };

        ruleset = ruleset
            .add_rule(PathBeneath::new(fd, access))
            .map_err(|e| {
                SandboxError::PathRules(format!("could not allow {}: {e}", path.display()))
            })?;
    }

    let status = ruleset
        .restrict_self()
        .map_err(|e| SandboxError::PathRules(format!("restrict_self: {e}")))?;

    apply_outcome(status.ruleset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mapping_covers_every_bit() {
        let access = to_access_fs(FsAccess::all());
        assert!(access.contains(AccessFs::ReadFile));
        assert!(access.contains(AccessFs::WriteFile));
        assert!(access.contains(AccessFs::MakeReg));
        assert!(access.contains(AccessFs::MakeDir));
        assert!(access.contains(AccessFs::Execute));
        assert!(access.contains(AccessFs::ReadDir));
        assert!(access.contains(AccessFs::RemoveDir));
        assert!(access.contains(AccessFs::RemoveFile));
        assert!(access.contains(AccessFs::MakeSock));
        assert!(access.contains(AccessFs::MakeChar));
    }

    #[test]
    fn read_maps_to_file_read_only() {
        let access = to_access_fs(FsAccess::READ);
        assert!(access.contains(AccessFs::ReadFile));
        assert!(!access.contains(AccessFs::ReadDir));
    }

    #[test]
    fn empty_access_maps_to_nothing() {
        assert!(to_access_fs(FsAccess::empty()).is_empty());
    }

    #[test]
    fn unsupported_kernel_is_success_with_warning() {
        assert!(apply_outcome(RulesetStatus::NotEnforced).is_ok());
        assert!(apply_outcome(RulesetStatus::PartiallyEnforced).is_ok());
        assert!(apply_outcome(RulesetStatus::FullyEnforced).is_ok());
    }
}
