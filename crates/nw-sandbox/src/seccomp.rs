//! seccomp-BPF realization of the syscall denylist.
//!
//! The filter defaults to allow and kills the process on any match, which
//! keeps it a denylist: everything the daemon legitimately does stays
//! fast-pathed, and the categories carry the security decisions.

use std::collections::BTreeMap;

use seccompiler::{
    BpfProgram, SeccompAction, SeccompCmpArgLen, SeccompCmpOp, SeccompCondition, SeccompFilter,
    SeccompRule, TargetArch,
};
use tracing::debug;

use crate::syscalls::{denied_categories, ArgFilter, DenyRule};
use crate::SandboxError;

fn err(e: impl std::fmt::Display) -> SandboxError {
    SandboxError::SyscallFilter(e.to_string())
}

fn masked_rule(arg: u8, mask: u64) -> Result<SeccompRule, SandboxError> {
    let condition =
        SeccompCondition::new(arg, SeccompCmpArgLen::Dword, SeccompCmpOp::MaskedEq(mask), mask)
            .map_err(err)?;
    SeccompRule::new(vec![condition]).map_err(err)
}

/// Merge one denial into the rule map. An unconditional denial (empty rule
/// vector) supersedes any masked rule for the same syscall, in either
/// insertion order.
fn merge(
    rules: &mut BTreeMap<i64, Vec<SeccompRule>>,
    deny: &DenyRule,
) -> Result<(), SandboxError> {
    let nr = deny.syscall as i64;
    match deny.filter {
        ArgFilter::Always => {
            rules.insert(nr, Vec::new());
        }
        ArgFilter::MaskedEq { arg, mask } => match rules.get_mut(&nr) {
            Some(existing) if existing.is_empty() => {}
            Some(existing) => existing.push(masked_rule(arg, mask)?),
            None => {
                rules.insert(nr, vec![masked_rule(arg, mask)?]);
            }
        },
    }
    Ok(())
}

/// Build the denylist for this privilege/exec combination.
pub fn build_rules(
    privileged: bool,
    can_exec: bool,
) -> Result<BTreeMap<i64, Vec<SeccompRule>>, SandboxError> {
    let mut rules = BTreeMap::new();

    for category in denied_categories(privileged, can_exec) {
        debug!(category = category.name(), "blocking syscalls");
        for deny in category.rules() {
            merge(&mut rules, &deny)?;
        }
    }

    Ok(rules)
}

fn target_arch() -> Result<TargetArch, SandboxError> {
    if cfg!(target_arch = "x86_64") {
        Ok(TargetArch::x86_64)
    } else if cfg!(target_arch = "aarch64") {
        Ok(TargetArch::aarch64)
    } else {
        Err(SandboxError::SyscallFilter(
            "unsupported architecture for seccomp filtering".to_string(),
        ))
    }
}

/// Compile the denylist without installing it. Split out so the filter can
/// be constructed under test.
pub fn build_filter(privileged: bool, can_exec: bool) -> Result<BpfProgram, SandboxError> {
    let filter = SeccompFilter::new(
        build_rules(privileged, can_exec)?,
        SeccompAction::Allow,       // anything not listed
        SeccompAction::KillProcess, // any listed syscall
        target_arch()?,
    )
    .map_err(err)?;

    filter.try_into().map_err(err)
}

/// Compile and install the final filter. Failure is fatal: a partially
/// installed filter must not be left in force with the process continuing
/// unconfined.
pub fn install_filter(privileged: bool, can_exec: bool) -> Result<(), SandboxError> {
    let program = build_filter(privileged, can_exec)?;
    seccompiler::apply_filter(&program).map_err(err)
}
