//! Runtime privilege probe.
//!
//! Feeds the syscall category decision and nothing else. Must run before
//! the filter is installed — reading capability state afterwards may
//! itself be blocked.

use caps::CapSet;
use tracing::debug;

/// True if the effective user is the superuser, or if the process holds
/// any permitted, effective or ambient capability. When capability state
/// cannot be read, the process is assumed privileged: over-counting keeps
/// the privileged syscalls available to helper processes, under-counting
/// would break them.
pub fn is_privileged() -> bool {
    if unsafe { libc::geteuid() } == 0 {
        return true;
    }

    for set in [CapSet::Permitted, CapSet::Effective, CapSet::Ambient] {
        match caps::read(None, set) {
            Ok(held) if !held.is_empty() => {
                debug!(?set, "process holds capabilities, leaving privileged syscalls");
                return true;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("could not read capability state ({e}), assuming privileged");
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_consistent_with_euid() {
        // In any environment where the test runs as root, the probe must
        // report privileged; the capability half cannot be asserted from
        // an arbitrary test environment.
        if unsafe { libc::geteuid() } == 0 {
            assert!(is_privileged());
        }
    }
}
