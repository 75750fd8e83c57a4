//! OpenBSD realization: `unveil` for path rules, `pledge` for promises.
//!
//! Children are deliberately left unrestricted (`execpromises` stays null):
//! users expect their scripts to be able to do anything the user can do.
//! This limits the sandbox, but restricting scripts would break them.

use std::ffi::CString;
use std::io;
use std::ptr;

use tracing::{debug, warn};

use crate::policy::{active_rules, PathRule, PromiseSet};
use crate::SandboxError;

fn cstring(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// Unveil every rule in the list. A failing `unveil` call narrows what the
/// daemon can reach but does not invalidate the rest of the policy, so it
/// is logged and skipped. The following `pledge` locks further `unveil`
/// calls out.
pub fn allow_paths(rules: &[PathRule]) {
    for rule in active_rules(rules) {
        let Some(path) = rule.path.as_deref() else {
            continue;
        };
        let perms = rule.access.unveil_perms();
        debug!(path = %path.display(), perms, "unveiling path");

        let (Some(c_path), Some(c_perms)) = (
            path.to_str().and_then(cstring),
            cstring(&perms),
        ) else {
            warn!(path = %path.display(), "path not representable, skipping");
            continue;
        };

        let ret = unsafe { libc::unveil(c_path.as_ptr(), c_perms.as_ptr()) };
        if ret != 0 {
            warn!(
                path = %path.display(),
                perms,
                "unveil failed: {}",
                io::Error::last_os_error()
            );
        }
    }
}

/// Pledge the composed promise set. Fatal on failure: an unrestricted
/// process must not keep running once it opted into sandboxing.
pub fn restrict_promises(promises: &PromiseSet) -> Result<(), SandboxError> {
    let rendered = promises.to_string();
    debug!(promises = %rendered, "pledging");

    let c_promises = CString::new(rendered)
        .map_err(|e| SandboxError::Promises(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let ret = unsafe { libc::pledge(c_promises.as_ptr(), ptr::null()) };
    if ret != 0 {
        return Err(SandboxError::Promises(io::Error::last_os_error()));
    }

    Ok(())
}
