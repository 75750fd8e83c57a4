//! Syscall denial categories.
//!
//! Each category is a static set of [`DenyRule`]s; applying a category
//! denies every member for the rest of the process lifetime. Membership is
//! resolved per architecture here (x86_64 and aarch64, the targets the BPF
//! compiler supports) so the backend can stay a single generic routine.
//!
//! Since seccomp filters are inherited by child processes, the
//! always-denied categories have to be very conservative, or user scripts
//! may fail — those are allowed to do anything at all.

use libc::c_long;

// libc omits `SYS_io_pgetevents` on some glibc targets even though the kernel
// provides it; define it per supported arch using libc's own canonical values.
#[cfg(target_arch = "x86_64")]
const SYS_IO_PGETEVENTS: c_long = 333;
#[cfg(target_arch = "aarch64")]
const SYS_IO_PGETEVENTS: c_long = 292;

/// A named set of syscalls to deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallCategory {
    /// Calls that require superuser privileges or capabilities.
    Privileged,
    /// Obsolete or unimplemented calls no modern daemon needs.
    SafeObsolete,
    /// Creating or retargeting memory mappings as writable+executable.
    WritableCode,
    /// Spawning child processes.
    ProcessExec,
    /// Anything potentially dangerous the daemon's own code paths never use.
    UnusedByDaemon,
}

impl SyscallCategory {
    pub fn name(self) -> &'static str {
        match self {
            SyscallCategory::Privileged => "privileged",
            SyscallCategory::SafeObsolete => "safe-obsolete",
            SyscallCategory::WritableCode => "writable-code",
            SyscallCategory::ProcessExec => "process-exec",
            SyscallCategory::UnusedByDaemon => "unused-by-daemon",
        }
    }

    pub fn rules(self) -> Vec<DenyRule> {
        match self {
            SyscallCategory::Privileged => privileged(),
            SyscallCategory::SafeObsolete => safe_obsolete(),
            SyscallCategory::WritableCode => writable_code(),
            SyscallCategory::ProcessExec => process_exec(),
            SyscallCategory::UnusedByDaemon => unused_by_daemon(),
        }
    }
}

/// When a denial fires: always, or only when a syscall argument carries
/// every bit of a mask (used to inspect mapping-protection flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgFilter {
    Always,
    MaskedEq { arg: u8, mask: u64 },
}

/// One denied syscall, optionally argument-masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenyRule {
    pub syscall: c_long,
    pub filter: ArgFilter,
}

impl DenyRule {
    const fn call(syscall: c_long) -> Self {
        Self {
            syscall,
            filter: ArgFilter::Always,
        }
    }

    const fn masked(syscall: c_long, arg: u8, mask: u64) -> Self {
        Self {
            syscall,
            filter: ArgFilter::MaskedEq { arg, mask },
        }
    }

    /// Would this rule fire for an invocation with the given arguments?
    /// Mirrors the kernel's masked-equality comparison.
    pub fn matches(&self, args: &[u64; 6]) -> bool {
        match self.filter {
            ArgFilter::Always => true,
            ArgFilter::MaskedEq { arg, mask } => args[arg as usize] & mask == mask,
        }
    }
}

/// Which categories apply for a given privilege/exec combination.
///
/// `safe-obsolete` and `writable-code` are unconditional. `privileged` is
/// denied unless the process is both privileged and will still exec
/// children: an unprivileged process cannot regain those syscalls anyway
/// once NO_NEW_PRIVS is set, and a privileged one that spawns helpers must
/// leave them available to the helpers, not to itself. A daemon that will
/// never spawn anything also loses `process-exec` and `unused-by-daemon`.
pub fn denied_categories(privileged: bool, can_exec: bool) -> Vec<SyscallCategory> {
    let mut categories = vec![SyscallCategory::SafeObsolete, SyscallCategory::WritableCode];

    if !privileged || !can_exec {
        categories.push(SyscallCategory::Privileged);
    }

    if !can_exec {
        categories.push(SyscallCategory::ProcessExec);
        categories.push(SyscallCategory::UnusedByDaemon);
    }

    categories
}

fn privileged() -> Vec<DenyRule> {
    #[allow(unused_mut)]
    let mut list = vec![
        // memory locking
        DenyRule::call(libc::SYS_mlock),
        DenyRule::call(libc::SYS_mlock2),
        DenyRule::call(libc::SYS_mlockall),
        DenyRule::call(libc::SYS_munlock),
        DenyRule::call(libc::SYS_munlockall),
        // changing file ownership
        DenyRule::call(libc::SYS_fchown),
        DenyRule::call(libc::SYS_fchownat),
        // various privileged
        DenyRule::call(libc::SYS_acct),
        DenyRule::call(libc::SYS_bpf),
        DenyRule::call(libc::SYS_capset),
        DenyRule::call(libc::SYS_fanotify_init),
        DenyRule::call(libc::SYS_fanotify_mark),
        DenyRule::call(libc::SYS_nfsservctl),
        DenyRule::call(libc::SYS_open_by_handle_at),
        DenyRule::call(libc::SYS_quotactl),
        DenyRule::call(libc::SYS_setdomainname),
        DenyRule::call(libc::SYS_sethostname),
        DenyRule::call(libc::SYS_vhangup),
        DenyRule::call(libc::SYS_reboot),
        // kernel keyring
        DenyRule::call(libc::SYS_add_key),
        DenyRule::call(libc::SYS_keyctl),
        DenyRule::call(libc::SYS_request_key),
        // namespaces
        DenyRule::call(libc::SYS_setns),
        DenyRule::call(libc::SYS_unshare),
        // FS mounting
        DenyRule::call(libc::SYS_chroot),
        DenyRule::call(libc::SYS_mount),
        DenyRule::call(libc::SYS_pivot_root),
        DenyRule::call(libc::SYS_umount2),
        DenyRule::call(libc::SYS_move_mount),
        DenyRule::call(libc::SYS_open_tree),
        DenyRule::call(libc::SYS_mount_setattr),
        DenyRule::call(libc::SYS_fsconfig),
        DenyRule::call(libc::SYS_fsmount),
        DenyRule::call(libc::SYS_fsopen),
        DenyRule::call(libc::SYS_fspick),
        // changing time
        DenyRule::call(libc::SYS_adjtimex),
        DenyRule::call(libc::SYS_clock_adjtime),
        DenyRule::call(libc::SYS_clock_settime),
        DenyRule::call(libc::SYS_settimeofday),
        // kernel modules
        DenyRule::call(libc::SYS_delete_module),
        DenyRule::call(libc::SYS_finit_module),
        DenyRule::call(libc::SYS_init_module),
        // debug
        DenyRule::call(libc::SYS_kcmp),
        DenyRule::call(libc::SYS_lookup_dcookie),
        DenyRule::call(libc::SYS_perf_event_open),
        DenyRule::call(libc::SYS_ptrace),
        DenyRule::call(libc::SYS_syslog),
        DenyRule::call(libc::SYS_pidfd_getfd),
        // set group membership
        DenyRule::call(libc::SYS_setgroups),
    ];

    #[cfg(target_arch = "x86_64")]
    list.extend([
        DenyRule::call(libc::SYS_chown),
        DenyRule::call(libc::SYS_lchown),
        DenyRule::call(libc::SYS_create_module),
        // raw I/O ports
        DenyRule::call(libc::SYS_ioperm),
        DenyRule::call(libc::SYS_iopl),
    ]);

    list
}

fn safe_obsolete() -> Vec<DenyRule> {
    #[allow(unused_mut)]
    let mut list = vec![
        // swap
        DenyRule::call(libc::SYS_swapoff),
        DenyRule::call(libc::SYS_swapon),
        // kexec
        DenyRule::call(libc::SYS_kexec_file_load),
        DenyRule::call(libc::SYS_kexec_load),
    ];

    // The historical leftovers only have numbers on x86_64.
    #[cfg(target_arch = "x86_64")]
    list.extend([
        DenyRule::call(libc::SYS__sysctl),
        DenyRule::call(libc::SYS_afs_syscall),
        DenyRule::call(libc::SYS_create_module),
        DenyRule::call(libc::SYS_get_kernel_syms),
        DenyRule::call(libc::SYS_getpmsg),
        DenyRule::call(libc::SYS_putpmsg),
        DenyRule::call(libc::SYS_query_module),
        DenyRule::call(libc::SYS_security),
        DenyRule::call(libc::SYS_sysfs),
        DenyRule::call(libc::SYS_tuxcall),
        DenyRule::call(libc::SYS_uselib),
        DenyRule::call(libc::SYS_ustat),
        DenyRule::call(libc::SYS_vserver),
    ]);

    list
}

fn writable_code() -> Vec<DenyRule> {
    const PROT_WX: u64 = (libc::PROT_EXEC | libc::PROT_WRITE) as u64;

    vec![
        // retargeting an existing mapping to executable
        DenyRule::masked(libc::SYS_mprotect, 2, libc::PROT_EXEC as u64),
        DenyRule::masked(libc::SYS_pkey_mprotect, 2, libc::PROT_EXEC as u64),
        DenyRule::masked(libc::SYS_shmat, 2, libc::SHM_EXEC as u64),
        // creating a mapping that is writable and executable at once
        DenyRule::masked(libc::SYS_mmap, 2, PROT_WX),
    ]
}

fn process_exec() -> Vec<DenyRule> {
    #[allow(unused_mut)]
    let mut list = vec![
        DenyRule::call(libc::SYS_clone),
        DenyRule::call(libc::SYS_clone3),
        DenyRule::call(libc::SYS_execve),
        DenyRule::call(libc::SYS_execveat),
    ];

    #[cfg(target_arch = "x86_64")]
    list.extend([
        DenyRule::call(libc::SYS_fork),
        DenyRule::call(libc::SYS_vfork),
    ]);

    list
}

fn unused_by_daemon() -> Vec<DenyRule> {
    #[allow(unused_mut)]
    let mut list = vec![
        // files
        DenyRule::call(libc::SYS_chdir),
        DenyRule::call(libc::SYS_flock),
        DenyRule::call(libc::SYS_fsetxattr),
        DenyRule::call(libc::SYS_ftruncate),
        DenyRule::call(libc::SYS_lsetxattr),
        DenyRule::call(libc::SYS_setxattr),
        DenyRule::call(libc::SYS_truncate),
        // set user/group ID
        DenyRule::call(libc::SYS_setgid),
        DenyRule::call(libc::SYS_setregid),
        DenyRule::call(libc::SYS_setresgid),
        DenyRule::call(libc::SYS_setresuid),
        DenyRule::call(libc::SYS_setreuid),
        DenyRule::call(libc::SYS_setuid),
        // shared memory
        DenyRule::call(libc::SYS_shmat),
        DenyRule::call(libc::SYS_shmctl),
        DenyRule::call(libc::SYS_shmdt),
        DenyRule::call(libc::SYS_shmget),
        // memory protection keys
        DenyRule::call(libc::SYS_pkey_alloc),
        DenyRule::call(libc::SYS_pkey_free),
        DenyRule::call(libc::SYS_pkey_mprotect),
        // async I/O
        DenyRule::call(libc::SYS_io_cancel),
        DenyRule::call(libc::SYS_io_destroy),
        DenyRule::call(libc::SYS_io_getevents),
        DenyRule::call(SYS_IO_PGETEVENTS),
        DenyRule::call(libc::SYS_io_setup),
        DenyRule::call(libc::SYS_io_submit),
        DenyRule::call(libc::SYS_io_uring_enter),
        DenyRule::call(libc::SYS_io_uring_register),
        DenyRule::call(libc::SYS_io_uring_setup),
        // ipc
        DenyRule::call(libc::SYS_memfd_create),
        DenyRule::call(libc::SYS_mq_getsetattr),
        DenyRule::call(libc::SYS_mq_notify),
        DenyRule::call(libc::SYS_mq_open),
        DenyRule::call(libc::SYS_mq_timedreceive),
        DenyRule::call(libc::SYS_mq_timedsend),
        DenyRule::call(libc::SYS_mq_unlink),
        DenyRule::call(libc::SYS_msgctl),
        DenyRule::call(libc::SYS_msgget),
        DenyRule::call(libc::SYS_msgrcv),
        DenyRule::call(libc::SYS_msgsnd),
        DenyRule::call(libc::SYS_process_madvise),
        DenyRule::call(libc::SYS_process_vm_readv),
        DenyRule::call(libc::SYS_process_vm_writev),
        DenyRule::call(libc::SYS_semctl),
        DenyRule::call(libc::SYS_semget),
        DenyRule::call(libc::SYS_semop),
        DenyRule::call(libc::SYS_semtimedop),
        // sending signals to other processes
        DenyRule::call(libc::SYS_kill),
        DenyRule::call(libc::SYS_pidfd_send_signal),
        DenyRule::call(libc::SYS_rt_sigqueueinfo),
        DenyRule::call(libc::SYS_rt_tgsigqueueinfo),
        DenyRule::call(libc::SYS_tgkill),
        DenyRule::call(libc::SYS_tkill),
        // resources and scheduling
        DenyRule::call(libc::SYS_ioprio_set),
        DenyRule::call(libc::SYS_sched_setaffinity),
        DenyRule::call(libc::SYS_sched_setattr),
        DenyRule::call(libc::SYS_sched_setparam),
        DenyRule::call(libc::SYS_sched_setscheduler),
        DenyRule::call(libc::SYS_setpriority),
        DenyRule::call(libc::SYS_setrlimit),
        // NUMA
        DenyRule::call(libc::SYS_mbind),
        DenyRule::call(libc::SYS_migrate_pages),
        DenyRule::call(libc::SYS_move_pages),
        DenyRule::call(libc::SYS_set_mempolicy),
        // landlock: the ruleset, if any, is installed by now
        DenyRule::call(libc::SYS_landlock_add_rule),
        DenyRule::call(libc::SYS_landlock_create_ruleset),
        DenyRule::call(libc::SYS_landlock_restrict_self),
        // misc
        DenyRule::call(libc::SYS_personality),
        DenyRule::call(libc::SYS_seccomp),
        // timers
        DenyRule::call(libc::SYS_getitimer),
        DenyRule::call(libc::SYS_setitimer),
        DenyRule::call(libc::SYS_timer_create),
        DenyRule::call(libc::SYS_timer_delete),
        DenyRule::call(libc::SYS_timer_getoverrun),
        DenyRule::call(libc::SYS_timer_gettime),
        DenyRule::call(libc::SYS_timer_settime),
        DenyRule::call(libc::SYS_timerfd_create),
        DenyRule::call(libc::SYS_timerfd_gettime),
        DenyRule::call(libc::SYS_timerfd_settime),
        DenyRule::call(libc::SYS_times),
    ];

    #[cfg(target_arch = "x86_64")]
    list.extend([
        DenyRule::call(libc::SYS_mknod),
        DenyRule::call(libc::SYS_utime),
        DenyRule::call(libc::SYS_alarm),
        // CPU emulation
        DenyRule::call(libc::SYS_modify_ldt),
    ]);

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denies(categories: &[SyscallCategory], category: SyscallCategory) -> bool {
        categories.contains(&category)
    }

    #[test]
    fn obsolete_and_writable_code_always_denied() {
        for privileged in [false, true] {
            for can_exec in [false, true] {
                let cats = denied_categories(privileged, can_exec);
                assert!(denies(&cats, SyscallCategory::SafeObsolete));
                assert!(denies(&cats, SyscallCategory::WritableCode));
            }
        }
    }

    #[test]
    fn unprivileged_no_exec_denies_everything() {
        let cats = denied_categories(false, false);
        assert!(denies(&cats, SyscallCategory::Privileged));
        assert!(denies(&cats, SyscallCategory::ProcessExec));
        assert!(denies(&cats, SyscallCategory::UnusedByDaemon));
    }

    #[test]
    fn privileged_with_exec_keeps_privileged_and_exec() {
        let cats = denied_categories(true, true);
        assert!(!denies(&cats, SyscallCategory::Privileged));
        assert!(!denies(&cats, SyscallCategory::ProcessExec));
        assert!(!denies(&cats, SyscallCategory::UnusedByDaemon));
    }

    #[test]
    fn privileged_without_exec_still_loses_privileged_calls() {
        let cats = denied_categories(true, false);
        assert!(denies(&cats, SyscallCategory::Privileged));
        assert!(denies(&cats, SyscallCategory::ProcessExec));
    }

    #[test]
    fn unprivileged_with_exec_loses_privileged_calls_only() {
        let cats = denied_categories(false, true);
        assert!(denies(&cats, SyscallCategory::Privileged));
        assert!(!denies(&cats, SyscallCategory::ProcessExec));
        assert!(!denies(&cats, SyscallCategory::UnusedByDaemon));
    }

    #[test]
    fn wx_mapping_is_rejected_exec_only_is_not() {
        let mmap = writable_code()
            .into_iter()
            .find(|r| r.syscall == libc::SYS_mmap)
            .unwrap();

        let mut args = [0u64; 6];
        args[2] = (libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC) as u64;
        assert!(mmap.matches(&args));

        args[2] = libc::PROT_EXEC as u64;
        assert!(!mmap.matches(&args));

        args[2] = (libc::PROT_READ | libc::PROT_WRITE) as u64;
        assert!(!mmap.matches(&args));
    }

    #[test]
    fn making_memory_executable_is_rejected() {
        let mprotect = writable_code()
            .into_iter()
            .find(|r| r.syscall == libc::SYS_mprotect)
            .unwrap();

        let mut args = [0u64; 6];
        args[2] = libc::PROT_EXEC as u64;
        assert!(mprotect.matches(&args));

        args[2] = (libc::PROT_READ | libc::PROT_WRITE) as u64;
        assert!(!mprotect.matches(&args));
    }

    #[test]
    fn categories_are_not_empty() {
        for cat in [
            SyscallCategory::Privileged,
            SyscallCategory::SafeObsolete,
            SyscallCategory::WritableCode,
            SyscallCategory::ProcessExec,
            SyscallCategory::UnusedByDaemon,
        ] {
            assert!(!cat.rules().is_empty(), "{} is empty", cat.name());
        }
    }

    #[test]
    fn exec_family_is_unconditional() {
        for rule in process_exec() {
            assert_eq!(rule.filter, ArgFilter::Always);
        }
    }
}
