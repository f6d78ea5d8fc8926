//! Process-table inspection and signalling.
//!
//! Launch commands may be wrapped by sandboxing or inhibitor layers that
//! exec and exit early, so process ancestry cannot be trusted. Instances
//! are instead located by scanning /proc for a command line that references
//! their instance directory; `ProcessLocator` keeps that scan (and the
//! signalling that acts on its results) injectable for tests.

pub trait ProcessLocator {
    /// First process whose command line contains `needle`, skipping `exclude`.
    fn find_by_arg(&self, needle: &str, exclude: &[u32]) -> Option<u32>;

    /// All processes whose command line contains `needle`, skipping `exclude`.
    fn find_all_by_arg(&self, needle: &str, exclude: &[u32]) -> Vec<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the process to exit (SIGTERM).
    fn terminate(&self, pid: u32);

    /// Force the process to exit (SIGKILL).
    fn kill(&self, pid: u32);
}

/// /proc-backed locator.
pub struct ProcScanner;

impl ProcessLocator for ProcScanner {
    fn find_by_arg(&self, needle: &str, exclude: &[u32]) -> Option<u32> {
        self.find_all_by_arg(needle, exclude).into_iter().next()
    }

    fn find_all_by_arg(&self, needle: &str, exclude: &[u32]) -> Vec<u32> {
        let mut found = Vec::new();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return found;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Ok(pid) = name.to_string_lossy().parse::<u32>() else {
                continue;
            };
            if exclude.contains(&pid) {
                continue;
            }

            let Ok(raw) = std::fs::read_to_string(format!("/proc/{}/cmdline", pid)) else {
                continue;
            };
            // cmdline uses null bytes as separators
            let cmdline = raw.replace('\0', " ");

            if cmdline.contains(needle) {
                found.push(pid);
            }
        }

        found
    }

    fn is_alive(&self, pid: u32) -> bool {
        let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if ret == 0 {
            return true;
        }
        // EPERM still means the process exists
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn terminate(&self, pid: u32) {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }

    fn kill(&self, pid: u32) {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::ProcessLocator;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    /// Scripted locator: `alive` is the set of live pids, `by_arg` maps a
    /// command-line needle to the pid a scan would find for it. Signals are
    /// recorded rather than sent.
    #[derive(Default)]
    pub struct FakeLocator {
        pub alive: RefCell<HashSet<u32>>,
        pub by_arg: RefCell<HashMap<String, u32>>,
        pub terminated: RefCell<Vec<u32>>,
        pub killed: RefCell<Vec<u32>>,
    }

    impl FakeLocator {
        pub fn mark_alive(&self, pid: u32) {
            self.alive.borrow_mut().insert(pid);
        }

        pub fn mark_dead(&self, pid: u32) {
            self.alive.borrow_mut().remove(&pid);
        }

        pub fn register_arg(&self, needle: &str, pid: u32) {
            self.by_arg.borrow_mut().insert(needle.to_string(), pid);
            self.mark_alive(pid);
        }
    }

    impl ProcessLocator for FakeLocator {
        fn find_by_arg(&self, needle: &str, exclude: &[u32]) -> Option<u32> {
            self.by_arg
                .borrow()
                .get(needle)
                .copied()
                .filter(|pid| !exclude.contains(pid))
        }

        fn find_all_by_arg(&self, needle: &str, exclude: &[u32]) -> Vec<u32> {
            self.find_by_arg(needle, exclude).into_iter().collect()
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.alive.borrow().contains(&pid)
        }

        fn terminate(&self, pid: u32) {
            self.terminated.borrow_mut().push(pid);
        }

        fn kill(&self, pid: u32) {
            self.killed.borrow_mut().push(pid);
            self.mark_dead(pid);
        }
    }
}
