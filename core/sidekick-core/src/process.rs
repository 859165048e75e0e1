//! Process table access for the daemon.
//!
//! All OS process queries go through the [`ProcessTable`] trait so the
//! tracker, companion controller, and event source can be exercised against
//! fakes in tests. [`SystemProcessTable`] is the sysinfo-backed
//! implementation used by the daemon.

use crate::error::{Result, SidekickError};
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

pub trait ProcessTable: Send + Sync {
    /// Current processes whose name matches `name`. Query failures degrade
    /// to an empty list.
    fn processes_by_name(&self, name: &str) -> Vec<ProcessInfo>;

    /// Launches the executable at `path` with its containing directory as
    /// the working directory. Returns the new process id.
    fn spawn(&self, path: &Path) -> Result<u32>;

    /// Best-effort kill. Returns false when the signal could not be
    /// delivered (insufficient privilege, process already gone).
    fn kill(&self, pid: u32) -> bool;

    fn is_alive(&self, pid: u32) -> bool;
}

/// Compares process names, tolerating a platform executable suffix on
/// either side ("RSI Launcher" matches "RSI Launcher.exe").
pub(crate) fn names_match(candidate: &str, wanted: &str) -> bool {
    fn strip_exe(name: &str) -> &str {
        // Process names are arbitrary bytes-as-UTF-8; the split point may
        // land inside a multibyte character, so it must be boundary-checked
        // before slicing.
        let split = name.len().saturating_sub(4);
        if name.len() > 4
            && name.is_char_boundary(split)
            && name[split..].eq_ignore_ascii_case(".exe")
        {
            &name[..split]
        } else {
            name
        }
    }
    strip_exe(candidate).eq_ignore_ascii_case(strip_exe(wanted))
}

pub struct SystemProcessTable {
    system: Mutex<System>,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn processes_by_name(&self, name: &str) -> Vec<ProcessInfo> {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(ProcessRefreshKind::new());
        system
            .processes()
            .iter()
            .filter(|(_, process)| names_match(process.name(), name))
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
            })
            .collect()
    }

    fn spawn(&self, path: &Path) -> Result<u32> {
        let mut command = Command::new(path);
        if let Some(parent) = path.parent() {
            command.current_dir(parent);
        }
        let child = command.spawn().map_err(|err| SidekickError::SpawnFailed {
            path: path.to_path_buf(),
            source: err,
        })?;
        Ok(child.id())
    }

    fn kill(&self, pid: u32) -> bool {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sys_pid = Pid::from_u32(pid);
        if !system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new()) {
            warn!(pid, "Process already exited before kill");
            return false;
        }
        match system.process(sys_pid) {
            Some(process) => process.kill(),
            None => false,
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sys_pid = Pid::from_u32(pid);
        system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new())
            && system.process(sys_pid).is_some()
    }
}
