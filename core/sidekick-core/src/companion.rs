//! Companion process control.
//!
//! The controller never caches whether the companion is running; every call
//! re-queries the process table so state cannot drift when the companion is
//! started or killed by something else.

use crate::error::Result;
use crate::process::ProcessTable;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CompanionController<T: ProcessTable> {
    table: Arc<T>,
    path: PathBuf,
    process_name: String,
}

impl<T: ProcessTable> CompanionController<T> {
    pub fn new(table: Arc<T>, path: PathBuf, process_name: String) -> Self {
        Self {
            table,
            path,
            process_name,
        }
    }

    /// Starts the companion unless an instance is already running.
    pub fn ensure_started(&self) -> Result<()> {
        let existing = self.table.processes_by_name(&self.process_name);
        if !existing.is_empty() {
            info!(
                process = %self.process_name,
                "An instance of the companion is already running"
            );
            return Ok(());
        }
        let pid = self.table.spawn(&self.path)?;
        info!(process = %self.process_name, pid, "Companion started");
        Ok(())
    }

    /// Kills every running companion instance. Zero instances is a normal
    /// outcome, not an error; per-pid kill failures are logged and do not
    /// abort the sweep.
    pub fn ensure_stopped(&self) {
        let processes = self.table.processes_by_name(&self.process_name);
        if processes.is_empty() {
            info!(process = %self.process_name, "No companion instance to stop");
            return;
        }
        for process in processes {
            if self.table.kill(process.pid) {
                info!(pid = process.pid, process = %self.process_name, "Companion terminated");
            } else {
                warn!(
                    pid = process.pid,
                    process = %self.process_name,
                    "Failed to kill companion instance"
                );
            }
        }
    }
}
