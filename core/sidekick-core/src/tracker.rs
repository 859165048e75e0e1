//! Session tracking state machine.
//!
//! The tracker owns the set of launcher pids belonging to the current
//! session and drives the companion process across the two transitions that
//! matter: zero instances -> at least one (start the companion once) and
//! back to zero (stop it, retire every watch, re-arm the creation watch).
//!
//! Every mutation runs under one mutex, and every watch callback carries the
//! epoch current when it was armed. A reset (session end, resume) bumps the
//! epoch inside the same critical section that cancels the watches, so a
//! notification already in flight either applies before the reset or is
//! dropped by the epoch check - it can never repopulate reset state.

use crate::companion::CompanionController;
use crate::process::ProcessTable;
use crate::watch::{ProcessEvents, WatchSet};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

struct TrackerInner {
    active_pids: HashSet<u32>,
    session_started: bool,
    /// Incremented on every reset; callbacks armed under an older epoch are
    /// ignored.
    epoch: u64,
    watches: WatchSet,
}

pub struct SessionTracker<T: ProcessTable, E: ProcessEvents> {
    table: Arc<T>,
    events: Arc<E>,
    companion: CompanionController<T>,
    launcher: String,
    /// Handed to watch callbacks so they can reach back into the tracker
    /// without keeping it alive.
    self_ref: Weak<Self>,
    inner: Mutex<TrackerInner>,
}

impl<T: ProcessTable + 'static, E: ProcessEvents + 'static> SessionTracker<T, E> {
    pub fn new(
        table: Arc<T>,
        events: Arc<E>,
        companion: CompanionController<T>,
        launcher: String,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            table,
            events,
            companion,
            launcher,
            self_ref: self_ref.clone(),
            inner: Mutex::new(TrackerInner {
                active_pids: HashSet::new(),
                session_started: false,
                epoch: 0,
                watches: WatchSet::new(),
            }),
        })
    }

    fn lock_inner(&self) -> MutexGuard<'_, TrackerInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Cancels any previous observation cycle and starts a new one: existing
    /// launcher instances are tracked directly, otherwise a creation watch
    /// is armed.
    pub fn start_scanning(&self) {
        let mut inner = self.lock_inner();
        self.rescan_locked(&mut inner);
    }

    /// Invoked on system resume. Equivalent to re-entering the idle state
    /// and replaying the startup scan; safe against in-flight notifications
    /// for the previous cycle.
    pub fn on_resume(&self) {
        info!("System resumed from suspend, restarting process watches");
        self.start_scanning();
    }

    /// Retires every watch and clears tracked state. Exit-path cleanup.
    pub fn shutdown(&self) {
        let mut inner = self.lock_inner();
        inner.epoch += 1;
        inner.watches.cancel_all();
        inner.active_pids.clear();
        inner.session_started = false;
    }

    pub fn active_pids(&self) -> Vec<u32> {
        let inner = self.lock_inner();
        let mut pids: Vec<u32> = inner.active_pids.iter().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn session_started(&self) -> bool {
        self.lock_inner().session_started
    }

    fn rescan_locked(&self, inner: &mut TrackerInner) {
        inner.watches.cancel_all();
        inner.active_pids.clear();
        inner.session_started = false;
        inner.epoch += 1;
        let epoch = inner.epoch;

        let existing = self.table.processes_by_name(&self.launcher);
        if existing.is_empty() {
            self.arm_creation_watch_locked(inner, epoch);
        } else {
            for process in existing {
                debug!(pid = process.pid, name = %process.name, "Launcher already running");
                self.track_pid_locked(inner, epoch, process.pid);
            }
        }
    }

    fn arm_creation_watch_locked(&self, inner: &mut TrackerInner, epoch: u64) {
        let tracker = self.self_ref.clone();
        let result = self.events.watch_creation(
            &self.launcher,
            Box::new(move |pid| {
                if let Some(tracker) = Weak::upgrade(&tracker) {
                    tracker.handle_created(epoch, pid);
                }
            }),
        );
        match result {
            Ok(handle) => {
                inner.watches.arm(handle);
                info!(launcher = %self.launcher, "Listening for launcher process events");
            }
            Err(err) => {
                warn!(error = %err, launcher = %self.launcher, "Failed to arm creation watch");
            }
        }
    }

    /// Adds `pid` to the session, arms its termination watch, and starts the
    /// companion if this is the first instance of the session.
    fn track_pid_locked(&self, inner: &mut TrackerInner, epoch: u64, pid: u32) {
        if !inner.active_pids.insert(pid) {
            debug!(pid, "Pid already tracked");
            return;
        }

        let tracker = self.self_ref.clone();
        let result = self.events.watch_termination(
            pid,
            Box::new(move || {
                if let Some(tracker) = Weak::upgrade(&tracker) {
                    tracker.handle_terminated(epoch, pid);
                }
            }),
        );
        match result {
            Ok(handle) => {
                inner.watches.arm(handle);
                debug!(pid, "Monitoring termination of launcher process");
            }
            Err(err) => {
                // The pid stays tracked without an observable exit; the
                // session may then outlive it. Accepted degradation.
                warn!(error = %err, pid, "Failed to arm termination watch");
            }
        }

        if !inner.session_started {
            inner.session_started = true;
            info!(pid, launcher = %self.launcher, "First launcher instance detected, session started");
            if let Err(err) = self.companion.ensure_started() {
                warn!(error = %err, "Failed to start companion");
            }
        } else {
            debug!(pid, "Additional launcher instance tracked");
        }
    }

    fn handle_created(&self, epoch: u64, pid: u32) {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            debug!(pid, "Dropping creation event from a retired watch");
            return;
        }
        self.track_pid_locked(&mut inner, epoch, pid);
    }

    fn handle_terminated(&self, epoch: u64, pid: u32) {
        let mut inner = self.lock_inner();
        if inner.epoch != epoch {
            debug!(pid, "Dropping termination event from a retired watch");
            return;
        }
        if !inner.active_pids.remove(&pid) {
            debug!(pid, "Termination event for untracked pid");
            return;
        }
        info!(pid, "Launcher process terminated");

        if inner.active_pids.is_empty() {
            info!("All launcher processes terminated, session ended");
            self.companion.ensure_stopped();
            self.rescan_locked(&mut inner);
        }
    }
}
