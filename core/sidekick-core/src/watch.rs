//! Live process-event subscriptions.
//!
//! A [`WatchHandle`] is the unit of subscription lifetime: armed once,
//! delivered the notifications matching its filter, and explicitly cancelled.
//! [`WatchSet`] owns every handle for the current observation cycle so a
//! session end or a resume reset can retire all of them in one sweep.
//!
//! Cancellation only flips a flag; it never joins worker threads, because it
//! runs inside the tracker's critical section and a worker may be blocked on
//! that same section delivering an event. Late deliveries are discarded by
//! the tracker's epoch check instead.

use crate::error::{Result, SidekickError};
use crate::process::ProcessTable;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub type CreatedCallback = Box<dyn Fn(u32) + Send + Sync>;
pub type TerminatedCallback = Box<dyn Fn() + Send + Sync>;

/// A live subscription to process creation or termination events.
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
}

impl WatchHandle {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clone of the cancellation flag, polled by the worker that services
    /// this subscription.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Default for WatchHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Owns every live subscription for the current observation cycle.
#[derive(Default)]
pub struct WatchSet {
    handles: Vec<WatchHandle>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, handle: WatchHandle) {
        self.handles.push(handle);
    }

    /// Cancels and drops every handle. Safe to call when already empty.
    pub fn cancel_all(&mut self) {
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        if count > 0 {
            debug!(count, "Cancelled process watches");
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Source of asynchronous process appearance/disappearance notifications.
pub trait ProcessEvents: Send + Sync {
    /// Watches for new processes matching `name`; `on_created` receives each
    /// new pid exactly once.
    fn watch_creation(&self, name: &str, on_created: CreatedCallback) -> Result<WatchHandle>;

    /// Watches for the disappearance of `pid`; `on_terminated` fires at most
    /// once.
    fn watch_termination(&self, pid: u32, on_terminated: TerminatedCallback)
        -> Result<WatchHandle>;
}

/// Poll-based [`ProcessEvents`] implementation: one worker thread per watch,
/// diffing process-table snapshots at a fixed interval.
pub struct PollingProcessEvents<T: ProcessTable> {
    table: Arc<T>,
    interval: Duration,
}

impl<T: ProcessTable + 'static> PollingProcessEvents<T> {
    pub fn new(table: Arc<T>, interval: Duration) -> Self {
        Self { table, interval }
    }
}

impl<T: ProcessTable + 'static> ProcessEvents for PollingProcessEvents<T> {
    fn watch_creation(&self, name: &str, on_created: CreatedCallback) -> Result<WatchHandle> {
        let handle = WatchHandle::new();
        let stop = handle.stop_flag();
        let table = Arc::clone(&self.table);
        let interval = self.interval;
        let name = name.to_string();

        thread::Builder::new()
            .name(format!("watch-create-{name}"))
            .spawn(move || {
                // Start from an empty snapshot: anything present on the first
                // poll is reported as created, closing the gap between the
                // caller's enumeration and this watch going live.
                let mut seen: HashSet<u32> = HashSet::new();
                loop {
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(interval);
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    let current: HashSet<u32> = table
                        .processes_by_name(&name)
                        .iter()
                        .map(|process| process.pid)
                        .collect();
                    for pid in current.difference(&seen) {
                        if stop.load(Ordering::SeqCst) {
                            return;
                        }
                        on_created(*pid);
                    }
                    // Forget pids that vanished so a reused pid is reported
                    // again as a fresh creation.
                    seen = current;
                }
            })
            .map_err(|err| SidekickError::WatchFailed {
                kind: "creation",
                details: err.to_string(),
            })?;

        Ok(handle)
    }

    fn watch_termination(
        &self,
        pid: u32,
        on_terminated: TerminatedCallback,
    ) -> Result<WatchHandle> {
        let handle = WatchHandle::new();
        let stop = handle.stop_flag();
        let table = Arc::clone(&self.table);
        let interval = self.interval;

        thread::Builder::new()
            .name(format!("watch-term-{pid}"))
            .spawn(move || loop {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                thread::sleep(interval);
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                if !table.is_alive(pid) {
                    on_terminated();
                    return;
                }
            })
            .map_err(|err| SidekickError::WatchFailed {
                kind: "termination",
                details: err.to_string(),
            })?;

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessInfo;
    use std::path::Path;
    use std::sync::mpsc;
    use std::sync::Mutex;

    struct FakeTable {
        processes: Mutex<Vec<ProcessInfo>>,
    }

    impl FakeTable {
        fn new() -> Self {
            Self {
                processes: Mutex::new(Vec::new()),
            }
        }

        fn add(&self, pid: u32, name: &str) {
            self.processes.lock().expect("table lock").push(ProcessInfo {
                pid,
                name: name.to_string(),
            });
        }

        fn remove(&self, pid: u32) {
            self.processes
                .lock()
                .expect("table lock")
                .retain(|process| process.pid != pid);
        }
    }

    impl ProcessTable for FakeTable {
        fn processes_by_name(&self, name: &str) -> Vec<ProcessInfo> {
            self.processes
                .lock()
                .expect("table lock")
                .iter()
                .filter(|process| process.name == name)
                .cloned()
                .collect()
        }

        fn spawn(&self, _path: &Path) -> crate::error::Result<u32> {
            unimplemented!("not used by watch tests")
        }

        fn kill(&self, _pid: u32) -> bool {
            false
        }

        fn is_alive(&self, pid: u32) -> bool {
            self.processes
                .lock()
                .expect("table lock")
                .iter()
                .any(|process| process.pid == pid)
        }
    }

    const POLL: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn creation_watch_reports_each_new_pid_once() {
        let table = Arc::new(FakeTable::new());
        let events = PollingProcessEvents::new(Arc::clone(&table), POLL);
        let (tx, rx) = mpsc::channel();

        let handle = events
            .watch_creation(
                "launcher",
                Box::new(move |pid| {
                    let _ = tx.send(pid);
                }),
            )
            .expect("arm creation watch");

        table.add(100, "launcher");
        assert_eq!(rx.recv_timeout(WAIT).expect("first pid"), 100);

        table.add(101, "launcher");
        assert_eq!(rx.recv_timeout(WAIT).expect("second pid"), 101);

        // No further events while the set is stable.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        handle.cancel();
    }

    #[test]
    fn termination_watch_fires_when_pid_disappears() {
        let table = Arc::new(FakeTable::new());
        table.add(42, "launcher");
        let events = PollingProcessEvents::new(Arc::clone(&table), POLL);
        let (tx, rx) = mpsc::channel();

        let _handle = events
            .watch_termination(
                42,
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .expect("arm termination watch");

        table.remove(42);
        rx.recv_timeout(WAIT).expect("termination event");
    }

    #[test]
    fn cancelled_watch_stops_delivering() {
        let table = Arc::new(FakeTable::new());
        let events = PollingProcessEvents::new(Arc::clone(&table), POLL);
        let (tx, rx) = mpsc::channel();

        let handle = events
            .watch_creation(
                "launcher",
                Box::new(move |pid| {
                    let _ = tx.send(pid);
                }),
            )
            .expect("arm creation watch");

        handle.cancel();
        // Give the worker time to observe the flag, then mutate the table.
        thread::sleep(POLL * 4);
        table.add(7, "launcher");
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn cancel_all_is_idempotent_and_empty_safe() {
        let mut set = WatchSet::new();
        set.cancel_all();

        let handle = WatchHandle::new();
        let flag = handle.stop_flag();
        set.arm(handle);
        assert_eq!(set.len(), 1);

        set.cancel_all();
        assert!(set.is_empty());
        assert!(flag.load(Ordering::SeqCst));

        set.cancel_all();
        assert!(set.is_empty());
    }

    #[test]
    fn cancel_marks_handle_cancelled() {
        let handle = WatchHandle::new();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        // Cancelling again is harmless.
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn dropping_a_handle_cancels_it() {
        let handle = WatchHandle::new();
        let flag = handle.stop_flag();
        drop(handle);
        assert!(flag.load(Ordering::SeqCst));
    }
}
