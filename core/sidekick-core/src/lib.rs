//! Core library for sidekick.
//!
//! Sidekick watches the process table for a configured "launcher" application,
//! tracks every process instance belonging to its current session, and starts
//! a companion executable when the session begins and stops it when the last
//! launcher process exits. The tracker also survives suspend/resume cycles by
//! tearing down and re-arming its process watches.

pub mod companion;
pub mod config;
pub mod error;
pub mod power;
pub mod process;
pub mod tracker;
pub mod watch;

pub use companion::CompanionController;
pub use config::Config;
pub use error::{Result, SidekickError};
pub use power::ResumeMonitor;
pub use process::{ProcessInfo, ProcessTable, SystemProcessTable};
pub use tracker::SessionTracker;
pub use watch::{PollingProcessEvents, ProcessEvents, WatchHandle, WatchSet};
