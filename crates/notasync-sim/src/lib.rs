//! Notasync Sim - headless playback of a score against a simulated clock
//!
//! A scenario file bundles a score, a viewport, an optional loop and a
//! pointer script. The runner drives a [`notasync_core::SyncSession`] with
//! the headless collaborators and reports what happened.

pub mod runner;
pub mod scenario;

pub use runner::{run, RunReport};
pub use scenario::{Action, Scenario, ScriptStep};
