//! Transcript watcher that lifts `[ACTION]`/`[DATA]` directives out of a
//! live assistant conversation and applies them as sandboxed file mutations.
//!
//! Invariant: one cooperative loop on one thread — every wait (stability
//! resample, snippet delay, inter-cycle pause) goes through a
//! [`pacing::Pacer`], so tests drive cycles without wall-clock sleeps.
//!
//! # Public API Overview
//! - Parse directives into typed commands with [`commands`].
//! - Apply commands inside a repository sandbox via [`ActionExecutor`].
//! - Drive sweeps with [`Watcher`] over any [`transcript_source`] impl.
//! - Configure startup through [`WatcherConfig`] and [`sources`].

pub mod actions;
pub mod commands;
pub mod config;
pub mod pacing;
pub mod sources;
pub mod watcher;

/// Command execution against a repository root.
pub use crate::actions::{ActionExecutor, ActionOutcome, Formatter};

/// Directive extraction and the typed command union.
pub use crate::commands::{
    extract_directive, Command, CommandError, Directive, FieldFormatError, InsertEdit, RegionEdit,
};

/// Startup configuration.
pub use crate::config::{FormatterConfig, WatcherConfig};

/// Injectable waits.
pub use crate::pacing::{Pacer, RecordingPacer, ThreadPacer};

/// Transcript source selection.
pub use crate::sources::{source_for_id, source_from_env, DEFAULT_SOURCE_ID, SOURCE_ENV_VAR};

/// The sweep loop and its exactly-once ledger.
pub use crate::watcher::{CycleReport, ProcessedLedger, Watcher};
