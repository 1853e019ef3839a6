// src/watch/mod.rs

//! Watch mode: file watching, change detection and the rebuild loop.
//!
//! This module is responsible for:
//! - Compiling each binding's glob patterns ([`patterns`]).
//! - Wiring up a debounced cross-platform filesystem watcher ([`watcher`]).
//! - Turning changed paths into triggered bindings, optionally gated on
//!   content hashes ([`event_handler`], [`hash`]).
//! - Coalescing triggers that arrive during a rebuild ([`queue`]).
//! - The pure watch state machine ([`scheduler`]) and its async shell
//!   ([`runtime`]).

pub mod event_handler;
pub mod hash;
pub mod patterns;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod watcher;

pub use event_handler::TriggerFilter;
pub use hash::{ContentGate, compute_hash_for_paths};
pub use patterns::BindingProfile;
pub use queue::TriggerQueue;
pub use runtime::{RebuildSummary, ServerOptions, WatchEvent, WatchOptions, WatchRuntime};
pub use scheduler::{WatchCommand, WatchCore, WatchSignal, WatchState, WatchStep};
pub use watcher::{WatcherHandle, spawn_watcher};
