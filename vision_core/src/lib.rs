#![forbid(unsafe_code)]

//! Core domain model and session logic for the MindVision practice system.
//!
//! This crate provides:
//! - Domain types (exercises, journal entries, the demo user)
//! - Exercise catalog
//! - Playback timer and cyclic navigation
//! - Journal session synchronized with an entry store
//! - SQLite entry store and the JSON route layer
//! - CSV export

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod timer;
pub mod navigator;
pub mod store;
pub mod sqlite_store;
pub mod journal;
pub mod api;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use timer::{format_time, PlaybackTimer, TickSchedule, TimerState};
pub use navigator::SessionNavigator;
pub use store::{EntryStore, ErrorKind, StoreError, StoreResult};
pub use sqlite_store::SqliteEntryStore;
pub use journal::{JournalSession, SessionStatus};
pub use api::{dispatch, ApiResponse, RouteGateway};
pub use export::write_entries_csv;
