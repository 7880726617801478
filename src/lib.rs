//! voicenote - Offline-first voice note capture and delivery
//!
//! Captured recordings are saved to a durable local store before any network
//! attempt, then delivered to a remote ingestion endpoint exactly once,
//! surviving restarts and connectivity outages.
//!
//! # Architecture
//!
//! ```text
//! Capture → CaptureBridge → RecordStore (pending)
//!                 │                ↑
//!                 └→ immediate ──→ SyncCoordinator ← timer / connectivity
//!                    attempt             │
//!                                        └→ Uploader → remote sink
//! ```
//!
//! # Modules
//!
//! - `adapters`: Upload client for the remote sink
//! - `capture`: Capture contract and the capture-to-store bridge
//! - `config`: Configuration loading
//! - `domain`: Data structures (Recording, Metadata, journal events)
//! - `store`: Durable record store
//! - `sync`: Connectivity signal and sync coordinator
//! - `cli`: Command-line interface

pub mod adapters;
pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod store;
pub mod sync;

// Re-export main types at crate root for convenience
pub use adapters::{HttpUploader, TransportError, Uploader, WireFormat};
pub use capture::{BridgeError, Capture, CaptureBridge, CaptureError, CaptureOutcome, FileCapture};
pub use domain::{DeliveryFields, Metadata, NewRecording, Recording, RecordingId, SyncState};
pub use store::{JournalStore, RecordStore, StoreError};
pub use sync::{Connectivity, PassReport, Retention, SyncCoordinator, SyncOptions, Trigger};
