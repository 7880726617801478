//! Domain types for voicenote.
//!
//! - Recording: the unit of work and its sync state
//! - Metadata: open key/value map with delivery defaults
//! - Events: journal lines the store is rebuilt from

pub mod events;
pub mod metadata;
pub mod recording;

pub use events::{EntryData, JournalEvent, JournalEventType};
pub use metadata::{DeliveryFields, Metadata};
pub use recording::{NewRecording, Recording, RecordingId, SyncState};
