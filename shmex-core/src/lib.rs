//! shmex Core Library
//!
//! Process-to-process data exchange through a named shared-memory region.
//! Provides region creation and attachment, payload framing with a sequence
//! lock, the writer and reader contracts, and configuration parsing.

pub mod config;
pub mod error;
pub mod model;
pub mod shm;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, ReaderConfig, RegionConfig};
pub use error::{HardValidationError, SharedMemoryError, ShmexError, ShmexResult};
pub use model::{Auth, Schema};
pub use shm::{ReadOutcome, RegionReader, RegionWriter, Snapshot, Unreadable, WaitOptions};
pub use types::{Capacity, RegionName};
