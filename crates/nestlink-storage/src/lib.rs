//! Storage abstraction for nestlink.
//!
//! Defines the [`InviteStorage`] trait that every backend implements and
//! the [`StorageError`] type they report. The trait is the single seam
//! between the invite services and persistence; all concurrency
//! guarantees (atomic usage claims, race-safe link uniqueness) are
//! contracts of this trait, honored by each backend with its own
//! mechanism.

pub mod error;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{ClaimOutcome, InviteStorage, LinkInsert};
