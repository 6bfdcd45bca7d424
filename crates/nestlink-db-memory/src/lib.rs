//! In-memory invite storage backend.
//!
//! Backs the test suite and local development. All mutating operations
//! take the single state mutex once and perform their check-and-mutate
//! inside it, so the backend honors the same atomicity contract as the
//! PostgreSQL backend: `claim_use` is all-or-nothing and `insert_link`
//! behaves like a uniqueness constraint.

mod storage;

pub use storage::MemoryInviteStorage;
