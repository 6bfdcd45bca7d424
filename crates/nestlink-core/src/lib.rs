//! Core domain types for the nestlink invite-token service.
//!
//! This crate defines the invite token and redemption link records, the
//! token codec (generation and format validation of the bearer secret),
//! and the core error type. It carries no I/O; persistence and HTTP live
//! in the sibling crates.

pub mod error;
pub mod invite;
pub mod token;

pub use error::{CoreError, Result};
pub use invite::{
    InviteDuration, InviteToken, NewInviteToken, NewRedemptionLink, RedemptionLink,
    ResourcePreview, TokenState,
};
pub use token::InviteCode;
