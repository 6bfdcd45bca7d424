//! Invite services: issuance, validation, redemption, revocation.
//!
//! The services in this crate are stateless between requests; every
//! cross-request guarantee (quota under concurrency, revocation of
//! in-flight redemptions, idempotent repeat redemption) is delegated to
//! the [`nestlink_storage::InviteStorage`] atomicity contracts.

pub mod directory;
pub mod error;
pub mod issuer;
pub mod redemption;
pub mod revocation;
pub mod validator;

pub use directory::{ResourceDirectory, SharedDirectory, StaticDirectory};
pub use error::{InviteError, InviteResult};
pub use issuer::{DEFAULT_MAX_USES_CEILING, TokenIssuer};
pub use redemption::{Redemption, RedemptionCoordinator};
pub use revocation::RevocationManager;
pub use validator::{Classification, PublicValidation, TokenValidator};
