//! HTTP server for the invite lifecycle service.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod router;
pub mod state;

pub use auth::{AuthPrincipal, IdentityResolver, SharedIdentityResolver, StaticIdentityResolver};
pub use config::{ServerConfig, StorageBackend, load_config};
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
