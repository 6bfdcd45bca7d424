//! Authenticated principal extraction.
//!
//! The identity provider is an external collaborator: it authenticates a
//! caller and supplies a stable principal id. This module only bridges
//! that into axum via the [`IdentityResolver`] seam. A static resolver
//! configured from `[[auth.principals]]` serves development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// An authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct AuthPrincipal {
    pub id: Uuid,
    pub is_admin: bool,
}

/// Resolves a bearer credential to a principal.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `None` means the credential is unknown or expired.
    async fn resolve(&self, bearer: &str) -> Option<AuthPrincipal>;
}

/// Fixed bearer-token table. Development stand-in for the identity
/// provider.
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    principals: HashMap<String, AuthPrincipal>,
}

impl StaticIdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_principal(mut self, bearer: impl Into<String>, id: Uuid, is_admin: bool) -> Self {
        self.principals
            .insert(bearer.into(), AuthPrincipal { id, is_admin });
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, bearer: &str) -> Option<AuthPrincipal> {
        self.principals.get(bearer).copied()
    }
}

/// Shared resolver handle.
pub type SharedIdentityResolver = Arc<dyn IdentityResolver>;

impl FromRequestParts<AppState> for AuthPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let bearer = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        state
            .identity
            .resolve(bearer)
            .await
            .ok_or(ApiError::Unauthorized)
    }
}
