//! HTTP handlers for the invite lifecycle.
//!
//! - `POST /invites` — issue (authenticated issuer)
//! - `GET /invites` — issuer's token listing (authenticated issuer)
//! - `POST /invites/validate` — preview, unauthenticated-safe
//! - `POST /invites/redeem` — redeem (authenticated redeemer)
//! - `POST /invites/{id}/revoke` — revoke (issuer or admin)
//! - `GET /healthz` — storage reachability

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use nestlink_core::{InviteDuration, InviteToken};
use nestlink_invites::{PublicValidation, Redemption};

use crate::auth::AuthPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub resource_id: Uuid,
    pub duration_days: i64,
    pub max_uses: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: Uuid,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub linked: bool,
    pub resource_id: Uuid,
    pub already_redeemed: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /invites - Issue a new invite token.
///
/// Returns the bearer code once; the issuer is responsible for sharing
/// it through the notification channel of their choice.
pub async fn issue_invite(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(req): Json<IssueRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let duration = InviteDuration::from_days(req.duration_days)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let token = state
        .issuer
        .issue(req.resource_id, principal.id, duration, req.max_uses)
        .await
        .map_err(ApiError::from)?;

    let body = IssueResponse {
        id: token.id,
        token: token.code.as_str().to_string(),
        expires_at: token.expires_at,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /invites - List the caller's tokens with full metadata.
///
/// The issuer is the only party ever shown `useCount`/`maxUses`.
pub async fn list_invites(
    State(state): State<AppState>,
    principal: AuthPrincipal,
) -> Result<Json<Vec<InviteToken>>, ApiError> {
    let tokens = state
        .storage
        .list_by_issuer(principal.id)
        .await
        .map_err(|e| ApiError::from(nestlink_invites::InviteError::from(e)))?;
    Ok(Json(tokens))
}

/// POST /invites/validate - Unauthenticated preview.
///
/// Every non-valid condition answers with the same generic body, and
/// every call costs one storage lookup, so responses reveal nothing
/// about which tokens exist.
pub async fn validate_invite(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<PublicValidation>, ApiError> {
    let validation = state
        .validator
        .classify_public(&req.token)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(validation))
}

/// POST /invites/redeem - Redeem a token for the authenticated caller.
pub async fn redeem_invite(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(req): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
    let redemption = state
        .coordinator
        .redeem(&req.token, principal.id)
        .await
        .map_err(ApiError::from_redemption)?;

    let body = RedeemResponse {
        linked: true,
        resource_id: redemption.link().resource_id,
        already_redeemed: matches!(redemption, Redemption::AlreadyRedeemed(_)),
    };
    Ok(Json(body))
}

/// POST /invites/{id}/revoke - Revoke a token.
pub async fn revoke_invite(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .revocation
        .revoke(id, principal.id, principal.is_admin)
        .await
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /healthz - Storage reachability probe.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.storage.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Health check failed");
        ApiError::Unavailable
    })?;
    Ok(Json(HealthResponse {
        status: "ok",
        backend: state.storage.backend_name(),
    }))
}
