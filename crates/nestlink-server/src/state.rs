//! Shared application state.

use std::sync::Arc;

use nestlink_invites::{
    RedemptionCoordinator, RevocationManager, SharedDirectory, StaticDirectory, TokenIssuer,
    TokenValidator,
};
use nestlink_notifications::{LogSender, RedemptionNotifier};
use nestlink_storage::InviteStorage;

use crate::auth::{SharedIdentityResolver, StaticIdentityResolver};
use crate::config::ServerConfig;

/// Everything a request handler needs. Cheap to clone; the storage
/// handle is the only shared resource and all coordination happens
/// inside it.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn InviteStorage>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub coordinator: Arc<RedemptionCoordinator>,
    pub revocation: Arc<RevocationManager>,
    pub identity: SharedIdentityResolver,
}

impl AppState {
    /// Wire up services over a storage backend.
    #[must_use]
    pub fn new(
        storage: Arc<dyn InviteStorage>,
        directory: SharedDirectory,
        identity: SharedIdentityResolver,
        config: &ServerConfig,
    ) -> Self {
        let notifier = RedemptionNotifier::new().with_sender(Arc::new(LogSender));
        Self {
            issuer: Arc::new(
                TokenIssuer::new(storage.clone())
                    .with_max_uses_ceiling(config.invites.max_uses_ceiling),
            ),
            validator: Arc::new(TokenValidator::new(storage.clone(), directory)),
            coordinator: Arc::new(RedemptionCoordinator::new(storage.clone(), notifier)),
            revocation: Arc::new(RevocationManager::new(storage.clone())),
            identity,
            storage,
        }
    }

    /// State over an empty directory and the static resolver from
    /// configuration.
    #[must_use]
    pub fn from_config(storage: Arc<dyn InviteStorage>, config: &ServerConfig) -> Self {
        let mut resolver = StaticIdentityResolver::new();
        for principal in &config.auth.principals {
            resolver = resolver.with_principal(&principal.bearer, principal.id, principal.admin);
        }
        Self::new(
            storage,
            Arc::new(StaticDirectory::new()),
            Arc::new(resolver),
            config,
        )
    }
}
