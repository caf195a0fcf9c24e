//! Token rotation: the read path every outbound provider call goes
//! through.
//!
//! Rotation is lazy. Nothing sweeps the vault in the background; a token
//! is refreshed when it is asked for and sits inside the rotation
//! threshold. Concurrent refreshes of the same record are resolved with a
//! compare-and-swap on the record version: one caller wins, the others
//! re-read and serve the winner's token.

use std::sync::Arc;

use postbridge_domain::{ConnectError, ConnectionStatus, Platform, Result, TokenRecord, TokenSet};
use tracing::{debug, info, warn};

use crate::ports::ConnectionRepository;
use crate::registry::PlatformRegistry;
use crate::retry::retry_once_on_network;

/// Hands out access tokens that are valid for at least the rotation
/// threshold, refreshing them as needed.
pub struct TokenRotationManager {
    registry: Arc<PlatformRegistry>,
    connections: Arc<dyn ConnectionRepository>,
    rotation_threshold_secs: i64,
}

impl TokenRotationManager {
    pub fn new(
        registry: Arc<PlatformRegistry>,
        connections: Arc<dyn ConnectionRepository>,
        rotation_threshold_secs: i64,
    ) -> Self {
        Self { registry, connections, rotation_threshold_secs }
    }

    /// Return a usable access token for (user, platform) and whether this
    /// call rotated it.
    ///
    /// Repeated calls are idempotent: once a fresh token is stored, later
    /// calls serve it without touching the provider.
    pub async fn get_valid_access_token(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<(String, bool)> {
        let record = self
            .connections
            .get(user_id, platform)
            .await?
            .ok_or_else(|| ConnectError::connection(format!("no {platform} connection")))?;

        if record.status == ConnectionStatus::Revoked {
            return Err(ConnectError::connection(format!("{platform} connection is revoked")));
        }

        if !record.needs_rotation(self.rotation_threshold_secs) {
            self.touch(&record.id).await;
            return Ok((record.access_token, false));
        }

        let Some(refresh_token) = record.refresh_token.clone() else {
            // Non-renewable token. Serve it while it lasts, then the
            // connection is dead until the user reconnects.
            if record.still_valid() {
                debug!(platform = %platform, "token near expiry but not refreshable, serving as-is");
                self.touch(&record.id).await;
                return Ok((record.access_token, false));
            }
            self.connections.set_status(&record.id, ConnectionStatus::TokenExpired).await?;
            return Err(ConnectError::TokenRefresh(format!(
                "{platform} token expired and no refresh token is available"
            )));
        };

        let config = self.registry.get_config(platform, Some(user_id)).await?;
        let adapter = self.registry.adapter(platform)?;

        let refreshed =
            retry_once_on_network(|| adapter.refresh_token(&config, &refresh_token)).await;

        match refreshed {
            Ok(tokens) => self.store_rotated(&record, tokens, platform).await,
            Err(ConnectError::Network(msg)) => {
                // Transient outage. A token with life left is still good.
                if record.still_valid() {
                    warn!(platform = %platform, error = %msg, "refresh unreachable, serving current token");
                    return Ok((record.access_token, false));
                }
                self.connections.set_status(&record.id, ConnectionStatus::TokenExpired).await?;
                Err(ConnectError::TokenRefresh(format!(
                    "{platform} token expired and the refresh endpoint is unreachable: {msg}"
                )))
            }
            Err(err) => {
                // The provider rejected the refresh token; it will not
                // recover on retry.
                self.connections.set_status(&record.id, ConnectionStatus::TokenExpired).await?;
                Err(ConnectError::TokenRefresh(format!(
                    "{platform} refresh rejected: {err}"
                )))
            }
        }
    }

    /// Persist a rotated token set with a version check. Losing the race
    /// means another caller already stored a fresh token; serve that one.
    async fn store_rotated(
        &self,
        record: &TokenRecord,
        mut tokens: TokenSet,
        platform: Platform,
    ) -> Result<(String, bool)> {
        // Providers may omit the refresh token on rotation; the old one
        // stays valid in that case.
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = record.refresh_token.clone();
        }

        if self.connections.update_tokens(&record.id, &tokens, record.version).await? {
            self.touch(&record.id).await;
            info!(platform = %platform, "token rotated");
            return Ok((tokens.access_token, true));
        }

        debug!(platform = %platform, "lost rotation race, re-reading");
        let current = self
            .connections
            .get(&record.user_id, platform)
            .await?
            .ok_or_else(|| ConnectError::connection(format!("{platform} connection disappeared during rotation")))?;
        self.touch(&current.id).await;
        Ok((current.access_token, false))
    }

    /// Best-effort last_used_at bookkeeping: the token is already in
    /// hand, so a failed write is logged, not propagated.
    async fn touch(&self, id: &str) {
        if let Err(err) = self.connections.touch_last_used(id).await {
            warn!(error = %err, "failed to record last_used_at");
        }
    }
}
