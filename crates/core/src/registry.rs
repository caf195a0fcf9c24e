//! Platform registry: static configuration plus adapter resolution.
//!
//! One immutable table per process, built at startup from the environment.
//! Per-user credential overrides are merged at resolution time; they can
//! change client credentials and the redirect URI, never protocol shape.

use std::collections::HashMap;
use std::sync::Arc;

use postbridge_domain::{ConnectError, Platform, PlatformConfig, Result};

use crate::ports::{CredentialsRepository, PlatformAdapter};

/// Registry of supported platforms.
pub struct PlatformRegistry {
    configs: HashMap<Platform, PlatformConfig>,
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
    credentials: Arc<dyn CredentialsRepository>,
}

impl PlatformRegistry {
    pub fn new(
        configs: HashMap<Platform, PlatformConfig>,
        adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
        credentials: Arc<dyn CredentialsRepository>,
    ) -> Self {
        Self { configs, adapters, credentials }
    }

    /// Platforms present in the static table.
    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.configs.keys().copied()
    }

    /// Resolve the adapter for a platform.
    pub fn adapter(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.adapters
            .get(&platform)
            .cloned()
            .ok_or_else(|| ConnectError::UnsupportedPlatform(platform.to_string()))
    }

    /// Resolve configuration for a platform, merging any per-user
    /// credential override over the global defaults.
    pub async fn get_config(
        &self,
        platform: Platform,
        user_id: Option<&str>,
    ) -> Result<PlatformConfig> {
        let config = self
            .configs
            .get(&platform)
            .cloned()
            .ok_or_else(|| ConnectError::UnsupportedPlatform(platform.to_string()))?;

        if let Some(user_id) = user_id {
            if let Some(creds) = self.credentials.get(user_id, platform).await? {
                return Ok(config.with_credentials(&creds));
            }
        }

        Ok(config)
    }
}
