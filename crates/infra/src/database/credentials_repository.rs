//! SQLite repository for per-user developer app credentials.
//!
//! `client_secret` is stored through the same encryption service the
//! vault uses.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use postbridge_common::crypto::EncryptionService;
use postbridge_core::ports::CredentialsRepository;
use postbridge_domain::{ConnectError, Platform, Result, UserPlatformCredentials};
use rusqlite::params;
use tokio::task;

use super::DbManager;
use crate::errors::{map_join_error, InfraError};

pub struct SqliteCredentialsRepository {
    db: Arc<DbManager>,
    encryption: Arc<EncryptionService>,
}

impl SqliteCredentialsRepository {
    pub fn new(db: Arc<DbManager>, encryption: Arc<EncryptionService>) -> Self {
        Self { db, encryption }
    }
}

#[async_trait]
impl CredentialsRepository for SqliteCredentialsRepository {
    async fn get(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<UserPlatformCredentials>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let query_user = user_id.clone();

        let row = task::spawn_blocking(
            move || -> Result<Option<(Option<String>, Option<String>, Option<String>, i64, i64)>> {
                let conn = db.get_connection()?;
                let result = conn.query_row(
                    "SELECT client_id, client_secret, redirect_uri, created_at, updated_at
                     FROM platform_credentials WHERE user_id = ?1 AND platform = ?2",
                    params![query_user, platform.as_str()],
                    |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    },
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(err) => Err(InfraError::from(err).into()),
                }
            },
        )
        .await
        .map_err(map_join_error)??;

        let Some((client_id, sealed_secret, redirect_uri, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let client_secret = sealed_secret
            .map(|s| {
                let bytes = self
                    .encryption
                    .decrypt_from_string(&s)
                    .map_err(|e| ConnectError::Internal(format!("credential decryption failed: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|e| ConnectError::Internal(format!("credential decryption failed: {e}")))
            })
            .transpose()?;

        Ok(Some(UserPlatformCredentials {
            user_id,
            platform,
            client_id,
            client_secret,
            redirect_uri,
            created_at: Utc.timestamp_opt(created_at, 0).single().unwrap_or_default(),
            updated_at: Utc.timestamp_opt(updated_at, 0).single().unwrap_or_default(),
        }))
    }

    async fn upsert(&self, credentials: UserPlatformCredentials) -> Result<()> {
        let db = Arc::clone(&self.db);
        let sealed_secret = credentials
            .client_secret
            .as_deref()
            .map(|s| {
                self.encryption
                    .encrypt_to_string(s.as_bytes())
                    .map_err(|e| ConnectError::Internal(format!("credential encryption failed: {e}")))
            })
            .transpose()?;

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            let now = Utc::now().timestamp();
            conn.execute(
                "INSERT INTO platform_credentials
                     (user_id, platform, client_id, client_secret, redirect_uri, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT (user_id, platform) DO UPDATE SET
                     client_id = excluded.client_id,
                     client_secret = excluded.client_secret,
                     redirect_uri = excluded.redirect_uri,
                     updated_at = excluded.updated_at",
                params![
                    credentials.user_id,
                    credentials.platform.as_str(),
                    credentials.client_id,
                    sealed_secret,
                    credentials.redirect_uri,
                    now,
                ],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn delete(&self, user_id: &str, platform: Platform) -> Result<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "DELETE FROM platform_credentials WHERE user_id = ?1 AND platform = ?2",
                params![user_id, platform.as_str()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}
