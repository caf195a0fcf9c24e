//! Token vault: the SQLite connection repository with the encryption
//! boundary.
//!
//! The vault is the only component that reads or writes token columns.
//! Tokens are encrypted with the active key on every write and decrypted
//! by key version on read; records handed out across the port carry
//! plaintext tokens. Token plaintext never reaches the log layer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use postbridge_common::crypto::EncryptionService;
use postbridge_core::ports::ConnectionRepository;
use postbridge_domain::{
    ConnectError, ConnectionStatus, Platform, Result, TokenRecord, TokenSet,
};
use rusqlite::{params, Row};
use tokio::task;

use crate::database::DbManager;
use crate::errors::{map_join_error, InfraError};

const RECORD_COLUMNS: &str = "id, user_id, platform, external_account_id, display_name, \
     avatar_url, access_token, refresh_token, token_type, expires_at, scope, status, \
     is_primary, last_used_at, version, created_at, updated_at";

/// SQLite-backed, encrypting implementation of `ConnectionRepository`.
pub struct TokenVault {
    db: Arc<DbManager>,
    encryption: Arc<EncryptionService>,
}

impl TokenVault {
    pub fn new(db: Arc<DbManager>, encryption: Arc<EncryptionService>) -> Self {
        Self { db, encryption }
    }

    fn seal(&self, plaintext: &str) -> Result<String> {
        self.encryption
            .encrypt_to_string(plaintext.as_bytes())
            .map_err(|e| ConnectError::Internal(format!("token encryption failed: {e}")))
    }

    fn open(&self, sealed: &str) -> Result<String> {
        let bytes = self
            .encryption
            .decrypt_from_string(sealed)
            .map_err(|e| ConnectError::Internal(format!("token decryption failed: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| ConnectError::Internal(format!("token decryption failed: {e}")))
    }

    fn decrypt_record(&self, mut record: TokenRecord) -> Result<TokenRecord> {
        if !record.access_token.is_empty() {
            record.access_token = self.open(&record.access_token)?;
        }
        if let Some(sealed) = record.refresh_token.take() {
            record.refresh_token = Some(self.open(&sealed)?);
        }
        Ok(record)
    }
}

#[async_trait]
impl ConnectionRepository for TokenVault {
    async fn get(&self, user_id: &str, platform: Platform) -> Result<Option<TokenRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        let row = task::spawn_blocking(move || -> Result<Option<TokenRecord>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM token_records
                 WHERE user_id = ?1 AND platform = ?2 AND status != 'revoked'
                 ORDER BY is_primary DESC, created_at ASC
                 LIMIT 1"
            );
            let result = conn.query_row(&sql, params![user_id, platform.as_str()], map_record_row);
            optional(result)
        })
        .await
        .map_err(map_join_error)??;

        row.map(|r| self.decrypt_record(r)).transpose()
    }

    async fn find_by_external_account(
        &self,
        platform: Platform,
        external_account_id: &str,
    ) -> Result<Option<TokenRecord>> {
        let db = Arc::clone(&self.db);
        let external_account_id = external_account_id.to_string();

        let row = task::spawn_blocking(move || -> Result<Option<TokenRecord>> {
            let conn = db.get_connection()?;
            // Revoked rows do not hold the external account: a
            // disconnected account is free to reconnect under any user.
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM token_records
                 WHERE platform = ?1 AND external_account_id = ?2 AND status != 'revoked'
                 LIMIT 1"
            );
            let result = conn
                .query_row(&sql, params![platform.as_str(), external_account_id], map_record_row);
            optional(result)
        })
        .await
        .map_err(map_join_error)??;

        row.map(|r| self.decrypt_record(r)).transpose()
    }

    async fn upsert(&self, record: TokenRecord) -> Result<TokenRecord> {
        let db = Arc::clone(&self.db);
        let mut sealed = record.clone();
        sealed.access_token = self.seal(&record.access_token)?;
        sealed.refresh_token =
            record.refresh_token.as_deref().map(|t| self.seal(t)).transpose()?;

        let stored = task::spawn_blocking(move || -> Result<TokenRecord> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(InfraError::from)?;

            // Reconnecting the same external account updates the existing
            // row in place and keeps its identity and primary flag.
            let existing: Option<String> = optional(tx.query_row(
                "SELECT id FROM token_records
                 WHERE user_id = ?1 AND platform = ?2 AND external_account_id = ?3",
                params![sealed.user_id, sealed.platform.as_str(), sealed.external_account_id],
                |row| row.get(0),
            ))?;

            let stored = match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE token_records SET
                             display_name = ?2, avatar_url = ?3, access_token = ?4,
                             refresh_token = ?5, token_type = ?6, expires_at = ?7,
                             scope = ?8, status = ?9, version = version + 1,
                             updated_at = ?10
                         WHERE id = ?1",
                        params![
                            id,
                            sealed.display_name,
                            sealed.avatar_url,
                            sealed.access_token,
                            sealed.refresh_token,
                            sealed.token_type,
                            sealed.expires_at.map(|t| t.timestamp()),
                            sealed.scope,
                            sealed.status.as_str(),
                            Utc::now().timestamp(),
                        ],
                    )
                    .map_err(InfraError::from)?;

                    let sql = format!("SELECT {RECORD_COLUMNS} FROM token_records WHERE id = ?1");
                    tx.query_row(&sql, params![id], map_record_row).map_err(InfraError::from)?
                }
                None => {
                    // First non-revoked record for (user, platform) becomes
                    // primary.
                    let has_primary: bool = tx
                        .query_row(
                            "SELECT EXISTS(
                                 SELECT 1 FROM token_records
                                 WHERE user_id = ?1 AND platform = ?2
                                   AND is_primary = 1 AND status != 'revoked')",
                            params![sealed.user_id, sealed.platform.as_str()],
                            |row| row.get(0),
                        )
                        .map_err(InfraError::from)?;

                    let mut inserted = sealed.clone();
                    inserted.is_primary = !has_primary;

                    tx.execute(
                        "INSERT INTO token_records (
                             id, user_id, platform, external_account_id, display_name,
                             avatar_url, access_token, refresh_token, token_type,
                             expires_at, scope, status, is_primary, last_used_at,
                             version, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                        params![
                            inserted.id,
                            inserted.user_id,
                            inserted.platform.as_str(),
                            inserted.external_account_id,
                            inserted.display_name,
                            inserted.avatar_url,
                            inserted.access_token,
                            inserted.refresh_token,
                            inserted.token_type,
                            inserted.expires_at.map(|t| t.timestamp()),
                            inserted.scope,
                            inserted.status.as_str(),
                            inserted.is_primary,
                            inserted.last_used_at.map(|t| t.timestamp()),
                            inserted.version,
                            inserted.created_at.timestamp(),
                            inserted.updated_at.timestamp(),
                        ],
                    )
                    .map_err(InfraError::from)?;

                    let sql = format!("SELECT {RECORD_COLUMNS} FROM token_records WHERE id = ?1");
                    tx.query_row(&sql, params![inserted.id], map_record_row)
                        .map_err(InfraError::from)?
                }
            };

            tx.commit().map_err(InfraError::from)?;
            Ok(stored)
        })
        .await
        .map_err(map_join_error)??;

        self.decrypt_record(stored)
    }

    async fn update_tokens(
        &self,
        id: &str,
        tokens: &TokenSet,
        expected_version: i64,
    ) -> Result<bool> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();
        let access = self.seal(&tokens.access_token)?;
        let refresh = tokens.refresh_token.as_deref().map(|t| self.seal(t)).transpose()?;
        let expires_at = tokens.expires_at.map(|t| t.timestamp());
        let scope = tokens.scope.clone();

        task::spawn_blocking(move || -> Result<bool> {
            let conn = db.get_connection()?;
            // Version check and bump in one statement: losing a concurrent
            // rotation leaves zero rows changed.
            let changed = conn
                .execute(
                    "UPDATE token_records SET
                         access_token = ?3, refresh_token = ?4, expires_at = ?5,
                         scope = COALESCE(?6, scope), status = 'active',
                         version = version + 1, updated_at = ?7
                     WHERE id = ?1 AND version = ?2",
                    params![id, expected_version, access, refresh, expires_at, scope, Utc::now().timestamp()],
                )
                .map_err(InfraError::from)?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_status(&self, id: &str, status: ConnectionStatus) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE token_records SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, status.as_str(), Utc::now().timestamp()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_revoked(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            // Token material is cleared, not retained in revoked form.
            conn.execute(
                "UPDATE token_records SET
                     access_token = '', refresh_token = NULL, status = 'revoked',
                     is_primary = 0, version = version + 1, updated_at = ?2
                 WHERE id = ?1",
                params![id, Utc::now().timestamp()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn touch_last_used(&self, id: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> Result<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE token_records SET last_used_at = ?2 WHERE id = ?1",
                params![id, Utc::now().timestamp()],
            )
            .map_err(InfraError::from)?;
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(InfraError::from(err).into()),
    }
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<TokenRecord> {
    let platform: String = row.get(2)?;
    let status: String = row.get(11)?;

    Ok(TokenRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        platform: platform.parse().map_err(|_| invalid_column(2, &platform))?,
        external_account_id: row.get(3)?,
        display_name: row.get(4)?,
        avatar_url: row.get(5)?,
        access_token: row.get(6)?,
        refresh_token: row.get(7)?,
        token_type: row.get(8)?,
        expires_at: row.get::<_, Option<i64>>(9)?.map(from_timestamp),
        scope: row.get(10)?,
        status: ConnectionStatus::from_db(&status),
        is_primary: row.get(12)?,
        last_used_at: row.get::<_, Option<i64>>(13)?.map(from_timestamp),
        version: row.get(14)?,
        created_at: from_timestamp(row.get(15)?),
        updated_at: from_timestamp(row.get(16)?),
    })
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn invalid_column(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        format!("unknown value: {value}").into(),
    )
}
