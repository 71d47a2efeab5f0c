//! SQLite-backed drive credential storage.

use super::{encryption, ConnectionGrant, ConnectionStatus, Credential, ResolvedToken, TokenSource};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Drive credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE drive_credentials (
///     user_id TEXT PRIMARY KEY,
///     refresh_token TEXT,             -- plaintext (no master key configured)
///     encrypted_refresh_token TEXT,   -- <nonce>:<ciphertext>
///     scope TEXT,
///     connected_at TEXT,              -- ISO 8601, NULL = disconnected
///     access_token TEXT,              -- cache, sealed when a key is configured
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// # Thread Safety
/// The connection is wrapped in a Mutex; every method holds it for one
/// statement only.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    encryption_key: Option<Vec<u8>>,
}

impl CredentialStore {
    /// Creates or opens a credential store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key; `None` stores
    ///   refresh tokens in the plaintext column
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: Option<&str>) -> Result<Self> {
        let key_bytes = encryption_key
            .map(encryption::validate_key)
            .transpose()
            .context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS drive_credentials (
                user_id TEXT PRIMARY KEY,
                refresh_token TEXT,
                encrypted_refresh_token TEXT,
                scope TEXT,
                connected_at TEXT,
                access_token TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create drive_credentials table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key_bytes,
        })
    }

    /// Whether refresh tokens are sealed before they are written.
    pub fn encryption_enabled(&self) -> bool {
        self.encryption_key.is_some()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))
    }

    /// Records a completed consent exchange.
    ///
    /// Marks the user connected. When the grant carries no refresh token the
    /// previously stored one is kept, since providers only issue it on the
    /// first consent.
    pub fn upsert_connection(&self, user_id: &str, grant: &ConnectionGrant) -> Result<()> {
        let (plain_refresh, sealed_refresh) = match (&grant.refresh_token, &self.encryption_key) {
            (Some(token), Some(key)) => (
                None,
                Some(encryption::seal(token, key).context("Failed to encrypt refresh token")?),
            ),
            (Some(token), None) => (Some(token.clone()), None),
            (None, _) => (None, None),
        };
        let has_new_refresh = grant.refresh_token.is_some();

        let access_token = match (&grant.access_token, &self.encryption_key) {
            (Some(token), Some(key)) => {
                Some(encryption::seal(token, key).context("Failed to encrypt access token")?)
            }
            (token, None) => token.clone(),
            (None, Some(_)) => None,
        };

        let now = Utc::now().to_rfc3339();

        // A new refresh token replaces both columns so a stale value in the
        // other column can never shadow it.
        self.lock()?
            .execute(
                r#"
                INSERT INTO drive_credentials (
                    user_id, refresh_token, encrypted_refresh_token, scope,
                    connected_at, access_token, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?5, ?5)
                ON CONFLICT(user_id) DO UPDATE SET
                    refresh_token = CASE WHEN ?7 THEN excluded.refresh_token
                                         ELSE drive_credentials.refresh_token END,
                    encrypted_refresh_token = CASE WHEN ?7 THEN excluded.encrypted_refresh_token
                                                   ELSE drive_credentials.encrypted_refresh_token END,
                    scope = COALESCE(excluded.scope, drive_credentials.scope),
                    connected_at = excluded.connected_at,
                    access_token = excluded.access_token,
                    updated_at = excluded.updated_at
                "#,
                params![
                    user_id,
                    plain_refresh,
                    sealed_refresh,
                    grant.scope,
                    now,
                    access_token,
                    has_new_refresh,
                ],
            )
            .context("Failed to store drive credential")?;

        Ok(())
    }

    /// Fetches the credential row for a user.
    pub fn get_credential(&self, user_id: &str) -> Result<Option<Credential>> {
        let conn = self.lock()?;
        conn.query_row(
            r#"
            SELECT user_id, refresh_token, encrypted_refresh_token, scope,
                   connected_at, access_token IS NOT NULL, created_at, updated_at
            FROM drive_credentials
            WHERE user_id = ?1
            "#,
            params![user_id],
            credential_from_row,
        )
        .optional()
        .context("Failed to read drive credential")
    }

    /// Soft disconnect: clears `connected_at` and the cached access token.
    ///
    /// The refresh token and scope are retained. Calling this repeatedly
    /// leaves the row unchanged after the first call.
    ///
    /// # Returns
    /// * `Ok(true)` - Row exists (markers now cleared)
    /// * `Ok(false)` - No credential for this user
    pub fn clear_connection_markers(&self, user_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self
            .lock()?
            .execute(
                r#"
                UPDATE drive_credentials SET
                    updated_at = CASE
                        WHEN connected_at IS NULL AND access_token IS NULL THEN updated_at
                        ELSE ?2
                    END,
                    connected_at = NULL,
                    access_token = NULL
                WHERE user_id = ?1
                "#,
                params![user_id, now],
            )
            .context("Failed to clear connection markers")?;

        Ok(rows > 0)
    }

    /// Connection state for the user-facing status endpoint.
    pub fn connection_status(&self, user_id: &str) -> Result<Option<ConnectionStatus>> {
        Ok(self.get_credential(user_id)?.map(|cred| ConnectionStatus {
            connected: cred.connected_at.is_some() && cred.has_refresh_token(),
            user_id: cred.user_id,
            connected_at: cred.connected_at,
            scope: cred.scope,
        }))
    }

    /// Picks the refresh token to use for a credential.
    ///
    /// The encrypted column wins when it decrypts; otherwise the plaintext
    /// column is used. A populated encrypted column that cannot be opened is
    /// reported in `decrypt_error` even when the fallback succeeds.
    pub fn resolve_refresh_token(&self, credential: &Credential) -> ResolvedToken {
        let mut resolved = ResolvedToken::default();

        if let Some(sealed) = &credential.encrypted_refresh_token {
            match self.open_sealed(sealed) {
                Ok(token) => {
                    resolved.token = Some((token, TokenSource::Encrypted));
                    return resolved;
                }
                Err(e) => resolved.decrypt_error = Some(format!("{:#}", e)),
            }
        }

        resolved.token = credential
            .refresh_token
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| (t.clone(), TokenSource::Plaintext));

        resolved
    }

    /// Decrypts a sealed column value with the configured key.
    pub fn open_sealed(&self, sealed: &str) -> Result<String> {
        let key = self
            .encryption_key
            .as_ref()
            .ok_or_else(|| anyhow!("No encryption key configured"))?;
        encryption::open(sealed, key)
    }

    /// Number of stored credential rows.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM drive_credentials", [], |row| row.get(0))
            .context("Failed to count drive credentials")?;
        Ok(count as usize)
    }

    /// Writes raw column values without encrypting anything. Only tests call
    /// this, for rows the upsert path never produces (such as legacy plaintext).
    pub fn insert_raw(
        &self,
        user_id: &str,
        refresh_token: Option<&str>,
        encrypted_refresh_token: Option<&str>,
        scope: Option<&str>,
        connected: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let connected_at = connected.then(|| now.clone());
        self.lock()?
            .execute(
                r#"
                INSERT OR REPLACE INTO drive_credentials (
                    user_id, refresh_token, encrypted_refresh_token, scope,
                    connected_at, access_token, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)
                "#,
                params![
                    user_id,
                    refresh_token,
                    encrypted_refresh_token,
                    scope,
                    connected_at,
                    now
                ],
            )
            .context("Failed to insert drive credential")?;
        Ok(())
    }
}

fn credential_from_row(row: &Row<'_>) -> rusqlite::Result<Credential> {
    Ok(Credential {
        user_id: row.get(0)?,
        refresh_token: row.get(1)?,
        encrypted_refresh_token: row.get(2)?,
        scope: row.get(3)?,
        connected_at: parse_timestamp(row.get::<_, Option<String>>(4)?, 4)?,
        has_access_token: row.get(5)?,
        created_at: parse_timestamp(Some(row.get(6)?), 6)?.unwrap_or_default(),
        updated_at: parse_timestamp(Some(row.get(7)?), 7)?.unwrap_or_default(),
    })
}

fn parse_timestamp(value: Option<String>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        column,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
}
