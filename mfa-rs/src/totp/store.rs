//! TOTP credential persistence and backup files

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::credential::TotpCredential;
use super::views::{TotpConfigurationExport, TotpConfigurationRow};
use crate::error::{MfaError, Result};

const SELECT_COLUMNS: &str =
    "SELECT id, created_at, last_used_at, username, issuer, algorithm, digits, period, secret FROM totp_configurations";

/// SQLite backed store of [`TotpCredential`]s, one per username
pub struct TotpStore {
    db: SqlitePool,
}

impl TotpStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Initialize database tables
    pub async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS totp_configurations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                last_used_at INTEGER,
                username TEXT NOT NULL UNIQUE,
                issuer TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                digits INTEGER NOT NULL,
                period INTEGER NOT NULL,
                secret BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Insert a new credential and assign its id
    pub async fn save(&self, credential: &mut TotpCredential) -> Result<()> {
        let row = TotpConfigurationRow::from(&*credential);

        let result = sqlx::query(
            r#"
            INSERT INTO totp_configurations
                (created_at, last_used_at, username, issuer, algorithm, digits, period, secret)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.created_at)
        .bind(row.last_used_at)
        .bind(&row.username)
        .bind(&row.issuer)
        .bind(&row.algorithm)
        .bind(row.digits)
        .bind(row.period)
        .bind(&row.secret)
        .execute(&self.db)
        .await?;

        credential.id = result.last_insert_rowid();
        info!("Stored TOTP configuration for {}", credential.username);

        Ok(())
    }

    /// Get the credential of a user
    pub async fn load(&self, username: &str) -> Result<Option<TotpCredential>> {
        let row = sqlx::query_as::<_, TotpConfigurationRow>(&format!(
            "{} WHERE username = ?",
            SELECT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        row.map(TotpCredential::try_from).transpose()
    }

    /// Persist the sign-in bookkeeping of a credential
    pub async fn update_sign_in_info(&self, credential: &TotpCredential) -> Result<()> {
        let result = sqlx::query("UPDATE totp_configurations SET last_used_at = ? WHERE username = ?")
            .bind(credential.last_used().map(|t| t.timestamp()))
            .bind(&credential.username)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MfaError::NotFound(credential.username.clone()));
        }

        debug!("Updated TOTP sign-in info for {}", credential.username);
        Ok(())
    }

    /// Remove the credential of a user, returning whether one existed
    pub async fn delete(&self, username: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM totp_configurations WHERE username = ?")
            .bind(username)
            .execute(&self.db)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Deleted TOTP configuration for {}", username);
        }

        Ok(deleted)
    }

    /// All credentials ordered by id
    pub async fn list(&self) -> Result<Vec<TotpCredential>> {
        let rows = sqlx::query_as::<_, TotpConfigurationRow>(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(TotpCredential::try_from).collect()
    }

    /// Serialize every stored credential into a backup file
    pub async fn export_yaml(&self) -> Result<String> {
        let credentials = self.list().await?;
        let yaml = TotpConfigurationExport::from_credentials(&credentials).to_yaml()?;

        info!("Exported {} TOTP configuration(s)", credentials.len());
        Ok(yaml)
    }

    /// Load a backup file
    ///
    /// Every record is decoded before anything is written, so a malformed
    /// record aborts the import with the store unchanged.
    pub async fn import_yaml(&self, content: &str) -> Result<usize> {
        let credentials = TotpConfigurationExport::from_yaml(content)?.decode()?;

        let mut tx = self.db.begin().await?;
        for credential in &credentials {
            let row = TotpConfigurationRow::from(credential);

            sqlx::query(
                r#"
                INSERT INTO totp_configurations
                    (created_at, last_used_at, username, issuer, algorithm, digits, period, secret)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(username) DO UPDATE SET
                    created_at = excluded.created_at,
                    last_used_at = excluded.last_used_at,
                    issuer = excluded.issuer,
                    algorithm = excluded.algorithm,
                    digits = excluded.digits,
                    period = excluded.period,
                    secret = excluded.secret
                "#,
            )
            .bind(row.created_at)
            .bind(row.last_used_at)
            .bind(&row.username)
            .bind(&row.issuer)
            .bind(&row.algorithm)
            .bind(row.digits)
            .bind(row.period)
            .bind(&row.secret)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!("Imported {} TOTP configuration(s)", credentials.len());
        Ok(credentials.len())
    }
}
