//! Projections of [`TotpCredential`]
//!
//! Each target has its own field list and optionality rules:
//!
//! - [`TotpConfigurationJson`]: API view, never carries the secret
//! - [`TotpConfigurationRow`]: database row, raw secret and unix timestamps
//! - [`TotpConfigurationData`]: backup record, base64 secret, under the
//!   `totp_configurations` key of a [`TotpConfigurationExport`]

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::TotpAlgorithm;
use super::credential::TotpCredential;
use crate::error::{MfaError, Result};

/// API view of a credential
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotpConfigurationJson {
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub algorithm: TotpAlgorithm,
    pub digits: u32,
    pub period: u32,
}

impl From<&TotpCredential> for TotpConfigurationJson {
    fn from(c: &TotpCredential) -> Self {
        Self {
            created_at: c.created_at,
            last_used_at: c.last_used_at,
            issuer: c.issuer.clone(),
            algorithm: c.algorithm,
            digits: c.digits,
            period: c.period,
        }
    }
}

/// `totp_configurations` table row
///
/// Timestamps are stored with second precision; sub-second parts of a
/// credential's timestamps do not survive a round trip through this row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TotpConfigurationRow {
    pub id: i64,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds, NULL when never used
    pub last_used_at: Option<i64>,
    pub username: String,
    pub issuer: String,
    pub algorithm: String,
    pub digits: u32,
    pub period: u32,
    pub secret: Vec<u8>,
}

impl From<&TotpCredential> for TotpConfigurationRow {
    fn from(c: &TotpCredential) -> Self {
        Self {
            id: c.id,
            created_at: c.created_at.timestamp(),
            last_used_at: c.last_used_at.map(|t| t.timestamp()),
            username: c.username.clone(),
            issuer: c.issuer.clone(),
            algorithm: c.algorithm.to_string(),
            digits: c.digits,
            period: c.period,
            secret: c.secret.clone(),
        }
    }
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(MfaError::InvalidTimestamp(secs))
}

impl TryFrom<TotpConfigurationRow> for TotpCredential {
    type Error = MfaError;

    fn try_from(row: TotpConfigurationRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            created_at: from_unix(row.created_at)?,
            last_used_at: row.last_used_at.map(from_unix).transpose()?,
            username: row.username,
            issuer: row.issuer,
            algorithm: row.algorithm.parse()?,
            digits: row.digits,
            period: row.period,
            secret: row.secret,
        })
    }
}

/// Backup file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotpConfigurationData {
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub username: String,
    pub issuer: String,
    pub algorithm: String,
    pub digits: u32,
    pub period: u32,
    /// Standard base64 of the secret
    pub secret: String,
}

impl From<&TotpCredential> for TotpConfigurationData {
    fn from(c: &TotpCredential) -> Self {
        Self {
            created_at: c.created_at,
            last_used_at: c.last_used_at,
            username: c.username.clone(),
            issuer: c.issuer.clone(),
            algorithm: c.algorithm.to_string(),
            digits: c.digits,
            period: c.period,
            secret: BASE64.encode(&c.secret),
        }
    }
}

impl TotpConfigurationData {
    /// Rebuild the credential; nothing is produced if any field is malformed
    pub fn decode(self) -> Result<TotpCredential> {
        let secret = BASE64.decode(self.secret.as_bytes()).map_err(|e| {
            MfaError::MalformedBackup(format!("secret of '{}': {}", self.username, e))
        })?;

        let algorithm = self.algorithm.parse().map_err(|_| {
            MfaError::MalformedBackup(format!(
                "algorithm of '{}': '{}'",
                self.username, self.algorithm
            ))
        })?;

        Ok(TotpCredential {
            id: 0,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            username: self.username,
            issuer: self.issuer,
            algorithm,
            digits: self.digits,
            period: self.period,
            secret,
        })
    }
}

/// Backup file holding many credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotpConfigurationExport {
    #[serde(default)]
    pub totp_configurations: Vec<TotpConfigurationData>,
}

impl TotpConfigurationExport {
    pub fn from_credentials<'a, I>(credentials: I) -> Self
    where
        I: IntoIterator<Item = &'a TotpCredential>,
    {
        Self {
            totp_configurations: credentials.into_iter().map(Into::into).collect(),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Decode every record, failing on the first malformed one
    pub fn decode(self) -> Result<Vec<TotpCredential>> {
        self.totp_configurations
            .into_iter()
            .map(TotpConfigurationData::decode)
            .collect()
    }

    /// Decode every record independently so callers can skip bad ones
    pub fn decode_each(self) -> Vec<Result<TotpCredential>> {
        self.totp_configurations
            .into_iter()
            .map(TotpConfigurationData::decode)
            .collect()
    }
}
