//! Per-user TOTP credential
//!
//! The enrollment URI follows the `otpauth://totp/{issuer}:{username}`
//! layout understood by authenticator apps. Code generation and checking
//! are delegated to `totp-rs` through the key parsed back from that URI.

use chrono::{DateTime, SubsecRound, Utc};
use image::imageops::FilterType;
use image::ImageFormat;
use serde::Deserialize;
use std::io::Cursor;
use totp_rs::TOTP;
use tracing::debug;
use url::form_urlencoded;

use super::algorithm::TotpAlgorithm;
use super::policy::{TotpPolicy, TOTP_PERIOD_MINIMUM, TOTP_POSSIBLE_DIGITS};
use crate::error::{MfaError, Result};

const OTPAUTH_BASE: &str = "otpauth://totp/";

/// Percent-encode a path component, spaces as `%20`
fn encode_path(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// A user's enrolled TOTP credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpCredential {
    /// Row id, 0 until the credential has been stored
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub username: String,
    pub issuer: String,
    pub algorithm: TotpAlgorithm,
    pub digits: u32,
    /// Seconds per code window
    pub period: u32,
    /// Shared secret as handed to the authenticator (base32 text)
    pub secret: Vec<u8>,
}

/// Parameters a user picked while registering an authenticator
///
/// Unset fields fall back to the policy defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentRequest {
    pub algorithm: Option<String>,
    pub digits: Option<u32>,
    pub period: Option<u32>,
}

impl TotpCredential {
    /// Create a credential for `username` within the limits of a validated policy
    pub fn enroll(
        policy: &TotpPolicy,
        username: &str,
        request: &EnrollmentRequest,
        secret: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if policy.disable {
            return Err(MfaError::Enrollment("TOTP is disabled".to_string()));
        }

        if secret.is_empty() {
            return Err(MfaError::Enrollment("secret is empty".to_string()));
        }

        let algorithm: TotpAlgorithm = request
            .algorithm
            .as_deref()
            .unwrap_or(&policy.default_algorithm)
            .parse()
            .map_err(|e: MfaError| MfaError::Enrollment(e.to_string()))?;

        if !policy.algorithms().contains(&algorithm) {
            return Err(MfaError::Enrollment(format!(
                "algorithm '{}' is not allowed",
                algorithm
            )));
        }

        let digits = request.digits.unwrap_or(policy.default_digits);
        if !policy.allowed_digits.contains(&digits) || !TOTP_POSSIBLE_DIGITS.contains(&digits) {
            return Err(MfaError::Enrollment(format!(
                "digits '{}' is not allowed",
                digits
            )));
        }

        let period = request.period.unwrap_or(policy.default_period);
        if !policy.allowed_periods.contains(&period) || period < TOTP_PERIOD_MINIMUM {
            return Err(MfaError::Enrollment(format!(
                "period '{}' is not allowed",
                period
            )));
        }

        debug!(username, %algorithm, digits, period, "Enrolling TOTP credential");

        Ok(Self {
            id: 0,
            created_at: now.trunc_subsecs(0),
            last_used_at: None,
            username: username.to_string(),
            issuer: policy.issuer.clone(),
            algorithm,
            digits,
            period,
            secret,
        })
    }

    /// Enrollment URI for authenticator apps
    ///
    /// The secret bytes are percent-encoded as they are, not re-encoded.
    pub fn uri(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("algorithm", self.algorithm.as_str())
            .append_pair("digits", &self.digits.to_string())
            .append_pair("issuer", &self.issuer)
            .append_pair("period", &self.period.to_string())
            .finish();
        let secret: String = form_urlencoded::byte_serialize(&self.secret).collect();

        format!(
            "{}{}:{}?{}&secret={}",
            OTPAUTH_BASE,
            encode_path(&self.issuer),
            encode_path(&self.username),
            query,
            secret
        )
    }

    /// Key handle parsed from [`TotpCredential::uri`]
    ///
    /// Only parse failures are rejected; secret length is left to policy.
    pub fn key(&self) -> Result<TOTP> {
        TOTP::from_url_unchecked(self.uri()).map_err(|e| MfaError::MalformedUri(e.to_string()))
    }

    /// QR code of the enrollment URI as a `width`x`height` PNG
    pub fn image(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        let key = self.key()?;

        let png = key.get_qr_png().map_err(MfaError::Image)?;
        let qr = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(|e| MfaError::Image(e.to_string()))?;

        let mut out = Vec::new();
        qr.resize_exact(width, height, FilterType::Nearest)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| MfaError::Image(e.to_string()))?;

        Ok(out)
    }

    /// Check a submitted code, tolerating `skew` windows either side of `now`
    pub fn verify_code(&self, code: &str, now: DateTime<Utc>, skew: u8) -> Result<bool> {
        let mut key = self.key()?;
        key.skew = skew;

        Ok(key.check(code, now.timestamp().max(0) as u64))
    }

    /// Record a successful verification
    pub fn update_sign_in_info(&mut self, now: DateTime<Utc>) {
        self.last_used_at = Some(now);
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }
}
