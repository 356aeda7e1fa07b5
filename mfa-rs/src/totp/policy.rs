//! TOTP policy validation
//!
//! The policy is read once from configuration. [`PolicyValidator::validate`]
//! consumes the raw policy and returns the normalized policy together with
//! every problem it found, so a single run reports all misconfigurations.
//! The returned policy is always self-consistent: each default is a member
//! of its allowed set, even when some entries were flagged.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::algorithm::TotpAlgorithm;
use crate::error::{MfaError, Result};

/// Smallest accepted time step in seconds
pub const TOTP_PERIOD_MINIMUM: u32 = 15;

/// Smallest accepted secret size in bytes
pub const TOTP_SECRET_SIZE_MINIMUM: u32 = 20;

/// Digit counts authenticator apps understand
pub const TOTP_POSSIBLE_DIGITS: [u32; 2] = [6, 8];

/// Built-in values substituted for unset policy fields
#[derive(Debug, Clone, PartialEq)]
pub struct TotpDefaults {
    pub issuer: &'static str,
    pub algorithm: TotpAlgorithm,
    pub period: u32,
    pub digits: u32,
    pub skew: u8,
    pub secret_size: u32,
}

impl TotpDefaults {
    pub const BUILTIN: TotpDefaults = TotpDefaults {
        issuer: "GK Mail",
        algorithm: TotpAlgorithm::Sha1,
        period: 30,
        digits: 6,
        skew: 1,
        secret_size: 32,
    };
}

impl Default for TotpDefaults {
    fn default() -> Self {
        Self::BUILTIN
    }
}

/// Administrator supplied TOTP policy (`[totp]` section)
///
/// Zero, empty and absent values mean "use the built-in default".
/// Algorithms are kept as text so that a misspelled value survives
/// validation and can be reported verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpPolicy {
    /// Turns the TOTP subsystem off; nothing else is validated
    pub disable: bool,
    /// Label shown in authenticator apps
    pub issuer: String,
    pub default_algorithm: String,
    pub allowed_algorithms: Vec<String>,
    /// Seconds per code window
    pub default_period: u32,
    pub allowed_periods: Vec<u32>,
    pub default_digits: u32,
    pub allowed_digits: Vec<u32>,
    /// Adjacent windows tolerated when verifying a code
    pub skew: Option<u8>,
    /// Secret size in bytes
    pub secret_size: u32,
}

impl TotpPolicy {
    /// Default algorithm as a typed value, if it names a known one
    pub fn algorithm(&self) -> Option<TotpAlgorithm> {
        self.default_algorithm.parse().ok()
    }

    /// Allowed algorithms that name a known algorithm
    pub fn algorithms(&self) -> Vec<TotpAlgorithm> {
        self.allowed_algorithms
            .iter()
            .filter_map(|a| a.parse().ok())
            .collect()
    }

    pub fn skew(&self) -> u8 {
        self.skew.unwrap_or(TotpDefaults::BUILTIN.skew)
    }

    /// Options offered to a user registering an authenticator
    pub fn options(&self) -> TotpOptions {
        TotpOptions::from(self)
    }
}

/// A single policy violation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("totp: option 'algorithm' must be one of '{allowed}' but it is configured as '{value}'")]
    InvalidAlgorithm { allowed: String, value: String },

    #[error("totp: option 'period' option must be {minimum} or more but it is configured as '{value}'")]
    InvalidPeriod { minimum: u32, value: u32 },

    #[error("totp: option 'digits' must be 6 or 8 but it is configured as '{value}'")]
    InvalidDigits { value: u32 },

    #[error("totp: option 'secret_size' must be {minimum} or higher but it is configured as '{value}'")]
    InvalidSecretSize { minimum: u32, value: u32 },
}

impl PolicyError {
    fn algorithm(value: &str) -> Self {
        PolicyError::InvalidAlgorithm {
            allowed: TotpAlgorithm::possible_values(),
            value: value.to_string(),
        }
    }
}

/// Outcome of a validation run
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPolicy {
    pub policy: TotpPolicy,
    pub errors: Vec<PolicyError>,
}

impl ValidatedPolicy {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Treat any reported violation as fatal
    pub fn into_result(self) -> Result<TotpPolicy> {
        if self.errors.is_empty() {
            return Ok(self.policy);
        }

        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        Err(MfaError::Config(messages.join("; ")))
    }
}

/// Normalizes a [`TotpPolicy`] against a set of built-in defaults
#[derive(Debug, Clone, Default)]
pub struct PolicyValidator {
    defaults: TotpDefaults,
}

impl PolicyValidator {
    pub fn new(defaults: TotpDefaults) -> Self {
        Self { defaults }
    }

    pub fn validate(&self, mut policy: TotpPolicy) -> ValidatedPolicy {
        let mut errors = Vec::new();

        if policy.disable {
            debug!("TOTP disabled, skipping policy validation");
            return ValidatedPolicy { policy, errors };
        }

        let mut push = |error: PolicyError| {
            warn!("{}", error);
            errors.push(error);
        };

        if policy.issuer.is_empty() {
            policy.issuer = self.defaults.issuer.to_string();
        }

        if policy.default_algorithm.is_empty() {
            policy.default_algorithm = self.defaults.algorithm.to_string();
        } else {
            policy.default_algorithm = policy.default_algorithm.to_ascii_uppercase();

            if policy.algorithm().is_none() {
                push(PolicyError::algorithm(&policy.default_algorithm));
            }
        }

        policy.allowed_algorithms = policy
            .allowed_algorithms
            .into_iter()
            .map(|a| a.to_ascii_uppercase())
            .collect();

        for algorithm in &policy.allowed_algorithms {
            if algorithm.parse::<TotpAlgorithm>().is_err() {
                push(PolicyError::algorithm(algorithm));
            }
        }

        if !policy.allowed_algorithms.contains(&policy.default_algorithm) {
            policy.allowed_algorithms.push(policy.default_algorithm.clone());
        }

        if policy.default_period == 0 {
            policy.default_period = self.defaults.period;
        } else if policy.default_period < TOTP_PERIOD_MINIMUM {
            push(PolicyError::InvalidPeriod {
                minimum: TOTP_PERIOD_MINIMUM,
                value: policy.default_period,
            });
        }

        for &period in &policy.allowed_periods {
            if period < TOTP_PERIOD_MINIMUM {
                push(PolicyError::InvalidPeriod {
                    minimum: TOTP_PERIOD_MINIMUM,
                    value: period,
                });
            }
        }

        if !policy.allowed_periods.contains(&policy.default_period) {
            policy.allowed_periods.push(policy.default_period);
        }

        if policy.default_digits == 0 {
            policy.default_digits = self.defaults.digits;
        } else if !TOTP_POSSIBLE_DIGITS.contains(&policy.default_digits) {
            push(PolicyError::InvalidDigits {
                value: policy.default_digits,
            });
        }

        for &digits in &policy.allowed_digits {
            if !TOTP_POSSIBLE_DIGITS.contains(&digits) {
                push(PolicyError::InvalidDigits { value: digits });
            }
        }

        if !policy.allowed_digits.contains(&policy.default_digits) {
            policy.allowed_digits.push(policy.default_digits);
        }

        if policy.skew.is_none() {
            policy.skew = Some(self.defaults.skew);
        }

        if policy.secret_size == 0 {
            policy.secret_size = self.defaults.secret_size;
        } else if policy.secret_size < TOTP_SECRET_SIZE_MINIMUM {
            push(PolicyError::InvalidSecretSize {
                minimum: TOTP_SECRET_SIZE_MINIMUM,
                value: policy.secret_size,
            });
        }

        debug!(
            issuer = %policy.issuer,
            algorithm = %policy.default_algorithm,
            period = policy.default_period,
            digits = policy.default_digits,
            "TOTP policy normalized"
        );

        ValidatedPolicy { policy, errors }
    }
}

/// Defaults and allowed values presented during registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotpOptions {
    pub algorithm: String,
    pub algorithms: Vec<String>,
    pub length: u32,
    pub lengths: Vec<u32>,
    pub period: u32,
    pub periods: Vec<u32>,
}

impl From<&TotpPolicy> for TotpOptions {
    fn from(policy: &TotpPolicy) -> Self {
        Self {
            algorithm: policy.default_algorithm.clone(),
            algorithms: policy.allowed_algorithms.clone(),
            length: policy.default_digits,
            lengths: policy.allowed_digits.clone(),
            period: policy.default_period,
            periods: policy.allowed_periods.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(policy: TotpPolicy) -> ValidatedPolicy {
        PolicyValidator::default().validate(policy)
    }

    #[test]
    fn test_empty_policy_gets_defaults() {
        let result = validate(TotpPolicy::default());

        assert!(result.is_valid());
        let policy = result.policy;
        assert_eq!(policy.issuer, "GK Mail");
        assert_eq!(policy.default_algorithm, "SHA1");
        assert_eq!(policy.allowed_algorithms, vec!["SHA1"]);
        assert_eq!(policy.default_period, 30);
        assert_eq!(policy.allowed_periods, vec![30]);
        assert_eq!(policy.default_digits, 6);
        assert_eq!(policy.allowed_digits, vec![6]);
        assert_eq!(policy.skew, Some(1));
        assert_eq!(policy.secret_size, 32);
    }

    #[test]
    fn test_disabled_policy_is_untouched() {
        let raw = TotpPolicy {
            disable: true,
            default_algorithm: "md5".to_string(),
            default_period: 5,
            default_digits: 7,
            secret_size: 4,
            ..Default::default()
        };

        let result = validate(raw.clone());

        assert!(result.errors.is_empty());
        assert_eq!(result.policy, raw);
    }

    #[test]
    fn test_algorithm_case_is_normalized() {
        for spelling in ["sha256", "Sha256", "SHA256", "sHa256"] {
            let result = validate(TotpPolicy {
                default_algorithm: spelling.to_string(),
                allowed_algorithms: vec!["sha512".to_string(), spelling.to_string()],
                ..Default::default()
            });

            assert!(result.is_valid());
            assert_eq!(result.policy.default_algorithm, "SHA256");
            assert_eq!(result.policy.allowed_algorithms, vec!["SHA512", "SHA256"]);
            assert_eq!(result.policy.algorithm(), Some(TotpAlgorithm::Sha256));
        }
    }

    #[test]
    fn test_invalid_default_algorithm_is_reported_and_kept() {
        let result = validate(TotpPolicy {
            default_algorithm: "md5".to_string(),
            ..Default::default()
        });

        assert_eq!(
            result.errors,
            vec![PolicyError::InvalidAlgorithm {
                allowed: "SHA1', 'SHA256', 'SHA512".to_string(),
                value: "MD5".to_string(),
            }]
        );
        assert_eq!(
            result.errors[0].to_string(),
            "totp: option 'algorithm' must be one of 'SHA1', 'SHA256', 'SHA512' but it is configured as 'MD5'"
        );
        assert_eq!(result.policy.default_algorithm, "MD5");
        assert_eq!(result.policy.allowed_algorithms, vec!["MD5"]);
    }

    #[test]
    fn test_invalid_allowed_algorithms_each_reported() {
        let result = validate(TotpPolicy {
            allowed_algorithms: vec!["md5".to_string(), "sha1".to_string(), "crc".to_string()],
            ..Default::default()
        });

        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.policy.allowed_algorithms, vec!["MD5", "SHA1", "CRC"]);
    }

    #[test]
    fn test_default_algorithm_appended() {
        let result = validate(TotpPolicy {
            default_algorithm: "SHA512".to_string(),
            allowed_algorithms: vec!["SHA1".to_string()],
            ..Default::default()
        });

        assert!(result.is_valid());
        assert_eq!(result.policy.allowed_algorithms, vec!["SHA1", "SHA512"]);
    }

    #[test]
    fn test_short_period_not_clamped() {
        let result = validate(TotpPolicy {
            default_period: 10,
            ..Default::default()
        });

        assert_eq!(
            result.errors,
            vec![PolicyError::InvalidPeriod {
                minimum: 15,
                value: 10
            }]
        );
        assert_eq!(
            result.errors[0].to_string(),
            "totp: option 'period' option must be 15 or more but it is configured as '10'"
        );
        assert_eq!(result.policy.default_period, 10);
        assert_eq!(result.policy.allowed_periods, vec![10]);
    }

    #[test]
    fn test_allowed_periods() {
        let result = validate(TotpPolicy {
            default_period: 60,
            allowed_periods: vec![5, 30, 14],
            ..Default::default()
        });

        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.policy.allowed_periods, vec![5, 30, 14, 60]);

        let result = validate(TotpPolicy {
            allowed_periods: vec![30, 90],
            ..Default::default()
        });

        assert!(result.is_valid());
        assert_eq!(result.policy.allowed_periods, vec![30, 90]);
    }

    #[test]
    fn test_invalid_digits_report_offending_entry() {
        let result = validate(TotpPolicy {
            default_digits: 8,
            allowed_digits: vec![6, 7],
            ..Default::default()
        });

        assert_eq!(result.errors, vec![PolicyError::InvalidDigits { value: 7 }]);
        assert_eq!(
            result.errors[0].to_string(),
            "totp: option 'digits' must be 6 or 8 but it is configured as '7'"
        );
        assert_eq!(result.policy.allowed_digits, vec![6, 7, 8]);
    }

    #[test]
    fn test_invalid_default_digits() {
        let result = validate(TotpPolicy {
            default_digits: 5,
            ..Default::default()
        });

        assert_eq!(result.errors, vec![PolicyError::InvalidDigits { value: 5 }]);
        assert_eq!(result.policy.default_digits, 5);
        assert_eq!(result.policy.allowed_digits, vec![5]);
    }

    #[test]
    fn test_explicit_zero_skew_is_kept() {
        let result = validate(TotpPolicy {
            skew: Some(0),
            ..Default::default()
        });

        assert!(result.is_valid());
        assert_eq!(result.policy.skew, Some(0));
        assert_eq!(result.policy.skew(), 0);
    }

    #[test]
    fn test_secret_size() {
        let result = validate(TotpPolicy {
            secret_size: 10,
            ..Default::default()
        });

        assert_eq!(
            result.errors[0].to_string(),
            "totp: option 'secret_size' must be 20 or higher but it is configured as '10'"
        );
        assert_eq!(result.policy.secret_size, 10);

        let result = validate(TotpPolicy {
            secret_size: 20,
            ..Default::default()
        });
        assert!(result.is_valid());
    }

    #[test]
    fn test_all_problems_reported_in_one_run() {
        let result = validate(TotpPolicy {
            default_algorithm: "md5".to_string(),
            default_period: 1,
            default_digits: 4,
            secret_size: 1,
            ..Default::default()
        });

        assert_eq!(result.errors.len(), 4);
        assert!(result.clone().into_result().is_err());
    }

    #[test]
    fn test_defaults_always_in_allowed_sets() {
        let raws = vec![
            TotpPolicy::default(),
            TotpPolicy {
                default_algorithm: "sha256".to_string(),
                allowed_algorithms: vec!["SHA1".to_string()],
                default_period: 45,
                allowed_periods: vec![30],
                default_digits: 8,
                allowed_digits: vec![6],
                ..Default::default()
            },
            TotpPolicy {
                allowed_algorithms: vec!["sha512".to_string()],
                allowed_periods: vec![60, 120],
                allowed_digits: vec![8],
                ..Default::default()
            },
        ];

        for raw in raws {
            let policy = validate(raw).into_result().unwrap();

            assert!(policy.allowed_algorithms.contains(&policy.default_algorithm));
            assert!(policy.allowed_periods.contains(&policy.default_period));
            assert!(policy.allowed_digits.contains(&policy.default_digits));
        }
    }

    #[test]
    fn test_custom_defaults() {
        let validator = PolicyValidator::new(TotpDefaults {
            issuer: "Example",
            algorithm: TotpAlgorithm::Sha512,
            ..TotpDefaults::BUILTIN
        });

        let policy = validator.validate(TotpPolicy::default()).policy;
        assert_eq!(policy.issuer, "Example");
        assert_eq!(policy.default_algorithm, "SHA512");
    }

    #[test]
    fn test_typed_algorithms_skip_unknown() {
        let policy = validate(TotpPolicy {
            default_algorithm: "sha256".to_string(),
            allowed_algorithms: vec!["md5".to_string(), "sha512".to_string()],
            ..Default::default()
        })
        .policy;

        assert_eq!(policy.algorithm(), Some(TotpAlgorithm::Sha256));
        assert_eq!(
            policy.algorithms(),
            vec![TotpAlgorithm::Sha512, TotpAlgorithm::Sha256]
        );
    }

    #[test]
    fn test_options_view() {
        let policy = validate(TotpPolicy {
            allowed_digits: vec![8],
            ..Default::default()
        })
        .policy;

        let json = serde_json::to_value(policy.options()).unwrap();
        assert_eq!(json["algorithm"], "SHA1");
        assert_eq!(json["lengths"], serde_json::json!([8, 6]));
        assert_eq!(json["period"], 30);
        assert_eq!(json["periods"], serde_json::json!([30]));
    }
}
