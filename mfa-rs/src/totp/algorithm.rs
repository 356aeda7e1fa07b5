//! TOTP hash algorithms

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MfaError;

/// HMAC algorithm used to derive TOTP codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TotpAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    /// Every algorithm a policy may name
    pub const ALL: [TotpAlgorithm; 3] = [
        TotpAlgorithm::Sha1,
        TotpAlgorithm::Sha256,
        TotpAlgorithm::Sha512,
    ];

    /// Upper-case name used in URIs, database rows and backups
    pub fn as_str(&self) -> &'static str {
        match self {
            TotpAlgorithm::Sha1 => "SHA1",
            TotpAlgorithm::Sha256 => "SHA256",
            TotpAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Names of all algorithms joined the way configuration errors print them
    pub fn possible_values() -> String {
        Self::ALL
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join("', '")
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TotpAlgorithm {
    type Err = MfaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1" => Ok(TotpAlgorithm::Sha1),
            "SHA256" => Ok(TotpAlgorithm::Sha256),
            "SHA512" => Ok(TotpAlgorithm::Sha512),
            _ => Err(MfaError::InvalidAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for TotpAlgorithm {
    type Error = MfaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TotpAlgorithm> for String {
    fn from(value: TotpAlgorithm) -> Self {
        value.as_str().to_string()
    }
}

impl From<TotpAlgorithm> for totp_rs::Algorithm {
    fn from(value: TotpAlgorithm) -> Self {
        match value {
            TotpAlgorithm::Sha1 => totp_rs::Algorithm::SHA1,
            TotpAlgorithm::Sha256 => totp_rs::Algorithm::SHA256,
            TotpAlgorithm::Sha512 => totp_rs::Algorithm::SHA512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("sha1".parse::<TotpAlgorithm>().unwrap(), TotpAlgorithm::Sha1);
        assert_eq!("Sha256".parse::<TotpAlgorithm>().unwrap(), TotpAlgorithm::Sha256);
        assert_eq!("SHA512".parse::<TotpAlgorithm>().unwrap(), TotpAlgorithm::Sha512);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "MD5".parse::<TotpAlgorithm>().unwrap_err();
        assert!(matches!(err, MfaError::InvalidAlgorithm(ref v) if v == "MD5"));
    }

    #[test]
    fn test_display_upper_case() {
        assert_eq!(TotpAlgorithm::Sha256.to_string(), "SHA256");
        assert_eq!(TotpAlgorithm::possible_values(), "SHA1', 'SHA256', 'SHA512");
    }
}
