//! mfa-rs: TOTP second factor for the communication suite
//!
//! Validates the administrator's TOTP policy and manages the per-user
//! TOTP credentials enrolled under it.
//!
//! # Features
//!
//! - **Policy**: defaults injection and cross-field checks, reporting every
//!   violation in one pass while leaving a usable policy behind
//! - **Credentials**: `otpauth://` enrollment URIs, QR images and code checks
//! - **Persistence**: SQLite rows plus YAML backup export/import
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use mfa_rs::config::Config;
//! use mfa_rs::totp::{EnrollmentRequest, TotpCredential};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, errors) = Config::from_file("mfa.toml")?.validate_totp();
//!     for error in &errors {
//!         eprintln!("{}", error);
//!     }
//!
//!     let credential = TotpCredential::enroll(
//!         &config.totp,
//!         "alice",
//!         &EnrollmentRequest::default(),
//!         b"JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP".to_vec(),
//!         Utc::now(),
//!     )?;
//!     println!("{}", credential.uri());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`totp`]: Policy validation, credentials and their projections

pub mod config;
pub mod error;
pub mod totp;

// Re-export commonly used types
pub use config::Config;
pub use error::{MfaError, Result};
