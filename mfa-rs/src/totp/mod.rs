//! TOTP second factor
//!
//! Policy validation for the `[totp]` configuration section and the
//! per-user credential with its API, database and backup projections.

pub mod algorithm;
pub mod credential;
pub mod policy;
pub mod store;
pub mod views;

pub use algorithm::TotpAlgorithm;
pub use credential::{EnrollmentRequest, TotpCredential};
pub use policy::{PolicyError, PolicyValidator, TotpDefaults, TotpOptions, TotpPolicy, ValidatedPolicy};
pub use store::TotpStore;
pub use views::{TotpConfigurationData, TotpConfigurationExport, TotpConfigurationJson, TotpConfigurationRow};
