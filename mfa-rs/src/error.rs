use thiserror::Error;

#[derive(Error, Debug)]
pub enum MfaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed TOTP URI: {0}")]
    MalformedUri(String),

    #[error("Malformed backup record: {0}")]
    MalformedBackup(String),

    #[error("Enrollment rejected: {0}")]
    Enrollment(String),

    #[error("Invalid TOTP algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, MfaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_error_converts() {
        fn parse(content: &str) -> Result<Vec<u32>> {
            Ok(serde_yaml::from_str(content)?)
        }

        let err = parse("[1, 2").unwrap_err();
        assert!(matches!(err, MfaError::Yaml(_)));
        assert!(err.to_string().starts_with("YAML error: "));
    }
}
