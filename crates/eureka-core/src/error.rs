use thiserror::Error;

/// Top-level error type for the Eureka system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for EurekaError` so that the `?` operator works
/// across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EurekaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Knowledge lookup error: {0}")]
    Knowledge(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for EurekaError {
    fn from(err: toml::de::Error) -> Self {
        EurekaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EurekaError {
    fn from(err: toml::ser::Error) -> Self {
        EurekaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for EurekaError {
    fn from(err: serde_json::Error) -> Self {
        EurekaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Eureka operations.
pub type Result<T> = std::result::Result<T, EurekaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EurekaError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = EurekaError::Session("lock poisoned".to_string());
        assert_eq!(err.to_string(), "Session store error: lock poisoned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EurekaError = io_err.into();
        assert!(matches!(err, EurekaError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: EurekaError = parse_err.into();
        assert!(matches!(err, EurekaError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: EurekaError = parse_err.into();
        assert!(matches!(err, EurekaError::Serialization(_)));
    }
}
