use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Installation failed during {phase}: {details}")]
    InstallFailed {
        phase: &'static str,
        details: String,
    },

    #[error("Failed to persist {what}: {details}")]
    PersistFailed { what: &'static str, details: String },

    #[error("Subscription not found: {id}")]
    SubscriptionNotFound { id: String },

    #[error("No release asset for {engine} on this platform")]
    UnsupportedPlatform { engine: &'static str },

    #[error("Timed out after {seconds}s waiting for {operation}")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
    #[error("verification")]
    Verification,
}

impl UpdateError {
    pub fn install_failed(phase: &'static str, details: impl Into<String>) -> Self {
        Self::InstallFailed {
            phase,
            details: details.into(),
        }
    }

    pub fn persist_failed(what: &'static str, details: impl Into<String>) -> Self {
        Self::PersistFailed {
            what,
            details: details.into(),
        }
    }

    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn network_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_parse(operation, error.to_string())
    }

    pub fn verification(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::Verification,
            details: details.into(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        UpdateError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NetworkStage, UpdateError};

    #[test]
    fn io_error_conversion_maps_to_io_variant() {
        let mapped = UpdateError::from(std::io::Error::other("permission denied"));
        assert!(
            matches!(mapped, UpdateError::IoError { kind, ref message } if kind == std::io::ErrorKind::Other && message.contains("permission denied"))
        );
    }

    #[test]
    fn network_helpers_set_expected_stage() {
        let request = UpdateError::network_request("check core update", "timed out");
        assert!(matches!(
            request,
            UpdateError::NetworkError {
                operation: "check core update",
                stage: NetworkStage::Request,
                ..
            }
        ));

        let parse = UpdateError::network_parse("check core update", "invalid json");
        assert!(matches!(
            parse,
            UpdateError::NetworkError {
                stage: NetworkStage::ResponseParse,
                ..
            }
        ));

        let verify = UpdateError::verification("download core", "checksum mismatch");
        assert_eq!(
            verify.to_string(),
            "Network error during download core (verification): checksum mismatch"
        );
    }

    #[test]
    fn timeout_display_includes_operation_and_seconds() {
        let error = UpdateError::Timeout {
            operation: "geo update",
            seconds: 30,
        };

        assert_eq!(error.to_string(), "Timed out after 30s waiting for geo update");
    }

    #[test]
    fn only_cancelled_variant_reports_cancellation() {
        assert!(UpdateError::Cancelled { operation: "x" }.is_cancelled());
        assert!(!UpdateError::install_failed("extract", "boom").is_cancelled());
    }
}
