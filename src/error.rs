//! Error taxonomy shared by ingestion, storage and publishing.
//!
//! Only `Configuration` is fatal to an invocation. Everything else is
//! contained to the record, payload or source it concerns and surfaces as a
//! log line plus a counter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefineryError {
    /// Bad or missing fields in a raw payload. The unit is skipped.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Storage/API timeout, connection error or 5xx. The unit is skipped and
    /// picked up again by the next scheduled run.
    #[error("external failure: {0}")]
    TransientExternal(String),

    /// Missing credential or invalid tuning value. Aborts before any work.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, RefineryError>;

impl RefineryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RefineryError::Configuration(_))
    }
}

impl From<serde_json::Error> for RefineryError {
    fn from(err: serde_json::Error) -> Self {
        RefineryError::MalformedInput(err.to_string())
    }
}

impl From<reqwest::Error> for RefineryError {
    fn from(err: reqwest::Error) -> Self {
        RefineryError::TransientExternal(err.to_string())
    }
}

impl From<std::io::Error> for RefineryError {
    fn from(err: std::io::Error) -> Self {
        RefineryError::TransientExternal(format!("io: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configuration_is_fatal() {
        assert!(RefineryError::Configuration("x".into()).is_fatal());
        assert!(!RefineryError::MalformedInput("x".into()).is_fatal());
        assert!(!RefineryError::TransientExternal("x".into()).is_fatal());
    }

    #[test]
    fn json_errors_map_to_malformed_input() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let mapped: RefineryError = err.into();
        assert!(matches!(mapped, RefineryError::MalformedInput(_)));
    }
}
