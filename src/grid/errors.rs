//! Grid-specific error types

use thiserror::Error;

/// Failure of a single order action at the venue gateway
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Rate limited by venue")]
    RateLimited,

    #[error("Rejected by venue: {0}")]
    RejectedByVenue(String),

    #[error("Order action timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl TradeError {
    /// Worth trying again with the same request
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TradeError::RejectedByVenue(_))
    }
}

/// Result type for order gateway calls
pub type TradeResult<T> = std::result::Result<T, TradeError>;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out after {waited_ms}ms waiting for lock on {table}")]
    LockTimeout { table: &'static str, waited_ms: u64 },

    #[error("Order action failed: {0}")]
    Trade(#[from] TradeError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonParse(err.to_string())
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::Io(err.to_string())
    }
}

impl From<config::ConfigError> for GridError {
    fn from(err: config::ConfigError) -> Self {
        GridError::ConfigLoad(err.to_string())
    }
}

impl From<crate::telemetry::TelemetryError> for GridError {
    fn from(err: crate::telemetry::TelemetryError) -> Self {
        GridError::Telemetry(err.to_string())
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_error_converts() {
        let err: GridError = TradeError::RateLimited.into();
        assert!(matches!(err, GridError::Trade(TradeError::RateLimited)));
        assert_eq!(err.to_string(), "Order action failed: Rate limited by venue");
    }

    #[test]
    fn test_retryable() {
        assert!(TradeError::Timeout.is_retryable());
        assert!(TradeError::Transport("reset".into()).is_retryable());
        assert!(!TradeError::RejectedByVenue("post only".into()).is_retryable());
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = GridError::LockTimeout {
            table: "grid_book",
            waited_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 5000ms waiting for lock on grid_book"
        );
    }
}
