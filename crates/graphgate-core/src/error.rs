use thiserror::Error;

/// Top-level error type for the graphgate gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier `{value}`: {reason}")]
    InvalidIdentifier { value: String, reason: String },
}

impl From<config::ConfigError> for GatewayError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
