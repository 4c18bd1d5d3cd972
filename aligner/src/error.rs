use thiserror::Error;

/// Errors produced by the capture aligner.
#[derive(Error, Debug)]
pub enum AlignerError {
    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
