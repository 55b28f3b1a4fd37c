use thiserror::Error;

/// Rejected leaf configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node size {requested} is below the minimum of {minimum}")]
    NodeSizeTooSmall { requested: u16, minimum: u16 },
}
