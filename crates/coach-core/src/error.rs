use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FocusError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure to hand a message to a single live connection. The hub prunes the
/// connection when this happens; it is never fatal to the broadcaster.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("connection {0} is closed")]
    Closed(String),
    #[error("connection {0} is not draining its queue")]
    SlowConsumer(String),
    #[error("connection {0} is not registered")]
    Unknown(String),
    #[error("message serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("persistence failed: {0}")]
    Persistence(String),
}
