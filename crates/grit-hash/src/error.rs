/// Errors produced by hash and object-id operations.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid digest length: expected {expected} bytes, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("fan-out table decreases at bucket {bucket}: {previous} -> {current}")]
    NonMonotonicFanout {
        bucket: usize,
        previous: u32,
        current: u32,
    },

    #[error("fan-out table too short: expected {expected} bytes, got {actual}")]
    TruncatedFanout { expected: usize, actual: usize },
}
