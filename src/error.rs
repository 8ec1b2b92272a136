use thiserror::Error;

/// Top-level error type for the compression core.
///
/// Mirrors the shape of a connection-level error type that wraps narrower
/// per-subsystem enums via `#[error(transparent)]`: callers match on
/// `CompressionError` directly, while each variant's `Display` carries
/// enough field detail to log without a debugger.
#[derive(Error, Debug, Clone)]
pub enum CompressionError {
    #[error(transparent)]
    Corrupted(#[from] CorruptedDataError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedTypeError),
    #[error("serialized size {size} exceeds the maximum allowed allocation of {max}")]
    Overflow { size: usize, max: usize },
    #[error("out of sync: {reason}")]
    OutOfSync { reason: String },
}

#[derive(Error, Debug, Clone)]
#[error("corrupted data: {reason}")]
pub struct CorruptedDataError {
    pub reason: String,
}

#[derive(Error, Debug, Clone)]
#[error("unsupported: algorithm id {algorithm_id} does not implement {operation}")]
pub struct UnsupportedTypeError {
    pub algorithm_id: u8,
    pub operation: &'static str,
}

impl CompressionError {
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::Corrupted(CorruptedDataError {
            reason: reason.into(),
        })
    }

    pub fn unsupported(algorithm_id: u8, operation: &'static str) -> Self {
        Self::Unsupported(UnsupportedTypeError {
            algorithm_id,
            operation,
        })
    }

    pub fn out_of_sync(reason: impl Into<String>) -> Self {
        Self::OutOfSync {
            reason: reason.into(),
        }
    }

    pub fn overflow(size: usize, max: usize) -> Self {
        Self::Overflow { size, max }
    }
}
