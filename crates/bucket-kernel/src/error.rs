//! Kernel-specific error types.

use bucket_types::error::BucketError;
use thiserror::Error;

/// Kernel error type wrapping BucketError with kernel-specific context.
#[derive(Error, Debug)]
pub enum KernelError {
    /// A wrapped BucketError.
    #[error(transparent)]
    Bucket(#[from] BucketError),

    /// The kernel failed to boot.
    #[error("Boot failed: {0}")]
    BootFailed(String),
}

/// Alias for kernel results.
pub type KernelResult<T> = Result<T, KernelError>;
