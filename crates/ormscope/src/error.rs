//! Error types for the ormscope API.

use thiserror::Error;

/// Errors returned by [`Database`](crate::Database) and its models.
#[derive(Debug, Error)]
pub enum Error {
    /// Composition or store failure.
    #[error(transparent)]
    Core(#[from] ormscope_core::Error),

    /// A blocking store task failed to complete.
    #[cfg(feature = "async")]
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ormscope_core::StoreError> for Error {
    fn from(err: ormscope_core::StoreError) -> Self {
        Error::Core(err.into())
    }
}

impl Error {
    /// The underlying core error, if any.
    pub fn as_core(&self) -> Option<&ormscope_core::Error> {
        match self {
            Error::Core(err) => Some(err),
            #[cfg(feature = "async")]
            Error::Join(_) => None,
        }
    }
}

/// Result type for ormscope operations.
pub type Result<T> = std::result::Result<T, Error>;
