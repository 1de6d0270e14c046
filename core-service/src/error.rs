use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl CoreError {
    /// Returns `true` if the next tick may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Catalog(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<core_runtime::Error> for CoreError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::InitializationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
