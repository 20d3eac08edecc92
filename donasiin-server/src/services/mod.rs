//! Application operations, independent of HTTP. Handlers in `server` call
//! into these and map [`ServiceError`] onto status codes.

pub mod export;
pub mod images;
pub mod intake;
pub mod ledger;
pub mod progress;
pub mod qris;
pub mod review;
pub mod timeline;

use donasiin_shared::domain::DonationStatus;

use crate::backend::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("donation not found: {0}")]
    NotFound(String),

    #[error("donation {id} is already {status}")]
    Conflict { id: String, status: DonationStatus },

    #[error(transparent)]
    Qris(#[from] qris::QrisError),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::Invalid(msg.into())
    }
}
