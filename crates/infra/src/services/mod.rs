//! Application services (orchestration).
//!
//! Services sit between the HTTP layer and the stores. They own every
//! consistency rule that spans more than one record:
//!
//! ```text
//! line create/update/delete/bulk
//!   ↓  (per-invoice lock)
//! 1. compute line total (pure)
//!   ↓
//! 2. persist line(s)
//!   ↓
//! 3. recompute invoice total from all current lines, persist it
//! ```
//!
//! Invoice creation takes a per-month lock around "read latest number → insert"
//! so two concurrent creations never compute the same number in-process; a
//! unique-number conflict from the store (another process) is retried.

mod aggregator;
mod invoices;
mod lines;
mod users;

use thiserror::Error;

use facturo_auth::PasswordError;
use facturo_core::DomainError;

use crate::pdf::RenderError;
use crate::store::StoreError;

pub use aggregator::InvoiceAggregator;
pub use invoices::{InvoiceService, InvoiceWithLines, MAX_NUMBERING_ATTEMPTS};
pub use lines::InvoiceLineService;
pub use users::UserService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(messages) => ServiceError::Validation(messages),
            DomainError::InvalidStatus(raw) => ServiceError::InvalidStatus(raw),
            DomainError::InvalidId(msg) => ServiceError::Validation(vec![msg]),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized(msg) => ServiceError::Unauthorized(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

impl From<RenderError> for ServiceError {
    fn from(value: RenderError) -> Self {
        ServiceError::Internal(value.to_string())
    }
}

impl From<PasswordError> for ServiceError {
    fn from(value: PasswordError) -> Self {
        ServiceError::Internal(value.to_string())
    }
}
