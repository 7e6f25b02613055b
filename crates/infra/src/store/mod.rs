//! Persistent store boundary.
//!
//! The services only see these traits. Two implementations exist:
//! [`InMemoryStore`] for tests/dev and [`PostgresStore`] for deployments.
//!
//! ## Contract
//!
//! - `insert_*` fails with [`StoreError::Conflict`] when a unique field collides
//!   (invoice number, user email).
//! - `update_*` and `set_*` fail with [`StoreError::NotFound`] when the record is gone.
//! - Invoice writes are column-scoped: details, status and total each have their
//!   own write, so a writer never puts back a stale copy of a column it did not
//!   change.
//! - `delete_invoice` removes the invoice's lines as well.
//! - Lines are listed in creation order.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use facturo_auth::User;
use facturo_core::{InvoiceId, InvoiceLineId, UserId};
use facturo_invoicing::{Invoice, InvoiceLine, InvoiceNumber, InvoiceStatus};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()>;

    /// Write the client-editable details and `updated_at`.
    ///
    /// Status and total are left as stored.
    async fn update_invoice_details(&self, invoice: &Invoice) -> StoreResult<()>;

    async fn set_invoice_status(
        &self,
        id: InvoiceId,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Only the aggregation path calls this.
    async fn set_invoice_total(
        &self,
        id: InvoiceId,
        total: f64,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>>;

    /// All invoices, oldest first.
    async fn list_invoices(&self) -> StoreResult<Vec<Invoice>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_invoice(&self, id: InvoiceId) -> StoreResult<bool>;

    /// Number of the most recently created invoice whose number starts with `prefix`.
    async fn latest_invoice_number(&self, prefix: &str) -> StoreResult<Option<InvoiceNumber>>;
}

#[async_trait]
pub trait InvoiceLineStore: Send + Sync {
    async fn insert_line(&self, line: &InvoiceLine) -> StoreResult<()>;

    /// Insert all lines or none.
    async fn insert_lines(&self, lines: &[InvoiceLine]) -> StoreResult<()>;

    async fn update_line(&self, line: &InvoiceLine) -> StoreResult<()>;

    async fn get_line(&self, id: InvoiceLineId) -> StoreResult<Option<InvoiceLine>>;

    async fn lines_for_invoice(&self, invoice_id: InvoiceId) -> StoreResult<Vec<InvoiceLine>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_line(&self, id: InvoiceLineId) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
}
