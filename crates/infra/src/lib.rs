//! Infrastructure layer: storage, orchestration services, locking and PDF output.

pub mod locks;
pub mod pdf;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use locks::KeyedLocks;
pub use pdf::{InvoiceDocument, InvoiceRenderer, LopdfRenderer, RenderError};
pub use services::{
    InvoiceAggregator, InvoiceLineService, InvoiceService, InvoiceWithLines, ServiceError,
    ServiceResult, UserService,
};
pub use store::{
    InMemoryStore, InvoiceLineStore, InvoiceStore, PostgresStore, StoreError, StoreResult,
    UserStore,
};
