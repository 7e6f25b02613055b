//! `facturo-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the shared error model, entity/value-object markers and the
//! clock abstraction used wherever "today" matters.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{InvoiceId, InvoiceLineId, UserId};
pub use value_object::ValueObject;
