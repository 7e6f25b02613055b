//! Invoicing domain module.
//!
//! This crate contains the consistency rules for invoices and their lines,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - line totals (`quantity × unit_price`)
//! - invoice totals aggregated from lines, plus render-time VAT
//! - sequential `FACT-YYYYMM###` invoice numbers
//! - the status enumeration

pub mod invoice;
pub mod line;
pub mod numbering;
pub mod status;
pub mod totals;

pub use invoice::{
    Invoice, InvoiceChanges, InvoiceDetails, InvoiceSummary, NewInvoice, deserialize_some,
    validate_name,
};
pub use line::{InvoiceLine, InvoiceLineChanges, NewInvoiceLine, line_total};
pub use numbering::{INVOICE_NUMBER_PREFIX, InvoiceNumber, NumberingPeriod};
pub use status::InvoiceStatus;
pub use totals::{VatAmount, VatBreakdown, aggregate_total};
