use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use facturo_core::{Entity, InvoiceId, InvoiceLineId};

/// Total of a single line.
///
/// Plain floating-point multiplication, no rounding or currency policy.
pub fn line_total(quantity: f64, unit_price: f64) -> f64 {
    quantity * unit_price
}

/// A billable row of an invoice.
///
/// `total` is derived and cannot be set from outside this module: every
/// constructor and mutator recomputes it from `quantity` and `unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLine {
    id: InvoiceLineId,
    invoice_id: InvoiceId,
    description: String,
    quantity: f64,
    unit_price: f64,
    total: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for a new line. Shape constraints (non-negative amounts, non-empty
/// description) are enforced by the validation layer before this point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceLine {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

/// Partial update of a line. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineChanges {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
}

impl InvoiceLineChanges {
    pub fn touches_amounts(&self) -> bool {
        self.quantity.is_some() || self.unit_price.is_some()
    }
}

impl InvoiceLine {
    pub fn new(invoice_id: InvoiceId, input: NewInvoiceLine, now: DateTime<Utc>) -> Self {
        Self {
            id: InvoiceLineId::new(),
            invoice_id,
            total: line_total(input.quantity, input.unit_price),
            description: input.description,
            quantity: input.quantity,
            unit_price: input.unit_price,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a persisted line. The total is recomputed rather than trusted.
    pub fn restore(
        id: InvoiceLineId,
        invoice_id: InvoiceId,
        description: String,
        quantity: f64,
        unit_price: f64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            invoice_id,
            description,
            quantity,
            unit_price,
            total: line_total(quantity, unit_price),
            created_at,
            updated_at,
        }
    }

    /// Apply a partial update; the total follows quantity/unit price.
    pub fn apply(&mut self, changes: InvoiceLineChanges, now: DateTime<Utc>) {
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(quantity) = changes.quantity {
            self.quantity = quantity;
        }
        if let Some(unit_price) = changes.unit_price {
            self.unit_price = unit_price;
        }
        self.total = line_total(self.quantity, self.unit_price);
        self.updated_at = now;
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

impl Entity for InvoiceLine {
    type Id = InvoiceLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
