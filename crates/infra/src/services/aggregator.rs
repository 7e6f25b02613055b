use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, instrument};

use facturo_core::{Clock, InvoiceId};
use facturo_invoicing::aggregate_total;

use crate::locks::KeyedLocks;
use crate::store::{InvoiceLineStore, InvoiceStore, StoreError};

use super::ServiceResult;

/// Keeps `Invoice.total_amount` equal to the sum of its lines.
///
/// Shared by the invoice and line services so both serialise on the same
/// per-invoice lock.
pub struct InvoiceAggregator {
    invoices: Arc<dyn InvoiceStore>,
    lines: Arc<dyn InvoiceLineStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<InvoiceId>,
}

impl InvoiceAggregator {
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        lines: Arc<dyn InvoiceLineStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invoices,
            lines,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Exclusive access to one invoice within this process. Hold it across
    /// "write lines + recompute" and across invoice writes.
    pub async fn lock(&self, invoice_id: InvoiceId) -> OwnedMutexGuard<()> {
        self.locks.lock(invoice_id).await
    }

    /// Recompute and persist the total. The caller must hold [`Self::lock`].
    ///
    /// Only `total_amount` and `updated_at` are written, so a status or detail
    /// change made by another process in the meantime survives.
    ///
    /// Returns the new total, or `None` when the invoice no longer exists.
    #[instrument(skip(self, _guard), err)]
    pub async fn recompute(
        &self,
        invoice_id: InvoiceId,
        _guard: &OwnedMutexGuard<()>,
    ) -> ServiceResult<Option<f64>> {
        let lines = self.lines.lines_for_invoice(invoice_id).await?;
        let total = aggregate_total(&lines);

        match self
            .invoices
            .set_invoice_total(invoice_id, total, self.clock.now())
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(%invoice_id, "invoice gone, skipping total recompute");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        debug!(%invoice_id, total, line_count = lines.len(), "invoice total recomputed");
        Ok(Some(total))
    }
}
