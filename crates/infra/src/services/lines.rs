use std::sync::Arc;

use tracing::{info, instrument};

use facturo_core::{Clock, Entity, InvoiceId, InvoiceLineId};
use facturo_invoicing::{InvoiceLine, InvoiceLineChanges, NewInvoiceLine};

use crate::store::{InvoiceLineStore, InvoiceStore};

use super::{InvoiceAggregator, ServiceError, ServiceResult};

/// Line CRUD. Every write re-aggregates the owning invoice's total before
/// returning.
pub struct InvoiceLineService {
    invoices: Arc<dyn InvoiceStore>,
    lines: Arc<dyn InvoiceLineStore>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<InvoiceAggregator>,
}

impl InvoiceLineService {
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        lines: Arc<dyn InvoiceLineStore>,
        clock: Arc<dyn Clock>,
        aggregator: Arc<InvoiceAggregator>,
    ) -> Self {
        Self {
            invoices,
            lines,
            clock,
            aggregator,
        }
    }

    #[instrument(skip(self, input), err)]
    pub async fn create_line(
        &self,
        invoice_id: InvoiceId,
        input: NewInvoiceLine,
    ) -> ServiceResult<InvoiceLine> {
        let guard = self.aggregator.lock(invoice_id).await;
        self.require_invoice(invoice_id).await?;

        let line = InvoiceLine::new(invoice_id, input, self.clock.now());
        self.lines.insert_line(&line).await?;
        self.aggregator.recompute(invoice_id, &guard).await?;

        info!(line_id = %line.id(), %invoice_id, total = line.total(), "line created");
        Ok(line)
    }

    /// Create several lines on one invoice and re-aggregate once.
    ///
    /// The batch is all-or-nothing. An empty batch is a no-op.
    #[instrument(skip(self, inputs), fields(count = inputs.len()), err)]
    pub async fn bulk_create_lines(
        &self,
        invoice_id: InvoiceId,
        inputs: Vec<NewInvoiceLine>,
    ) -> ServiceResult<Vec<InvoiceLine>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let guard = self.aggregator.lock(invoice_id).await;
        self.require_invoice(invoice_id).await?;

        let now = self.clock.now();
        let lines: Vec<InvoiceLine> = inputs
            .into_iter()
            .map(|input| InvoiceLine::new(invoice_id, input, now))
            .collect();
        self.lines.insert_lines(&lines).await?;
        self.aggregator.recompute(invoice_id, &guard).await?;

        info!(%invoice_id, count = lines.len(), "lines created");
        Ok(lines)
    }

    /// Lines of an invoice in creation order. Unknown invoices have no lines.
    #[instrument(skip(self), err)]
    pub async fn list_lines(&self, invoice_id: InvoiceId) -> ServiceResult<Vec<InvoiceLine>> {
        Ok(self.lines.lines_for_invoice(invoice_id).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn get_line(&self, id: InvoiceLineId) -> ServiceResult<InvoiceLine> {
        self.lines
            .get_line(id)
            .await?
            .ok_or(ServiceError::NotFound("line"))
    }

    #[instrument(skip(self, changes), err)]
    pub async fn update_line(
        &self,
        id: InvoiceLineId,
        changes: InvoiceLineChanges,
    ) -> ServiceResult<InvoiceLine> {
        let invoice_id = self.get_line(id).await?.invoice_id();
        let guard = self.aggregator.lock(invoice_id).await;

        // Re-read under the lock; the line may have changed or gone meanwhile.
        let mut line = self.get_line(id).await?;
        line.apply(changes, self.clock.now());
        self.lines.update_line(&line).await?;
        self.aggregator.recompute(invoice_id, &guard).await?;

        info!(line_id = %id, %invoice_id, total = line.total(), "line updated");
        Ok(line)
    }

    #[instrument(skip(self), err)]
    pub async fn delete_line(&self, id: InvoiceLineId) -> ServiceResult<()> {
        let invoice_id = self.get_line(id).await?.invoice_id();
        let guard = self.aggregator.lock(invoice_id).await;

        if !self.lines.delete_line(id).await? {
            return Err(ServiceError::NotFound("line"));
        }
        self.aggregator.recompute(invoice_id, &guard).await?;

        info!(line_id = %id, %invoice_id, "line deleted");
        Ok(())
    }

    async fn require_invoice(&self, invoice_id: InvoiceId) -> ServiceResult<()> {
        match self.invoices.get_invoice(invoice_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound("invoice")),
        }
    }
}
