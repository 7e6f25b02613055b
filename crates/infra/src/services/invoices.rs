use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use facturo_auth::UserProfile;
use facturo_core::{Clock, Entity, InvoiceId, UserId};
use facturo_invoicing::{
    Invoice, InvoiceChanges, InvoiceLine, InvoiceNumber, InvoiceStatus, InvoiceSummary,
    NewInvoice, NumberingPeriod, validate_name,
};

use crate::locks::KeyedLocks;
use crate::pdf::{InvoiceDocument, InvoiceRenderer};
use crate::store::{InvoiceLineStore, InvoiceStore, StoreError, UserStore};

use super::{InvoiceAggregator, ServiceError, ServiceResult};

/// Attempts at inserting a freshly numbered invoice before giving up.
pub const MAX_NUMBERING_ATTEMPTS: u32 = 3;

/// An invoice with its lines (creation order) and owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceWithLines {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub user: Option<UserProfile>,
}

pub struct InvoiceService {
    invoices: Arc<dyn InvoiceStore>,
    lines: Arc<dyn InvoiceLineStore>,
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<InvoiceAggregator>,
    renderer: Arc<dyn InvoiceRenderer>,
    numbering: KeyedLocks<String>,
}

impl InvoiceService {
    pub fn new(
        invoices: Arc<dyn InvoiceStore>,
        lines: Arc<dyn InvoiceLineStore>,
        users: Arc<dyn UserStore>,
        clock: Arc<dyn Clock>,
        aggregator: Arc<InvoiceAggregator>,
        renderer: Arc<dyn InvoiceRenderer>,
    ) -> Self {
        Self {
            invoices,
            lines,
            users,
            clock,
            aggregator,
            renderer,
            numbering: KeyedLocks::new(),
        }
    }

    /// Create a draft invoice with the next number of the current month.
    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn create_invoice(&self, input: NewInvoice) -> ServiceResult<Invoice> {
        validate_name(&input.name)?;
        if let Some(user_id) = input.user_id {
            self.require_user(user_id).await?;
        }

        let now = self.clock.now();
        let period = NumberingPeriod::from_date(now.date_naive());
        let prefix = period.prefix();
        let _numbering = self.numbering.lock(prefix.clone()).await;

        let mut attempt = 1;
        loop {
            let latest = self.invoices.latest_invoice_number(&prefix).await?;
            let number = InvoiceNumber::next(period, latest.as_ref());
            let invoice = Invoice::draft(number, input.clone(), now)?;

            match self.invoices.insert_invoice(&invoice).await {
                Ok(()) => {
                    info!(
                        invoice_id = %invoice.id(),
                        invoice_number = %invoice.invoice_number(),
                        "invoice created"
                    );
                    return Ok(invoice);
                }
                Err(StoreError::Conflict(msg)) if attempt < MAX_NUMBERING_ATTEMPTS => {
                    warn!(attempt, %msg, "invoice number already taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[instrument(skip(self), err)]
    pub async fn list_invoices(&self) -> ServiceResult<Vec<InvoiceSummary>> {
        let invoices = self.invoices.list_invoices().await?;
        Ok(invoices.iter().map(Invoice::summary).collect())
    }

    #[instrument(skip(self), err)]
    pub async fn get_invoice(&self, id: InvoiceId) -> ServiceResult<Invoice> {
        self.invoices
            .get_invoice(id)
            .await?
            .ok_or(ServiceError::NotFound("invoice"))
    }

    #[instrument(skip(self), err)]
    pub async fn get_invoice_with_lines(&self, id: InvoiceId) -> ServiceResult<InvoiceWithLines> {
        let invoice = self.get_invoice(id).await?;
        let lines = self.lines.lines_for_invoice(id).await?;
        let user = match invoice.user_id() {
            Some(user_id) => self.users.get_user(user_id).await?.map(|u| u.profile()),
            None => None,
        };
        Ok(InvoiceWithLines {
            invoice,
            lines,
            user,
        })
    }

    /// Apply a client patch. Number and total are not part of [`InvoiceChanges`].
    ///
    /// Details and status are written separately; the returned invoice is read
    /// back so it carries the stored total.
    #[instrument(skip(self, changes), err)]
    pub async fn update_invoice(&self, id: InvoiceId, changes: InvoiceChanges) -> ServiceResult<Invoice> {
        if let Some(Some(user_id)) = changes.user_id {
            self.require_user(user_id).await?;
        }
        let status = changes.status;
        let now = self.clock.now();

        let _guard = self.aggregator.lock(id).await;
        let mut invoice = self.get_invoice(id).await?;
        invoice.apply(changes, now)?;
        self.invoices.update_invoice_details(&invoice).await?;
        if let Some(status) = status {
            self.invoices.set_invoice_status(id, status, now).await?;
        }

        info!(invoice_id = %id, "invoice updated");
        self.get_invoice(id).await
    }

    /// Validate `raw` against the status enumeration, then apply it.
    ///
    /// An unknown status is reported even when the invoice does not exist.
    #[instrument(skip(self), err)]
    pub async fn update_invoice_status(&self, id: InvoiceId, raw: &str) -> ServiceResult<Invoice> {
        let status = InvoiceStatus::parse(raw)?;

        let _guard = self.aggregator.lock(id).await;
        self.invoices
            .set_invoice_status(id, status, self.clock.now())
            .await?;

        info!(invoice_id = %id, %status, "invoice status changed");
        self.get_invoice(id).await
    }

    /// Delete the invoice and all of its lines.
    #[instrument(skip(self), err)]
    pub async fn delete_invoice(&self, id: InvoiceId) -> ServiceResult<()> {
        let _guard = self.aggregator.lock(id).await;
        if !self.invoices.delete_invoice(id).await? {
            return Err(ServiceError::NotFound("invoice"));
        }
        info!(invoice_id = %id, "invoice deleted");
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub async fn render_pdf(&self, id: InvoiceId) -> ServiceResult<Vec<u8>> {
        let InvoiceWithLines {
            invoice,
            lines,
            user,
        } = self.get_invoice_with_lines(id).await?;
        let document = InvoiceDocument::new(invoice, lines, user);
        Ok(self.renderer.render(&document)?)
    }

    async fn require_user(&self, user_id: UserId) -> ServiceResult<()> {
        match self.users.get_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound("user")),
        }
    }
}
