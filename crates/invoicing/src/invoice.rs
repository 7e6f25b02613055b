use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use facturo_core::{DomainError, DomainResult, Entity, InvoiceId, UserId};

use crate::numbering::InvoiceNumber;
use crate::status::InvoiceStatus;
use crate::totals::VatBreakdown;

/// Days between the invoice date and the due date at creation.
pub const PAYMENT_TERM_DAYS: u64 = 30;

pub const DEFAULT_VAT_RATE: f64 = 20.0;

const MIN_NAME_LEN: usize = 3;

/// Reject names shorter than three characters (after trimming).
pub fn validate_name(name: &str) -> DomainResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name must be at least {MIN_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Client-editable descriptive data of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetails {
    pub name: String,
    pub issuer_name: Option<String>,
    pub issuer_address: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub vat_active: bool,
    pub vat_rate: f64,
    pub user_id: Option<UserId>,
}

/// Invoice entity.
///
/// # Invariants
/// - `invoice_number` is assigned at construction and never changes.
/// - `total_amount` is only written through [`Invoice::set_total_amount`], which the
///   aggregation path calls with the sum of the current line totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    id: InvoiceId,
    invoice_number: InvoiceNumber,
    status: InvoiceStatus,
    total_amount: f64,
    #[serde(flatten)]
    details: InvoiceDetails,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for a new invoice.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub name: String,
    pub issuer_name: Option<String>,
    pub issuer_address: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub vat_active: Option<bool>,
    pub vat_rate: Option<f64>,
    pub user_id: Option<UserId>,
}

/// Partial update of an invoice. An absent field is left untouched.
///
/// The optional text fields and the owner are doubly optional: `null` clears
/// them, a value replaces them. Number and total are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub issuer_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub issuer_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub client_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub client_address: Option<Option<String>>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vat_active: Option<bool>,
    pub vat_rate: Option<f64>,
    pub status: Option<InvoiceStatus>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub user_id: Option<Option<UserId>>,
}

/// Deserialize a present field as `Some`, so an explicit `null` becomes
/// `Some(None)`. Pair with `#[serde(default)]` to keep absent fields `None`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// List projection of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub id: InvoiceId,
    pub name: String,
    pub invoice_number: InvoiceNumber,
    pub status: InvoiceStatus,
    pub total_amount: f64,
}

impl Invoice {
    /// Build a new draft invoice.
    ///
    /// Dates default to today and today + 30 days; the total starts at zero.
    pub fn draft(number: InvoiceNumber, input: NewInvoice, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_name(&input.name)?;

        let today = now.date_naive();
        let due_date = today
            .checked_add_days(Days::new(PAYMENT_TERM_DAYS))
            .ok_or_else(|| DomainError::validation("due date out of range"))?;

        Ok(Self {
            id: InvoiceId::new(),
            invoice_number: number,
            status: InvoiceStatus::Brouillon,
            total_amount: 0.0,
            details: InvoiceDetails {
                name: input.name,
                issuer_name: input.issuer_name,
                issuer_address: input.issuer_address,
                client_name: input.client_name,
                client_address: input.client_address,
                invoice_date: today,
                due_date,
                vat_active: input.vat_active.unwrap_or(false),
                vat_rate: input.vat_rate.unwrap_or(DEFAULT_VAT_RATE),
                user_id: input.user_id,
            },
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild a persisted invoice.
    pub fn restore(
        id: InvoiceId,
        invoice_number: InvoiceNumber,
        status: InvoiceStatus,
        total_amount: f64,
        details: InvoiceDetails,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            invoice_number,
            status,
            total_amount,
            details,
            created_at,
            updated_at,
        }
    }

    pub fn invoice_number(&self) -> &InvoiceNumber {
        &self.invoice_number
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn details(&self) -> &InvoiceDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.details.user_id
    }

    /// Move to `status`. Any enumerated status is reachable from any other.
    pub fn set_status(&mut self, status: InvoiceStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Store a freshly aggregated total. Touches nothing else but `updated_at`.
    pub fn set_total_amount(&mut self, total: f64, now: DateTime<Utc>) {
        self.total_amount = total;
        self.updated_at = now;
    }

    /// Apply a client patch.
    ///
    /// The name rule is checked before anything is written, so a rejected patch
    /// leaves the invoice untouched.
    pub fn apply(&mut self, changes: InvoiceChanges, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &changes.name {
            validate_name(name)?;
        }

        let d = &mut self.details;
        if let Some(name) = changes.name {
            d.name = name;
        }
        if let Some(v) = changes.issuer_name {
            d.issuer_name = v;
        }
        if let Some(v) = changes.issuer_address {
            d.issuer_address = v;
        }
        if let Some(v) = changes.client_name {
            d.client_name = v;
        }
        if let Some(v) = changes.client_address {
            d.client_address = v;
        }
        if let Some(v) = changes.invoice_date {
            d.invoice_date = v;
        }
        if let Some(v) = changes.due_date {
            d.due_date = v;
        }
        if let Some(v) = changes.vat_active {
            d.vat_active = v;
        }
        if let Some(v) = changes.vat_rate {
            d.vat_rate = v;
        }
        if let Some(v) = changes.user_id {
            d.user_id = v;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn vat_breakdown(&self) -> VatBreakdown {
        VatBreakdown::compute(self.total_amount, self.details.vat_active, self.details.vat_rate)
    }

    pub fn summary(&self) -> InvoiceSummary {
        InvoiceSummary {
            id: self.id,
            name: self.details.name.clone(),
            invoice_number: self.invoice_number.clone(),
            status: self.status,
            total_amount: self.total_amount,
        }
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numbering::NumberingPeriod;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 19, 13, 1, 31).unwrap()
    }

    fn number() -> InvoiceNumber {
        InvoiceNumber::first(NumberingPeriod::from_date(test_time().date_naive()))
    }

    fn test_invoice() -> NewInvoice {
        NewInvoice {
            name: "Test Invoice".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn draft_has_defaults() {
        let invoice = Invoice::draft(number(), test_invoice(), test_time()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Brouillon);
        assert_eq!(invoice.total_amount(), 0.0);
        assert_eq!(invoice.invoice_number().as_str(), "FACT-202506001");
        assert_eq!(
            invoice.details().invoice_date,
            NaiveDate::from_ymd_opt(2025, 6, 19).unwrap()
        );
        assert_eq!(
            invoice.details().due_date,
            NaiveDate::from_ymd_opt(2025, 7, 19).unwrap()
        );
        assert!(!invoice.details().vat_active);
        assert_eq!(invoice.details().vat_rate, DEFAULT_VAT_RATE);
    }

    #[test]
    fn short_name_is_rejected() {
        let err = Invoice::draft(
            number(),
            NewInvoice {
                name: " ab ".to_string(),
                ..Default::default()
            },
            test_time(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation(messages) => {
                assert_eq!(messages, vec!["name must be at least 3 characters".to_string()])
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn rejected_patch_changes_nothing() {
        let mut invoice = Invoice::draft(number(), test_invoice(), test_time()).unwrap();
        let before = invoice.clone();
        let result = invoice.apply(
            InvoiceChanges {
                name: Some("no".to_string()),
                status: Some(InvoiceStatus::Paye),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
        assert_eq!(invoice, before);
    }

    #[test]
    fn patch_keeps_number_and_total() {
        let mut invoice = Invoice::draft(number(), test_invoice(), test_time()).unwrap();
        invoice.set_total_amount(42.0, test_time());
        invoice
            .apply(
                InvoiceChanges {
                    client_name: Some(Some("ACME".to_string())),
                    vat_active: Some(true),
                    status: Some(InvoiceStatus::Attente),
                    ..Default::default()
                },
                test_time(),
            )
            .unwrap();
        assert_eq!(invoice.invoice_number().as_str(), "FACT-202506001");
        assert_eq!(invoice.total_amount(), 42.0);
        assert_eq!(invoice.status(), InvoiceStatus::Attente);
        assert_eq!(invoice.details().client_name.as_deref(), Some("ACME"));
    }

    #[test]
    fn null_clears_and_absent_keeps() {
        let mut invoice = Invoice::draft(
            number(),
            NewInvoice {
                name: "Test Invoice".to_string(),
                issuer_name: Some("Facturo SARL".to_string()),
                client_name: Some("ACME".to_string()),
                ..Default::default()
            },
            test_time(),
        )
        .unwrap();

        let changes: InvoiceChanges =
            serde_json::from_value(serde_json::json!({ "clientName": null })).unwrap();
        assert_eq!(changes.client_name, Some(None));
        assert_eq!(changes.issuer_name, None);

        invoice.apply(changes, test_time()).unwrap();
        assert_eq!(invoice.details().client_name, None);
        assert_eq!(invoice.details().issuer_name.as_deref(), Some("Facturo SARL"));
    }

    #[test]
    fn present_value_replaces_optional_field() {
        let changes: InvoiceChanges =
            serde_json::from_value(serde_json::json!({ "issuerAddress": "1 rue de Paris" }))
                .unwrap();
        assert_eq!(changes.issuer_address, Some(Some("1 rue de Paris".to_string())));
        assert_eq!(changes.user_id, None);
    }

    #[test]
    fn any_status_is_reachable_from_any_other() {
        let mut invoice = Invoice::draft(number(), test_invoice(), test_time()).unwrap();
        for from in InvoiceStatus::ALL {
            for to in InvoiceStatus::ALL {
                invoice.set_status(from, test_time());
                invoice.set_status(to, test_time());
                assert_eq!(invoice.status(), to);
            }
        }
    }

    #[test]
    fn serializes_flat_camel_case() {
        let invoice = Invoice::draft(number(), test_invoice(), test_time()).unwrap();
        let json = serde_json::to_value(&invoice).unwrap();
        assert_eq!(json["invoiceNumber"], "FACT-202506001");
        assert_eq!(json["status"], "BROUILLON");
        assert_eq!(json["totalAmount"], 0.0);
        assert_eq!(json["name"], "Test Invoice");
        assert_eq!(json["dueDate"], "2025-07-19");
        assert_eq!(json["vatActive"], false);
    }
}
