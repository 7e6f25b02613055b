//! Invoice-level amounts.

use serde::Serialize;

use crate::line::InvoiceLine;

/// Sum of line totals, in iteration order.
pub fn aggregate_total<'a, I>(lines: I) -> f64
where
    I: IntoIterator<Item = &'a InvoiceLine>,
{
    lines.into_iter().fold(0.0, |sum, line| sum + line.total())
}

/// Amounts printed on a rendered invoice.
///
/// VAT is never stored; it is derived from the stored total when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VatBreakdown {
    pub total_excl_vat: f64,
    /// `None` when VAT is not active on the invoice.
    pub vat: Option<VatAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VatAmount {
    pub rate: f64,
    pub amount: f64,
    pub total_incl_vat: f64,
}

impl VatBreakdown {
    pub fn compute(total: f64, vat_active: bool, vat_rate: f64) -> Self {
        let vat = vat_active.then(|| {
            let amount = total * (vat_rate / 100.0);
            VatAmount {
                rate: vat_rate,
                amount,
                total_incl_vat: total + amount,
            }
        });
        Self {
            total_excl_vat: total,
            vat,
        }
    }
}
