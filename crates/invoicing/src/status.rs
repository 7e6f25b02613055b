use core::str::FromStr;

use serde::{Deserialize, Serialize};

use facturo_core::DomainError;

/// Invoice status lifecycle.
///
/// The set is closed but unordered: any status may follow any other. Only
/// membership is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    /// Draft. Every new invoice starts here.
    #[default]
    Brouillon,
    /// Sent, awaiting payment.
    Attente,
    /// Paid.
    Paye,
    /// Overdue.
    Retard,
    /// Cancelled.
    Annule,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Brouillon,
        InvoiceStatus::Attente,
        InvoiceStatus::Paye,
        InvoiceStatus::Retard,
        InvoiceStatus::Annule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Brouillon => "BROUILLON",
            InvoiceStatus::Attente => "ATTENTE",
            InvoiceStatus::Paye => "PAYE",
            InvoiceStatus::Retard => "RETARD",
            InvoiceStatus::Annule => "ANNULE",
        }
    }

    /// Validate a raw status label.
    ///
    /// Matching is exact (case-sensitive); anything else is `InvalidStatus`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == raw)
            .ok_or_else(|| DomainError::invalid_status(raw))
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
