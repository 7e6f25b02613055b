//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two invoice numbers with the same text are
/// the same number. They are immutable; "changing" one means building a new one
/// (e.g. `InvoiceNumber::next`).
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct InvoiceNumber(String);
///
/// impl ValueObject for InvoiceNumber {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
