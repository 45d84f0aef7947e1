use regex::Regex;

use crate::db_types::OrderNumber;

/// Finds the order number inside a payment gateway reference.
///
/// Gateways echo back the reference we gave them, but some decorate it (e.g. `ORD-2024000001_retry1` or
/// `txn:ord-2024000001`).
pub fn extract_order_number_from_reference(reference: &str) -> Option<OrderNumber> {
    let order_number = Regex::new(r"(?i)\b(ORD-\d{10,})(?:\b|_)").ok()?;
    order_number.captures(reference).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}
