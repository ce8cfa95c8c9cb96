//! Email normalisation shared by registration, profile updates and the
//! subscription reconciler.

/// Trim surrounding whitespace and lowercase.
///
/// Every email that reaches the store goes through here, so lookups by email
/// compare like with like regardless of how the billing provider cased it.
pub fn normalize_email(raw: &str) -> String { raw.trim().to_lowercase() }
