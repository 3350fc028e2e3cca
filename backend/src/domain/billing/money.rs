//! Amount and identifier helpers shared by the payment flows.
//!
//! The gateway's payments API takes amounts in minor units (cents) while
//! plan amounts and everything persisted locally are in major units.

use uuid::Uuid;

use crate::domain::foundation::ValidationError;

/// Currencies accepted for one-off payments.
pub const SUPPORTED_CURRENCIES: [&str; 5] = ["USD", "COP", "BRL", "MXN", "ARS"];

/// Countries accepted for one-off payments.
pub const SUPPORTED_COUNTRIES: [&str; 5] = ["US", "CO", "BR", "MX", "AR"];

/// Converts a major-unit amount to minor units, rounding half away from zero.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Converts a minor-unit amount back to major units.
pub fn from_minor_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}

/// True when the amount is a finite number strictly greater than zero.
pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

/// Validates an amount field, naming it in the error.
pub fn validate_amount(field: &str, amount: f64) -> Result<f64, ValidationError> {
    if is_valid_amount(amount) {
        Ok(amount)
    } else {
        Err(ValidationError::not_positive(field, amount))
    }
}

/// Fresh order/transaction identifier.
pub fn generate_transaction_id() -> String {
    Uuid::new_v4().to_string()
}

/// Human-readable amount, e.g. `9.99 USD`.
pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency.to_uppercase())
}

/// Largest amount the sandbox environment accepts per currency, in major units.
pub fn sandbox_limit(currency: &str) -> f64 {
    match currency.to_uppercase().as_str() {
        "COP" => 50_000.0,
        "UYU" => 2_000.0,
        "BRL" => 500.0,
        "MXN" => 2_000.0,
        "ARS" => 10_000.0,
        "PEN" => 300.0,
        "CLP" => 80_000.0,
        _ => 100.0,
    }
}

/// Clamps an amount to the sandbox limit of its currency.
pub fn cap_for_sandbox(amount: f64, currency: &str) -> f64 {
    amount.min(sandbox_limit(currency))
}

/// Country that a currency is charged in by default.
pub fn default_country_for(currency: &str) -> Option<&'static str> {
    match currency.to_uppercase().as_str() {
        "COP" => Some("CO"),
        "USD" => Some("US"),
        "BRL" => Some("BR"),
        "MXN" => Some("MX"),
        "ARS" => Some("AR"),
        "UYU" => Some("UY"),
        "PEN" => Some("PE"),
        "CLP" => Some("CL"),
        _ => None,
    }
}

/// Upper-cases and checks a currency against [`SUPPORTED_CURRENCIES`].
pub fn normalize_currency(currency: &str) -> Result<String, ValidationError> {
    let upper = currency.trim().to_uppercase();
    if SUPPORTED_CURRENCIES.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(ValidationError::not_allowed("currency", &SUPPORTED_CURRENCIES, currency))
    }
}

/// Upper-cases and checks a country against [`SUPPORTED_COUNTRIES`].
pub fn normalize_country(country: &str) -> Result<String, ValidationError> {
    let upper = country.trim().to_uppercase();
    if SUPPORTED_COUNTRIES.contains(&upper.as_str()) {
        Ok(upper)
    } else {
        Err(ValidationError::not_allowed("country", &SUPPORTED_COUNTRIES, country))
    }
}

/// Trims and strips characters that would break out of HTML or quoted contexts.
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\''))
        .collect()
}
