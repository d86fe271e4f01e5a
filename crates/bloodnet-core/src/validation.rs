//! # Field Validation
//!
//! Shared input rules. Each helper returns the normalized value on success so
//! callers store exactly what was validated.

use crate::error::ValidationError;

/// Lower-case and trim an email address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Validate and normalize an email address.
///
/// Accepts `local@domain.tld` with no whitespace, exactly one `@`, and a dot
/// inside the domain that is neither its first nor last character.
pub fn validate_email(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    let invalid = || ValidationError::invalid(field, "must be a valid email address");
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.find('.') {
        Some(dot) if dot > 0 && !domain.ends_with('.') => Ok(email),
        _ => Err(invalid()),
    }
}

/// Validate a phone number: exactly ten ASCII digits.
pub fn validate_phone(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let phone = raw.trim();
    if phone.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::invalid(field, "must be exactly 10 digits"));
    }
    Ok(phone.to_string())
}

/// Validate a required text field: trimmed, non-empty, at most `max` chars.
pub fn validate_required_text(
    field: &'static str,
    raw: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    validate_bounded_text(field, value, max)
}

/// Validate an optional text field: at most `max` chars after trimming.
pub fn validate_bounded_text(
    field: &'static str,
    raw: &str,
    max: usize,
) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.chars().count() > max {
        return Err(ValidationError::invalid(
            field,
            format!("cannot exceed {max} characters"),
        ));
    }
    Ok(value.to_string())
}

/// Lower-case hex encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
