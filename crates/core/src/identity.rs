//! Identity fields submitted for payment-account creation.
//!
//! Validation runs locally before any collaborator is called so that the
//! talent sees a field-specific message and keeps their place in the
//! workflow.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::CoreError;

/// Minimum age, in years, for a payout account holder.
pub const MIN_AGE_YEARS: u32 = 18;

/// Oldest accepted birth year.
pub const MIN_BIRTH_YEAR: i32 = 1900;

static SSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3})-?(\d{2})-?(\d{4})$").expect("valid regex"));

static POSTAL_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid regex"));

/// USPS codes for states, DC and territories.
const US_STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "AS", "GU", "MP", "PR", "VI",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Address {
    #[validate(length(min = 1, max = 60, message = "Street address is required"))]
    pub address_line1: String,
    #[validate(length(max = 60, message = "Address line 2 is too long"))]
    pub address_line2: Option<String>,
    #[validate(length(min = 1, max = 32, message = "City is required"))]
    pub city: String,
    #[validate(custom(function = "validate_state_code"))]
    pub state_or_province: String,
    #[validate(custom(function = "validate_postal_code"))]
    pub postal_code: String,
}

/// Personal details of the talent, as entered on the account form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct IdentityProfile {
    #[validate(length(min = 1, max = 64, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 64, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Email address is not valid"))]
    pub email: String,
    pub date_of_birth: NaiveDate,
    #[validate(nested)]
    pub address: Address,
    /// Social Security number, with or without dashes.
    #[validate(custom(function = "validate_ssn"))]
    pub ssn: String,
}

impl fmt::Debug for IdentityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProfile")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("date_of_birth", &"<redacted>")
            .field("address", &self.address)
            .field("ssn", &format_args!("***-**-{}", self.ssn_last4()))
            .finish()
    }
}

impl IdentityProfile {
    /// Validate every field, including the age check relative to `today`.
    ///
    /// All problems are reported at once, sorted by field path, in a single
    /// [`CoreError::Validation`].
    pub fn check(&self, today: NaiveDate) -> Result<(), CoreError> {
        let mut messages = Vec::new();
        if let Err(errors) = self.validate() {
            flatten_errors("", &errors, &mut messages);
        }
        if let Err(message) = check_date_of_birth(self.date_of_birth, today) {
            messages.push(format!("date_of_birth: {message}"));
        }

        if messages.is_empty() {
            return Ok(());
        }
        messages.sort();
        Err(CoreError::Validation(messages.join("; ")))
    }

    /// The SSN as nine digits, dashes removed.
    pub fn ssn_digits(&self) -> String {
        self.ssn.chars().filter(char::is_ascii_digit).collect()
    }

    /// Last four SSN digits, for display and logs.
    pub fn ssn_last4(&self) -> String {
        let digits = self.ssn_digits();
        let start = digits.len().saturating_sub(4);
        digits[start..].to_string()
    }
}

// ---------------------------------------------------------------------------
// Field validators
// ---------------------------------------------------------------------------

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

/// Reject malformed SSNs and the ranges the SSA never issues.
fn validate_ssn(ssn: &str) -> Result<(), ValidationError> {
    let caps = SSN_RE
        .captures(ssn.trim())
        .ok_or_else(|| field_error("ssn_format", "SSN must be 9 digits (e.g. 123-45-6789)"))?;

    let area = &caps[1];
    let group = &caps[2];
    let serial = &caps[3];
    if area == "000" || area == "666" || area.starts_with('9') || group == "00" || serial == "0000"
    {
        return Err(field_error("ssn_range", "SSN is not a valid number"));
    }
    Ok(())
}

fn validate_state_code(state: &str) -> Result<(), ValidationError> {
    if US_STATE_CODES.contains(&state.trim().to_ascii_uppercase().as_str()) {
        Ok(())
    } else {
        Err(field_error(
            "state_code",
            "State must be a two-letter US state code",
        ))
    }
}

fn validate_postal_code(code: &str) -> Result<(), ValidationError> {
    if POSTAL_CODE_RE.is_match(code.trim()) {
        Ok(())
    } else {
        Err(field_error(
            "postal_code",
            "ZIP code must be 5 digits or ZIP+4",
        ))
    }
}

/// Date of birth must be plausible and the talent at least [`MIN_AGE_YEARS`].
fn check_date_of_birth(dob: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if dob > today {
        return Err("Date of birth cannot be in the future".to_string());
    }
    if dob.year() < MIN_BIRTH_YEAR {
        return Err("Date of birth is not valid".to_string());
    }
    match today.years_since(dob) {
        Some(age) if age >= MIN_AGE_YEARS => Ok(()),
        _ => Err(format!("Must be at least {MIN_AGE_YEARS} years old")),
    }
}

/// Collect `path: message` strings from nested validator output.
fn flatten_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push(format!("{path}: {message}"));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_errors(&format!("{path}[{index}]"), inner, out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
