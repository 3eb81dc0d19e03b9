use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

pub(crate) const REQUIRED: &str = "This field is required.";
pub(crate) const INVALID_CHOICE: &str = "Select a valid choice.";
pub(crate) const INVALID_DATE: &str = "Enter a valid date (YYYY-MM-DD).";

/// Per-field validation messages returned to the form that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid input for: {}", fields.join(", "))
    }
}

/// Trimmed, non-empty text within `max_len` characters.
pub(crate) fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
    max_len: usize,
) -> Option<String> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(value) if value.chars().count() > max_len => {
            errors.add(
                field,
                format!("Ensure this value has at most {max_len} characters."),
            );
            None
        }
        Some(value) => Some(value.to_string()),
    }
}

pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub(crate) fn required_date(
    errors: &mut FieldErrors,
    field: &str,
    raw: Option<&str>,
) -> Option<NaiveDate> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(value) => {
            let parsed = parse_date(value);
            if parsed.is_none() {
                errors.add(field, INVALID_DATE);
            }
            parsed
        }
    }
}
