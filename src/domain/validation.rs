//! Field validation primitives shared by write paths.

use std::collections::BTreeMap;
use std::fmt;

/// Returns true when the value contains at least one non-whitespace character.
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Returns true when the value holds no more than `max` characters.
///
/// Counts Unicode scalar values rather than bytes.
pub fn max_chars(value: &str, max: usize) -> bool {
    value.chars().count() <= max
}

/// Returns true when `value` is one of the `permitted` values.
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}

/// Accumulates per-field validation failures.
///
/// Only the first message recorded for a field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    field_errors: BTreeMap<&'static str, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn add_field_error(&mut self, field: &'static str, message: impl Into<String>) {
        self.field_errors
            .entry(field)
            .or_insert_with(|| message.into());
    }

    pub fn check_field(&mut self, ok: bool, field: &'static str, message: &str) {
        if !ok {
            self.add_field_error(field, message);
        }
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }

    pub fn field_errors(&self) -> &BTreeMap<&'static str, String> {
        &self.field_errors
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.field_errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}
