//! Server-side form validation.
//!
//! A [`Form`] wraps the submitted field values and accumulates per-field error messages as
//! rules are applied. Rules never short-circuit, so a re-rendered form can show every problem
//! at once.

use std::collections::{BTreeMap, HashMap};

use lettre::Address;
use serde::Serialize;

/// Field name to error messages, in the order the rules were applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// First error for `field`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|messages| messages.first()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Form {
    values: HashMap<String, String>,
    pub errors: FormErrors,
}

impl Form {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values,
            errors: FormErrors::default(),
        }
    }

    /// Submitted value, trimmed. Missing fields read as empty.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(|v| v.trim()).unwrap_or("")
    }

    /// Whether the field is present and non-blank
    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn required(&mut self, fields: &[&str]) {
        for field in fields {
            if !self.has(field) {
                self.errors.add(field, "This field cannot be blank");
            }
        }
    }

    pub fn min_length(&mut self, field: &str, length: usize) -> bool {
        if self.get(field).chars().count() < length {
            self.errors.add(field, format!("This field must be at least {length} characters long"));
            return false;
        }
        true
    }

    pub fn is_email(&mut self, field: &str) -> bool {
        if self.get(field).parse::<Address>().is_err() {
            self.errors.add(field, "Invalid email address");
            return false;
        }
        true
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}
