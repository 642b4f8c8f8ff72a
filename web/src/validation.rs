//! Field-level validation errors.
//!
//! Form-style endpoints report every failing field at once, keyed by field
//! name, so a client can show each message next to its input.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered map of field name to error messages.
///
/// ```
/// use naviera_web::FieldErrors;
///
/// let mut errors = FieldErrors::new();
/// errors.check_required("username", "");
/// errors.check_max_len("country", &"x".repeat(60), 50);
/// assert_eq!(errors.len(), 2);
/// assert!(errors.into_result().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Error set holding a single message.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Fold another error set into this one.
    pub fn merge(&mut self, other: Self) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Number of fields with at least one error.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when no field has failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded against `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `true` if `field` has at least one error.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Iterate fields and their messages in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors if any field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Require a non-blank value.
    pub fn check_required(&mut self, field: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.add(field, "This field is required.");
            return false;
        }
        true
    }

    /// Cap a value's length in characters.
    pub fn check_max_len(&mut self, field: &str, value: &str, max: usize) -> bool {
        let len = value.chars().count();
        if len > max {
            self.add(
                field,
                format!("Ensure this value has at most {max} characters (it has {len})."),
            );
            return false;
        }
        true
    }

    /// Required and at most `max` characters.
    pub fn check_text(&mut self, field: &str, value: &str, max: usize) -> bool {
        self.check_required(field, value) && self.check_max_len(field, value, max)
    }

    /// Require a plausible email address.
    pub fn check_email(&mut self, field: &str, value: &str) -> bool {
        if !self.check_required(field, value) {
            return false;
        }
        if !is_valid_email(value) {
            self.add(field, "Enter a valid email address.");
            return false;
        }
        true
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain
/// without empty labels, no whitespace, at most 254 characters.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }
    domain
        .split('.')
        .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_messages_per_field_in_order() {
        let mut errors = FieldErrors::new();
        errors.add("password2", "The two password fields didn't match.");
        errors.add("email", "Enter a valid email address.");
        errors.add("email", "A user with that email already exists.");

        let fields: Vec<&str> = errors.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["email", "password2"]);
        assert_eq!(errors.get("email").map(<[String]>::len), Some(2));
    }

    #[test]
    fn text_check_reports_required_before_length() {
        let mut errors = FieldErrors::new();
        assert!(!errors.check_text("first_name", "   ", 50));
        assert_eq!(errors.get("first_name"), Some(&["This field is required.".to_string()][..]));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ana@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana@@example.com"));
        assert!(!is_valid_email("ana @example.com"));
        assert!(!is_valid_email("ana@.com"));
    }

    #[test]
    fn serializes_as_plain_map() {
        let errors = FieldErrors::single("dni", "Required.");
        let json = serde_json::to_value(&errors).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "dni": ["Required."] }));
    }
}
