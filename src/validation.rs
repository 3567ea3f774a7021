//! Field validation shared by the request handlers.
//!
//! Errors are collected per field so a single response can report every
//! problem with a payload, keyed the same way the payload is.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;
use serde::Serialize;

use crate::errors::{AppError, AppResult};

pub const RESERVED_USERNAME: &str = "me";
pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PERSON_NAME_MAX_LEN: usize = 150;
pub const SLUG_MAX_LEN: usize = 50;
pub const LOOKUP_NAME_MAX_LEN: usize = 50;
pub const TITLE_NAME_MAX_LEN: usize = 100;
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

const REQUIRED: &str = "this field is required";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }

    /// Unwraps a required field, recording an error when it is absent or blank.
    pub fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.add(field, REQUIRED);
                None
            }
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("ensure this field has no more than {max} characters"));
        }
    }

    pub fn username(&mut self, field: &str, value: &str) {
        if value == RESERVED_USERNAME {
            self.add(field, format!("the username '{RESERVED_USERNAME}' is reserved"));
            return;
        }
        self.max_len(field, value, USERNAME_MAX_LEN);
        if !value.chars().all(is_username_char) {
            self.add(field, "may contain only letters, digits and @/./+/-/_ characters");
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        self.max_len(field, value, EMAIL_MAX_LEN);
        if !is_plausible_email(value) {
            self.add(field, "enter a valid email address");
        }
    }

    pub fn slug(&mut self, field: &str, value: &str) {
        self.max_len(field, value, SLUG_MAX_LEN);
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            self.add(field, "may contain only latin letters, digits, hyphens and underscores");
        }
    }

    /// Release year may not lie in the future. `current_year` is taken at
    /// call time so the bound moves with the calendar.
    pub fn year(&mut self, field: &str, year: i32, current_year: i32) {
        if year > current_year {
            self.add(field, format!("ensure this value is less than or equal to {current_year}"));
        }
    }

    pub fn score(&mut self, field: &str, score: i64) {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            self.add(field, format!("score must be between {MIN_SCORE} and {MAX_SCORE}"));
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

pub fn current_year() -> i32 {
    crate::utils::utc_now().year()
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_username_is_rejected() {
        let mut errors = FieldErrors::new();
        errors.username("username", "me");
        assert!(errors.get("username").is_some());
    }

    #[test]
    fn username_charset() {
        let mut errors = FieldErrors::new();
        errors.username("username", "ada.lovelace+1@home");
        assert!(errors.is_empty());

        errors.username("username", "bad name");
        assert_eq!(errors.get("username").map(|m| m.len()), Some(1));
    }

    #[test]
    fn score_boundaries() {
        let mut errors = FieldErrors::new();
        errors.score("score", 1);
        errors.score("score", 10);
        assert!(errors.is_empty());

        errors.score("score", 0);
        errors.score("score", 11);
        assert_eq!(errors.get("score").map(|m| m.len()), Some(2));
    }

    #[test]
    fn year_may_equal_current_but_not_exceed() {
        let mut errors = FieldErrors::new();
        errors.year("year", 2024, 2024);
        assert!(errors.is_empty());
        errors.year("year", 2025, 2024);
        assert!(errors.get("year").is_some());
    }

    #[test]
    fn slug_and_email_shapes() {
        let mut errors = FieldErrors::new();
        errors.slug("slug", "sci-fi_2");
        errors.email("email", "ada@example.com");
        assert!(errors.is_empty());

        errors.slug("slug", "sci fi");
        errors.email("email", "ada@");
        assert!(errors.get("slug").is_some());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn required_treats_blank_as_missing() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.required("text", Some("  ".into())), None);
        assert_eq!(errors.required("name", None), None);
        assert_eq!(errors.required("slug", Some("x".into())), Some("x".into()));
        assert_eq!(errors.to_string(), "name: this field is required; text: this field is required");
    }
}
