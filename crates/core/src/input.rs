//! Caller-supplied job input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key of the free-text field every submission must carry.
pub const TEXT_FIELD: &str = "text";

/// Upper bound on the free-text field, matching the published input schema.
pub const MAX_TEXT_LEN: usize = 5000;

/// Minimum length advertised in the input schema (not enforced server-side).
pub const MIN_TEXT_LEN: usize = 50;

/// Rejected submission input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("identifier_from_purchaser must not be empty")]
    MissingPurchaser,
    #[error("input_data.text is required")]
    MissingText,
    #[error("input_data.text must not be blank")]
    BlankText,
    #[error("input_data.text exceeds 5000 characters ({0})")]
    TextTooLong(usize),
}

/// Structured input payload (immutable once the job exists).
///
/// Backed by a `BTreeMap` so serialization is canonical (sorted keys), which
/// the payment input hash relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobInput(BTreeMap<String, String>);

impl JobInput {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The free-text field, or an empty string when absent.
    pub fn text(&self) -> &str {
        self.get(TEXT_FIELD).unwrap_or_default()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// Check the submission shape before any state is created.
    pub fn validate(&self) -> Result<(), InputError> {
        let text = self.get(TEXT_FIELD).ok_or(InputError::MissingText)?;
        if text.trim().is_empty() {
            return Err(InputError::BlankText);
        }
        let len = text.chars().count();
        if len > MAX_TEXT_LEN {
            return Err(InputError::TextTooLong(len));
        }
        Ok(())
    }

    /// Text shortened for log lines.
    pub fn text_preview(&self, max_chars: usize) -> String {
        let text = self.text();
        if text.chars().count() > max_chars {
            let head: String = text.chars().take(max_chars).collect();
            format!("{head}...")
        } else {
            text.to_string()
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JobInput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
