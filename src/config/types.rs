use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "fetchTimeoutMs")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Renders validation errors as a numbered list.
fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderSettings {
    /// Separates the namespace from the rest of a key, and nested keys in bundles.
    pub key_separator: String,

    /// Root of `<language>/<namespace>.json` bundle files.
    pub translations_dir: String,

    /// Fails a fetch that has not settled after this many milliseconds.
    /// Unset means fetches may take arbitrarily long.
    pub fetch_timeout_ms: Option<u64>,

    /// Language used when the host registry reports none.
    pub default_language: Option<String>,
}

impl LoaderSettings {
    /// `fetch_timeout_ms` as a [`Duration`].
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// # Errors
    /// - Empty separator
    /// - Empty translations directory
    /// - Zero timeout
    /// - Empty default language
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.key_separator.is_empty() {
            errors.push(ValidationError::new(
                "keySeparator",
                "The separator cannot be empty. Please specify a separator, for example: \".\" (dot)",
            ));
        }

        if self.translations_dir.trim().is_empty() {
            errors.push(ValidationError::new(
                "translationsDir",
                "The directory cannot be empty. Example: \"locales\"",
            ));
        }

        if self.fetch_timeout_ms == Some(0) {
            errors.push(ValidationError::new(
                "fetchTimeoutMs",
                "The timeout must be greater than 0. Remove this field to disable the timeout",
            ));
        }

        if let Some(language) = &self.default_language
            && language.trim().is_empty()
        {
            errors.push(ValidationError::new(
                "defaultLanguage",
                "The language cannot be empty. Please specify a language (e.g., \"en\"), or remove this field",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            key_separator: ".".to_string(),
            translations_dir: "locales".to_string(),
            fetch_timeout_ms: None,
            default_language: None,
        }
    }
}
