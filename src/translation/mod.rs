//! Translation module for Live Translator
//!
//! Translation is delegated to a remote text-generation model. The state
//! loop only sees the [`Translator`] trait; the Gemini client is the
//! production implementation.

mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::{
    api_key_from_env, build_prompt, GeminiTranslator, API_KEY_VARS, DEFAULT_API_BASE,
    DEFAULT_MODEL,
};

/// Errors that can occur during a translation request
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Translation API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse API response: {0}")]
    Parse(String),
    #[error("Translation API returned no text")]
    EmptyResponse,
}

/// Errors that prevent the application from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Translation API key not configured. Set the API_KEY environment variable.")]
    MissingApiKey,
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Text-in/text-out translation service. Every call is independent.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` between two human-readable language names and return
    /// the translation with surrounding whitespace removed.
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_details() {
        let err = TranslationError::Api {
            status: 403,
            message: "API key not valid".to_string(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("API key not valid"));

        let err = TranslationError::Network("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn missing_key_names_the_variable() {
        assert!(StartupError::MissingApiKey.to_string().contains("API_KEY"));
    }
}
