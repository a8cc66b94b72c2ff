//! Gemini `generateContent` client.
//!
//! One request per turn: the instruction prompt embeds both language names and
//! the quoted source text. No retries and no timeout beyond reqwest's default.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{StartupError, TranslationError, Translator};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Environment variables checked for the backend credential, in order.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

/// Read the backend credential from the environment.
pub fn api_key_from_env() -> Result<String, StartupError> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
        .ok_or(StartupError::MissingApiKey)
}

pub fn build_prompt(text: &str, source_language: &str, target_language: &str) -> String {
    format!(
        "You are an expert translator. Translate the following text from {} to {}. \
         Provide only the translated text, without any additional explanations, \
         introductions, or formatting.\n\nText to translate: \"{}\"",
        source_language, target_language, text
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Text of the first candidate, trimmed. Missing or blank text is an error.
fn response_text(response: GenerateResponse) -> Result<String, TranslationError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(TranslationError::EmptyResponse);
    }
    Ok(text.to_string())
}

pub struct GeminiTranslator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiTranslator {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, StartupError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StartupError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client, api_key, base_url, model))
    }

    /// Use a preconfigured HTTP client (proxy settings, test servers).
    pub fn with_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let prompt = build_prompt(text, source_language, target_language);
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        log::debug!(
            "Translating {} chars {} -> {} with {}",
            text.len(),
            source_language,
            target_language,
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslationError::Network(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| TranslationError::Parse(e.to_string()))?;
            response_text(body)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            let message =
                if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            log::error!("Translation API error ({}): {}", status.as_u16(), message);

            Err(TranslationError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
