//! AI-assisted text for invoice line items.
//!
//! Handlers depend on the [`TextGenerator`] trait only, so the Gemini backend
//! can be swapped for the mock one in development and tests.

pub mod gemini;
pub mod mock;
pub mod prompts;

pub use gemini::{GeminiConfig, GeminiTextGenerator};
pub use mock::MockTextGenerator;
pub use prompts::{description_prompt, parse_suggestions, strip_code_fences, suggestions_prompt};

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("AI provider not configured: {0}")]
    NotConfigured(String),

    #[error("AI provider error: {0}")]
    ApiError(String),

    #[error("AI provider rate limited")]
    RateLimited,

    #[error("AI response was filtered by the provider")]
    ContentFiltered,

    #[error("Network error talking to AI provider: {0}")]
    NetworkError(String),
}

impl GenerationError {
    /// Label used for the `outcome` dimension of `ai_requests_total`.
    pub fn outcome(&self) -> &'static str {
        match self {
            GenerationError::NotConfigured(_) => "not_configured",
            GenerationError::ApiError(_) => "api_error",
            GenerationError::RateLimited => "rate_limited",
            GenerationError::ContentFiltered => "content_filtered",
            GenerationError::NetworkError(_) => "network_error",
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::NotConfigured(_) => AppError::ServiceUnavailable(
                "AI service is not available. Please check GEMINI_API_KEY configuration."
                    .to_string(),
            ),
            GenerationError::RateLimited => AppError::TooManyRequests(
                "AI provider is rate limiting requests, please retry later".to_string(),
                Some(30),
            ),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a plain-text reply for `prompt`, trimmed of surrounding whitespace.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn generation_errors_map_to_gateway_statuses() {
        let cases = [
            (
                GenerationError::NotConfigured("missing key".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (GenerationError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (GenerationError::ContentFiltered, StatusCode::BAD_GATEWAY),
            (
                GenerationError::ApiError("500".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                GenerationError::NetworkError("reset".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let app: AppError = err.into();
            assert_eq!(app.status_code(), expected);
        }
    }
}
