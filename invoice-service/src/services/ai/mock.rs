//! Offline generator for development and tests.

use super::{GenerationError, TextGenerator};
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct MockTextGenerator;

impl MockTextGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(format!("Mock response for: {}", prompt))
    }
}
