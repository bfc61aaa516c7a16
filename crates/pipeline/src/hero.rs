//! Hero-image generation: the trait seam the orchestrator depends on, and
//! the production client for the external image-generation API.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use remix_core::config::GeneratorConfig;
use remix_core::error::{PipelineError, PipelineResult};
use tracing::info;

/// Black-box image generator: free-text prompt in, raw image bytes out.
/// Failure is fatal for the product that needed the image — there is no
/// further fallback.
#[async_trait]
pub trait HeroImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> PipelineResult<Bytes>;
}

/// Deterministic prompt template parameterized by product name and the
/// theme's color vocabulary.
pub fn hero_prompt(product_name: &str, palette: &str) -> String {
    format!("On-brand product hero image in {palette} for {product_name}. Clean, minimal, social-ad ready.")
}

/// Client for the OpenAI images API. The response carries either inline
/// base64 bytes or a URL to download.
pub struct OpenAiImageGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl OpenAiImageGenerator {
    pub fn new(client: reqwest::Client, config: GeneratorConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl HeroImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> PipelineResult<Bytes> {
        if self.config.api_key.is_empty() {
            return Err(PipelineError::Generator(
                "generator api key is not set".to_string(),
            ));
        }

        info!(model = %self.config.model, size = %self.config.size, "requesting hero image");
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "size": self.config.size,
        });
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Generator(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Generator(format!(
                "image generation failed: {status} {text}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Generator(format!("response decode: {e}")))?;
        let item = payload
            .get("data")
            .and_then(|d| d.get(0))
            .ok_or_else(|| PipelineError::Generator("empty data array".to_string()))?;

        if let Some(b64) = item.get("b64_json").and_then(|v| v.as_str()) {
            let bytes = BASE64
                .decode(b64)
                .map_err(|e| PipelineError::Generator(format!("b64_json decode: {e}")))?;
            return Ok(Bytes::from(bytes));
        }

        if let Some(url) = item.get("url").and_then(|v| v.as_str()) {
            let download = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| PipelineError::Generator(format!("image download: {e}")))?;
            let status = download.status();
            if !status.is_success() {
                return Err(PipelineError::Generator(format!(
                    "image download failed: {status}"
                )));
            }
            return download
                .bytes()
                .await
                .map_err(|e| PipelineError::Generator(format!("image download body: {e}")));
        }

        Err(PipelineError::Generator(
            "no b64_json or url in response".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_template_is_deterministic() {
        let a = hero_prompt("Aloe Mist", "maroon/pink neutrals");
        let b = hero_prompt("Aloe Mist", "maroon/pink neutrals");
        assert_eq!(a, b);
        assert_eq!(
            a,
            "On-brand product hero image in maroon/pink neutrals for Aloe Mist. Clean, minimal, social-ad ready."
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_without_a_request() {
        let generator = OpenAiImageGenerator::new(
            reqwest::Client::new(),
            GeneratorConfig::default(),
        );
        let err = generator.generate("anything").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generator(_)));
        assert!(err.to_string().contains("api key"));
    }
}
