//! Per-product base-image resolution.
//!
//! Resolution is an explicit ordered list of strategies tried in sequence.
//! Each strategy either produces a tagged result or declares itself not
//! applicable; only the generator is allowed to fail the product.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::{Product, Provenance};
use tracing::{debug, warn};

use crate::hero::{hero_prompt, HeroImageGenerator};

/// Source image bytes plus where they came from.
#[derive(Debug)]
pub struct ResolvedBase {
    pub bytes: Bytes,
    pub source: Provenance,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Uploaded,
    Remote,
    Generate,
}

const STRATEGY_ORDER: [Strategy; 3] = [Strategy::Uploaded, Strategy::Remote, Strategy::Generate];

pub struct BaseImageResolver {
    client: reqwest::Client,
    generator: Arc<dyn HeroImageGenerator>,
    palette: String,
}

impl BaseImageResolver {
    pub fn new(
        client: reqwest::Client,
        generator: Arc<dyn HeroImageGenerator>,
        palette: impl Into<String>,
    ) -> Self {
        Self {
            client,
            generator,
            palette: palette.into(),
        }
    }

    /// Resolve source bytes for a product: uploaded file, remote URL, then
    /// synthetic generation. Network and file misses are absorbed; only a
    /// generator failure propagates.
    pub async fn resolve(
        &self,
        product: &Product,
        files: &HashMap<String, Bytes>,
    ) -> PipelineResult<ResolvedBase> {
        for strategy in STRATEGY_ORDER {
            if let Some(resolved) = self.try_strategy(strategy, product, files).await? {
                debug!(product_id = %product.id, source = ?resolved.source, "base image resolved");
                return Ok(resolved);
            }
        }
        // Generate always applies, so this is unreachable in practice.
        Err(PipelineError::Resolution(format!(
            "no strategy produced a base image for product {}",
            product.id
        )))
    }

    async fn try_strategy(
        &self,
        strategy: Strategy,
        product: &Product,
        files: &HashMap<String, Bytes>,
    ) -> PipelineResult<Option<ResolvedBase>> {
        match strategy {
            Strategy::Uploaded => Ok(product
                .image_file
                .as_deref()
                .and_then(|name| find_uploaded_file(files, name))
                .map(|bytes| ResolvedBase {
                    bytes: bytes.clone(),
                    source: Provenance::Uploaded,
                })),
            Strategy::Remote => {
                // An uploaded filename, even an unmatched one, pins the
                // product to upload-or-generate.
                if product.image_file.is_some() {
                    return Ok(None);
                }
                let Some(url) = product.image_url.as_deref() else {
                    return Ok(None);
                };
                match self.fetch(url).await {
                    Ok(bytes) => Ok(Some(ResolvedBase {
                        bytes,
                        source: Provenance::Url,
                    })),
                    Err(e) => {
                        warn!(product_id = %product.id, url, error = %e, "remote fetch failed, falling through to generation");
                        Ok(None)
                    }
                }
            }
            Strategy::Generate => {
                let prompt = hero_prompt(&product.name, &self.palette);
                let bytes = self.generator.generate(&prompt).await?;
                Ok(Some(ResolvedBase {
                    bytes,
                    source: Provenance::Generated,
                }))
            }
        }
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// Uploaded-file lookup: exact key, then case-insensitive key, then
/// case-insensitive match ignoring the extension.
pub(crate) fn find_uploaded_file<'a>(
    files: &'a HashMap<String, Bytes>,
    desired: &str,
) -> Option<&'a Bytes> {
    if let Some(bytes) = files.get(desired) {
        return Some(bytes);
    }
    let desired_lower = desired.to_lowercase();
    if let Some(bytes) = files.get(&desired_lower) {
        return Some(bytes);
    }
    if let Some((_, bytes)) = files.iter().find(|(k, _)| k.to_lowercase() == desired_lower) {
        return Some(bytes);
    }
    let base = strip_extension(&desired_lower).to_string();
    files
        .iter()
        .find(|(k, _)| strip_extension(&k.to_lowercase()) == base)
        .map(|(_, bytes)| bytes)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) if i + 1 < name.len() => &name[..i],
        _ => name,
    }
}
