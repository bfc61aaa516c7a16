//! Run-level orchestration: `Validating → Prechecking → (Skipped |
//! Generating) → Persisting → Done`.
//!
//! Products are processed in brief order, never concurrently with each
//! other. Within a product the three aspect renders run sequentially or
//! concurrently per configuration; either way the manifest keeps stable
//! aspect order. Each variant is uploaded as it completes; the manifest is
//! uploaded once at the end.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use remix_core::config::AppConfig;
use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::{
    AspectKey, LegalCheck, OutputFormat, PrecheckReport, Product, Provenance, RunManifest,
    SkipReason, VariantManifest,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::brief::parse_brief;
use crate::checks::{check_prohibited, run_checks, CheckOptions};
use crate::compose::{Compositor, RenderOptions};
use crate::hero::HeroImageGenerator;
use crate::overlay::contrasting_text;
use crate::resolve::BaseImageResolver;
use crate::storage::{manifest_key, variant_key, StorageSink, StoredObject};

/// Input for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Raw brief JSON; validated before any work starts.
    pub brief: serde_json::Value,
    pub locale: String,
    /// Uploaded files, keyed by filename.
    pub files: HashMap<String, Bytes>,
    /// Restrict generation to these product ids (partial runs). `None` or
    /// an empty list means the full brief.
    pub product_ids: Option<Vec<String>>,
}

/// The creative generation pipeline, fully assembled. One instance handles
/// one run at a time; all per-run state lives on the stack of [`run`].
///
/// [`run`]: Pipeline::run
pub struct Pipeline {
    config: AppConfig,
    compositor: Compositor,
    resolver: BaseImageResolver,
    sink: Arc<dyn StorageSink>,
}

impl Pipeline {
    /// Assemble the pipeline: build the HTTP client with the configured
    /// fetch deadline and resolve fonts/logo once for the process lifetime.
    pub async fn new(
        config: AppConfig,
        sink: Arc<dyn StorageSink>,
        generator: Arc<dyn HeroImageGenerator>,
    ) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.fetch_timeout_ms))
            .build()
            .map_err(|e| PipelineError::Config(format!("http client: {e}")))?;
        let compositor = Compositor::initialize(&config).await;
        let resolver = BaseImageResolver::new(client, generator, config.theme.palette.clone());
        Ok(Self {
            config,
            compositor,
            resolver,
            sink,
        })
    }

    /// Execute one run to completion. The first fatal error aborts the run
    /// and no manifest is produced.
    pub async fn run(&self, request: RunRequest) -> PipelineResult<RunManifest> {
        let run_id = Uuid::new_v4();
        let RunRequest {
            brief,
            locale,
            files,
            product_ids,
        } = request;

        // Validating
        let brief = parse_brief(brief)?;
        if !brief.locales.contains(&locale) {
            return Err(PipelineError::LocaleNotInBrief(locale));
        }
        let campaign_id = brief.campaign_id.clone();
        let message = brief.resolved_message(&locale).to_string();
        let disclaimer = brief.disclaimer.clone();
        let format = brief.output_format;
        info!(
            %run_id,
            campaign_id = %campaign_id,
            locale = %locale,
            products = brief.products.len(),
            parallel_aspects = self.config.parallel_aspects,
            "pipeline run starting"
        );

        // Prechecking: legal scan prior to any heavy work.
        let prohibited = check_prohibited(&message, &self.config.prohibited_words);
        if !prohibited.is_empty() {
            warn!(%run_id, matches = prohibited.len(), "prohibited terms found, skipping generation");
            return Ok(RunManifest {
                campaign_id,
                locale,
                created_at: Utc::now(),
                variants: Vec::new(),
                precheck: Some(PrecheckReport {
                    legal: LegalCheck {
                        prohibited_words: prohibited,
                    },
                }),
                skipped_generation: Some(true),
                skip_reason: Some(SkipReason::ProhibitedWords),
            });
        }

        // Generating
        let products: Vec<Product> = match &product_ids {
            Some(ids) if !ids.is_empty() => brief
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .cloned()
                .collect(),
            _ => brief.products.clone(),
        };

        let mut variants = Vec::with_capacity(products.len() * AspectKey::ALL.len());
        for product in &products {
            let resolved = self.resolver.resolve(product, &files).await?;

            if self.config.parallel_aspects {
                let mut handles = Vec::with_capacity(AspectKey::ALL.len());
                for aspect in AspectKey::ALL {
                    let task = self.variant_task(
                        product,
                        aspect,
                        resolved.bytes.clone(),
                        resolved.source,
                        &campaign_id,
                        &locale,
                        &message,
                        &disclaimer,
                        format,
                    );
                    handles.push(tokio::spawn(task.run()));
                }
                // Await in aspect order so the manifest keeps stable aspect
                // order regardless of completion order.
                for handle in handles {
                    let variant = handle
                        .await
                        .map_err(|e| PipelineError::Render(format!("aspect task join: {e}")))??;
                    variants.push(variant);
                }
            } else {
                for aspect in AspectKey::ALL {
                    let task = self.variant_task(
                        product,
                        aspect,
                        resolved.bytes.clone(),
                        resolved.source,
                        &campaign_id,
                        &locale,
                        &message,
                        &disclaimer,
                        format,
                    );
                    variants.push(task.run().await?);
                }
            }
            info!(%run_id, product_id = %product.id, "product complete");
        }

        // Persisting: variants were uploaded as they completed; the
        // assembled manifest goes last.
        let manifest = RunManifest {
            campaign_id: campaign_id.clone(),
            locale: locale.clone(),
            created_at: Utc::now(),
            variants,
            precheck: None,
            skipped_generation: None,
            skip_reason: None,
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
        self.sink
            .put(
                &manifest_key(&campaign_id, &locale),
                Bytes::from(manifest_bytes),
                "application/json",
            )
            .await?;

        info!(%run_id, variants = manifest.variants.len(), "pipeline run complete");
        Ok(manifest)
    }

    #[allow(clippy::too_many_arguments)]
    fn variant_task(
        &self,
        product: &Product,
        aspect: AspectKey,
        base: Bytes,
        source: Provenance,
        campaign_id: &str,
        locale: &str,
        message: &str,
        disclaimer: &Option<String>,
        format: OutputFormat,
    ) -> VariantTask {
        VariantTask {
            compositor: self.compositor.clone(),
            sink: Arc::clone(&self.sink),
            prohibited_words: self.config.prohibited_words.clone(),
            theme_primary: self.config.theme.primary.clone(),
            theme_text: self.config.theme.text.clone(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            aspect,
            base,
            source,
            campaign_id: campaign_id.to_string(),
            locale: locale.to_string(),
            message: message.to_string(),
            disclaimer: disclaimer.clone(),
            format,
        }
    }
}

/// One (product, aspect) unit of work. The task owns every buffer it
/// touches, so concurrent tasks share nothing mutable.
struct VariantTask {
    compositor: Compositor,
    sink: Arc<dyn StorageSink>,
    prohibited_words: Vec<String>,
    theme_primary: String,
    theme_text: String,
    product_id: String,
    product_name: String,
    aspect: AspectKey,
    base: Bytes,
    source: Provenance,
    campaign_id: String,
    locale: String,
    message: String,
    disclaimer: Option<String>,
    format: OutputFormat,
}

impl VariantTask {
    /// Render, check, and upload one variant.
    async fn run(self) -> PipelineResult<VariantManifest> {
        let opts = RenderOptions {
            aspect: self.aspect,
            message: self.message.clone(),
            locale: self.locale.clone(),
            disclaimer: self.disclaimer.clone(),
            format: self.format,
        };
        let rendered = self.compositor.render_creative(&self.base, &opts)?;

        let (width, height) = self.aspect.dimensions();
        let text_color = if self.theme_text.is_empty() || self.theme_text == "auto" {
            contrasting_text(&self.theme_primary).to_string()
        } else {
            self.theme_text.clone()
        };
        let checks = run_checks(
            &rendered,
            &CheckOptions {
                text_color: &text_color,
                primary: &self.theme_primary,
                width,
                height,
                message: &self.message,
                prohibited_words: &self.prohibited_words,
            },
        )?;

        let key = variant_key(
            &self.campaign_id,
            &self.locale,
            &self.product_id,
            self.aspect,
            &self.product_name,
            self.format.ext(),
        );
        let StoredObject { key, url } = self
            .sink
            .put(&key, rendered, self.format.content_type())
            .await?;

        Ok(VariantManifest {
            product_id: self.product_id,
            product_name: self.product_name,
            aspect: self.aspect,
            path: key,
            url,
            checks,
            source: self.source,
        })
    }
}
