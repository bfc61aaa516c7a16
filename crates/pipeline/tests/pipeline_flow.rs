//! End-to-end pipeline flows against the in-memory sink and a stubbed
//! hero-image generator. No network, no real fonts required.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use remix_core::config::AppConfig;
use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::{AspectKey, Provenance, RunManifest, SkipReason};
use remix_pipeline::{
    run_streamed, HeroImageGenerator, MemorySink, Pipeline, PipelineEvent, RunRequest, StorageSink,
};
use serde_json::json;
use tokio_stream::StreamExt;

struct StubGenerator {
    calls: AtomicUsize,
    /// Fail generation when the prompt contains this needle.
    fail_for: Option<String>,
}

impl StubGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_for: None,
        })
    }

    fn failing_for(needle: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_for: Some(needle.to_string()),
        })
    }
}

#[async_trait]
impl HeroImageGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> PipelineResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(needle) = &self.fail_for {
            if prompt.contains(needle) {
                return Err(PipelineError::Generator(format!(
                    "stubbed failure for {needle}"
                )));
            }
        }
        Ok(tiny_png())
    }
}

fn tiny_png() -> Bytes {
    let img = image::RgbaImage::from_pixel(32, 32, image::Rgba([90, 40, 120, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    Bytes::from(out)
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.theme.logo_path = "does/not/exist.svg".to_string();
    config
}

fn sample_brief() -> serde_json::Value {
    json!({
        "campaignId": "summer24",
        "targetRegion": "NA",
        "audience": "runners",
        "locales": ["en", "es"],
        "message": { "default": "Run further this summer" },
        "products": [
            { "id": "p1", "name": "Trail Shoe" },
            { "id": "p2", "name": "Road Shoe" }
        ]
    })
}

async fn build_pipeline(
    config: AppConfig,
    sink: Arc<MemorySink>,
    generator: Arc<StubGenerator>,
) -> Pipeline {
    Pipeline::new(config, sink, generator).await.unwrap()
}

#[tokio::test]
async fn full_run_produces_all_variants() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink.clone(), generator.clone()).await;

    // message.es is absent, so the resolved message falls back to default.
    let manifest = pipeline
        .run(RunRequest {
            brief: sample_brief(),
            locale: "es".to_string(),
            files: HashMap::new(),
            product_ids: None,
        })
        .await
        .unwrap();

    assert_eq!(manifest.campaign_id, "summer24");
    assert_eq!(manifest.locale, "es");
    assert_eq!(manifest.variants.len(), 6);
    assert!(manifest.skipped_generation.is_none());

    // Products in brief order, aspects in table order within each product.
    let order: Vec<(&str, AspectKey)> = manifest
        .variants
        .iter()
        .map(|v| (v.product_id.as_str(), v.aspect))
        .collect();
    assert_eq!(
        order,
        vec![
            ("p1", AspectKey::Square),
            ("p1", AspectKey::Portrait),
            ("p1", AspectKey::Landscape),
            ("p2", AspectKey::Square),
            ("p2", AspectKey::Portrait),
            ("p2", AspectKey::Landscape),
        ]
    );

    for variant in &manifest.variants {
        assert_eq!(variant.source, Provenance::Generated);
        assert!(variant.url.starts_with("memory://generated/summer24/es/"));
        assert!(variant.path.ends_with(".png"));
        assert!(variant.checks.contrast.ratio.is_some());
        assert!(variant.checks.legal.prohibited_words.is_empty());
    }

    // One base image generated per product.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    // 6 variants + 1 manifest persisted, manifest round-trips losslessly.
    assert_eq!(sink.len(), 7);
    let stored = sink
        .get("generated/summer24/manifest-es.json")
        .expect("manifest stored");
    let parsed: RunManifest = serde_json::from_slice(&stored).unwrap();
    assert_eq!(parsed, manifest);
}

#[tokio::test]
async fn uploaded_file_sets_provenance_and_skips_generation() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink, generator.clone()).await;

    let mut brief = sample_brief();
    brief["products"][0]["imageFile"] = json!("Photo.PNG");
    let mut files = HashMap::new();
    files.insert("photo.png".to_string(), tiny_png());

    let manifest = pipeline
        .run(RunRequest {
            brief,
            locale: "en".to_string(),
            files,
            product_ids: None,
        })
        .await
        .unwrap();

    let p1: Vec<_> = manifest
        .variants
        .iter()
        .filter(|v| v.product_id == "p1")
        .collect();
    assert_eq!(p1.len(), 3);
    assert!(p1.iter().all(|v| v.source == Provenance::Uploaded));

    // Only the product without an upload hits the generator.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn prohibited_message_skips_generation_entirely() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink.clone(), generator.clone()).await;

    let mut brief = sample_brief();
    brief["message"] = json!({ "default": "A damn good sale" });

    let manifest = pipeline
        .run(RunRequest {
            brief,
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: None,
        })
        .await
        .unwrap();

    assert_eq!(manifest.skipped_generation, Some(true));
    assert_eq!(manifest.skip_reason, Some(SkipReason::ProhibitedWords));
    assert!(manifest.variants.is_empty());

    let precheck = manifest.precheck.expect("precheck report");
    assert_eq!(precheck.legal.prohibited_words.len(), 1);
    assert_eq!(precheck.legal.prohibited_words[0].word, "damn");
    assert_eq!(precheck.legal.prohibited_words[0].index, 2);

    // No storage work, no generator calls.
    assert!(sink.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn parallel_aspect_fanout_keeps_stable_order() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let mut config = test_config();
    config.parallel_aspects = true;
    let pipeline = build_pipeline(config, sink, generator).await;

    let manifest = pipeline
        .run(RunRequest {
            brief: sample_brief(),
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: None,
        })
        .await
        .unwrap();

    for chunk in manifest.variants.chunks(3) {
        let aspects: Vec<AspectKey> = chunk.iter().map(|v| v.aspect).collect();
        assert_eq!(aspects, AspectKey::ALL.to_vec());
    }
}

#[tokio::test]
async fn unknown_locale_is_rejected_before_any_work() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink.clone(), generator).await;

    let err = pipeline
        .run(RunRequest {
            brief: sample_brief(),
            locale: "fr".to_string(),
            files: HashMap::new(),
            product_ids: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::LocaleNotInBrief(_)));
    assert!(sink.is_empty());
}

#[tokio::test]
async fn product_subset_restricts_generation() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink, generator).await;

    let manifest = pipeline
        .run(RunRequest {
            brief: sample_brief(),
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: Some(vec!["p2".to_string()]),
        })
        .await
        .unwrap();

    assert_eq!(manifest.variants.len(), 3);
    assert!(manifest.variants.iter().all(|v| v.product_id == "p2"));
}

#[tokio::test]
async fn jpeg_output_format_flows_through_to_storage() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = build_pipeline(test_config(), sink.clone(), generator).await;

    let mut brief = sample_brief();
    brief["outputFormat"] = json!("jpeg");

    let manifest = pipeline
        .run(RunRequest {
            brief,
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: Some(vec!["p1".to_string()]),
        })
        .await
        .unwrap();

    for variant in &manifest.variants {
        assert!(variant.path.ends_with(".jpeg"), "path was {}", variant.path);
        assert_eq!(
            sink.content_type(&variant.path).as_deref(),
            Some("image/jpeg")
        );
    }
}

#[tokio::test]
async fn streamed_run_emits_ordered_events() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = Arc::new(build_pipeline(test_config(), sink, generator).await);

    let stream = run_streamed(
        pipeline,
        RunRequest {
            brief: sample_brief(),
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: None,
        },
    );
    let events: Vec<PipelineEvent> = stream.collect().await;

    assert_eq!(events.len(), 5);
    assert!(matches!(events[0], PipelineEvent::Init { ok: true }));
    match &events[1] {
        PipelineEvent::Progress { product_id, status } => {
            assert_eq!(product_id, "p1");
            assert_eq!(status, "started");
        }
        other => panic!("expected progress, got {other:?}"),
    }
    match &events[2] {
        PipelineEvent::Product {
            product_id,
            manifest,
        } => {
            assert_eq!(product_id, "p1");
            assert_eq!(manifest.variants.len(), 3);
            assert!(manifest.variants.iter().all(|v| v.product_id == "p1"));
        }
        other => panic!("expected product, got {other:?}"),
    }
    match &events[3] {
        PipelineEvent::Progress { product_id, .. } => assert_eq!(product_id, "p2"),
        other => panic!("expected progress, got {other:?}"),
    }
    assert!(matches!(events[4], PipelineEvent::Product { .. }));
}

#[tokio::test]
async fn streamed_run_isolates_per_product_failures() {
    let sink = Arc::new(MemorySink::new());
    // Generation fails only for the second product.
    let generator = StubGenerator::failing_for("Road Shoe");
    let pipeline = Arc::new(build_pipeline(test_config(), sink, generator).await);

    let stream = run_streamed(
        pipeline,
        RunRequest {
            brief: sample_brief(),
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: None,
        },
    );
    let events: Vec<PipelineEvent> = stream.collect().await;

    // init, p1 started, p1 product, p2 started, p2 error — then clean end.
    assert_eq!(events.len(), 5);
    assert!(matches!(&events[2], PipelineEvent::Product { product_id, .. } if product_id == "p1"));
    match &events[4] {
        PipelineEvent::Error {
            product_id,
            message,
        } => {
            assert_eq!(product_id.as_deref(), Some("p2"));
            assert!(message.contains("stubbed failure"), "{message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn streamed_run_reports_invalid_brief_once() {
    let sink = Arc::new(MemorySink::new());
    let generator = StubGenerator::new();
    let pipeline = Arc::new(build_pipeline(test_config(), sink, generator).await);

    let stream = run_streamed(
        pipeline,
        RunRequest {
            brief: json!({ "campaignId": "x" }),
            locale: "en".to_string(),
            files: HashMap::new(),
            product_ids: None,
        },
    );
    let events: Vec<PipelineEvent> = stream.collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        PipelineEvent::Error { product_id: None, .. }
    ));
}

#[tokio::test]
async fn storage_healthcheck_round_trips() {
    let sink = MemorySink::new();
    sink.healthcheck().await.unwrap();
    assert_eq!(sink.len(), 1);
}
