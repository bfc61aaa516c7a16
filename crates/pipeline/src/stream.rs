//! Streaming progress: per-product events instead of a single terminal
//! result, for the multi-product case.

use std::sync::Arc;

use remix_core::types::RunManifest;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::brief::parse_brief;
use crate::orchestrator::{Pipeline, RunRequest};

/// A typed progress event, serialized as `{"event": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum PipelineEvent {
    Init {
        ok: bool,
    },
    Progress {
        product_id: String,
        status: String,
    },
    /// One product finished: carries that product's own manifest slice.
    Product {
        product_id: String,
        manifest: RunManifest,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_id: Option<String>,
        message: String,
    },
}

/// Run the pipeline one product at a time, emitting events as each product
/// finishes.
///
/// Ordering guarantee: events for product N (`started` followed by
/// `product` or `error`) are fully emitted before product N+1's `started`.
/// A failing product is reported and does not stop the rest; the stream
/// always terminates after the last product.
pub fn run_streamed(pipeline: Arc<Pipeline>, request: RunRequest) -> ReceiverStream<PipelineEvent> {
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        let RunRequest {
            brief,
            locale,
            files,
            product_ids,
        } = request;

        // Validate once up front: a malformed brief is a single error
        // event, not one per product.
        let parsed = match parse_brief(brief.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                let _ = tx
                    .send(PipelineEvent::Error {
                        product_id: None,
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        if tx.send(PipelineEvent::Init { ok: true }).await.is_err() {
            return;
        }

        let selected: Vec<String> = match &product_ids {
            Some(ids) if !ids.is_empty() => parsed
                .products
                .iter()
                .filter(|p| ids.contains(&p.id))
                .map(|p| p.id.clone())
                .collect(),
            _ => parsed.products.iter().map(|p| p.id.clone()).collect(),
        };

        for product_id in selected {
            let started = PipelineEvent::Progress {
                product_id: product_id.clone(),
                status: "started".to_string(),
            };
            if tx.send(started).await.is_err() {
                return;
            }

            let request = RunRequest {
                brief: brief.clone(),
                locale: locale.clone(),
                files: files.clone(),
                product_ids: Some(vec![product_id.clone()]),
            };
            let event = match pipeline.run(request).await {
                Ok(manifest) => PipelineEvent::Product {
                    product_id: product_id.clone(),
                    manifest,
                },
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "product failed during streamed run");
                    PipelineEvent::Error {
                        product_id: Some(product_id.clone()),
                        message: e.to_string(),
                    }
                }
            };
            if tx.send(event).await.is_err() {
                return;
            }
        }
    });

    ReceiverStream::new(rx)
}
