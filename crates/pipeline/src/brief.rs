//! Brief validation: arbitrary JSON in, fully-typed [`Brief`] out, or a
//! validation error naming the first schema violation. Boundary data is
//! rejected here so every later stage can trust its inputs.

use std::collections::HashSet;

use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::Brief;
use url::Url;

pub fn parse_brief(value: serde_json::Value) -> PipelineResult<Brief> {
    let brief: Brief =
        serde_json::from_value(value).map_err(|e| PipelineError::Validation(e.to_string()))?;
    validate(&brief)?;
    Ok(brief)
}

fn validate(brief: &Brief) -> PipelineResult<()> {
    require(
        !brief.campaign_id.trim().is_empty(),
        "campaignId must be a non-empty string",
    )?;
    require(
        !brief.target_region.trim().is_empty(),
        "targetRegion must be a non-empty string",
    )?;
    require(
        !brief.audience.trim().is_empty(),
        "audience must be a non-empty string",
    )?;
    require(!brief.locales.is_empty(), "locales must not be empty")?;
    for locale in &brief.locales {
        require(
            !locale.trim().is_empty(),
            "locales entries must be non-empty strings",
        )?;
    }

    match brief.message.get("default") {
        Some(default) if !default.trim().is_empty() => {}
        _ => {
            return Err(PipelineError::Validation(
                "message.default is required and must be non-empty".to_string(),
            ))
        }
    }
    for (key, value) in &brief.message {
        if value.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "message.{key} must be a non-empty string"
            )));
        }
    }

    require(
        brief.products.len() >= 2,
        "products must contain at least 2 entries",
    )?;
    let mut seen = HashSet::new();
    for product in &brief.products {
        require(!product.id.trim().is_empty(), "product id must be non-empty")?;
        if product.name.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "product {} name must be non-empty",
                product.id
            )));
        }
        if !seen.insert(product.id.as_str()) {
            return Err(PipelineError::Validation(format!(
                "duplicate product id {}",
                product.id
            )));
        }
        if let Some(image_url) = &product.image_url {
            let parsed = Url::parse(image_url).map_err(|e| {
                PipelineError::Validation(format!(
                    "product {} imageUrl is not a valid URL: {e}",
                    product.id
                ))
            })?;
            require(
                matches!(parsed.scheme(), "http" | "https"),
                &format!("product {} imageUrl must be http(s)", product.id),
            )?;
        }
    }

    Ok(())
}

fn require(condition: bool, message: &str) -> PipelineResult<()> {
    if condition {
        Ok(())
    } else {
        Err(PipelineError::Validation(message.to_string()))
    }
}
