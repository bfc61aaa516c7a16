use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Brief ──────────────────────────────────────────────────────────────

/// A campaign brief: everything one generation run needs as input.
///
/// Parsed fresh per run and never mutated. JSON field names are camelCase
/// to match the brief files produced by campaign tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub campaign_id: String,
    pub target_region: String,
    pub audience: String,
    pub locales: Vec<String>,
    /// Message map: a mandatory `default` entry plus optional per-locale
    /// overrides keyed by locale code.
    pub message: BTreeMap<String, String>,
    /// Optional legal disclaimer rendered smaller under the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    pub products: Vec<Product>,
}

impl Brief {
    /// The message for `locale`, falling back to the `default` entry.
    pub fn resolved_message(&self, locale: &str) -> &str {
        self.message
            .get(locale)
            .or_else(|| self.message.get("default"))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// A single product within a brief.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Filename of an uploaded base image, matched against the run's file set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
    /// Remote base-image URL, fetched when no upload matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Output encoding for rendered variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn ext(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

// ─── Aspects ────────────────────────────────────────────────────────────

/// One of the three fixed target canvases. The set is closed and does not
/// vary per brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectKey {
    #[serde(rename = "1x1")]
    Square,
    #[serde(rename = "9x16")]
    Portrait,
    #[serde(rename = "16x9")]
    Landscape,
}

impl AspectKey {
    /// All aspects, in the order variants are generated and appended.
    pub const ALL: [AspectKey; 3] = [Self::Square, Self::Portrait, Self::Landscape];

    /// Canvas size in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (1080, 1080),
            Self::Portrait => (1080, 1920),
            Self::Landscape => (1920, 1080),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1x1",
            Self::Portrait => "9x16",
            Self::Landscape => "16x9",
        }
    }
}

impl fmt::Display for AspectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Theme ──────────────────────────────────────────────────────────────

/// Brand theme applied to every variant. A deployment constant carried in
/// configuration, not part of the brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    /// Band background color as `#rrggbb`.
    #[serde(default = "default_primary")]
    pub primary: String,
    /// Text color as `#rrggbb`, or `auto` to derive it from the band
    /// background luminance.
    #[serde(default = "default_text")]
    pub text: String,
    /// Canvas backdrop behind the base image; `transparent` leaves it out.
    #[serde(default = "default_bg")]
    pub bg: String,
    /// Logo asset path on disk. A missing file is tolerated.
    #[serde(default = "default_logo_path")]
    pub logo_path: String,
    /// Color vocabulary used in the hero-image generation prompt.
    #[serde(default = "default_palette")]
    pub palette: String,
}

fn default_primary() -> String {
    "#a13a5a".to_string()
}
fn default_text() -> String {
    "auto".to_string()
}
fn default_bg() -> String {
    "transparent".to_string()
}
fn default_logo_path() -> String {
    "public/socialremix_logo.svg".to_string()
}
fn default_palette() -> String {
    "maroon/pink neutrals".to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            text: default_text(),
            bg: default_bg(),
            logo_path: default_logo_path(),
            palette: default_palette(),
        }
    }
}

// ─── Checks ─────────────────────────────────────────────────────────────

/// A single pass/fail flag with optional detail text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFlag {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckFlag {
    pub fn pass() -> Self {
        Self { ok: true, detail: None }
    }
}

/// Contrast outcome: boolean plus the measured ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastCheck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A prohibited term found in the message, with the first occurrence offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProhibitedMatch {
    pub word: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalCheck {
    pub prohibited_words: Vec<ProhibitedMatch>,
}

/// Per-variant quality/compliance outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub logo: CheckFlag,
    pub brand_colors: CheckFlag,
    pub contrast: ContrastCheck,
    pub safe_area: CheckFlag,
    pub legal: LegalCheck,
}

// ─── Manifests ──────────────────────────────────────────────────────────

/// Where a variant's base image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Uploaded,
    Generated,
    Url,
}

/// One rendered creative for a specific (product, aspect) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantManifest {
    pub product_id: String,
    pub product_name: String,
    pub aspect: AspectKey,
    /// Storage key of the uploaded variant.
    pub path: String,
    pub url: String,
    pub checks: CheckResult,
    pub source: Provenance,
}

/// Reason a run was skipped before any rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    #[serde(rename = "prohibited-words")]
    ProhibitedWords,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecheckReport {
    pub legal: LegalCheck,
}

/// The structured output record of one run: every variant produced, or a
/// skip reason when the precheck gate tripped. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub campaign_id: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
    pub variants: Vec<VariantManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precheck: Option<PrecheckReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_generation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}
