use serde::Deserialize;

use crate::types::Theme;

/// Root application configuration. Loaded from environment variables with
/// the prefix `SOCIAL_REMIX__` and overridable per-field from the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Render the three aspects of a product concurrently instead of one at
    /// a time. Products are always processed in brief order either way.
    #[serde(default = "default_parallel_aspects")]
    pub parallel_aspects: bool,
    /// Draw a small translucent locale label on each variant.
    #[serde(default = "default_locale_badge")]
    pub locale_badge: bool,
    /// Terms the precheck gate and the legal check scan for.
    #[serde(default = "default_prohibited_words")]
    pub prohibited_words: Vec<String>,
    /// Deadline for remote fetches that have a fallback path.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem sink.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,
    /// Base URL prepended to storage keys to form public URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_api_url")]
    pub api_url: String,
    /// Bearer token for the hero-image service. Empty means unconfigured;
    /// generation requests then fail for the product that needs them.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    #[serde(default = "default_generator_size")]
    pub size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    /// Font file loaded into the rasterizer's font database at startup.
    /// When absent, system fonts are used.
    #[serde(default)]
    pub font_path: Option<String>,
}

// Default functions
fn default_parallel_aspects() -> bool {
    false
}
fn default_locale_badge() -> bool {
    true
}
fn default_prohibited_words() -> Vec<String> {
    [
        // baseline examples; can be extended per-locale
        "hate", "kill", "racist", "sexist", "slur", "violence",
        // typical profanity examples for demo purposes
        "damn", "hell", "shit", "fuck",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_fetch_timeout_ms() -> u64 {
    4_000
}
fn default_storage_root() -> String {
    "out".to_string()
}
fn default_public_base_url() -> String {
    "http://localhost:3000/assets".to_string()
}
fn default_generator_api_url() -> String {
    "https://api.openai.com/v1/images/generations".to_string()
}
fn default_generator_model() -> String {
    "gpt-image-1".to_string()
}
fn default_generator_size() -> String {
    "1024x1024".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            parallel_aspects: default_parallel_aspects(),
            locale_badge: default_locale_badge(),
            prohibited_words: default_prohibited_words(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            theme: Theme::default(),
            storage: StorageConfig::default(),
            generator: GeneratorConfig::default(),
            overlay: OverlayConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: default_generator_api_url(),
            api_key: String::new(),
            model: default_generator_model(),
            size: default_generator_size(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { font_path: None }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SOCIAL_REMIX")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
