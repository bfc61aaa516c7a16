//! Social Remix — creative generation pipeline runner.
//!
//! Loads a campaign brief and an optional assets directory, runs the
//! pipeline, and prints the run manifest (or streams per-product events as
//! JSON lines). The `overlay` subcommand renders the text overlay on its
//! own for quick visual debugging.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use remix_core::types::AspectKey;
use remix_core::AppConfig;
use remix_pipeline::overlay::{build_overlay_svg, OverlayInput};
use remix_pipeline::{
    run_streamed, Compositor, FsSink, OpenAiImageGenerator, Pipeline, RunRequest,
};
use tokio_stream::StreamExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "social-remix")]
#[command(about = "Generate branded, locale-specific creatives from a campaign brief")]
#[command(version)]
struct Cli {
    /// Campaign brief JSON file
    #[arg(long, default_value = "briefs/sample.campaign.json")]
    brief: PathBuf,

    /// Directory of uploaded product images
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Locale to generate for (must be listed in the brief)
    #[arg(long, default_value = "en")]
    locale: String,

    /// Comma-separated product ids to restrict the run to
    #[arg(long)]
    products: Option<String>,

    /// Emit per-product progress events as JSON lines instead of a single
    /// manifest
    #[arg(long, default_value_t = false)]
    stream: bool,

    /// Render the three aspects of each product concurrently
    #[arg(long, env = "SOCIAL_REMIX__PARALLEL_ASPECTS", default_value_t = false)]
    parallel_aspects: bool,

    /// Output directory for the filesystem sink (overrides config)
    #[arg(long, env = "SOCIAL_REMIX__STORAGE__ROOT_DIR")]
    out_dir: Option<String>,

    /// Hero-image generator API key (overrides config)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the overlay alone, as SVG or PNG
    Overlay {
        /// Aspect: 1x1, 9x16, or 16x9
        #[arg(long, default_value = "1x1")]
        aspect: String,

        /// Message text
        #[arg(long, default_value = "Hello from Social Remix")]
        msg: String,

        /// Disclaimer text
        #[arg(long)]
        disc: Option<String>,

        /// Output format: svg or png
        #[arg(long, default_value = "svg")]
        format: String,

        /// Output file for png (svg prints to stdout)
        #[arg(long, default_value = "overlay.png")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_remix=info,remix_pipeline=info".into()),
        )
        .json()
        .init();

    let mut cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if cli.parallel_aspects {
        config.parallel_aspects = true;
    }
    if let Some(out_dir) = &cli.out_dir {
        config.storage.root_dir = out_dir.clone();
    }
    if let Some(api_key) = &cli.api_key {
        config.generator.api_key = api_key.clone();
    }

    match cli.command.take() {
        Some(Command::Overlay {
            aspect,
            msg,
            disc,
            format,
            out,
        }) => render_overlay(&config, &aspect, &msg, disc.as_deref(), &format, &out).await,
        None => run_pipeline(&cli, config).await,
    }
}

async fn run_pipeline(cli: &Cli, config: AppConfig) -> anyhow::Result<()> {
    let brief_text = tokio::fs::read_to_string(&cli.brief)
        .await
        .with_context(|| format!("reading brief {}", cli.brief.display()))?;
    let brief: serde_json::Value =
        serde_json::from_str(&brief_text).context("brief is not valid JSON")?;

    let files = match &cli.assets {
        Some(dir) => load_assets(dir).await?,
        None => HashMap::new(),
    };
    info!(files = files.len(), locale = %cli.locale, "starting run");

    let product_ids = cli.products.as_ref().map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
    });

    let sink = Arc::new(FsSink::new(
        config.storage.root_dir.clone(),
        config.storage.public_base_url.clone(),
    ));
    let generator = Arc::new(OpenAiImageGenerator::new(
        reqwest::Client::new(),
        config.generator.clone(),
    ));
    let pipeline = Pipeline::new(config, sink, generator).await?;

    let request = RunRequest {
        brief,
        locale: cli.locale.clone(),
        files,
        product_ids,
    };

    if cli.stream {
        let mut events = run_streamed(Arc::new(pipeline), request);
        while let Some(event) = events.next().await {
            println!("{}", serde_json::to_string(&event)?);
        }
    } else {
        let manifest = pipeline.run(request).await?;
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    }

    Ok(())
}

async fn load_assets(dir: &PathBuf) -> anyhow::Result<HashMap<String, Bytes>> {
    let mut files = HashMap::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading assets dir {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            let name = entry.file_name().to_string_lossy().to_string();
            let bytes = tokio::fs::read(entry.path()).await?;
            files.insert(name, Bytes::from(bytes));
        }
    }
    Ok(files)
}

async fn render_overlay(
    config: &AppConfig,
    aspect: &str,
    msg: &str,
    disc: Option<&str>,
    format: &str,
    out: &PathBuf,
) -> anyhow::Result<()> {
    let aspect = match aspect {
        "1x1" => AspectKey::Square,
        "9x16" => AspectKey::Portrait,
        "16x9" => AspectKey::Landscape,
        other => anyhow::bail!("unknown aspect {other} (expected 1x1, 9x16, or 16x9)"),
    };
    let (width, height) = aspect.dimensions();
    let input = OverlayInput {
        width,
        height,
        message: msg,
        locale: "en",
        disclaimer: disc,
        theme: &config.theme,
        locale_badge: config.locale_badge,
    };

    match format {
        "svg" => {
            println!("{}", build_overlay_svg(&input));
        }
        "png" => {
            let compositor = Compositor::initialize(config).await;
            let png = compositor.render_overlay_png(&input)?;
            tokio::fs::write(out, &png)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            info!(path = %out.display(), size = png.len(), "overlay written");
        }
        other => anyhow::bail!("unknown format {other} (expected svg or png)"),
    }

    Ok(())
}
