//! Pixel-space half of the overlay compositor: content-aware cover crop of
//! the base image, overlay rasterization, logo placement, and final encode.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, Rgba, RgbaImage};
use remix_core::config::AppConfig;
use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::{AspectKey, OutputFormat, Theme};
use resvg::{tiny_skia, usvg};
use tracing::{debug, warn};

use crate::overlay::{
    band_height, build_overlay_svg, contrasting_text, font_size, parse_hex, wrap_text_lines,
    OverlayInput,
};

const LOGO_PADDING: i64 = 20;

/// Options for rendering one (base image, aspect) pair.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub aspect: AspectKey,
    pub message: String,
    pub locale: String,
    pub disclaimer: Option<String>,
    pub format: OutputFormat,
}

/// Produces brand-finished pixel bytes for one variant.
///
/// Holds everything resolved at orchestrator startup: the theme, the font
/// database for the vector rasterizer, and the logo bytes (if the asset
/// exists). Cheap to clone; the font database is shared.
#[derive(Clone)]
pub struct Compositor {
    theme: Theme,
    locale_badge: bool,
    fonts: Arc<usvg::fontdb::Database>,
    logo: Option<Bytes>,
}

impl Compositor {
    /// Resolve fonts and the logo asset once, at startup. Missing assets
    /// are tolerated and logged.
    pub async fn initialize(config: &AppConfig) -> Self {
        let mut fonts = usvg::fontdb::Database::new();
        if let Some(path) = &config.overlay.font_path {
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    debug!(path = %path, size = bytes.len(), "loaded overlay font");
                    fonts.load_font_data(bytes);
                }
                Err(e) => warn!(path = %path, error = %e, "overlay font unavailable, falling back to system fonts"),
            }
        }
        fonts.load_system_fonts();

        let logo = match tokio::fs::read(&config.theme.logo_path).await {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(e) => {
                warn!(path = %config.theme.logo_path, error = %e, "logo asset missing, compositing without it");
                None
            }
        };

        Self {
            theme: config.theme.clone(),
            locale_badge: config.locale_badge,
            fonts: Arc::new(fonts),
            logo,
        }
    }

    /// Render one finished creative: cover-crop the base image to the
    /// canvas, rasterize the overlay on top, stamp the logo, and encode.
    pub fn render_creative(
        &self,
        base_image: &[u8],
        opts: &RenderOptions,
    ) -> PipelineResult<Bytes> {
        let (width, height) = opts.aspect.dimensions();
        let input = OverlayInput {
            width,
            height,
            message: &opts.message,
            locale: &opts.locale,
            disclaimer: opts.disclaimer.as_deref(),
            theme: &self.theme,
            locale_badge: self.locale_badge,
        };
        let svg = build_overlay_svg(&input);
        let overlay_raster = match self.rasterize_svg(&svg, width, height) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "vector rasterization failed, using fallback raster");
                raster_fallback(&input)
            }
        };

        let base = image::load_from_memory(base_image)
            .map_err(|e| PipelineError::Render(format!("base image decode: {e}")))?;
        let mut canvas = cover_crop_entropy(&base, width, height);
        imageops::overlay(&mut canvas, &overlay_raster, 0, 0);

        if let Some(logo) = self.prepare_logo(width) {
            imageops::overlay(&mut canvas, &logo, LOGO_PADDING, LOGO_PADDING);
        }

        encode_output(canvas, opts.format)
    }

    /// Rasterize an overlay document to PNG at the aspect's canvas size.
    /// Used by the debug overlay preview.
    pub fn render_overlay_png(&self, input: &OverlayInput<'_>) -> PipelineResult<Bytes> {
        let svg = build_overlay_svg(input);
        let raster = match self.rasterize_svg(&svg, input.width, input.height) {
            Ok(img) => img,
            Err(e) => {
                warn!(error = %e, "vector rasterization failed, using fallback raster");
                raster_fallback(input)
            }
        };
        encode_output(raster, OutputFormat::Png)
    }

    fn rasterize_svg(&self, svg: &str, width: u32, height: u32) -> PipelineResult<RgbaImage> {
        let mut options = usvg::Options::default();
        options.fontdb = self.fonts.clone();
        let tree = usvg::Tree::from_str(svg, &options)
            .map_err(|e| PipelineError::Render(format!("overlay svg parse: {e}")))?;
        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| PipelineError::Render("zero-sized overlay canvas".to_string()))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        pixmap_to_rgba(pixmap)
            .ok_or_else(|| PipelineError::Render("overlay pixmap conversion".to_string()))
    }

    /// Logo scaled to at most ~14% of canvas width (clamped to 240..320 px).
    /// Any preparation failure skips the logo rather than failing the
    /// variant.
    fn prepare_logo(&self, canvas_width: u32) -> Option<RgbaImage> {
        let bytes = self.logo.as_ref()?;
        let max_logo_width = (f64::from(canvas_width) * 0.14).round() as u32;
        let target_width = max_logo_width.clamp(240, 320);
        let prepared = if looks_like_svg(bytes) {
            self.rasterize_logo_svg(bytes, target_width)
        } else {
            decode_logo_raster(bytes, target_width)
        };
        match prepared {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(error = %e, "logo could not be prepared, skipping");
                None
            }
        }
    }

    fn rasterize_logo_svg(&self, bytes: &[u8], target_width: u32) -> PipelineResult<RgbaImage> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::Render(format!("logo svg is not utf-8: {e}")))?;
        let mut options = usvg::Options::default();
        options.fontdb = self.fonts.clone();
        let tree = usvg::Tree::from_str(text, &options)
            .map_err(|e| PipelineError::Render(format!("logo svg parse: {e}")))?;
        let size = tree.size();
        if size.width() <= 0.0 {
            return Err(PipelineError::Render("logo svg has zero width".to_string()));
        }
        let scale = target_width as f32 / size.width();
        let target_height = ((size.height() * scale).ceil() as u32).max(1);
        let mut pixmap = tiny_skia::Pixmap::new(target_width, target_height)
            .ok_or_else(|| PipelineError::Render("zero-sized logo pixmap".to_string()))?;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );
        pixmap_to_rgba(pixmap)
            .ok_or_else(|| PipelineError::Render("logo pixmap conversion".to_string()))
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}

fn decode_logo_raster(bytes: &[u8], target_width: u32) -> PipelineResult<RgbaImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| PipelineError::Render(format!("logo decode: {e}")))?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(PipelineError::Render("logo has zero dimensions".to_string()));
    }
    let target_height = ((f64::from(h) * f64::from(target_width) / f64::from(w)).round() as u32).max(1);
    Ok(img
        .resize_exact(target_width, target_height, FilterType::Triangle)
        .to_rgba8())
}

/// Convert a premultiplied-alpha pixmap into a straight-alpha image buffer.
fn pixmap_to_rgba(pixmap: tiny_skia::Pixmap) -> Option<RgbaImage> {
    let width = pixmap.width();
    let height = pixmap.height();
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for px in pixmap.pixels() {
        let c = px.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    RgbaImage::from_raw(width, height, data)
}

/// Resize the base image to cover the canvas, then crop the overflow axis
/// to the most "informative" window — the one with the highest grayscale
/// histogram entropy — instead of naively center-cropping.
pub(crate) fn cover_crop_entropy(img: &DynamicImage, target_w: u32, target_h: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return RgbaImage::from_pixel(target_w, target_h, Rgba([0, 0, 0, 255]));
    }
    let scale = (f64::from(target_w) / f64::from(w)).max(f64::from(target_h) / f64::from(h));
    let resized_w = ((f64::from(w) * scale).ceil() as u32).max(target_w);
    let resized_h = ((f64::from(h) * scale).ceil() as u32).max(target_h);
    let resized = img
        .resize_exact(resized_w, resized_h, FilterType::Triangle)
        .to_rgba8();
    if resized_w == target_w && resized_h == target_h {
        return resized;
    }

    let gray = imageops::grayscale(&resized);
    let h_span = resized_w - target_w;
    let v_span = resized_h - target_h;
    let (x, y) = if h_span >= v_span {
        let fixed = v_span / 2;
        (
            best_offset(&gray, h_span, true, fixed, target_w, target_h),
            fixed,
        )
    } else {
        let fixed = h_span / 2;
        (
            fixed,
            best_offset(&gray, v_span, false, fixed, target_w, target_h),
        )
    };
    imageops::crop_imm(&resized, x, y, target_w, target_h).to_image()
}

fn best_offset(
    gray: &GrayImage,
    span: u32,
    horizontal: bool,
    fixed: u32,
    window_w: u32,
    window_h: u32,
) -> u32 {
    let step = (span / 8).max(1);
    let mut offsets: Vec<u32> = (0..=span).step_by(step as usize).collect();
    if offsets.last() != Some(&span) {
        offsets.push(span);
    }
    let mut best = 0u32;
    let mut best_entropy = f64::MIN;
    for off in offsets {
        let (x, y) = if horizontal { (off, fixed) } else { (fixed, off) };
        let entropy = window_entropy(gray, x, y, window_w, window_h);
        if entropy > best_entropy {
            best_entropy = entropy;
            best = off;
        }
    }
    best
}

/// Shannon entropy of a 64-bin luma histogram over the window, sampling
/// every other pixel.
fn window_entropy(gray: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
    let mut hist = [0u32; 64];
    let mut total = 0u64;
    let mut y = y0;
    while y < y0 + h {
        let mut x = x0;
        while x < x0 + w {
            hist[(gray.get_pixel(x, y)[0] >> 2) as usize] += 1;
            total += 1;
            x += 2;
        }
        y += 2;
    }
    if total == 0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for count in hist {
        if count > 0 {
            let p = f64::from(count) / total as f64;
            entropy -= p * p.log2();
        }
    }
    entropy
}

/// Lower-fidelity overlay raster used when the vector engine is
/// unavailable: solid band plus translucent strips approximating the text
/// runs.
pub(crate) fn raster_fallback(input: &OverlayInput<'_>) -> RgbaImage {
    let (w, h) = (input.width, input.height);
    let mut img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
    let band = band_height(h).min(h);
    let (pr, pg, pb) = parse_hex(&input.theme.primary).unwrap_or((0xa1, 0x3a, 0x5a));
    for y in h - band..h {
        for x in 0..w {
            img.put_pixel(x, y, Rgba([pr, pg, pb, 255]));
        }
    }

    let font = font_size(h);
    let text_color = if !input.theme.text.is_empty() && input.theme.text != "auto" {
        input.theme.text.clone()
    } else {
        contrasting_text(&input.theme.primary).to_string()
    };
    let (tr, tg, tb) = parse_hex(&text_color).unwrap_or((255, 255, 255));
    let padding = 32u32;
    let content_width = w.saturating_sub(padding * 2);
    let lines = wrap_text_lines(input.message, content_width, font);
    let line_step = (f64::from(font) * 1.25).round() as u32;
    let strip_height = (f64::from(font) * 0.72).round() as u32;
    for (i, line) in lines.iter().enumerate() {
        let baseline = h - band + padding + font + i as u32 * line_step;
        if baseline > h {
            break;
        }
        let Some(top) = baseline.checked_sub(strip_height) else {
            continue;
        };
        let strip_width = ((line.chars().count() as f64 * f64::from(font) * 0.55).round() as u32)
            .min(content_width);
        for y in top..baseline.min(h) {
            for x in padding..(padding + strip_width).min(w) {
                img.put_pixel(x, y, Rgba([tr, tg, tb, 216]));
            }
        }
    }
    img
}

fn encode_output(img: RgbaImage, format: OutputFormat) -> PipelineResult<Bytes> {
    let mut out = Vec::new();
    match format {
        OutputFormat::Png => {
            DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                .map_err(|e| PipelineError::Render(format!("png encode: {e}")))?;
        }
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let mut cursor = Cursor::new(&mut out);
            let mut encoder = JpegEncoder::new_with_quality(&mut cursor, 90);
            encoder
                .encode_image(&rgb)
                .map_err(|e| PipelineError::Render(format!("jpeg encode: {e}")))?;
        }
    }
    Ok(Bytes::from(out))
}
