//! Legal precheck and per-variant quality checks.
//!
//! The prohibited-term scan runs twice per run with identical semantics:
//! once before any rendering work (the gate) and once more per finished
//! variant as part of [`run_checks`].

use remix_core::error::{PipelineError, PipelineResult};
use remix_core::types::{CheckFlag, CheckResult, ContrastCheck, LegalCheck, ProhibitedMatch};
use tracing::debug;

use crate::overlay::hex_luminance;

/// Case-insensitive substring scan. Records the first occurrence offset of
/// each configured term; later occurrences are ignored.
pub fn check_prohibited(message: &str, words: &[String]) -> Vec<ProhibitedMatch> {
    let lower = message.to_lowercase();
    let mut found = Vec::new();
    for word in words {
        let needle = word.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if let Some(index) = lower.find(&needle) {
            found.push(ProhibitedMatch {
                word: word.clone(),
                index,
            });
        }
    }
    found
}

/// Parameters of the variant under inspection.
#[derive(Debug)]
pub struct CheckOptions<'a> {
    pub text_color: &'a str,
    pub primary: &'a str,
    pub width: u32,
    pub height: u32,
    pub message: &'a str,
    pub prohibited_words: &'a [String],
}

/// Inspect a finished variant.
///
/// The contrast check samples a thin column inside the band near its left
/// edge, averages per-pixel luminance, and compares it against the text
/// color with the `(L1 + 0.05) / (L2 + 0.05)` ratio. The 3.0 threshold is
/// deliberately relaxed for large display text. Logo, brand-color, and
/// safe-area flags trust the compositor.
pub fn run_checks(output_image: &[u8], options: &CheckOptions<'_>) -> PipelineResult<CheckResult> {
    let logo = CheckFlag::pass();
    let brand_colors = CheckFlag::pass();

    let img = image::load_from_memory(output_image)
        .map_err(|e| PipelineError::Render(format!("variant decode for checks: {e}")))?
        .to_rgba8();

    let band_top = (f64::from(options.height) * 0.84).round() as u32;
    let sample_height = options
        .height
        .saturating_sub(band_top)
        .saturating_sub(10)
        .max(1);

    let x_end = 20.min(img.width());
    let y_end = (band_top + sample_height).min(img.height());
    let mut luminance_sum = 0.0;
    let mut samples = 0u32;
    for y in band_top.min(img.height())..y_end {
        for x in 10.min(img.width())..x_end {
            let p = img.get_pixel(x, y);
            luminance_sum += 0.2126 * f64::from(p[0]) / 255.0
                + 0.7152 * f64::from(p[1]) / 255.0
                + 0.0722 * f64::from(p[2]) / 255.0;
            samples += 1;
        }
    }
    let band_luminance = luminance_sum / f64::from(samples.max(1));
    let text_luminance = hex_luminance(options.text_color);
    let ratio = (band_luminance.max(text_luminance) + 0.05)
        / (band_luminance.min(text_luminance) + 0.05);
    let ratio = (ratio * 100.0).round() / 100.0;
    debug!(
        primary = options.primary,
        band_luminance, text_luminance, ratio, "contrast sample"
    );
    let contrast = ContrastCheck {
        ok: ratio >= 3.0,
        ratio: Some(ratio),
        detail: None,
    };

    // Band padding keeps text clear of the edges; trusted here.
    let safe_area = CheckFlag::pass();

    let legal = LegalCheck {
        prohibited_words: check_prohibited(options.message, options.prohibited_words),
    };

    Ok(CheckResult {
        logo,
        brand_colors,
        contrast,
        safe_area,
        legal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clean_message_has_no_matches() {
        let found = check_prohibited("Fresh styles for spring", &words(&["damn", "hate"]));
        assert!(found.is_empty());
    }

    #[test]
    fn scan_reports_first_occurrence_offset() {
        let found = check_prohibited("well damn, damn again", &words(&["damn"]));
        assert_eq!(
            found,
            vec![ProhibitedMatch {
                word: "damn".to_string(),
                index: 5
            }]
        );
    }

    #[test]
    fn scan_is_case_insensitive() {
        let found = check_prohibited("This is HELL on wheels", &words(&["hell"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 8);
    }

    #[test]
    fn scan_matches_substrings() {
        // Substring semantics, deliberately: "hell" inside "hello".
        let found = check_prohibited("hello there", &words(&["hell"]));
        assert_eq!(found[0].index, 0);
    }

    fn encoded_band_image(width: u32, height: u32, band_color: Rgba<u8>) -> Vec<u8> {
        let band_top = (f64::from(height) * 0.84).round() as u32;
        let mut img = RgbaImage::from_pixel(width, height, Rgba([120, 120, 120, 255]));
        for y in band_top..height {
            for x in 0..width {
                img.put_pixel(x, y, band_color);
            }
        }
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn dark_band_with_light_text_passes_contrast() {
        let bytes = encoded_band_image(200, 200, Rgba([0, 0, 0, 255]));
        let result = run_checks(
            &bytes,
            &CheckOptions {
                text_color: "#ffffff",
                primary: "#000000",
                width: 200,
                height: 200,
                message: "hello",
                prohibited_words: &[],
            },
        )
        .unwrap();
        // (1.0 + 0.05) / (0.0 + 0.05) = 21
        assert!(result.contrast.ok);
        assert!((result.contrast.ratio.unwrap() - 21.0).abs() < 0.01);
        assert!(result.logo.ok && result.brand_colors.ok && result.safe_area.ok);
    }

    #[test]
    fn white_band_with_white_text_fails_contrast() {
        let bytes = encoded_band_image(200, 200, Rgba([255, 255, 255, 255]));
        let result = run_checks(
            &bytes,
            &CheckOptions {
                text_color: "#ffffff",
                primary: "#ffffff",
                width: 200,
                height: 200,
                message: "hello",
                prohibited_words: &[],
            },
        )
        .unwrap();
        assert!(!result.contrast.ok);
        assert!((result.contrast.ratio.unwrap() - 1.0).abs() < 0.01);
    }

    #[test]
    fn legal_check_reuses_precheck_semantics() {
        let bytes = encoded_band_image(100, 100, Rgba([0, 0, 0, 255]));
        let list = words(&["damn"]);
        let result = run_checks(
            &bytes,
            &CheckOptions {
                text_color: "#ffffff",
                primary: "#000000",
                width: 100,
                height: 100,
                message: "what a damn fine offer",
                prohibited_words: &list,
            },
        )
        .unwrap();
        assert_eq!(
            result.legal.prohibited_words,
            check_prohibited("what a damn fine offer", &list)
        );
    }
}
