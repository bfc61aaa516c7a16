//! Overlay geometry: band layout, word wrapping, auto text color, and the
//! SVG overlay document itself. Everything here is a pure function of its
//! inputs so the geometry can be tested without touching a rasterizer.

use std::fmt::Write as _;

use remix_core::types::Theme;

/// Inputs for one overlay document.
#[derive(Debug)]
pub struct OverlayInput<'a> {
    pub width: u32,
    pub height: u32,
    pub message: &'a str,
    pub locale: &'a str,
    pub disclaimer: Option<&'a str>,
    pub theme: &'a Theme,
    pub locale_badge: bool,
}

const PADDING: u32 = 32;
const LINE_HEIGHT: f64 = 1.25;

/// Band height: the larger of a fixed minimum and 20% of the canvas.
pub fn band_height(height: u32) -> u32 {
    140.max((f64::from(height) * 0.2).round() as u32)
}

/// Message font size scales with canvas height, floored for legibility.
pub fn font_size(height: u32) -> u32 {
    30.max((f64::from(height) * 0.045).round() as u32)
}

/// Build the overlay SVG: backdrop, bottom band, wrapped message lines,
/// optional disclaimer anchored to the band bottom, and an optional
/// translucent locale badge.
pub fn build_overlay_svg(input: &OverlayInput<'_>) -> String {
    let width = input.width;
    let height = input.height;
    let band = band_height(height);
    let font = font_size(height);

    let primary = if input.theme.primary.is_empty() {
        "#a13a5a"
    } else {
        input.theme.primary.as_str()
    };
    let text_color = if !input.theme.text.is_empty() && input.theme.text != "auto" {
        input.theme.text.clone()
    } else {
        contrasting_text(primary).to_string()
    };

    let disclaimer_text = input.disclaimer.unwrap_or("").trim();
    let disclaimer_size = 16.max((f64::from(font) * 0.45).round() as u32);
    let content_width = width.saturating_sub(PADDING * 2);
    let msg_lines = wrap_text_lines(input.message, content_width, font);
    let disclaimer_lines = if disclaimer_text.is_empty() {
        Vec::new()
    } else {
        wrap_text_lines(disclaimer_text, content_width, disclaimer_size)
    };

    let mut svg = String::new();
    let _ = writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#
    );
    // A fully transparent backdrop adds no pixels; leave the rect out.
    if !input.theme.bg.is_empty() && input.theme.bg != "transparent" {
        let _ = writeln!(
            svg,
            r#"  <rect x="0" y="0" width="{width}" height="{height}" fill="{}" />"#,
            input.theme.bg
        );
    }
    let _ = writeln!(
        svg,
        r#"  <rect x="0" y="{}" width="{width}" height="{band}" fill="{primary}" fill-opacity="1" />"#,
        height - band
    );
    let _ = writeln!(
        svg,
        r#"  <g font-family="Arial, sans-serif" fill="{text_color}">"#
    );

    let first_msg_y = height - band + PADDING + font;
    let _ = write!(
        svg,
        r##"    <text x="{PADDING}" y="{first_msg_y}" font-size="{font}" font-weight="700" stroke="#000" stroke-opacity="0.14" stroke-width="0.9" paint-order="stroke fill" style="letter-spacing:-0.3px">"##
    );
    for (idx, line) in msg_lines.iter().enumerate() {
        let dy = if idx == 0 {
            0
        } else {
            (f64::from(font) * LINE_HEIGHT).round() as u32
        };
        let _ = write!(
            svg,
            r#"<tspan x="{PADDING}" dy="{dy}">{}</tspan>"#,
            escape_xml(line)
        );
    }
    let _ = writeln!(svg, "</text>");

    if !disclaimer_lines.is_empty() {
        // Anchor the disclaimer to the band bottom with breathing room.
        let padding_bottom = 24.max((f64::from(font) * 0.5).round() as u32);
        let bottom_y = height - padding_bottom;
        let step = (f64::from(disclaimer_size) * LINE_HEIGHT).round() as u32;
        let first_line_y = bottom_y - (disclaimer_lines.len() as u32 - 1) * step;
        let _ = write!(
            svg,
            r#"    <text x="{PADDING}" y="{first_line_y}" font-size="{disclaimer_size}" font-weight="500" opacity="0.9">"#
        );
        for (idx, line) in disclaimer_lines.iter().enumerate() {
            let dy = if idx == 0 { 0 } else { step };
            let _ = write!(
                svg,
                r#"<tspan x="{PADDING}" dy="{dy}">{}</tspan>"#,
                escape_xml(line)
            );
        }
        let _ = writeln!(svg, "</text>");
    }

    if input.locale_badge && !input.locale.is_empty() {
        let label = input.locale.to_uppercase();
        let badge_w = label.chars().count() as u32 * 14 + 24;
        let badge_h = 40;
        let badge_x = width.saturating_sub(PADDING + badge_w);
        let _ = writeln!(
            svg,
            r##"    <rect x="{badge_x}" y="{PADDING}" width="{badge_w}" height="{badge_h}" rx="6" fill="#000000" fill-opacity="0.35" />"##
        );
        let _ = writeln!(
            svg,
            r##"    <text x="{}" y="{}" font-size="22" font-weight="600" fill="#ffffff">{}</text>"##,
            badge_x + 12,
            PADDING + badge_h - 12,
            escape_xml(&label)
        );
    }

    let _ = writeln!(svg, "  </g>");
    svg.push_str("</svg>");
    svg
}

/// Contrasting text color for a band background: dark text on bright
/// backgrounds, white otherwise.
pub fn contrasting_text(hex_color: &str) -> &'static str {
    if hex_luminance(hex_color) > 0.55 {
        "#333333"
    } else {
        "#ffffff"
    }
}

/// Relative luminance of a `#rrggbb` color over normalized channels.
/// Unparseable input yields 0.5 (neutral).
pub fn hex_luminance(hex: &str) -> f64 {
    match parse_hex(hex) {
        Some((r, g, b)) => {
            0.2126 * f64::from(r) / 255.0
                + 0.7152 * f64::from(g) / 255.0
                + 0.0722 * f64::from(b) / 255.0
        }
        None => 0.5,
    }
}

pub(crate) fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let s = hex.trim().trim_start_matches('#');
    if s.len() < 6 || !s.is_char_boundary(6) {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Approximate line-breaking using an average character width heuristic
/// (`fontSize * 0.55` per character) instead of real glyph metrics. Words
/// longer than a line are hard-split into fixed-size chunks.
pub fn wrap_text_lines(text: &str, max_width_px: u32, font_size_px: u32) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut lines: Vec<String> = Vec::new();
    if words.is_empty() {
        return lines;
    }
    let avg_char_width = f64::from(font_size_px) * 0.55;
    let max_chars = 8.max((f64::from(max_width_px) / avg_char_width).floor() as usize);

    fn flush(current: &mut Vec<&str>, lines: &mut Vec<String>) {
        if !current.is_empty() {
            lines.push(current.join(" "));
            current.clear();
        }
    }

    let mut current: Vec<&str> = Vec::new();

    for word in words {
        let word_len = word.chars().count();
        let joined_len: usize = current.iter().map(|w| w.chars().count()).sum::<usize>()
            + current.len().saturating_sub(1);
        let sep = usize::from(!current.is_empty());

        if joined_len + sep + word_len <= max_chars {
            current.push(word);
        } else if word_len > max_chars {
            // hard-break very long words
            flush(&mut current, &mut lines);
            let seg_len = 4.max((max_chars as f64 * 0.9).floor() as usize);
            let chars: Vec<char> = word.chars().collect();
            for chunk in chars.chunks(seg_len) {
                lines.push(chunk.iter().collect());
            }
        } else {
            flush(&mut current, &mut lines);
            current.push(word);
        }
    }
    flush(&mut current, &mut lines);
    lines
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}
