/// Background style interpretation
///
/// Cards store a free-form `background_style` value in their card-data: a CSS
/// gradient, a bare hex color, an `rgb(...)` triple, or an opaque preset
/// token. On every save the text color is re-derived from whatever color can
/// be extracted from that string, so a background change can never leave the
/// card with unreadable text.

use regex::Regex;
use std::sync::OnceLock;

/// Background stored when a card is saved without one.
pub const DEFAULT_BACKGROUND: &str = "#000000";

/// Text color used on dark backgrounds.
pub const LIGHT_TEXT: &str = "#FFFFFF";

/// Text color used on light backgrounds.
pub const DARK_TEXT: &str = "#333333";

fn hex_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unanchored: a longer hex run (RRGGBBAA, say) still yields its first
    // six digits instead of falling through to the unparseable branch.
    RE.get_or_init(|| Regex::new(r"#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})").expect("valid regex"))
}

fn rgb_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"rgb\s*\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)")
            .expect("valid regex")
    })
}

/// Expands 3-digit shorthand and parses a hex color into an RGB triple.
fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    let expanded: String = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex.to_string()
    };

    if expanded.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
    let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
    let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Extracts the first recognizable color from a background-style string.
///
/// Hex patterns win over `rgb(...)` patterns; anything else is undetectable.
fn find_rgb(background_value: &str) -> Option<(u8, u8, u8)> {
    if background_value.is_empty() {
        return None;
    }

    if let Some(m) = hex_pattern().find(background_value) {
        if let Some(rgb) = hex_to_rgb(m.as_str()) {
            return Some(rgb);
        }
    }

    if let Some(caps) = rgb_pattern().captures(background_value) {
        let r = caps[1].parse::<u16>().ok()?;
        let g = caps[2].parse::<u16>().ok()?;
        let b = caps[3].parse::<u16>().ok()?;
        // CSS allows out-of-range components; clamp like a browser would.
        return Some((r.min(255) as u8, g.min(255) as u8, b.min(255) as u8));
    }

    None
}

/// Derives a contrast-appropriate text color for a background style.
///
/// When a color is found, relative luminance decides the result:
/// `L = (0.299 R + 0.587 G + 0.114 B) / 255`, light text below 0.55.
///
/// When no color can be detected the result depends on why: an absent or
/// empty field means the default dark background is about to be applied, so
/// light text is correct; a present-but-unparseable token (a named preset,
/// say) defaults to dark text.
pub fn derive_text_color(background_style: &str) -> &'static str {
    match find_rgb(background_style) {
        Some((r, g, b)) => {
            let luminance =
                (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
            if luminance < 0.55 {
                LIGHT_TEXT
            } else {
                DARK_TEXT
            }
        }
        None if background_style.is_empty() => LIGHT_TEXT,
        None => DARK_TEXT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_background_gives_light_text() {
        assert_eq!(derive_text_color("#000000"), LIGHT_TEXT);
    }

    #[test]
    fn test_white_background_gives_dark_text() {
        assert_eq!(derive_text_color("#FFFFFF"), DARK_TEXT);
    }

    #[test]
    fn test_rgb_black_gives_light_text() {
        assert_eq!(derive_text_color("rgb(0, 0, 0)"), LIGHT_TEXT);
        assert_eq!(derive_text_color("rgb(255,255,255)"), DARK_TEXT);
    }

    #[test]
    fn test_three_digit_shorthand_expands() {
        // #fff expands to #ffffff
        assert_eq!(derive_text_color("#fff"), DARK_TEXT);
        assert_eq!(derive_text_color("#000"), LIGHT_TEXT);
    }

    #[test]
    fn test_color_found_inside_gradient() {
        let gradient = "linear-gradient(to right, #c2e9fb, #a1c4fd)";
        assert_eq!(derive_text_color(gradient), DARK_TEXT);

        let dark_gradient = "linear-gradient(135deg, #111111 0%, #333333 100%)";
        assert_eq!(derive_text_color(dark_gradient), LIGHT_TEXT);
    }

    #[test]
    fn test_hex_with_alpha_digits_uses_rgb_prefix() {
        // RRGGBBAA: the first six digits decide, the alpha pair is ignored.
        assert_eq!(derive_text_color("#00000080"), LIGHT_TEXT);
        assert_eq!(derive_text_color("#ffffff80"), DARK_TEXT);
    }

    #[test]
    fn test_unparseable_token_gives_dark_text() {
        assert_eq!(derive_text_color("Graphite"), DARK_TEXT);
        assert_eq!(derive_text_color("Deep Ocean"), DARK_TEXT);
    }

    #[test]
    fn test_empty_field_gives_light_text() {
        // An absent background means the dark default is about to be applied.
        assert_eq!(derive_text_color(""), LIGHT_TEXT);
    }

    #[test]
    fn test_luminance_boundary() {
        // 0.55 * 255 = 140.25; a uniform gray of 140 sits just below.
        assert_eq!(derive_text_color("#8c8c8c"), LIGHT_TEXT); // 140
        assert_eq!(derive_text_color("#8d8d8d"), DARK_TEXT); // 141
    }

    #[test]
    fn test_rgb_components_clamped() {
        assert_eq!(derive_text_color("rgb(300, 300, 300)"), DARK_TEXT);
    }
}
