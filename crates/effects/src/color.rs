//! Hex color parsing for effect palettes.
//!
//! Colors arrive as CSS-style hex strings in configs and presets and become
//! normalized `[f32; 4]` channel tuples for shader uniforms. Parsing is
//! best-effort at mount time: a malformed string degrades the palette, never
//! the mount, but the strict variant is available for hosts that want to
//! validate eagerly.

use thiserror::Error;

/// Normalized RGBA channels in `[0, 1]`.
pub type Rgba = [f32; 4];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("color '{0}' must have 3, 6, or 8 hex digits")]
    BadLength(String),
    #[error("color '{0}' contains a non-hex digit")]
    BadDigit(String),
}

/// Parses `#RRGGBB`, `#RRGGBBAA`, or shorthand `#RGB` (leading `#` optional).
///
/// Alpha defaults to `1.0` when the string has no alpha pair.
pub fn parse_rgba(hex: &str) -> Result<Rgba, ColorError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    let expanded;
    let digits = match digits.len() {
        3 => {
            let mut doubled = String::with_capacity(6);
            for ch in digits.chars() {
                doubled.push(ch);
                doubled.push(ch);
            }
            expanded = doubled;
            expanded.as_str()
        }
        6 | 8 => digits,
        _ => return Err(ColorError::BadLength(hex.to_owned())),
    };

    if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ColorError::BadDigit(hex.to_owned()));
    }

    let channel = |index: usize| -> Result<f32, ColorError> {
        let pair = &digits[index * 2..index * 2 + 2];
        u8::from_str_radix(pair, 16)
            .map(|value| f32::from(value) / 255.0)
            .map_err(|_| ColorError::BadDigit(hex.to_owned()))
    };

    let r = channel(0)?;
    let g = channel(1)?;
    let b = channel(2)?;
    let a = if digits.len() == 8 { channel(3)? } else { 1.0 };
    Ok([r, g, b, a])
}

/// Best-effort variant: malformed input logs a warning and falls back.
pub fn parse_rgba_or(hex: &str, fallback: Rgba) -> Rgba {
    match parse_rgba(hex) {
        Ok(color) => color,
        Err(err) => {
            tracing::warn!(color = hex, error = %err, "invalid color; using fallback");
            fallback
        }
    }
}

/// Darkens each color channel by `fraction` (`0.0` = unchanged, `1.0` = black).
/// Alpha is preserved.
pub fn darken(color: Rgba, fraction: f32) -> Rgba {
    let keep = (1.0 - fraction).clamp(0.0, 1.0);
    [
        color[0] * keep,
        color[1] * keep,
        color[2] * keep,
        color[3],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digit_colors_have_unit_alpha() {
        for hex in ["#DE443B", "006BB4", "#162325", "ffffff", "000000"] {
            let rgba = parse_rgba(hex).unwrap();
            assert_eq!(rgba[3], 1.0, "alpha for {hex}");
        }
    }

    #[test]
    fn channels_equal_digit_pair_over_255() {
        let rgba = parse_rgba("#DE443B").unwrap();
        assert!((rgba[0] - 222.0 / 255.0).abs() < 1e-6);
        assert!((rgba[1] - 68.0 / 255.0).abs() < 1e-6);
        assert!((rgba[2] - 59.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn eight_digit_colors_parse_alpha() {
        let rgba = parse_rgba("ff000080").unwrap();
        assert_eq!(rgba[0], 1.0);
        assert!((rgba[3] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn shorthand_expands_per_digit() {
        assert_eq!(parse_rgba("#fff").unwrap(), [1.0, 1.0, 1.0, 1.0]);
        let rgba = parse_rgba("#a00").unwrap();
        assert!((rgba[0] - 170.0 / 255.0).abs() < 1e-6);
        assert_eq!(rgba[1], 0.0);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert_eq!(
            parse_rgba("#12345"),
            Err(ColorError::BadLength("#12345".to_owned()))
        );
        assert_eq!(
            parse_rgba("zzzzzz"),
            Err(ColorError::BadDigit("zzzzzz".to_owned()))
        );
    }

    #[test]
    fn lossy_parse_falls_back() {
        let fallback = [0.1, 0.2, 0.3, 1.0];
        assert_eq!(parse_rgba_or("nope", fallback), fallback);
        assert_eq!(parse_rgba_or("#ffffff", fallback), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn darken_scales_rgb_only() {
        let darkened = darken([1.0, 0.5, 0.25, 0.8], 0.1);
        assert!((darkened[0] - 0.9).abs() < 1e-6);
        assert!((darkened[1] - 0.45).abs() < 1e-6);
        assert_eq!(darkened[3], 0.8);
    }
}
