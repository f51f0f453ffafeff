//! Hex color parsing for the card palette

use crate::{error::CardError, Result};
use image::Rgba;

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional)
///
/// # Errors
/// `CardError::InvalidConfig` for any other shape
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(CardError::invalid_config(format!("invalid color: {}", value)));
    }

    let channel = |i: usize| -> Result<u8> {
        hex.get(i..i + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
            .ok_or_else(|| CardError::invalid_config(format!("invalid color: {}", value)))
    };

    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("349FCD").unwrap(), Rgba([0x34, 0x9F, 0xCD, 255]));
        assert_eq!(parse_hex_color("#22222280").unwrap(), Rgba([0x22, 0x22, 0x22, 0x80]));
    }

    #[test]
    fn test_parse_hex_color_rejects_garbage() {
        assert!(parse_hex_color("#FFF").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
        assert!(parse_hex_color("").is_err());
        assert!(parse_hex_color("#ЖЖЖ").is_err());
    }
}
