//! Hex color codec
//!
//! Annotation colors travel as `#RRGGBB` strings and are drawn as normalized
//! RGB triples. Anything that is not exactly `#RRGGBB` decodes to black so
//! that a bad color can never abort rendering.

/// RGB color with each channel in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    /// Create a color from 8-bit channels
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self { r: f32::from(r) / 255.0, g: f32::from(g) / 255.0, b: f32::from(b) / 255.0 }
    }

    /// Parse a `#RRGGBB` string, falling back to black for any other form
    pub fn from_hex(value: &str) -> Self {
        parse_hex(value).unwrap_or(Self::BLACK)
    }

    /// Encode as lower-case `#rrggbb`
    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }

    pub fn components(&self) -> (f32, f32, f32) {
        (self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

fn parse_hex(value: &str) -> Option<Rgb> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some(Rgb::from_u8(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_channels() {
        let color = Rgb::from_hex("#FF8000");
        assert_eq!(color.r, 1.0);
        assert!((color.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(color.b, 0.0);
    }

    #[test]
    fn lower_case_hex_is_accepted() {
        assert_eq!(Rgb::from_hex("#00ff00"), Rgb::from_u8(0, 255, 0));
    }

    #[test]
    fn other_forms_fall_back_to_black() {
        for input in ["", "red", "rgb(255, 0, 0)", "#fff", "FF0000", "#GG0000", "#FF00000"] {
            assert_eq!(Rgb::from_hex(input), Rgb::BLACK, "input {input:?}");
        }
    }

    #[test]
    fn hex_encoding_inverts_parsing() {
        assert_eq!(Rgb::from_hex("#1a2b3c").to_hex(), "#1a2b3c");
    }
}
