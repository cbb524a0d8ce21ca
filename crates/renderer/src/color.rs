//! Palette colors.
//!
//! Accepted forms are `#RGB`, `#RRGGBB`, `#RRGGBBAA` and `rgba(r, g, b, a)`
//! with `a` as a float in [0, 1].

use std::fmt;
use std::str::FromStr;

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn parse(s: &str) -> Result<Self, RenderError> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| RenderError::InvalidColor(s.to_string()));
        }
        if s.starts_with("rgba") {
            return parse_rgba(s).ok_or_else(|| RenderError::InvalidColor(s.to_string()));
        }
        Err(RenderError::InvalidColor(s.to_string()))
    }

    /// Channel-wise interpolation, truncating like an integer cast.
    pub fn lerp(&self, other: &Rgba, t: f64) -> Rgba {
        let mix = |a: u8, b: u8| (a as f64 + t * (b as f64 - a as f64)) as u8;
        Rgba::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    pub fn luminance(&self) -> f64 {
        0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64
    }

    /// Euclidean distance over all four channels.
    pub fn distance(&self, other: &Rgba) -> f64 {
        let d = |a: u8, b: u8| a as f64 - b as f64;
        let (dr, dg, db, da) = (
            d(self.r, other.r),
            d(self.g, other.g),
            d(self.b, other.b),
            d(self.a, other.a),
        );
        (dr * dr + dg * dg + db * db + da * da).sqrt()
    }

    pub fn channels(&self) -> [f64; 4] {
        [self.r as f64, self.g as f64, self.b as f64, self.a as f64]
    }

    pub fn to_css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgba {
    /// `#rrggbb` when opaque, `rgba(r, g, b, a)` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "rgba({}, {}, {}, {:.2})",
                self.r,
                self.g,
                self.b,
                self.a as f64 / 255.0
            )
        }
    }
}

impl FromStr for Rgba {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgba::parse(s)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    let nibble = |i: usize| {
        let v = u8::from_str_radix(hex.get(i..i + 1)?, 16).ok()?;
        Some(v << 4 | v)
    };

    match hex.len() {
        3 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        6 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_rgba(s: &str) -> Option<Rgba> {
    let inner = s.strip_prefix("rgba(")?.strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return None;
    }
    let r = parts[0].parse::<u8>().ok()?;
    let g = parts[1].parse::<u8>().ok()?;
    let b = parts[2].parse::<u8>().ok()?;
    let a = parts[3].parse::<f64>().ok()?;
    Some(Rgba::new(r, g, b, (a * 255.0) as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Rgba::parse("#fff").unwrap(), Rgba::new(255, 255, 255, 255));
        assert_eq!(Rgba::parse("#FFD700").unwrap(), Rgba::new(255, 215, 0, 255));
        assert_eq!(Rgba::parse("#ff000080").unwrap(), Rgba::new(255, 0, 0, 128));
    }

    #[test]
    fn test_parse_rgba() {
        assert_eq!(
            Rgba::parse("rgba(255,255,255, 0.5)").unwrap(),
            Rgba::new(255, 255, 255, 127)
        );
        assert_eq!(Rgba::parse("rgba(230,247,255,0.1)").unwrap().a, 25);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Rgba::parse("red").is_err());
        assert!(Rgba::parse("#12345").is_err());
        assert!(Rgba::parse("rgba(1,2,3)").is_err());
        assert!(Rgba::parse("#gggggg").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Rgba::new(255, 215, 0, 255).to_string(), "#ffd700");
        assert_eq!(Rgba::new(200, 200, 200, 128).to_string(), "rgba(200, 200, 200, 0.50)");
    }

    #[test]
    fn test_lerp_and_distance() {
        let a = Rgba::new(0, 0, 0, 255);
        let b = Rgba::new(100, 200, 50, 255);
        assert_eq!(a.lerp(&b, 0.5), Rgba::new(50, 100, 25, 255));
        assert_eq!(a.distance(&a), 0.0);
        assert!((Rgba::new(3, 4, 0, 0).distance(&Rgba::TRANSPARENT) - 5.0).abs() < 1e-12);
    }
}
