//! Value to color palettes, in both directions.
//!
//! Palettes are plain data held by a [`PaletteRegistry`] instance; the
//! worker colorizes rasters through it and the server publishes it as
//! JSON for map legends.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::color::Rgba;

/// Interpolated matches further than this from the input color are
/// rejected in favour of the nearest single stop.
const MATCH_THRESHOLD: f64 = 50.0;

const CLOUD_COVER: &str = "cloud_cover";
const CLOUD_GREY: u8 = 200;

/// A breakpoint as published to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ColorStop {
    #[serde(rename = "volume")]
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Palette {
    pub name: String,
    pub icon: String,
    pub unit: String,
    pub show_palette: bool,
    pub colors: Vec<ColorStop>,
    #[serde(skip)]
    parsed: Vec<(f64, Rgba)>,
}

impl Palette {
    /// Build a palette, sorting the stops by value.
    ///
    /// Stops with unparseable colors are published but never used for lookups.
    pub fn new(name: &str, icon: &str, unit: &str, show_palette: bool, stops: &[(f64, &str)]) -> Self {
        let mut colors: Vec<ColorStop> = stops
            .iter()
            .map(|(value, color)| ColorStop {
                value: *value,
                color: color.to_string(),
            })
            .collect();
        colors.sort_by(|a, b| a.value.total_cmp(&b.value));

        let parsed = colors
            .iter()
            .filter_map(|stop| match Rgba::parse(&stop.color) {
                Ok(rgba) => Some((stop.value, rgba)),
                Err(e) => {
                    warn!(palette = name, value = stop.value, error = %e, "Skipping palette stop");
                    None
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            icon: icon.to_string(),
            unit: unit.to_string(),
            show_palette,
            colors,
            parsed,
        }
    }

    /// Linear interpolation between the surrounding stops, clamped at both ends.
    pub fn color_for_value(&self, value: f64) -> Rgba {
        let stops = &self.parsed;
        let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
            return Rgba::TRANSPARENT;
        };
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }

        for pair in stops.windows(2) {
            let ((v1, c1), (v2, c2)) = (pair[0], pair[1]);
            if value >= v1 && value <= v2 {
                let t = if v2 > v1 { (value - v1) / (v2 - v1) } else { 0.0 };
                return c1.lerp(&c2, t);
            }
        }
        Rgba::TRANSPARENT
    }

    /// Recover the value a color was produced from.
    ///
    /// Exact stop matches win. Otherwise every adjacent pair is tried with
    /// the least-squares interpolation factor, and the closest
    /// reconstruction is used if it is within [`MATCH_THRESHOLD`]. Failing
    /// that, the value of the nearest single stop is returned.
    pub fn value_for_color(&self, color: &Rgba) -> Option<f64> {
        let stops = &self.parsed;
        if stops.is_empty() {
            return None;
        }

        if let Some((value, _)) = stops.iter().find(|(_, c)| c == color) {
            return Some(*value);
        }

        let mut best: Option<(f64, f64)> = None; // (distance, value)
        for pair in stops.windows(2) {
            let ((v1, c1), (v2, c2)) = (pair[0], pair[1]);
            let t = least_squares_factor(color, &c1, &c2);
            let distance = color.distance(&c1.lerp(&c2, t));
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, v1 + t * (v2 - v1)));
            }
        }
        if let Some((distance, value)) = best {
            if distance < MATCH_THRESHOLD {
                return Some(value);
            }
        }

        stops
            .iter()
            .min_by(|a, b| color.distance(&a.1).total_cmp(&color.distance(&b.1)))
            .map(|(value, _)| *value)
    }
}

/// Factor `t` in [0, 1] minimizing `|target - (a + t(b - a))|` over RGBA.
fn least_squares_factor(target: &Rgba, a: &Rgba, b: &Rgba) -> f64 {
    let (c, a, b) = (target.channels(), a.channels(), b.channels());
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..4 {
        let d = b[i] - a[i];
        num += (c[i] - a[i]) * d;
        den += d * d;
    }
    if den == 0.0 {
        return 0.0;
    }
    (num / den).clamp(0.0, 1.0)
}

/// Cloud cover is drawn as grey with opacity proportional to cover.
fn cloud_color(value: f64) -> Rgba {
    let alpha = (value / 100.0).clamp(0.0, 1.0);
    Rgba::new(CLOUD_GREY, CLOUD_GREY, CLOUD_GREY, (alpha * 255.0) as u8)
}

/// All palettes, keyed by layer name.
#[derive(Debug, Clone, Default)]
pub struct PaletteRegistry {
    palettes: BTreeMap<String, Palette>,
}

impl PaletteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("temperature", Palette::new("temperature", "temperature.svg", "°C", true, TEMPERATURE));
        registry.insert("comfort_index", Palette::new("comfort_index", "temperature.svg", "°C", true, TEMPERATURE));
        registry.insert("feels_like", Palette::new("feels_like", "temperature.svg", "°C", true, TEMPERATURE));
        registry.insert(
            "apparent_temperature",
            Palette::new("apparent_temperature", "temperature.svg", "°C", true, TEMPERATURE),
        );
        registry.insert("humidity", Palette::new("humidity", "humidity.svg", "%", true, HUMIDITY));
        registry.insert("wind_speed", Palette::new("wind_speed", "wind.svg", "m/s", true, WIND_SPEED));
        registry.insert(CLOUD_COVER, Palette::new(CLOUD_COVER, "cloud_cover.svg", "%", false, CLOUD));
        registry.insert("rainfall_accumulation", Palette::new("rainfall", "rainfall.svg", "mm", true, RAINFALL));
        registry
    }

    pub fn insert(&mut self, layer: &str, palette: Palette) {
        self.palettes.insert(layer.to_string(), palette);
    }

    pub fn get(&self, layer: &str) -> Option<&Palette> {
        self.palettes.get(layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.palettes.keys().map(String::as_str)
    }

    /// Color for a layer value; unknown layers are transparent.
    pub fn color_for_value(&self, layer: &str, value: f64) -> Rgba {
        if layer == CLOUD_COVER {
            return cloud_color(value);
        }
        self.palettes
            .get(layer)
            .map(|p| p.color_for_value(value))
            .unwrap_or(Rgba::TRANSPARENT)
    }

    /// Value a layer color stands for, `None` for unknown layers.
    pub fn value_for_color(&self, layer: &str, color: &Rgba) -> Option<f64> {
        self.palettes.get(layer)?.value_for_color(color)
    }

    /// Every palette as served to map clients.
    ///
    /// Cloud cover lists the 101 grey levels actually drawn instead of its
    /// stored stops.
    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (layer, palette) in &self.palettes {
            let value = if layer == CLOUD_COVER {
                let mut expanded = palette.clone();
                expanded.colors = (0..=100)
                    .map(|i| ColorStop {
                        value: i as f64,
                        color: format!("rgba({g}, {g}, {g}, {:.2})", i as f64 / 100.0, g = CLOUD_GREY),
                    })
                    .collect();
                serde_json::to_value(&expanded)
            } else {
                serde_json::to_value(palette)
            };
            // Palette only holds strings and floats
            if let Ok(value) = value {
                out.insert(layer.clone(), value);
            }
        }
        serde_json::Value::Object(out)
    }
}

const TEMPERATURE: &[(f64, &str)] = &[
    (-40.0, "#000080"),
    (-20.0, "#0000FF"),
    (-10.0, "#4169E1"),
    (0.0, "#ADD8E6"),
    (10.0, "#90EE90"),
    (15.0, "#FFFFE0"),
    (20.0, "#FFD700"),
    (25.0, "#FFA500"),
    (30.0, "#FF4500"),
    (35.0, "#FF0000"),
    (45.0, "#8B0000"),
    (60.0, "#4B0000"),
];

const HUMIDITY: &[(f64, &str)] = &[
    (0.0, "#8B4513"),
    (20.0, "#9EA913"),
    (30.0, "#A8DB13"),
    (40.0, "#9DFF22"),
    (50.0, "#61FF54"),
    (60.0, "#25FF86"),
    (70.0, "#00FFB8"),
    (80.0, "#00CDEA"),
    (90.0, "#009BFF"),
    (99.0, "#006EFF"),
];

const WIND_SPEED: &[(f64, &str)] = &[
    (0.0, "rgba(255,255,255,0)"),
    (1.0, "rgba(230,247,255,0.1)"),
    (2.0, "rgba(179,229,255,0.3)"),
    (3.0, "rgba(128,212,255,0.5)"),
    (5.0, "rgba(77,195,255,0.7)"),
    (7.0, "#1AB2FF"),
    (10.0, "#00A0E6"),
    (12.0, "#0080B3"),
    (15.0, "#66CC66"),
    (18.0, "#99DD00"),
    (20.0, "#FFCC00"),
    (25.0, "#FF9900"),
    (30.0, "#FF6600"),
    (35.0, "#FF3300"),
    (40.0, "#CC0000"),
    (50.0, "#990066"),
];

const CLOUD: &[(f64, &str)] = &[
    (0.0, "rgba(255,255,255, 0.01)"),
    (1.0, "rgba(255,255,255, 0.01)"),
    (5.0, "rgba(255,255,255, 0.02)"),
    (10.0, "rgba(255,255,255, 0.05)"),
    (20.0, "rgba(255,255,255, 0.10)"),
    (30.0, "rgba(255,255,255, 0.17)"),
    (40.0, "rgba(255,255,255, 0.25)"),
    (50.0, "rgba(255,255,255, 0.33)"),
    (60.0, "rgba(255,255,255, 0.41)"),
    (70.0, "rgba(255,255,255, 0.5)"),
    (80.0, "rgba(255,255,255, 0.58)"),
    (90.0, "rgba(255,255,255, 0.66)"),
    (100.0, "rgba(255,255,255, 0.95)"),
];

const RAINFALL: &[(f64, &str)] = &[
    (0.0, "rgba(255,255,255, 0)"),
    (0.01, "rgba(255,255,255, 0.01)"),
    (0.02, "rgba(255,255,255, 0.02)"),
    (0.03, "rgba(255,255,255, 0.03)"),
    (0.04, "rgba(255,255,255, 0.04)"),
    (0.05, "rgba(255,255,255, 0.05)"),
    (0.06, "rgba(255,255,255, 0.06)"),
    (0.07, "rgba(255,255,255, 0.07)"),
    (0.08, "rgba(255,255,255, 0.08)"),
    (0.09, "rgba(255,255,255, 0.09)"),
    (0.1, "rgba(255,255,255, 0.2)"),
    (0.11, "rgba(255,255,255, 0.23)"),
    (0.12, "rgba(255,255,255, 0.26)"),
    (0.13, "rgba(255,255,255, 0.29)"),
    (0.14, "rgba(255,255,255, 0.32)"),
    (0.15, "rgba(255,255,255, 0.35)"),
    (0.16, "rgba(255,255,255, 0.38)"),
    (0.17, "rgba(255,255,255, 0.41)"),
    (0.18, "rgba(255,255,255, 0.44)"),
    (0.19, "rgba(255,255,255, 0.47)"),
    (0.2, "rgba(255,255,255, 0.5)"),
    (0.21, "rgba(255,255,255, 0.53)"),
    (0.22, "rgba(255,255,255, 0.56)"),
    (0.23, "rgba(255,255,255, 0.59)"),
    (0.24, "rgba(255,255,255, 0.62)"),
    (0.25, "rgba(255,255,255, 0.65)"),
    (0.26, "rgba(255,255,255, 0.68)"),
    (0.27, "rgba(255,255,255, 0.71)"),
    (0.35, "#e1f2fc"),
    (0.5, "#5fd4f4"),
    (0.75, "#45c2f0"),
    (1.0, "#35c2f0"),
    (1.5, "#25b2ec"),
    (2.0, "#1aa7ec"),
    (3.5, "#28c9c6"),
    (5.0, "#37eba5"),
    (7.5, "#42dc86"),
    (10.0, "#4cd167"),
    (15.0, "#64c855"),
    (20.0, "#7bc043"),
    (25.0, "#8ed545"),
    (30.0, "#a0eb4c"),
    (35.0, "#b0e34a"),
    (40.0, "#c0d647"),
    (45.0, "#e0dc48"),
    (50.0, "#ffe04a"),
    (55.0, "#ffd04b"),
    (60.0, "#ffc04c"),
    (65.0, "#ffaf40"),
    (70.0, "#ff9e3d"),
    (75.0, "#ff8f3f"),
    (80.0, "#ff7f41"),
    (85.0, "#ff7250"),
    (90.0, "#ff6a5a"),
    (95.0, "#ed6b67"),
    (100.0, "#e56b6f"),
    (125.0, "#ea4755"),
    (150.0, "#ef233c"),
    (175.0, "#e41333"),
    (200.0, "#d90429"),
    (250.0, "#ae012e"),
    (300.0, "#8d0033"),
    (350.0, "#8c003c"),
    (400.0, "#8c0045"),
    (450.0, "#89023f"),
    (500.0, "#85023e"),
    (550.0, "#7e0145"),
    (600.0, "#77004d"),
    (650.0, "#700057"),
    (700.0, "#6a0061"),
    (750.0, "#5e0062"),
    (800.0, "#560063"),
    (850.0, "#4d0071"),
    (900.0, "#440080"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_and_clamping() {
        let registry = PaletteRegistry::with_defaults();
        assert_eq!(registry.color_for_value("temperature", 20.0).to_string(), "#ffd700");
        assert_eq!(registry.color_for_value("temperature", -100.0).to_string(), "#000080");
        assert_eq!(registry.color_for_value("temperature", 100.0).to_string(), "#4b0000");
    }

    #[test]
    fn test_interpolation_includes_alpha() {
        let registry = PaletteRegistry::with_defaults();
        let c = registry.color_for_value("wind_speed", 0.5);
        assert_eq!((c.r, c.g, c.b), (242, 251, 255));
        assert_eq!(c.a, 12);
    }

    #[test]
    fn test_cloud_cover_special_case() {
        let registry = PaletteRegistry::with_defaults();
        assert_eq!(registry.color_for_value("cloud_cover", 50.0), Rgba::new(200, 200, 200, 127));
        assert_eq!(registry.color_for_value("cloud_cover", 150.0).a, 255);
        assert_eq!(registry.color_for_value("cloud_cover", -5.0).a, 0);
    }

    #[test]
    fn test_unknown_layer_is_transparent() {
        let registry = PaletteRegistry::with_defaults();
        assert_eq!(registry.color_for_value("snow_depth", 3.0), Rgba::TRANSPARENT);
        assert_eq!(registry.value_for_color("snow_depth", &Rgba::TRANSPARENT), None);
    }

    #[test]
    fn test_value_for_color_exact_stop() {
        let registry = PaletteRegistry::with_defaults();
        let gold = Rgba::parse("#FFD700").unwrap();
        assert_eq!(registry.value_for_color("temperature", &gold), Some(20.0));
    }

    #[test]
    fn test_round_trip_opaque_palettes() {
        let registry = PaletteRegistry::with_defaults();
        for (layer, values) in [
            ("temperature", vec![-35.0, -12.5, 3.0, 12.0, 17.5, 22.0, 33.0, 50.0]),
            ("humidity", vec![5.0, 25.0, 45.0, 65.0, 85.0, 95.0]),
        ] {
            for v in values {
                let color = registry.color_for_value(layer, v);
                let back = registry.value_for_color(layer, &color).unwrap();
                assert!((back - v).abs() < 0.5, "{layer}: {v} -> {color} -> {back}");
            }
        }
    }

    #[test]
    fn test_far_color_falls_back_to_nearest_stop() {
        let palette = Palette::new("t", "", "", true, &[(0.0, "#000000"), (10.0, "#0000ff")]);
        // far from the black-blue segment, nearest stop is blue
        let value = palette.value_for_color(&Rgba::new(255, 255, 255, 255)).unwrap();
        assert_eq!(value, 10.0);
    }

    #[test]
    fn test_stops_sorted_on_construction() {
        let palette = Palette::new("t", "", "", true, &[(10.0, "#0000ff"), (0.0, "#000000")]);
        assert_eq!(palette.colors[0].value, 0.0);
        assert_eq!(palette.color_for_value(5.0), Rgba::new(0, 0, 127, 255));
    }

    #[test]
    fn test_to_json_expands_cloud_cover() {
        let json = PaletteRegistry::with_defaults().to_json();
        let clouds = json["cloud_cover"]["colors"].as_array().unwrap();
        assert_eq!(clouds.len(), 101);
        assert_eq!(clouds[50]["color"], "rgba(200, 200, 200, 0.50)");
        assert_eq!(json["cloud_cover"]["show_palette"], false);
        assert_eq!(json["rainfall_accumulation"]["name"], "rainfall");
        assert_eq!(json["temperature"]["colors"][0]["volume"], -40.0);
    }
}
