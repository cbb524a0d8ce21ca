//! Common test fixtures.

/// Run identifiers in upstream format.
pub mod runs {
    pub const PREVIOUS: &str = "2024-06-01T03:00:00Z";
    pub const CURRENT: &str = "2024-06-01T06:00:00Z";
}

/// Bounding boxes as `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Area warmed after a promotion
    pub const FRANCE: (f64, f64, f64, f64) = (-12.7368, 37.3313, 12.9982, 55.9485);

    /// Small area around Valencia
    pub const VALENCIA: (f64, f64, f64, f64) = (-0.5, 39.3, -0.2, 39.6);
}

/// Model configurations as YAML.
pub mod models {
    /// One package, two single-variable layers.
    pub const TWO_LAYERS: &str = r#"
model: arome
packages:
  - name: SP1
    layers:
      - name: temperature
        fields:
          - { name: 2t, type: instant, unit: K, description: 2 metre temperature }
      - name: humidity
        fields:
          - { name: 2r, type: instant, unit: "%", description: 2 metre relative humidity }
"#;

    /// Two packages including the multi-variable layers.
    pub const COMPOSITE: &str = r#"
model: arome
packages:
  - name: SP1
    layers:
      - name: comfort_index
        fields:
          - { name: 2t }
          - { name: 10u }
          - { name: 10v }
          - { name: 2r }
  - name: SP2
    layers:
      - name: cloud_cover
        fields:
          - { name: lcc }
          - { name: mcc }
          - { name: hcc }
"#;
}
