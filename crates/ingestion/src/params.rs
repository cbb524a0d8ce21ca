//! GRIB2 parameter table for the AROME packages.
//!
//! Maps `(discipline, category, number, surface)` to the short names used
//! in the model configuration.

/// GRIB2 fixed surface type codes.
pub mod surface_types {
    /// Ground or water surface
    pub const SURFACE: u8 = 1;
    /// Mean sea level
    pub const MSL: u8 = 101;
    /// Height above ground (meters)
    pub const HEIGHT_ABOVE_GROUND: u8 = 103;
}

/// A parameter the decoder knows how to name.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    /// Short name (e.g., "2t", "10u")
    pub short_name: &'static str,
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    /// Required surface type; `None` accepts any surface
    pub surface_type: Option<u8>,
    /// Required surface value (meters for height above ground)
    pub level: Option<f64>,
}

impl ParameterSpec {
    fn matches(&self, discipline: u8, category: u8, number: u8, surface: Option<(u8, f64)>) -> bool {
        if self.discipline != discipline || self.category != category || self.number != number {
            return false;
        }
        let Some(want_type) = self.surface_type else {
            return true;
        };
        match surface {
            Some((kind, value)) if kind == want_type => match self.level {
                Some(level) => (level - value).abs() < 1e-6,
                None => true,
            },
            _ => false,
        }
    }
}

/// Parameters found in the AROME SP1/SP2/HP1 packages.
pub fn arome_parameters() -> &'static [ParameterSpec] {
    use surface_types::*;

    const PARAMS: &[ParameterSpec] = &[
        // Temperature
        ParameterSpec { short_name: "2t", discipline: 0, category: 0, number: 0, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(2.0) },
        ParameterSpec { short_name: "2d", discipline: 0, category: 0, number: 6, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(2.0) },
        // Moisture
        ParameterSpec { short_name: "2r", discipline: 0, category: 1, number: 1, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(2.0) },
        ParameterSpec { short_name: "tp", discipline: 0, category: 1, number: 8, surface_type: None, level: None },
        // Wind
        ParameterSpec { short_name: "10wdir", discipline: 0, category: 2, number: 0, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(10.0) },
        ParameterSpec { short_name: "10si", discipline: 0, category: 2, number: 1, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(10.0) },
        ParameterSpec { short_name: "10u", discipline: 0, category: 2, number: 2, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(10.0) },
        ParameterSpec { short_name: "10v", discipline: 0, category: 2, number: 3, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(10.0) },
        ParameterSpec { short_name: "10fg", discipline: 0, category: 2, number: 22, surface_type: Some(HEIGHT_ABOVE_GROUND), level: Some(10.0) },
        // Pressure
        ParameterSpec { short_name: "sp", discipline: 0, category: 3, number: 0, surface_type: Some(SURFACE), level: None },
        ParameterSpec { short_name: "prmsl", discipline: 0, category: 3, number: 1, surface_type: Some(MSL), level: None },
        // Cloud cover
        ParameterSpec { short_name: "tcc", discipline: 0, category: 6, number: 1, surface_type: None, level: None },
        ParameterSpec { short_name: "lcc", discipline: 0, category: 6, number: 3, surface_type: None, level: None },
        ParameterSpec { short_name: "mcc", discipline: 0, category: 6, number: 4, surface_type: None, level: None },
        ParameterSpec { short_name: "hcc", discipline: 0, category: 6, number: 5, surface_type: None, level: None },
    ];

    PARAMS
}

/// Short name of a GRIB2 product, if known.
pub fn lookup_short_name(
    discipline: u8,
    category: u8,
    number: u8,
    surface: Option<(u8, f64)>,
) -> Option<&'static str> {
    arome_parameters()
        .iter()
        .find(|p| p.matches(discipline, category, number, surface))
        .map(|p| p.short_name)
}
