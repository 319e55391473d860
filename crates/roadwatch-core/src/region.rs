//! Region registry and geospatial classification.
//!
//! A registry is an ordered list of named polygons. Classification walks the
//! list in order and returns the first region whose interior contains the
//! point; overlaps are resolved by registry priority. Anything that matches
//! nothing, or that cannot be tested because the geometry is degenerate,
//! lands in [`OTHER_REGION`].
//!
//! Coordinates are `[latitude, longitude]` pairs throughout. The polygon test
//! is planar, which is accurate enough for province-scale regions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Reserved catch-all region name.
pub const OTHER_REGION: &str = "Other";

/// Points closer than this to an edge count as on the boundary.
const BOUNDARY_EPSILON: f64 = 1e-12;

const BUNDLED_ALBERTA: &str = include_str!("../data/alberta_regions.toml");

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while building a registry or testing a point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegionError {
    /// The registry file could not be parsed.
    #[error("region registry parse error: {0}")]
    Parse(String),

    /// A region has an empty name or uses the reserved catch-all name.
    #[error("invalid region name '{0}'")]
    InvalidName(String),

    /// Two regions share a name.
    #[error("duplicate region name '{0}'")]
    DuplicateName(String),

    /// The polygon has fewer than three distinct vertices.
    #[error("region '{name}' is degenerate: {vertices} distinct vertices")]
    Degenerate { name: String, vertices: usize },

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate ({lat}, {lon})")]
    NonFinite { lat: f64, lon: f64 },
}

// ---------------------------------------------------------------------------
// Polygon
// ---------------------------------------------------------------------------

/// One named region: an exterior ring of `[lat, lon]` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub points: Vec<[f64; 2]>,
}

impl Region {
    #[must_use]
    pub fn new(name: impl Into<String>, points: Vec<[f64; 2]>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }

    /// Ring vertices without the optional closing duplicate.
    fn ring(&self) -> &[[f64; 2]] {
        match self.points.as_slice() {
            [first, .., last] if first == last => &self.points[..self.points.len() - 1],
            points => points,
        }
    }

    fn check_geometry(&self) -> Result<&[[f64; 2]], RegionError> {
        let ring = self.ring();
        if let Some(bad) = ring.iter().find(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(RegionError::NonFinite {
                lat: bad[0],
                lon: bad[1],
            });
        }

        let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
        for point in ring {
            if !distinct.contains(point) {
                distinct.push(*point);
            }
        }
        if distinct.len() < 3 {
            return Err(RegionError::Degenerate {
                name: self.name.clone(),
                vertices: distinct.len(),
            });
        }

        Ok(ring)
    }

    /// Strict interior test: points on the boundary are not contained.
    ///
    /// # Errors
    ///
    /// Returns an error when the point or the polygon has non-finite
    /// coordinates, or the polygon has fewer than three distinct vertices.
    pub fn contains(&self, lat: f64, lon: f64) -> Result<bool, RegionError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(RegionError::NonFinite { lat, lon });
        }
        let ring = self.check_geometry()?;

        let mut inside = false;
        let mut prev = ring[ring.len() - 1];
        for &curr in ring {
            if on_segment(prev, curr, lat, lon) {
                return Ok(false);
            }
            let [x1, y1] = prev;
            let [x2, y2] = curr;
            if (y1 > lon) != (y2 > lon) {
                let crossing = x1 + (lon - y1) * (x2 - x1) / (y2 - y1);
                if lat < crossing {
                    inside = !inside;
                }
            }
            prev = curr;
        }
        Ok(inside)
    }
}

fn on_segment(a: [f64; 2], b: [f64; 2], lat: f64, lon: f64) -> bool {
    let cross = (b[0] - a[0]) * (lon - a[1]) - (b[1] - a[1]) * (lat - a[0]);
    if cross.abs() > BOUNDARY_EPSILON {
        return false;
    }
    lat >= a[0].min(b[0]) && lat <= a[0].max(b[0]) && lon >= a[1].min(b[1]) && lon <= a[1].max(b[1])
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    regions: Vec<Region>,
}

/// Ordered list of named regions. Earlier entries win on overlap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionRegistry {
    regions: Vec<Region>,
}

impl RegionRegistry {
    /// Build a registry, validating names. Geometry is checked lazily at
    /// classification time so one bad polygon degrades to `"Other"` instead
    /// of refusing to start.
    ///
    /// # Errors
    ///
    /// Returns an error for empty, reserved, or duplicate region names.
    pub fn new(regions: Vec<Region>) -> Result<Self, RegionError> {
        let mut seen = HashSet::new();
        for region in &regions {
            let name = region.name.trim();
            if name.is_empty() || name == OTHER_REGION {
                return Err(RegionError::InvalidName(region.name.clone()));
            }
            if !seen.insert(name) {
                return Err(RegionError::DuplicateName(region.name.clone()));
            }
        }
        Ok(Self { regions })
    }

    /// Parse a registry from TOML with `[[regions]]` tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or names are invalid.
    pub fn from_toml_str(raw: &str) -> Result<Self, RegionError> {
        let file: RegistryFile =
            toml::from_str(raw).map_err(|err| RegionError::Parse(err.to_string()))?;
        Self::new(file.regions)
    }

    /// The registry shipped with the crate: Edmonton, Calgary,
    /// `NorthOfEdmonton`, `SouthOfEdmonton`, in that priority order.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled data file is corrupt.
    pub fn alberta() -> Result<Self, RegionError> {
        Self::from_toml_str(BUNDLED_ALBERTA)
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions whose geometry cannot be tested.
    #[must_use]
    pub fn geometry_problems(&self) -> Vec<RegionError> {
        self.regions
            .iter()
            .filter_map(|region| region.check_geometry().err())
            .collect()
    }

    /// Name of the first region containing the point, or `"Other"`.
    ///
    /// Never fails: a geometry error is logged and classified as `"Other"`.
    #[must_use]
    pub fn classify(&self, lat: f64, lon: f64) -> String {
        match self.try_classify(lat, lon) {
            Ok(Some(name)) => name.to_string(),
            Ok(None) => OTHER_REGION.to_string(),
            Err(err) => {
                warn!(lat, lon, error = %err, "region test failed; classifying as Other");
                OTHER_REGION.to_string()
            }
        }
    }

    /// Like [`classify`](Self::classify) but surfaces geometry errors.
    ///
    /// # Errors
    ///
    /// Returns the first geometry error met while walking the registry.
    pub fn try_classify(&self, lat: f64, lon: f64) -> Result<Option<&str>, RegionError> {
        for region in &self.regions {
            if region.contains(lat, lon)? {
                return Ok(Some(region.name.as_str()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(name: &str, min: f64, max: f64) -> Region {
        Region::new(
            name,
            vec![[min, min], [min, max], [max, max], [max, min], [min, min]],
        )
    }

    #[test]
    fn bundled_registry_loads_in_priority_order() {
        let registry = RegionRegistry::alberta().expect("bundled registry");
        let names: Vec<&str> = registry.regions().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            ["Edmonton", "Calgary", "NorthOfEdmonton", "SouthOfEdmonton"]
        );
        assert!(registry.geometry_problems().is_empty());
    }

    #[test]
    fn bundled_registry_classifies_known_places() {
        let registry = RegionRegistry::alberta().expect("bundled registry");
        assert_eq!(registry.classify(53.5461, -113.4938), "Edmonton");
        assert_eq!(registry.classify(51.0447, -114.0719), "Calgary");
        assert_eq!(registry.classify(56.7267, -111.3810), "NorthOfEdmonton");
        assert_eq!(registry.classify(52.2681, -113.8112), "SouthOfEdmonton");
        assert_eq!(registry.classify(49.2827, -123.1207), OTHER_REGION);
    }

    #[test]
    fn overlap_resolves_by_registry_order() {
        let big_first = RegionRegistry::new(vec![square("Big", 0.0, 10.0), square("Small", 4.0, 6.0)])
            .expect("registry");
        assert_eq!(big_first.classify(5.0, 5.0), "Big");

        let small_first =
            RegionRegistry::new(vec![square("Small", 4.0, 6.0), square("Big", 0.0, 10.0)])
                .expect("registry");
        assert_eq!(small_first.classify(5.0, 5.0), "Small");
        assert_eq!(small_first.classify(1.0, 1.0), "Big");
    }

    #[test]
    fn boundary_points_are_not_contained() {
        let region = square("Box", 0.0, 10.0);
        assert_eq!(region.contains(0.0, 5.0), Ok(false));
        assert_eq!(region.contains(10.0, 10.0), Ok(false));
        assert_eq!(region.contains(5.0, 5.0), Ok(true));
    }

    #[test]
    fn degenerate_polygon_falls_back_to_other() {
        let registry = RegionRegistry::new(vec![
            Region::new("Line", vec![[0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]),
            square("Box", 0.0, 10.0),
        ])
        .expect("registry");

        assert!(matches!(
            registry.try_classify(5.0, 5.0),
            Err(RegionError::Degenerate { vertices: 2, .. })
        ));
        assert_eq!(registry.classify(5.0, 5.0), OTHER_REGION);
        assert_eq!(registry.geometry_problems().len(), 1);
    }

    #[test]
    fn non_finite_point_is_other() {
        let registry = RegionRegistry::new(vec![square("Box", 0.0, 10.0)]).expect("registry");
        assert_eq!(registry.classify(f64::NAN, 5.0), OTHER_REGION);
        assert_eq!(registry.classify(5.0, f64::INFINITY), OTHER_REGION);
    }

    #[test]
    fn names_are_validated() {
        assert_eq!(
            RegionRegistry::new(vec![square("Other", 0.0, 1.0)]),
            Err(RegionError::InvalidName("Other".into()))
        );
        assert_eq!(
            RegionRegistry::new(vec![square(" ", 0.0, 1.0)]),
            Err(RegionError::InvalidName(" ".into()))
        );
        assert_eq!(
            RegionRegistry::new(vec![square("A", 0.0, 1.0), square("A", 2.0, 3.0)]),
            Err(RegionError::DuplicateName("A".into()))
        );
    }

    #[test]
    fn empty_registry_classifies_everything_as_other() {
        let registry = RegionRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.classify(53.5, -113.5), OTHER_REGION);
    }

    #[test]
    fn parse_error_is_reported() {
        let err = RegionRegistry::from_toml_str("[[regions]]\nname = 3").expect_err("bad toml");
        assert!(matches!(err, RegionError::Parse(_)));
    }

    proptest::proptest! {
        #[test]
        fn square_interior_and_exterior(lat in -20.0f64..30.0, lon in -20.0f64..30.0) {
            let registry = RegionRegistry::new(vec![square("Box", 0.0, 10.0)]).expect("registry");
            let inside = lat > 0.0 && lat < 10.0 && lon > 0.0 && lon < 10.0;
            let expected = if inside { "Box" } else { OTHER_REGION };
            proptest::prop_assert_eq!(registry.classify(lat, lon), expected);
        }

        #[test]
        fn classification_is_always_a_known_name(lat in -90.0f64..90.0, lon in -180.0f64..180.0) {
            let registry = RegionRegistry::alberta().expect("bundled registry");
            let name = registry.classify(lat, lon);
            proptest::prop_assert!(
                name == OTHER_REGION || registry.regions().iter().any(|r| r.name == name)
            );
        }
    }
}
