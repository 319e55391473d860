//! GeoJSON export of the region registry, for eyeballing polygons on a map.
//!
//! GeoJSON positions are `[longitude, latitude]`, the reverse of the
//! registry's `[lat, lon]`, and polygon rings must be closed.

use serde_json::{Value, json};

use crate::region::{Region, RegionRegistry};

/// One `Feature` per region, in registry order.
#[must_use]
pub fn to_feature_collection(registry: &RegionRegistry) -> Value {
    let features: Vec<Value> = registry
        .regions()
        .iter()
        .enumerate()
        .map(|(priority, region)| feature(region, priority))
        .collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn feature(region: &Region, priority: usize) -> Value {
    json!({
        "type": "Feature",
        "properties": { "name": region.name, "priority": priority },
        "geometry": {
            "type": "Polygon",
            "coordinates": [closed_ring(&region.points)],
        },
    })
}

fn closed_ring(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut ring: Vec<[f64; 2]> = points.iter().map(|&[lat, lon]| [lon, lat]).collect();
    if let Some(&first) = ring.first().filter(|first| Some(*first) != ring.last()) {
        ring.push(first);
    }
    ring
}

/// Pretty-printed export.
///
/// # Errors
///
/// Fails only if serialization fails.
pub fn to_string_pretty(registry: &RegionRegistry) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&to_feature_collection(registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_swapped_and_rings_closed() {
        let registry = RegionRegistry::new(vec![Region::new(
            "Box",
            vec![[50.0, -114.0], [50.0, -113.0], [51.0, -113.0]],
        )])
        .expect("registry");

        let value = to_feature_collection(&registry);
        assert_eq!(value["type"], "FeatureCollection");
        let feature = &value["features"][0];
        assert_eq!(feature["properties"]["name"], "Box");

        let ring = feature["geometry"]["coordinates"][0]
            .as_array()
            .expect("ring");
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], json!([-114.0, 50.0]));
        assert_eq!(ring[0], ring[3]);
    }

    #[test]
    fn already_closed_ring_is_not_doubled() {
        let ring = closed_ring(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn bundled_registry_exports_in_priority_order() {
        let registry = RegionRegistry::alberta().expect("bundled");
        let value = to_feature_collection(&registry);
        let names: Vec<&str> = value["features"]
            .as_array()
            .expect("features")
            .iter()
            .filter_map(|f| f["properties"]["name"].as_str())
            .collect();
        assert_eq!(
            names,
            ["Edmonton", "Calgary", "NorthOfEdmonton", "SouthOfEdmonton"]
        );
        assert!(to_string_pretty(&registry).expect("json").contains("\"Polygon\""));
    }
}
