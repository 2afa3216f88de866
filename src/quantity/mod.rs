//! Quantity Resolver
//!
//! Picks one authoritative length, area and volume per element from the
//! candidate sources in priority order (first non-absent value wins):
//!
//! | quantity | 1 | 2 | 3 | 4 |
//! |---|---|---|---|---|
//! | volume | declared net volume | mesh volume | property set | bounding box product |
//! | area | declared footprint / side area | bounding box largest face | property set | |
//! | length | declared length | bounding box largest extent | property set | |
//!
//! Values that are not numbers are absent, never errors. Results are rounded
//! to 4 decimals.

mod stage;

pub use stage::run_quantities;

use serde_json::{Map, Value};

use crate::constants::quantity as q;
use crate::types::{ElementRecord, PropertySets, QuantitySource, lenient_f64, round_to};

/// A resolved value and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Resolved {
    pub value: Option<f64>,
    pub source: QuantitySource,
}

impl Resolved {
    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedQuantities {
    pub length: Resolved,
    pub area: Resolved,
    pub volume: Resolved,
}

/// First candidate with a value, rounded; `not available` otherwise.
pub fn resolve_first<I>(candidates: I) -> Resolved
where
    I: IntoIterator<Item = (QuantitySource, Option<f64>)>,
{
    candidates
        .into_iter()
        .find_map(|(source, value)| {
            value.filter(|v| v.is_finite()).map(|v| Resolved {
                value: Some(round_to(v, q::DECIMALS)),
                source,
            })
        })
        .unwrap_or_default()
}

fn map_f64(map: &Map<String, Value>, key: &str) -> Option<f64> {
    map.get(key).and_then(lenient_f64)
}

/// Property-set lookup over aliases: flat keys first, then inside each named set.
fn pset_value(psets: &PropertySets, aliases: &[&str]) -> Option<f64> {
    let sets = [&psets.element, &psets.object_type];
    for set in sets {
        if let Some(v) = aliases.iter().find_map(|alias| map_f64(set, alias)) {
            return Some(v);
        }
    }
    for set in sets {
        for nested in set.values().filter_map(Value::as_object) {
            if let Some(v) = aliases.iter().find_map(|alias| map_f64(nested, alias)) {
                return Some(v);
            }
        }
    }
    None
}

fn uses_footprint_area(entity: Option<&str>) -> bool {
    entity.is_some_and(|e| q::FOOTPRINT_ENTITIES.contains(&e))
}

pub fn resolve_volume(element: &ElementRecord) -> Resolved {
    let geometry = &element.geometry;
    let bbox_volume = geometry
        .bounding_box
        .and_then(|b| b.extents())
        .map(|[x, y, z]| x * y * z);

    resolve_first([
        (QuantitySource::Declared, map_f64(&geometry.declared, q::NET_VOLUME)),
        (QuantitySource::Mesh, map_f64(&geometry.mesh, q::NET_VOLUME)),
        (
            QuantitySource::PropertySet,
            pset_value(&element.property_sets, q::PSET_VOLUME),
        ),
        (QuantitySource::BoundingBox, bbox_volume),
    ])
}

pub fn resolve_area(element: &ElementRecord) -> Resolved {
    let geometry = &element.geometry;
    let declared_key = if uses_footprint_area(element.metadata.entity.as_deref()) {
        q::NET_FOOTPRINT_AREA
    } else {
        q::NET_SIDE_AREA
    };
    let bbox_area = geometry
        .bounding_box
        .and_then(|b| b.extents())
        .map(|[x, y, z]| (x * y).max(x * z).max(y * z));

    resolve_first([
        (QuantitySource::Declared, map_f64(&geometry.declared, declared_key)),
        (QuantitySource::BoundingBox, bbox_area),
        (
            QuantitySource::PropertySet,
            pset_value(&element.property_sets, q::PSET_AREA),
        ),
    ])
}

pub fn resolve_length(element: &ElementRecord) -> Resolved {
    let geometry = &element.geometry;
    let bbox_length = geometry
        .bounding_box
        .and_then(|b| b.extents())
        .map(|[x, y, z]| x.max(y).max(z));

    resolve_first([
        (QuantitySource::Declared, map_f64(&geometry.declared, q::LENGTH)),
        (QuantitySource::BoundingBox, bbox_length),
        (
            QuantitySource::PropertySet,
            pset_value(&element.property_sets, q::PSET_LENGTH),
        ),
    ])
}

pub fn resolve(element: &ElementRecord) -> ResolvedQuantities {
    ResolvedQuantities {
        length: resolve_length(element),
        area: resolve_area(element),
        volume: resolve_volume(element),
    }
}
