use std::collections::HashMap;

use super::{LayerPlan, apportion, layer_id};
use crate::config::ZeroThicknessPolicy;
use crate::types::{BoqRow, BoqTable, QuantitySource, round4};

/// Replace each dissected row by one row per layer.
///
/// Layer rows keep the parent's length and area; only the volume is split.
/// Rows without a plan get layer number 0 and their material descriptor.
pub fn split_boq(
    table: &BoqTable,
    plans: &HashMap<String, LayerPlan>,
    descriptors: &HashMap<String, String>,
    policy: ZeroThicknessPolicy,
) -> BoqTable {
    let mut rows = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let Some(plan) = plans.get(&row.id) else {
            let mut row = row.clone();
            row.layer_number = 0;
            if let Some(descriptor) = descriptors.get(&row.id) {
                row.material_descriptor = Some(descriptor.clone());
            }
            rows.push(row);
            continue;
        };

        let ratios = plan.ratios(policy);
        let volumes = apportion(row.volume, ratios.as_deref(), plan.layers.len());
        let volume_source = if ratios.is_some() {
            row.volume_source
        } else {
            QuantitySource::UnknownSplit
        };

        for (layer, volume) in plan.layers.iter().zip(volumes) {
            rows.push(BoqRow {
                id: layer_id(&row.id, layer.number),
                name: format!("{} (L{})", row.name, layer.number),
                material_descriptor: Some(layer.material_name.clone()),
                layer_number: layer.number,
                layer_thickness: Some(round4(layer.thickness_m)),
                volume,
                volume_source,
                indicators: HashMap::new(),
                ..row.clone()
            });
        }
    }

    BoqTable::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dissect::PlannedLayer;

    fn plan(thicknesses: &[f64]) -> LayerPlan {
        LayerPlan {
            layers: thicknesses
                .iter()
                .zip(1u32..)
                .map(|(&t, number)| PlannedLayer {
                    number,
                    material_name: format!("M{}", number),
                    thickness_m: t,
                })
                .collect(),
        }
    }

    fn table() -> BoqTable {
        BoqTable::new(vec![
            BoqRow {
                id: "W1".into(),
                name: "Wall".into(),
                elements_compiled: 1,
                length: Some(5.0),
                area: Some(10.0),
                area_source: QuantitySource::Declared,
                volume: Some(1.0),
                volume_source: QuantitySource::Declared,
                ..Default::default()
            },
            BoqRow {
                id: "S1".into(),
                name: "Slab".into(),
                elements_compiled: 1,
                volume: Some(2.0),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_split_three_layers() {
        let plans = HashMap::from([("W1".to_string(), plan(&[0.05, 0.10, 0.05]))]);
        let descriptors = HashMap::from([("S1".to_string(), "Concrete".to_string())]);
        let result = split_boq(&table(), &plans, &descriptors, ZeroThicknessPolicy::Unknown);

        assert_eq!(result.rows.len(), 4);
        let volumes: Vec<_> = result.rows[..3].iter().map(|r| r.volume).collect();
        assert_eq!(volumes, vec![Some(0.25), Some(0.5), Some(0.25)]);
        assert_eq!(result.rows[1].id, "W1_L2");
        assert_eq!(result.rows[1].name, "Wall (L2)");
        assert_eq!(result.rows[1].material_descriptor.as_deref(), Some("M2"));
        assert_eq!(result.rows[1].layer_thickness, Some(0.1));
        assert_eq!(result.rows[1].area, Some(10.0));
        assert_eq!(result.rows[1].volume_source, QuantitySource::Declared);

        let slab = &result.rows[3];
        assert_eq!(slab.layer_number, 0);
        assert_eq!(slab.material_descriptor.as_deref(), Some("Concrete"));
    }

    #[test]
    fn test_zero_thickness_unknown_split() {
        let plans = HashMap::from([("W1".to_string(), plan(&[0.0, 0.0]))]);
        let result = split_boq(&table(), &plans, &HashMap::new(), ZeroThicknessPolicy::Unknown);
        assert_eq!(result.rows[0].volume, None);
        assert_eq!(result.rows[0].volume_source, QuantitySource::UnknownSplit);
        assert_eq!(result.rows[1].volume, None);
    }

    #[test]
    fn test_zero_thickness_duplicate() {
        let plans = HashMap::from([("W1".to_string(), plan(&[0.0, 0.0, 0.0]))]);
        let result = split_boq(&table(), &plans, &HashMap::new(), ZeroThicknessPolicy::Duplicate);
        assert!(result.rows[..3].iter().all(|r| r.volume == Some(1.0)));
    }
}
