use std::collections::HashMap;

use super::AggregationOverview;
use crate::types::{BoqRow, BoqTable, QuantitySource, round4};

fn sum_quantity<'a>(rows: impl Iterator<Item = &'a BoqRow>, pick: fn(&BoqRow) -> Option<f64>) -> Option<f64> {
    let values: Vec<f64> = rows.filter_map(pick).collect();
    (!values.is_empty()).then(|| round4(values.iter().sum()))
}

/// Replace member rows by one summed row per group; unique rows follow.
///
/// Groups are emitted in overview order. A repeated object type name gets a
/// ` (n)` suffix so every compiled row has a distinct display name.
pub fn aggregate_boq(table: &BoqTable, overview: &AggregationOverview) -> BoqTable {
    let member_of: HashMap<&str, &str> = overview
        .iter()
        .flat_map(|(group_id, group)| {
            group
                .elements
                .iter()
                .filter_map(|m| m.global_id.as_deref())
                .map(move |gid| (gid, group_id.as_str()))
        })
        .collect();

    let mut grouped: HashMap<&str, Vec<&BoqRow>> = HashMap::new();
    let mut unique = Vec::new();
    for row in &table.rows {
        match member_of.get(row.id.as_str()) {
            Some(group_id) => grouped.entry(*group_id).or_default().push(row),
            None => unique.push(row.clone()),
        }
    }

    let mut name_counts: HashMap<&str, usize> = HashMap::new();
    let mut rows = Vec::with_capacity(overview.len() + unique.len());

    for (group_id, group) in overview {
        let Some(members) = grouped.get(group_id.as_str()) else {
            continue;
        };
        let base = group.compiled_object_type.as_str();
        let count = name_counts.entry(base).or_insert(0);
        *count += 1;
        let name = if *count > 1 {
            format!("{} ({})", base, count)
        } else {
            base.to_string()
        };

        rows.push(BoqRow {
            id: group_id.clone(),
            name,
            entity: members.iter().find_map(|r| r.entity.clone()),
            object_type: Some(base.to_string()),
            compiled: true,
            elements_compiled: members.len(),
            length: sum_quantity(members.iter().copied(), |r| r.length),
            length_source: QuantitySource::combine(members.iter().map(|r| r.length_source)),
            area: sum_quantity(members.iter().copied(), |r| r.area),
            area_source: QuantitySource::combine(members.iter().map(|r| r.area_source)),
            volume: sum_quantity(members.iter().copied(), |r| r.volume),
            volume_source: QuantitySource::combine(members.iter().map(|r| r.volume_source)),
            ..Default::default()
        });
    }

    rows.extend(unique);
    BoqTable::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{GroupMember, GroupOverview};

    fn row(id: &str, volume: f64, source: QuantitySource) -> BoqRow {
        BoqRow {
            id: id.into(),
            name: id.into(),
            entity: Some("IfcSlab".into()),
            object_type: Some("Floor".into()),
            elements_compiled: 1,
            volume: Some(volume),
            volume_source: source,
            ..Default::default()
        }
    }

    fn group(object_type: &str, ids: &[&str]) -> GroupOverview {
        GroupOverview {
            compiled_type: "IfcSlab".into(),
            compiled_object_type: object_type.into(),
            elements: ids
                .iter()
                .map(|id| GroupMember {
                    name: Some(id.to_string()),
                    global_id: Some(id.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_groups_are_summed() {
        let table = BoqTable::new(vec![
            row("A", 2.5, QuantitySource::Declared),
            row("B", 2.4, QuantitySource::BoundingBox),
            row("C", 2.5, QuantitySource::Declared),
        ]);
        let mut overview = AggregationOverview::new();
        overview.insert("g1".into(), group("Floor", &["A", "C"]));

        let result = aggregate_boq(&table, &overview);
        assert_eq!(result.rows.len(), 2);
        let compiled = &result.rows[0];
        assert_eq!(compiled.id, "g1");
        assert!(compiled.compiled);
        assert_eq!(compiled.elements_compiled, 2);
        assert_eq!(compiled.volume, Some(5.0));
        assert_eq!(compiled.volume_source, QuantitySource::Declared);
        assert_eq!(compiled.area, None);
        assert_eq!(result.rows[1].id, "B");
        assert!(!result.rows[1].compiled);
    }

    #[test]
    fn test_mixed_sources_and_duplicate_names() {
        let table = BoqTable::new(vec![
            row("A", 1.0, QuantitySource::Declared),
            row("B", 1.0, QuantitySource::Mesh),
            row("C", 1.0, QuantitySource::Declared),
            row("D", 1.0, QuantitySource::Declared),
        ]);
        let mut overview = AggregationOverview::new();
        overview.insert("g1".into(), group("Floor", &["A", "B"]));
        overview.insert("g2".into(), group("Floor", &["C", "D"]));

        let result = aggregate_boq(&table, &overview);
        assert_eq!(result.rows[0].volume_source, QuantitySource::Mixed);
        assert_eq!(result.rows[0].name, "Floor");
        assert_eq!(result.rows[1].name, "Floor (2)");
    }
}
