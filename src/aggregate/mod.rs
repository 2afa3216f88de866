//! Element Aggregator
//!
//! Groups elements that share the full classification-relevant key
//! (entity, object type, material relationship kind, material identifier,
//! serialized layer list) so that one representative per group is sent to
//! the classifier and its result is broadcast to the members.
//!
//! - Groups with at least two members are compiled; singletons stay unique.
//! - Elements without entity or object type cannot form a key and are unique.
//! - The representative is the first member in input order (file names sorted).
//! - Group ids are the first 16 hex characters of SHA-256 over the full key.

mod boq;
mod stage;

pub use boq::aggregate_boq;
pub use stage::run_aggregate;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use crate::constants::aggregation::{GROUP_ID_HEX_LEN, MIN_GROUP_SIZE};
use crate::types::{ElementRecord, MaterialKind};

const NOT_DEFINED: &str = "Not defined";

// =============================================================================
// Grouping key
// =============================================================================

/// The five-part key; all parts must be byte-identical to share a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupingKey {
    pub entity: String,
    pub object_type: String,
    pub material_kind: String,
    pub material_identifier: String,
    pub layers: String,
}

#[derive(Serialize)]
struct LayerKey<'a> {
    #[serde(rename = "Material Name")]
    material_name: &'a str,
    #[serde(rename = "Thickness")]
    thickness: f64,
    #[serde(rename = "Thickness Unit")]
    thickness_unit: &'a str,
}

impl GroupingKey {
    /// Key of an element, `None` when entity or object type is missing.
    pub fn from_element(element: &ElementRecord) -> Option<Self> {
        let entity = element.metadata.entity.clone()?;
        let object_type = element.metadata.object_type.clone()?;

        let mut material_kind = NOT_DEFINED.to_string();
        let mut material_identifier = NOT_DEFINED.to_string();
        let mut layers = Vec::new();

        // The last tagged material entry defines the relationship
        for entry in &element.materials {
            let Some(kind) = entry.kind() else {
                continue;
            };
            material_kind = kind.as_str().to_string();
            layers.clear();
            match kind {
                MaterialKind::Material => {
                    material_identifier = entry
                        .material_name
                        .clone()
                        .unwrap_or_else(|| NOT_DEFINED.to_string());
                }
                MaterialKind::LayerSet => {
                    material_identifier = entry
                        .layers
                        .iter()
                        .map(|l| {
                            format!(
                                "{} ({} {})",
                                l.material_name.as_deref().unwrap_or("Unknown"),
                                l.thickness.unwrap_or(0.0),
                                l.thickness_unit.as_deref().unwrap_or("N/A")
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(" | ");
                    layers = entry.layers.iter().collect();
                }
                MaterialKind::LayerSetUsage => {
                    material_identifier = entry
                        .layer_set_name
                        .clone()
                        .unwrap_or_else(|| NOT_DEFINED.to_string());
                    layers = entry.layers.iter().collect();
                }
                MaterialKind::Other(_) => {
                    material_identifier = NOT_DEFINED.to_string();
                }
            }
        }

        let layer_keys: Vec<LayerKey> = layers
            .iter()
            .map(|l| LayerKey {
                material_name: l.material_name.as_deref().unwrap_or("Unknown"),
                thickness: l.thickness.unwrap_or(0.0),
                thickness_unit: l.thickness_unit.as_deref().unwrap_or("N/A"),
            })
            .collect();
        let layers = serde_json::to_string(&layer_keys).unwrap_or_default();

        Some(Self {
            entity,
            object_type,
            material_kind,
            material_identifier,
            layers,
        })
    }

    /// Stable short id over the full key
    pub fn group_id(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            &self.entity,
            &self.object_type,
            &self.material_kind,
            &self.material_identifier,
            &self.layers,
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        hex[..GROUP_ID_HEX_LEN].to_string()
    }
}

// =============================================================================
// Grouping
// =============================================================================

/// A compiled group; members are indices into the input slice.
#[derive(Debug, Clone)]
pub struct AggregationGroup {
    pub id: String,
    pub key: GroupingKey,
    pub members: Vec<usize>,
}

impl AggregationGroup {
    pub fn representative(&self) -> usize {
        self.members[0]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    /// Compiled groups in order of first appearance
    pub groups: Vec<AggregationGroup>,
    /// Indices of unique elements in input order
    pub unique: Vec<usize>,
}

impl Aggregation {
    pub fn compiled_elements(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

pub fn aggregate(elements: &[ElementRecord]) -> Aggregation {
    let mut order: Vec<GroupingKey> = Vec::new();
    let mut members: HashMap<GroupingKey, Vec<usize>> = HashMap::new();
    let mut unkeyed = Vec::new();

    for (idx, element) in elements.iter().enumerate() {
        match GroupingKey::from_element(element) {
            Some(key) => {
                let entry = members.entry(key.clone()).or_default();
                if entry.is_empty() {
                    order.push(key);
                }
                entry.push(idx);
            }
            None => unkeyed.push(idx),
        }
    }

    let mut aggregation = Aggregation::default();
    for key in order {
        let group_members = members.remove(&key).unwrap_or_default();
        if group_members.len() >= MIN_GROUP_SIZE {
            aggregation.groups.push(AggregationGroup {
                id: key.group_id(),
                key,
                members: group_members,
            });
        } else {
            aggregation.unique.extend(group_members);
        }
    }
    aggregation.unique.extend(unkeyed);
    aggregation.unique.sort_unstable();
    aggregation
}

// =============================================================================
// Overview
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "GlobalId")]
    pub global_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOverview {
    #[serde(rename = "Compiled Type")]
    pub compiled_type: String,
    #[serde(rename = "Compiled ObjectType")]
    pub compiled_object_type: String,
    #[serde(rename = "Elements")]
    pub elements: Vec<GroupMember>,
}

/// `aggregation_overview.json`: group id to type, object type and members
pub type AggregationOverview = BTreeMap<String, GroupOverview>;

pub fn overview(aggregation: &Aggregation, elements: &[ElementRecord]) -> AggregationOverview {
    aggregation
        .groups
        .iter()
        .map(|group| {
            let members = group
                .members
                .iter()
                .map(|&i| GroupMember {
                    name: elements[i].metadata.name.clone(),
                    global_id: elements[i].metadata.global_id.clone(),
                })
                .collect();
            (
                group.id.clone(),
                GroupOverview {
                    compiled_type: group.key.entity.clone(),
                    compiled_object_type: group.key.object_type.clone(),
                    elements: members,
                },
            )
        })
        .collect()
}
