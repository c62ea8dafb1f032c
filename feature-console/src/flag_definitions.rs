use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::override_list::OverrideList;
use crate::rollout::Rollout;
use crate::segment_combination::SegmentCombo;

/// The three value representations a flag can declare. Immutable once the
/// feature is created; every value written for the feature must match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Boolean,
    Number,
    String,
}

/// A typed flag value. Untagged so it round-trips through the store documents
/// as a bare JSON boolean/number/string, but closed so every coercion and
/// comparison site handles all three representations exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl FlagValue {
    pub fn flag_type(&self) -> FlagType {
        match self {
            FlagValue::Boolean(_) => FlagType::Boolean,
            FlagValue::Number(_) => FlagType::Number,
            FlagValue::String(_) => FlagType::String,
        }
    }

    pub fn matches_type(&self, flag_type: FlagType) -> bool {
        self.flag_type() == flag_type
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagValue::Boolean(b) => write!(f, "{}", b),
            FlagValue::Number(n) => write!(f, "{}", n),
            FlagValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// One segment-scoped override layered on top of a feature's base value.
/// Position in the owning list encodes evaluation priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOverride {
    pub combo: SegmentCombo,
    pub value: FlagValue,
    #[serde(default)]
    pub rollout: Option<Rollout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub value: FlagValue,
    #[serde(default)]
    pub rollout: Option<Rollout>,
    #[serde(default)]
    pub segments: OverrideList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// A platform's full document as fetched from the store. Re-fetched whole
/// after every mutation; never merged into client-side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlatformData {
    pub groups: Vec<FeatureGroup>,
}

impl PlatformData {
    pub fn find_group(&self, group_id: &str) -> Option<&FeatureGroup> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    /// Feature ids are unique per platform; mutations address them without a
    /// group qualifier, so lookups scan across groups.
    pub fn find_feature(&self, feature_id: &str) -> Option<&Feature> {
        self.groups
            .iter()
            .flat_map(|g| g.features.iter())
            .find(|f| f.id == feature_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDefinition {
    pub description: String,
    pub values: Vec<String>,
}

/// Reference data describing the available segment dimensions and their
/// allowed values. Owned by the store, fetched read-only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentCatalog(pub HashMap<String, SegmentDefinition>);

impl SegmentCatalog {
    pub fn definition(&self, segment_type: &str) -> Option<&SegmentDefinition> {
        self.0.get(segment_type)
    }

    pub fn allows(&self, segment_type: &str, value: &str) -> bool {
        self.definition(segment_type)
            .map(|d| d.values.iter().any(|v| v == value))
            .unwrap_or(false)
    }
}

/// One audit-trail entry. Append-only from the console's viewpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub user: String,
    pub action: String,
    pub timestamp: String,
    #[serde(default)]
    pub segment: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<FlagValue>,
    #[serde(default)]
    pub rollout: Option<Rollout>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flag_value_round_trips_as_bare_json() {
        let value: FlagValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(value, FlagValue::Boolean(true));

        let value: FlagValue = serde_json::from_value(json!(12.5)).unwrap();
        assert_eq!(value, FlagValue::Number(12.5));

        let value: FlagValue = serde_json::from_value(json!(10)).unwrap();
        assert_eq!(value, FlagValue::Number(10.0));

        let value: FlagValue = serde_json::from_value(json!("variant-b")).unwrap();
        assert_eq!(value, FlagValue::String("variant-b".to_string()));

        assert_eq!(serde_json::to_value(FlagValue::Boolean(false)).unwrap(), json!(false));
    }

    #[test]
    fn test_feature_document_deserializes() {
        let feature: Feature = serde_json::from_value(json!({
            "id": "dark-mode",
            "description": "Dark mode toggle",
            "type": "boolean",
            "value": false,
            "rollout": null,
            "segments": [
                {
                    "combo": {"country": ["US", "CA"]},
                    "value": true,
                    "rollout": {"percentage": 25, "secondaryValue": false}
                }
            ]
        }))
        .expect("feature document should deserialize");

        assert_eq!(feature.flag_type, FlagType::Boolean);
        assert_eq!(feature.value, FlagValue::Boolean(false));
        assert!(feature.rollout.is_none());
        assert_eq!(feature.segments.len(), 1);
        let ov = feature.segments.get(0).unwrap();
        assert_eq!(ov.value, FlagValue::Boolean(true));
        assert_eq!(ov.rollout.as_ref().unwrap().percentage, 25);
    }

    #[test]
    fn test_feature_with_mistyped_type_field_is_rejected() {
        let result: Result<Feature, _> = serde_json::from_value(json!({
            "id": "dark-mode",
            "description": "Dark mode toggle",
            "type": "toggle",
            "value": false
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_platform_data_feature_lookup_scans_groups() {
        let data: PlatformData = serde_json::from_value(json!({
            "groups": [
                {"id": "ui", "description": "UI flags", "features": []},
                {
                    "id": "checkout",
                    "description": "Checkout flags",
                    "features": [
                        {"id": "one-click", "description": "One click buy", "type": "boolean", "value": true}
                    ]
                }
            ]
        }))
        .unwrap();

        assert!(data.find_group("ui").is_some());
        assert!(data.find_group("payments").is_none());
        assert_eq!(data.find_feature("one-click").unwrap().value, FlagValue::Boolean(true));
        assert!(data.find_feature("two-click").is_none());
    }

    #[test]
    fn test_segment_catalog_lookup() {
        let catalog: SegmentCatalog = serde_json::from_value(json!({
            "country": {"description": "Country of the caller", "values": ["US", "CA", "DE"]}
        }))
        .unwrap();

        assert!(catalog.allows("country", "US"));
        assert!(!catalog.allows("country", "FR"));
        assert!(!catalog.allows("platform", "ios"));
    }
}
