use serde::{Deserialize, Serialize};

use crate::flag_definitions::{FlagType, FlagValue};
use crate::rollout::Rollout;
use crate::segment_combination::SegmentCombo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPayload {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeaturePayload {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub value: FlagValue,
    pub group_id: String,
}

/// Every mutation the store accepts, tagged by its `action` field. The wire
/// shapes are fixed; a new operation means a new variant, not a loose map.
///
/// `ChangeFeatureValue` doubles as override upsert: an empty
/// `segmentCombination` edits the feature's base value and rollout, a
/// non-empty one creates or updates the override targeting that combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum MutationRequest {
    CreateGroup {
        platform: String,
        #[serde(rename = "featureGroup")]
        feature_group: GroupPayload,
    },
    DeleteGroup {
        platform: String,
        #[serde(rename = "featureGroup")]
        feature_group: GroupPayload,
    },
    CreateFeature {
        platform: String,
        feature: NewFeaturePayload,
    },
    DeleteFeature {
        platform: String,
        feature: FeatureRef,
    },
    #[serde(rename_all = "camelCase")]
    ChangeFeatureValue {
        platform: String,
        feature: FeatureRef,
        feature_value: FlagValue,
        rollout: Option<Rollout>,
        segment_combination: SegmentCombo,
    },
    #[serde(rename_all = "camelCase")]
    DeleteSegmentForFeature {
        platform: String,
        feature: FeatureRef,
        segment_combination: SegmentCombo,
    },
    #[serde(rename_all = "camelCase")]
    ReorderFeatureSegments {
        platform: String,
        feature: FeatureRef,
        new_segment_order: Vec<usize>,
    },
}

impl MutationRequest {
    pub fn action(&self) -> &'static str {
        match self {
            MutationRequest::CreateGroup { .. } => "create-group",
            MutationRequest::DeleteGroup { .. } => "delete-group",
            MutationRequest::CreateFeature { .. } => "create-feature",
            MutationRequest::DeleteFeature { .. } => "delete-feature",
            MutationRequest::ChangeFeatureValue { .. } => "change-feature-value",
            MutationRequest::DeleteSegmentForFeature { .. } => "delete-segment-for-feature",
            MutationRequest::ReorderFeatureSegments { .. } => "reorder-feature-segments",
        }
    }

    pub fn platform(&self) -> &str {
        match self {
            MutationRequest::CreateGroup { platform, .. }
            | MutationRequest::DeleteGroup { platform, .. }
            | MutationRequest::CreateFeature { platform, .. }
            | MutationRequest::DeleteFeature { platform, .. }
            | MutationRequest::ChangeFeatureValue { platform, .. }
            | MutationRequest::DeleteSegmentForFeature { platform, .. }
            | MutationRequest::ReorderFeatureSegments { platform, .. } => platform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment_combination::ComboEntryDraft;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn test_create_group_wire_shape() {
        let mutation = MutationRequest::CreateGroup {
            platform: "web".to_string(),
            feature_group: GroupPayload {
                id: "checkout".to_string(),
                description: Some("Checkout flags".to_string()),
            },
        };

        assert_json_eq!(
            serde_json::to_value(&mutation).unwrap(),
            json!({
                "action": "create-group",
                "platform": "web",
                "featureGroup": {"id": "checkout", "description": "Checkout flags"}
            })
        );
    }

    #[test]
    fn test_delete_group_sends_only_the_id() {
        let mutation = MutationRequest::DeleteGroup {
            platform: "web".to_string(),
            feature_group: GroupPayload { id: "checkout".to_string(), description: None },
        };

        assert_json_eq!(
            serde_json::to_value(&mutation).unwrap(),
            json!({
                "action": "delete-group",
                "platform": "web",
                "featureGroup": {"id": "checkout"}
            })
        );
    }

    #[test]
    fn test_change_feature_value_wire_shape() {
        let combo = SegmentCombo::build(vec![ComboEntryDraft::exclude("country", &["US"])])
            .unwrap();
        let mutation = MutationRequest::ChangeFeatureValue {
            platform: "web".to_string(),
            feature: FeatureRef { id: "dark-mode".to_string() },
            feature_value: FlagValue::Boolean(true),
            rollout: Some(Rollout {
                percentage: 30,
                secondary_value: FlagValue::Boolean(false),
            }),
            segment_combination: combo,
        };

        assert_json_eq!(
            serde_json::to_value(&mutation).unwrap(),
            json!({
                "action": "change-feature-value",
                "platform": "web",
                "feature": {"id": "dark-mode"},
                "featureValue": true,
                "rollout": {"percentage": 30, "secondaryValue": false},
                "segmentCombination": {"country": ["!US"]}
            })
        );
    }

    #[test]
    fn test_base_value_edit_sends_empty_combination_and_null_rollout() {
        let mutation = MutationRequest::ChangeFeatureValue {
            platform: "web".to_string(),
            feature: FeatureRef { id: "greeting".to_string() },
            feature_value: FlagValue::String("hi".to_string()),
            rollout: None,
            segment_combination: SegmentCombo::default(),
        };

        assert_json_eq!(
            serde_json::to_value(&mutation).unwrap(),
            json!({
                "action": "change-feature-value",
                "platform": "web",
                "feature": {"id": "greeting"},
                "featureValue": "hi",
                "rollout": null,
                "segmentCombination": {}
            })
        );
    }

    #[test]
    fn test_reorder_wire_shape() {
        let mutation = MutationRequest::ReorderFeatureSegments {
            platform: "web".to_string(),
            feature: FeatureRef { id: "dark-mode".to_string() },
            new_segment_order: vec![1, 0, 2],
        };

        let encoded = serde_json::to_value(&mutation).unwrap();
        assert_json_eq!(
            encoded,
            json!({
                "action": "reorder-feature-segments",
                "platform": "web",
                "feature": {"id": "dark-mode"},
                "newSegmentOrder": [1, 0, 2]
            })
        );

        // tagged enums round-trip, which the mock store relies on
        let decoded: MutationRequest = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, mutation);
        assert_eq!(decoded.action(), "reorder-feature-segments");
        assert_eq!(decoded.platform(), "web");
    }
}
