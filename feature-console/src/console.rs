use std::sync::Arc;

use tracing::instrument;

use crate::api::ConsoleError;
use crate::flag_definitions::{Feature, FlagType, LogEntry, PlatformData, SegmentCatalog};
use crate::mutation_request::{FeatureRef, GroupPayload, MutationRequest, NewFeaturePayload};
use crate::override_list::{moved_order, MoveDirection};
use crate::rollout::{build_rollout, RolloutDraft};
use crate::segment_combination::{ComboEntryDraft, SegmentCombo};
use crate::store::StoreClient;
use crate::value_coercion::{coerce, RawInput};

#[derive(Debug, Clone, Default)]
pub struct GroupDraft {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct FeatureDraft {
    pub id: String,
    pub description: String,
    pub flag_type: FlagType,
    pub value: RawInput,
}

/// The add/edit segment form: combination rows plus the override's own value
/// and optional rollout.
#[derive(Debug, Clone, Default)]
pub struct OverrideDraft {
    pub entries: Vec<ComboEntryDraft>,
    pub value: RawInput,
    pub rollout: RolloutDraft,
}

/// The operator-facing surface. Holds no state between operations: every
/// mutation validates locally, submits once, then re-fetches the owning
/// platform's document and hands it back. Nothing here retries, and nothing
/// merges — a failed submit simply leaves the last fetched data stale.
pub struct FeatureConsole {
    store: Arc<dyn StoreClient + Send + Sync>,
}

impl FeatureConsole {
    pub fn new(store: Arc<dyn StoreClient + Send + Sync>) -> FeatureConsole {
        FeatureConsole { store }
    }

    #[instrument(skip_all)]
    pub async fn platforms(&self) -> Result<Vec<String>, ConsoleError> {
        Ok(self.store.get_platforms().await?)
    }

    #[instrument(skip_all, fields(platform = platform))]
    pub async fn platform_data(&self, platform: &str) -> Result<PlatformData, ConsoleError> {
        Ok(self.store.get_platform_data(platform).await?)
    }

    #[instrument(skip_all)]
    pub async fn segment_catalog(&self) -> Result<SegmentCatalog, ConsoleError> {
        Ok(self.store.get_segment_catalog().await?)
    }

    #[instrument(skip_all, fields(platform = platform, group_id = group_id))]
    pub async fn logs(
        &self,
        platform: &str,
        group_id: &str,
        feature_id: Option<&str>,
    ) -> Result<Vec<LogEntry>, ConsoleError> {
        Ok(self.store.get_logs(platform, group_id, feature_id).await?)
    }

    #[instrument(skip_all, fields(platform = platform))]
    pub async fn create_group(
        &self,
        platform: &str,
        draft: GroupDraft,
    ) -> Result<PlatformData, ConsoleError> {
        if draft.id.is_empty() {
            return Err(ConsoleError::MissingRequiredField("group id"));
        }
        if draft.description.is_empty() {
            return Err(ConsoleError::MissingRequiredField("group description"));
        }
        self.submit_and_refresh(
            platform,
            MutationRequest::CreateGroup {
                platform: platform.to_string(),
                feature_group: GroupPayload {
                    id: draft.id,
                    description: Some(draft.description),
                },
            },
        )
        .await
    }

    #[instrument(skip_all, fields(platform = platform, group_id = group_id))]
    pub async fn delete_group(
        &self,
        platform: &str,
        group_id: &str,
    ) -> Result<PlatformData, ConsoleError> {
        self.submit_and_refresh(
            platform,
            MutationRequest::DeleteGroup {
                platform: platform.to_string(),
                feature_group: GroupPayload { id: group_id.to_string(), description: None },
            },
        )
        .await
    }

    #[instrument(skip_all, fields(platform = platform, group_id = group_id))]
    pub async fn create_feature(
        &self,
        platform: &str,
        group_id: &str,
        draft: FeatureDraft,
    ) -> Result<PlatformData, ConsoleError> {
        if draft.id.is_empty() {
            return Err(ConsoleError::MissingRequiredField("feature id"));
        }
        if draft.description.is_empty() {
            return Err(ConsoleError::MissingRequiredField("feature description"));
        }
        let value = coerce(&draft.value, draft.flag_type)?;
        self.submit_and_refresh(
            platform,
            MutationRequest::CreateFeature {
                platform: platform.to_string(),
                feature: NewFeaturePayload {
                    id: draft.id,
                    description: draft.description,
                    flag_type: draft.flag_type,
                    value,
                    group_id: group_id.to_string(),
                },
            },
        )
        .await
    }

    #[instrument(skip_all, fields(platform = platform, feature_id = feature_id))]
    pub async fn delete_feature(
        &self,
        platform: &str,
        feature_id: &str,
    ) -> Result<PlatformData, ConsoleError> {
        self.submit_and_refresh(
            platform,
            MutationRequest::DeleteFeature {
                platform: platform.to_string(),
                feature: FeatureRef { id: feature_id.to_string() },
            },
        )
        .await
    }

    /// Edits a feature's base value and rollout. The empty segment
    /// combination in the payload is what routes this to the base value
    /// rather than an override.
    #[instrument(skip_all, fields(platform = platform, feature_id = %feature.id))]
    pub async fn change_feature_value(
        &self,
        platform: &str,
        feature: &Feature,
        value: RawInput,
        rollout: RolloutDraft,
    ) -> Result<PlatformData, ConsoleError> {
        let feature_value = coerce(&value, feature.flag_type)?;
        let rollout = build_rollout(&rollout, feature.flag_type)?;
        self.submit_and_refresh(
            platform,
            MutationRequest::ChangeFeatureValue {
                platform: platform.to_string(),
                feature: FeatureRef { id: feature.id.clone() },
                feature_value,
                rollout,
                segment_combination: SegmentCombo::default(),
            },
        )
        .await
    }

    /// Creates a segment override, or updates the one already targeting the
    /// same combination. The combination is validated against the live
    /// segment catalog before anything is submitted.
    #[instrument(skip_all, fields(platform = platform, feature_id = %feature.id))]
    pub async fn upsert_segment_override(
        &self,
        platform: &str,
        feature: &Feature,
        draft: OverrideDraft,
    ) -> Result<PlatformData, ConsoleError> {
        let combo = SegmentCombo::build(draft.entries)?;
        let catalog = self.store.get_segment_catalog().await?;
        combo.validate_against(&catalog)?;

        let feature_value = coerce(&draft.value, feature.flag_type)?;
        let rollout = build_rollout(&draft.rollout, feature.flag_type)?;

        self.submit_and_refresh(
            platform,
            MutationRequest::ChangeFeatureValue {
                platform: platform.to_string(),
                feature: FeatureRef { id: feature.id.clone() },
                feature_value,
                rollout,
                segment_combination: combo,
            },
        )
        .await
    }

    /// Deletes the override at `index`. Overrides are addressed on the wire
    /// by their combination, so the index is resolved against the caller's
    /// fetched copy of the feature first.
    #[instrument(skip_all, fields(platform = platform, feature_id = %feature.id))]
    pub async fn delete_segment_override(
        &self,
        platform: &str,
        feature: &Feature,
        index: usize,
    ) -> Result<PlatformData, ConsoleError> {
        let overridden = feature
            .segments
            .get(index)
            .ok_or(ConsoleError::IndexOutOfBounds(index))?;
        self.submit_and_refresh(
            platform,
            MutationRequest::DeleteSegmentForFeature {
                platform: platform.to_string(),
                feature: FeatureRef { id: feature.id.clone() },
                segment_combination: overridden.combo.clone(),
            },
        )
        .await
    }

    pub async fn move_override_up(
        &self,
        platform: &str,
        feature: &Feature,
        index: usize,
    ) -> Result<PlatformData, ConsoleError> {
        self.move_override(platform, feature, index, MoveDirection::Up).await
    }

    pub async fn move_override_down(
        &self,
        platform: &str,
        feature: &Feature,
        index: usize,
    ) -> Result<PlatformData, ConsoleError> {
        self.move_override(platform, feature, index, MoveDirection::Down).await
    }

    /// Submits the whole new ordering in one mutation. Edge moves submit
    /// nothing and just hand back a fresh fetch.
    #[instrument(skip_all, fields(platform = platform, feature_id = %feature.id, index = index))]
    pub async fn move_override(
        &self,
        platform: &str,
        feature: &Feature,
        index: usize,
        direction: MoveDirection,
    ) -> Result<PlatformData, ConsoleError> {
        if index >= feature.segments.len() {
            return Err(ConsoleError::IndexOutOfBounds(index));
        }
        match moved_order(feature.segments.len(), index, direction) {
            Some(new_order) => {
                self.submit_and_refresh(
                    platform,
                    MutationRequest::ReorderFeatureSegments {
                        platform: platform.to_string(),
                        feature: FeatureRef { id: feature.id.clone() },
                        new_segment_order: new_order,
                    },
                )
                .await
            }
            None => self.platform_data(platform).await,
        }
    }

    async fn submit_and_refresh(
        &self,
        platform: &str,
        mutation: MutationRequest,
    ) -> Result<PlatformData, ConsoleError> {
        self.store.submit(&mutation).await.map_err(|e| {
            tracing::error!(action = mutation.action(), "mutation failed: {}", e);
            ConsoleError::from(e)
        })?;
        // server state is authoritative after a write; never merge locally
        Ok(self.store.get_platform_data(platform).await?)
    }
}
