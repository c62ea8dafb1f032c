use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::Config;
use crate::flag_definitions::{
    Feature, FeatureGroup, LogEntry, PlatformData, SegmentCatalog,
};
use crate::mutation_request::MutationRequest;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("not found in store")]
    NotFound,
    #[error("timed out while waiting for the store")]
    Timeout(#[from] tokio::time::error::Elapsed),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The data-access contract the console consumes. Reads come from static
/// documents, writes go through a single mutation endpoint; the store is the
/// only authority on state, so callers re-fetch after every submit.
#[async_trait]
pub trait StoreClient {
    async fn get_platforms(&self) -> Result<Vec<String>, StoreError>;
    async fn get_platform_data(&self, platform: &str) -> Result<PlatformData, StoreError>;
    async fn get_segment_catalog(&self) -> Result<SegmentCatalog, StoreError>;
    async fn get_logs(
        &self,
        platform: &str,
        group_id: &str,
        feature_id: Option<&str>,
    ) -> Result<Vec<LogEntry>, StoreError>;
    async fn submit(&self, mutation: &MutationRequest) -> Result<(), StoreError>;
}

pub struct HttpStoreClient {
    client: reqwest::Client,
    config: Config,
}

impl HttpStoreClient {
    pub fn new(config: Config) -> Result<HttpStoreClient, StoreError> {
        let client = reqwest::Client::builder().build()?;
        Ok(HttpStoreClient { client, config })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.request_timeout_ms)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, StoreError> {
        let response = timeout(self.request_timeout(), self.client.get(&url).send()).await??;
        match response.status() {
            status if status.is_success() => {
                Ok(timeout(self.request_timeout(), response.json::<T>()).await??)
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            status => Err(StoreError::Status(status.as_u16())),
        }
    }
}

#[async_trait]
impl StoreClient for HttpStoreClient {
    async fn get_platforms(&self) -> Result<Vec<String>, StoreError> {
        self.get_json(format!("{}/platforms.json", self.config.static_base_url))
            .await
    }

    async fn get_platform_data(&self, platform: &str) -> Result<PlatformData, StoreError> {
        self.get_json(format!(
            "{}/platforms/{}.json",
            self.config.static_base_url, platform
        ))
        .await
    }

    async fn get_segment_catalog(&self) -> Result<SegmentCatalog, StoreError> {
        self.get_json(format!("{}/segments.json", self.config.static_base_url))
            .await
    }

    async fn get_logs(
        &self,
        platform: &str,
        group_id: &str,
        feature_id: Option<&str>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let url = match feature_id {
            Some(feature_id) => format!(
                "{}/logs/{}/{}/{}.json",
                self.config.static_base_url, platform, group_id, feature_id
            ),
            None => format!(
                "{}/logs/{}/{}.json",
                self.config.static_base_url, platform, group_id
            ),
        };
        self.get_json(url).await
    }

    async fn submit(&self, mutation: &MutationRequest) -> Result<(), StoreError> {
        let request = self
            .client
            .post(&self.config.api_base_url)
            .header(AUTHORIZATION, &self.config.auth_token)
            .json(mutation)
            .send();
        let response = timeout(self.request_timeout(), request).await??;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(StoreError::NotFound)
        } else {
            Err(StoreError::Status(status.as_u16()))
        }
    }
}

#[derive(Default)]
struct MockStoreState {
    platforms: HashMap<String, PlatformData>,
    catalog: SegmentCatalog,
    logs: HashMap<String, Vec<LogEntry>>,
    submitted: Vec<MutationRequest>,
    fail_submissions: bool,
}

/// An in-memory store that applies mutations the way the real backend
/// observably does, so tests can exercise the full mutate-then-refetch loop
/// without a server.
#[derive(Clone, Default)]
pub struct MockStoreClient {
    state: Arc<Mutex<MockStoreState>>,
}

impl MockStoreClient {
    pub fn new() -> MockStoreClient {
        MockStoreClient::default()
    }

    pub fn with_platform(self, name: &str, data: PlatformData) -> Self {
        self.lock().platforms.insert(name.to_string(), data);
        self
    }

    pub fn with_catalog(self, catalog: SegmentCatalog) -> Self {
        self.lock().catalog = catalog;
        self
    }

    pub fn with_logs(
        self,
        platform: &str,
        group_id: &str,
        feature_id: Option<&str>,
        entries: Vec<LogEntry>,
    ) -> Self {
        self.lock().logs.insert(log_key(platform, group_id, feature_id), entries);
        self
    }

    /// Every submit fails with a 500 until further notice.
    pub fn fail_submissions(self) -> Self {
        self.lock().fail_submissions = true;
        self
    }

    /// Everything submitted so far, in order.
    pub fn submitted(&self) -> Vec<MutationRequest> {
        self.lock().submitted.clone()
    }

    /// Current server-side document for a platform.
    pub fn platform_snapshot(&self, name: &str) -> Option<PlatformData> {
        self.lock().platforms.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockStoreState> {
        self.state.lock().expect("mock store lock poisoned")
    }
}

fn log_key(platform: &str, group_id: &str, feature_id: Option<&str>) -> String {
    match feature_id {
        Some(feature_id) => format!("{}/{}/{}", platform, group_id, feature_id),
        None => format!("{}/{}", platform, group_id),
    }
}

fn feature_mut<'a>(data: &'a mut PlatformData, feature_id: &str) -> Option<&'a mut Feature> {
    data.groups
        .iter_mut()
        .flat_map(|g| g.features.iter_mut())
        .find(|f| f.id == feature_id)
}

fn apply(state: &mut MockStoreState, mutation: &MutationRequest) -> Result<(), StoreError> {
    match mutation {
        MutationRequest::CreateGroup { platform, feature_group } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            if data.find_group(&feature_group.id).is_some() {
                return Err(StoreError::Status(409));
            }
            data.groups.push(FeatureGroup {
                id: feature_group.id.clone(),
                description: feature_group.description.clone().unwrap_or_default(),
                features: vec![],
            });
        }
        MutationRequest::DeleteGroup { platform, feature_group } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            let before = data.groups.len();
            // dropping the group drops its features with it
            data.groups.retain(|g| g.id != feature_group.id);
            if data.groups.len() == before {
                return Err(StoreError::NotFound);
            }
        }
        MutationRequest::CreateFeature { platform, feature } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            if data.find_feature(&feature.id).is_some() {
                return Err(StoreError::Status(409));
            }
            let group = data
                .groups
                .iter_mut()
                .find(|g| g.id == feature.group_id)
                .ok_or(StoreError::NotFound)?;
            group.features.push(Feature {
                id: feature.id.clone(),
                description: feature.description.clone(),
                flag_type: feature.flag_type,
                value: feature.value.clone(),
                rollout: None,
                segments: Default::default(),
            });
        }
        MutationRequest::DeleteFeature { platform, feature } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            let mut deleted = false;
            for group in &mut data.groups {
                let before = group.features.len();
                group.features.retain(|f| f.id != feature.id);
                deleted |= group.features.len() != before;
            }
            if !deleted {
                return Err(StoreError::NotFound);
            }
        }
        MutationRequest::ChangeFeatureValue {
            platform,
            feature,
            feature_value,
            rollout,
            segment_combination,
        } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            let feature = feature_mut(data, &feature.id).ok_or(StoreError::NotFound)?;
            if !feature_value.matches_type(feature.flag_type) {
                return Err(StoreError::Status(400));
            }
            // checked before any write so a rejected submit cannot leave a
            // half-applied document behind
            if let Some(rollout) = rollout {
                if !rollout.matches_type(feature.flag_type) {
                    return Err(StoreError::Status(400));
                }
            }

            if segment_combination.is_empty() {
                feature.value = feature_value.clone();
                feature.rollout = rollout.clone();
            } else {
                // upsert keyed by combo target: edit in place or append
                let overridden = crate::flag_definitions::SegmentOverride {
                    combo: segment_combination.clone(),
                    value: feature_value.clone(),
                    rollout: rollout.clone(),
                };
                match feature.segments.position_of(segment_combination) {
                    Some(index) => {
                        feature
                            .segments
                            .remove(index)
                            .map_err(|_| StoreError::Status(400))?;
                        let mut reordered: Vec<usize> = (0..feature.segments.len()).collect();
                        feature
                            .segments
                            .insert(overridden, feature.flag_type)
                            .map_err(|_| StoreError::Status(400))?;
                        // put the edited override back at its old priority
                        reordered.insert(index, feature.segments.len() - 1);
                        feature
                            .segments
                            .apply_order(&reordered)
                            .map_err(|_| StoreError::Status(400))?;
                    }
                    None => {
                        feature
                            .segments
                            .insert(overridden, feature.flag_type)
                            .map_err(|_| StoreError::Status(400))?;
                    }
                }
            }
        }
        MutationRequest::DeleteSegmentForFeature { platform, feature, segment_combination } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            let feature = feature_mut(data, &feature.id).ok_or(StoreError::NotFound)?;
            let index = feature
                .segments
                .position_of(segment_combination)
                .ok_or(StoreError::NotFound)?;
            feature
                .segments
                .remove(index)
                .map_err(|_| StoreError::Status(400))?;
        }
        MutationRequest::ReorderFeatureSegments { platform, feature, new_segment_order } => {
            let data = state
                .platforms
                .get_mut(platform)
                .ok_or(StoreError::NotFound)?;
            let feature = feature_mut(data, &feature.id).ok_or(StoreError::NotFound)?;
            feature
                .segments
                .apply_order(new_segment_order)
                .map_err(|_| StoreError::Status(400))?;
        }
    }
    Ok(())
}

#[async_trait]
impl StoreClient for MockStoreClient {
    async fn get_platforms(&self) -> Result<Vec<String>, StoreError> {
        let mut platforms: Vec<String> = self.lock().platforms.keys().cloned().collect();
        platforms.sort();
        Ok(platforms)
    }

    async fn get_platform_data(&self, platform: &str) -> Result<PlatformData, StoreError> {
        self.lock()
            .platforms
            .get(platform)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_segment_catalog(&self) -> Result<SegmentCatalog, StoreError> {
        Ok(self.lock().catalog.clone())
    }

    async fn get_logs(
        &self,
        platform: &str,
        group_id: &str,
        feature_id: Option<&str>,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.lock()
            .logs
            .get(&log_key(platform, group_id, feature_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn submit(&self, mutation: &MutationRequest) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.submitted.push(mutation.clone());
        if state.fail_submissions {
            return Err(StoreError::Status(500));
        }
        apply(&mut state, mutation)
    }
}
