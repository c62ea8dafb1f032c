use std::collections::HashMap;
use std::fmt::Write;

use sha1::{Digest, Sha1};

use crate::flag_definitions::{Feature, FlagValue};
use crate::rollout::Rollout;

const LONG_SCALE: u64 = 0xfffffffffffffff;

/// Computes a feature's effective value for one caller: the caller's segment
/// memberships pick the first matching override in stored order, and the
/// caller's identity buckets it into any rollout deterministically.
#[derive(Debug)]
pub struct FeatureResolver {
    pub caller_id: String,
    pub memberships: HashMap<String, Vec<String>>,
}

impl FeatureResolver {
    pub fn new(caller_id: String, memberships: HashMap<String, Vec<String>>) -> Self {
        FeatureResolver { caller_id, memberships }
    }

    /// First match wins: overrides are scanned from index 0, and only when
    /// none match do the feature's own rollout and base value apply.
    pub fn resolve(&self, feature: &Feature) -> FlagValue {
        for overridden in &feature.segments {
            if overridden.combo.matches(&self.memberships) {
                return self.apply_rollout(&feature.id, overridden.rollout.as_ref(), &overridden.value);
            }
        }
        self.apply_rollout(&feature.id, feature.rollout.as_ref(), &feature.value)
    }

    fn apply_rollout(
        &self,
        feature_id: &str,
        rollout: Option<&Rollout>,
        primary: &FlagValue,
    ) -> FlagValue {
        match rollout {
            Some(r) if self.is_bucketed(feature_id, r.percentage) => r.secondary_value.clone(),
            _ => primary.clone(),
        }
    }

    /// Whether this caller falls in the `percentage`% slice that receives the
    /// secondary value. Stable for a given caller and feature.
    pub fn is_bucketed(&self, feature_id: &str, percentage: u8) -> bool {
        if percentage == 0 {
            return false;
        }
        if percentage >= 100 {
            return true;
        }
        self.get_hash(feature_id, "") < f64::from(percentage) / 100.0
    }

    /// Takes the feature id and the caller identity and returns a float
    /// uniformly distributed in [0, 1). Given the same inputs it always
    /// returns the same float, so a 20% rollout is `hash < 0.2`.
    pub fn get_hash(&self, feature_id: &str, salt: &str) -> f64 {
        let hash_key = format!("{}.{}{}", feature_id, self.caller_id, salt);
        let mut hasher = Sha1::new();
        hasher.update(hash_key.as_bytes());
        let digest = hasher.finalize();
        let hex_str: String = digest.iter().fold(String::new(), |mut acc, byte| {
            let _ = write!(acc, "{:02x}", byte);
            acc
        })[..15]
            .to_string();
        // 15 hex chars always fit in a u64
        let hash_val = u64::from_str_radix(&hex_str, 16).unwrap_or(0);

        hash_val as f64 / LONG_SCALE as f64
    }
}
