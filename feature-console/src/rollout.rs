use serde::{Deserialize, Serialize};

use crate::api::ConsoleError;
use crate::flag_definitions::{FlagType, FlagValue};
use crate::value_coercion::{coerce, RawInput};

/// A percentage split between a primary value and a secondary one. `None` at
/// the owning field means no split at all, never a 0% rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    pub percentage: u8,
    #[serde(rename = "secondaryValue")]
    pub secondary_value: FlagValue,
}

impl Rollout {
    pub fn matches_type(&self, flag_type: FlagType) -> bool {
        self.secondary_value.matches_type(flag_type)
    }
}

/// The rollout section of an edit form. Percentage is kept wide here so an
/// out-of-range entry can be reported instead of silently clamped.
#[derive(Debug, Clone, Default)]
pub struct RolloutDraft {
    pub enabled: bool,
    pub percentage: i64,
    pub secondary_value: RawInput,
}

impl RolloutDraft {
    pub fn disabled() -> RolloutDraft {
        RolloutDraft::default()
    }

    pub fn enabled(percentage: i64, secondary_value: impl Into<RawInput>) -> RolloutDraft {
        RolloutDraft {
            enabled: true,
            percentage,
            secondary_value: secondary_value.into(),
        }
    }
}

/// Builds the optional rollout for a flag or override. Disabled drafts yield
/// `None` regardless of the other fields; enabled drafts must carry a
/// percentage in 0..=100 and a secondary value coercible to the flag's type.
pub fn build_rollout(
    draft: &RolloutDraft,
    flag_type: FlagType,
) -> Result<Option<Rollout>, ConsoleError> {
    if !draft.enabled {
        return Ok(None);
    }

    let percentage = u8::try_from(draft.percentage)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(ConsoleError::PercentageOutOfRange(draft.percentage))?;
    let secondary_value = coerce(&draft.secondary_value, flag_type)?;

    Ok(Some(Rollout { percentage, secondary_value }))
}
