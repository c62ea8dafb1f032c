use serde::{Deserialize, Serialize};

use crate::api::ConsoleError;
use crate::flag_definitions::{FlagType, FlagValue, SegmentOverride};
use crate::rollout::Rollout;
use crate::segment_combination::SegmentCombo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// The ordered override sequence of a feature. Index 0 is checked first
/// during resolution; order changes only through adjacent swaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideList(Vec<SegmentOverride>);

impl OverrideList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SegmentOverride> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SegmentOverride> {
        self.0.iter()
    }

    /// Appends at the end (lowest priority). The override's combo must be
    /// non-empty and its values must match the owning feature's type.
    pub fn insert(
        &mut self,
        overridden: SegmentOverride,
        flag_type: FlagType,
    ) -> Result<(), ConsoleError> {
        if overridden.combo.is_empty() {
            return Err(ConsoleError::EmptyCombination);
        }
        if !overridden.value.matches_type(flag_type) {
            return Err(ConsoleError::TypeMismatch { expected: flag_type });
        }
        if let Some(rollout) = &overridden.rollout {
            if !rollout.matches_type(flag_type) {
                return Err(ConsoleError::TypeMismatch { expected: flag_type });
            }
        }
        self.0.push(overridden);
        Ok(())
    }

    /// Removes the override at `index`; later overrides shift up, no gaps.
    pub fn remove(&mut self, index: usize) -> Result<SegmentOverride, ConsoleError> {
        if index >= self.0.len() {
            return Err(ConsoleError::IndexOutOfBounds(index));
        }
        Ok(self.0.remove(index))
    }

    /// Swaps with the previous position. Returns false for the no-op at the
    /// top of the list.
    pub fn move_up(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.0.len() {
            return false;
        }
        self.0.swap(index - 1, index);
        true
    }

    /// Swaps with the next position. Returns false for the no-op at the
    /// bottom of the list.
    pub fn move_down(&mut self, index: usize) -> bool {
        if index + 1 >= self.0.len() {
            return false;
        }
        self.0.swap(index, index + 1);
        true
    }

    /// Index of the override targeting the given combination, if any.
    /// Identity is the combo's segments and values, not its polarity.
    pub fn position_of(&self, combo: &SegmentCombo) -> Option<usize> {
        self.0.iter().position(|ov| ov.combo.same_target(combo))
    }

    /// Replaces what an existing override resolves to. The combo membership
    /// itself stays frozen; retargeting means delete and recreate.
    pub fn edit_resolution(
        &mut self,
        index: usize,
        value: FlagValue,
        rollout: Option<Rollout>,
        flag_type: FlagType,
    ) -> Result<(), ConsoleError> {
        if !value.matches_type(flag_type) {
            return Err(ConsoleError::TypeMismatch { expected: flag_type });
        }
        if let Some(r) = &rollout {
            if !r.matches_type(flag_type) {
                return Err(ConsoleError::TypeMismatch { expected: flag_type });
            }
        }
        let overridden = self
            .0
            .get_mut(index)
            .ok_or(ConsoleError::IndexOutOfBounds(index))?;
        overridden.value = value;
        overridden.rollout = rollout;
        Ok(())
    }

    /// Flips inclusion polarity for one entry of an existing override.
    pub fn set_polarity(
        &mut self,
        index: usize,
        segment_type: &str,
        include: bool,
    ) -> Result<(), ConsoleError> {
        let overridden = self
            .0
            .get_mut(index)
            .ok_or(ConsoleError::IndexOutOfBounds(index))?;
        overridden.combo.set_polarity(segment_type, include)
    }

    /// Rebuilds the list in the given order. The order must be a permutation
    /// of the current indices; anything else leaves the list untouched.
    pub fn apply_order(&mut self, order: &[usize]) -> Result<(), ConsoleError> {
        if order.len() != self.0.len() {
            return Err(ConsoleError::InvalidOrder);
        }
        let mut seen = vec![false; self.0.len()];
        for &index in order {
            if index >= self.0.len() || seen[index] {
                return Err(ConsoleError::InvalidOrder);
            }
            seen[index] = true;
        }
        self.0 = order.iter().map(|&i| self.0[i].clone()).collect();
        Ok(())
    }
}

impl<'a> IntoIterator for &'a OverrideList {
    type Item = &'a SegmentOverride;
    type IntoIter = std::slice::Iter<'a, SegmentOverride>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The full new ordering an adjacent move produces, ready to submit as one
/// reorder mutation. `None` when the move is a no-op (already at the edge).
pub fn moved_order(len: usize, index: usize, direction: MoveDirection) -> Option<Vec<usize>> {
    if index >= len {
        return None;
    }
    let mut order: Vec<usize> = (0..len).collect();
    match direction {
        MoveDirection::Up if index > 0 => order.swap(index - 1, index),
        MoveDirection::Down if index + 1 < len => order.swap(index, index + 1),
        _ => return None,
    }
    Some(order)
}
