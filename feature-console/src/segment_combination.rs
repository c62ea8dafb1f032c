use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::api::ConsoleError;
use crate::flag_definitions::SegmentCatalog;

/// One conjunct of a combination: a segment dimension, the values it targets,
/// and whether the caller must be in (`include`) or out of that set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComboEntry {
    pub segment_type: String,
    pub values: Vec<String>,
    pub include: bool,
}

/// An editable row of the combination form. May be blank; blanks are stripped
/// when the combination is built.
#[derive(Debug, Clone, Default)]
pub struct ComboEntryDraft {
    pub segment_type: String,
    pub values: Vec<String>,
    pub include: bool,
}

impl ComboEntryDraft {
    pub fn include(segment_type: &str, values: &[&str]) -> ComboEntryDraft {
        ComboEntryDraft {
            segment_type: segment_type.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            include: true,
        }
    }

    pub fn exclude(segment_type: &str, values: &[&str]) -> ComboEntryDraft {
        ComboEntryDraft {
            include: false,
            ..ComboEntryDraft::include(segment_type, values)
        }
    }

    fn is_blank(&self) -> bool {
        self.segment_type.is_empty() && self.values.is_empty()
    }
}

/// A conjunctive predicate over segment dimensions: a caller matches iff
/// every entry accepts it. Polarity is a first-class field internally; the
/// `!value` marker encoding exists only at the serde boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentCombo {
    entries: Vec<ComboEntry>,
}

impl SegmentCombo {
    /// Builds a validated combination from form entries. Blank rows are
    /// dropped; a row with values but no selected segment type is an error,
    /// as is a selected type with no values, a repeated type, or a
    /// combination that ends up with no entries at all.
    pub fn build(drafts: Vec<ComboEntryDraft>) -> Result<SegmentCombo, ConsoleError> {
        let mut entries = Vec::with_capacity(drafts.len());
        let mut seen: HashSet<String> = HashSet::new();

        for draft in drafts {
            if draft.is_blank() {
                continue;
            }
            if draft.segment_type.is_empty() {
                return Err(ConsoleError::MissingSegmentType);
            }
            if draft.values.is_empty() {
                return Err(ConsoleError::EmptyValues(draft.segment_type));
            }
            // `!` is the polarity marker on the wire; a value carrying it
            // would decode with flipped polarity
            if let Some(value) = draft.values.iter().find(|v| v.starts_with('!')) {
                return Err(ConsoleError::ReservedValueMarker(value.clone()));
            }
            if !seen.insert(draft.segment_type.clone()) {
                return Err(ConsoleError::DuplicateSegmentType(draft.segment_type));
            }
            entries.push(ComboEntry {
                segment_type: draft.segment_type,
                values: draft.values,
                include: draft.include,
            });
        }

        if entries.is_empty() {
            return Err(ConsoleError::EmptyCombination);
        }
        Ok(SegmentCombo { entries })
    }

    pub fn entries(&self) -> &[ComboEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks every entry against the segment catalog; unknown dimensions or
    /// values are validation errors before any mutation is attempted.
    pub fn validate_against(&self, catalog: &SegmentCatalog) -> Result<(), ConsoleError> {
        for entry in &self.entries {
            if catalog.definition(&entry.segment_type).is_none() {
                return Err(ConsoleError::UnknownSegmentType(entry.segment_type.clone()));
            }
            for value in &entry.values {
                if !catalog.allows(&entry.segment_type, value) {
                    return Err(ConsoleError::UnknownSegmentValue {
                        segment_type: entry.segment_type.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Conjunctive match: every entry must accept the caller. A caller with
    /// no membership in a dimension fails inclusive entries and vacuously
    /// passes exclusive ones.
    pub fn matches(&self, memberships: &HashMap<String, Vec<String>>) -> bool {
        self.entries.iter().all(|entry| {
            match (entry.include, memberships.get(&entry.segment_type)) {
                (true, None) => false,
                (false, None) => true,
                (include, Some(caller_values)) => {
                    let hit = caller_values
                        .iter()
                        .any(|v| entry.values.iter().any(|ev| ev == v));
                    if include {
                        hit
                    } else {
                        !hit
                    }
                }
            }
        })
    }

    /// Whether two combinations target the same segments, ignoring polarity
    /// and entry/value order. Polarity is editable after creation, so it
    /// cannot take part in an override's identity.
    pub fn same_target(&self, other: &SegmentCombo) -> bool {
        fn target(combo: &SegmentCombo) -> BTreeMap<&str, BTreeSet<&str>> {
            combo
                .entries
                .iter()
                .map(|e| {
                    (
                        e.segment_type.as_str(),
                        e.values.iter().map(String::as_str).collect(),
                    )
                })
                .collect()
        }
        target(self) == target(other)
    }

    /// Flips the polarity of one entry. The only combo mutation allowed after
    /// creation; segment types and value sets stay frozen.
    pub fn set_polarity(&mut self, segment_type: &str, include: bool) -> Result<(), ConsoleError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.segment_type == segment_type)
            .ok_or_else(|| ConsoleError::UnknownSegmentType(segment_type.to_string()))?;
        entry.include = include;
        Ok(())
    }
}

fn decode_entry(segment_type: String, raw_values: Vec<String>) -> Result<ComboEntry, ConsoleError> {
    let first = raw_values
        .first()
        .ok_or_else(|| ConsoleError::EmptyValues(segment_type.clone()))?;
    let include = !first.starts_with('!');

    let mut values = Vec::with_capacity(raw_values.len());
    for raw in &raw_values {
        let marked = raw.starts_with('!');
        // a combo like ["US", "!CA"] is corrupt, never silently normalized
        if marked == include {
            return Err(ConsoleError::MixedPolarity(segment_type));
        }
        values.push(if marked { raw[1..].to_string() } else { raw.clone() });
    }

    Ok(ComboEntry { segment_type, values, include })
}

impl Serialize for SegmentCombo {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            if entry.include {
                map.serialize_entry(&entry.segment_type, &entry.values)?;
            } else {
                let marked: Vec<String> =
                    entry.values.iter().map(|v| format!("!{}", v)).collect();
                map.serialize_entry(&entry.segment_type, &marked)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SegmentCombo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<SegmentCombo, D::Error> {
        let raw: BTreeMap<String, Vec<String>> = BTreeMap::deserialize(deserializer)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (segment_type, raw_values) in raw {
            entries.push(decode_entry(segment_type, raw_values).map_err(D::Error::custom)?);
        }
        Ok(SegmentCombo { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memberships(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_build_rejects_duplicate_segment_types() {
        let err = SegmentCombo::build(vec![
            ComboEntryDraft::include("country", &["US"]),
            ComboEntryDraft::include("country", &["CA"]),
        ])
        .unwrap_err();
        assert!(matches!(err, ConsoleError::DuplicateSegmentType(t) if t == "country"));
    }

    #[test]
    fn test_build_rejects_empty_combination() {
        let err = SegmentCombo::build(vec![]).unwrap_err();
        assert!(matches!(err, ConsoleError::EmptyCombination));

        // blank rows don't count as entries
        let err = SegmentCombo::build(vec![ComboEntryDraft::default()]).unwrap_err();
        assert!(matches!(err, ConsoleError::EmptyCombination));
    }

    #[test]
    fn test_build_rejects_values_without_a_segment_type() {
        let err = SegmentCombo::build(vec![ComboEntryDraft::include("", &["US"])]).unwrap_err();
        assert!(matches!(err, ConsoleError::MissingSegmentType));
    }

    #[test]
    fn test_build_rejects_a_segment_type_without_values() {
        let err = SegmentCombo::build(vec![ComboEntryDraft::include("country", &[])]).unwrap_err();
        assert!(matches!(err, ConsoleError::EmptyValues(t) if t == "country"));
    }

    #[test]
    fn test_build_rejects_values_carrying_the_marker() {
        // "!beta" would serialize unmarked-by-intent but decode as an
        // exclusion of "beta"
        let err = SegmentCombo::build(vec![ComboEntryDraft::include("channel", &["!beta"])])
            .unwrap_err();
        assert!(matches!(err, ConsoleError::ReservedValueMarker(v) if v == "!beta"));

        let err = SegmentCombo::build(vec![ComboEntryDraft::exclude("channel", &["!beta"])])
            .unwrap_err();
        assert!(matches!(err, ConsoleError::ReservedValueMarker(_)));
    }

    #[test]
    fn test_build_strips_blank_rows() {
        let combo = SegmentCombo::build(vec![
            ComboEntryDraft::default(),
            ComboEntryDraft::include("country", &["US"]),
        ])
        .unwrap();
        assert_eq!(combo.len(), 1);
    }

    #[test]
    fn test_exclusion_marker_round_trip() {
        let combo = SegmentCombo::build(vec![ComboEntryDraft::exclude("country", &["a", "b"])])
            .unwrap();

        let encoded = serde_json::to_value(&combo).unwrap();
        assert_eq!(encoded, json!({"country": ["!a", "!b"]}));

        let decoded: SegmentCombo = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.entries().len(), 1);
        let entry = &decoded.entries()[0];
        assert!(!entry.include);
        assert_eq!(entry.values, vec!["a".to_string(), "b".to_string()]);
        assert!(combo.same_target(&decoded));
    }

    #[test]
    fn test_inclusive_values_are_serialized_unmarked() {
        let combo = SegmentCombo::build(vec![ComboEntryDraft::include("country", &["US", "CA"])])
            .unwrap();
        assert_eq!(
            serde_json::to_value(&combo).unwrap(),
            json!({"country": ["US", "CA"]})
        );
    }

    #[test]
    fn test_mixed_markers_are_rejected_on_decode() {
        let result: Result<SegmentCombo, _> =
            serde_json::from_value(json!({"country": ["US", "!CA"]}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("mixed inclusion markers"), "got: {}", err);
    }

    #[test]
    fn test_matching_is_a_conjunction_over_entries() {
        let combo = SegmentCombo::build(vec![
            ComboEntryDraft::include("country", &["US", "CA"]),
            ComboEntryDraft::include("platform", &["ios"]),
        ])
        .unwrap();

        assert!(combo.matches(&memberships(&[("country", &["US"]), ("platform", &["ios"])])));
        assert!(!combo.matches(&memberships(&[("country", &["US"]), ("platform", &["android"])])));
        assert!(!combo.matches(&memberships(&[("country", &["US"])])));
    }

    #[test]
    fn test_exclusive_entry_inverts_membership() {
        let combo =
            SegmentCombo::build(vec![ComboEntryDraft::exclude("country", &["US"])]).unwrap();

        assert!(!combo.matches(&memberships(&[("country", &["US"])])));
        assert!(combo.matches(&memberships(&[("country", &["DE"])])));
        // a caller with no country at all is provably not in the set
        assert!(combo.matches(&memberships(&[])));
    }

    #[test]
    fn test_same_target_ignores_polarity_and_order() {
        let a = SegmentCombo::build(vec![
            ComboEntryDraft::include("country", &["US", "CA"]),
            ComboEntryDraft::include("platform", &["ios"]),
        ])
        .unwrap();
        let b = SegmentCombo::build(vec![
            ComboEntryDraft::include("platform", &["ios"]),
            ComboEntryDraft::exclude("country", &["CA", "US"]),
        ])
        .unwrap();
        let c = SegmentCombo::build(vec![ComboEntryDraft::include("country", &["US"])]).unwrap();

        assert!(a.same_target(&b));
        assert!(!a.same_target(&c));
    }

    #[test]
    fn test_set_polarity_only_touches_the_named_entry() {
        let mut combo = SegmentCombo::build(vec![
            ComboEntryDraft::include("country", &["US"]),
            ComboEntryDraft::include("platform", &["ios"]),
        ])
        .unwrap();

        combo.set_polarity("country", false).unwrap();
        assert!(!combo.entries()[0].include);
        assert!(combo.entries()[1].include);

        let err = combo.set_polarity("browser", true).unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownSegmentType(t) if t == "browser"));
    }

    #[test]
    fn test_validate_against_catalog() {
        let catalog: SegmentCatalog = serde_json::from_value(json!({
            "country": {"description": "Caller country", "values": ["US", "CA"]}
        }))
        .unwrap();

        let ok = SegmentCombo::build(vec![ComboEntryDraft::include("country", &["US"])]).unwrap();
        assert!(ok.validate_against(&catalog).is_ok());

        let unknown_value =
            SegmentCombo::build(vec![ComboEntryDraft::include("country", &["FR"])]).unwrap();
        assert!(matches!(
            unknown_value.validate_against(&catalog).unwrap_err(),
            ConsoleError::UnknownSegmentValue { .. }
        ));

        let unknown_type =
            SegmentCombo::build(vec![ComboEntryDraft::include("browser", &["firefox"])]).unwrap();
        assert!(matches!(
            unknown_type.validate_against(&catalog).unwrap_err(),
            ConsoleError::UnknownSegmentType(_)
        ));
    }
}
