//! Part records and part snapshots
//!
//! A part snapshot is the set of parts carried by one revision, keyed by
//! part number. Keys are unique; iteration order is by part number so every
//! consumer (delta, lineage, serialization) sees the same order.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ModelError, ModelResult};

/// Which installed units ("line numbers") a part applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Effectivity {
    /// Explicit list of line numbers, in document order.
    List {
        #[serde(default)]
        values: Vec<i64>,
    },
    /// Contiguous range of line numbers, both bounds inclusive.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<i64>,
    },
}

impl Effectivity {
    /// LIST effectivity over the given line numbers.
    pub fn list(values: impl IntoIterator<Item = i64>) -> Self {
        Self::List {
            values: values.into_iter().collect(),
        }
    }

    /// RANGE effectivity with both bounds set.
    pub fn range(from: i64, to: i64) -> Self {
        Self::Range {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Returns the effectivity kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::List { .. } => "LIST",
            Self::Range { .. } => "RANGE",
        }
    }

    /// Whether this effectivity covers the given line number.
    ///
    /// A range with a missing bound covers nothing.
    pub fn applies_to(&self, line_number: i64) -> bool {
        match self {
            Self::List { values } => values.contains(&line_number),
            Self::Range {
                from: Some(from),
                to: Some(to),
            } => *from <= line_number && line_number <= *to,
            Self::Range { .. } => false,
        }
    }
}

impl Default for Effectivity {
    fn default() -> Self {
        Self::List { values: Vec::new() }
    }
}

impl fmt::Display for Effectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List { values } => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "LIST[{}]", joined.join(","))
            }
            Self::Range { from, to } => {
                let bound = |b: &Option<i64>| b.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
                write!(f, "RANGE[{}..{}]", bound(from), bound(to))
            }
        }
    }
}

/// Change marker carried by a part record in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartChangeType {
    Add,
    Modify,
    Delete,
    /// Reference only
    Rf,
    None,
}

impl PartChangeType {
    /// Returns the marker string used in source documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Rf => "RF",
            Self::None => "NONE",
        }
    }

    /// Parses a marker string, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADD" => Some(Self::Add),
            "MODIFY" => Some(Self::Modify),
            "DELETE" => Some(Self::Delete),
            "RF" => Some(Self::Rf),
            "NONE" | "" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for PartChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part as listed in a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    pub part_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nomenclature: Option<String>,
    #[serde(default)]
    pub effectivity: Effectivity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<PartChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
}

impl PartRecord {
    /// Creates a part with the given number and effectivity, all other fields empty.
    pub fn new(part_number: impl Into<String>, effectivity: Effectivity) -> Self {
        Self {
            part_number: part_number.into(),
            nomenclature: None,
            effectivity,
            supplier_code: None,
            change_type: None,
            page: None,
            figure: None,
            item: None,
        }
    }

    pub fn with_nomenclature(mut self, nomenclature: impl Into<String>) -> Self {
        self.nomenclature = Some(nomenclature.into());
        self
    }

    pub fn with_supplier_code(mut self, code: impl Into<String>) -> Self {
        self.supplier_code = Some(code.into());
        self
    }

    pub fn with_change_type(mut self, change_type: PartChangeType) -> Self {
        self.change_type = Some(change_type);
        self
    }

    pub fn with_location(mut self, page: Option<u32>, figure: Option<String>, item: Option<String>) -> Self {
        self.page = page;
        self.figure = figure;
        self.item = item;
        self
    }

    /// Whether the source document explicitly marks this part as added.
    pub fn declared_add(&self) -> bool {
        self.change_type == Some(PartChangeType::Add)
    }
}

/// Parts of one revision keyed by part number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartSnapshot {
    parts: BTreeMap<String, PartRecord>,
}

impl PartSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a list of records.
    ///
    /// Rejects empty part numbers and duplicate part numbers.
    pub fn from_records(records: impl IntoIterator<Item = PartRecord>) -> ModelResult<Self> {
        let mut parts = BTreeMap::new();
        for (index, record) in records.into_iter().enumerate() {
            if record.part_number.trim().is_empty() {
                return Err(ModelError::MissingPartNumber { index });
            }
            match parts.entry(record.part_number.clone()) {
                btree_map::Entry::Occupied(_) => {
                    return Err(ModelError::DuplicatePart(record.part_number));
                }
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Ok(Self { parts })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, part_number: &str) -> Option<&PartRecord> {
        self.parts.get(part_number)
    }

    pub fn contains(&self, part_number: &str) -> bool {
        self.parts.contains_key(part_number)
    }

    /// Part numbers in ascending order.
    pub fn part_numbers(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartRecord> {
        self.parts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effectivity_list_applies() {
        let eff = Effectivity::list([68, 74]);
        assert!(eff.applies_to(68));
        assert!(!eff.applies_to(70));
    }

    #[test]
    fn test_effectivity_range_inclusive() {
        let eff = Effectivity::range(10, 20);
        assert!(eff.applies_to(10));
        assert!(eff.applies_to(20));
        assert!(!eff.applies_to(21));
    }

    #[test]
    fn test_effectivity_open_range_applies_to_nothing() {
        let eff = Effectivity::Range {
            from: Some(1),
            to: None,
        };
        assert!(!eff.applies_to(1));
    }

    #[test]
    fn test_effectivity_serde_shape() {
        let json = serde_json::to_value(Effectivity::list([1, 2])).unwrap();
        assert_eq!(json["type"], "LIST");
        assert_eq!(json["values"], serde_json::json!([1, 2]));

        let parsed: Effectivity =
            serde_json::from_value(serde_json::json!({"type": "RANGE", "from": 3, "to": 9})).unwrap();
        assert_eq!(parsed, Effectivity::range(3, 9));
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let result = PartSnapshot::from_records(vec![
            PartRecord::new("A", Effectivity::default()),
            PartRecord::new("A", Effectivity::default()),
        ]);
        assert!(matches!(result, Err(ModelError::DuplicatePart(pn)) if pn == "A"));
    }

    #[test]
    fn test_snapshot_rejects_blank_part_number() {
        let result = PartSnapshot::from_records(vec![PartRecord::new("  ", Effectivity::default())]);
        assert!(matches!(result, Err(ModelError::MissingPartNumber { index: 0 })));
    }

    #[test]
    fn test_snapshot_orders_by_part_number() {
        let snapshot = PartSnapshot::from_records(vec![
            PartRecord::new("C", Effectivity::default()),
            PartRecord::new("A", Effectivity::default()),
        ])
        .unwrap();
        let keys: Vec<&str> = snapshot.part_numbers().collect();
        assert_eq!(keys, vec!["A", "C"]);
    }

    #[test]
    fn test_change_type_parse() {
        assert_eq!(PartChangeType::parse("add"), Some(PartChangeType::Add));
        assert_eq!(PartChangeType::parse(""), Some(PartChangeType::None));
        assert_eq!(PartChangeType::parse("bogus"), None);
    }
}
