//! Snapshot diffing
//!
//! Pure and deterministic: the same two snapshots always produce the same
//! delta, ordered by part number.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{
    ChangeSummary, FieldChange, PartChange, PartRecord, PartSnapshot, SummaryKind, TrackedField,
};

/// Difference between two part snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub modified: Vec<PartChange>,
}

impl Delta {
    /// True when nothing was added, removed, or modified.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Converts into the change summary stored on a node.
    pub fn into_summary(self, kind: SummaryKind, total_parts: usize) -> ChangeSummary {
        ChangeSummary {
            kind,
            added_parts: self.added.into_iter().collect(),
            removed_parts: self.removed.into_iter().collect(),
            modified_parts: self.modified,
            total_parts,
        }
    }
}

/// Computes the delta from `old` to `new`.
///
/// With no `old` snapshot every part in `new` counts as added.
pub fn compute_delta(old: Option<&PartSnapshot>, new: &PartSnapshot) -> Delta {
    let old = match old {
        Some(old) => old,
        None => {
            return Delta {
                added: new.part_numbers().map(str::to_string).collect(),
                ..Delta::default()
            }
        }
    };

    let added = new
        .part_numbers()
        .filter(|pn| !old.contains(pn))
        .map(str::to_string)
        .collect();
    let removed = old
        .part_numbers()
        .filter(|pn| !new.contains(pn))
        .map(str::to_string)
        .collect();

    let modified = new
        .iter()
        .filter_map(|after| old.get(&after.part_number).map(|before| (before, after)))
        .filter_map(|(before, after)| diff_part(before, after))
        .collect();

    Delta {
        added,
        removed,
        modified,
    }
}

/// Builds the change summary for a node whose predecessor holds `old`.
pub fn summarize(old: Option<&PartSnapshot>, new: &PartSnapshot) -> ChangeSummary {
    let kind = if old.is_some() {
        SummaryKind::Update
    } else {
        SummaryKind::Initial
    };
    compute_delta(old, new).into_summary(kind, new.len())
}

/// Compares tracked fields by exact value. Effectivity lists compare in
/// order, so a reordering counts as a change.
fn diff_part(before: &PartRecord, after: &PartRecord) -> Option<PartChange> {
    let field_changes: Vec<FieldChange> = TrackedField::ALL
        .iter()
        .filter_map(|field| {
            let old_value = field.value_of(before);
            let new_value = field.value_of(after);
            (old_value != new_value).then(|| FieldChange {
                field: *field,
                old_value,
                new_value,
            })
        })
        .collect();

    if field_changes.is_empty() {
        return None;
    }

    Some(PartChange {
        part_number: after.part_number.clone(),
        fields_changed: field_changes.iter().map(|c| c.field).collect(),
        field_changes,
        old_value: before.clone(),
        new_value: after.clone(),
    })
}
