//! Ingestion boundary
//!
//! The parsing pipeline hands over loosely-typed part records. Everything is
//! validated and coerced into `PartRecord` here; nothing downstream sees an
//! unvalidated record.
//!
//! Two record shapes are accepted:
//!
//! ```text
//! structured: {"part_number": "..", "effectivity": {"type": "LIST", "values": [68, 74]}}
//! flat:       {"part_number": "..", "effectivity_type": "RANGE",
//!              "effectivity_range": {"from": 1, "to": 9}, "page_number": 12}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ModelError, ModelResult};
use super::part::{Effectivity, PartChangeType, PartRecord, PartSnapshot};
use super::revision::SourceReference;

/// A revision handed over by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionSubmission {
    pub document_id: String,
    pub document_number: String,
    pub revision: String,
    pub parts: Vec<PartRecord>,
    #[serde(default)]
    pub issue_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_reference: Option<SourceReference>,
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_created_by() -> String {
    "system".to_string()
}

impl RevisionSubmission {
    pub fn new(
        document_id: impl Into<String>,
        document_number: impl Into<String>,
        revision: impl Into<String>,
        parts: Vec<PartRecord>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            document_number: document_number.into(),
            revision: revision.into(),
            parts,
            issue_date: None,
            source_reference: None,
            created_by: default_created_by(),
        }
    }

    pub fn with_issue_date(mut self, issue_date: DateTime<Utc>) -> Self {
        self.issue_date = Some(issue_date);
        self
    }

    pub fn with_source(mut self, source: SourceReference) -> Self {
        self.source_reference = Some(source);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Validates identifiers and builds the part snapshot.
    pub fn snapshot(&self) -> ModelResult<PartSnapshot> {
        if self.document_id.trim().is_empty() {
            return Err(ModelError::InvalidSubmission("document_id is empty".into()));
        }
        if self.revision.trim().is_empty() {
            return Err(ModelError::InvalidSubmission("revision is empty".into()));
        }
        PartSnapshot::from_records(self.parts.iter().cloned())
    }

    /// Validates without keeping the snapshot.
    pub fn validate(&self) -> ModelResult<()> {
        self.snapshot().map(|_| ())
    }

    /// Parses a submission whose `parts` are loosely-typed records.
    pub fn from_loose_json(value: &Value) -> ModelResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ModelError::InvalidSubmission("submission must be an object".into()))?;

        let required = |key: &str| -> ModelResult<String> {
            obj.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ModelError::InvalidSubmission(format!("missing string field '{}'", key)))
        };

        let raw_parts = obj
            .get("parts")
            .and_then(Value::as_array)
            .ok_or_else(|| ModelError::InvalidSubmission("missing array field 'parts'".into()))?;

        let issue_date = match obj.get("issue_date") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                serde_json::from_value(v.clone())
                    .map_err(|e| ModelError::InvalidSubmission(format!("issue_date: {}", e)))?,
            ),
        };
        let source_reference = match obj.get("source_reference") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                serde_json::from_value(v.clone())
                    .map_err(|e| ModelError::InvalidSubmission(format!("source_reference: {}", e)))?,
            ),
        };

        Ok(Self {
            document_id: required("document_id")?,
            document_number: required("document_number")?,
            revision: required("revision")?,
            parts: coerce_parts(raw_parts)?,
            issue_date,
            source_reference,
            created_by: obj
                .get("created_by")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(default_created_by),
        })
    }
}

/// Coerces loosely-typed part records into `PartRecord`s.
///
/// Fails on the first malformed entry, naming its index.
pub fn coerce_parts(raw: &[Value]) -> ModelResult<Vec<PartRecord>> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| coerce_part(index, value))
        .collect()
}

fn coerce_part(index: usize, value: &Value) -> ModelResult<PartRecord> {
    let obj = value
        .as_object()
        .ok_or_else(|| ModelError::invalid_part(index, "record is not an object"))?;

    let part_number = match obj.get("part_number") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(ModelError::MissingPartNumber { index }),
    };

    let change_type = match optional_text(obj, "change_type") {
        None => None,
        Some(raw) => Some(
            PartChangeType::parse(&raw)
                .ok_or_else(|| ModelError::invalid_part(index, format!("unknown change_type '{}'", raw)))?,
        ),
    };

    let page = obj
        .get("page")
        .or_else(|| obj.get("page_number"))
        .and_then(Value::as_u64)
        .and_then(|p| u32::try_from(p).ok());

    Ok(PartRecord {
        part_number,
        nomenclature: optional_text(obj, "nomenclature"),
        effectivity: coerce_effectivity(index, obj)?,
        supplier_code: optional_text(obj, "supplier_code"),
        change_type,
        page,
        figure: optional_text(obj, "figure"),
        item: optional_text(obj, "item"),
    })
}

fn coerce_effectivity(index: usize, obj: &Map<String, Value>) -> ModelResult<Effectivity> {
    if let Some(nested) = obj.get("effectivity").filter(|v| !v.is_null()) {
        let nested = nested
            .as_object()
            .ok_or_else(|| ModelError::invalid_part(index, "effectivity is not an object"))?;
        let kind = nested.get("type").and_then(Value::as_str).unwrap_or("LIST");
        return build_effectivity(
            index,
            kind,
            nested.get("values"),
            nested.get("from"),
            nested.get("to"),
        );
    }

    let kind = obj
        .get("effectivity_type")
        .and_then(Value::as_str)
        .unwrap_or("LIST");
    let range = obj.get("effectivity_range").and_then(Value::as_object);
    build_effectivity(
        index,
        kind,
        obj.get("effectivity_values"),
        range.and_then(|r| r.get("from")),
        range.and_then(|r| r.get("to")),
    )
}

fn build_effectivity(
    index: usize,
    kind: &str,
    values: Option<&Value>,
    from: Option<&Value>,
    to: Option<&Value>,
) -> ModelResult<Effectivity> {
    match kind.trim().to_ascii_uppercase().as_str() {
        "LIST" => {
            let values = match values {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|v| {
                        v.as_i64().ok_or_else(|| {
                            ModelError::invalid_part(index, format!("line number {} is not an integer", v))
                        })
                    })
                    .collect::<ModelResult<Vec<i64>>>()?,
                Some(other) => {
                    return Err(ModelError::invalid_part(
                        index,
                        format!("effectivity values must be an array, got {}", other),
                    ))
                }
            };
            Ok(Effectivity::List { values })
        }
        "RANGE" => {
            let bound = |b: Option<&Value>, name: &str| -> ModelResult<Option<i64>> {
                match b {
                    None | Some(Value::Null) => Ok(None),
                    Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                        ModelError::invalid_part(index, format!("range '{}' is not an integer", name))
                    }),
                }
            };
            Ok(Effectivity::Range {
                from: bound(from, "from")?,
                to: bound(to, "to")?,
            })
        }
        other => Err(ModelError::invalid_part(
            index,
            format!("unknown effectivity type '{}'", other),
        )),
    }
}

fn optional_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
