//! Row grouping by composite column key.

use rustc_hash::FxHashMap;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Frame, Value};

/// Hash/Eq-capable form of a [`Value`] for use as (part of) a group key.
///
/// Floats are keyed by bit pattern, so `-0.0` and `0.0` are distinct keys and NaN is
/// equal to itself; chart data with such keys is degenerate anyway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum KeyPart {
    Null,
    Bits(u64),
    Int(i64),
    Str(String),
}

impl KeyPart {
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::Null | Value::Summary(_) => Self::Null,
            Value::Num(v) => Self::Bits(v.to_bits()),
            Value::Time(t) => Self::Int(*t),
            Value::Str(s) => Self::Str(s.clone()),
        }
    }
}

/// One group: the composite key values plus the member row indexes.
///
/// `rows[0]` is the first-seen member; its key-column cells are the representative
/// values carried into grouped output.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Key values, one per grouping column, taken from the first-seen row.
    pub key: Vec<Value>,
    /// Member row indexes, in original order.
    pub rows: Vec<usize>,
}

/// Partition the frame's rows by the values of `group_columns`.
///
/// Groups come back in first-seen order; with no grouping columns the whole frame forms
/// one group with an empty key. Fails with `MissingColumn` when a grouping column is
/// absent from the schema.
pub fn group_by(frame: &Frame, group_columns: &[String]) -> PipelineResult<Vec<Group>> {
    let mut idxs = Vec::with_capacity(group_columns.len());
    for col in group_columns {
        let idx = frame
            .schema
            .index_of(col)
            .ok_or_else(|| PipelineError::missing_column(col))?;
        idxs.push(idx);
    }

    if idxs.is_empty() {
        return Ok(vec![Group {
            key: Vec::new(),
            rows: (0..frame.row_count()).collect(),
        }]);
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut seen: FxHashMap<Vec<KeyPart>, usize> = FxHashMap::default();
    for (row_idx, row) in frame.rows.iter().enumerate() {
        let key_parts: Vec<KeyPart> = idxs.iter().map(|&i| KeyPart::of(&row[i])).collect();
        match seen.get(&key_parts) {
            Some(&g) => groups[g].rows.push(row_idx),
            None => {
                seen.insert(key_parts, groups.len());
                groups.push(Group {
                    key: idxs.iter().map(|&i| row[i].clone()).collect(),
                    rows: vec![row_idx],
                });
            }
        }
    }
    Ok(groups)
}
