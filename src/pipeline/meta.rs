//! Meta ranking: derive the surviving levels of a column and a matching inclusion
//! filter ("top N categories by metric").

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::group::{KeyPart, group_by};
use crate::pipeline::stats;
use crate::spec::{FilterClause, MetaSpec};
use crate::types::{Frame, Value};

/// Result of ranking one column: the surviving levels (in ranked order) and the derived
/// inclusion filter to re-apply to the full dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaOutcome {
    /// Distinct surviving values of the ranked column.
    pub levels: Vec<Value>,
    /// `in` filter keeping only rows whose column value survived.
    pub filter: FilterClause,
}

/// Rank a column per `spec` over the (already user-filtered) frame.
///
/// With `spec.stat` set the frame is first pre-aggregated per level of `spec.column`;
/// the `sort` field selects the reducer input — the stat's own name reduces the ranked
/// column itself (e.g. `count`/`unique` of the category), any other frame column
/// reduces that metric column per group ("top categories by summed revenue"), and the
/// ranked column orders by level without reducing. Rows are then sorted by the result
/// with a three-way comparator (ties untouched, stable sort), truncated to
/// `spec.limit`, and the distinct surviving column values become the levels.
pub fn compute_meta(spec: &MetaSpec, frame: &Frame) -> PipelineResult<MetaOutcome> {
    // (column value, sort value) per candidate row.
    let mut ranked: Vec<(Value, Value)> = match spec.stat {
        Some(stat) => {
            let groups = group_by(frame, std::slice::from_ref(&spec.column))?;
            let col_idx = frame
                .schema
                .index_of(&spec.column)
                .ok_or_else(|| PipelineError::missing_column(&spec.column))?;
            let reduce_idx = if spec.sort == spec.column {
                None
            } else if spec.sort == stat.name() {
                Some(col_idx)
            } else if let Some(idx) = frame.schema.index_of(&spec.sort) {
                Some(idx)
            } else {
                return Err(PipelineError::invalid_spec(format!(
                    "meta sort field '{}' is neither a column nor the '{}' statistic",
                    spec.sort,
                    stat.name()
                )));
            };
            groups
                .into_iter()
                .map(|group| {
                    let level = group.key.into_iter().next().unwrap_or(Value::Null);
                    let sort_value = match reduce_idx {
                        Some(idx) => {
                            let values: Vec<Value> = group
                                .rows
                                .iter()
                                .map(|&r| frame.rows[r][idx].clone())
                                .collect();
                            stats::reduce(stat, &values)
                        }
                        None => level.clone(),
                    };
                    (level, sort_value)
                })
                .collect()
        }
        None => {
            let col_idx = frame
                .schema
                .index_of(&spec.column)
                .ok_or_else(|| PipelineError::missing_column(&spec.column))?;
            let sort_idx = frame
                .schema
                .index_of(&spec.sort)
                .ok_or_else(|| PipelineError::missing_column(&spec.sort))?;
            frame
                .rows
                .iter()
                .map(|row| (row[col_idx].clone(), row[sort_idx].clone()))
                .collect()
        }
    };

    ranked.sort_by(|a, b| {
        let ord = a.1.compare(&b.1).unwrap_or(Ordering::Equal);
        if spec.asc { ord } else { ord.reverse() }
    });
    if let Some(limit) = spec.limit {
        ranked.truncate(limit);
    }

    let mut seen: FxHashSet<KeyPart> = FxHashSet::default();
    let mut levels = Vec::new();
    for (level, _) in ranked {
        if seen.insert(KeyPart::of(&level)) {
            levels.push(level);
        }
    }

    Ok(MetaOutcome {
        filter: FilterClause::is_in(&spec.column, levels.clone()),
        levels,
    })
}

#[cfg(test)]
mod tests {
    use super::compute_meta;
    use crate::spec::{MetaSpec, StatKind};
    use crate::types::{ColumnType, Field, Frame, Schema, Value};

    fn category_frame(counts: &[(&str, usize)]) -> Frame {
        let schema = Schema::new(vec![
            Field::new("cat", ColumnType::Cat),
            Field::new("y", ColumnType::Num),
        ]);
        let mut rows = Vec::new();
        for (name, n) in counts {
            for i in 0..*n {
                rows.push(vec![Value::Str(name.to_string()), Value::Num(i as f64)]);
            }
        }
        Frame::new(schema, rows)
    }

    #[test]
    fn top_n_by_count_keeps_largest_categories() {
        let frame = category_frame(&[("A", 10), ("B", 5), ("C", 1)]);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "count".to_string(),
            stat: Some(StatKind::Count),
            limit: Some(2),
            asc: false,
        };
        let out = compute_meta(&spec, &frame).unwrap();
        assert_eq!(
            out.levels,
            vec![Value::Str("A".to_string()), Value::Str("B".to_string())]
        );
    }

    #[test]
    fn ascending_rank_keeps_smallest_first() {
        let frame = category_frame(&[("A", 10), ("B", 5), ("C", 1)]);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "count".to_string(),
            stat: Some(StatKind::Count),
            limit: Some(1),
            asc: true,
        };
        let out = compute_meta(&spec, &frame).unwrap();
        assert_eq!(out.levels, vec![Value::Str("C".to_string())]);
    }

    #[test]
    fn top_categories_by_summed_metric_column() {
        let schema = Schema::new(vec![
            Field::new("cat", ColumnType::Cat),
            Field::new("revenue", ColumnType::Num),
        ]);
        let rows = vec![
            vec![Value::Str("A".to_string()), Value::Num(1.0)],
            vec![Value::Str("A".to_string()), Value::Num(2.0)],
            vec![Value::Str("B".to_string()), Value::Num(10.0)],
            vec![Value::Str("C".to_string()), Value::Num(4.0)],
        ];
        let frame = Frame::new(schema, rows);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "revenue".to_string(),
            stat: Some(StatKind::Sum),
            limit: Some(1),
            asc: false,
        };
        let out = compute_meta(&spec, &frame).unwrap();
        assert_eq!(out.levels, vec![Value::Str("B".to_string())]);
    }

    #[test]
    fn stat_sort_field_must_name_a_column_or_the_stat() {
        let frame = category_frame(&[("A", 2)]);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "ghost".to_string(),
            stat: Some(StatKind::Count),
            limit: None,
            asc: false,
        };
        assert!(compute_meta(&spec, &frame).is_err());
    }

    #[test]
    fn without_stat_rows_rank_directly_by_sort_column() {
        let schema = Schema::new(vec![
            Field::new("cat", ColumnType::Cat),
            Field::new("score", ColumnType::Num),
        ]);
        let rows = vec![
            vec![Value::Str("low".to_string()), Value::Num(1.0)],
            vec![Value::Str("high".to_string()), Value::Num(9.0)],
            vec![Value::Str("mid".to_string()), Value::Num(5.0)],
        ];
        let frame = Frame::new(schema, rows);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "score".to_string(),
            stat: None,
            limit: Some(2),
            asc: false,
        };
        let out = compute_meta(&spec, &frame).unwrap();
        assert_eq!(
            out.levels,
            vec![Value::Str("high".to_string()), Value::Str("mid".to_string())]
        );
    }

    #[test]
    fn derived_filter_excludes_dropped_levels() {
        let frame = category_frame(&[("A", 3), ("B", 2), ("C", 1)]);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "count".to_string(),
            stat: Some(StatKind::Count),
            limit: Some(2),
            asc: false,
        };
        let out = compute_meta(&spec, &frame).unwrap();

        let pred =
            crate::pipeline::filter::RowPredicate::compile(&[out.filter], &frame.schema).unwrap();
        let survivors = frame
            .rows
            .iter()
            .filter(|row| pred.matches(row))
            .count();
        assert_eq!(survivors, 5); // all A and B rows, no C
    }

    #[test]
    fn missing_sort_column_is_an_error() {
        let frame = category_frame(&[("A", 1)]);
        let spec = MetaSpec {
            column: "cat".to_string(),
            sort: "ghost".to_string(),
            stat: None,
            limit: None,
            asc: true,
        };
        assert!(compute_meta(&spec, &frame).is_err());
    }
}
