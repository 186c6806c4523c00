//! Derived-column transforms: binning and lag.
//!
//! A [`TransformSpec`] compiles against the accumulated column metadata into a
//! [`ColumnTransform`], which is then applied to the frame in a single sequential pass.
//! Lag is stateful and order-dependent, so a compiled transform is applied exactly once,
//! in dataset row order.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::error::{PipelineError, PipelineResult};
use crate::spec::{BinWidth, TimeUnit, TransformKind, TransformSpec};
use crate::types::{ColumnMeta, Frame, MetaMap, Value};

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

#[derive(Debug)]
enum Compiled {
    NumBin { width: f64 },
    TimeBin { unit: TimeUnit },
    Lag { buffer: VecDeque<Value> },
}

/// A compiled, ready-to-apply column transform.
///
/// Produced by [`ColumnTransform::compile`]; carries the destination column's metadata
/// and (for lag) the FIFO state consumed during [`ColumnTransform::apply`].
#[derive(Debug)]
pub struct ColumnTransform {
    key: String,
    name: String,
    compiled: Compiled,
    meta: ColumnMeta,
}

impl ColumnTransform {
    /// Compile a transform spec against the metadata accumulated so far.
    ///
    /// Fails with `InvalidSpec` when the binwidth does not fit the source column type
    /// (non-finite/non-positive number for a numeric column, anything but a temporal
    /// unit for a date column, any bin at all for a categorical column), and with
    /// `MissingColumn` when the source column has no metadata.
    pub fn compile(spec: &TransformSpec, meta: &MetaMap) -> PipelineResult<Self> {
        let source = meta
            .get(&spec.key)
            .ok_or_else(|| PipelineError::missing_column(&spec.key))?;

        let (compiled, out_meta) = match &spec.trans {
            TransformKind::Bin { binwidth } => {
                use crate::types::ColumnType::*;
                let compiled = match (source.ty, binwidth) {
                    (Num, BinWidth::Width(w)) if w.is_finite() && *w > 0.0 => {
                        Compiled::NumBin { width: *w }
                    }
                    (Num, other) => {
                        return Err(PipelineError::invalid_spec(format!(
                            "bin on numeric column '{}' requires a finite positive binwidth, got {other:?}",
                            spec.key
                        )));
                    }
                    (Date, BinWidth::Unit(unit)) => Compiled::TimeBin { unit: *unit },
                    (Date, other) => {
                        return Err(PipelineError::invalid_spec(format!(
                            "bin on date column '{}' requires a temporal unit, got {other:?}",
                            spec.key
                        )));
                    }
                    (Cat, _) => {
                        return Err(PipelineError::invalid_spec(format!(
                            "cannot bin categorical column '{}'",
                            spec.key
                        )));
                    }
                };
                let out_meta = ColumnMeta {
                    ty: source.ty,
                    binned: true,
                    bin: Some(*binwidth),
                    levels: None,
                    sorted: false,
                };
                (compiled, out_meta)
            }
            TransformKind::Lag { lag } => {
                let buffer = std::iter::repeat_n(Value::Null, *lag).collect();
                (
                    Compiled::Lag { buffer },
                    ColumnMeta::of_type(source.ty),
                )
            }
        };

        Ok(Self {
            key: spec.key.clone(),
            name: spec.name.clone(),
            compiled,
            meta: out_meta,
        })
    }

    /// Destination column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metadata of the destination column.
    pub fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    /// Apply the transform over the whole frame, writing the destination column in place.
    ///
    /// Rows are visited in storage order, exactly once; for lag the emitted value is the
    /// source value `lag` rows behind (null for the first `lag` rows).
    pub fn apply(&mut self, frame: &mut Frame) -> PipelineResult<()> {
        let src = frame
            .schema
            .index_of(&self.key)
            .ok_or_else(|| PipelineError::missing_column(&self.key))?;
        let dst = frame.ensure_column(&self.name, self.meta.ty);

        for row in &mut frame.rows {
            let out = match &mut self.compiled {
                Compiled::NumBin { width } => match row[src] {
                    Value::Num(v) if v.is_finite() => Value::Num(*width * (v / *width).floor()),
                    _ => Value::Null,
                },
                Compiled::TimeBin { unit } => match row[src] {
                    Value::Time(ts) => snap_to_unit(ts, *unit),
                    _ => Value::Null,
                },
                Compiled::Lag { buffer } => {
                    buffer.push_back(row[src].clone());
                    buffer.pop_front().unwrap_or(Value::Null)
                }
            };
            row[dst] = out;
        }
        Ok(())
    }
}

/// Snap an epoch-ms timestamp down to the start of the enclosing unit period (UTC).
fn snap_to_unit(ts: i64, unit: TimeUnit) -> Value {
    let floored = |step: i64| Value::Time(ts.div_euclid(step) * step);
    match unit {
        TimeUnit::Second => floored(MS_PER_SECOND),
        TimeUnit::Minute => floored(MS_PER_MINUTE),
        TimeUnit::Hour => floored(MS_PER_HOUR),
        TimeUnit::Day => floored(MS_PER_DAY),
        TimeUnit::Week => {
            // Start of day, then back to the most recent Sunday (day index 0).
            let day_start = ts.div_euclid(MS_PER_DAY) * MS_PER_DAY;
            let dt = match Utc.timestamp_millis_opt(day_start).single() {
                Some(dt) => dt,
                None => return Value::Null,
            };
            let back = i64::from(dt.weekday().num_days_from_sunday());
            Value::Time(day_start - back * MS_PER_DAY)
        }
        TimeUnit::Month => snap_calendar(ts, |dt| (dt.year(), dt.month())),
        TimeUnit::Quarter => snap_calendar(ts, |dt| (dt.year(), (dt.month0() / 3) * 3 + 1)),
        TimeUnit::Year => snap_calendar(ts, |dt| (dt.year(), 1)),
        TimeUnit::Decade => snap_calendar(ts, |dt| (dt.year().div_euclid(10) * 10, 1)),
    }
}

fn snap_calendar<F>(ts: i64, period_start: F) -> Value
where
    F: Fn(&DateTime<Utc>) -> (i32, u32),
{
    let dt = match Utc.timestamp_millis_opt(ts).single() {
        Some(dt) => dt,
        None => return Value::Null,
    };
    let (year, month) = period_start(&dt);
    match Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single() {
        Some(start) => Value::Time(start.timestamp_millis()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::ColumnTransform;
    use crate::spec::{BinWidth, TimeUnit, TransformKind, TransformSpec};
    use crate::types::{ColumnMeta, ColumnType, Field, Frame, MetaMap, Schema, Value};
    use chrono::{TimeZone, Utc};

    fn num_frame(values: &[f64]) -> (Frame, MetaMap) {
        let schema = Schema::new(vec![Field::new("x", ColumnType::Num)]);
        let rows = values.iter().map(|v| vec![Value::Num(*v)]).collect();
        let mut meta = MetaMap::new();
        meta.insert("x".to_string(), ColumnMeta::of_type(ColumnType::Num));
        (Frame::new(schema, rows), meta)
    }

    fn time_frame(timestamps: &[i64]) -> (Frame, MetaMap) {
        let schema = Schema::new(vec![Field::new("t", ColumnType::Date)]);
        let rows = timestamps.iter().map(|t| vec![Value::Time(*t)]).collect();
        let mut meta = MetaMap::new();
        meta.insert("t".to_string(), ColumnMeta::of_type(ColumnType::Date));
        (Frame::new(schema, rows), meta)
    }

    fn bin_spec(key: &str, name: &str, binwidth: BinWidth) -> TransformSpec {
        TransformSpec {
            trans: TransformKind::Bin { binwidth },
            key: key.to_string(),
            name: name.to_string(),
        }
    }

    fn ms(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn numeric_bin_floors_to_multiple_of_binwidth() {
        let (mut frame, meta) = num_frame(&[0.0, 4.9, 5.0, 12.3, -0.1]);
        let spec = bin_spec("x", "xb", BinWidth::Width(5.0));
        let mut tr = ColumnTransform::compile(&spec, &meta).unwrap();
        tr.apply(&mut frame).unwrap();

        let idx = frame.schema.index_of("xb").unwrap();
        let got: Vec<_> = frame.rows.iter().map(|r| r[idx].clone()).collect();
        assert_eq!(
            got,
            vec![
                Value::Num(0.0),
                Value::Num(0.0),
                Value::Num(5.0),
                Value::Num(10.0),
                Value::Num(-5.0),
            ]
        );
        // v' <= v < v' + w and v' is a multiple of w.
        for (row, out) in frame.rows.iter().zip(&got) {
            let (Value::Num(v), Value::Num(b)) = (&row[0], out) else {
                panic!("expected numeric cells");
            };
            assert!(b <= v && *v < b + 5.0);
            assert_eq!(b % 5.0, 0.0);
        }
    }

    #[test]
    fn numeric_bin_rejects_temporal_binwidth() {
        let (_, meta) = num_frame(&[1.0]);
        let spec = bin_spec("x", "xb", BinWidth::Unit(TimeUnit::Day));
        let err = ColumnTransform::compile(&spec, &meta).unwrap_err();
        assert!(err.to_string().contains("invalid spec"));
    }

    #[test]
    fn numeric_bin_rejects_nonpositive_binwidth() {
        let (_, meta) = num_frame(&[1.0]);
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let spec = bin_spec("x", "xb", BinWidth::Width(bad));
            assert!(ColumnTransform::compile(&spec, &meta).is_err());
        }
    }

    #[test]
    fn temporal_bin_rejects_numeric_binwidth() {
        let (_, meta) = time_frame(&[0]);
        let spec = bin_spec("t", "tb", BinWidth::Width(10.0));
        let err = ColumnTransform::compile(&spec, &meta).unwrap_err();
        assert!(err.to_string().contains("invalid spec"));
    }

    #[test]
    fn temporal_bin_snaps_to_period_starts() {
        let ts = ms(2024, 8, 14, 13, 45, 7); // a Wednesday
        let cases = [
            (TimeUnit::Day, ms(2024, 8, 14, 0, 0, 0)),
            (TimeUnit::Week, ms(2024, 8, 11, 0, 0, 0)), // previous Sunday
            (TimeUnit::Month, ms(2024, 8, 1, 0, 0, 0)),
            (TimeUnit::Quarter, ms(2024, 7, 1, 0, 0, 0)),
            (TimeUnit::Year, ms(2024, 1, 1, 0, 0, 0)),
            (TimeUnit::Decade, ms(2020, 1, 1, 0, 0, 0)),
        ];
        for (unit, want) in cases {
            let (mut frame, meta) = time_frame(&[ts]);
            let spec = bin_spec("t", "tb", BinWidth::Unit(unit));
            let mut tr = ColumnTransform::compile(&spec, &meta).unwrap();
            tr.apply(&mut frame).unwrap();
            let idx = frame.schema.index_of("tb").unwrap();
            assert_eq!(frame.rows[0][idx], Value::Time(want), "unit {unit:?}");
        }
    }

    #[test]
    fn bin_meta_records_binwidth() {
        let (_, meta) = num_frame(&[1.0]);
        let spec = bin_spec("x", "xb", BinWidth::Width(5.0));
        let tr = ColumnTransform::compile(&spec, &meta).unwrap();
        assert!(tr.meta().binned);
        assert_eq!(tr.meta().bin, Some(BinWidth::Width(5.0)));
        assert_eq!(tr.meta().ty, ColumnType::Num);
    }

    #[test]
    fn lag_emits_nulls_then_shifted_values() {
        let (mut frame, meta) = num_frame(&[10.0, 20.0, 30.0, 40.0]);
        let spec = TransformSpec {
            trans: TransformKind::Lag { lag: 2 },
            key: "x".to_string(),
            name: "prev".to_string(),
        };
        let mut tr = ColumnTransform::compile(&spec, &meta).unwrap();
        tr.apply(&mut frame).unwrap();

        let idx = frame.schema.index_of("prev").unwrap();
        let got: Vec<_> = frame.rows.iter().map(|r| r[idx].clone()).collect();
        assert_eq!(
            got,
            vec![
                Value::Null,
                Value::Null,
                Value::Num(10.0),
                Value::Num(20.0),
            ]
        );
    }

    #[test]
    fn bin_overwriting_its_source_column_keeps_arity() {
        let (mut frame, meta) = num_frame(&[7.0, 12.0]);
        let spec = bin_spec("x", "x", BinWidth::Width(10.0));
        let mut tr = ColumnTransform::compile(&spec, &meta).unwrap();
        tr.apply(&mut frame).unwrap();

        assert_eq!(frame.schema.fields.len(), 1);
        assert_eq!(frame.rows[0][0], Value::Num(0.0));
        assert_eq!(frame.rows[1][0], Value::Num(10.0));
    }

    #[test]
    fn compile_fails_for_unknown_source_column() {
        let (_, meta) = num_frame(&[1.0]);
        let spec = bin_spec("nope", "xb", BinWidth::Width(5.0));
        let err = ColumnTransform::compile(&spec, &meta).unwrap_err();
        assert!(err.to_string().contains("missing column 'nope'"));
    }
}
