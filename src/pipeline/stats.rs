//! Group reductions: sum, mean, count, unique, min, max, median, box.
//!
//! Every reducer drops nulls first (min/max included; the decision is recorded in
//! DESIGN.md). Reducers needing numbers also drop non-numeric values. Empty input yields
//! `Num(0.0)` for sum, `Null` for mean/min/max/median, and an outliers-only summary for
//! box.

use rustc_hash::FxHashSet;

use crate::pipeline::group::KeyPart;
use crate::spec::StatKind;
use crate::types::{BoxSummary, Quartiles, Value};

/// Reduce a column's values to one output cell.
pub fn reduce(stat: StatKind, values: &[Value]) -> Value {
    match stat {
        StatKind::Sum => Value::Num(numeric(values).into_iter().sum()),
        StatKind::Mean => {
            let xs = numeric(values);
            if xs.is_empty() {
                Value::Null
            } else {
                Value::Num(xs.iter().sum::<f64>() / xs.len() as f64)
            }
        }
        StatKind::Count => Value::Num(values.iter().filter(|v| !v.is_null()).count() as f64),
        StatKind::Unique => {
            let distinct: FxHashSet<KeyPart> = values
                .iter()
                .filter(|v| !v.is_null())
                .map(KeyPart::of)
                .collect();
            Value::Num(distinct.len() as f64)
        }
        StatKind::Min => extremal(values, std::cmp::Ordering::Less),
        StatKind::Max => extremal(values, std::cmp::Ordering::Greater),
        StatKind::Median => {
            let mut xs = numeric(values);
            xs.sort_by(f64::total_cmp);
            if xs.is_empty() {
                Value::Null
            } else {
                Value::Num(median_sorted(&xs))
            }
        }
        StatKind::Box => Value::Summary(Box::new(box_summary(numeric(values)))),
    }
}

fn numeric(values: &[Value]) -> Vec<f64> {
    values.iter().filter_map(Value::as_f64).collect()
}

fn extremal(values: &[Value], keep: std::cmp::Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for v in values.iter().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(v),
            Some(b) => {
                if v.compare(b) == Some(keep) {
                    Some(v)
                } else {
                    Some(b)
                }
            }
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Five-number summary with outliers.
///
/// The quartile positions follow the upstream chart convention exactly (`mid = len/2`,
/// `quarter = ceil(mid)/2`, fractional quarter floors and indexes directly, integral
/// quarter averages the two straddling values at symmetric positions). This is not a
/// textbook quartile method; downstream rendering depends on these exact values, so do
/// not swap in a different algorithm.
fn box_summary(mut xs: Vec<f64>) -> BoxSummary {
    if xs.len() <= 5 {
        return BoxSummary {
            quartiles: None,
            outliers: xs,
        };
    }
    xs.sort_by(f64::total_cmp);
    let len = xs.len();

    let mid = len as f64 / 2.0;
    let quarter = mid.ceil() / 2.0;
    let (q2, q4) = if quarter.fract() != 0.0 {
        let q = quarter.floor() as usize;
        (xs[q], xs[len - 1 - q])
    } else {
        let q = quarter as usize;
        (
            (xs[q - 1] + xs[q]) / 2.0,
            (xs[len - 1 - q] + xs[len - q]) / 2.0,
        )
    };

    let iqr = q4 - q2;
    let lo = q2 - 1.5 * iqr;
    let hi = q4 + 1.5 * iqr;
    let (inliers, outliers): (Vec<f64>, Vec<f64>) =
        xs.iter().partition(|v| **v >= lo && **v <= hi);

    BoxSummary {
        quartiles: Some(Quartiles {
            q1: inliers.first().copied().unwrap_or(q2),
            q2,
            q3: median_sorted(&xs),
            q4,
            q5: inliers.last().copied().unwrap_or(q4),
        }),
        outliers,
    }
}

#[cfg(test)]
mod tests {
    use super::reduce;
    use crate::spec::StatKind;
    use crate::types::Value;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|v| Value::Num(*v)).collect()
    }

    #[test]
    fn sum_skips_nulls_and_is_zero_on_empty() {
        let values = vec![Value::Num(1.0), Value::Null, Value::Num(3.0), Value::Null];
        assert_eq!(reduce(StatKind::Sum, &values), Value::Num(4.0));
        assert_eq!(reduce(StatKind::Sum, &[]), Value::Num(0.0));
    }

    #[test]
    fn mean_divides_by_non_null_count_and_is_null_on_empty() {
        assert_eq!(
            reduce(StatKind::Mean, &nums(&[2.0, 4.0, 6.0])),
            Value::Num(4.0)
        );
        assert_eq!(reduce(StatKind::Mean, &[Value::Null]), Value::Null);
        assert_eq!(reduce(StatKind::Mean, &[]), Value::Null);
    }

    #[test]
    fn count_counts_non_null_values() {
        let values = vec![Value::Num(1.0), Value::Null, Value::Num(2.0)];
        assert_eq!(reduce(StatKind::Count, &values), Value::Num(2.0));
    }

    #[test]
    fn unique_counts_distinct_non_null_values() {
        assert_eq!(
            reduce(StatKind::Unique, &nums(&[1.0, 1.0, 2.0])),
            Value::Num(2.0)
        );
        let mixed = vec![
            Value::Str("a".to_string()),
            Value::Str("a".to_string()),
            Value::Null,
            Value::Str("b".to_string()),
        ];
        assert_eq!(reduce(StatKind::Unique, &mixed), Value::Num(2.0));
    }

    #[test]
    fn min_max_skip_nulls_and_compare_strings_lexicographically() {
        let values = vec![Value::Null, Value::Num(3.0), Value::Num(-1.0)];
        assert_eq!(reduce(StatKind::Min, &values), Value::Num(-1.0));
        assert_eq!(reduce(StatKind::Max, &values), Value::Num(3.0));

        let strs = vec![
            Value::Str("pear".to_string()),
            Value::Str("apple".to_string()),
        ];
        assert_eq!(
            reduce(StatKind::Min, &strs),
            Value::Str("apple".to_string())
        );

        assert_eq!(reduce(StatKind::Min, &[Value::Null]), Value::Null);
        assert_eq!(reduce(StatKind::Max, &[]), Value::Null);
    }

    #[test]
    fn median_averages_central_pair_on_even_counts() {
        assert_eq!(
            reduce(StatKind::Median, &nums(&[1.0, 2.0, 3.0, 4.0])),
            Value::Num(2.5)
        );
        assert_eq!(
            reduce(StatKind::Median, &nums(&[3.0, 1.0, 2.0])),
            Value::Num(2.0)
        );
        assert_eq!(reduce(StatKind::Median, &[]), Value::Null);
    }

    // Golden regression for the quartile/outlier split; these exact values are a
    // rendering compatibility contract.
    #[test]
    fn box_golden_seven_values() {
        let out = reduce(StatKind::Box, &nums(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 100.0]));
        let Value::Summary(summary) = out else {
            panic!("expected a summary cell");
        };
        let q = summary.quartiles.expect("seven values produce quartiles");
        assert_eq!(q.q1, 1.0);
        assert_eq!(q.q2, 2.5);
        assert_eq!(q.q3, 4.0);
        assert_eq!(q.q4, 5.5);
        assert_eq!(q.q5, 6.0);
        assert_eq!(summary.outliers, vec![100.0]);
    }

    #[test]
    fn box_with_five_or_fewer_values_returns_outliers_only() {
        let out = reduce(StatKind::Box, &nums(&[5.0, 1.0, 3.0]));
        let Value::Summary(summary) = out else {
            panic!("expected a summary cell");
        };
        assert!(summary.quartiles.is_none());
        assert_eq!(summary.outliers, vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn box_even_count_uses_fractional_quarter_branch() {
        // len=6: mid=3, quarter=1.5 -> floors to 1; q2=s[1], q4=s[4].
        let out = reduce(StatKind::Box, &nums(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let Value::Summary(summary) = out else {
            panic!("expected a summary cell");
        };
        let q = summary.quartiles.unwrap();
        assert_eq!(q.q2, 2.0);
        assert_eq!(q.q4, 5.0);
        assert_eq!(q.q3, 3.5);
        assert!(summary.outliers.is_empty());
    }
}
