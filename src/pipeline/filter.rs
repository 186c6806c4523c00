//! Compiled row predicates.
//!
//! A list of [`FilterClause`]s compiles into a single [`RowPredicate`] with the column
//! indexes resolved up front. Evaluation is a short-circuiting AND in declaration order;
//! the result is order-insensitive, the early exit is just cheaper.

use std::cmp::Ordering;

use crate::error::{PipelineError, PipelineResult};
use crate::spec::{FilterClause, FilterOp, Operand};
use crate::types::{Schema, Value};

#[derive(Debug)]
enum CompiledClause {
    Cmp {
        idx: usize,
        op: FilterOp,
        operand: Value,
    },
    In {
        idx: usize,
        levels: Vec<Value>,
    },
}

/// A compiled AND-combination of filter clauses.
#[derive(Debug)]
pub struct RowPredicate {
    clauses: Vec<CompiledClause>,
}

impl RowPredicate {
    /// Compile clauses against the frame schema.
    ///
    /// Compilation fails with `MissingColumn` for a clause naming an absent column, and
    /// with `InvalidSpec` when the operand shape does not match the operator (`in` needs
    /// a list, the comparisons need a scalar).
    pub fn compile(clauses: &[FilterClause], schema: &Schema) -> PipelineResult<Self> {
        let mut compiled = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let idx = schema
                .index_of(&clause.column)
                .ok_or_else(|| PipelineError::missing_column(&clause.column))?;

            let c = match (clause.op, &clause.operand) {
                (FilterOp::In, Operand::List(levels)) => CompiledClause::In {
                    idx,
                    levels: levels.clone(),
                },
                (FilterOp::In, Operand::Scalar(_)) => {
                    return Err(PipelineError::invalid_spec(format!(
                        "'in' filter on '{}' requires a list operand",
                        clause.column
                    )));
                }
                (op, Operand::Scalar(operand)) => CompiledClause::Cmp {
                    idx,
                    op,
                    operand: operand.clone(),
                },
                (op, Operand::List(_)) => {
                    return Err(PipelineError::invalid_spec(format!(
                        "{op:?} filter on '{}' requires a scalar operand",
                        clause.column
                    )));
                }
            };
            compiled.push(c);
        }
        Ok(Self { clauses: compiled })
    }

    /// True iff every clause accepts the row. Stops at the first failing clause.
    pub fn matches(&self, row: &[Value]) -> bool {
        self.clauses.iter().all(|clause| match clause {
            CompiledClause::Cmp { idx, op, operand } => match row[*idx].compare(operand) {
                Some(ord) => match op {
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Le => ord != Ordering::Greater,
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Ge => ord != Ordering::Less,
                    FilterOp::In => unreachable!("membership compiled separately"),
                },
                // Incomparable (null/NaN/mixed types) fails the clause.
                None => false,
            },
            // Membership goes through `Value::compare` so numeric operands match
            // timestamp cells (untagged JSON can only produce `Num`); plain equality
            // covers the values `compare` declines, nulls included.
            CompiledClause::In { idx, levels } => {
                let cell = &row[*idx];
                levels
                    .iter()
                    .any(|level| cell.compare(level) == Some(Ordering::Equal) || cell == level)
            }
        })
    }
}
