//! Pipeline stages and the coordinator that runs them in order.
//!
//! A run evaluates a [`DataSpec`] against a [`DataSource`] in a fixed order:
//!
//! 1. transforms, one full sequential pass each, in declaration order
//! 2. user filters
//! 3. per-column meta ranking, folding each derived inclusion filter back in
//! 4. optional grouped statistics
//! 5. `select` validation
//!
//! The whole run is synchronous and single-threaded; only the source fetch may block.

pub mod filter;
pub mod group;
pub mod meta;
pub mod stats;
pub mod transform;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::error::{PipelineError, PipelineResult};
use crate::observe::{PipelineEvent, PipelineMetrics, PipelineObserver};
use crate::source::DataSource;
use crate::spec::{DataSpec, StatsSpec};
use crate::types::{ColumnMeta, ColumnType, Field, Frame, MetaMap, Schema, Value};

pub use filter::RowPredicate;
pub use group::{Group, group_by};
pub use meta::{MetaOutcome, compute_meta};
pub use transform::ColumnTransform;

/// The `{data, meta}` pair a run delivers, tagged with the run sequence that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Final rows: raw/filtered rows, or grouped records when aggregation was requested.
    pub data: Frame,
    /// Accumulated column metadata.
    pub meta: MetaMap,
    /// Monotonic run sequence; a cached output from an older run has a smaller value.
    pub run: u64,
}

/// Cooperative cancellation handle for one `make` call.
///
/// Cancelling aborts the run with [`PipelineError::Cancelled`] before its result is
/// installed, so a superseded request can never clobber the cache.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The pipeline coordinator.
///
/// Owns the dataset handle, the spec captured at construction (replayed by
/// [`DataProcessor::reset`]), and the most recent [`PipelineOutput`]. A new `make`
/// always starts from the raw dataset and replaces the cache wholesale; recomputation is
/// never incremental.
pub struct DataProcessor {
    source: Box<dyn DataSource>,
    spec: DataSpec,
    strict: bool,
    observer: Option<Arc<dyn PipelineObserver>>,
    metrics: Arc<PipelineMetrics>,
    cached: Option<PipelineOutput>,
}

impl DataProcessor {
    /// Create a processor over a source, capturing `spec` for later [`Self::reset`].
    pub fn new(source: impl DataSource + 'static, spec: DataSpec) -> Self {
        Self {
            source: Box::new(source),
            spec,
            strict: false,
            observer: None,
            metrics: Arc::new(PipelineMetrics::new()),
            cached: None,
        }
    }

    /// Strict mode: `make` short-circuits to the source's materialized raw content,
    /// bypassing all processing. For callers that pre-computed their data.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Attach an observer for stage events.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handle to real-time run metrics.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The most recent run's output, if any run has completed.
    pub fn last(&self) -> Option<&PipelineOutput> {
        self.cached.as_ref()
    }

    /// Run the pipeline for `spec`, cache the result, and return it.
    pub fn make(&mut self, spec: &DataSpec) -> PipelineResult<PipelineOutput> {
        self.make_with_token(spec, &CancelToken::new())
    }

    /// Re-run with the spec captured at construction, starting from the raw dataset.
    pub fn reset(&mut self) -> PipelineResult<PipelineOutput> {
        let spec = self.spec.clone();
        self.make(&spec)
    }

    /// [`Self::make`] with an explicit cancellation token.
    pub fn make_with_token(
        &mut self,
        spec: &DataSpec,
        token: &CancelToken,
    ) -> PipelineResult<PipelineOutput> {
        let started = Instant::now();
        // The metrics run counter is the single source of the run sequence.
        let run = self.metrics.begin_run();
        self.emit(PipelineEvent::RunStarted { run });

        let output = self.process(spec, token, run)?;

        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.metrics.end_run(started.elapsed());
        self.emit(PipelineEvent::RunFinished {
            run,
            elapsed: started.elapsed(),
            metrics: self.metrics.snapshot(),
        });
        self.cached = Some(output.clone());
        Ok(output)
    }

    fn process(
        &mut self,
        spec: &DataSpec,
        token: &CancelToken,
        run: u64,
    ) -> PipelineResult<PipelineOutput> {
        if self.strict {
            let raw = self.source.fetch()?;
            self.metrics.on_raw_rows(raw.data.row_count());
            return Ok(PipelineOutput {
                data: raw.data,
                meta: raw.meta,
                run,
            });
        }

        if let Some(delegated) = self.source.compute(spec) {
            let (data, meta) = delegated?;
            self.metrics.on_raw_rows(data.row_count());
            return Ok(PipelineOutput { data, meta, run });
        }

        let raw = self.source.fetch()?;
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let mut frame = raw.data;
        let mut meta = raw.meta;
        self.metrics.on_raw_rows(frame.row_count());
        self.emit(PipelineEvent::RawFetched {
            rows: frame.row_count(),
        });

        // 1. Derived columns, one full sequential pass per transform.
        for transform_spec in &spec.transforms {
            let mut transform = ColumnTransform::compile(transform_spec, &meta)?;
            transform.apply(&mut frame)?;
            meta.insert(transform.name().to_string(), transform.meta().clone());
            self.emit(PipelineEvent::TransformApplied {
                name: transform.name().to_string(),
                rows: frame.row_count(),
            });
        }

        // 2. User filters.
        if !spec.filters.is_empty() {
            let rows_in = frame.row_count();
            let predicate = RowPredicate::compile(&spec.filters, &frame.schema)?;
            frame.retain_rows(|row| predicate.matches(row));
            self.metrics.on_filtered_rows(frame.row_count());
            self.emit(PipelineEvent::FilterApplied {
                rows_in,
                rows_out: frame.row_count(),
            });
        }

        // 3. Meta ranking; each derived inclusion filter re-applies to the full frame.
        for meta_spec in &spec.meta {
            let outcome = compute_meta(meta_spec, &frame)?;
            let entry = meta
                .entry(meta_spec.column.clone())
                .or_insert_with(|| ColumnMeta::of_type(ColumnType::Cat));
            entry.levels = Some(outcome.levels.clone());
            entry.sorted = true;
            self.emit(PipelineEvent::MetaComputed {
                column: meta_spec.column.clone(),
                levels: outcome.levels.len(),
            });

            let predicate =
                RowPredicate::compile(std::slice::from_ref(&outcome.filter), &frame.schema)?;
            frame.retain_rows(|row| predicate.matches(row));
            self.metrics.on_filtered_rows(frame.row_count());
        }

        // 4. Grouped statistics replace the row data.
        if let Some(stats_spec) = &spec.stats {
            frame = aggregate(&frame, stats_spec, &mut meta)?;
            self.metrics.on_groups(frame.row_count());
            self.emit(PipelineEvent::StatsComputed {
                groups: frame.row_count(),
            });
        }

        // 5. Every selected column must have accumulated metadata by now.
        for column in &spec.select {
            if !meta.contains_key(column) {
                return Err(PipelineError::missing_column(column));
            }
        }

        Ok(PipelineOutput {
            data: frame,
            meta,
            run,
        })
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

/// Reduce the frame to one record per distinct `groups` combination.
///
/// Group-key columns keep their type; every statistic's destination column is
/// registered as numeric metadata.
fn aggregate(frame: &Frame, spec: &StatsSpec, meta: &mut MetaMap) -> PipelineResult<Frame> {
    let mut stat_idxs = Vec::with_capacity(spec.stats.len());
    for stat in &spec.stats {
        let idx = frame
            .schema
            .index_of(&stat.key)
            .ok_or_else(|| PipelineError::missing_column(&stat.key))?;
        stat_idxs.push(idx);
    }

    let mut fields = Vec::with_capacity(spec.groups.len() + spec.stats.len());
    for column in &spec.groups {
        let idx = frame
            .schema
            .index_of(column)
            .ok_or_else(|| PipelineError::missing_column(column))?;
        fields.push(frame.schema.fields[idx].clone());
    }
    for stat in &spec.stats {
        fields.push(Field::new(stat.name.clone(), ColumnType::Num));
        meta.insert(stat.name.clone(), ColumnMeta::of_type(ColumnType::Num));
    }

    let groups = group_by(frame, &spec.groups)?;
    let mut rows = Vec::with_capacity(groups.len());
    for group in groups {
        let mut row: Vec<Value> = group.key;
        for (stat, &idx) in spec.stats.iter().zip(stat_idxs.iter()) {
            let values: Vec<Value> = group
                .rows
                .iter()
                .map(|&r| frame.rows[r][idx].clone())
                .collect();
            row.push(stats::reduce(stat.stat, &values));
        }
        rows.push(row);
    }

    Ok(Frame::new(Schema::new(fields), rows))
}
