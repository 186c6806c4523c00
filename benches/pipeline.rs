use criterion::{Criterion, criterion_group, criterion_main};

use chart_data_pipeline::pipeline::DataProcessor;
use chart_data_pipeline::source::MemorySource;
use chart_data_pipeline::spec::DataSpec;
use chart_data_pipeline::types::{ColumnType, Field, Frame, Schema, Value};

fn synthetic_frame(rows: usize) -> Frame {
    let schema = Schema::new(vec![
        Field::new("category", ColumnType::Cat),
        Field::new("price", ColumnType::Num),
    ]);
    let categories = ["a", "b", "c", "d", "e"];
    let data = (0..rows)
        .map(|i| {
            vec![
                Value::Str(categories[i % categories.len()].to_string()),
                Value::Num(((i * 37) % 1000) as f64 / 10.0),
            ]
        })
        .collect();
    Frame::new(schema, data)
}

fn bench_full_pipeline(c: &mut Criterion) {
    let spec = DataSpec::from_json(
        r#"{
            "transforms": [
                {"trans": "bin", "key": "price", "name": "price_bin", "binwidth": 10.0}
            ],
            "filters": [{"column": "price", "op": "lt", "operand": 90.0}],
            "meta": [{"column": "category", "sort": "count", "stat": "count", "limit": 3}],
            "stats": {
                "stats": [{"stat": "mean", "key": "price", "name": "mean_price"}],
                "groups": ["category", "price_bin"]
            }
        }"#,
    )
    .unwrap();

    let mut group = c.benchmark_group("pipeline");
    for rows in [1_000usize, 50_000] {
        let frame = synthetic_frame(rows);
        group.bench_function(format!("make_{rows}_rows"), |b| {
            let mut processor =
                DataProcessor::new(MemorySource::from_frame(frame.clone()), spec.clone());
            b.iter(|| processor.make(&spec).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_pipeline);
criterion_main!(benches);
