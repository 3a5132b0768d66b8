//! Benchmarks for relay search and inflight checks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Map, Value};

use dagcontext::inflight::InflightTracker;
use dagcontext::relay::find_field;

/// Upstream outputs nested `depth` levels deep, with the target at the bottom.
fn nested_outputs(tasks: usize, depth: usize) -> Map<String, Value> {
    let mut outputs = Map::new();
    for task in 0..tasks {
        let mut value = json!({"example_data": task, "payload": {"rows": [1, 2, 3]}});
        for level in 0..depth {
            let mut wrapper = Map::new();
            wrapper.insert(format!("level_{level}"), value);
            wrapper.insert("noise".to_string(), json!("x"));
            value = Value::Object(wrapper);
        }
        outputs.insert(format!("task_{task}"), value);
    }
    outputs
}

fn relay_benchmark(c: &mut Criterion) {
    let outputs = nested_outputs(8, 6);

    c.bench_function("find_field_nested", |b| {
        b.iter(|| find_field(black_box(&outputs), "example_data", None))
    });

    c.bench_function("find_field_missing", |b| {
        b.iter(|| find_field(black_box(&outputs), "absent", None))
    });

    c.bench_function("find_sub_field", |b| {
        b.iter(|| find_field(black_box(&outputs), "payload", Some("rows")))
    });
}

fn inflight_benchmark(c: &mut Criterion) {
    let dir = std::env::temp_dir().join(format!("dagcontext-bench-{}", std::process::id()));
    let Ok(tracker) = InflightTracker::new("bench-run", &dir) else {
        return;
    };
    let ids: Vec<String> = (0..64).map(|i| format!("opendes:doc:{i}")).collect();

    c.bench_function("inflight_claim_release", |b| {
        b.iter(|| {
            let _ = tracker.claim(black_box(&ids));
            let _ = tracker.release(black_box(&ids));
        })
    });

    let _ = std::fs::remove_dir_all(&dir);
}

criterion_group!(benches, relay_benchmark, inflight_benchmark);
criterion_main!(benches);
