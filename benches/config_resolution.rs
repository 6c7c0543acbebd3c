//! Benchmarks for the per-call configuration path
//!
//! This benchmark measures:
//! - Resolution through each precedence layer
//! - Parsing of a raw overrides map
//! - Timeout normalization

use std::sync::Arc;
use std::time::Duration;

use ai_lib_dispatch::backend::openai::{azure_descriptor, openai_descriptor};
use ai_lib_dispatch::config::{ConfigResolver, ExtraOverrides, MapEnv, ProcessDefaults};
use ai_lib_dispatch::timeout::{normalize_with, StructuredTimeout, TimeoutSpec};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};

fn bench_resolve(c: &mut Criterion) {
    let env = MapEnv::new()
        .with("OPENAI_API_KEY", "sk-env")
        .with("AZURE_API_BASE", "https://r.openai.azure.com")
        .with("AZURE_API_KEY", "az-env")
        .with("AZURE_API_VERSION", "2024-10-21");
    let resolver = ConfigResolver::new(
        ProcessDefaults::new().max_retries(3).timeout(120u64),
        Arc::new(env),
    );
    let openai = openai_descriptor();
    let azure = azure_descriptor();

    let mut group = c.benchmark_group("resolve");
    let cases = [
        ("fallback", ExtraOverrides::new()),
        (
            "explicit",
            ExtraOverrides::new()
                .api_base("https://gateway.internal/v1")
                .api_key("sk-call")
                .timeout(30u64),
        ),
    ];
    for (name, overrides) in &cases {
        group.bench_with_input(BenchmarkId::new("openai", name), overrides, |b, o| {
            b.iter(|| resolver.resolve(black_box(o), &openai).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("azure", name), overrides, |b, o| {
            b.iter(|| resolver.resolve(black_box(o), &azure).unwrap())
        });
    }
    group.finish();
}

fn bench_overrides_map(c: &mut Criterion) {
    let raw: Map<String, Value> = serde_json::from_value(json!({
        "api_base": "https://gateway.internal/v1",
        "api_key": "sk-call",
        "request_timeout": 120,
        "max_retries": "3",
        "api_version": "2024-10-21"
    }))
    .unwrap();

    c.bench_function("overrides_from_map", |b| {
        b.iter(|| ExtraOverrides::from_map(black_box(raw.clone())).unwrap())
    });
}

fn bench_normalize(c: &mut Criterion) {
    let inputs = [
        ("scalar", TimeoutSpec::Seconds(42.0)),
        ("text", TimeoutSpec::Text("1500ms".into())),
        (
            "structured",
            TimeoutSpec::Structured(
                StructuredTimeout::new()
                    .connect(Duration::from_secs(5))
                    .read(Duration::from_secs(42)),
            ),
        ),
    ];

    let mut group = c.benchmark_group("normalize");
    for (name, spec) in &inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), spec, |b, s| {
            b.iter(|| {
                black_box(normalize_with(Some(s), true));
                black_box(normalize_with(Some(s), false))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resolve, bench_overrides_map, bench_normalize);
criterion_main!(benches);
