//! Routing benchmarks.
//!
//! Run with: `cargo bench -p apiary-router`

use apiary_router::Router;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;

fn build_router(num_apis: usize) -> Router {
    let mut router = Router::new();
    for i in 0..num_apis {
        let base = format!("/_api/api{i}/v1/resource");
        for (method, template, name) in [
            (Method::GET, format!("{base}/list"), "list"),
            (Method::GET, format!("{base}/get/{{id}}"), "get"),
            (Method::POST, format!("{base}/insert"), "insert"),
            (Method::PUT, format!("{base}/update/{{id}}"), "update"),
            (Method::DELETE, format!("{base}/remove/{{id}}"), "remove"),
        ] {
            let _ = router.insert(method, &template, format!("api{i}.resource.{name}"));
        }
    }
    router
}

fn bench_static_match(c: &mut Criterion) {
    let router = build_router(20);
    c.bench_function("static_match", |b| {
        b.iter(|| black_box(router.match_route(&Method::GET, "/_api/api10/v1/resource/list")));
    });
}

fn bench_param_match(c: &mut Criterion) {
    let router = build_router(20);
    c.bench_function("param_match", |b| {
        b.iter(|| black_box(router.match_route(&Method::DELETE, "/_api/api10/v1/resource/remove/77")));
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_count");
    for apis in [2, 20, 200] {
        let router = build_router(apis);
        group.bench_with_input(BenchmarkId::from_parameter(apis * 5), &router, |b, router| {
            b.iter(|| black_box(router.match_route(&Method::GET, "/_api/api1/v1/resource/get/5")));
        });
    }
    group.finish();
}

fn bench_no_match(c: &mut Criterion) {
    let router = build_router(20);
    c.bench_function("no_match", |b| {
        b.iter(|| black_box(router.match_route(&Method::GET, "/_api/missing/v1/resource/list")));
    });
}

criterion_group!(
    benches,
    bench_static_match,
    bench_param_match,
    bench_scaling,
    bench_no_match
);
criterion_main!(benches);
