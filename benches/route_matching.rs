use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use trellis::RequestContext;
use trellis::prelude::*;

fn build_router(paths: &[String]) -> RequestRouter {
    let mut router = Router::new();
    let ctrl = router.controller(Controller::new("BenchController"));
    for (i, path) in paths.iter().enumerate() {
        router.get(
            path.as_str(),
            &ctrl,
            format!("op{}", i),
            handler(|_args| async move { Ok("ok") }),
        );
    }
    router
        .build(DispatcherConfig::default().warn_on_replace(false))
        .unwrap()
}

fn bench_route_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_lookup");

    for size in [10usize, 100, 1000] {
        let static_paths: Vec<String> = (0..size).map(|i| format!("/api/resource{}", i)).collect();
        let param_paths: Vec<String> = (0..size)
            .map(|i| format!("/api/resource{}/{{id}}", i))
            .collect();

        let static_router = build_router(&static_paths);
        let param_router = build_router(&param_paths);
        let last_static = format!("/API/Resource{}", size - 1);
        let last_param = format!("/api/resource{}/42", size - 1);

        group.bench_with_input(BenchmarkId::new("static", size), &last_static, |b, path| {
            b.iter(|| static_router.routes().get_route(black_box(path)).is_some())
        });
        group.bench_with_input(BenchmarkId::new("param", size), &last_param, |b, path| {
            b.iter(|| param_router.routes().get_route(black_box(path)).is_some())
        });
    }

    group.finish();
}

fn bench_context_parsing(c: &mut Criterion) {
    c.bench_function("request_context_parse", |b| {
        b.iter(|| {
            RequestContext::parse(black_box(
                "/search?message=hello+world%20%28testing%29&foo=bar&page=3",
            ))
        })
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut router = Router::new();
    let ctrl = router.controller(Controller::new("UserController"));
    router
        .get(
            "/users/{id}",
            &ctrl,
            "show",
            handler(|args: Arguments| async move {
                Ok(json!({ "id": args.get(0).to_value(), "verbose": args.get(1).to_value() }))
            }),
        )
        .param(ParameterBinding::path("id"))
        .param(ParameterBinding::query("verbose", ValueType::Json));
    let dispatcher = router.build(DispatcherConfig::default()).unwrap();
    let headers = HeaderMap::new();

    c.bench_function("dispatch_param_route", |b| {
        b.to_async(&rt).iter(|| async {
            dispatcher
                .handle_request("GET", black_box("/users/7?verbose=true"), None, &headers)
                .await
        })
    });
}

criterion_group!(benches, bench_route_lookup, bench_context_parsing, bench_dispatch);
criterion_main!(benches);
