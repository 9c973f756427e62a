//! Greeter demo
//!
//! Builds a small route table, then dispatches a handful of requests and
//! prints the resulting envelopes.
//!
//! Run with: cargo run --example greeter --features config [settings.toml]
//!
//! Settings can also come from the environment, e.g.
//! `TRELLIS_LOG_FORMAT=pretty TRELLIS_LOG_REQUESTS=true`.

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use trellis::logging::info;
use trellis::prelude::*;

fn build_router() -> Router {
    let mut router = Router::new();

    let greeter = router.controller(Controller::new("GreeterController").attribute(
        "visitor",
        |info: Arc<RequestInfo>| async move {
            let name = info.header("x-visitor").unwrap_or("stranger").to_string();
            Ok(json!({ "name": name }))
        },
    ));

    router.get(
        "/hello",
        &greeter,
        "hello",
        handler(|_args| async move { Ok("Hello world") }),
    );

    router
        .get(
            "/hello/{name}",
            &greeter,
            "greet",
            handler(|args: Arguments| async move {
                let name = args.get(0).as_str().unwrap_or("world").to_string();
                let visitor = args.get(1).to_value();
                Ok(json!({
                    "greeting": format!("Hello, {}!", name),
                    "from": visitor["name"].clone(),
                }))
            }),
        )
        .param(ParameterBinding::path("name").decoded())
        .param(ParameterBinding::model_attribute("visitor"));

    let visits = Arc::new(AtomicU64::new(0));
    router
        .post(
            "/visits",
            &greeter,
            "record",
            handler(move |args: Arguments| {
                let visits = visits.clone();
                async move {
                    let count = visits.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(HttpResponse::created().with_body(json!({
                        "visit": count,
                        "note": args.get(0).to_value(),
                    })))
                }
            }),
        )
        .param(ParameterBinding::body())
        .synchronized();

    router
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = TrellisSettings::load(settings_path.as_deref())?;
    let _guard = settings.logging.to_log_config()?.init();

    let dispatcher = settings.build_router(build_router())?;
    info!(routes = ?dispatcher.routes().patterns(), "greeter ready");

    let requests = vec![
        HttpRequest::new("GET", "/hello"),
        HttpRequest::new("GET", "/hello/Ada%20Lovelace").with_header("X-Visitor", "Charles"),
        HttpRequest::new("POST", "/visits").with_json(&json!({ "from": "demo" }))?,
        HttpRequest::new("DELETE", "/hello"),
        HttpRequest::new("GET", "/goodbye"),
    ];

    for request in requests {
        let line = format!("{} {}", request.method, request.path);
        let response = dispatcher.handle(request).await;
        println!("{:<32} -> {} {}", line, response.status, response.body);
    }

    Ok(())
}
