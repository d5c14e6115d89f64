//! 遅いバックエンドに対して大量の未翻訳キーを解決するデモ
//!
//! 使い方:
//! ```
//! cargo run --release --example resolve_keys -- 200
//! ```

use std::sync::Arc;
use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};
use std::time::Duration;

use lazy_i18n::bundle::Bundle;
use lazy_i18n::{
    FetchError,
    InMemoryRegistry,
    InterpolationParams,
    MissingKeyResolver,
};
use serde_json::json;

const NAMESPACES: [&str; 3] = ["core", "admin", "validations"];

#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let requests: usize = std::env::args().nth(1).and_then(|arg| arg.parse().ok()).unwrap_or(100);

    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);
    let fetcher = move |language: String, namespace: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let body = json!({
                "greeting": format!("[{language}] Hello {{{{name}}}} from {namespace}"),
            });
            Ok::<_, FetchError>(Bundle::from_namespace_json(namespace, &body, "."))
        }
    };

    let registry = Arc::new(InMemoryRegistry::with_language("en"));
    let resolver = MissingKeyResolver::new(Arc::new(fetcher), registry);

    println!("=== Lazy Namespace Loading ===");
    println!("Requests: {requests}");

    let start = std::time::Instant::now();
    let mut params = InterpolationParams::new();
    params.insert("name".to_string(), json!("Bob"));

    let pending: Vec<_> = NAMESPACES
        .iter()
        .cycle()
        .take(requests)
        .map(|namespace| {
            let resolution = resolver.handle(&format!("{namespace}.greeting"), &params, "en");
            async move { resolution?.await }
        })
        .collect();
    let results = futures::future::join_all(pending).await;

    let resolved = results.iter().filter(|result| result.is_ok()).count();
    println!("Resolved: {resolved}/{requests} in {}ms", start.elapsed().as_millis());
    println!("Fetches: {}", fetches.load(Ordering::SeqCst));
    if let Some(Ok(sample)) = results.first() {
        println!("Sample: {sample}");
    }
}
