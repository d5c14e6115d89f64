//! Resolves translation keys from the command line, loading only the
//! namespaces they belong to.
//!
//! ```text
//! lazy-i18n <language> <key> [key...]
//! ```
//!
//! Settings are read from `.lazy-i18n.json` in the current directory.

use std::process::ExitCode;
use std::sync::Arc;

use futures::future::join_all;
use lazy_i18n::config::ConfigManager;
use lazy_i18n::{
    InMemoryRegistry,
    InterpolationParams,
    JsonDirFetcher,
    MissingKeyResolver,
};

#[tokio::main]
#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(language) = args.next() else {
        eprintln!("Usage: lazy-i18n <language> <key> [key...]");
        return ExitCode::FAILURE;
    };
    let keys: Vec<String> = args.collect();
    if keys.is_empty() {
        eprintln!("Usage: lazy-i18n <language> <key> [key...]");
        return ExitCode::FAILURE;
    }

    let mut config_manager = ConfigManager::new();
    let workspace_root = std::env::current_dir().ok();
    if let Err(error) = config_manager.load_settings(workspace_root) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }
    let settings = config_manager.get_settings().clone();

    let fetcher = JsonDirFetcher::from_settings(config_manager.translations_path(), &settings);
    tracing::debug!(root = %fetcher.root().display(), "Using translations directory");
    let registry = InMemoryRegistry::with_language(language.clone());
    let resolver =
        MissingKeyResolver::new(Arc::new(fetcher), Arc::new(registry)).with_settings(&settings);

    tracing::info!(language = %language, keys = keys.len(), "Resolving keys");

    let params = InterpolationParams::new();
    let pending = keys.iter().map(|key| {
        let resolution = resolver.handle(key, &params, &language);
        async move { resolution?.await }
    });
    let results = join_all(pending).await;

    let mut failed = false;
    for (key, result) in keys.iter().zip(results) {
        match result {
            Ok(value) => println!("{key} = {value}"),
            Err(error) => {
                failed = true;
                eprintln!("{key}: {error}");
            }
        }
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
