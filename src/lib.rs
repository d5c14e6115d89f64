//! lazy-i18n
//!
//! 翻訳の名前空間を必要になった時点で 1 回だけロードするライブラリ
//!
//! `core.firstname` のようなキーは `core` 名前空間に属します。未ロードの名前空間の
//! キーが見つからない場合、[`MissingKeyResolver`] はその名前空間を 1 回だけフェッチして
//! ホストのレジストリに登録し、待機中のキーをまとめて解決します。

pub mod bundle;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod interpolation;
pub mod key;
pub mod loader;
pub mod registry;
pub mod resolver;

#[cfg(test)]
mod test_utils;

pub use bundle::Bundle;
pub use cache::{
    LoadStatus,
    NamespaceCache,
};
pub use error::{
    FetchError,
    ResolveError,
};
pub use fetcher::{
    Fetcher,
    JsonDirFetcher,
};
pub use interpolation::{
    InterpolationParams,
    Interpolator,
    TemplateInterpolator,
};
pub use loader::NamespaceLoader;
pub use registry::{
    InMemoryRegistry,
    TranslationRegistry,
};
pub use resolver::{
    MissingKeyResolver,
    MissingTranslationHandler,
    MissingTranslationParams,
    Resolution,
};
