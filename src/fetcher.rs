//! バンドルの取得

use std::future::Future;
use std::path::{
    Path,
    PathBuf,
};

use futures::FutureExt;
use futures::future::{
    self,
    BoxFuture,
};
use serde_json::Value;

use crate::bundle::Bundle;
use crate::config::LoaderSettings;
use crate::error::FetchError;

/// 1 つの (言語, 名前空間) のバンドルを取得する
///
/// 返す future は `'static` である必要があるため、実装は必要な値を `self`
/// から複製してから返します。
pub trait Fetcher: Send + Sync {
    /// (言語, 名前空間) のバンドル取得を開始
    fn fetch(&self, language: &str, namespace: &str) -> BoxFuture<'static, Result<Bundle, FetchError>>;
}

impl<F, Fut> Fetcher for F
where
    F: Fn(String, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bundle, FetchError>> + Send + 'static,
{
    fn fetch(&self, language: &str, namespace: &str) -> BoxFuture<'static, Result<Bundle, FetchError>> {
        self(language.to_string(), namespace.to_string()).boxed()
    }
}

/// `<root>/<language>/<namespace>.json` からバンドルを読み込む
///
/// 各ファイルは 1 つの名前空間の中身を持ち、ネストしたオブジェクトは
/// キー区切り文字で平坦化されます。区切り文字はリゾルバーと同じものを
/// 使う必要があるため、設定からは [`JsonDirFetcher::from_settings`] で作成します。
#[derive(Debug, Clone)]
pub struct JsonDirFetcher {
    /// 言語ごとのサブディレクトリを持つディレクトリ
    root: PathBuf,
    /// ネストしたキーの平坦化に使う区切り文字
    key_separator: String,
}

impl JsonDirFetcher {
    /// `root` を起点に `"."` で平坦化するフェッチャーを作成
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), key_separator: ".".to_string() }
    }

    /// `settings` のキー区切り文字を使うフェッチャーを作成
    #[must_use]
    pub fn from_settings(root: impl Into<PathBuf>, settings: &LoaderSettings) -> Self {
        Self::new(root).with_key_separator(settings.key_separator.clone())
    }

    /// ネストしたキーの平坦化に `separator` を使う
    #[must_use]
    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = separator.into();
        self
    }

    /// ルートディレクトリ
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// キー区切り文字
    #[must_use]
    pub fn key_separator(&self) -> &str {
        &self.key_separator
    }

    /// (言語, 名前空間) のバンドルファイルのパスを解決
    ///
    /// # Errors
    /// どちらかの要素がルートの外を指しうる場合は [`FetchError::InvalidPath`]
    pub fn bundle_path(&self, language: &str, namespace: &str) -> Result<PathBuf, FetchError> {
        validate_component(language)?;
        validate_component(namespace)?;
        Ok(self.root.join(language).join(format!("{namespace}.json")))
    }
}

/// 空・相対・区切り文字を含むパス要素を拒否する
fn validate_component(component: &str) -> Result<(), FetchError> {
    let invalid = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0']);
    if invalid {
        return Err(FetchError::InvalidPath(component.to_string()));
    }
    Ok(())
}

impl Fetcher for JsonDirFetcher {
    fn fetch(&self, language: &str, namespace: &str) -> BoxFuture<'static, Result<Bundle, FetchError>> {
        let path = match self.bundle_path(language, namespace) {
            Ok(path) => path,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        let language = language.to_string();
        let namespace = namespace.to_string();
        let separator = self.key_separator.clone();

        async move {
            tracing::debug!(path = %path.display(), "Reading translation bundle");

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(FetchError::NotFound { language, namespace });
                }
                Err(e) => return Err(e.into()),
            };

            let json: Value = serde_json::from_str(&content)?;
            if !json.is_object() {
                return Err(FetchError::Other(format!(
                    "Expected a JSON object in {}",
                    path.display()
                )));
            }

            Ok(Bundle::from_namespace_json(namespace, &json, &separator))
        }
        .boxed()
    }
}
