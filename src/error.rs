//! 名前空間のロードとキー解決のエラー型

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// [`Fetcher`](crate::fetcher::Fetcher) が返すエラー
#[derive(Error, Debug)]
pub enum FetchError {
    /// バンドルの読み込みに失敗した場合のエラー
    #[error("Failed to read translation bundle: {0}")]
    Io(#[from] std::io::Error),
    /// バンドルが正しい JSON でない場合のエラー
    #[error("Failed to parse translation bundle: {0}")]
    Parse(#[from] serde_json::Error),
    /// 言語または名前空間をバンドルの場所に変換できない
    #[error("Invalid bundle path component: {0}")]
    InvalidPath(String),
    /// 指定された言語・名前空間のバンドルが存在しない
    #[error("No translation bundle for language '{language}' and namespace '{namespace}'")]
    NotFound { language: String, namespace: String },
    /// 設定されたタイムアウト内にフェッチが完了しなかった
    #[error("Fetching namespace '{namespace}' for '{language}' timed out after {timeout:?}")]
    Timeout { language: String, namespace: String, timeout: Duration },
    /// フェッチ中に panic が発生した
    #[error("Fetcher panicked: {0}")]
    Panicked(String),
    /// その他の Fetcher 固有のエラー
    #[error("{0}")]
    Other(String),
}

/// [`MissingKeyResolver`](crate::resolver::MissingKeyResolver) が返すエラー
///
/// 1 回のフェッチ失敗を待機中の全呼び出し元に配るため `Clone` 可能。
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// キーに区切り文字がない、または名前空間・残りのキーが空
    #[error("Malformed translation key '{key}': expected '<namespace>{separator}<key>'")]
    MalformedKey { key: String, separator: String },
    /// キーの (言語, 名前空間) のフェッチに失敗した
    #[error("Failed to load namespace '{namespace}' for language '{language}': {source}")]
    FetchFailure {
        language: String,
        namespace: String,
        #[source]
        source: Arc<FetchError>,
    },
}

impl ResolveError {
    /// フェッチ失敗であれば元の `FetchError` を返す
    #[must_use]
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            Self::FetchFailure { source, .. } => Some(source),
            Self::MalformedKey { .. } => None,
        }
    }
}
