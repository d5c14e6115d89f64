//! (言語, 名前空間) ごとのロード状態

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{
    BoxFuture,
    Shared,
};

use crate::bundle::Bundle;
use crate::error::ResolveError;

/// 名前空間ロードの共有 future（一度だけ完了し、全アタッチ先に同じ結果を返す）
pub type SharedBundle = Shared<BoxFuture<'static, Result<Arc<Bundle>, ResolveError>>>;

/// 1 つの (言語, 名前空間) の進行中フェッチ
#[derive(Clone)]
pub struct InFlight {
    /// フライト ID（遅れて完了したフライトが古いかどうかの判定に使う）
    pub id: u64,
    /// 全呼び出し元がアタッチする共有の結果
    pub future: SharedBundle,
}

impl std::fmt::Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight").field("id", &self.id).finish_non_exhaustive()
    }
}

/// (言語, 名前空間) のロード状態
#[derive(Debug, Clone, Default)]
pub enum LoadState {
    /// 未要求、または失敗・削除によって戻された状態
    #[default]
    Absent,
    /// フェッチ中
    Loading(InFlight),
    /// バンドルをレジストリに公開済み
    Loaded,
}

impl LoadState {
    /// future を含まない状態
    #[must_use]
    pub const fn status(&self) -> LoadStatus {
        match self {
            Self::Absent => LoadStatus::Absent,
            Self::Loading(_) => LoadStatus::Loading,
            Self::Loaded => LoadStatus::Loaded,
        }
    }

    /// ロード中であればフライト ID
    #[must_use]
    pub const fn flight_id(&self) -> Option<u64> {
        match self {
            Self::Loading(flight) => Some(flight.id),
            Self::Absent | Self::Loaded => None,
        }
    }
}

/// future を含まない [`LoadState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    /// 未ロード
    Absent,
    /// ロード中
    Loading,
    /// ロード済み
    Loaded,
}

/// 言語 → 名前空間 → [`LoadState`]
///
/// エントリは `Loading` か `Loaded` のみを持ち、`Absent` はエントリがないことで表します。
#[derive(Debug, Default)]
pub struct NamespaceCache {
    /// 言語ごとの名前空間の状態
    languages: HashMap<String, HashMap<String, LoadState>>,
}

impl NamespaceCache {
    /// 空のキャッシュを作成
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// (言語, 名前空間) の状態（未設定なら `Absent`）
    #[must_use]
    pub fn get(&self, language: &str, namespace: &str) -> LoadState {
        self.languages
            .get(language)
            .and_then(|namespaces| namespaces.get(namespace))
            .cloned()
            .unwrap_or_default()
    }

    /// (言語, 名前空間) のステータス
    #[must_use]
    pub fn status(&self, language: &str, namespace: &str) -> LoadStatus {
        self.languages
            .get(language)
            .and_then(|namespaces| namespaces.get(namespace))
            .map_or(LoadStatus::Absent, LoadState::status)
    }

    /// (言語, 名前空間) の状態を設定（`Absent` ならエントリを削除）
    pub fn set(&mut self, language: &str, namespace: &str, state: LoadState) {
        tracing::debug!(language, namespace, status = ?state.status(), "Namespace state changed");

        if matches!(state, LoadState::Absent) {
            if let Some(namespaces) = self.languages.get_mut(language) {
                namespaces.remove(namespace);
            }
            return;
        }
        self.ensure_language(language).insert(namespace.to_string(), state);
    }

    /// 言語ごとのマップがなければ作成
    pub fn ensure_language(&mut self, language: &str) -> &mut HashMap<String, LoadState> {
        self.languages.entry(language.to_string()).or_default()
    }

    /// (言語, 名前空間) を `Absent` に戻し、以前の状態を返す
    pub fn remove(&mut self, language: &str, namespace: &str) -> LoadState {
        self.languages
            .get_mut(language)
            .and_then(|namespaces| namespaces.remove(namespace))
            .unwrap_or_default()
    }

    /// `language` の全名前空間を破棄
    pub fn clear_language(&mut self, language: &str) {
        self.languages.remove(language);
    }

    /// 全状態を破棄
    pub fn clear(&mut self) {
        self.languages.clear();
    }

    /// `Absent` 以外の (言語, 名前空間) の数
    #[must_use]
    pub fn len(&self) -> usize {
        self.languages.values().map(HashMap::len).sum()
    }

    /// 全エントリが `Absent` か
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// マップを持つ言語（空のものも含む）
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.keys().map(String::as_str)
    }
}
