//! テスト用ユーティリティ
//!
//! 複数のテストモジュールで使用される共通のフェイクを提供します。
#![cfg(test)]

use std::collections::HashMap;
use std::sync::{
    Arc,
    Mutex,
};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::bundle::Bundle;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::registry::{
    InMemoryRegistry,
    TranslationRegistry,
};

/// キーと値のペアから単一名前空間のバンドルを作成する
pub(crate) fn bundle(namespace: &str, entries: &[(&str, &str)]) -> Bundle {
    Bundle::with_namespace(
        namespace,
        entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
    )
}

/// テストが許可するまで完了しないフェッチャー
///
/// レスポンスはフェッチ開始時点で確定します。未登録の組は
/// [`FetchError::NotFound`] で失敗します。
#[derive(Debug)]
pub(crate) struct GatedFetcher {
    /// 呼び出し順の (言語, 名前空間)
    calls: Mutex<Vec<(String, String)>>,
    /// 用意された結果（`Err` は失敗メッセージ）
    responses: Mutex<HashMap<(String, String), Result<Bundle, String>>>,
    /// 完了を許可するフェッチごとに 1 パーミット
    gate: Arc<Semaphore>,
}

impl GatedFetcher {
    /// [`GatedFetcher::release`] まで待機する
    pub(crate) fn closed() -> Self {
        Self {
            calls: Mutex::default(),
            responses: Mutex::default(),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// ポーリングされるとすぐに完了する
    pub(crate) fn open() -> Self {
        let fetcher = Self::closed();
        fetcher.gate.add_permits(Semaphore::MAX_PERMITS);
        fetcher
    }

    /// `language` の `bundle` 内の全名前空間に `bundle` を返す
    pub(crate) fn respond(&self, language: &str, bundle: Bundle) {
        let mut responses = self.responses.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for namespace in bundle.namespaces() {
            responses.insert((language.to_string(), namespace.to_string()), Ok(bundle.clone()));
        }
    }

    /// (言語, 名前空間) を `message` で失敗させる
    pub(crate) fn fail(&self, language: &str, namespace: &str, message: &str) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert((language.to_string(), namespace.to_string()), Err(message.to_string()));
    }

    /// 待機中または今後のフェッチを `count` 件完了させる
    pub(crate) fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// 開始されたフェッチの総数
    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// (言語, 名前空間) ごとのフェッチ数
    pub(crate) fn calls_for(&self, language: &str, namespace: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(l, n)| l == language && n == namespace)
            .count()
    }
}

impl Fetcher for GatedFetcher {
    fn fetch(&self, language: &str, namespace: &str) -> BoxFuture<'static, Result<Bundle, FetchError>> {
        let key = (language.to_string(), namespace.to_string());
        self.calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(key.clone());

        let response = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .cloned();
        let gate = Arc::clone(&self.gate);

        async move {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            match response {
                Some(Ok(bundle)) => Ok(bundle),
                Some(Err(message)) => Err(FetchError::Other(message)),
                None => Err(FetchError::NotFound { language: key.0, namespace: key.1 }),
            }
        }
        .boxed()
    }
}

/// `set_translation` の呼び出しを記録する [`InMemoryRegistry`]
#[derive(Debug, Default)]
pub(crate) struct RecordingRegistry {
    /// 実体のレジストリ
    inner: InMemoryRegistry,
    /// `set_translation` ごとの (言語, merge)
    set_calls: Mutex<Vec<(String, bool)>>,
}

impl RecordingRegistry {
    /// 記録された `set_translation` の呼び出し
    pub(crate) fn set_calls(&self) -> Vec<(String, bool)> {
        self.set_calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// 現在の言語を切り替える
    pub(crate) fn use_language(&self, language: &str) {
        self.inner.use_language(language);
    }
}

impl TranslationRegistry for RecordingRegistry {
    fn current_language(&self) -> Option<String> {
        self.inner.current_language()
    }

    fn set_translation(&self, language: &str, bundle: Arc<Bundle>, merge: bool) {
        self.set_calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((language.to_string(), merge));
        self.inner.set_translation(language, bundle, merge);
    }

    fn lookup(&self, language: &str, namespace: &str, key: &str) -> Option<String> {
        self.inner.lookup(language, namespace, key)
    }
}
