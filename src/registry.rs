//! ホスト側の翻訳レジストリ

use std::collections::HashMap;
use std::sync::{
    Arc,
    PoisonError,
    RwLock,
};

use crate::bundle::Bundle;

/// ホスト側で言語ごとの翻訳テーブルを保持する
pub trait TranslationRegistry: Send + Sync {
    /// 現在の言語
    fn current_language(&self) -> Option<String>;

    /// `language` のバンドルを保存
    ///
    /// `merge` が true なら既存の名前空間を残し、false なら言語のテーブルを置き換えます。
    fn set_translation(&self, language: &str, bundle: Arc<Bundle>, merge: bool);

    /// 保存済みの (言語, 名前空間, キー) のテンプレートを検索
    fn lookup(&self, language: &str, namespace: &str, key: &str) -> Option<String>;
}

/// プロセス内のマップによるレジストリ
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    /// 言語 → マージ済みバンドル
    tables: RwLock<HashMap<String, Bundle>>,
    /// [`TranslationRegistry::current_language`] が返す言語
    current_language: RwLock<Option<String>>,
}

impl InMemoryRegistry {
    /// 現在の言語なしで空のレジストリを作成
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `language` を現在の言語とする空のレジストリを作成
    #[must_use]
    pub fn with_language(language: impl Into<String>) -> Self {
        let registry = Self::new();
        registry.use_language(language);
        registry
    }

    /// 現在の言語を切り替える
    pub fn use_language(&self, language: impl Into<String>) {
        let language = language.into();
        tracing::debug!(%language, "Switching current language");
        *self.current_language.write().unwrap_or_else(PoisonError::into_inner) = Some(language);
    }

    /// `language` に保存された翻訳のコピー
    #[must_use]
    pub fn translations(&self, language: &str) -> Option<Bundle> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).get(language).cloned()
    }

    /// バンドルが保存されている言語
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }
}

impl TranslationRegistry for InMemoryRegistry {
    fn current_language(&self) -> Option<String> {
        self.current_language.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_translation(&self, language: &str, bundle: Arc<Bundle>, merge: bool) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if merge {
            tables.entry(language.to_string()).or_default().merge(&bundle);
        } else {
            tables.insert(language.to_string(), Bundle::clone(&bundle));
        }
    }

    fn lookup(&self, language: &str, namespace: &str, key: &str) -> Option<String> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(language)?
            .template(namespace, key)
            .map(str::to_string)
    }
}
