//! 翻訳バンドル（名前空間 → キー → テンプレート）

use std::collections::HashMap;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

/// 1 つの名前空間のキー → テンプレート
pub type NamespaceEntries = HashMap<String, String>;

/// 1 言語分のロード済み翻訳（名前空間ごと）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    /// 名前空間 → 平坦化されたエントリ
    namespaces: HashMap<String, NamespaceEntries>,
}

impl Bundle {
    /// 空のバンドルを作成
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 1 つの名前空間だけを持つバンドルを作成
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>, entries: NamespaceEntries) -> Self {
        let mut bundle = Self::new();
        bundle.insert_namespace(namespace, entries);
        bundle
    }

    /// トップレベルのキーを名前空間とする JSON オブジェクトからバンドルを作成
    ///
    /// 名前空間より下のネストは `separator` で平坦化します。
    /// トップレベルのオブジェクト以外の値は無視します。
    ///
    /// # Examples
    /// ```
    /// use serde_json::json;
    /// use lazy_i18n::bundle::Bundle;
    ///
    /// let bundle = Bundle::from_json(
    ///     &json!({ "admin_module": { "configuration": { "sub": "Settings" } } }),
    ///     ".",
    /// );
    /// assert_eq!(bundle.template("admin_module", "configuration.sub"), Some("Settings"));
    /// ```
    #[must_use]
    pub fn from_json(json: &Value, separator: &str) -> Self {
        let mut bundle = Self::new();
        if let Value::Object(map) = json {
            for (namespace, body) in map {
                if body.is_object() {
                    bundle.insert_namespace(namespace.clone(), flatten_json(body, separator, None));
                }
            }
        }
        bundle
    }

    /// 名前空間の JSON 本体から単一名前空間のバンドルを作成
    #[must_use]
    pub fn from_namespace_json(namespace: impl Into<String>, body: &Value, separator: &str) -> Self {
        Self::with_namespace(namespace, flatten_json(body, separator, None))
    }

    /// 名前空間を追加または置き換える
    pub fn insert_namespace(&mut self, namespace: impl Into<String>, entries: NamespaceEntries) {
        self.namespaces.insert(namespace.into(), entries);
    }

    /// `bundle[namespace][key]` を検索
    #[must_use]
    pub fn template(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespace(namespace)?.get(key).map(String::as_str)
    }

    /// 名前空間のエントリ
    #[must_use]
    pub fn namespace(&self, namespace: &str) -> Option<&NamespaceEntries> {
        self.namespaces.get(namespace)
    }

    /// 名前空間が存在するか（空でも true）
    #[must_use]
    pub fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// 名前空間名のイテレータ
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// 名前空間が 1 つもないか
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// `other` を `self` にマージ
    ///
    /// `other` にない名前空間はそのまま残り、両方にある名前空間はキー単位で上書きします。
    pub fn merge(&mut self, other: &Self) {
        for (namespace, entries) in &other.namespaces {
            self.namespaces
                .entry(namespace.clone())
                .or_default()
                .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
}

/// Flatten nested JSON object into a separator-joined key map.
///
/// Arrays use `key[index]` notation; non-string scalars keep their JSON text.
#[must_use]
pub fn flatten_json(json: &Value, separator: &str, prefix: Option<&str>) -> NamespaceEntries {
    let mut result = HashMap::new();
    flatten_json_value(json, separator, prefix, &mut result);
    result
}

/// [`flatten_json`] の再帰処理
fn flatten_json_value(
    json: &Value,
    separator: &str,
    prefix: Option<&str>,
    result: &mut NamespaceEntries,
) {
    match json {
        Value::Object(map) => {
            for (key, value) in map {
                let full_key =
                    prefix.map_or_else(|| key.clone(), |p| format!("{p}{separator}{key}"));
                flatten_json_value(value, separator, Some(&full_key), result);
            }
        }
        Value::Array(arr) => {
            for (index, value) in arr.iter().enumerate() {
                let full_key =
                    prefix.map_or_else(|| format!("[{index}]"), |p| format!("{p}[{index}]"));
                flatten_json_value(value, separator, Some(&full_key), result);
            }
        }
        Value::String(s) => {
            if let Some(key) = prefix {
                result.insert(key.to_string(), s.clone());
            }
        }
        Value::Null => {}
        _ => {
            if let Some(key) = prefix {
                result.insert(key.to_string(), json.to_string());
            }
        }
    }
}
