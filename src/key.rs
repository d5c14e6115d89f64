//! 翻訳キーの分割

use crate::error::ResolveError;

/// 名前空間と、名前空間内のキーに分割した翻訳キー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationKey<'a> {
    /// 要求されたままのキー（例: `core.firstname`）
    pub full: &'a str,
    /// 最初の区切り文字より前（例: `core`）
    pub namespace: &'a str,
    /// 最初の区切り文字より後（例: `firstname`）
    pub remainder: &'a str,
}

impl<'a> TranslationKey<'a> {
    /// `full` を最初の `separator` で分割
    ///
    /// 残りの部分の区切り文字はそのまま残ります。
    /// `admin_module.configuration.sub` は名前空間 `admin_module`、
    /// 残り `configuration.sub` になります。
    ///
    /// # Errors
    /// 区切り文字がない、またはどちらかが空の場合は [`ResolveError::MalformedKey`]
    pub fn parse(full: &'a str, separator: &str) -> Result<Self, ResolveError> {
        let malformed =
            || ResolveError::MalformedKey { key: full.to_string(), separator: separator.to_string() };

        if separator.is_empty() {
            return Err(malformed());
        }
        let Some((namespace, remainder)) = full.split_once(separator) else {
            return Err(malformed());
        };
        if namespace.is_empty() || remainder.is_empty() {
            return Err(malformed());
        }

        Ok(Self { full, namespace, remainder })
    }
}
