//! ローダーの設定

/// 設定ファイルの読み込み
mod loader;
/// 設定マネージャー
mod manager;
/// 設定の型
mod types;

pub use loader::CONFIG_FILE_NAME;
pub use manager::ConfigManager;
pub use types::{
    ConfigError,
    LoaderSettings,
    ValidationError,
};
