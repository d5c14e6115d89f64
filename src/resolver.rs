//! 未翻訳キーの解決
//!
//! ホストにキーの値がない場合、[`MissingKeyResolver`] はキーが属する名前空間だけを
//! ロードし、ロードしたバンドルから最終的な文字列を作ります。
//!
//! 1. `namespace.rest` を最初の区切り文字で分割
//! 2. (言語, 名前空間) のロード状態を確認
//! 3. `Absent`: フェッチを開始して `Loading` として保存
//!    `Loading`: 進行中のフェッチにアタッチ
//!    `Loaded`: レジストリからすぐにテンプレートを読む
//! 4. テンプレートを埋め込み、エントリがなければキー全体を返す

use std::future::IntoFuture;
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

use futures::future::{
    self,
    BoxFuture,
};
use futures::{
    FutureExt,
    TryFutureExt,
};

use crate::cache::{
    LoadState,
    LoadStatus,
    NamespaceCache,
    SharedBundle,
};
use crate::config::LoaderSettings;
use crate::error::ResolveError;
use crate::fetcher::Fetcher;
use crate::interpolation::{
    InterpolationParams,
    Interpolator,
    TemplateInterpolator,
};
use crate::key::TranslationKey;
use crate::loader::NamespaceLoader;
use crate::registry::TranslationRegistry;

/// 未翻訳キーの解決結果
///
/// どちらのバリアントも `.await` できます。
pub enum Resolution {
    /// 名前空間はロード済み
    Ready(String),
    /// 名前空間をロード中（ロード後に同じ規則で値が決まる）
    Pending(BoxFuture<'static, Result<String, ResolveError>>),
}

impl Resolution {
    /// 待たずに値が得られるか
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// 待たずに得られる値
    #[must_use]
    pub fn ready(self) -> Option<String> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending(_) => None,
        }
    }
}

impl IntoFuture for Resolution {
    type Output = Result<String, ResolveError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(value) => future::ready(Ok(value)).boxed(),
            Self::Pending(pending) => pending,
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.debug_tuple("Pending").field(&"<future>").finish(),
        }
    }
}

/// キーの値がないときにホストが渡すパラメータ
#[derive(Debug, Clone, Default)]
pub struct MissingTranslationParams {
    /// 要求されたキー全体（例: `core.firstname`）
    pub key: String,
    /// テンプレートに埋め込むパラメータ
    pub interpolate_params: InterpolationParams,
}

impl MissingTranslationParams {
    /// 埋め込みパラメータなしで `key` のパラメータを作成
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), interpolate_params: InterpolationParams::new() }
    }

    /// 埋め込みパラメータを設定
    #[must_use]
    pub fn with_params(mut self, params: InterpolationParams) -> Self {
        self.interpolate_params = params;
        self
    }
}

/// ロード済みの値がないキーに対してホストが呼ぶフック
pub trait MissingTranslationHandler: Send + Sync {
    /// ホストの現在の言語で `params.key` を解決
    ///
    /// # Errors
    /// キーを分割できない場合は [`ResolveError::MalformedKey`]
    fn resolve_missing(&self, params: &MissingTranslationParams) -> Result<Resolution, ResolveError>;
}

/// ロード済みか、待機すべきフライト
enum Acquired {
    /// レジストリに公開済み
    Loaded,
    /// フェッチ中（この呼び出しで開始した場合も含む）
    Pending(SharedBundle),
}

/// 未翻訳キーの名前空間を遅延ロードする
///
/// 同時にいくつのキーが要求しても、(言語, 名前空間) ごとにフェッチは 1 回です。
pub struct MissingKeyResolver {
    /// (言語, 名前空間) ごとのロード状態（リゾルバーと同じ寿命）
    cache: Arc<Mutex<NamespaceCache>>,
    /// フェッチを開始し、結果を `cache` に反映する
    loader: NamespaceLoader,
    /// ロード済みバンドルを保持するホストのレジストリ
    registry: Arc<dyn TranslationRegistry>,
    /// テンプレートの埋め込み
    interpolator: Arc<dyn Interpolator>,
    /// 名前空間と残りのキーの区切り文字
    key_separator: String,
    /// レジストリに現在の言語がないときの言語
    default_language: Option<String>,
}

impl std::fmt::Debug for MissingKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MissingKeyResolver")
            .field("cache", &self.cache)
            .field("loader", &self.loader)
            .field("registry", &"<dyn TranslationRegistry>")
            .field("interpolator", &"<dyn Interpolator>")
            .field("key_separator", &self.key_separator)
            .field("default_language", &self.default_language)
            .finish()
    }
}

impl MissingKeyResolver {
    /// `{{ name }}` 形式の埋め込みとデフォルト設定でリゾルバーを作成
    pub fn new(fetcher: Arc<dyn Fetcher>, registry: Arc<dyn TranslationRegistry>) -> Self {
        let cache = Arc::new(Mutex::new(NamespaceCache::new()));
        let loader = NamespaceLoader::new(fetcher, Arc::clone(&registry), Arc::clone(&cache));
        let defaults = LoaderSettings::default();

        Self {
            cache,
            loader,
            registry,
            interpolator: Arc::new(TemplateInterpolator),
            key_separator: defaults.key_separator,
            default_language: defaults.default_language,
        }
    }

    /// `settings` の区切り文字、タイムアウト、デフォルト言語を適用
    ///
    /// ネストしたキーを平坦化する Fetcher も同じ区切り文字を使う必要があります
    /// （[`JsonDirFetcher::from_settings`](crate::fetcher::JsonDirFetcher::from_settings)）。
    #[must_use]
    pub fn with_settings(mut self, settings: &LoaderSettings) -> Self {
        self.key_separator.clone_from(&settings.key_separator);
        self.default_language.clone_from(&settings.default_language);
        self.loader = self.loader.with_fetch_timeout(settings.fetch_timeout());
        self
    }

    /// 埋め込み処理を差し替える
    #[must_use]
    pub fn with_interpolator(mut self, interpolator: Arc<dyn Interpolator>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// `language` で `full_key` を解決
    ///
    /// 名前空間がロード済みなら [`Resolution::Ready`]、そうでなければ
    /// （今開始したものを含む）フェッチにアタッチした [`Resolution::Pending`] を返します。
    /// ロード済みの名前空間にないキーは `full_key` そのものに解決されます。
    ///
    /// # Errors
    /// キーを名前空間と残りに分割できない場合は、何もフェッチせずに
    /// [`ResolveError::MalformedKey`]。フェッチの失敗は Pending の future が返します。
    pub fn handle(
        &self,
        full_key: &str,
        params: &InterpolationParams,
        language: &str,
    ) -> Result<Resolution, ResolveError> {
        let key = TranslationKey::parse(full_key, &self.key_separator)?;

        match self.acquire(language, key.namespace) {
            Acquired::Loaded => {
                let template = self.registry.lookup(language, key.namespace, key.remainder);
                Ok(Resolution::Ready(project(
                    template.as_deref(),
                    &key,
                    params,
                    self.interpolator.as_ref(),
                )))
            }
            Acquired::Pending(flight) => Ok(self.attach(&key, params, flight)),
        }
    }

    /// 未翻訳キーより先に `namespaces` のロードを開始
    ///
    /// ロード済みの名前空間はスキップし、ロード中のものは再利用します。
    /// 返す future は全てのロード完了、または最初の失敗で完了します。
    pub fn preload<'a>(
        &self,
        language: &str,
        namespaces: impl IntoIterator<Item = &'a str>,
    ) -> BoxFuture<'static, Result<(), ResolveError>> {
        let pending: Vec<SharedBundle> = namespaces
            .into_iter()
            .filter_map(|namespace| match self.acquire(language, namespace) {
                Acquired::Loaded => None,
                Acquired::Pending(flight) => Some(flight),
            })
            .collect();

        future::try_join_all(pending).map_ok(drop).boxed()
    }

    /// (言語, 名前空間) のロード状態
    #[must_use]
    pub fn status(&self, language: &str, namespace: &str) -> LoadStatus {
        self.lock_cache().status(language, namespace)
    }

    /// 全ロード状態を破棄し、次の要求で再フェッチさせる
    ///
    /// 進行中のフェッチはアタッチ済みの呼び出し元には完了しますが、
    /// キャッシュは更新しません。
    pub fn reset(&self) {
        tracing::debug!("Resetting namespace cache");
        self.lock_cache().clear();
    }

    /// `language` の全ロード状態を破棄
    pub fn evict_language(&self, language: &str) {
        tracing::debug!(language, "Evicting language");
        self.lock_cache().clear_language(language);
    }

    /// (言語, 名前空間) のロード状態を破棄
    pub fn evict(&self, language: &str, namespace: &str) {
        tracing::debug!(language, namespace, "Evicting namespace");
        self.lock_cache().remove(language, namespace);
    }

    /// (言語, 名前空間) の状態を読み、なければフェッチを開始
    fn acquire(&self, language: &str, namespace: &str) -> Acquired {
        let mut cache = self.lock_cache();
        cache.ensure_language(language);

        let state = cache.get(language, namespace);
        match state {
            LoadState::Loaded => Acquired::Loaded,
            LoadState::Loading(flight) => {
                tracing::debug!(language, namespace, flight = flight.id, "Attaching to namespace load");
                Acquired::Pending(flight.future)
            }
            LoadState::Absent => {
                let flight = self.loader.load(language, namespace);
                cache.set(language, namespace, LoadState::Loading(flight.clone()));
                drop(cache);

                NamespaceLoader::drive(&flight);
                Acquired::Pending(flight.future)
            }
        }
    }

    /// `flight` の結果のバンドルから `key` の値を作る
    fn attach(
        &self,
        key: &TranslationKey<'_>,
        params: &InterpolationParams,
        flight: SharedBundle,
    ) -> Resolution {
        let interpolator = Arc::clone(&self.interpolator);
        let full = key.full.to_string();
        let separator = self.key_separator.clone();
        let params = params.clone();

        Resolution::Pending(
            async move {
                let bundle = flight.await?;
                let key = TranslationKey::parse(&full, &separator)?;
                let template = bundle.template(key.namespace, key.remainder);
                Ok(project(template, &key, &params, interpolator.as_ref()))
            }
            .boxed(),
        )
    }

    /// キャッシュをロック（poison からは回復する）
    fn lock_cache(&self) -> MutexGuard<'_, NamespaceCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MissingTranslationHandler for MissingKeyResolver {
    fn resolve_missing(&self, params: &MissingTranslationParams) -> Result<Resolution, ResolveError> {
        let Some(language) =
            self.registry.current_language().or_else(|| self.default_language.clone())
        else {
            tracing::debug!(key = %params.key, "No current language, returning key");
            return Ok(Resolution::Ready(params.key.clone()));
        };

        self.handle(&params.key, &params.interpolate_params, &language)
    }
}

/// `template` を埋め込み、なければキー全体を返す
fn project(
    template: Option<&str>,
    key: &TranslationKey<'_>,
    params: &InterpolationParams,
    interpolator: &dyn Interpolator,
) -> String {
    template.map_or_else(
        || {
            tracing::debug!(key = key.full, namespace = key.namespace, "No template for key");
            key.full.to_string()
        },
        |template| interpolator.interpolate(template, params),
    )
}
