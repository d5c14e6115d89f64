//! 名前空間のシングルフライトロード

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
    PoisonError,
};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::bundle::Bundle;
use crate::cache::{
    InFlight,
    LoadState,
    NamespaceCache,
};
use crate::error::{
    FetchError,
    ResolveError,
};
use crate::fetcher::Fetcher;
use crate::registry::TranslationRegistry;

/// フェッチを開始し、その結果をレジストリとキャッシュに反映する
///
/// [`NamespaceLoader::load`] は呼び出しごとに Fetcher をちょうど 1 回呼び、
/// 結果を共有 future で包みます。完了後にアタッチした呼び出し元も含め、
/// 全員が同じバンドルまたは同じエラーを受け取ります。
pub struct NamespaceLoader {
    /// バンドルの取得元
    fetcher: Arc<dyn Fetcher>,
    /// ロード済みバンドルの公開先
    registry: Arc<dyn TranslationRegistry>,
    /// フライト完了時に更新するキャッシュ
    cache: Arc<Mutex<NamespaceCache>>,
    /// 1 回のフェッチの上限時間
    fetch_timeout: Option<Duration>,
    /// 次のフライト ID
    next_flight: AtomicU64,
}

impl std::fmt::Debug for NamespaceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceLoader")
            .field("fetcher", &"<dyn Fetcher>")
            .field("registry", &"<dyn TranslationRegistry>")
            .field("fetch_timeout", &self.fetch_timeout)
            .field("next_flight", &self.next_flight)
            .finish_non_exhaustive()
    }
}

impl NamespaceLoader {
    /// `cache` を更新するローダーを作成
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        registry: Arc<dyn TranslationRegistry>,
        cache: Arc<Mutex<NamespaceCache>>,
    ) -> Self {
        Self { fetcher, registry, cache, fetch_timeout: None, next_flight: AtomicU64::new(1) }
    }

    /// `timeout` 以内に完了しないフェッチを失敗させる
    ///
    /// タイムアウトは Tokio ランタイム内でポーリングされた場合のみ適用されます。
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// 設定されたフェッチのタイムアウト
    #[must_use]
    pub const fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }

    /// (言語, 名前空間) のロードを開始
    ///
    /// Fetcher はこの関数が戻る前に呼ばれます。返されたフライトは最初に
    /// ポーリングされる前に [`LoadState::Loading`] として保存する必要があります。
    /// 完了時、エントリがまだこのフライトのものであれば、成功なら
    /// `merge = true` で公開した後に `Loaded` へ、失敗なら `Absent` へ戻します。
    /// Fetcher 内の panic は [`FetchError::Panicked`] として失敗扱いになります。
    pub fn load(&self, language: &str, namespace: &str) -> InFlight {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(language, namespace, flight = id, "Fetching namespace");

        let fetch = catch_panics(self.with_timeout(
            self.fetcher.fetch(language, namespace),
            language,
            namespace,
        ));
        let registry = Arc::clone(&self.registry);
        let cache = Arc::clone(&self.cache);
        let language = language.to_string();
        let namespace = namespace.to_string();

        let future = async move {
            match fetch.await {
                Ok(bundle) => {
                    let bundle = Arc::new(bundle);
                    registry.set_translation(&language, Arc::clone(&bundle), true);
                    settle(&cache, &language, &namespace, id, LoadState::Loaded);
                    tracing::info!(%language, %namespace, flight = id, "Namespace loaded");
                    Ok(bundle)
                }
                Err(error) => {
                    tracing::warn!(%language, %namespace, flight = id, %error, "Namespace fetch failed");
                    settle(&cache, &language, &namespace, id, LoadState::Absent);
                    Err(ResolveError::FetchFailure { language, namespace, source: Arc::new(error) })
                }
            }
        }
        .boxed()
        .shared();

        InFlight { id, future }
    }

    /// Tokio ランタイム内であれば `flight` をバックグラウンドで最後まで実行する
    ///
    /// 全呼び出し元がハンドルを破棄しても、開始済みのフェッチは完了します。
    pub fn drive(flight: &InFlight) {
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(flight.future.clone().map(drop));
        }
    }

    /// 設定されたタイムアウトで `fetch` を包む
    fn with_timeout(
        &self,
        fetch: BoxFuture<'static, Result<Bundle, FetchError>>,
        language: &str,
        namespace: &str,
    ) -> BoxFuture<'static, Result<Bundle, FetchError>> {
        let Some(timeout) = self.fetch_timeout else {
            return fetch;
        };
        let language = language.to_string();
        let namespace = namespace.to_string();

        async move {
            // タイマーは Tokio ランタイムの外では使えない
            if tokio::runtime::Handle::try_current().is_err() {
                tracing::debug!(%language, %namespace, "No Tokio runtime, fetching without timeout");
                return fetch.await;
            }
            tokio::time::timeout(timeout, fetch)
                .await
                .unwrap_or_else(|_elapsed| Err(FetchError::Timeout { language, namespace, timeout }))
        }
        .boxed()
    }
}

/// `fetch` 内の panic を [`FetchError::Panicked`] に変換する
fn catch_panics(
    fetch: BoxFuture<'static, Result<Bundle, FetchError>>,
) -> BoxFuture<'static, Result<Bundle, FetchError>> {
    AssertUnwindSafe(fetch)
        .catch_unwind()
        .map(|outcome| {
            outcome.unwrap_or_else(|payload| Err(FetchError::Panicked(panic_message(payload.as_ref()))))
        })
        .boxed()
}

/// panic のペイロードからメッセージを取り出す
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// (言語, 名前空間) がまだフライト `id` のロード中であれば `next` へ遷移させる
fn settle(
    cache: &Mutex<NamespaceCache>,
    language: &str,
    namespace: &str,
    id: u64,
    next: LoadState,
) {
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    if cache.get(language, namespace).flight_id() == Some(id) {
        cache.set(language, namespace, next);
    } else {
        tracing::debug!(language, namespace, flight = id, "Ignoring stale flight");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use googletest::prelude::*;
    use rstest::*;

    use super::*;
    use crate::cache::LoadStatus;
    use crate::test_utils::{
        GatedFetcher,
        RecordingRegistry,
        bundle,
    };

    struct Harness {
        fetcher: Arc<GatedFetcher>,
        registry: Arc<RecordingRegistry>,
        cache: Arc<Mutex<NamespaceCache>>,
        loader: NamespaceLoader,
    }

    impl Harness {
        fn new(fetcher: GatedFetcher, timeout: Option<Duration>) -> Self {
            let fetcher = Arc::new(fetcher);
            let registry = Arc::new(RecordingRegistry::default());
            let cache = Arc::new(Mutex::new(NamespaceCache::new()));
            let loader = NamespaceLoader::new(fetcher.clone(), registry.clone(), Arc::clone(&cache))
                .with_fetch_timeout(timeout);
            Self { fetcher, registry, cache, loader }
        }

        fn status(&self, language: &str, namespace: &str) -> LoadStatus {
            self.cache.lock().unwrap().status(language, namespace)
        }

        /// リゾルバーと同じ手順でフライトを開始する
        fn start(&self, language: &str, namespace: &str) -> InFlight {
            start(&self.loader, &self.cache, language, namespace)
        }
    }

    fn start(
        loader: &NamespaceLoader,
        cache: &Mutex<NamespaceCache>,
        language: &str,
        namespace: &str,
    ) -> InFlight {
        let flight = loader.load(language, namespace);
        cache.lock().unwrap().set(language, namespace, LoadState::Loading(flight.clone()));
        flight
    }

    #[fixture]
    fn harness() -> Harness {
        Harness::new(GatedFetcher::open(), None)
    }

    /// load: Fetcher を 1 回だけ呼び、結果をレジストリに公開する
    #[rstest]
    #[tokio::test]
    async fn load_invokes_fetcher_once_and_publishes(harness: Harness) {
        harness.fetcher.respond("en", bundle("core", &[("firstname", "Hello {{name}}")]));

        let flight = harness.start("en", "core");
        assert_that!(harness.fetcher.call_count(), eq(1));
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Loading));

        let loaded = flight.future.clone().await.unwrap();

        assert_that!(loaded.template("core", "firstname"), some(eq("Hello {{name}}")));
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Loaded));
        assert_eq!(harness.registry.set_calls(), vec![("en".to_string(), true)]);
        assert_that!(harness.fetcher.call_count(), eq(1));
    }

    /// load: 完了後にアタッチしても同じ結果が返る
    #[rstest]
    #[tokio::test]
    async fn settled_flight_replays_to_late_attachments(harness: Harness) {
        harness.fetcher.respond("en", bundle("core", &[("firstname", "First")]));
        let flight = harness.start("en", "core");

        let first = flight.future.clone().await.unwrap();
        let late = flight.future.clone().await.unwrap();

        assert_that!(Arc::ptr_eq(&first, &late), eq(true));
        assert_that!(harness.fetcher.call_count(), eq(1));
        assert_that!(harness.registry.set_calls().len(), eq(1));
    }

    /// load: 失敗は全アタッチ先に届き、エントリは Absent に戻る
    #[rstest]
    #[tokio::test]
    async fn failure_reaches_every_attachment_and_reverts_to_absent(harness: Harness) {
        harness.fetcher.fail("fr", "core", "backend unavailable");
        let flight = harness.start("fr", "core");

        let (a, b) = futures::join!(flight.future.clone(), flight.future.clone());

        for result in [a, b] {
            let Err(ResolveError::FetchFailure { language, namespace, source }) = result else {
                panic!("expected FetchFailure");
            };
            assert_that!(language, eq("fr"));
            assert_that!(namespace, eq("core"));
            assert_that!(source.to_string(), contains_substring("backend unavailable"));
        }
        assert_that!(harness.status("fr", "core"), eq(LoadStatus::Absent));
        assert_that!(harness.registry.set_calls(), is_empty());
    }

    /// settle: 古いフライトの完了は新しい状態を上書きしない
    #[rstest]
    #[tokio::test]
    async fn stale_flight_does_not_overwrite_newer_state(harness: Harness) {
        harness.fetcher.respond("en", bundle("core", &[("firstname", "First")]));
        let stale = harness.start("en", "core");

        harness.cache.lock().unwrap().clear();
        let fresh = harness.start("en", "core");

        stale.future.clone().await.unwrap();
        assert_that!(harness.cache.lock().unwrap().get("en", "core").flight_id(), some(eq(fresh.id)));

        fresh.future.clone().await.unwrap();
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Loaded));
    }

    /// `with_fetch_timeout`: 時間内に完了しないフェッチは Timeout で失敗する
    #[rstest]
    #[tokio::test]
    async fn timeout_fails_the_flight() {
        let harness = Harness::new(GatedFetcher::closed(), Some(Duration::from_millis(20)));
        assert_that!(harness.loader.fetch_timeout(), some(eq(Duration::from_millis(20))));

        let flight = harness.start("en", "core");
        let result = flight.future.await;

        assert!(matches!(
            result.as_ref().map_err(ResolveError::fetch_error),
            Err(Some(FetchError::Timeout { .. }))
        ));
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Absent));
    }

    /// `with_fetch_timeout`: Tokio ランタイムの外ではタイムアウトなしでロードする
    #[rstest]
    fn timeout_is_skipped_outside_runtime() {
        let harness = Harness::new(GatedFetcher::open(), Some(Duration::from_secs(5)));
        harness.fetcher.respond("en", bundle("core", &[("a", "A")]));

        let flight = harness.start("en", "core");
        let loaded = futures::executor::block_on(flight.future).unwrap();

        assert_that!(loaded.template("core", "a"), some(eq("A")));
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Loaded));
    }

    /// load: Fetcher の panic は失敗として扱われ、次の呼び出しで再試行できる
    #[rstest]
    #[tokio::test]
    async fn panicking_fetch_reverts_to_absent_and_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move |_language: String, namespace: String| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    panic!("backend exploded");
                }
                Ok::<_, FetchError>(bundle(&namespace, &[("a", "A")]))
            }
        };
        let cache = Arc::new(Mutex::new(NamespaceCache::new()));
        let loader = NamespaceLoader::new(
            Arc::new(fetcher),
            Arc::new(RecordingRegistry::default()),
            Arc::clone(&cache),
        );

        let failed = start(&loader, &cache, "en", "core").future.await;

        let Err(error) = failed else {
            panic!("expected the panic to surface as an error");
        };
        let Some(FetchError::Panicked(message)) = error.fetch_error() else {
            panic!("expected Panicked, got {error:?}");
        };
        assert_that!(message.as_str(), contains_substring("backend exploded"));
        assert_that!(cache.lock().unwrap().status("en", "core"), eq(LoadStatus::Absent));

        let retried = start(&loader, &cache, "en", "core").future.await.unwrap();

        assert_that!(retried.template("core", "a"), some(eq("A")));
        assert_that!(cache.lock().unwrap().status("en", "core"), eq(LoadStatus::Loaded));
        assert_that!(calls.load(Ordering::SeqCst), eq(2));
    }

    /// drive: 呼び出し元がいなくてもフライトを完了させる
    #[rstest]
    #[tokio::test]
    async fn drive_completes_flight_without_callers(harness: Harness) {
        harness.fetcher.respond("en", bundle("core", &[("firstname", "First")]));

        let flight = harness.start("en", "core");
        NamespaceLoader::drive(&flight);
        drop(flight);

        for _ in 0..10 {
            if harness.status("en", "core") == LoadStatus::Loaded {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_that!(harness.status("en", "core"), eq(LoadStatus::Loaded));
    }
}
