use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use siphon_config::{
    AppConfig, ConfigService, PeerFilterSettings, TorrentDownloaderConfig, TorrentDownloaderType,
};
use siphon_engine::{
    BackendCapabilities, BackendRegistry, EngineBackend, EngineError, EngineResult, EngineState,
    EngineSupervisor, QBittorrentBackend, TorrentEngine,
};
use siphon_test_support::fixtures::qbittorrent_config;
use siphon_test_support::mocks;
use siphon_torrent_core::{
    DownloaderStats, EncodedTorrentInfo, TorrentDownloader, TorrentError, TorrentHandle,
    TorrentLibInfo, TorrentResult, TorrentSession,
};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    max_live: AtomicUsize,
    created: AtomicUsize,
    applied: AtomicUsize,
    fail: AtomicBool,
    filters: Mutex<Vec<PeerFilterSettings>>,
}

impl Counters {
    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn filters(&self) -> Vec<PeerFilterSettings> {
        self.filters
            .lock()
            .map(|filters| filters.clone())
            .unwrap_or_default()
    }
}

struct FakeDownloader {
    counters: Arc<Counters>,
    stats: watch::Sender<DownloaderStats>,
    closed: AtomicBool,
}

#[async_trait]
impl TorrentDownloader for FakeDownloader {
    fn vendor(&self) -> TorrentLibInfo {
        TorrentLibInfo {
            vendor: "fake".into(),
            version: "0".into(),
            supports_streaming: false,
        }
    }

    fn stats(&self) -> watch::Receiver<DownloaderStats> {
        self.stats.subscribe()
    }

    async fn fetch_torrent(
        &self,
        _uri: &str,
        _timeout: Duration,
    ) -> TorrentResult<EncodedTorrentInfo> {
        Err(TorrentError::Unsupported {
            operation: "fetch_torrent",
        })
    }

    async fn start_download(
        &self,
        _info: &EncodedTorrentInfo,
    ) -> TorrentResult<Arc<dyn TorrentSession>> {
        Err(TorrentError::Unsupported {
            operation: "start_download",
        })
    }

    fn save_dir_for(&self, _handle: &TorrentHandle) -> PathBuf {
        PathBuf::new()
    }

    fn list_saves(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    async fn open_sessions(&self) -> Vec<TorrentHandle> {
        Vec::new()
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct FakeBackend {
    kind: TorrentDownloaderType,
    counters: Arc<Counters>,
}

impl FakeBackend {
    fn new(kind: TorrentDownloaderType, counters: &Arc<Counters>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            counters: Arc::clone(counters),
        })
    }
}

#[async_trait]
impl EngineBackend for FakeBackend {
    fn kind(&self) -> TorrentDownloaderType {
        self.kind
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            live_reconfigure: true,
            peer_filter: true,
        }
    }

    fn settings_changed(
        &self,
        previous: &TorrentDownloaderConfig,
        next: &TorrentDownloaderConfig,
    ) -> bool {
        previous.qbittorrent != next.qbittorrent
    }

    async fn new_instance(
        &self,
        _config: &TorrentDownloaderConfig,
    ) -> EngineResult<Arc<dyn TorrentDownloader>> {
        if self.counters.fail.load(Ordering::SeqCst) {
            return Err(EngineError::BackendUnavailable { kind: self.kind });
        }
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        let (stats, _) = watch::channel(DownloaderStats::default());
        Ok(Arc::new(FakeDownloader {
            counters: Arc::clone(&self.counters),
            stats,
            closed: AtomicBool::new(false),
        }))
    }

    async fn test_connection(&self, _config: &TorrentDownloaderConfig) -> bool {
        true
    }

    async fn apply_config(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        _config: &TorrentDownloaderConfig,
    ) {
        self.counters.applied.fetch_add(1, Ordering::SeqCst);
    }

    async fn apply_peer_filter(
        &self,
        _downloader: &Arc<dyn TorrentDownloader>,
        filter: &PeerFilterSettings,
    ) {
        if let Ok(mut filters) = self.counters.filters.lock() {
            filters.push(filter.clone());
        }
    }
}

async fn eventually(condition: impl Fn() -> bool) -> bool {
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

fn config_for(kind: TorrentDownloaderType) -> AppConfig {
    let mut config = AppConfig::default();
    config.downloader.downloader_type = kind;
    config
}

fn start_engine(service: &ConfigService, backend: Arc<dyn EngineBackend>) -> TorrentEngine {
    TorrentEngine::start(
        backend,
        service.watch_downloader(),
        service.watch_peer_filter(),
    )
}

#[tokio::test]
async fn first_configuration_initializes_one_downloader() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );

    timeout(WAIT, engine.wait_initialized()).await??;
    assert_eq!(engine.state(), EngineState::Ready);
    assert!(engine.current_downloader().await.is_some());
    assert_eq!(engine.downloader().await?.vendor().vendor, "fake");
    assert_eq!(counters.live(), 1);

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn restarts_never_overlap_downloaders() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );
    timeout(WAIT, engine.wait_initialized()).await??;

    for _ in 0..3 {
        engine.restart().await?;
    }

    assert_eq!(counters.created.load(Ordering::SeqCst), 4);
    assert_eq!(counters.live(), 1);
    assert_eq!(counters.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(engine.state(), EngineState::Ready);

    engine.close().await;
    assert_eq!(counters.live(), 0);
    Ok(())
}

#[tokio::test]
async fn settings_changes_are_applied_in_place() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );
    timeout(WAIT, engine.wait_initialized()).await??;

    service.update(|config| config.downloader.aria2.url = "http://aria2:6800/jsonrpc".into());
    service.update(|config| config.downloader.qbittorrent.url = "http://qbt:8080".into());

    assert!(eventually(|| counters.applied.load(Ordering::SeqCst) == 1).await);
    assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    assert_eq!(counters.live(), 1);

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn peer_filter_updates_reach_the_backend() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );
    timeout(WAIT, engine.wait_initialized()).await??;

    service.update(|config| {
        config.peer_filter.enabled = true;
        config.peer_filter.blocked_ips = vec!["10.0.0.0/8".into()];
    });

    assert!(
        eventually(|| {
            counters
                .filters()
                .last()
                .is_some_and(|filter| filter.enabled && filter.blocked_ips.len() == 1)
        })
        .await
    );

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn failed_creation_waits_for_next_configuration() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    counters.fail.store(true, Ordering::SeqCst);
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );

    assert!(
        timeout(Duration::from_millis(100), engine.wait_initialized())
            .await
            .is_err()
    );
    assert_eq!(engine.state(), EngineState::Uninitialized);

    counters.fail.store(false, Ordering::SeqCst);
    service.update(|config| config.downloader.qbittorrent.password = "retry".into());
    timeout(WAIT, engine.wait_initialized()).await??;
    assert_eq!(counters.live(), 1);

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn closed_engine_rejects_further_use() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let service = ConfigService::new(config_for(TorrentDownloaderType::QBittorrent));
    let engine = start_engine(
        &service,
        FakeBackend::new(TorrentDownloaderType::QBittorrent, &counters),
    );
    timeout(WAIT, engine.wait_initialized()).await??;

    engine.close().await;

    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(counters.live(), 0);
    assert!(engine.current_downloader().await.is_none());
    assert!(matches!(
        engine.wait_initialized().await,
        Err(EngineError::Closed)
    ));
    assert!(matches!(engine.restart().await, Err(EngineError::Closed)));
    Ok(())
}

#[tokio::test]
async fn connection_test_uses_a_throwaway_login() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_ok(&server);
    let mut config = AppConfig::default();
    config.downloader = qbittorrent_config(&server.base_url());
    let service = ConfigService::new(config);

    let engine = start_engine(&service, Arc::new(QBittorrentBackend::new()?));
    timeout(WAIT, engine.wait_initialized()).await??;

    assert!(engine.test_connection().await);
    assert_eq!(engine.downloader().await?.vendor().vendor, "qBittorrent");

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn connection_test_reports_rejection_and_outage_as_false() -> anyhow::Result<()> {
    let server = MockServer::start_async().await;
    mocks::login_rejected(&server);
    let backend = QBittorrentBackend::new()?;

    assert!(
        !backend
            .test_connection(&qbittorrent_config(&server.base_url()))
            .await
    );
    assert!(
        !backend
            .test_connection(&qbittorrent_config("http://127.0.0.1:1"))
            .await
    );
    Ok(())
}

#[tokio::test]
async fn unavailable_kind_never_initializes() -> anyhow::Result<()> {
    let registry = BackendRegistry::unavailable();
    let service = ConfigService::new(config_for(TorrentDownloaderType::Aria2));
    let engine = start_engine(&service, registry.get(TorrentDownloaderType::Aria2));

    assert!(
        timeout(Duration::from_millis(100), engine.wait_initialized())
            .await
            .is_err()
    );
    assert!(!engine.test_connection().await);
    assert!(matches!(
        engine.restart().await,
        Err(EngineError::BackendUnavailable {
            kind: TorrentDownloaderType::Aria2
        })
    ));

    engine.close().await;
    Ok(())
}

#[tokio::test]
async fn supervisor_swaps_engines_on_backend_change() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut registry = BackendRegistry::unavailable();
    registry.register(FakeBackend::new(TorrentDownloaderType::Embedded, &counters));
    registry.register(FakeBackend::new(
        TorrentDownloaderType::QBittorrent,
        &counters,
    ));
    let service = Arc::new(ConfigService::new(config_for(
        TorrentDownloaderType::Embedded,
    )));

    let supervisor = EngineSupervisor::start(registry, Arc::clone(&service));
    let first = timeout(WAIT, supervisor.wait_engine()).await??;
    timeout(WAIT, first.wait_initialized()).await??;
    assert_eq!(counters.live(), 1);

    service.update(|config| {
        config.downloader.downloader_type = TorrentDownloaderType::QBittorrent;
    });
    assert!(
        eventually(|| {
            supervisor
                .active_engine()
                .is_some_and(|engine| !Arc::ptr_eq(&engine, &first))
        })
        .await
    );
    assert_eq!(first.state(), EngineState::Closed);

    let second = timeout(WAIT, supervisor.wait_engine()).await??;
    timeout(WAIT, second.wait_initialized()).await??;
    assert_eq!(counters.live(), 1);
    assert_eq!(counters.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(counters.created.load(Ordering::SeqCst), 2);

    supervisor.close().await;
    assert_eq!(counters.live(), 0);
    assert_eq!(second.state(), EngineState::Closed);
    assert!(supervisor.active_engine().is_none());
    assert!(matches!(
        supervisor.wait_engine().await,
        Err(EngineError::Closed)
    ));
    Ok(())
}
