//! Engine: one explicitly constructed instance wiring store, persistence,
//! content, effects and sync. Several engines can coexist in one process.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::config::EngineConfig;
use crate::core::content::{ContentLoader, ContentSource, StaticContent};
use crate::core::effects::EffectRunner;
use crate::core::persistence::{FileBackend, PersistenceAdapter};
use crate::core::remote::{HttpRemote, RemoteSync};
use crate::core::store::Store;
use crate::core::sync::{FlushReport, SyncCoordinator};

pub struct Engine {
    pub config: EngineConfig,
    pub store: Arc<Store>,
    pub persistence: Arc<PersistenceAdapter>,
    pub content: Arc<ContentLoader>,
    pub sync: Option<Arc<SyncCoordinator>>,
    effects: Arc<EffectRunner>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Production wiring: file storage under `data_dir`, built-in content,
    /// HTTP remote when `remote_url` is set
    pub async fn start(config: EngineConfig) -> Self {
        let persistence = match &config.data_dir {
            Some(dir) => PersistenceAdapter::new(Arc::new(FileBackend::new(dir))),
            None => PersistenceAdapter::in_memory(),
        };
        let remote = config
            .remote_url
            .as_ref()
            .map(|url| Arc::new(HttpRemote::new(url.as_str())) as Arc<dyn RemoteSync>);
        Self::start_with(config, Arc::new(persistence), Arc::new(StaticContent), remote).await
    }

    pub async fn start_with(
        config: EngineConfig,
        persistence: Arc<PersistenceAdapter>,
        source: Arc<dyn ContentSource>,
        remote: Option<Arc<dyn RemoteSync>>,
    ) -> Self {
        let snapshot = persistence.rehydrate(config.generation_credits).await;
        info!(
            device = %snapshot.user.device_id,
            queued = snapshot.offline.queue.len(),
            backend = persistence.primary_name(),
            "engine starting"
        );
        let store = Arc::new(Store::with_options(snapshot, config.store_options()));

        let content = Arc::new(ContentLoader::new(Arc::clone(&store), source, Arc::clone(&persistence)));
        if let Err(e) = content.load().await {
            warn!(code = "C001_CONTENT", "content unavailable: {}", e);
        }

        let effects = Arc::new(EffectRunner::new(
            Arc::clone(&store),
            Arc::clone(&persistence),
            config.persist_debounce(),
            config.achievement_dismiss(),
        ));
        let sync = remote.map(|r| Arc::new(SyncCoordinator::new(Arc::clone(&store), r, config.remote_timeout())));

        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        let runner = Arc::clone(&effects);
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move { runner.run_persistence(rx).await }));

        let runner = Arc::clone(&effects);
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move { runner.run_dismissal(rx).await }));

        if let Some(coordinator) = &sync {
            let coordinator = Arc::clone(coordinator);
            let rx = shutdown.subscribe();
            let interval = config.sync_interval();
            tasks.push(tokio::spawn(async move { coordinator.run(interval, rx).await }));
        }

        Self { config, store, persistence, content, sync, effects, shutdown, tasks }
    }

    /// Manual sync trigger; `None` when no remote is configured
    pub async fn flush(&self) -> Option<FlushReport> {
        match &self.sync {
            Some(coordinator) => Some(coordinator.flush().await),
            None => None,
        }
    }

    pub async fn persist_now(&self) {
        self.effects.persist_now().await;
    }

    /// Stop background tasks; pending state is written on the way out
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("background task ended abnormally: {}", e);
            }
        }
        info!("engine stopped");
    }
}
