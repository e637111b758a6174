//! msr-gateway library: application state and router assembly
//!
//! The gateway translates transport payloads into the core contracts and
//! hosts the sync service; no business logic lives in the handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tracing::info;

use msr_common::config::ApiKeys;
use msr_common::events::EventBus;
use msr_common::Result;
use msr_core::device::{builtin_devices, DeviceRegistry, FanOut};
use msr_core::emotion::EmotionEngine;
use msr_core::memory::MemoryStore;
use msr_core::orchestrator::{Orchestrator, SessionStore};
use msr_core::runtime::{
    AgentRegistry, ConnectorSet, DeviceAgent, EmotionAgent, MemoryAgent, ReaderAgent, Scheduler,
    SqlConnector,
};
use msr_core::voice::{SttPort, StubStt, StubTts, TtsPort};

pub mod api;
pub mod error;
pub mod sync;

use api::quota::{QuotaConfig, QuotaEnforcer};
use sync::SyncService;

/// Options for building the application state
pub struct GatewayOptions {
    pub db: SqlitePool,
    pub root_folder: PathBuf,
    pub sync_whitelist: Vec<String>,
    pub api_keys: ApiKeys,
    pub quota: QuotaConfig,
    /// Seed the six demo loopback devices at startup
    pub seed_builtin_devices: bool,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bus: EventBus,
    pub orchestrator: Arc<Orchestrator>,
    pub agents: Arc<AgentRegistry>,
    pub devices: Arc<DeviceRegistry>,
    pub memory: MemoryStore,
    pub emotion: Arc<EmotionEngine>,
    pub tts: Arc<dyn TtsPort>,
    pub stt: Arc<dyn SttPort>,
    pub sync: Arc<SyncService>,
    pub api_keys: Arc<ApiKeys>,
    pub quota: Arc<QuotaEnforcer>,
}

impl AppState {
    /// Wire the full application graph.
    pub async fn build(options: GatewayOptions) -> Result<AppState> {
        let bus = EventBus::new(1000);

        let devices = Arc::new(DeviceRegistry::new(bus.clone()));
        if options.seed_builtin_devices {
            for (descriptor, port) in builtin_devices() {
                devices.register(descriptor, port).await;
            }
        }

        let fanout = FanOut::new(devices.clone(), bus.clone());
        let memory = MemoryStore::new(options.db.clone());
        let emotion = Arc::new(EmotionEngine::new());
        let tts: Arc<dyn TtsPort> = Arc::new(StubTts::default());
        let stt: Arc<dyn SttPort> = Arc::new(StubStt);

        let mut connectors = ConnectorSet::new();
        connectors.insert(Arc::new(SqlConnector::new("sql", options.db.clone())));

        let agents = Arc::new(AgentRegistry::wire(
            ReaderAgent::new(),
            EmotionAgent::new(emotion.clone()),
            DeviceAgent::new(fanout),
            MemoryAgent::new(memory.clone()),
            &connectors,
        )?);

        let orchestrator = Arc::new(Orchestrator::new(
            agents.clone(),
            Arc::new(SessionStore::new(bus.clone())),
            Arc::new(Scheduler::default()),
            tts.clone(),
            bus.clone(),
        ));

        let sync = Arc::new(SyncService::new(
            options.root_folder.clone(),
            options.sync_whitelist,
            bus.clone(),
        ));

        let quota = Arc::new(QuotaEnforcer::new(options.quota, bus.clone()));

        Ok(AppState {
            db: options.db,
            bus,
            orchestrator,
            agents,
            devices,
            memory,
            emotion,
            tts,
            stt,
            sync,
            api_keys: Arc::new(options.api_keys),
            quota,
        })
    }
}

/// Build the application router: public health and sync push channel, plus
/// the authenticated API surface.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        // Orchestrator lifecycle
        .route("/orchestrator/play", post(api::orchestrator::play))
        .route("/orchestrator/pause", post(api::orchestrator::pause))
        .route("/orchestrator/seek", post(api::orchestrator::seek))
        .route("/orchestrator/summary", get(api::orchestrator::summary))
        // Text tooling
        .route("/segment_text", post(api::orchestrator::segment_text))
        .route("/generate_haptics", post(api::orchestrator::generate_haptics))
        .route("/haptic_patterns", get(api::orchestrator::haptic_patterns))
        // Senses
        .route("/api/detect-emotion", post(api::senses::detect_emotion))
        .route("/api/tts", post(api::senses::tts))
        .route("/api/stt", post(api::senses::stt))
        .route(
            "/api/broadcast-to-devices",
            post(api::senses::broadcast_to_devices),
        )
        .route("/api/devices/connected", get(api::senses::devices_connected))
        .route("/api/devices/connect", post(api::senses::devices_connect))
        .route(
            "/api/devices/disconnect",
            post(api::senses::devices_disconnect),
        )
        .route("/api/devices/heartbeat", post(api::senses::devices_heartbeat))
        // Sync (HTTP side)
        .route("/sync/manifest", get(api::sync_http::manifest))
        .route("/sync/file", get(api::sync_http::file))
        .route("/sync/allowed-paths", get(api::sync_http::allowed_paths))
        .route("/sync/feature-flags", get(api::sync_http::feature_flags))
        // Retrieval store
        .route("/rag/query", get(api::rag::query))
        .route("/rag/upsert", post(api::rag::upsert))
        .route("/rag/list", get(api::rag::list))
        .route("/rag/delete", delete(api::rag::delete))
        // Model selection
        .route("/ai/model-select", get(api::model::model_select))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(api::health))
        .route("/ws/sync", get(sync::ws::ws_sync));

    Router::new().merge(protected).merge(public).with_state(state)
}

/// Spawn the long-lived background tasks: sync watcher, device liveness
/// sweeper, session TTL sweeper.
pub fn spawn_background_tasks(state: &AppState) {
    tokio::spawn(state.sync.clone().watch_loop());

    let devices = state.devices.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(10));
        loop {
            ticker.tick().await;
            devices.sweep_stale().await;
        }
    });

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            orchestrator.sweep_expired().await;
        }
    });

    info!("background tasks started");
}
