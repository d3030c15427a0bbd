//! Application state.

use std::sync::Arc;

use tokio::sync::Mutex;
use vidwork_docstore::{CheckpointStore, FirestoreClient, StatusStore};
use vidwork_media::create_shared_vad;
use vidwork_storage::R2Client;
use vidwork_worker::{InFlightJob, Orchestrator, OrchestratorDeps, ShutdownCoordinator, WorkerConfig};

use crate::config::ApiConfig;
use crate::providers::{build_asr_pool, build_ocr_pool};

/// Audio is always decoded to 16kHz mono PCM before VAD/transcription
/// (`decode_pcm_f32_mono_16k` in the worker's transcription stage).
const VAD_SAMPLE_RATE: usize = 16_000;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub status: StatusStore,
    pub checkpoints: CheckpointStore,
    pub storage: Arc<R2Client>,
    pub orchestrator: Arc<Orchestrator>,
    pub shutdown: Arc<ShutdownCoordinator>,
    /// The single job this process is currently running, if any (§5: one
    /// worker process handles exactly one job at a time). Swapped in/out
    /// around each `Orchestrator::process` call so the shutdown
    /// coordinator knows what to flush.
    pub in_flight: Arc<Mutex<Option<InFlightJob>>>,
}

impl AppState {
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage = Arc::new(R2Client::from_env().await?);
        let firestore = FirestoreClient::from_env().await?;
        let status = StatusStore::new(firestore.clone());
        let checkpoints = CheckpointStore::new(firestore);

        let worker_config = WorkerConfig::from_env();
        let http = reqwest::Client::builder().build()?;

        let deps = OrchestratorDeps {
            storage: storage.clone(),
            status: status.clone(),
            checkpoints: checkpoints.clone(),
            ocr_pool: build_ocr_pool(http.clone()),
            asr_pool: build_asr_pool(http),
            vad: create_shared_vad(VAD_SAMPLE_RATE)?,
            result_bucket_prefix: config.result_bucket_prefix.clone(),
        };
        let orchestrator = Arc::new(Orchestrator::new(deps, worker_config.clone()));
        let shutdown = Arc::new(ShutdownCoordinator::new(
            status.clone(),
            checkpoints.clone(),
            &worker_config,
        ));

        Ok(Self {
            config,
            status,
            checkpoints,
            storage,
            orchestrator,
            shutdown,
            in_flight: Arc::new(Mutex::new(None)),
        })
    }
}
