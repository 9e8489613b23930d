//! In-process fakes for the pipeline's collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::ingest::pipeline::{IngestPipeline, PipelineSettings};
use crate::llm_client::{ChatCompletion, LlmError};
use crate::models::resume::ResumeRecord;
use crate::state::AppState;
use crate::storage::{ObjectStore, StorageError};
use crate::store::{
    DetailsUpdate, ExtractionFields, MemoryResumeStore, ResumeFilter, ResumeStore, StoreError,
};

#[derive(Default)]
pub struct FakeObjectStore {
    objects: HashMap<(String, String), Bytes>,
    fail_first: u32,
    delay: Option<Duration>,
    downloads: AtomicU32,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, path: &str, data: Bytes) -> Self {
        self.objects
            .insert((bucket.to_string(), path.to_string()), data);
        self
    }

    /// The first `n` downloads report the object as missing.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn downloads(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StorageError> {
        let attempt = self.downloads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let not_found = || StorageError::NotFound {
            bucket: bucket.to_string(),
            path: path.to_string(),
        };
        if attempt <= self.fail_first {
            return Err(not_found());
        }
        self.objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(not_found)
    }
}

enum Reply {
    Content(String),
    Status(u16),
}

/// Chat backend that always gives the same reply and records `(system, user)` per call.
pub struct ScriptedLlm {
    reply: Reply,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    pub fn replying(content: &str) -> Self {
        Self {
            reply: Reply::Content(content.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Reply::Status(status),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedLlm {
    async fn complete_json(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match &self.reply {
            Reply::Content(content) => Ok(content.clone()),
            Reply::Status(status) => Err(LlmError::Api {
                status: *status,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

/// Record store whose every call fails like an unreachable database.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl ResumeStore for FailingStore {
    async fn get(&self, _id: &str) -> Result<Option<ResumeRecord>, StoreError> {
        Err(unavailable())
    }

    async fn create(&self, _record: &ResumeRecord) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn merge_extraction(
        &self,
        _id: &str,
        _fields: &ExtractionFields,
    ) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn list(&self, _filter: &ResumeFilter) -> Result<Vec<ResumeRecord>, StoreError> {
        Err(unavailable())
    }

    async fn update_details(
        &self,
        _id: &str,
        _update: &DetailsUpdate,
    ) -> Result<Option<ResumeRecord>, StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _id: &str) -> Result<bool, StoreError> {
        Err(unavailable())
    }
}

/// Application state over in-process fakes, for driving the router.
pub fn app_state(
    storage: FakeObjectStore,
    llm: ScriptedLlm,
    store: Arc<MemoryResumeStore>,
    webhook_token: Option<&str>,
) -> AppState {
    let settings = PipelineSettings {
        retrieval_attempts: 1,
        retrieval_backoff: Duration::ZERO,
        timeout: Duration::from_secs(30),
        max_input_chars: 10_000,
        request_suggestions: false,
    };
    let pipeline = IngestPipeline::new(Arc::new(storage), Arc::new(llm), store.clone(), settings);
    AppState {
        pipeline: Arc::new(pipeline),
        categories: store.clone(),
        store,
        webhook_token: webhook_token.map(str::to_string),
    }
}
