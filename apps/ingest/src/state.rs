use std::sync::Arc;

use crate::ingest::pipeline::IngestPipeline;
use crate::store::{CategoryStore, ResumeStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    /// Same store the pipeline writes to; the record API reads and edits through it.
    pub store: Arc<dyn ResumeStore>,
    pub categories: Arc<dyn CategoryStore>,
    /// Bearer token the storage webhook must present. `None` disables the check.
    pub webhook_token: Option<String>,
}
