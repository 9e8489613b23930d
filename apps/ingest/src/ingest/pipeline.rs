//! Ingestion pipeline: fetch → extract text → extract structure → persist.
//!
//! One `process` call handles one finalized object. Stages run strictly in order and
//! each invocation is independent; the collaborators are injected at construction.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ingest::event::UploadEvent;
use crate::ingest::format::{is_resume_path, FileFormat};
use crate::ingest::persist::persist_extraction;
use crate::ingest::structured::{extract_structure, ExtractionError};
use crate::ingest::text::{extract_text, ExtractedText, FormatError};
use crate::llm_client::ChatCompletion;
use crate::storage::{ObjectStore, StorageError};
use crate::store::{ResumeStore, StoreError};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Total download attempts, including the first.
    pub retrieval_attempts: u32,
    /// Backoff unit; attempt `n` waits `n * retrieval_backoff` before retrying.
    pub retrieval_backoff: Duration,
    /// Upper bound on one whole invocation.
    pub timeout: Duration,
    pub max_input_chars: usize,
    pub request_suggestions: bool,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("retrieving s3://{bucket}/{path} failed after {attempts} attempt(s): {source}")]
    Retrieval {
        bucket: String,
        path: String,
        attempts: u32,
        #[source]
        source: StorageError,
    },

    #[error("{path}: {source}")]
    Format {
        path: String,
        #[source]
        source: FormatError,
    },

    #[error("structured extraction for {path} failed: {source}")]
    Extraction {
        path: String,
        #[source]
        source: ExtractionError,
    },

    #[error("persisting extraction for {path} failed: {source}")]
    Persistence {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("internal error while processing {path}: {reason}")]
    Internal { path: String, reason: String },

    #[error("processing {path} did not finish within {timeout_secs}s")]
    TimedOut { path: String, timeout_secs: u64 },
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Retrieval { .. } => "fetch",
            PipelineError::Format { .. } => "extract-text",
            PipelineError::Extraction { .. } => "extract-structure",
            PipelineError::Persistence { .. } => "persist",
            PipelineError::Internal { .. } => "internal",
            PipelineError::TimedOut { .. } => "timeout",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PipelineError::Retrieval { path, .. }
            | PipelineError::Format { path, .. }
            | PipelineError::Extraction { path, .. }
            | PipelineError::Persistence { path, .. }
            | PipelineError::Internal { path, .. }
            | PipelineError::TimedOut { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Not a resume file; nothing was touched.
    Skipped { path: String },
    Processed {
        path: String,
        record_id: String,
        format: FileFormat,
        created: bool,
        text_chars: usize,
    },
}

pub struct IngestPipeline {
    storage: Arc<dyn ObjectStore>,
    llm: Arc<dyn ChatCompletion>,
    store: Arc<dyn ResumeStore>,
    settings: PipelineSettings,
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        llm: Arc<dyn ChatCompletion>,
        store: Arc<dyn ResumeStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            storage,
            llm,
            store,
            settings,
        }
    }

    /// Processes one finalized object. Non-resume paths are a successful no-op.
    pub async fn process(&self, event: &UploadEvent) -> Result<IngestOutcome, PipelineError> {
        let span = info_span!(
            "ingest",
            invocation_id = %Uuid::new_v4(),
            bucket = %event.bucket,
            path = %event.path
        );

        async {
            if !is_resume_path(&event.path) {
                info!("Not a resume file, skipping");
                return Ok(IngestOutcome::Skipped {
                    path: event.path.clone(),
                });
            }

            let result = match tokio::time::timeout(self.settings.timeout, self.run(event)).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::TimedOut {
                    path: event.path.clone(),
                    timeout_secs: self.settings.timeout.as_secs(),
                }),
            };

            match &result {
                Ok(IngestOutcome::Processed {
                    record_id, created, ..
                }) => info!(%record_id, created, "Successfully processed resume"),
                Ok(IngestOutcome::Skipped { .. }) => {}
                Err(e) => error!(stage = e.stage(), "Error processing resume: {e}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, event: &UploadEvent) -> Result<IngestOutcome, PipelineError> {
        let path = event.path.as_str();

        // Stage 1: fetch
        let data = self.fetch(event).await?;

        // Stage 2: text extraction
        let format = FileFormat::from_path(path).ok_or_else(|| PipelineError::Internal {
            path: path.to_string(),
            reason: "path passed the trigger filter but has no known format".to_string(),
        })?;
        let extracted = self.extract_text(path, format, data).await?;
        if extracted.is_empty() {
            warn!(
                "No extractable text in {} document, continuing with empty text",
                extracted.format
            );
        }

        // Stage 3: structured extraction
        let extraction = extract_structure(
            self.llm.as_ref(),
            &extracted.text,
            self.settings.max_input_chars,
            self.settings.request_suggestions,
        )
        .await
        .map_err(|source| PipelineError::Extraction {
            path: path.to_string(),
            source,
        })?;

        // Stage 4: persist
        let persisted = persist_extraction(self.store.as_ref(), event, &extraction)
            .await
            .map_err(|source| PipelineError::Persistence {
                path: path.to_string(),
                source,
            })?;

        Ok(IngestOutcome::Processed {
            path: path.to_string(),
            record_id: persisted.record_id,
            format,
            created: persisted.created,
            text_chars: extracted.text.chars().count(),
        })
    }

    /// The only retried stage: freshly finalized objects can briefly read as missing.
    async fn fetch(&self, event: &UploadEvent) -> Result<Bytes, PipelineError> {
        let attempts = self.settings.retrieval_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.storage.download(&event.bucket, &event.path).await {
                Ok(data) => {
                    info!("Fetched {} bytes", data.len());
                    return Ok(data);
                }
                Err(e) if attempt < attempts => {
                    let delay = self.settings.retrieval_backoff * attempt;
                    warn!(
                        "Download attempt {}/{} failed ({}), retrying after {}ms...",
                        attempt,
                        attempts,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(PipelineError::Retrieval {
                        bucket: event.bucket.clone(),
                        path: event.path.clone(),
                        attempts,
                        source,
                    })
                }
            }
        }
    }

    async fn extract_text(
        &self,
        path: &str,
        format: FileFormat,
        data: Bytes,
    ) -> Result<ExtractedText, PipelineError> {
        tokio::task::spawn_blocking(move || extract_text(format, &data))
            .await
            .map_err(|e| PipelineError::Internal {
                path: path.to_string(),
                reason: format!("text extraction task failed: {e}"),
            })?
            .map_err(|source| PipelineError::Format {
                path: path.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::testing::{FailingStore, FakeObjectStore, ScriptedLlm};
    use crate::ingest::text::fixtures::{docx_with_body, pdf_with_pages};
    use crate::models::resume::ResumeRecord;
    use crate::store::MemoryResumeStore;

    const BUCKET: &str = "uploads";
    const LLM_REPLY: &str =
        r#"{"workExperience":["Built X"],"skills":["Go","SQL"],"summary":"...", "tags":["backend"]}"#;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            retrieval_attempts: 3,
            retrieval_backoff: Duration::ZERO,
            timeout: Duration::from_secs(30),
            max_input_chars: 10_000,
            request_suggestions: false,
        }
    }

    fn resume_docx() -> Bytes {
        Bytes::from(docx_with_body(
            "<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p><w:p><w:r><w:t>Built X in Go</w:t></w:r></w:p>",
        ))
    }

    struct Harness {
        storage: Arc<FakeObjectStore>,
        llm: Arc<ScriptedLlm>,
        store: Arc<MemoryResumeStore>,
        pipeline: IngestPipeline,
    }

    fn harness(storage: FakeObjectStore, llm: ScriptedLlm) -> Harness {
        harness_with(storage, llm, settings())
    }

    fn harness_with(
        storage: FakeObjectStore,
        llm: ScriptedLlm,
        settings: PipelineSettings,
    ) -> Harness {
        let storage = Arc::new(storage);
        let llm = Arc::new(llm);
        let store = Arc::new(MemoryResumeStore::new());
        let pipeline = IngestPipeline::new(storage.clone(), llm.clone(), store.clone(), settings);
        Harness {
            storage,
            llm,
            store,
            pipeline,
        }
    }

    fn without_timestamps(mut record: ResumeRecord) -> ResumeRecord {
        let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        record.created_at = epoch;
        record.updated_at = epoch;
        record
    }

    #[tokio::test]
    async fn test_non_resume_path_has_no_side_effects() {
        let h = harness(
            FakeObjectStore::new().with_object(
                BUCKET,
                "resumes/dev/photo.png",
                Bytes::from_static(b"png"),
            ),
            ScriptedLlm::replying(LLM_REPLY),
        );

        let outcome = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, "resumes/dev/photo.png"))
            .await
            .unwrap();

        assert!(matches!(outcome, IngestOutcome::Skipped { .. }));
        assert_eq!(h.storage.downloads(), 0);
        assert!(h.llm.calls().is_empty());
        assert_eq!(h.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_docx_resume_written_to_path_key() {
        let path = "resumes/dev/Jane Doe.docx";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, resume_docx()),
            ScriptedLlm::replying(LLM_REPLY),
        );

        let outcome = h.pipeline.process(&UploadEvent::new(BUCKET, path)).await.unwrap();

        let IngestOutcome::Processed {
            record_id,
            format,
            created,
            ..
        } = outcome
        else {
            panic!("expected a processed outcome");
        };
        assert_eq!(record_id, "resumes_dev_Jane_Doe_docx");
        assert_eq!(format, FileFormat::Docx);
        assert!(created);

        let calls = h.llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "Jane Doe\n\nBuilt X in Go");

        let record = h.store.get(&record_id).await.unwrap().unwrap();
        let chunks = record.chunks.unwrap();
        assert_eq!(chunks.work_experience, vec!["Built X"]);
        assert_eq!(chunks.skills, vec!["Go", "SQL"]);
        assert_eq!(chunks.summary, "...");
        assert_eq!(record.tags, vec!["backend"]);
        assert_eq!(record.suggestions, None);
    }

    #[tokio::test]
    async fn test_correlation_id_targets_existing_record() {
        let path = "resumes/dev/cv.docx";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, resume_docx()),
            ScriptedLlm::replying(LLM_REPLY),
        );
        let event = UploadEvent::new(BUCKET, path).with_metadata("X-Amz-Meta-Resume-Id", "r-123");

        let outcome = h.pipeline.process(&event).await.unwrap();

        assert!(matches!(
            outcome,
            IngestOutcome::Processed { ref record_id, .. } if record_id == "r-123"
        ));
        assert!(h.store.get("r-123").await.unwrap().is_some());
        assert!(h.store.get("resumes_dev_cv_docx").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_json_means_no_write() {
        let path = "resumes/dev/cv.docx";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, resume_docx()),
            ScriptedLlm::replying("I could not parse this resume, sorry."),
        );

        let err = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, path))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Extraction {
                source: ExtractionError::InvalidJson(_),
                ..
            }
        ));
        assert_eq!(err.stage(), "extract-structure");
        assert_eq!(h.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_reprocessing_is_idempotent() {
        let path = "resumes/dev/cv.docx";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, resume_docx()),
            ScriptedLlm::replying(LLM_REPLY),
        );
        let event = UploadEvent::new(BUCKET, path);

        h.pipeline.process(&event).await.unwrap();
        let first = h.store.get("resumes_dev_cv_docx").await.unwrap().unwrap();

        let second_outcome = h.pipeline.process(&event).await.unwrap();
        let second = h.store.get("resumes_dev_cv_docx").await.unwrap().unwrap();

        assert!(matches!(
            second_outcome,
            IngestOutcome::Processed { created: false, .. }
        ));
        assert_eq!(h.store.len().await, 1);
        assert_eq!(without_timestamps(first.clone()), without_timestamps(second.clone()));
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_image_only_pdf_still_completes() {
        let path = "resumes/dev/scan.PDF";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, Bytes::from(pdf_with_pages(&[None]))),
            ScriptedLlm::replying(r#"{"summary":""}"#),
        );

        let outcome = h.pipeline.process(&UploadEvent::new(BUCKET, path)).await.unwrap();

        assert!(matches!(
            outcome,
            IngestOutcome::Processed {
                format: FileFormat::Pdf,
                text_chars: 0,
                ..
            }
        ));
        assert_eq!(h.llm.calls()[0].1, "");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_format_error_before_llm() {
        let path = "resumes/dev/broken.pdf";
        let h = harness(
            FakeObjectStore::new().with_object(
                BUCKET,
                path,
                Bytes::from_static(b"not a pdf at all"),
            ),
            ScriptedLlm::replying(LLM_REPLY),
        );

        let err = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, path))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Format { .. }));
        assert_eq!(err.path(), path);
        assert!(h.llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_retried_until_object_appears() {
        let path = "resumes/dev/cv.docx";
        let h = harness(
            FakeObjectStore::new()
                .with_object(BUCKET, path, resume_docx())
                .failing_first(2),
            ScriptedLlm::replying(LLM_REPLY),
        );

        h.pipeline.process(&UploadEvent::new(BUCKET, path)).await.unwrap();
        assert_eq!(h.storage.downloads(), 3);
    }

    #[tokio::test]
    async fn test_retrieval_gives_up_after_bounded_attempts() {
        let h = harness(FakeObjectStore::new(), ScriptedLlm::replying(LLM_REPLY));

        let err = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, "resumes/dev/missing.pdf"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Retrieval { attempts: 3, .. }));
        assert_eq!(h.storage.downloads(), 3);
        assert!(h.llm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_database_failure_is_persistence_error() {
        let path = "resumes/dev/cv.docx";
        let pipeline = IngestPipeline::new(
            Arc::new(FakeObjectStore::new().with_object(BUCKET, path, resume_docx())),
            Arc::new(ScriptedLlm::replying(LLM_REPLY)),
            Arc::new(FailingStore),
            settings(),
        );

        let err = pipeline
            .process(&UploadEvent::new(BUCKET, path))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Persistence { .. }));
    }

    #[tokio::test]
    async fn test_llm_failure_is_extraction_error() {
        let path = "resumes/dev/cv.docx";
        let h = harness(
            FakeObjectStore::new().with_object(BUCKET, path, resume_docx()),
            ScriptedLlm::failing(503),
        );

        let err = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, path))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Extraction {
                source: ExtractionError::Llm(_),
                ..
            }
        ));
        assert_eq!(h.store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_bounded_by_timeout() {
        let path = "resumes/dev/cv.docx";
        let mut slow = settings();
        slow.timeout = Duration::from_secs(5);
        let h = harness_with(
            FakeObjectStore::new()
                .with_object(BUCKET, path, resume_docx())
                .with_delay(Duration::from_secs(3600)),
            ScriptedLlm::replying(LLM_REPLY),
            slow,
        );

        let err = h
            .pipeline
            .process(&UploadEvent::new(BUCKET, path))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TimedOut { timeout_secs: 5, .. }));
        assert_eq!(h.store.len().await, 0);
    }
}
