use chrono::Utc;
use tracing::{debug, info};

use crate::ingest::event::UploadEvent;
use crate::ingest::structured::StructuredExtraction;
use crate::models::resume::{ResumeChunks, ResumeRecord, ResumeStatus};
use crate::store::{ExtractionFields, ResumeStore, StoreError};

/// Storage prefix the web client uploads into: `resumes/<category>/<file>`.
const RESUME_PREFIX: &str = "resumes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistResult {
    pub record_id: String,
    pub created: bool,
}

/// Legacy document key: every UTF-16 code unit that is not an ASCII letter or digit
/// becomes `_`, matching keys written by earlier versions of the service.
pub fn sanitize_path_key(path: &str) -> String {
    path.encode_utf16()
        .map(|unit| match char::from_u32(u32::from(unit)) {
            Some(c) if c.is_ascii_alphanumeric() => c,
            _ => '_',
        })
        .collect()
}

/// The correlation id from upload metadata wins; the sanitized path is the fallback.
pub fn resolve_document_key(event: &UploadEvent) -> String {
    match event.correlation_id() {
        Some(id) => id.to_string(),
        None => {
            debug!(
                "No correlation id on {}, falling back to path-derived key",
                event.path
            );
            sanitize_path_key(&event.path)
        }
    }
}

pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `resumes/<category>/<file>` → `<category>`.
pub fn category_from_path(path: &str) -> Option<&str> {
    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(RESUME_PREFIX), Some(category), Some(_file), None) if !category.is_empty() => {
            Some(category)
        }
        _ => None,
    }
}

impl From<&StructuredExtraction> for ExtractionFields {
    fn from(extraction: &StructuredExtraction) -> Self {
        ExtractionFields {
            chunks: ResumeChunks {
                work_experience: extraction.work_experience.clone(),
                skills: extraction.skills.clone(),
                summary: extraction.summary.clone(),
            },
            tags: extraction.tags.clone(),
            suggestions: extraction.suggestions.clone(),
        }
    }
}

fn new_record(id: String, event: &UploadEvent, fields: ExtractionFields) -> ResumeRecord {
    let now = Utc::now();
    ResumeRecord {
        id,
        file_name: file_name_of(&event.path).to_string(),
        file_path: event.path.clone(),
        file_url: event.file_url().map(str::to_string),
        owner_id: event.owner_id().map(str::to_string),
        category_id: event
            .category_id()
            .or_else(|| category_from_path(&event.path))
            .map(str::to_string),
        company: None,
        job_title: None,
        status: ResumeStatus::NotApplied,
        notes: None,
        chunks: Some(fields.chunks),
        tags: fields.tags,
        suggestions: fields.suggestions,
        created_at: now,
        updated_at: now,
    }
}

/// Merge-writes the extraction onto the record for this upload, creating the record
/// when none exists yet. Repeating it leaves the same final state.
pub async fn persist_extraction(
    store: &dyn ResumeStore,
    event: &UploadEvent,
    extraction: &StructuredExtraction,
) -> Result<PersistResult, StoreError> {
    let record_id = resolve_document_key(event);
    let fields = ExtractionFields::from(extraction);

    if store.merge_extraction(&record_id, &fields).await? {
        info!("Merged extraction into resume record {record_id}");
        return Ok(PersistResult {
            record_id,
            created: false,
        });
    }

    let record = new_record(record_id.clone(), event, fields);
    store.create(&record).await?;
    info!("Created resume record {record_id} for {}", event.path);
    Ok(PersistResult {
        record_id,
        created: true,
    })
}
