//! Record store: the document-database collaborator holding `ResumeRecord`s and
//! the categories they are filed under.
//!
//! `PgResumeStore` is the production backend; `MemoryResumeStore` backs local runs
//! without a database and the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::category::Category;
use crate::models::resume::{ResumeChunks, ResumeRecord, ResumeStatus};

pub use memory::MemoryResumeStore;
pub use postgres::PgResumeStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Fields the ingest pipeline merges onto a record.
/// `suggestions: None` leaves any stored suggestions untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFields {
    pub chunks: ResumeChunks,
    pub tags: Vec<String>,
    pub suggestions: Option<Vec<String>>,
}

/// User-editable record fields. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsUpdate {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub status: Option<ResumeStatus>,
    pub notes: Option<String>,
    pub category_id: Option<String>,
}

impl DetailsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == DetailsUpdate::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResumeFilter {
    pub owner_id: Option<String>,
    pub category_id: Option<String>,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ResumeRecord>, StoreError>;

    /// Inserts `record`. When one already exists under `record.id`, only its extraction
    /// fields (chunks, tags, suggestions) are merged and user-edited fields are kept.
    async fn create(&self, record: &ResumeRecord) -> Result<(), StoreError>;

    /// Merge extraction fields and refresh `updated_at`.
    /// Returns `false` when no record exists under `id`.
    async fn merge_extraction(
        &self,
        id: &str,
        fields: &ExtractionFields,
    ) -> Result<bool, StoreError>;

    /// Most recently updated first.
    async fn list(&self, filter: &ResumeFilter) -> Result<Vec<ResumeRecord>, StoreError>;

    async fn update_details(
        &self,
        id: &str,
        update: &DetailsUpdate,
    ) -> Result<Option<ResumeRecord>, StoreError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Ordered by name.
    async fn list_categories(&self, owner_id: Option<&str>) -> Result<Vec<Category>, StoreError>;

    async fn create_category(&self, category: &Category) -> Result<(), StoreError>;

    async fn update_category(
        &self,
        id: &str,
        update: &CategoryUpdate,
    ) -> Result<Option<Category>, StoreError>;

    /// Resumes filed under the category keep their `category_id`.
    async fn delete_category(&self, id: &str) -> Result<bool, StoreError>;
}
