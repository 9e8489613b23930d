use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;

use crate::models::category::Category;
use crate::models::resume::{ResumeRecord, ResumeRow};
use crate::store::{
    CategoryStore, CategoryUpdate, DetailsUpdate, ExtractionFields, ResumeFilter, ResumeStore,
    StoreError,
};

/// `resumes` and `categories` tables in PostgreSQL. Every write is a single statement, so each
/// record update is atomic without an explicit transaction.
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_record(row: ResumeRow) -> Result<ResumeRecord, StoreError> {
    let id = row.id.clone();
    ResumeRecord::try_from(row).map_err(|e| StoreError::Corrupt {
        id,
        reason: e.to_string(),
    })
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn get(&self, id: &str) -> Result<Option<ResumeRecord>, StoreError> {
        let row: Option<ResumeRow> = sqlx::query_as("SELECT * FROM resumes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_record).transpose()
    }

    async fn create(&self, record: &ResumeRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resumes
                (id, file_name, file_path, file_url, owner_id, category_id, company,
                 job_title, status, notes, chunks, tags, suggestions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                chunks = COALESCE(EXCLUDED.chunks, resumes.chunks),
                tags = EXCLUDED.tags,
                suggestions = COALESCE(EXCLUDED.suggestions, resumes.suggestions),
                updated_at = NOW()
            "#,
        )
        .bind(&record.id)
        .bind(&record.file_name)
        .bind(&record.file_path)
        .bind(&record.file_url)
        .bind(&record.owner_id)
        .bind(&record.category_id)
        .bind(&record.company)
        .bind(&record.job_title)
        .bind(record.status.as_str())
        .bind(&record.notes)
        .bind(record.chunks.as_ref().map(Json))
        .bind(&record.tags)
        .bind(&record.suggestions)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Wrote resume record {}", record.id);
        Ok(())
    }

    async fn merge_extraction(
        &self,
        id: &str,
        fields: &ExtractionFields,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET chunks = $2,
                tags = $3,
                suggestions = COALESCE($4, suggestions),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(&fields.chunks))
        .bind(&fields.tags)
        .bind(&fields.suggestions)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ResumeFilter) -> Result<Vec<ResumeRecord>, StoreError> {
        let rows: Vec<ResumeRow> = sqlx::query_as(
            r#"
            SELECT * FROM resumes
            WHERE ($1::TEXT IS NULL OR owner_id = $1)
              AND ($2::TEXT IS NULL OR category_id = $2)
            ORDER BY updated_at DESC, id ASC
            "#,
        )
        .bind(&filter.owner_id)
        .bind(&filter.category_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_record).collect()
    }

    async fn update_details(
        &self,
        id: &str,
        update: &DetailsUpdate,
    ) -> Result<Option<ResumeRecord>, StoreError> {
        let row: Option<ResumeRow> = sqlx::query_as(
            r#"
            UPDATE resumes
            SET company = COALESCE($2, company),
                job_title = COALESCE($3, job_title),
                status = COALESCE($4, status),
                notes = COALESCE($5, notes),
                category_id = COALESCE($6, category_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.company)
        .bind(&update.job_title)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.notes)
        .bind(&update.category_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_record).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryStore for PgResumeStore {
    async fn list_categories(&self, owner_id: Option<&str>) -> Result<Vec<Category>, StoreError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE ($1::TEXT IS NULL OR owner_id = $1)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, owner_id, name, color, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&category.id)
        .bind(&category.owner_id)
        .bind(&category.name)
        .bind(&category.color)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Created category {}", category.id);
        Ok(())
    }

    async fn update_category(
        &self,
        id: &str,
        update: &CategoryUpdate,
    ) -> Result<Option<Category>, StoreError> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                color = COALESCE($3, color),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.color)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
