use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{ResumeRecord, ResumeStatus};
use crate::state::AppState;
use crate::store::{DetailsUpdate, ResumeFilter};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub owner_id: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeRecord>,
}

/// Registers a resume before its file is uploaded. The returned `id` is sent back as
/// `resumeId` upload metadata so ingestion enriches this record.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateResumeRequest {
    pub file_name: String,
    /// Defaults to `resumes/<categoryId>/<fileName>`, or `resumes/<fileName>` without one.
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub owner_id: Option<String>,
    pub category_id: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
}

impl CreateResumeRequest {
    fn into_record(self) -> Result<ResumeRecord, AppError> {
        let file_name = self.file_name.trim().to_string();
        if file_name.is_empty() || file_name.contains('/') {
            return Err(AppError::Validation(
                "fileName must be a non-empty name without '/'".to_string(),
            ));
        }
        let file_path = match (self.file_path, &self.category_id) {
            (Some(path), _) => path,
            (None, Some(category)) => format!("resumes/{category}/{file_name}"),
            (None, None) => format!("resumes/{file_name}"),
        };

        let now = Utc::now();
        Ok(ResumeRecord {
            id: Uuid::new_v4().to_string(),
            file_name,
            file_path,
            file_url: self.file_url,
            owner_id: self.owner_id,
            category_id: self.category_id,
            company: self.company,
            job_title: self.job_title,
            status: ResumeStatus::NotApplied,
            notes: self.notes,
            chunks: None,
            tags: Vec::new(),
            suggestions: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateResumeRequest {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub category_id: Option<String>,
}

impl TryFrom<UpdateResumeRequest> for DetailsUpdate {
    type Error = AppError;

    fn try_from(req: UpdateResumeRequest) -> Result<Self, Self::Error> {
        let status = req
            .status
            .as_deref()
            .map(str::parse::<ResumeStatus>)
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let update = DetailsUpdate {
            company: req.company,
            job_title: req.job_title,
            status,
            notes: req.notes,
            category_id: req.category_id,
        };
        if update.is_empty() {
            return Err(AppError::Validation(
                "At least one field must be provided".to_string(),
            ));
        }
        Ok(update)
    }
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let filter = ResumeFilter {
        owner_id: params.owner_id,
        category_id: params.category_id,
    };
    let resumes = state.store.list(&filter).await?;
    Ok(Json(ResumeListResponse { resumes }))
}

/// POST /api/v1/resumes
pub async fn handle_create_resume(
    State(state): State<AppState>,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let record = req.into_record()?;
    state.store.create(&record).await?;
    tracing::info!(resume_id = %record.id, "Resume registered");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResumeRecord>, AppError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// PATCH /api/v1/resumes/:id
pub async fn handle_update_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRecord>, AppError> {
    let update = DetailsUpdate::try_from(req)?;
    state
        .store
        .update_details(&id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.store.delete(&id).await? {
        tracing::info!(resume_id = %id, "Resume deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Resume {id} not found")))
    }
}
