use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::category::{is_hex_color, Category, DEFAULT_CATEGORY_COLOR};
use crate::state::AppState;
use crate::store::CategoryUpdate;

#[derive(Debug, Default, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Option<String>,
}

#[derive(Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub owner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(
            "Category name must not be blank".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn validate_color(color: &str) -> Result<String, AppError> {
    if !is_hex_color(color) {
        return Err(AppError::Validation(format!(
            "Category color must look like #RRGGBB, got '{color}'"
        )));
    }
    Ok(color.to_string())
}

impl TryFrom<UpdateCategoryRequest> for CategoryUpdate {
    type Error = AppError;

    fn try_from(req: UpdateCategoryRequest) -> Result<Self, Self::Error> {
        if req.name.is_none() && req.color.is_none() {
            return Err(AppError::Validation(
                "At least one field must be provided".to_string(),
            ));
        }
        Ok(CategoryUpdate {
            name: req.name.as_deref().map(validate_name).transpose()?,
            color: req.color.as_deref().map(validate_color).transpose()?,
        })
    }
}

/// GET /api/v1/categories
pub async fn handle_list_categories(
    State(state): State<AppState>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<CategoryListResponse>, AppError> {
    let categories = state
        .categories
        .list_categories(params.owner_id.as_deref())
        .await?;
    Ok(Json(CategoryListResponse { categories }))
}

/// POST /api/v1/categories
pub async fn handle_create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4().to_string(),
        owner_id: req.owner_id,
        name: validate_name(&req.name)?,
        color: match req.color.as_deref() {
            Some(color) => validate_color(color)?,
            None => DEFAULT_CATEGORY_COLOR.to_string(),
        },
        created_at: now,
        updated_at: now,
    };
    state.categories.create_category(&category).await?;
    tracing::info!(category_id = %category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PATCH /api/v1/categories/:id
pub async fn handle_update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let update = CategoryUpdate::try_from(req)?;
    state
        .categories
        .update_category(&id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Category {id} not found")))
}

/// DELETE /api/v1/categories/:id
pub async fn handle_delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.categories.delete_category(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Category {id} not found")))
    }
}
