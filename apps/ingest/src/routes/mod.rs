pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::categories::handlers as category_handlers;
use crate::ingest::handlers as ingest_handlers;
use crate::resumes::handlers as resume_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Storage notifications
        .route(
            "/api/v1/events/object-finalized",
            post(ingest_handlers::handle_object_finalized),
        )
        // Resume records
        .route(
            "/api/v1/resumes",
            get(resume_handlers::handle_list_resumes).post(resume_handlers::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resume_handlers::handle_get_resume)
                .patch(resume_handlers::handle_update_resume)
                .delete(resume_handlers::handle_delete_resume),
        )
        // Categories
        .route(
            "/api/v1/categories",
            get(category_handlers::handle_list_categories)
                .post(category_handlers::handle_create_category),
        )
        .route(
            "/api/v1/categories/:id",
            patch(category_handlers::handle_update_category)
                .delete(category_handlers::handle_delete_category),
        )
        .with_state(state)
}
