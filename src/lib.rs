pub mod config;
pub mod errors;
pub mod filter;
pub mod library;
pub mod models;
pub mod partition;
pub mod sheets;
pub mod state;

use crate::errors::AppError;
use crate::filter::FilterParams;
use crate::library::LibraryCore;
use crate::models::{
    AdRecord, AdsQuery, BooleanResponse, CreateGroupPayload, DeleteGroupPayload, GroupInfo,
    MoveAdPayload, RenameGroupPayload, ViewQuery, ViewResponse,
};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<LibraryCore>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Sheets(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn get_ads(State(state): State<AppState>, Query(query): Query<AdsQuery>) -> Json<Vec<AdRecord>> {
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    Json(state.library.list_ads(offset, limit).await)
}

async fn get_view(State(state): State<AppState>, Query(query): Query<ViewQuery>) -> Json<ViewResponse> {
    Json(state.library.view(FilterParams::from(query)).await)
}

async fn create_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupPayload>,
) -> Result<Json<GroupInfo>, AppError> {
    state.library.create_group(payload).await.map(Json)
}

async fn rename_group(
    State(state): State<AppState>,
    Json(payload): Json<RenameGroupPayload>,
) -> Result<Json<GroupInfo>, AppError> {
    state
        .library
        .rename_group(&payload.group, &payload.new_name)
        .await
        .map(Json)
}

async fn delete_group(
    State(state): State<AppState>,
    Json(payload): Json<DeleteGroupPayload>,
) -> Result<Json<BooleanResponse>, AppError> {
    state.library.delete_group(&payload.group).await?;
    Ok(Json(BooleanResponse { success: true }))
}

async fn move_ad(
    State(state): State<AppState>,
    Json(payload): Json<MoveAdPayload>,
) -> Result<Json<BooleanResponse>, AppError> {
    state.library.move_ad(payload).await?;
    Ok(Json(BooleanResponse { success: true }))
}

async fn save_groups(State(state): State<AppState>) -> Result<Json<BooleanResponse>, AppError> {
    state.library.save().await?;
    Ok(Json(BooleanResponse { success: true }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ads", get(get_ads))
        .route("/api/view", get(get_view))
        .route("/api/groups", post(create_group))
        .route("/api/groups/rename", post(rename_group))
        .route("/api/groups/delete", post(delete_group))
        .route("/api/move", post(move_ad))
        .route("/api/save-groups", post(save_groups))
        .with_state(state)
}
