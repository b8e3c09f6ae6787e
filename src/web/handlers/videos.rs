//! Video record operator endpoints

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::models::{VideoRecord, VideoUpdateRequest};
use crate::web::{
    extractors::{parse_uuid_param, PaginationParams},
    responses::{handle_result, PaginatedResponse},
    AppState,
};

pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Response {
    handle_result(list(&state, params).await)
}

async fn list(state: &AppState, params: PaginationParams) -> AppResult<PaginatedResponse<VideoRecord>> {
    params.validate()?;
    let items = state
        .database
        .list_videos(params.limit, params.offset())
        .await?;
    let total = state.database.count_videos().await?;
    Ok(PaginatedResponse::new(
        items,
        total.max(0) as u64,
        params.page,
        params.limit,
    ))
}

pub async fn get_video(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = async {
        let id = parse_uuid_param(&id)?;
        state
            .database
            .get_video(id)
            .await?
            .ok_or_else(|| AppError::not_found("video", id.to_string()))
    }
    .await;
    handle_result(result)
}

/// Title, description and lifecycle status only
pub async fn update_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<VideoUpdateRequest>,
) -> Response {
    let result = async {
        let id = parse_uuid_param(&id)?;
        if request
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Err(AppError::validation("title must not be empty"));
        }
        let video = state
            .database
            .update_video(id, &request)
            .await?
            .ok_or_else(|| AppError::not_found("video", id.to_string()))?;
        info!("Video {} updated by operator", video.id);
        Ok(video)
    }
    .await;
    handle_result(result)
}
