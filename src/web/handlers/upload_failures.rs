//! Unresolved-failure view plus the retry and manual-resolution triggers

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{ManualResolutionRequest, UploadFailureRecord, VideoRecord};
use crate::web::{
    extractors::{parse_uuid_param, FailureListParams},
    responses::handle_result,
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ResolvedFailure {
    pub failure: UploadFailureRecord,
    pub video: VideoRecord,
}

pub async fn list_upload_failures(
    State(state): State<AppState>,
    Query(params): Query<FailureListParams>,
) -> Response {
    let result = state
        .database
        .list_upload_failures(params.include_resolved)
        .await
        .map_err(AppError::from);
    handle_result(result)
}

pub async fn get_upload_failure(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = async {
        let id = parse_uuid_param(&id)?;
        state
            .database
            .get_upload_failure(id)
            .await?
            .ok_or_else(|| AppError::not_found("upload failure", id.to_string()))
    }
    .await;
    handle_result(result)
}

pub async fn retry_upload_failure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let result = async {
        let id = parse_uuid_param(&id)?;
        state.pipeline.retry.retry(id).await
    }
    .await;
    handle_result(result)
}

pub async fn resolve_upload_failure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ManualResolutionRequest>,
) -> Response {
    let result = async {
        let id = parse_uuid_param(&id)?;
        let (failure, video) = state.pipeline.manual.resolve(id, &request.code).await?;
        Ok::<_, AppError>(ResolvedFailure { failure, video })
    }
    .await;
    handle_result(result)
}
