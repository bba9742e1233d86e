use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::{AppError, Result},
    handlers::departments::{ConfirmQuery, SearchQuery},
    middleware_layer::auth::Viewer,
    models::department::AdminEdit,
    services::{
        admins::{self as admin_service, AdminBoard, NewAdmin},
        departments::{Confirmation, DeleteOutcome},
    },
    state::AppState,
};

async fn loaded_board(state: &AppState, viewer: &Viewer) -> Result<AdminBoard> {
    let mut board = AdminBoard::new(state.backend.clone(), viewer.access_token.clone());
    board.load().await?;
    Ok(board)
}

/// Lists heads of department, optionally filtered by `?search=`.
pub async fn list_admins(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let board = loaded_board(&state, &viewer).await?;
    Ok(Json(board.filtered(&query.search)).into_response())
}

pub async fn create_admin(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(form): Json<NewAdmin>,
) -> Result<Response> {
    let admin = admin_service::create_admin(state.backend.as_ref(), &viewer.access_token, form).await?;
    Ok((StatusCode::CREATED, Json(admin)).into_response())
}

pub async fn update_admin(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    Json(edit): Json<AdminEdit>,
) -> Result<Response> {
    let mut board = loaded_board(&state, &viewer).await?;
    board.update(id, edit).await?;
    Ok(Json(board.admins()).into_response())
}

pub async fn delete_admin(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Response> {
    let mut board = AdminBoard::new(state.backend.clone(), viewer.access_token.clone());
    match board.delete(id, Confirmation::from_flag(query.confirm)).await? {
        DeleteOutcome::Declined => Err(AppError::ConfirmationRequired),
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
