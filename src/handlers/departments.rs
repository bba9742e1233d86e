use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::Viewer,
    models::department::DepartmentDraft,
    services::departments::{Confirmation, DeleteOutcome, DepartmentBoard},
    state::AppState,
};

/// `?confirm=true` on delete requests.
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
}

async fn loaded_board(state: &AppState, viewer: &Viewer) -> Result<DepartmentBoard> {
    let mut board = DepartmentBoard::new(state.backend.clone(), viewer.access_token.clone());
    board.load().await?;
    Ok(board)
}

/// Lists departments with their admins, newest first.
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let board = loaded_board(&state, &viewer).await?;
    Ok(Json(board.filtered(&query.search)).into_response())
}

pub async fn create_department(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Json(draft): Json<DepartmentDraft>,
) -> Result<Response> {
    tracing::info!("📁 Create department '{}' by {}", draft.name.trim(), viewer.user.id);
    let mut board = loaded_board(&state, &viewer).await?;
    board.create(draft).await?;
    Ok((StatusCode::CREATED, Json(board.rows())).into_response())
}

pub async fn update_department(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    Json(draft): Json<DepartmentDraft>,
) -> Result<Response> {
    let mut board = loaded_board(&state, &viewer).await?;
    board.begin_edit(id)?;
    board.edit_name(&draft.name);
    board.edit_admin(draft.admin_id);
    board.save_edit().await?;
    Ok(Json(board.rows()).into_response())
}

/// Deletes a department. Without `?confirm=true` nothing is written.
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<i64>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Response> {
    let mut board = DepartmentBoard::new(state.backend.clone(), viewer.access_token.clone());
    match board.delete(id, Confirmation::from_flag(query.confirm)).await? {
        DeleteOutcome::Declined => Err(AppError::ConfirmationRequired),
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
