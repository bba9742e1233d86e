use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::{
    error::Result,
    middleware_layer::auth::Viewer,
    models::role::Role,
    repositories::{admin as admin_repo, department as department_repo, profile as profile_repo},
    services::{admins::AdminBoard, departments::DepartmentBoard},
    state::AppState,
    views::{
        dashboards::{self, SuperadminView},
        layout::{self, Nav},
    },
};

fn render(viewer: &Viewer, title: &str, body: &str) -> Response {
    tracing::debug!("📊 {} for session {}", title, viewer.session_id);
    layout::page(
        title,
        Nav::SignedIn(viewer.role),
        Some(&viewer.csrf_token),
        body,
    )
    .into_response()
}

async fn department_label(state: &AppState, token: &str, department_id: Option<i64>) -> Result<Option<String>> {
    match department_id {
        Some(id) => profile_repo::department_name(state.backend.as_ref(), Some(token), id).await,
        None => Ok(None),
    }
}

/// Landing dashboard for any resolved role.
pub async fn overview(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response> {
    let token = viewer.access_token.as_str();
    let (admin, headed) = match viewer.user.email.as_deref() {
        Some(email) if viewer.role == Role::Admin => {
            let admin = admin_repo::find_by_email(state.backend.as_ref(), Some(token), email).await?;
            let headed = match &admin {
                Some(admin) => department_repo::list_for_admin(state.backend.as_ref(), Some(token), admin.id)
                    .await?
                    .into_iter()
                    .map(|d| d.name)
                    .collect(),
                None => Vec::new(),
            };
            (admin, headed)
        }
        _ => (None, Vec::new()),
    };

    let body = dashboards::overview(&viewer.user, viewer.role, admin.as_ref(), &headed);
    Ok(render(&viewer, "Dashboard", &body))
}

pub async fn student(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response> {
    let token = viewer.access_token.as_str();
    let profile = profile_repo::find_student(state.backend.as_ref(), Some(token), viewer.user.id).await?;
    let department = department_label(&state, token, profile.as_ref().and_then(|p| p.department_id)).await?;

    let body = dashboards::student(&viewer.user, profile.as_ref(), department.as_deref());
    Ok(render(&viewer, "Student Dashboard", &body))
}

pub async fn faculty(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response> {
    let token = viewer.access_token.as_str();
    let profile = profile_repo::find_teacher(state.backend.as_ref(), Some(token), viewer.user.id).await?;
    let department = department_label(&state, token, profile.as_ref().and_then(|p| p.department_id)).await?;

    let body = dashboards::faculty(&viewer.user, profile.as_ref(), department.as_deref());
    Ok(render(&viewer, "Faculty Dashboard", &body))
}

#[derive(Debug, Default, Deserialize)]
pub struct SuperadminQuery {
    #[serde(default)]
    pub search: String,
    pub edit: Option<i64>,
    pub edit_admin: Option<i64>,
}

/// Department and head-of-department management.
pub async fn superadmin(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<SuperadminQuery>,
) -> Result<Response> {
    let token = viewer.access_token.clone();
    let profile = match viewer.user.email.as_deref() {
        Some(email) => profile_repo::find_superadmin(state.backend.as_ref(), Some(&token), email).await?,
        None => None,
    };

    let mut departments = DepartmentBoard::new(state.backend.clone(), token.clone());
    let mut admins = AdminBoard::new(state.backend.clone(), token);
    let mut error = None;

    let loaded = futures::try_join!(departments.load(), admins.load());
    if let Err(e) = loaded {
        tracing::error!("❌ Failed to load management data: {}", e);
        error = Some("Failed to load initial data. Please try refreshing the page.".to_string());
    }

    if let Some(id) = query.edit {
        if departments.begin_edit(id).is_err() {
            error.get_or_insert_with(|| "Department not found".to_string());
        }
    }

    let editing_admin = query.edit_admin.filter(|id| {
        let known = admins.admins().iter().any(|a| a.id == *id);
        if !known {
            error.get_or_insert_with(|| "Admin not found".to_string());
        }
        known
    });

    let rows = departments.filtered(&query.search);
    let matching_admins = admins.filtered(&query.search);
    let body = dashboards::superadmin(&SuperadminView {
        user: &viewer.user,
        profile: profile.as_ref(),
        search: &query.search,
        departments: &rows,
        editing: departments.editing(),
        editing_admin,
        admins: departments.admins(),
        matching_admins: &matching_admins,
        error: error.as_deref(),
    });
    Ok(render(&viewer, "Superadmin Dashboard", &body))
}
