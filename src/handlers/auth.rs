use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tower_cookies::{cookie::time::Duration, Cookie, Cookies};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    handlers::pages::visitor,
    middleware_layer::{
        auth::{secure_cookie, session_id, SESSION_COOKIE},
        csrf::{check_csrf, issue_csrf_token, CSRF_COOKIE},
    },
    models::department::Department,
    repositories::{department as department_repo, session_store},
    services::auth as auth_service,
    state::AppState,
    validation::auth::{LoginForm, RegisterForm},
    views::{
        forms,
        layout::{self, Nav},
    },
};

const REGISTERED_NOTICE: &str = "Registration successful. Please sign in.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub registered: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub csrf_token: String,
}

fn login_page(
    nav: Nav,
    csrf: Option<&str>,
    form: &LoginForm,
    error: Option<&str>,
    notice: Option<&str>,
) -> Response {
    layout::page("Sign in", nav, csrf, &forms::login(form, error, notice)).into_response()
}

/// Renders the login form.
pub async fn login_page_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<LoginQuery>,
) -> Response {
    let (nav, csrf) = visitor(&state, &cookies).await;
    let notice = query.registered.as_ref().map(|_| REGISTERED_NOTICE);
    login_page(nav, csrf.as_deref(), &LoginForm::default(), None, notice)
}

/// Handles the login form.
///
/// A backend sign-in that succeeds is kept even when the role check fails;
/// the visitor then stays on the form with the error.
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    let retry = LoginForm {
        password: String::new(),
        ..form.clone()
    };

    match login_inner(&state, &cookies, form).await {
        Ok(path) => Redirect::to(path).into_response(),
        Err(e) => {
            tracing::debug!("❌ Login failed: {}", e);
            let (nav, csrf) = visitor(&state, &cookies).await;
            let page = login_page(nav, csrf.as_deref(), &retry, Some(&e.user_message()), None);
            (e.status(), page).into_response()
        }
    }
}

async fn login_inner(state: &AppState, cookies: &Cookies, form: LoginForm) -> Result<&'static str> {
    let mut redis = state.redis.clone();

    // Always start from a fresh browser session id.
    let id = Uuid::new_v4();
    let portal = state.sessions.open(id).await;
    let signed_in = match auth_service::sign_in(state.backend.as_ref(), &portal, form).await {
        Ok(signed_in) => signed_in,
        Err(e) => {
            state.sessions.close(id).await;
            return Err(e);
        }
    };

    // The previous session survives a failed attempt.
    if let Some(previous) = session_id(cookies) {
        auth_service::retire(
            state.backend.as_ref(),
            &state.sessions,
            previous,
            signed_in.session.user.id,
        )
        .await;
        session_store::delete_session(&mut redis, previous).await?;
    }

    let days = state.config.session_duration_days;
    session_store::save_session(&mut redis, id, &signed_in.session, days).await?;
    cookies.add(secure_cookie(
        SESSION_COOKIE,
        id.to_string(),
        days,
        state.config.production,
    ));
    tracing::info!("✅ Session cookie added: session_id={}", id);
    issue_csrf_token(state, cookies).await?;

    let role = auth_service::confirm_role(&portal, &signed_in, state.config.guard_settle_timeout).await?;
    tracing::info!("✅ User logged in: {} as {}", signed_in.session.user.id, role);
    Ok(role.dashboard_path())
}

async fn departments_for_form(state: &AppState) -> Vec<Department> {
    match department_repo::list_departments(state.backend.as_ref(), None).await {
        Ok(departments) => departments,
        Err(e) => {
            tracing::warn!("❌ Could not load departments for registration: {}", e);
            Vec::new()
        }
    }
}

/// Renders the registration form.
pub async fn register_page(State(state): State<AppState>, cookies: Cookies) -> Response {
    let (nav, csrf) = visitor(&state, &cookies).await;
    let departments = departments_for_form(&state).await;
    let body = forms::register(
        &RegisterForm::default(),
        &departments,
        state.config.allowed_email_domain.as_deref(),
        None,
    );
    layout::page("Register", nav, csrf.as_deref(), &body).into_response()
}

/// Handles the registration form and sends the visitor on to sign in.
pub async fn register(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<RegisterForm>,
) -> Response {
    let retry = RegisterForm {
        password: String::new(),
        confirm_password: String::new(),
        ..form.clone()
    };
    let allowed_domain = state.config.allowed_email_domain.as_deref();

    match auth_service::register(state.backend.as_ref(), form, allowed_domain).await {
        Ok(user) => {
            tracing::info!("✅ User registered: {}", user.id);
            Redirect::to("/login?registered=1").into_response()
        }
        Err(e) => {
            tracing::debug!("❌ Registration failed: {}", e);
            let (nav, csrf) = visitor(&state, &cookies).await;
            let departments = departments_for_form(&state).await;
            let body = forms::register(&retry, &departments, allowed_domain, Some(&e.user_message()));
            (e.status(), layout::page("Register", nav, csrf.as_deref(), &body)).into_response()
        }
    }
}

fn expired(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Handles the navbar sign-out form.
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LogoutForm>,
) -> Result<Response> {
    check_csrf(&state, &cookies, &form.csrf_token).await?;
    let id = session_id(&cookies).ok_or(AppError::Unauthorized)?;
    let mut redis = state.redis.clone();

    auth_service::logout(state.backend.as_ref(), &state.sessions, id).await;
    session_store::delete_session(&mut redis, id).await?;
    tracing::info!("✅ Session deleted from Redis");

    session_store::delete_csrf(&mut redis, &form.csrf_token).await?;
    cookies.remove(expired(SESSION_COOKIE));
    cookies.remove(expired(CSRF_COOKIE));

    Ok(Redirect::to("/").into_response())
}
