use axum::{
    Router,
    routing::{get, post, put},
    middleware::from_fn_with_state,
    extract::DefaultBodyLimit,
};

use http::{HeaderName, HeaderValue, Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    services::ServeDir,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
    cors::CorsLayer,
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod state;

mod backend {
    pub mod client;
    pub mod events;
    pub mod query;
    #[cfg(test)]
    pub mod memory;
}

mod crypto {
    pub mod csrf;
}

mod models {
    pub mod department;
    pub mod profile;
    pub mod role;
    pub mod session;
    pub mod user;
}

mod repositories {
    pub mod admin;
    pub mod department;
    pub mod profile;
    pub mod session_store;
}

mod services {
    pub mod admins;
    pub mod auth;
    pub mod departments;
    pub mod guard;
    pub mod resolver;
    pub mod sessions;
}

mod handlers {
    pub mod admins;
    pub mod auth;
    pub mod dashboards;
    pub mod departments;
    pub mod pages;
    pub mod session;
}

mod middleware_layer {
    pub mod auth;
    pub mod csrf;
    pub mod rate_limit;
}

mod validation {
    pub mod auth;
}

mod views {
    pub mod catalog;
    pub mod dashboards;
    pub mod forms;
    pub mod layout;
}

use config::Config;
use middleware_layer::auth::GuardState;
use models::role::Role;
use state::AppState;

/// How often lapsed browser sessions are dropped from memory.
const PRUNE_INTERVAL_SECS: u64 = 600;

/// A page router that only admits `required` (any resolved role when `None`).
fn guarded_page(state: &AppState, path: &str, handler: axum::routing::MethodRouter<AppState>, required: Option<Role>) -> Router {
    Router::new()
        .route(path, handler)
        .route_layer(from_fn_with_state(
            GuardState::page(state.clone(), required),
            middleware_layer::auth::require_role,
        ))
        .with_state(state.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let csrf_header = HeaderName::from_static("x-csrf-token");
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("❌ Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::COOKIE,
            csrf_header.clone(),
        ])
        .allow_credentials(true)
        .expose_headers([csrf_header])
        .max_age(Duration::from_secs(86400));

    let api_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(50)
            .burst_size(200)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let public_routes = Router::new()
        .route("/", get(handlers::pages::home))
        .route("/courses", get(handlers::pages::courses))
        .route("/practice", get(handlers::pages::practice))
        .route("/community", get(handlers::pages::community))
        .route("/logout", post(handlers::auth::logout))
        .route("/api/session", get(handlers::session::current_session))
        .with_state(state.clone());

    let register_routes = Router::new()
        .route(
            "/register",
            get(handlers::auth::register_page).post(handlers::auth::register),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_register,
        ))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route(
            "/login",
            get(handlers::auth::login_page_handler).post(handlers::auth::login),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let dashboard_routes = Router::new()
        .merge(guarded_page(&state, "/dashboard", get(handlers::dashboards::overview), None))
        .merge(guarded_page(
            &state,
            "/studentdashboard",
            get(handlers::dashboards::student),
            Some(Role::Student),
        ))
        .merge(guarded_page(
            &state,
            "/facultydashboard",
            get(handlers::dashboards::faculty),
            Some(Role::Faculty),
        ))
        .merge(guarded_page(
            &state,
            "/superadmindashboard",
            get(handlers::dashboards::superadmin),
            Some(Role::Superadmin),
        ));

    let management_routes = Router::new()
        .route(
            "/api/departments",
            get(handlers::departments::list_departments)
                .post(handlers::departments::create_department),
        )
        .route(
            "/api/departments/{id}",
            put(handlers::departments::update_department)
                .delete(handlers::departments::delete_department),
        )
        .route(
            "/api/admins",
            get(handlers::admins::list_admins).post(handlers::admins::create_admin),
        )
        .route(
            "/api/admins/{id}",
            put(handlers::admins::update_admin).delete(handlers::admins::delete_admin),
        )
        .layer(tower_governor::GovernorLayer::new(api_governor_conf.clone()))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::csrf::verify_csrf,
        ))
        .route_layer(from_fn_with_state(
            GuardState::api(state.clone(), Some(Role::Superadmin)),
            middleware_layer::auth::require_role,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(register_routes)
        .merge(login_routes)
        .merge(dashboard_routes)
        .merge(management_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .fallback_service(ServeDir::new("public"));

    let prune_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(PRUNE_INTERVAL_SECS)).await;
            let pruned = prune_state.sessions.prune_expired(chrono::Utc::now()).await;
            if pruned > 0 {
                tracing::info!("🧹 Dropped {} lapsed browser sessions", pruned);
            }
        }
    });

    let addr = config.bind_addr;
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
