use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthGate, Role};
use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{require_roles, RoleRequirement};
use crate::progress::{CatalogStore, ProgressStore};

/// Behaviour switches the router reads per request
#[derive(Clone, Debug)]
pub struct AppSettings {
    pub clamp_display_percentages: bool,
    pub audit_logging: bool,
    pub request_logging: bool,
    pub max_request_size_bytes: usize,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            clamp_display_percentages: config.progress.clamp_display_percentages,
            audit_logging: config.security.enable_audit_logging,
            request_logging: config.api.enable_request_logging,
            max_request_size_bytes: config.api.max_request_size_bytes,
            enable_cors: config.security.enable_cors,
            cors_origins: config.security.cors_origins.clone(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            clamp_display_percentages: false,
            audit_logging: false,
            request_logging: false,
            max_request_size_bytes: 1024 * 1024,
            enable_cors: false,
            cors_origins: Vec::new(),
        }
    }
}

/// Shared handler state. Every dependency is passed in; nothing is read from ambient session state.
#[derive(Clone)]
pub struct AppState {
    pub gate: AuthGate,
    pub progress: Arc<dyn ProgressStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub settings: AppSettings,
}

pub fn app(state: AppState) -> Router {
    let audit = state.settings.audit_logging;
    let authenticated = RoleRequirement::authenticated(state.gate.clone(), audit);
    let admin_only = RoleRequirement::roles(state.gate.clone(), &[Role::Admin], audit);

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(handlers::health::health))
        // Any authenticated caller
        .merge(session_routes(authenticated.clone()))
        .merge(progress_routes(authenticated))
        // Admin only
        .merge(catalog_routes(admin_only))
        // Role-dispatched inside the handler
        .merge(learner_routes())
        .layer(DefaultBodyLimit::max(state.settings.max_request_size_bytes))
        .with_state(state.clone());

    if state.settings.request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if let Some(cors) = cors_layer(&state.settings) {
        router = router.layer(cors);
    }
    router
}

fn session_routes(requirement: RoleRequirement) -> Router<AppState> {
    use handlers::session;

    Router::new()
        .route("/api/auth/whoami", get(session::whoami_get))
        .route_layer(from_fn_with_state(requirement, require_roles))
}

fn progress_routes(requirement: RoleRequirement) -> Router<AppState> {
    use handlers::progress;

    Router::new()
        .route("/api/progress", get(progress::progress_get))
        .route("/api/progress/stats", get(progress::stats_get))
        .route("/api/progress/modules/:id", post(progress::module_complete))
        .route("/api/progress/quizzes/:id", post(progress::quiz_submit))
        .route("/api/progress/simulations/:id", post(progress::simulation_complete))
        .route_layer(from_fn_with_state(requirement, require_roles))
}

fn catalog_routes(requirement: RoleRequirement) -> Router<AppState> {
    use handlers::catalog;

    Router::new()
        .route("/api/catalog/totals", get(catalog::totals_get))
        .route_layer(from_fn_with_state(requirement, require_roles))
}

fn learner_routes() -> Router<AppState> {
    use handlers::learners;

    Router::new().route("/api/learners/:id/progress", get(learners::learner_progress_get))
}

fn cors_layer(settings: &AppSettings) -> Option<CorsLayer> {
    if !settings.enable_cors {
        return None;
    }

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "LearnHub API",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "whoami": "/api/auth/whoami (authenticated)",
                "progress": "/api/progress, /api/progress/stats (authenticated)",
                "completions": "/api/progress/{modules,quizzes,simulations}/:id (authenticated)",
                "learners": "/api/learners/:id/progress (admin, instructor)",
                "catalog": "/api/catalog/totals (admin)",
            }
        }
    }))
}
