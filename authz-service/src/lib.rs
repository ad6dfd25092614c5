pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{
    http::HeaderValue,
    middleware::from_fn,
    routing::{delete, get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthzConfig;
use crate::services::Database;

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub db: Database,
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let cors_origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    let app = Router::new()
        .route("/health", get(health_check))
        // Branch hierarchy
        .route(
            "/branches",
            get(handlers::branch::list_branches).post(handlers::branch::create_branch),
        )
        .route("/branches/tree", get(handlers::branch::get_branch_tree))
        .route(
            "/branches/:branch_id",
            get(handlers::branch::get_branch)
                .patch(handlers::branch::update_branch)
                .delete(handlers::branch::delete_branch),
        )
        .route(
            "/branches/:branch_id/move",
            post(handlers::branch::move_branch),
        )
        .route(
            "/branches/:branch_id/descendants",
            get(handlers::branch::get_branch_descendants),
        )
        .route(
            "/branches/:branch_id/ancestors",
            get(handlers::branch::get_branch_ancestors),
        )
        // Member registry
        .route(
            "/members",
            get(handlers::member::list_members).post(handlers::member::create_member),
        )
        .route(
            "/members/:member_id",
            get(handlers::member::get_member).patch(handlers::member::update_member),
        )
        .route(
            "/members/:member_id/grants",
            get(handlers::grant::list_member_grants),
        )
        .route(
            "/members/:member_id/grants/active",
            get(handlers::grant::list_member_active_grants),
        )
        // Permission catalog
        .route(
            "/permissions",
            get(handlers::permission::list_permissions).post(handlers::permission::create_permission),
        )
        .route(
            "/permissions/:permission_id",
            get(handlers::permission::get_permission),
        )
        .route(
            "/permissions/by-name/:permission_name",
            get(handlers::permission::get_permission_by_name),
        )
        // Role catalog
        .route(
            "/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/roles/:role_id",
            get(handlers::role::get_role).delete(handlers::role::delete_role),
        )
        .route(
            "/roles/:role_id/permissions",
            get(handlers::role::get_role_permissions).post(handlers::role::attach_permission),
        )
        .route(
            "/roles/:role_id/permissions/:permission_id",
            delete(handlers::role::detach_permission),
        )
        // Grants
        .route("/grants", post(handlers::grant::create_grant))
        .route("/grants/:grant_id", get(handlers::grant::get_grant))
        .route(
            "/grants/:grant_id/revoke",
            post(handlers::grant::revoke_grant),
        )
        // Warrant workflow
        .route(
            "/rosters",
            get(handlers::warrant::list_rosters).post(handlers::warrant::create_roster),
        )
        .route("/rosters/:roster_id", get(handlers::warrant::get_roster))
        .route(
            "/rosters/:roster_id/approvals",
            get(handlers::warrant::list_roster_approvals),
        )
        .route(
            "/rosters/:roster_id/approve",
            post(handlers::warrant::approve_roster),
        )
        .route(
            "/rosters/:roster_id/decline",
            post(handlers::warrant::decline_roster),
        )
        .route("/warrants/:warrant_id", get(handlers::warrant::get_warrant))
        .route(
            "/warrants/:warrant_id/revoke",
            post(handlers::warrant::revoke_warrant),
        )
        // Authorization evaluation
        .route("/authz/evaluate", post(handlers::authz::evaluate))
        .route(
            "/authz/batch-evaluate",
            post(handlers::authz::batch_evaluate),
        )
        .with_state(state)
        // Tracing layer with request-id span propagation
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::new().allow_origin(cors_origins));

    Ok(app)
}

/// Service health, including a database ping.
///
/// GET /health
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}
