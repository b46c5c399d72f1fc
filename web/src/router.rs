use crate::{controller::health_check_controller, middleware::auth::require_admin_token, AppState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::controller::{call_controller, sync_controller, webhook_controller};

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Sales Call Platform API"
        ),
        paths(
            health_check_controller::health_check,
            webhook_controller::fathom_webhook,
            webhook_controller::fathom_webhook_health,
            sync_controller::sync_fathom,
            sync_controller::list_teams,
            call_controller::reconcile_stuck,
            call_controller::force_reset_all,
            call_controller::complete_reset,
            call_controller::dedupe_analyses,
            call_controller::analyze_pending,
            call_controller::analyze,
            call_controller::diagnostics,
        ),
        components(
            schemas(
                domain::analyses::Model,
                domain::calls::Model,
                domain::sales_reps::Model,
                domain::unmatched_calls::Model,
                domain::webhook_logs::Model,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "sales_call_platform", description = "Sales call ingestion, scoring and maintenance API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Bearer token used by the cron sync trigger and the administrative call routes.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "CRON_SECRET for /sync routes, ADMIN_API_TOKEN for /calls routes",
                        ))
                        .build(),
                ),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(webhook_routes(app_state.clone()))
        .merge(sync_routes(app_state.clone()))
        .merge(call_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

/// Provider webhooks (no bearer token - validated by the HMAC signature)
fn webhook_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            webhook_controller::FATHOM_WEBHOOK_PATH,
            post(webhook_controller::fathom_webhook).get(webhook_controller::fathom_webhook_health),
        )
        .with_state(app_state)
}

/// Scheduled and on-demand provider sync; the cron secret is checked in the handler so
/// rejected attempts are still audited.
fn sync_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            sync_controller::FATHOM_SYNC_PATH,
            get(sync_controller::sync_fathom).post(sync_controller::sync_fathom),
        )
        .route("/fathom/teams", get(sync_controller::list_teams))
        .with_state(app_state)
}

fn call_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/calls/reconcile-stuck",
            post(call_controller::reconcile_stuck),
        )
        .route(
            "/calls/force-reset-all",
            post(call_controller::force_reset_all),
        )
        .route("/calls/complete-reset", post(call_controller::complete_reset))
        .route(
            "/calls/dedupe-analyses",
            post(call_controller::dedupe_analyses),
        )
        .route(
            "/calls/analyze-pending",
            post(call_controller::analyze_pending),
        )
        .route("/calls/{id}/analyze", post(call_controller::analyze))
        .route("/calls/diagnostics", get(call_controller::diagnostics))
        .route_layer(from_fn_with_state(app_state.clone(), require_admin_token))
        .with_state(app_state)
}
