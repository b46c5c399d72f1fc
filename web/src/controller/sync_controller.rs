use crate::controller::ApiResponse;
use crate::middleware::auth::{bearer_matches, unauthorized};
use crate::{AppState, Error};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::audit::request_handled;
use events::EventTrail;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::IntoParams;

pub(crate) const FATHOM_SYNC_PATH: &str = "/sync/fathom";

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SyncParams {
    /// Look back this many hours instead of resuming from the newest synced call.
    pub hours: Option<i64>,
}

/// GET|POST /sync/fathom
///
/// Pulls recent calls from the provider and runs each through the ingestion pipeline.
/// Requires `Authorization: Bearer <cron_secret>` when a cron secret is configured.
#[utoipa::path(
    post,
    path = "/sync/fathom",
    params(SyncParams),
    responses(
        (status = 200, description = "Per-call import summary"),
        (status = 401, description = "Missing or wrong cron bearer token"),
        (status = 500, description = "Provider not configured"),
        (status = 502, description = "Provider unreachable after retries"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn sync_fathom(
    State(app_state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<SyncParams>,
) -> Response {
    let mut trail = EventTrail::start();
    let expected = app_state.config.cron_secret();

    let (status, error_message, response) = if !bearer_matches(&headers, expected.as_deref()) {
        error!("Unauthorized sync request");
        (
            StatusCode::UNAUTHORIZED,
            Some("Unauthorized".to_string()),
            unauthorized(),
        )
    } else {
        let synced = match app_state.pipeline.provider_sync() {
            Ok(sync) => sync.sync(params.hours, &mut trail).await,
            Err(err) => Err(err),
        };
        match synced {
            Ok(summary) => (StatusCode::OK, None, Json(summary).into_response()),
            Err(err) => {
                let err = Error::from(err);
                let message = err.message();
                (err.status_code(), Some(message), err.into_response())
            }
        }
    };

    app_state
        .pipeline
        .publisher
        .publish(request_handled(
            FATHOM_SYNC_PATH,
            method.as_str(),
            json!({ "hours": params.hours }),
            status.as_u16(),
            error_message,
            &trail,
        ))
        .await;

    response
}

#[derive(Debug, Serialize)]
struct TeamList {
    teams: Vec<String>,
    count: usize,
}

/// GET /fathom/teams
#[utoipa::path(
    get,
    path = "/fathom/teams",
    responses(
        (status = 200, description = "Team names known to the provider"),
        (status = 500, description = "Provider not configured"),
        (status = 502, description = "Provider unreachable after retries"),
    )
)]
pub async fn list_teams(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let teams = app_state
        .pipeline
        .provider_sync()?
        .provider()
        .list_teams()
        .await?;
    debug!("Provider reported {} teams", teams.len());

    Ok(Json(ApiResponse::success(TeamList {
        count: teams.len(),
        teams,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{app_state, json_body};
    use crate::router::define_routes;
    use axum::body::Body;
    use axum::http::Request;
    use domain::pipeline::Providers;
    use domain::store::memory::MemoryStore;
    use service::config::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn request(uri: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn wrong_cron_secret_is_rejected_and_audited() {
        let store = Arc::new(MemoryStore::new());
        let config = Config::from_defaults().set_cron_secret("cron");
        let app = define_routes(app_state(config, &store, Providers::default()));

        let response = app
            .oneshot(request("/sync/fathom?hours=2", Some("Bearer other")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let logs = store.webhook_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].endpoint, FATHOM_SYNC_PATH);
        assert_eq!(logs[0].payload, json!({ "hours": 2 }));
    }

    #[tokio::test]
    async fn sync_without_provider_is_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let app = define_routes(app_state(
            Config::from_defaults(),
            &store,
            Providers::default(),
        ));

        let response = app.oneshot(request("/sync/fathom", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Fathom API key not configured");
        assert_eq!(store.webhook_logs()[0].status_code, 500);
    }

    #[tokio::test]
    async fn teams_without_provider_is_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let app = define_routes(app_state(
            Config::from_defaults(),
            &store,
            Providers::default(),
        ));

        let request = Request::builder()
            .uri("/fathom/teams")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
