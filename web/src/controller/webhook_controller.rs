//! Controller for inbound meeting-provider webhooks.
//!
//! Every request, including rejected ones, is audited as one webhook_logs row carrying the
//! event trail the pipeline produced while handling it.

use crate::{AppState, Error};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use domain::audit::request_handled;
use domain::webhook::{self, WebhookEvent};
use events::EventTrail;
use log::*;
use serde_json::{json, Value};
use std::collections::HashMap;

pub(crate) const FATHOM_WEBHOOK_PATH: &str = "/webhooks/fathom";

struct Reply {
    status: StatusCode,
    body: Value,
    /// Recorded in the audit row.
    error: Option<String>,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            error: None,
        }
    }

    fn failed(status: StatusCode, error: &str, message: Option<String>) -> Self {
        Self {
            status,
            body: json!({ "success": false, "error": error, "message": message }),
            error: Some(message.unwrap_or_else(|| error.to_string())),
        }
    }
}

/// POST /webhooks/fathom
///
/// Authenticated by the HMAC signature of the raw body, not by a session or token.
#[utoipa::path(
    post,
    path = "/webhooks/fathom",
    request_body(content = String, description = "Provider call event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or acknowledged as ignored"),
        (status = 400, description = "Malformed JSON or missing required fields"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 500, description = "Webhook secret not configured or processing failed"),
        (status = 502, description = "Reasoning engine or store unreachable"),
    )
)]
pub async fn fathom_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut trail = EventTrail::start();
    let reply = process(&app_state, &headers, &body, &mut trail).await;

    let audit_payload = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    app_state
        .pipeline
        .publisher
        .publish(request_handled(
            FATHOM_WEBHOOK_PATH,
            "POST",
            audit_payload,
            reply.status.as_u16(),
            reply.error,
            &trail,
        ))
        .await;

    (reply.status, Json(reply.body)).into_response()
}

async fn process(
    app_state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    trail: &mut EventTrail,
) -> Reply {
    if let Err(err) = webhook::verify_signature(&app_state.config, &header_map(headers), body) {
        let err = Error::from(err);
        return match err.status_code() {
            StatusCode::UNAUTHORIZED => {
                Reply::failed(StatusCode::UNAUTHORIZED, "Invalid signature", None)
            }
            status => Reply::failed(status, &err.message(), None),
        };
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("Webhook body is not valid JSON: {err}");
            return Reply::failed(
                StatusCode::BAD_REQUEST,
                "Invalid JSON payload",
                Some(err.to_string()),
            );
        }
    };

    let validated = match webhook::validate_payload(&payload) {
        Ok(validated) => validated,
        Err(rejection) => {
            warn!("Rejected webhook payload: {rejection:?}");
            let message = if rejection.missing_fields.is_empty() {
                rejection.error.clone()
            } else {
                format!("{}: {}", rejection.error, rejection.missing_fields.join(", "))
            };
            return Reply {
                status: StatusCode::BAD_REQUEST,
                body: json!({
                    "success": false,
                    "error": rejection.error,
                    "missing_fields": rejection.missing_fields,
                }),
                error: Some(message),
            };
        }
    };

    if validated.event != WebhookEvent::CallCompleted {
        info!(
            "Ignoring {} event for call {}",
            validated.event.as_str(),
            validated.call.external_call_id
        );
        return Reply::ok(json!({
            "success": true,
            "status": "ignored",
            "event": validated.event.as_str(),
        }));
    }

    match app_state.pipeline.orchestrator.ingest(validated.call, trail).await {
        Ok(report) => Reply::ok(json!({
            "success": true,
            "status": "processed",
            "result": report,
        })),
        Err(err) => {
            let err = Error::from(err);
            Reply::failed(
                err.status_code(),
                "Failed to process webhook",
                Some(err.message()),
            )
        }
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// GET /webhooks/fathom
#[utoipa::path(
    get,
    path = "/webhooks/fathom",
    responses((status = 200, description = "Webhook endpoint is reachable"))
)]
pub async fn fathom_webhook_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "endpoint": "fathom-webhook",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{app_state, json_body};
    use crate::router::define_routes;
    use axum::body::Body;
    use axum::http::Request;
    use domain::call_status::CallStatus;
    use domain::pipeline::Providers;
    use domain::store::memory::MemoryStore;
    use meeting_auth::webhook::HmacWebhookValidator;
    use secrecy::SecretString;
    use service::config::Config;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "whsec_test";

    fn config() -> Config {
        Config::from_defaults().set_fathom_webhook_secret(SECRET)
    }

    fn payload(event: &str) -> Value {
        json!({
            "event": event,
            "call_id": "abc-1",
            "meeting": {
                "title": "Discovery call",
                "start_time": "2025-03-01T10:00:00Z",
                "duration": 1800,
                "transcript": "",
                "recording_url": "https://fathom.video/share/abc-1",
                "participants": [
                    { "name": "Jane", "email": "jane@co.com" },
                    { "name": "Lead", "email": "lead@y.com" }
                ]
            }
        })
    }

    fn signed_request(config: &Config, body: &str) -> Request<Body> {
        let validator = HmacWebhookValidator::new(
            webhook::FATHOM_PROVIDER_ID,
            SecretString::new(SECRET.to_string()),
            config.fathom_signature_header(),
        );
        Request::builder()
            .method("POST")
            .uri(FATHOM_WEBHOOK_PATH)
            .header("content-type", "application/json")
            .header(
                config.fathom_signature_header(),
                validator.sign(body.as_bytes()).unwrap(),
            )
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn completed_call_is_ingested_and_audited() {
        let store = Arc::new(MemoryStore::new());
        store.add_rep("Jane", "jane@co.com", &[]);
        let config = config();
        let app = define_routes(app_state(config.clone(), &store, Providers::default()));

        let response = app
            .oneshot(signed_request(&config, &payload("call_completed").to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["outcome"], "deferred");

        let call = store.call_by_external_id("abc-1").unwrap();
        assert_eq!(call.status, CallStatus::Pending);

        let logs = store.webhook_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status_code, 200);
        assert_eq!(logs[0].endpoint, FATHOM_WEBHOOK_PATH);
        assert_eq!(logs[0].events[0]["event"], "call_received");
    }

    #[tokio::test]
    async fn started_event_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let config = config();
        let app = define_routes(app_state(config.clone(), &store, Providers::default()));

        let response = app
            .oneshot(signed_request(&config, &payload("call_started").to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ignored");
        assert!(store.calls().is_empty());
        assert_eq!(store.webhook_logs().len(), 1);
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected_and_audited() {
        let store = Arc::new(MemoryStore::new());
        let config = config();
        let app = define_routes(app_state(config.clone(), &store, Providers::default()));

        let request = Request::builder()
            .method("POST")
            .uri(FATHOM_WEBHOOK_PATH)
            .header(config.fathom_signature_header(), "deadbeef")
            .body(Body::from(payload("call_completed").to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let logs = store.webhook_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status_code, 401);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_secret_is_a_server_error() {
        let store = Arc::new(MemoryStore::new());
        let app = define_routes(app_state(
            Config::from_defaults(),
            &store,
            Providers::default(),
        ));

        let request = Request::builder()
            .method("POST")
            .uri(FATHOM_WEBHOOK_PATH)
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await["error"],
            "Webhook secret not configured"
        );
    }

    #[tokio::test]
    async fn invalid_json_and_missing_fields_are_bad_requests() {
        let store = Arc::new(MemoryStore::new());
        let config = config();

        let response = define_routes(app_state(config.clone(), &store, Providers::default()))
            .oneshot(signed_request(&config, "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid JSON payload");

        let mut body = payload("call_completed");
        body["meeting"]["participants"] = json!([]);
        let response = define_routes(app_state(config.clone(), &store, Providers::default()))
            .oneshot(signed_request(&config, &body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["missing_fields"],
            json!(["meeting.participants (empty array)"])
        );

        assert_eq!(store.webhook_logs().len(), 2);
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let store = Arc::new(MemoryStore::new());
        let app = define_routes(app_state(config(), &store, Providers::default()));

        let request = Request::builder()
            .uri(FATHOM_WEBHOOK_PATH)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["endpoint"], "fathom-webhook");
    }
}
