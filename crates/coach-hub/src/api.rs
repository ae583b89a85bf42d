use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Form, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use coach_core::{FocusController, HubMessage};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::{quotes::QuoteStore, record_store::RecordStore, ws};

const DEFAULT_HISTORY_DAYS: u32 = 7;
const MAX_FOCUS_SECS: i64 = 24 * 60 * 60;

pub struct AppState {
    pub controller: FocusController,
    pub quotes: QuoteStore,
    pub store: Option<Arc<RecordStore>>,
    pub default_duration: Duration,
    pub write_timeout: Duration,
    pub queue_capacity: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/focusing", get(get_focusing).post(post_focusing))
        .route("/history", get(history))
        .route("/connect", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "Healthy"
}

async fn get_focusing(State(state): State<Arc<AppState>>) -> Json<HubMessage> {
    Json(state.controller.snapshot().await.to_message())
}

#[derive(Debug, Default, Deserialize)]
pub struct FocusForm {
    #[serde(default)]
    focusing: String,
    #[serde(default)]
    duration: String,
}

async fn post_focusing(State(state): State<Arc<AppState>>, Form(form): Form<FocusForm>) -> Response {
    if form.focusing.trim() != "true" {
        let snapshot = state.controller.stop_focus().await;
        info!(event = "focus_stop_requested");
        return Json(snapshot.to_message()).into_response();
    }

    let duration = match parse_duration(&form.duration, state.default_duration) {
        Ok(value) => value,
        Err(message) => {
            warn!(event = "focus_request_invalid", duration = %form.duration, error = message);
            return (StatusCode::BAD_REQUEST, message).into_response();
        }
    };
    match state.controller.start_focus(duration).await {
        Ok(snapshot) => Json(snapshot.to_message()).into_response(),
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

fn parse_duration(raw: &str, default: Duration) -> Result<Duration, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    let secs: i64 = raw.parse().map_err(|_| "Failed to parse duration")?;
    if secs <= 0 {
        return Err("duration must be positive");
    }
    if secs > MAX_FOCUS_SECS {
        return Err("duration must be at most 24 hours");
    }
    Ok(Duration::from_secs(secs as u64))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    days: Option<u32>,
}

async fn history(State(state): State<Arc<AppState>>, Query(query): Query<HistoryQuery>) -> Response {
    let Some(store) = state.store.as_ref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "record store not configured").into_response();
    };
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    match store.focus_history(days).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            warn!(event = "history_error", error = %err);
            (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use coach_core::{FocusingPayload, InMemoryDailyCounter, NotificationHub};
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    pub(crate) fn app_state(store: Option<Arc<RecordStore>>) -> Arc<AppState> {
        Arc::new(AppState {
            controller: FocusController::new(
                Arc::new(InMemoryDailyCounter::new()),
                NotificationHub::new(),
            ),
            quotes: QuoteStore::from_lines("Stay on target."),
            store,
            default_duration: Duration::from_secs(30),
            write_timeout: Duration::from_secs(2),
            queue_capacity: 8,
        })
    }

    fn form(focusing: &str, duration: &str) -> Form<FocusForm> {
        Form(FocusForm {
            focusing: focusing.to_string(),
            duration: duration.to_string(),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    async fn focusing_payload(response: Response) -> FocusingPayload {
        match serde_json::from_value::<HubMessage>(body_json(response).await).expect("message") {
            HubMessage::Focusing(payload) => payload,
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn duration_parsing() {
        let default = Duration::from_secs(30);
        assert_eq!(parse_duration("", default), Ok(default));
        assert_eq!(parse_duration(" 90 ", default), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("abc", default), Err("Failed to parse duration"));
        assert_eq!(parse_duration("0", default), Err("duration must be positive"));
        assert_eq!(parse_duration("-5", default), Err("duration must be positive"));
        assert_eq!(parse_duration("86400", default), Ok(Duration::from_secs(86_400)));
        assert_eq!(
            parse_duration("86401", default),
            Err("duration must be at most 24 hours")
        );
        assert_eq!(
            parse_duration("9223372036854775807", default),
            Err("duration must be at most 24 hours")
        );
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        assert_eq!(health().await, "Healthy");
    }

    #[tokio::test(start_paused = true)]
    async fn post_focusing_starts_with_default_duration() {
        let state = app_state(None);
        let response = post_focusing(State(state.clone()), form("true", "")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let payload = focusing_payload(response).await;
        assert!(payload.focusing);
        assert_eq!(payload.focus_time_left, 30);
        assert_eq!(payload.num_focuses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn post_focusing_false_stops() {
        let state = app_state(None);
        post_focusing(State(state.clone()), form("true", "60")).await;

        let response = post_focusing(State(state.clone()), form("false", "")).await;
        let payload = focusing_payload(response).await;
        assert!(!payload.focusing);
        assert_eq!(payload.focus_time_left, 0);

        let Json(current) = get_focusing(State(state)).await;
        assert_eq!(current, HubMessage::Focusing(payload));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_durations_are_rejected() {
        let state = app_state(None);
        for raw in ["ten", "0", "-1", "9223372036854775807"] {
            let response = post_focusing(State(state.clone()), form("true", raw)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "duration {raw}");
        }
        assert!(!state.controller.snapshot().await.focusing);
    }

    #[tokio::test]
    async fn history_without_store_is_unavailable() {
        let response = history(State(app_state(None)), Query(HistoryQuery::default())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn history_returns_store_records() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/collections/_superusers/auth-with-password");
                then.status(200).json_body(json!({"token": "t"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/collections/coach/records");
                then.status(200).json_body(json!({
                    "totalItems": 1,
                    "items": [{"timestamp": "2026-03-02 09:30:00.000Z", "duration": 600}]
                }));
            })
            .await;
        let store = RecordStore::connect(&server.base_url(), "me@example.com", "secret")
            .await
            .expect("connect");

        let response = history(
            State(app_state(Some(Arc::new(store)))),
            Query(HistoryQuery { days: Some(3) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{"timestamp": "2026-03-02T09:30:00Z", "duration": 600}])
        );
    }

    #[tokio::test]
    async fn history_store_failure_is_bad_gateway() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/collections/_superusers/auth-with-password");
                then.status(200).json_body(json!({"token": "t"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/collections/coach/records");
                then.status(500).body("boom");
            })
            .await;
        let store = RecordStore::connect(&server.base_url(), "me@example.com", "secret")
            .await
            .expect("connect");

        let response = history(
            State(app_state(Some(Arc::new(store)))),
            Query(HistoryQuery::default()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
