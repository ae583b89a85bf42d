use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

const LOGIN_ENDPOINT: &str = "/api/collections/_superusers/auth-with-password";
const FOCUS_RECORDS_ENDPOINT: &str = "/api/collections/coach/records";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const HISTORY_PAGE_SIZE: u32 = 500;
const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusRecord {
    pub timestamp: DateTime<Utc>,
    pub duration: u64,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RecordItem {
    timestamp: String,
    duration: u64,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    items: Vec<RecordItem>,
    #[serde(default, rename = "totalItems")]
    total_items: u32,
}

/// REST client for the remote record store (PocketBase collections API).
pub struct RecordStore {
    base_url: String,
    email: String,
    password: String,
    client: reqwest::Client,
    token: RwLock<String>,
}

impl RecordStore {
    pub async fn connect(
        url: &str,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, RecordStoreError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let store = Self {
            base_url: normalize_base_url(url),
            email: email.into(),
            password: password.into(),
            client,
            token: RwLock::new(String::new()),
        };
        store.login().await?;
        info!(event = "record_store_ready", base_url = %store.base_url);
        Ok(store)
    }

    pub async fn add_focus_record(&self, record: &FocusRecord) -> Result<(), RecordStoreError> {
        let body = serde_json::json!({
            "timestamp": record.timestamp.to_rfc3339(),
            "duration": record.duration,
        });
        let url = self.make_url(FOCUS_RECORDS_ENDPOINT);
        let response = self
            .send_authorized(|client| client.post(&url).json(&body))
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    pub async fn today_focus_count(&self, today: NaiveDate) -> Result<u32, RecordStoreError> {
        let filter = format!("timestamp ~ '{}'", today.format("%Y-%m-%d"));
        let url = self.make_url(FOCUS_RECORDS_ENDPOINT);
        let response = self
            .send_authorized(|client| client.get(&url).query(&[("filter", filter.as_str())]))
            .await?;
        let list: RecordList = decode(ensure_success(response).await?).await?;
        info!(event = "focus_count_loaded", count = list.total_items);
        Ok(list.total_items)
    }

    /// Records from the last `days` days, newest first.
    pub async fn focus_history(&self, days: u32) -> Result<Vec<FocusRecord>, RecordStoreError> {
        let start = Local::now().date_naive() - chrono::Duration::days(i64::from(days));
        let filter = format!("timestamp >= '{} 00:00:00'", start.format("%Y-%m-%d"));
        let per_page = HISTORY_PAGE_SIZE.to_string();
        let url = self.make_url(FOCUS_RECORDS_ENDPOINT);
        let response = self
            .send_authorized(|client| {
                client.get(&url).query(&[
                    ("filter", filter.as_str()),
                    ("sort", "-timestamp"),
                    ("perPage", per_page.as_str()),
                ])
            })
            .await?;
        let list: RecordList = decode(ensure_success(response).await?).await?;

        let records = list
            .items
            .into_iter()
            .filter_map(|item| match parse_store_timestamp(&item.timestamp) {
                Some(timestamp) => Some(FocusRecord {
                    timestamp,
                    duration: item.duration,
                }),
                None => {
                    warn!(event = "record_timestamp_invalid", timestamp = %item.timestamp);
                    None
                }
            })
            .collect::<Vec<_>>();
        info!(event = "focus_history_loaded", days, count = records.len());
        Ok(records)
    }

    /// Sends with the current token; on 401/403 logs in again and retries once.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, RecordStoreError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.token.read().await.clone();
        let response = build(&self.client)
            .header("Authorization", token)
            .send()
            .await?;
        if !matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(response);
        }

        info!(event = "record_store_token_refresh", status = response.status().as_u16());
        let token = self.login().await?;
        Ok(build(&self.client)
            .header("Authorization", token)
            .send()
            .await?)
    }

    pub async fn login(&self) -> Result<String, RecordStoreError> {
        let body = serde_json::json!({
            "identity": self.email,
            "password": self.password,
        });
        let response = self
            .client
            .post(self.make_url(LOGIN_ENDPOINT))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = error_message(response).await;
            return Err(RecordStoreError::Auth(format!("status {status}: {message}")));
        }
        let auth: AuthResponse = decode(response).await?;
        *self.token.write().await = auth.token.clone();
        Ok(auth.token)
    }

    fn make_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

fn parse_store_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, STORE_TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

async fn ensure_success(response: Response) -> Result<Response, RecordStoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = error_message(response).await;
    Err(RecordStoreError::Status { status, message })
}

async fn error_message(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) => body,
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, RecordStoreError> {
    let body = response.text().await?;
    serde_json::from_str::<T>(&body).map_err(|err| {
        let preview: String = body.chars().take(200).collect();
        RecordStoreError::Decode(format!("{err}: {preview}"))
    })
}
