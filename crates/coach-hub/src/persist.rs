use std::sync::Arc;

use async_trait::async_trait;
use coach_core::{FocusHook, FocusStarted, HookError};

use crate::record_store::{FocusRecord, RecordStore};

/// Stores one record per accepted focus request.
pub struct RecordStoreHook {
    store: Arc<RecordStore>,
}

impl RecordStoreHook {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl FocusHook for RecordStoreHook {
    fn name(&self) -> &str {
        "record_store"
    }

    async fn on_focus_started(&self, event: &FocusStarted) -> Result<(), HookError> {
        let record = FocusRecord {
            timestamp: event.session.started_at,
            duration: event.session.duration.as_secs(),
        };
        self.store
            .add_focus_record(&record)
            .await
            .map_err(|err| HookError::Persistence(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use coach_core::{FocusSession, FocusSnapshot};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn started(duration: u64) -> FocusStarted {
        FocusStarted {
            session: FocusSession {
                started_at: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
                duration: Duration::from_secs(duration),
            },
            snapshot: FocusSnapshot {
                focusing: true,
                since_last_change: Duration::ZERO,
                focus_time_left: Duration::from_secs(duration),
                sessions_today: 1,
            },
        }
    }

    async fn store_with_records(
        server: &MockServer,
        status: u16,
    ) -> (Arc<RecordStore>, httpmock::Mock<'_>) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/collections/_superusers/auth-with-password");
                then.status(200).json_body(json!({"token": "t"}));
            })
            .await;
        let records = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/collections/coach/records")
                    .json_body(json!({"timestamp": "2026-03-02T08:00:00+00:00", "duration": 1500}));
                then.status(status).json_body(json!({"message": "nope"}));
            })
            .await;
        let store = RecordStore::connect(&server.base_url(), "me@example.com", "secret")
            .await
            .expect("connect");
        (Arc::new(store), records)
    }

    #[tokio::test]
    async fn writes_session_as_record() {
        let server = MockServer::start_async().await;
        let (store, records) = store_with_records(&server, 200).await;

        RecordStoreHook::new(store)
            .on_focus_started(&started(1500))
            .await
            .expect("persisted");
        records.assert_async().await;
    }

    #[tokio::test]
    async fn store_failure_is_a_persistence_error() {
        let server = MockServer::start_async().await;
        let (store, _records) = store_with_records(&server, 400).await;

        let err = RecordStoreHook::new(store)
            .on_focus_started(&started(1500))
            .await
            .expect_err("rejected");
        assert!(matches!(err, HookError::Persistence(message) if message.contains("nope")));
    }
}
