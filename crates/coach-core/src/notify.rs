use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::error::DeliveryError;

/// Sending side of a connected real-time client. The socket task owns the
/// receiver and writes whatever arrives to the wire.
#[derive(Clone, Debug)]
pub struct LiveConnection {
    conn_id: String,
    sender: mpsc::Sender<String>,
}

impl LiveConnection {
    pub fn new(conn_id: impl Into<String>, sender: mpsc::Sender<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            sender,
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    fn deliver(&self, text: String) -> Result<(), DeliveryError> {
        match self.sender.try_send(text) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(DeliveryError::Closed(self.conn_id.clone()))
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(DeliveryError::SlowConsumer(self.conn_id.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub pruned: usize,
}

#[derive(Default)]
struct HubInner {
    conn_counter: AtomicU64,
    connections: RwLock<HashMap<String, LiveConnection>>,
}

/// Set of live connections with best-effort, at-most-once delivery.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_conn_id(&self) -> String {
        let id = self.inner.conn_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("conn-{id}")
    }

    pub async fn register(&self, conn: LiveConnection) {
        let conn_id = conn.conn_id.clone();
        let previous = self
            .inner
            .connections
            .write()
            .await
            .insert(conn_id.clone(), conn);
        if previous.is_none() {
            info!(event = "client_connected", conn_id = %conn_id);
        }
    }

    pub async fn unregister(&self, conn_id: &str) -> bool {
        let removed = self.inner.connections.write().await.remove(conn_id);
        if removed.is_some() {
            info!(event = "client_disconnected", conn_id = conn_id);
        }
        removed.is_some()
    }

    #[cfg(test)]
    async fn contains(&self, conn_id: &str) -> bool {
        self.inner.connections.read().await.contains_key(conn_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Sends to one connection. A failed send prunes the connection.
    pub async fn send_to<M: Serialize>(
        &self,
        conn_id: &str,
        message: &M,
    ) -> Result<(), DeliveryError> {
        let text = serde_json::to_string(message)?;
        let conn = {
            let connections = self.inner.connections.read().await;
            connections.get(conn_id).cloned()
        };
        let Some(conn) = conn else {
            return Err(DeliveryError::Unknown(conn_id.to_string()));
        };

        if let Err(err) = conn.deliver(text) {
            warn!(event = "send_error", conn_id = conn_id, error = %err);
            self.unregister(conn_id).await;
            return Err(err);
        }
        Ok(())
    }

    /// Delivers to every connection registered when the call started, then
    /// prunes the ones that failed in a second, short write-locked step.
    pub async fn broadcast<M: Serialize>(
        &self,
        message: &M,
    ) -> Result<BroadcastReport, DeliveryError> {
        let text = serde_json::to_string(message)?;
        let targets = self.snapshot_connections().await;

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for conn in &targets {
            match conn.deliver(text.clone()) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(event = "send_error", conn_id = %conn.conn_id, error = %err);
                    failed.push(conn.conn_id.clone());
                }
            }
        }

        if !failed.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for conn_id in &failed {
                if connections.remove(conn_id).is_some() {
                    report.pruned += 1;
                    info!(event = "client_pruned", conn_id = %conn_id);
                }
            }
        }

        debug!(
            event = "broadcast",
            targets = targets.len(),
            delivered = report.delivered,
            pruned = report.pruned
        );
        Ok(report)
    }

    async fn snapshot_connections(&self) -> Vec<LiveConnection> {
        self.inner.connections.read().await.values().cloned().collect()
    }
}
