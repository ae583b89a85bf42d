use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{error::HookError, messages::FocusSnapshot};

/// Wall-clock view of the interval created by one focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusSession {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct FocusStarted {
    pub session: FocusSession,
    pub snapshot: FocusSnapshot,
}

/// Side effect run after every accepted focus request, outside the state
/// lock. Hooks may call back into the controller. Delivery is at-least-once
/// from the hook's point of view, so implementations should tolerate repeats.
#[async_trait]
pub trait FocusHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_focus_started(&self, event: &FocusStarted) -> Result<(), HookError>;
}

/// Runs hooks one after another. Errors are logged and never stop the chain.
pub async fn run_hooks(hooks: &[Arc<dyn FocusHook>], event: &FocusStarted) {
    for hook in hooks {
        match hook.on_focus_started(event).await {
            Ok(()) => {
                debug!(event = "hook_ok", hook = hook.name());
            }
            Err(err) => {
                warn!(event = "hook_error", hook = hook.name(), error = %err);
            }
        }
    }
}
