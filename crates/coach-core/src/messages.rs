use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Derived view of the focus state at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusSnapshot {
    pub focusing: bool,
    pub since_last_change: Duration,
    pub focus_time_left: Duration,
    pub sessions_today: u32,
}

impl FocusSnapshot {
    pub fn to_message(&self) -> HubMessage {
        HubMessage::Focusing(FocusingPayload::from(self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusingPayload {
    pub focusing: bool,
    pub since_last_change: u64,
    pub focus_time_left: u64,
    pub num_focuses: u32,
}

impl From<&FocusSnapshot> for FocusingPayload {
    fn from(snapshot: &FocusSnapshot) -> Self {
        Self {
            focusing: snapshot.focusing,
            since_last_change: whole_seconds(snapshot.since_last_change),
            focus_time_left: remaining_seconds(snapshot.focus_time_left),
            num_focuses: snapshot.sessions_today,
        }
    }
}

/// Messages pushed to live connections, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    Focusing(FocusingPayload),
    Quote { quote: String },
    Pong,
}

/// Nearest whole second, saturating. Used for elapsed time.
pub fn whole_seconds(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    millis.saturating_add(500) / 1000
}

/// Rounds up, so any time left at all reads as at least one second and the
/// wire never shows `focusing` with zero time left.
pub fn remaining_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}
