//! Focus-state core: interval tracking, single-timer expiry, live connection
//! fan-out and the controller that serializes every mutation.

pub mod controller;
pub mod error;
pub mod hooks;
pub mod intervals;
pub mod messages;
pub mod notify;
pub mod scheduler;
pub mod stats;

pub use controller::FocusController;
pub use error::{DeliveryError, FocusError, HookError};
pub use hooks::{FocusHook, FocusSession, FocusStarted};
pub use intervals::{FocusInterval, IntervalTracker};
pub use messages::{FocusSnapshot, FocusingPayload, HubMessage};
pub use notify::{BroadcastReport, LiveConnection, NotificationHub};
pub use scheduler::ExpiryScheduler;
pub use stats::{DailyCounter, InMemoryDailyCounter};
