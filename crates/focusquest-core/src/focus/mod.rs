mod machine;
mod observer;

pub use machine::{
    FocusMachine, FocusSignal, FocusState, DRAIN_HP, DRAIN_INTERVAL_MS, GRACE_PERIOD_MS,
};
pub use observer::SubscriptionId;

/// Milliseconds since the Unix epoch, from the system clock.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
