//! Metric names recorded by the core.
//!
//! Values go to whatever `metrics` recorder the process installed; without one
//! they are discarded.

/// Connection Loops started (counter).
pub const CONNECTIONS_TOTAL: &str = "roomcast_connections_total";
/// Connection Loops finished (counter).
pub const DISCONNECTIONS_TOTAL: &str = "roomcast_disconnections_total";
/// Connection Loops currently running (gauge).
pub const CONNECTIONS_ACTIVE: &str = "roomcast_connections_active";
/// Rooms created by the registry (counter).
pub const ROOMS_CREATED_TOTAL: &str = "roomcast_rooms_created_total";
/// Frames routed to a handler (counter, labels: kind).
pub const FRAMES_DISPATCHED_TOTAL: &str = "roomcast_frames_dispatched_total";
/// Frames dropped before reaching a handler (counter, labels: reason).
pub const FRAMES_DROPPED_TOTAL: &str = "roomcast_frames_dropped_total";
/// Room broadcasts started (counter).
pub const BROADCASTS_TOTAL: &str = "roomcast_broadcasts_total";
/// Individual per-member broadcast sends (counter).
pub const BROADCAST_SENDS_TOTAL: &str = "roomcast_broadcast_sends_total";
/// Transport writes that failed (counter).
pub const SEND_FAILURES_TOTAL: &str = "roomcast_send_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_are_prefixed_snake_case() {
        let names = [
            CONNECTIONS_TOTAL,
            DISCONNECTIONS_TOTAL,
            CONNECTIONS_ACTIVE,
            ROOMS_CREATED_TOTAL,
            FRAMES_DISPATCHED_TOTAL,
            FRAMES_DROPPED_TOTAL,
            BROADCASTS_TOTAL,
            BROADCAST_SENDS_TOTAL,
            SEND_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("roomcast_"), "{name}");
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name} is not snake_case"
            );
        }
    }
}
