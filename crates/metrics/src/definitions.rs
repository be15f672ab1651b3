//! Metric name and label definitions.
//!
//! Every metric chanlink emits is named here so the exporter configuration and
//! the call sites cannot drift apart.

/// Relay engine metrics
pub mod relay {
    /// Origin messages mirrored into at least one destination
    pub const MESSAGES_FORWARDED_TOTAL: &str = "chanlink_relay_messages_forwarded_total";
    /// Copies successfully posted into a destination
    pub const DESTINATIONS_POSTED_TOTAL: &str = "chanlink_relay_destinations_posted_total";
    /// Destinations skipped during a fan-out (no identity, post refused)
    pub const DESTINATIONS_SKIPPED_TOTAL: &str = "chanlink_relay_destinations_skipped_total";
    /// Copies rewritten after an origin edit
    pub const COPIES_EDITED_TOTAL: &str = "chanlink_relay_copies_edited_total";
    /// Sibling copies deleted after a deletion
    pub const COPIES_DELETED_TOTAL: &str = "chanlink_relay_copies_deleted_total";
    /// First reactions mirrored onto sibling copies
    pub const REACTIONS_MIRRORED_TOTAL: &str = "chanlink_relay_reactions_mirrored_total";
    /// Link index reloads that failed and kept the previous index
    pub const RELOAD_FAILURES_TOTAL: &str = "chanlink_relay_reload_failures_total";
    /// Channels currently present in the link index
    pub const LINKED_CHANNELS: &str = "chanlink_relay_linked_channels";
}

/// Discord platform metrics
pub mod discord {
    /// Gateway events received, by event kind
    pub const EVENTS_RECEIVED_TOTAL: &str = "chanlink_discord_events_received_total";
    /// Duration of outbound REST calls in seconds
    pub const API_CALL_DURATION_SECONDS: &str = "chanlink_discord_api_call_duration_seconds";
    /// Outbound REST calls that returned an error
    pub const API_CALL_ERRORS_TOTAL: &str = "chanlink_discord_api_call_errors_total";
    /// Relay webhooks created
    pub const WEBHOOKS_CREATED_TOTAL: &str = "chanlink_discord_webhooks_created_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const EVENT: &str = "event";
    pub const OPERATION: &str = "operation";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// REST call duration buckets (in seconds)
    /// Covers 10ms to 30s; uploads with attachments sit in the upper range
    pub static API_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]
    });
}
