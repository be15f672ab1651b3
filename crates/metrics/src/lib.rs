//! Metrics collection and export for chanlink.
//!
//! Relay code records through the `metrics` crate facade; without an
//! installed recorder every call is a no-op. With the `prometheus` feature,
//! [`init_metrics`] installs a Prometheus recorder and can serve the text
//! exposition format on its own listener.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chanlink_metrics::{counter, gauge, relay};
//!
//! counter!(relay::MESSAGES_FORWARDED_TOTAL).increment(1);
//! gauge!(relay::LINKED_CHANNELS).set(12.0);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
