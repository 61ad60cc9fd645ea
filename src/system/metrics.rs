//! Metrics collection for the patch pipeline
//!
//! Counters are cheap enough to tick on every attempt and every frame;
//! everything registers against the default Prometheus registry so an
//! embedding host can scrape alongside its own metrics.

use crate::core::error::Result;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

/// Producer-side patch attempt counters
pub struct ProducerMetrics {
    /// Deltas produced and committed
    pub patches_produced: IntCounter,
    /// Attempts that classified to zero edits
    pub no_changes: IntCounter,
    /// Attempts aborted by a rude edit
    pub rude_edits: IntCounter,
    /// Attempts rejected by delta compiler diagnostics
    pub compile_failures: IntCounter,
    /// Session reinitializations
    pub session_resets: IntCounter,
}

/// Channel transport counters
pub struct TransportMetrics {
    /// Patch messages pushed onto the channel
    pub messages_sent: IntCounter,
    /// Bytes pushed onto the channel
    pub bytes_sent: IntCounter,
    /// Sends the channel rejected
    pub send_failures: IntCounter,
}

/// Consumer-side receive loop counters
pub struct ApplierMetrics {
    /// Frames read off the channel
    pub frames_received: IntCounter,
    /// Frames ignored as unrelated traffic
    pub frames_ignored: IntCounter,
    /// Patches applied to a live module
    pub applies_succeeded: IntCounter,
    /// Patches that failed to apply
    pub applies_failed: IntCounter,
}

/// Centralized metrics for both halves of the pipeline
pub struct Metrics {
    /// Producer-side counters
    pub producer: ProducerMetrics,
    /// Transport counters
    pub transport: TransportMetrics,
    /// Consumer-side counters
    pub applier: ApplierMetrics,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Result<Self> {
        Ok(Self {
            producer: ProducerMetrics::new()?,
            transport: TransportMetrics::new()?,
            applier: ApplierMetrics::new()?,
        })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> =
            Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
        &INSTANCE
    }
}

impl ProducerMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            patches_produced: register_int_counter!(
                "hp_patches_produced_total",
                "Total number of deltas produced and committed"
            )?,
            no_changes: register_int_counter!(
                "hp_no_changes_total",
                "Total number of attempts that classified to zero edits"
            )?,
            rude_edits: register_int_counter!(
                "hp_rude_edits_total",
                "Total number of attempts aborted by a rude edit"
            )?,
            compile_failures: register_int_counter!(
                "hp_compile_failures_total",
                "Total number of attempts rejected by diagnostics"
            )?,
            session_resets: register_int_counter!(
                "hp_session_resets_total",
                "Total number of producer session reinitializations"
            )?,
        })
    }
}

impl TransportMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            messages_sent: register_int_counter!(
                "hp_messages_sent_total",
                "Total number of patch messages sent"
            )?,
            bytes_sent: register_int_counter!(
                "hp_bytes_sent_total",
                "Total bytes pushed onto the channel"
            )?,
            send_failures: register_int_counter!(
                "hp_send_failures_total",
                "Total number of sends the channel rejected"
            )?,
        })
    }
}

impl ApplierMetrics {
    fn new() -> Result<Self> {
        Ok(Self {
            frames_received: register_int_counter!(
                "hp_frames_received_total",
                "Total number of frames read off the channel"
            )?,
            frames_ignored: register_int_counter!(
                "hp_frames_ignored_total",
                "Total number of frames ignored as unrelated traffic"
            )?,
            applies_succeeded: register_int_counter!(
                "hp_applies_succeeded_total",
                "Total number of patches applied to a live module"
            )?,
            applies_failed: register_int_counter!(
                "hp_applies_failed_total",
                "Total number of patches that failed to apply"
            )?,
        })
    }
}

/// Force metric registration at startup so the first scrape sees all
/// families, not just the ones already ticked.
pub fn init_registry() {
    Lazy::force(&GLOBAL_TOUCH);
}

static GLOBAL_TOUCH: Lazy<()> = Lazy::new(|| {
    let _ = Metrics::global();
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_metrics_register_once() {
        // Two lookups return the same registered instance; a second
        // registration attempt would fail inside Metrics::new.
        let first = Metrics::global();
        let second = Metrics::global();
        assert!(std::ptr::eq(first, second));

        first.producer.patches_produced.inc();
        assert!(second.producer.patches_produced.get() >= 1);
    }
}
