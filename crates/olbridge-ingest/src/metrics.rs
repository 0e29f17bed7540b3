//! Ingestion metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder. These complement the structured logs.

use metrics::{counter, describe_counter, describe_histogram, histogram};

// ============================================================================
// Metric Names
// ============================================================================

/// Events handed to the coordinator, labelled by outcome.
pub const EVENTS_TOTAL: &str = "olbridge_events_total";

/// Redelivered events suppressed by the dedup cache.
pub const DUPLICATES_SUPPRESSED: &str = "olbridge_duplicates_suppressed_total";

/// Placeholder identifiers minted.
pub const PLACEHOLDERS_MINTED: &str = "olbridge_placeholders_minted_total";

/// Catalog lookups that failed.
pub const RESOLUTION_FAILURES: &str = "olbridge_resolution_failures_total";

/// Entity documents submitted, labelled by batch kind and acceptance.
pub const ENTITIES_SUBMITTED: &str = "olbridge_entities_submitted_total";

/// Cleanup deletes issued, labelled by result.
pub const CLEANUP_DELETES: &str = "olbridge_cleanup_deletes_total";

/// Wall-clock duration of one event run.
pub const RUN_DURATION: &str = "olbridge_run_duration_seconds";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all ingestion metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(EVENTS_TOTAL, "Lineage events handled, by outcome");
    describe_counter!(DUPLICATES_SUPPRESSED, "Redelivered events suppressed");
    describe_counter!(PLACEHOLDERS_MINTED, "Placeholder identifiers minted");
    describe_counter!(RESOLUTION_FAILURES, "Catalog lookups that failed");
    describe_counter!(ENTITIES_SUBMITTED, "Entity documents submitted to the catalog");
    describe_counter!(CLEANUP_DELETES, "Cleanup deletes issued to the catalog");
    describe_histogram!(RUN_DURATION, "Duration of one event run in seconds");
}

// ============================================================================
// Recording
// ============================================================================

/// Records the outcome of one event.
pub fn record_event(outcome: &'static str, duration_secs: f64) {
    counter!(EVENTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(RUN_DURATION, "outcome" => outcome).record(duration_secs);
}

/// Records a suppressed duplicate.
pub fn record_duplicate_suppressed() {
    counter!(DUPLICATES_SUPPRESSED).increment(1);
}

/// Records a minted placeholder.
pub fn record_placeholder_minted() {
    counter!(PLACEHOLDERS_MINTED).increment(1);
}

/// Records a failed catalog lookup.
pub fn record_resolution_failure() {
    counter!(RESOLUTION_FAILURES).increment(1);
}

/// Records a submitted batch.
pub fn record_batch_submitted(kind: &'static str, accepted: bool, size: usize) {
    let labels = [("kind", kind.to_string()), ("accepted", accepted.to_string())];
    counter!(ENTITIES_SUBMITTED, &labels).increment(size as u64);
}

/// Records a cleanup delete.
pub fn record_cleanup_delete(succeeded: bool) {
    let result = if succeeded { "ok" } else { "error" };
    counter!(CLEANUP_DELETES, "result" => result).increment(1);
}
