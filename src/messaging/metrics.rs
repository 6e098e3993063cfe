//! Pipeline counters.
//!
//! Every counter carries a `topic` label naming the source topic of the
//! reader. Nothing is exported unless a recorder is installed, see
//! [`init_metrics_exporter`].

use metrics::increment_counter;

/// A record was fetched from the broker log.
pub fn record_fetched(topic: &str) {
    increment_counter!("missy_messages_fetched_total", "topic" => topic.to_string());
}

/// A record was processed successfully, possibly after retries.
pub fn record_processed(topic: &str) {
    increment_counter!("missy_messages_processed_total", "topic" => topic.to_string());
}

/// A processing attempt other than the first one is about to run.
pub fn record_retry(topic: &str) {
    increment_counter!("missy_processing_retries_total", "topic" => topic.to_string());
}

/// A record failed every processing attempt.
pub fn record_exhausted(topic: &str) {
    increment_counter!("missy_messages_exhausted_total", "topic" => topic.to_string());
}

/// A dead-letter write finished.
pub fn record_dead_letter(topic: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    increment_counter!(
        "missy_dead_letter_writes_total",
        "topic" => topic.to_string(),
        "status" => status
    );
}

/// Committing a record's offset failed.
pub fn record_commit_failure(topic: &str) {
    increment_counter!("missy_commit_failures_total", "topic" => topic.to_string());
}

/// Fetching the next record failed, ending the loop.
pub fn record_fetch_failure(topic: &str) {
    increment_counter!("missy_fetch_failures_total", "topic" => topic.to_string());
}

/// Installs the Prometheus exporter.
///
/// Only has an effect when built with the `prometheus` feature; the exporter
/// then serves the pipeline counters on its default listen address.
///
/// ```
/// missy::messaging::metrics::init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        if let Err(e) = PrometheusBuilder::new().install() {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_fetched("orders");
        record_processed("orders");
        record_retry("orders");
        record_exhausted("orders");
        record_dead_letter("orders", true);
        record_dead_letter("orders", false);
        record_commit_failure("orders");
        record_fetch_failure("orders");
    }

    #[test]
    fn test_init_metrics_exporter() {
        init_metrics_exporter();
    }
}
