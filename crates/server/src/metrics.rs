//! Prometheus metrics

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the recorder; idempotent
pub fn init_metrics() {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus recorder installation")
    });
}

/// Render the current metrics snapshot
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

pub fn record_connection_opened() {
    metrics::counter!("voice_dialog_connections_opened_total").increment(1);
    metrics::gauge!("voice_dialog_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("voice_dialog_connections_active").decrement(1.0);
}

pub fn record_turn() {
    metrics::counter!("voice_dialog_turns_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_render() {
        init_metrics();
        init_metrics(); // idempotent

        record_connection_opened();
        record_turn();
        record_connection_closed();

        let rendered = metrics_handler().await;
        assert!(rendered.contains("voice_dialog_connections_opened_total"));
    }
}
