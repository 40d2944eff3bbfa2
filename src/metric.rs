use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("call_relay_statds")
        .with_description("Call relay webhook statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: &'static str, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_webhook_received_statds(event_type: &str) {
    incr_statds("webhook_received", event_type.into())
}

pub fn incr_webhook_rejected_statds(reason: &str) {
    incr_statds("webhook_rejected", reason.into())
}

pub fn incr_action_status_statds(action: &str, status: &str) {
    incr_statds("action_status", format!("{action}:{status}"))
}
