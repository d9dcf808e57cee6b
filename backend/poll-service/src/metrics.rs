//! Prometheus metrics for ballots and live event fan-out

use prometheus::{register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder};

lazy_static::lazy_static! {
    /// Ballots by outcome (counted/already_voted/invalid_option/not_found)
    static ref POLL_VOTES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "poll_votes_total",
        "Vote submissions by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Events handed to the hub by kind
    static ref POLL_EVENTS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "poll_events_published_total",
        "Poll events published to observers",
        &["event"]
    ).expect("Prometheus metrics registration should succeed at startup");

    static ref POLL_EVENT_SUBSCRIBERS: IntGauge = register_int_gauge!(
        "poll_event_subscribers",
        "Currently connected event observers"
    ).expect("Prometheus metrics registration should succeed at startup");
}

pub fn record_vote(outcome: &str) {
    POLL_VOTES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_event(event: &str) {
    POLL_EVENTS_PUBLISHED_TOTAL.with_label_values(&[event]).inc();
}

pub fn set_subscribers(count: usize) {
    POLL_EVENT_SUBSCRIBERS.set(count as i64);
}

/// Render the default registry in the Prometheus text format
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
