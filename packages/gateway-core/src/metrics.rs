//! Prometheus metrics exposed at `/metrics`.
//!
//! Mirrors the original relay's `prometheus_client` counters/gauges one for
//! one (`SESSIONS_TOTAL`, `ACTIVE_SESSIONS`, `MESSAGES_TOTAL{msg_type}`,
//! `AUDIO_BYTES_IN_TOTAL`, a dispatch-latency histogram), backed here by the
//! `prometheus` crate (the metrics crate already used elsewhere in the
//! surrounding corpus for this exact purpose).

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Owns every metric the gateway exposes plus the registry they are
/// registered against.
pub struct Metrics {
    registry: Registry,
    pub sessions_total: IntCounter,
    pub active_sessions: IntGauge,
    pub messages_total: IntCounterVec,
    pub audio_bytes_in_total: IntCounter,
    pub audio_bytes_out_total: IntCounter,
    pub dispatch_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let sessions_total =
            IntCounter::new("sessions_total", "Total WebSocket sessions accepted").unwrap();
        let active_sessions =
            IntGauge::new("active_sessions", "Currently live WebSocket sessions").unwrap();
        let messages_total = IntCounterVec::new(
            Opts::new("messages_total", "Frames received, labeled by type"),
            &["msg_type"],
        )
        .unwrap();
        let audio_bytes_in_total = IntCounter::new(
            "audio_bytes_in_total",
            "Bytes of inbound audio_chunk payload decoded",
        )
        .unwrap();
        let audio_bytes_out_total = IntCounter::new(
            "audio_bytes_out_total",
            "Bytes of outbound audio_response payload encoded",
        )
        .unwrap();
        let dispatch_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "ai_dispatch_latency_seconds",
            "Latency of processVoiceInteraction calls",
        ))
        .unwrap();

        registry
            .register(Box::new(sessions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(active_sessions.clone()))
            .unwrap();
        registry
            .register(Box::new(messages_total.clone()))
            .unwrap();
        registry
            .register(Box::new(audio_bytes_in_total.clone()))
            .unwrap();
        registry
            .register(Box::new(audio_bytes_out_total.clone()))
            .unwrap();
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .unwrap();

        Self {
            registry,
            sessions_total,
            active_sessions,
            messages_total,
            audio_bytes_in_total,
            audio_bytes_out_total,
            dispatch_latency_seconds,
        }
    }

    /// Renders the registry in Prometheus text exposition format for the
    /// `/metrics` HTTP handler.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_metric_names() {
        let metrics = Metrics::new();
        metrics.sessions_total.inc();
        metrics.messages_total.with_label_values(&["handshake"]).inc();
        let rendered = metrics.encode();
        assert!(rendered.contains("sessions_total"));
        assert!(rendered.contains("messages_total"));
    }
}
