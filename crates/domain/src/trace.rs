use serde::Serialize;

/// Structured trace events emitted across the gardena crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TokenExchanged {
        expires_in: u64,
    },
    TokenInvalidated {
        reason: String,
    },
    ApiCall {
        method: String,
        path: String,
        status: u16,
        duration_ms: u64,
        retried: bool,
    },
    LocationsCached {
        count: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "gs_event");
    }
}
