// ============================================================
// Layer 3 — HistoryRecord
// ============================================================
// One line of request history: what was called, how it ended
// and how long it took. The service only produces these; where
// they end up is the HistorySink's business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub request_id:  Uuid,
    pub endpoint:    String,
    pub status_code: u16,
    pub timestamp:   DateTime<Utc>,
    pub latency_ms:  u64,
    /// Characters of input text; 0 for requests without text.
    pub text_length: usize,
}

impl HistoryRecord {
    pub fn new(endpoint: impl Into<String>, status_code: u16, latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            status_code,
            timestamp: Utc::now(),
            latency_ms,
            text_length: 0,
        }
    }

    pub fn with_text_length(mut self, text_length: usize) -> Self {
        self.text_length = text_length;
        self
    }
}
