//! Audit trail
//!
//! One `TrailRecord` is appended per terminal transition, through the
//! injected `TrailSink` capability. Writes run as background tasks with
//! bounded, backed-off retries; a write failure is logged and swallowed,
//! never surfaced to the user-visible response.

use crate::audit::verdict::{AuditVerdict, Verdict};
use crate::error::Result;
use crate::retry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Free-form correlation metadata carried on every record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailMetadata {
    /// Origin of the request (e.g. "api-gateway", "web-dashboard")
    pub source: String,
    /// Originating request id
    pub request_id: String,
    /// Optional conversation correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Token usage of the downstream call, or an estimate
    pub token_count: u64,
    /// True when the user forwarded the original payload despite hits
    pub bypass_used: bool,
}

/// One audit-trail entry for a terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailRecord {
    pub payload_raw: Value,
    pub payload_redacted: Value,
    pub verdict: Verdict,
    pub compliance_score: f64,
    pub reasoning: String,
    pub has_sensitive_data: bool,
    pub metadata: TrailMetadata,
    pub recorded_at: DateTime<Utc>,
}

impl TrailRecord {
    pub fn new(
        payload_raw: Value,
        payload_redacted: Value,
        verdict: &AuditVerdict,
        has_sensitive_data: bool,
        metadata: TrailMetadata,
    ) -> Self {
        Self {
            payload_raw,
            payload_redacted,
            verdict: verdict.verdict,
            compliance_score: verdict.score,
            reasoning: verdict.reasoning.clone(),
            has_sensitive_data,
            metadata,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only durable log capability.
#[async_trait]
pub trait TrailSink: Send + Sync {
    async fn append(&self, record: TrailRecord) -> Result<()>;
}

/// Append one record with bounded retries. Returns the final error after
/// exhaustion; callers running in the background log it and move on.
pub async fn append_with_retry(
    sink: Arc<dyn TrailSink>,
    record: TrailRecord,
    attempts: u32,
    base: Duration,
) -> Result<()> {
    retry::with_backoff(attempts, base, || {
        let sink = sink.clone();
        let record = record.clone();
        async move { sink.append(record).await }
    })
    .await
}

/// In-memory trail sink with a bounded buffer. Backs tests and local runs;
/// production deployments inject a durable sink.
pub struct MemoryTrail {
    records: Mutex<VecDeque<TrailRecord>>,
    capacity: usize,
}

impl MemoryTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Snapshot of the buffered records, oldest first.
    pub async fn records(&self) -> Vec<TrailRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl Default for MemoryTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl TrailSink for MemoryTrail {
    async fn append(&self, record: TrailRecord) -> Result<()> {
        tracing::info!(
            verdict = %record.verdict,
            has_sensitive_data = record.has_sensitive_data,
            bypass_used = record.metadata.bypass_used,
            request_id = %record.metadata.request_id,
            "audit trail entry recorded"
        );
        let mut records = self.records.lock().await;
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record(bypass: bool) -> TrailRecord {
        TrailRecord::new(
            json!({"message": "raw"}),
            json!({"message": "[REDACTED]"}),
            &AuditVerdict::new(Verdict::Valid, 1.0, "clean"),
            true,
            TrailMetadata {
                source: "api-gateway".to_string(),
                request_id: "req-1".to_string(),
                conversation_id: None,
                token_count: 12,
                bypass_used: bypass,
            },
        )
    }

    #[tokio::test]
    async fn test_memory_trail_appends() {
        let trail = MemoryTrail::default();
        trail.append(record(false)).await.unwrap();
        trail.append(record(true)).await.unwrap();
        let records = trail.records().await;
        assert_eq!(records.len(), 2);
        assert!(!records[0].metadata.bypass_used);
        assert!(records[1].metadata.bypass_used);
    }

    #[tokio::test]
    async fn test_memory_trail_bounded() {
        let trail = MemoryTrail::new(2);
        for _ in 0..5 {
            trail.append(record(false)).await.unwrap();
        }
        assert_eq!(trail.len().await, 2);
    }

    struct FlakySink {
        fail_first: u32,
        calls: AtomicU32,
        delegate: MemoryTrail,
    }

    #[async_trait]
    impl TrailSink for FlakySink {
        async fn append(&self, record: TrailRecord) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(Error::Upstream("log backend hiccup".to_string()));
            }
            self.delegate.append(record).await
        }
    }

    #[tokio::test]
    async fn test_append_with_retry_recovers() {
        let sink = Arc::new(FlakySink {
            fail_first: 2,
            calls: AtomicU32::new(0),
            delegate: MemoryTrail::default(),
        });
        let result = append_with_retry(
            sink.clone(),
            record(false),
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(sink.delegate.len().await, 1);
    }

    #[tokio::test]
    async fn test_append_with_retry_exhausts() {
        let sink = Arc::new(FlakySink {
            fail_first: 10,
            calls: AtomicU32::new(0),
            delegate: MemoryTrail::default(),
        });
        let result =
            append_with_retry(sink.clone(), record(false), 3, Duration::from_millis(1)).await;
        assert!(result.is_err());
        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
        assert!(sink.delegate.is_empty().await);
    }

    #[test]
    fn test_record_serialization_skips_empty_conversation() {
        let json = serde_json::to_string(&record(false)).unwrap();
        assert!(!json.contains("conversation_id"));
        assert!(json.contains("bypass_used"));
    }
}
