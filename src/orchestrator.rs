//! Interception orchestrator
//!
//! The state machine tying the pipeline together:
//!
//! ```text
//! RECEIVED ─→ SCANNED_CLEAN ──────────────→ audit → model → TERMINAL(logged)
//!     │
//!     └─→ SCANNED_SENSITIVE → PENDING_CONFIRMATION
//!             │ confirm(use_redacted)  → CONFIRMED_SAFE   → audit → model → TERMINAL(logged)
//!             │ confirm(use_original)  → CONFIRMED_BYPASS → audit → model → TERMINAL(logged)
//!             │ confirm(cancel)        → CANCELLED        → TERMINAL(logged)
//!             └ (ttl elapses)          → EXPIRED          → unresolvable, unlogged
//! ```
//!
//! Resolution is an atomic take from the pending store, so each staged
//! transaction reaches exactly one terminal outcome; a second confirm or
//! cancel observes not-found and runs no side effects. The trail write is a
//! spawned background task with bounded retries and never affects the
//! response.

use crate::audit::{append_with_retry, AuditVerdict, Auditor, TrailMetadata, TrailRecord, TrailSink, Verdict};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::model::{extract_prompt, generate_lenient, ModelClient, ASSISTANT_SYSTEM_INSTRUCTION};
use crate::policy::{PolicyOverlay, PolicyResolver, ScrubPolicy};
use crate::scrub::{ScrubCategory, ScrubEngine, ScrubMode, TextScrub};
use crate::staging::{PendingStore, StagedTransaction};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// An incoming payload plus its routing and policy context.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterceptRequest {
    pub payload: Value,
    /// Origin label; defaults from configuration
    pub source: Option<String>,
    /// Owner identity used for the stored-profile lookup
    pub owner: Option<String>,
    /// Request-level policy override
    pub policy: Option<PolicyOverlay>,
    /// Rewrite mode; defaults from configuration
    pub mode: Option<ScrubMode>,
    pub request_id: Option<String>,
    pub conversation_id: Option<String>,
}

/// User decision for a paused transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmChoice {
    /// Forward the redacted payload
    UseRedacted,
    /// Forward the original payload despite detected sensitive data
    UseOriginal,
    /// Abort the request
    Cancel,
}

/// Processing metadata returned with every terminal response.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub engine: String,
    pub scrubbed_count: usize,
    pub latency_ms: u64,
}

/// Terminal result of a processed (or cancelled) transaction.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub status: &'static str,
    pub verdict: Verdict,
    pub compliance_score: f64,
    pub reasoning: String,
    pub redacted_payload: Value,
    pub model_response: Option<String>,
    pub receipt: Receipt,
}

/// Outcome of an intercept call: either a terminal result or a pause.
#[derive(Debug, Clone)]
pub enum InterceptOutcome {
    Processed(Box<ProcessedResponse>),
    Pending {
        pending_id: String,
        /// Distinct detected categories
        detected: Vec<ScrubCategory>,
        redacted_payload: Value,
    },
}

/// The interception orchestrator. Holds every injected capability;
/// constructed once at process start.
pub struct Orchestrator {
    engine: ScrubEngine,
    policies: PolicyResolver,
    store: Arc<dyn PendingStore>,
    auditor: Auditor,
    model: Arc<dyn ModelClient>,
    trail: Arc<dyn TrailSink>,
    config: GatewayConfig,
}

impl Orchestrator {
    pub fn new(
        engine: ScrubEngine,
        policies: PolicyResolver,
        store: Arc<dyn PendingStore>,
        auditor: Auditor,
        model: Arc<dyn ModelClient>,
        trail: Arc<dyn TrailSink>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            engine,
            policies,
            store,
            auditor,
            model,
            trail,
            config,
        }
    }

    /// Receive a payload: scan it, then either process it straight through
    /// or stage it and pause for confirmation.
    pub async fn intercept(&self, request: InterceptRequest) -> Result<InterceptOutcome> {
        if request.payload.is_null() {
            return Err(Error::Validation("payload must not be null".to_string()));
        }

        let started = Instant::now();
        let policy = self
            .policies
            .effective(request.owner.as_deref(), request.policy.as_ref())
            .await;
        let mode = request.mode.unwrap_or(self.config.default_mode);
        let source = request
            .source
            .unwrap_or_else(|| self.config.default_source.clone());
        let request_id = request
            .request_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let scrub = self.engine.scrub_value(&request.payload, &policy, mode).await;

        if scrub.has_sensitive_data() {
            let detected: Vec<ScrubCategory> = scrub
                .hits
                .iter()
                .map(|h| h.category)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let txn = StagedTransaction::new(
                request.payload,
                scrub.value.clone(),
                scrub.hits,
                policy.audit_instruction.clone(),
                request_id.clone(),
                request.conversation_id,
                source,
                mode,
            );
            let pending_id = txn.id.clone();
            self.store
                .stage(txn, self.config.pending_ttl())
                .await
                .map_err(|e| Error::Store(format!("failed to stage transaction: {}", e)))?;

            tracing::info!(
                pending_id = %pending_id,
                request_id = %request_id,
                categories = ?detected,
                "sensitive data detected, pausing for confirmation"
            );

            return Ok(InterceptOutcome::Pending {
                pending_id,
                detected,
                redacted_payload: scrub.value,
            });
        }

        // Clean payload: judge, forward, log.
        let verdict = self
            .auditor
            .audit(&request.payload, policy.audit_instruction.as_deref())
            .await;

        let mut model_response = None;
        let mut token_count = estimate_tokens(&request.payload);
        if verdict.verdict != Verdict::Rejected {
            let prompt = extract_prompt(&request.payload);
            let completion =
                generate_lenient(&*self.model, &prompt, ASSISTANT_SYSTEM_INSTRUCTION).await;
            token_count = completion.tokens;
            model_response = Some(completion.text);
        }

        self.spawn_trail(TrailRecord::new(
            request.payload,
            scrub.value.clone(),
            &verdict,
            false,
            TrailMetadata {
                source,
                request_id,
                conversation_id: request.conversation_id,
                token_count,
                bypass_used: false,
            },
        ));

        Ok(InterceptOutcome::Processed(Box::new(ProcessedResponse {
            status: "processed",
            verdict: verdict.verdict,
            compliance_score: verdict.score,
            reasoning: verdict.reasoning,
            redacted_payload: scrub.value,
            model_response,
            receipt: Receipt {
                engine: self.engine_label(scrub.degraded),
                scrubbed_count: 0,
                latency_ms: started.elapsed().as_millis() as u64,
            },
        })))
    }

    /// Resolve a paused transaction. The atomic take happens before any
    /// side effect, so each identifier resolves at most once; afterwards
    /// (or after expiry) this reports not-found and changes nothing.
    pub async fn confirm(&self, pending_id: &str, choice: ConfirmChoice) -> Result<ProcessedResponse> {
        let started = Instant::now();

        let txn = self
            .store
            .take(pending_id)
            .await
            .map_err(|e| Error::Store(format!("failed to resolve transaction: {}", e)))?
            .ok_or_else(|| Error::PendingNotFound(pending_id.to_string()))?;

        match choice {
            ConfirmChoice::Cancel => {
                let verdict = AuditVerdict::cancelled();
                tracing::info!(
                    pending_id = %pending_id,
                    request_id = %txn.request_id,
                    "staged transaction cancelled by user"
                );
                // Zero retention: the cancel record carries a sentinel, not
                // the original payload.
                self.spawn_trail(TrailRecord::new(
                    json!({"event": "request_cancelled"}),
                    json!({}),
                    &verdict,
                    true,
                    TrailMetadata {
                        source: txn.source,
                        request_id: txn.request_id,
                        conversation_id: txn.conversation_id,
                        token_count: 0,
                        bypass_used: false,
                    },
                ));

                Ok(ProcessedResponse {
                    status: "cancelled",
                    verdict: verdict.verdict,
                    compliance_score: verdict.score,
                    reasoning: verdict.reasoning,
                    redacted_payload: json!({}),
                    model_response: None,
                    receipt: Receipt {
                        engine: "confirmation".to_string(),
                        scrubbed_count: 0,
                        latency_ms: started.elapsed().as_millis() as u64,
                    },
                })
            }
            ConfirmChoice::UseRedacted | ConfirmChoice::UseOriginal => {
                let bypass = choice == ConfirmChoice::UseOriginal;
                let target = if bypass {
                    txn.original.clone()
                } else {
                    txn.redacted.clone()
                };
                let scrubbed_count = if bypass { 0 } else { txn.hits.len() };

                if bypass {
                    tracing::warn!(
                        pending_id = %pending_id,
                        request_id = %txn.request_id,
                        "user bypassed redaction, forwarding original payload"
                    );
                }

                let verdict = self
                    .auditor
                    .audit(&target, txn.audit_instruction.as_deref())
                    .await;

                let mut model_response = None;
                let mut token_count = estimate_tokens(&target);
                if verdict.verdict != Verdict::Rejected {
                    let prompt = extract_prompt(&target);
                    let completion =
                        generate_lenient(&*self.model, &prompt, ASSISTANT_SYSTEM_INSTRUCTION).await;
                    token_count = completion.tokens;
                    model_response = Some(completion.text);
                }

                self.spawn_trail(TrailRecord::new(
                    txn.original,
                    target.clone(),
                    &verdict,
                    true,
                    TrailMetadata {
                        source: txn.source,
                        request_id: txn.request_id,
                        conversation_id: txn.conversation_id,
                        token_count,
                        bypass_used: bypass,
                    },
                ));

                Ok(ProcessedResponse {
                    status: "processed",
                    verdict: verdict.verdict,
                    compliance_score: verdict.score,
                    reasoning: verdict.reasoning,
                    redacted_payload: target,
                    model_response,
                    receipt: Receipt {
                        engine: "confirmation".to_string(),
                        scrubbed_count,
                        latency_ms: started.elapsed().as_millis() as u64,
                    },
                })
            }
        }
    }

    /// Abort a paused transaction. Same resolution path as
    /// `confirm(id, Cancel)`.
    pub async fn cancel(&self, pending_id: &str) -> Result<ProcessedResponse> {
        self.confirm(pending_id, ConfirmChoice::Cancel).await
    }

    /// Standalone egress scan: safe-default policy, redact mode.
    pub async fn scan_text(&self, text: &str) -> TextScrub {
        self.engine
            .scrub_text(text, &ScrubPolicy::safe_default(), ScrubMode::Redact)
            .await
    }

    fn engine_label(&self, degraded: bool) -> String {
        format!("veilgate-scrub ({})", self.engine.describe(degraded))
    }

    /// Fire-and-forget trail write with bounded retries. A failure is
    /// logged inside the task and never rolls back the decision.
    fn spawn_trail(&self, record: TrailRecord) {
        let sink = self.trail.clone();
        let attempts = self.config.trail_retry_attempts;
        let base = self.config.trail_retry_base();
        tokio::spawn(async move {
            if let Err(e) = append_with_retry(sink, record, attempts, base).await {
                tracing::error!(error = %e, "audit trail write failed after retries");
            }
        });
    }
}

fn estimate_tokens(payload: &Value) -> u64 {
    (payload.to_string().len() / 4) as u64
}
