//! Veilgate — privacy-intercepting gateway core
//!
//! Veilgate sits between a client and a downstream AI model. Every outgoing
//! payload is scanned for sensitive personal data; matched spans are
//! redacted or synthetically swapped. When something is found, the request
//! is staged in an ephemeral store and paused until the user confirms how
//! to proceed — forward the redacted payload, forward the original despite
//! the findings (a flagged bypass), or cancel. Each staged transaction
//! resolves at most once and silently expires after five minutes, so the
//! unredacted payload never outlives the confirmation window.
//!
//! ## Pipeline
//!
//! ```text
//! payload
//!   → policy resolution        (request override > stored profile > defaults)
//!   → contextual redaction     (patterns + entities, whitelist/trigger rules)
//!   → pass-through or pause    (pending store, 5 min TTL, atomic take)
//!   → compliance judgment      (fail-secure verdict adapter)
//!   → downstream model         (errors converted, never fatal)
//!   → audit trail              (background write, bounded retries)
//! ```
//!
//! External collaborators — the NER backend, the judgment backend, the
//! downstream model, the ephemeral store, the durable log, and the profile
//! source — are consumed through capability traits and injected at
//! construction.
//!
//! ## Modules
//!
//! - [`scrub`]: detection and redaction (patterns, entities, engine)
//! - [`policy`]: layered policy resolution
//! - [`staging`]: staged transactions and the pending store
//! - [`orchestrator`]: the pause/resume state machine
//! - [`audit`]: compliance verdicts and the audit trail
//! - [`model`]: downstream model capability
//! - [`api`]: HTTP surface
//! - [`config`]: gateway configuration

pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod retry;
pub mod scrub;
pub mod staging;

pub use api::{gateway_router, GatewayState};
pub use audit::{AuditVerdict, Auditor, JudgeCapability, MemoryTrail, TrailRecord, TrailSink, Verdict};
pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use model::{Completion, ModelClient};
pub use orchestrator::{
    ConfirmChoice, InterceptOutcome, InterceptRequest, Orchestrator, ProcessedResponse,
};
pub use policy::{PolicyOverlay, PolicyResolver, ProfileSource, ScrubPolicy};
pub use scrub::{
    EntityCategory, EntityClassifier, EntitySpan, Hit, ScrubCategory, ScrubEngine, ScrubMode,
};
pub use staging::{MemoryPendingStore, PendingStore, StagedTransaction};
