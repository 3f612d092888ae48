//! Compliance judgment and audit trail
//!
//! - [`verdict`]: the fixed verdict sum type and fail-secure constructors
//! - [`judge`]: adapter over the external judgment capability
//! - [`trail`]: append-only audit-trail records and sinks

pub mod judge;
pub mod trail;
pub mod verdict;

pub use judge::{Auditor, JudgeCapability, DEFAULT_AUDIT_INSTRUCTION};
pub use trail::{append_with_retry, MemoryTrail, TrailMetadata, TrailRecord, TrailSink};
pub use verdict::{parse_verdict, AuditVerdict, Verdict};
