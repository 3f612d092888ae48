//! Entity classifier capability
//!
//! The gateway performs no named-entity recognition itself; it consumes
//! spans from an injected classifier. The engine calls it with text that has
//! already been pattern-redacted, so structural matches never reach the NER
//! backend.

use crate::error::Result;
use crate::scrub::ScrubCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Named-entity category recognized by the classifier capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
}

impl EntityCategory {
    pub fn scrub_category(&self) -> ScrubCategory {
        match self {
            Self::Person => ScrubCategory::Person,
            Self::Organization => ScrubCategory::Organization,
            Self::Location => ScrubCategory::Location,
        }
    }
}

/// One entity span returned by the classifier.
///
/// `start`/`end` are byte offsets into the text the classifier was given.
/// Spans with out-of-range or non-boundary offsets are discarded by the
/// engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySpan {
    pub category: EntityCategory,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Pluggable named-entity recognition backend.
#[async_trait]
pub trait EntityClassifier: Send + Sync {
    /// Extract entity spans from `text`.
    ///
    /// An error puts the redaction engine into an explicit pattern-only
    /// degraded mode; it is never fatal to the scan.
    async fn extract_entities(&self, text: &str) -> Result<Vec<EntitySpan>>;
}
