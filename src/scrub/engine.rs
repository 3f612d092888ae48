//! Contextual redaction engine
//!
//! Combines the pattern scanner with the entity classifier capability and
//! decides, per candidate, whether it is actually rewritten:
//!
//! 1. Pattern pass over the raw text (structural categories + keywords).
//! 2. Entity pass over the pattern-redacted text. Candidates in a fixed
//!    public-entity whitelist are suppressed unless the preceding context
//!    looks personal; location candidates are suppressed entirely outside
//!    personal context.
//!
//! The engine recurses over structured payloads, scrubbing every string
//! leaf independently. It has no failure mode of its own: a failing entity
//! capability degrades the scan to pattern-only results, observably.

use crate::error::Result;
use crate::policy::ScrubPolicy;
use crate::scrub::entity::EntityClassifier;
use crate::scrub::patterns::{
    make_hit, swap_value, Hit, PatternScan, PatternScanner, ScrubCategory, ScrubMode,
};
use serde_json::Value;
use std::sync::Arc;

/// Exact-text whitelist of well-known public entities (lowercase).
/// Suppressed unless the surrounding context is personal.
const PUBLIC_WHITELIST: &[&str] = &[
    "google",
    "apple",
    "microsoft",
    "amazon",
    "meta",
    "nvidia",
    "openai",
    "london",
    "paris",
    "madrid",
    "new york",
    "mumbai",
    "tokyo",
    "berlin",
    "python",
    "javascript",
    "rust",
    "elon musk",
    "bill gates",
    "steve jobs",
];

/// Trigger phrases marking personal context when found in the 50 characters
/// preceding a candidate.
const PERSONAL_TRIGGERS: &[&str] = &[
    "my",
    "live",
    "living",
    "staying",
    "home",
    "house",
    "address",
    "born",
    "from",
    "stay at",
    "stay in",
    "call me",
    "name is",
    "reside",
    "apartment",
    "landmark",
    "work at",
    "office",
];

/// How far back the personal-context heuristic looks, in characters.
const CONTEXT_WINDOW_CHARS: usize = 50;

/// Result of scrubbing one text value.
#[derive(Debug, Clone)]
pub struct TextScrub {
    pub text: String,
    pub hits: Vec<Hit>,
    /// True when a configured entity classifier failed and the scan fell
    /// back to pattern-only detection.
    pub degraded: bool,
}

/// Result of scrubbing a structured payload.
#[derive(Debug, Clone)]
pub struct ValueScrub {
    pub value: Value,
    pub hits: Vec<Hit>,
    pub degraded: bool,
}

impl ValueScrub {
    pub fn has_sensitive_data(&self) -> bool {
        !self.hits.is_empty()
    }
}

/// The contextual redaction engine.
pub struct ScrubEngine {
    patterns: PatternScanner,
    entities: Option<Arc<dyn EntityClassifier>>,
}

impl ScrubEngine {
    /// Build an engine. Without a classifier the engine is pattern-only by
    /// construction and does not report itself degraded.
    pub fn new(entities: Option<Arc<dyn EntityClassifier>>) -> Result<Self> {
        Ok(Self {
            patterns: PatternScanner::new()?,
            entities,
        })
    }

    /// Label for receipts and trail metadata.
    pub fn describe(&self, degraded: bool) -> &'static str {
        if self.entities.is_some() && !degraded {
            "patterns+entities"
        } else {
            "patterns-only"
        }
    }

    /// Scrub a single text value.
    pub async fn scrub_text(&self, text: &str, policy: &ScrubPolicy, mode: ScrubMode) -> TextScrub {
        let PatternScan {
            text: mut working,
            mut hits,
        } = self.patterns.scan(text, policy, mode);

        let mut degraded = false;

        if let Some(classifier) = &self.entities {
            match classifier.extract_entities(&working).await {
                Ok(spans) => {
                    let entity_hits =
                        self.apply_entities(spans, &mut working, text, policy, mode);
                    hits.extend(entity_hits);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "entity classifier unavailable, falling back to pattern-only scan"
                    );
                    degraded = true;
                }
            }
        }

        TextScrub {
            text: working,
            hits,
            degraded,
        }
    }

    /// Scrub a structured payload, recursing into every string leaf.
    /// Non-string scalars pass through unchanged.
    pub async fn scrub_value(
        &self,
        value: &Value,
        policy: &ScrubPolicy,
        mode: ScrubMode,
    ) -> ValueScrub {
        match value {
            Value::String(text) => {
                let scrub = self.scrub_text(text, policy, mode).await;
                ValueScrub {
                    value: Value::String(scrub.text),
                    hits: scrub.hits,
                    degraded: scrub.degraded,
                }
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                let mut hits = Vec::new();
                let mut degraded = false;
                for (key, item) in map {
                    let scrub = Box::pin(self.scrub_value(item, policy, mode)).await;
                    out.insert(key.clone(), scrub.value);
                    hits.extend(scrub.hits);
                    degraded |= scrub.degraded;
                }
                ValueScrub {
                    value: Value::Object(out),
                    hits,
                    degraded,
                }
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                let mut hits = Vec::new();
                let mut degraded = false;
                for item in items {
                    let scrub = Box::pin(self.scrub_value(item, policy, mode)).await;
                    out.push(scrub.value);
                    hits.extend(scrub.hits);
                    degraded |= scrub.degraded;
                }
                ValueScrub {
                    value: Value::Array(out),
                    hits,
                    degraded,
                }
            }
            other => ValueScrub {
                value: other.clone(),
                hits: Vec::new(),
                degraded: false,
            },
        }
    }

    /// Apply whitelist/trigger heuristics to entity spans and rewrite the
    /// survivors. Replacements run in descending offset order so earlier
    /// offsets stay valid; swap values key off the original input text.
    fn apply_entities(
        &self,
        spans: Vec<crate::scrub::entity::EntitySpan>,
        working: &mut String,
        original_text: &str,
        policy: &ScrubPolicy,
        mode: ScrubMode,
    ) -> Vec<Hit> {
        let snapshot = working.clone();
        let lines: Vec<&str> = snapshot.split('\n').collect();

        // Discard malformed spans, then drop overlaps (first span wins).
        let mut spans: Vec<_> = spans
            .into_iter()
            .filter(|s| {
                s.start < s.end
                    && s.end <= snapshot.len()
                    && snapshot.is_char_boundary(s.start)
                    && snapshot.is_char_boundary(s.end)
            })
            .collect();
        spans.sort_by_key(|s| s.start);
        let mut kept: Vec<crate::scrub::entity::EntitySpan> = Vec::with_capacity(spans.len());
        for span in spans {
            if kept.last().map_or(true, |prev| span.start >= prev.end) {
                kept.push(span);
            }
        }

        let mut hits = Vec::new();
        for span in kept.iter().rev() {
            let category = span.category.scrub_category();
            if !policy.enabled(category) {
                continue;
            }

            let span_text = &snapshot[span.start..span.end];
            let personal = personal_context(&snapshot, span.start);

            if !personal
                && PUBLIC_WHITELIST
                    .iter()
                    .any(|w| w.eq_ignore_ascii_case(span_text))
            {
                continue;
            }
            if category == ScrubCategory::Location && !personal {
                continue;
            }

            hits.push(make_hit(
                category, span_text, span.start, span.end, &snapshot, &lines,
            ));

            let replacement = match mode {
                ScrubMode::Redact => category.placeholder(),
                ScrubMode::Swap => swap_value(category, original_text).to_string(),
            };
            working.replace_range(span.start..span.end, &replacement);
        }

        hits.sort_by_key(|h| h.start);
        hits
    }
}

/// Whether the up-to-50-character prefix before `offset` contains a
/// personal trigger phrase.
fn personal_context(text: &str, offset: usize) -> bool {
    let head = &text[..offset];
    let from = head
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let prefix = head[from..].to_lowercase();
    PERSONAL_TRIGGERS.iter().any(|t| prefix.contains(t))
}
