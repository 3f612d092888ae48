//! Pattern-based sensitive-data detection
//!
//! Fixed regex detectors for structural categories (email, phone, payment
//! card, government id, credential tokens) plus caller-supplied custom
//! keywords. Scanning is a pure function over the input text: hits are
//! recorded against the original text, while substitutions are applied
//! sequentially to a working copy so a span consumed by one category is not
//! re-replaced by a later one.

use crate::error::{Error, Result};
use crate::policy::ScrubPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Category of a detected sensitive span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubCategory {
    Email,
    Phone,
    PaymentCard,
    GovernmentId,
    Credential,
    CustomKeyword,
    Person,
    Organization,
    Location,
}

impl ScrubCategory {
    /// Uppercase label used inside redaction placeholders.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::PaymentCard => "PAYMENT_CARD",
            Self::GovernmentId => "GOVERNMENT_ID",
            Self::Credential => "CREDENTIAL",
            Self::CustomKeyword => "CUSTOM_KEYWORD",
            Self::Person => "PERSON",
            Self::Organization => "ORGANIZATION",
            Self::Location => "LOCATION",
        }
    }

    /// Placeholder substituted in redact mode.
    ///
    /// Custom keywords get the bare `[REDACTED]` token: naming the category
    /// would leak which keyword list matched.
    pub fn placeholder(&self) -> String {
        match self {
            Self::CustomKeyword => "[REDACTED]".to_string(),
            _ => format!("[{}_REDACTED]", self.label()),
        }
    }
}

impl std::fmt::Display for ScrubCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::PaymentCard => "payment_card",
            Self::GovernmentId => "government_id",
            Self::Credential => "credential",
            Self::CustomKeyword => "custom_keyword",
            Self::Person => "person",
            Self::Organization => "organization",
            Self::Location => "location",
        };
        write!(f, "{}", name)
    }
}

/// Surrounding lines captured for a hit (up to two before and after).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitContext {
    pub before: Vec<String>,
    pub line: String,
    pub after: Vec<String>,
}

/// One detected sensitive span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    /// Category of the match
    pub category: ScrubCategory,
    /// The matched text
    pub value: String,
    /// 1-indexed line number in the scanned text
    pub line: usize,
    /// Two lines of context either side of the match
    pub context: HitContext,
    /// Start byte offset in the scanned text
    pub start: usize,
    /// End byte offset in the scanned text
    pub end: usize,
}

/// Synthetic replacement pools for swap mode, keyed by category.
fn synthetic_pool(category: ScrubCategory) -> &'static [&'static str] {
    match category {
        ScrubCategory::Person => &["Alex", "Jordan", "Taylor", "Morgan", "Casey"],
        ScrubCategory::Organization => &[
            "Acme Corp",
            "Globex",
            "Initech",
            "Umbrella Corp",
            "Stark Ind",
        ],
        ScrubCategory::Location => &["Springfield", "Gotham", "Metropolis", "Atlantis", "Wakanda"],
        ScrubCategory::Email => &["user@example.com", "contact@sample.org", "info@demo.net"],
        ScrubCategory::Phone => &["+1-555-0123", "555-0199", "555-0100"],
        ScrubCategory::CustomKeyword => &["PROJECT_X"],
        _ => &["DATA"],
    }
}

/// Deterministic synthetic pick for swap mode.
///
/// The index is the scanned text's length modulo the pool size, so the same
/// input always swaps to the same output. Two matches of one category in the
/// same text therefore collide on one synthetic value; this is a known,
/// accepted limitation that keeps swaps reproducible.
pub(crate) fn swap_value(category: ScrubCategory, scanned_text: &str) -> &'static str {
    let pool = synthetic_pool(category);
    pool[scanned_text.len() % pool.len()]
}

/// Rewrite mode for matched spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrubMode {
    /// Replace with a bracketed placeholder naming the category
    #[default]
    Redact,
    /// Replace with a deterministic synthetic value
    Swap,
}

/// Compiled fixed detector set.
pub struct PatternScanner {
    rules: Vec<(ScrubCategory, Regex)>,
}

/// Result of one pattern pass: rewritten text plus hits ordered by offset.
#[derive(Debug, Clone)]
pub struct PatternScan {
    pub text: String,
    pub hits: Vec<Hit>,
}

impl PatternScanner {
    /// Compile the fixed detector set.
    pub fn new() -> Result<Self> {
        let table: [(ScrubCategory, &str); 5] = [
            (
                ScrubCategory::Email,
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            ),
            (
                ScrubCategory::Phone,
                r"\b(?:\+?1?[-.]?\(?\d{3}\)?[-.]?)?\d{3}[-.]?\d{4}\b",
            ),
            (ScrubCategory::PaymentCard, r"\b(?:\d{4}[- ]?){3}\d{4}\b"),
            (ScrubCategory::GovernmentId, r"\b\d{3}-\d{2}-\d{4}\b"),
            (ScrubCategory::Credential, r"sk-[a-zA-Z0-9]{20,}"),
        ];

        let rules = table
            .iter()
            .map(|(category, pattern)| {
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::Scrub(format!("invalid detector pattern for {}: {}", category, e))
                })?;
                Ok((*category, regex))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Scan `text`, returning the rewritten text and all hits.
    ///
    /// Custom keywords are matched for every keyword in the policy regardless
    /// of per-category flags; fixed categories honor their flags. A keyword
    /// and a structural pattern may both fire on overlapping text — both
    /// hits are recorded.
    pub fn scan(&self, text: &str, policy: &ScrubPolicy, mode: ScrubMode) -> PatternScan {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut hits = Vec::new();
        let mut rewritten = text.to_string();

        for keyword in &policy.custom_keywords {
            if keyword.is_empty() {
                continue;
            }
            let pattern = format!("(?i){}", regex::escape(keyword));
            let regex = match Regex::new(&pattern) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(keyword = %keyword, error = %e, "skipping uncompilable custom keyword");
                    continue;
                }
            };
            for mat in regex.find_iter(text) {
                hits.push(make_hit(
                    ScrubCategory::CustomKeyword,
                    mat.as_str(),
                    mat.start(),
                    mat.end(),
                    text,
                    &lines,
                ));
            }
            let replacement = match mode {
                ScrubMode::Redact => ScrubCategory::CustomKeyword.placeholder(),
                ScrubMode::Swap => swap_value(ScrubCategory::CustomKeyword, text).to_string(),
            };
            rewritten = regex.replace_all(&rewritten, replacement.as_str()).into_owned();
        }

        for (category, regex) in &self.rules {
            if !policy.enabled(*category) {
                continue;
            }
            for mat in regex.find_iter(text) {
                hits.push(make_hit(
                    *category,
                    mat.as_str(),
                    mat.start(),
                    mat.end(),
                    text,
                    &lines,
                ));
            }
            let replacement = match mode {
                ScrubMode::Redact => category.placeholder(),
                ScrubMode::Swap => swap_value(*category, text).to_string(),
            };
            rewritten = regex.replace_all(&rewritten, replacement.as_str()).into_owned();
        }

        hits.sort_by_key(|h| h.start);

        PatternScan {
            text: rewritten,
            hits,
        }
    }
}

/// 1-indexed line number for a byte offset.
pub(crate) fn line_number(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Context snippet around a 0-indexed line.
pub(crate) fn extract_context(lines: &[&str], line_idx: usize) -> HitContext {
    HitContext {
        before: lines[line_idx.saturating_sub(2)..line_idx]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        line: lines.get(line_idx).map(|s| s.to_string()).unwrap_or_default(),
        after: lines[(line_idx + 1).min(lines.len())..(line_idx + 3).min(lines.len())]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

pub(crate) fn make_hit(
    category: ScrubCategory,
    value: &str,
    start: usize,
    end: usize,
    text: &str,
    lines: &[&str],
) -> Hit {
    let line = line_number(text, start);
    Hit {
        category,
        value: value.to_string(),
        line,
        context: extract_context(lines, line - 1),
        start,
        end,
    }
}
