//! Compliance verdict types

use serde::{Deserialize, Serialize};

/// Outcome of the compliance-judgment step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Valid,
    Flagged,
    Rejected,
    Cancelled,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::Flagged => write!(f, "FLAGGED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Tolerant verdict parse: case-insensitive, accepts the single-L spelling
/// of cancelled.
pub fn parse_verdict(s: &str) -> Option<Verdict> {
    match s.trim().to_ascii_uppercase().as_str() {
        "VALID" => Some(Verdict::Valid),
        "FLAGGED" => Some(Verdict::Flagged),
        "REJECTED" => Some(Verdict::Rejected),
        "CANCELLED" | "CANCELED" => Some(Verdict::Cancelled),
        _ => None,
    }
}

/// A complete compliance judgment. Always produced for a processed
/// transaction — the constructors below cover every failure class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditVerdict {
    pub verdict: Verdict,
    /// Compliance score in [0.0, 1.0]
    pub score: f64,
    pub reasoning: String,
}

impl AuditVerdict {
    pub fn new(verdict: Verdict, score: f64, reasoning: impl Into<String>) -> Self {
        Self {
            verdict,
            score: score.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
        }
    }

    /// Substitute when the judgment capability is missing or unreachable.
    /// Explicitly labeled so downstream consumers can tell it apart from a
    /// real judgment.
    pub fn unavailable() -> Self {
        Self::new(
            Verdict::Valid,
            0.95,
            "MOCK VERDICT: judgment capability unavailable, payload assumed valid",
        )
    }

    /// Fail-secure substitute for unparsable or schema-violating judge
    /// output. Echoes a truncated form of the bad output.
    pub fn malformed(raw: &str) -> Self {
        Self::new(
            Verdict::Flagged,
            0.0,
            format!(
                "judgment output failed validation; raw output: {}",
                truncate(raw, 100)
            ),
        )
    }

    /// Short-circuit verdict for payloads matching the prompt-injection
    /// heuristic.
    pub fn injection_rejected() -> Self {
        Self::new(
            Verdict::Rejected,
            0.0,
            "prompt-injection pattern detected in payload",
        )
    }

    /// Terminal verdict for a user-cancelled transaction.
    pub fn cancelled() -> Self {
        Self::new(Verdict::Cancelled, 0.0, "request cancelled by user")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Verdict::Flagged).unwrap(),
            r#""FLAGGED""#
        );
        assert_eq!(Verdict::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn test_parse_verdict_tolerant() {
        assert_eq!(parse_verdict("valid"), Some(Verdict::Valid));
        assert_eq!(parse_verdict(" REJECTED "), Some(Verdict::Rejected));
        assert_eq!(parse_verdict("Canceled"), Some(Verdict::Cancelled));
        assert_eq!(parse_verdict("maybe"), None);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(AuditVerdict::new(Verdict::Valid, 1.7, "x").score, 1.0);
        assert_eq!(AuditVerdict::new(Verdict::Valid, -0.3, "x").score, 0.0);
    }

    #[test]
    fn test_unavailable_is_labeled_mock() {
        let v = AuditVerdict::unavailable();
        assert_eq!(v.verdict, Verdict::Valid);
        assert!(v.reasoning.contains("MOCK"));
    }

    #[test]
    fn test_malformed_is_fail_secure() {
        let v = AuditVerdict::malformed("garbage output");
        assert_eq!(v.verdict, Verdict::Flagged);
        assert_eq!(v.score, 0.0);
        assert!(v.reasoning.contains("garbage output"));
    }

    #[test]
    fn test_malformed_truncates_long_output() {
        let raw = "z".repeat(500);
        let v = AuditVerdict::malformed(&raw);
        assert!(v.reasoning.len() < 200);
        assert!(v.reasoning.ends_with("..."));
    }
}
