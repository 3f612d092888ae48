//! Effective policy resolution
//!
//! One `ScrubPolicy` is built per request by layering three sources:
//! safe defaults (every category enabled), then the owner's stored profile
//! overlay, then the request-level overlay. The request wins per field, not
//! all-or-nothing, and an unset field always falls through to "redact" —
//! absence of a flag never means "don't redact".

use crate::error::Result;
use crate::scrub::ScrubCategory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Merged, per-request redaction ruleset. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrubPolicy {
    pub redact_email: bool,
    pub redact_phone: bool,
    pub redact_payment_card: bool,
    pub redact_government_id: bool,
    pub redact_credential: bool,
    pub redact_person: bool,
    pub redact_organization: bool,
    pub redact_location: bool,
    /// Case-insensitive exact-substring keywords, in caller order
    pub custom_keywords: Vec<String>,
    /// Free-text instruction forwarded to the compliance judge
    pub audit_instruction: Option<String>,
}

impl ScrubPolicy {
    /// All categories enabled, no keywords, no instruction.
    pub fn safe_default() -> Self {
        Self {
            redact_email: true,
            redact_phone: true,
            redact_payment_card: true,
            redact_government_id: true,
            redact_credential: true,
            redact_person: true,
            redact_organization: true,
            redact_location: true,
            custom_keywords: Vec::new(),
            audit_instruction: None,
        }
    }

    /// Whether a category participates in scanning under this policy.
    /// Custom keywords are always scanned.
    pub fn enabled(&self, category: ScrubCategory) -> bool {
        match category {
            ScrubCategory::Email => self.redact_email,
            ScrubCategory::Phone => self.redact_phone,
            ScrubCategory::PaymentCard => self.redact_payment_card,
            ScrubCategory::GovernmentId => self.redact_government_id,
            ScrubCategory::Credential => self.redact_credential,
            ScrubCategory::Person => self.redact_person,
            ScrubCategory::Organization => self.redact_organization,
            ScrubCategory::Location => self.redact_location,
            ScrubCategory::CustomKeyword => true,
        }
    }
}

impl Default for ScrubPolicy {
    fn default() -> Self {
        Self::safe_default()
    }
}

/// Partial policy from one layer (stored profile or request override).
/// Unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverlay {
    pub redact_email: Option<bool>,
    pub redact_phone: Option<bool>,
    pub redact_payment_card: Option<bool>,
    pub redact_government_id: Option<bool>,
    pub redact_credential: Option<bool>,
    pub redact_person: Option<bool>,
    pub redact_organization: Option<bool>,
    pub redact_location: Option<bool>,
    pub custom_keywords: Option<Vec<String>>,
    pub audit_instruction: Option<String>,
}

impl PolicyOverlay {
    fn apply(&self, base: &mut ScrubPolicy) {
        if let Some(v) = self.redact_email {
            base.redact_email = v;
        }
        if let Some(v) = self.redact_phone {
            base.redact_phone = v;
        }
        if let Some(v) = self.redact_payment_card {
            base.redact_payment_card = v;
        }
        if let Some(v) = self.redact_government_id {
            base.redact_government_id = v;
        }
        if let Some(v) = self.redact_credential {
            base.redact_credential = v;
        }
        if let Some(v) = self.redact_person {
            base.redact_person = v;
        }
        if let Some(v) = self.redact_organization {
            base.redact_organization = v;
        }
        if let Some(v) = self.redact_location {
            base.redact_location = v;
        }
        if let Some(v) = &self.custom_keywords {
            base.custom_keywords = v.clone();
        }
        if let Some(v) = &self.audit_instruction {
            base.audit_instruction = Some(v.clone());
        }
    }
}

/// Merge request and profile overlays over the safe default.
pub fn resolve(request: Option<&PolicyOverlay>, profile: Option<&PolicyOverlay>) -> ScrubPolicy {
    let mut policy = ScrubPolicy::safe_default();
    if let Some(overlay) = profile {
        overlay.apply(&mut policy);
    }
    if let Some(overlay) = request {
        overlay.apply(&mut policy);
    }
    policy
}

/// Read-only source of stored profile configuration.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the active overlay for an owner, if any.
    async fn active_overlay(&self, owner: &str) -> Result<Option<PolicyOverlay>>;
}

/// Resolves the effective policy for a request. Never fails: a profile
/// fetch error falls back to the remaining layers.
pub struct PolicyResolver {
    profiles: Option<Arc<dyn ProfileSource>>,
}

impl PolicyResolver {
    pub fn new(profiles: Option<Arc<dyn ProfileSource>>) -> Self {
        Self { profiles }
    }

    pub async fn effective(
        &self,
        owner: Option<&str>,
        request: Option<&PolicyOverlay>,
    ) -> ScrubPolicy {
        let profile = match (&self.profiles, owner) {
            (Some(source), Some(owner)) => match source.active_overlay(owner).await {
                Ok(overlay) => overlay,
                Err(e) => {
                    tracing::warn!(owner = %owner, error = %e, "profile fetch failed, using safe defaults");
                    None
                }
            },
            _ => None,
        };
        resolve(request, profile.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_safe_default_all_enabled() {
        let policy = ScrubPolicy::safe_default();
        for category in [
            ScrubCategory::Email,
            ScrubCategory::Phone,
            ScrubCategory::PaymentCard,
            ScrubCategory::GovernmentId,
            ScrubCategory::Credential,
            ScrubCategory::Person,
            ScrubCategory::Organization,
            ScrubCategory::Location,
            ScrubCategory::CustomKeyword,
        ] {
            assert!(policy.enabled(category), "{} should default on", category);
        }
        assert!(policy.custom_keywords.is_empty());
    }

    #[test]
    fn test_profile_overlay_applies() {
        let profile = PolicyOverlay {
            redact_location: Some(false),
            custom_keywords: Some(vec!["orion".to_string()]),
            ..Default::default()
        };
        let policy = resolve(None, Some(&profile));
        assert!(!policy.redact_location);
        assert!(policy.redact_email);
        assert_eq!(policy.custom_keywords, vec!["orion"]);
    }

    #[test]
    fn test_request_wins_per_field() {
        let profile = PolicyOverlay {
            redact_email: Some(false),
            redact_phone: Some(false),
            ..Default::default()
        };
        let request = PolicyOverlay {
            redact_email: Some(true),
            ..Default::default()
        };
        let policy = resolve(Some(&request), Some(&profile));
        // Request re-enabled email; phone keeps the profile's value.
        assert!(policy.redact_email);
        assert!(!policy.redact_phone);
    }

    #[test]
    fn test_unset_field_stays_enabled() {
        let request = PolicyOverlay {
            redact_person: Some(false),
            ..Default::default()
        };
        let policy = resolve(Some(&request), None);
        assert!(!policy.redact_person);
        assert!(policy.redact_credential);
    }

    #[test]
    fn test_request_instruction_overrides_profile() {
        let profile = PolicyOverlay {
            audit_instruction: Some("profile rules".to_string()),
            ..Default::default()
        };
        let request = PolicyOverlay {
            audit_instruction: Some("request rules".to_string()),
            ..Default::default()
        };
        let policy = resolve(Some(&request), Some(&profile));
        assert_eq!(policy.audit_instruction.as_deref(), Some("request rules"));

        let policy = resolve(None, Some(&profile));
        assert_eq!(policy.audit_instruction.as_deref(), Some("profile rules"));
    }

    struct FailingProfiles;

    #[async_trait]
    impl ProfileSource for FailingProfiles {
        async fn active_overlay(&self, _owner: &str) -> Result<Option<PolicyOverlay>> {
            Err(Error::Upstream("profile backend offline".to_string()))
        }
    }

    struct StaticProfiles(PolicyOverlay);

    #[async_trait]
    impl ProfileSource for StaticProfiles {
        async fn active_overlay(&self, _owner: &str) -> Result<Option<PolicyOverlay>> {
            Ok(Some(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_resolver_fetch_error_falls_back() {
        let resolver = PolicyResolver::new(Some(Arc::new(FailingProfiles)));
        let policy = resolver.effective(Some("user-1"), None).await;
        assert_eq!(policy, ScrubPolicy::safe_default());
    }

    #[tokio::test]
    async fn test_resolver_layers_profile_and_request() {
        let resolver = PolicyResolver::new(Some(Arc::new(StaticProfiles(PolicyOverlay {
            redact_organization: Some(false),
            redact_phone: Some(false),
            ..Default::default()
        }))));
        let request = PolicyOverlay {
            redact_phone: Some(true),
            ..Default::default()
        };
        let policy = resolver.effective(Some("user-1"), Some(&request)).await;
        assert!(!policy.redact_organization);
        assert!(policy.redact_phone);
    }

    #[tokio::test]
    async fn test_resolver_without_owner_skips_profile() {
        let resolver = PolicyResolver::new(Some(Arc::new(StaticProfiles(PolicyOverlay {
            redact_email: Some(false),
            ..Default::default()
        }))));
        let policy = resolver.effective(None, None).await;
        assert!(policy.redact_email);
    }

    #[test]
    fn test_overlay_deserialize_partial_json() {
        let overlay: PolicyOverlay =
            serde_json::from_str(r#"{"redact_email": false, "custom_keywords": ["x"]}"#).unwrap();
        assert_eq!(overlay.redact_email, Some(false));
        assert_eq!(overlay.redact_phone, None);
        assert_eq!(overlay.custom_keywords.as_deref(), Some(&["x".to_string()][..]));
    }
}
