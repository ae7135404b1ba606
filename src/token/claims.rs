//! C13: ordered, fail-fast claim checks (`exp`, `nbf`, `iss`, `aud`, `azp`,
//! `sub`, scopes/roles/groups) against a single captured instant, so two
//! claims are never judged against two different notions of "now".

use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::{IssuerConfig, TokenKind};
use crate::error::ValidationError;

pub struct ClaimValidator;

impl ClaimValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        payload: &Map<String, Value>,
        issuer: &IssuerConfig,
        kind: TokenKind,
        now: i64,
        clock_skew_leeway: Duration,
        nbf_future_tolerance: Duration,
    ) -> Result<(), ValidationError> {
        let leeway = clock_skew_leeway.as_secs() as i64;
        let tolerance = nbf_future_tolerance.as_secs() as i64;

        if let Some(exp) = optional_i64(payload, "exp")? {
            if now - leeway >= exp {
                return Err(ValidationError::TokenExpired { exp, now });
            }
        }

        if let Some(nbf) = optional_i64(payload, "nbf")? {
            if nbf - now > leeway + tolerance {
                return Err(ValidationError::TokenNotYetValid { nbf, now });
            }
        }

        if let Some(expected) = issuer.issuer_identifier.as_deref() {
            let actual = payload.get("iss").and_then(Value::as_str).unwrap_or_default();
            if actual != expected {
                return Err(ValidationError::IssuerMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        if !issuer.expected_audience.is_empty() {
            let token_aud = claim_as_string_set(payload.get("aud"));
            match token_aud {
                None => return Err(ValidationError::AudienceMissing),
                Some(aud) if aud.is_disjoint(&issuer.expected_audience) => {
                    return Err(ValidationError::AudienceMismatch)
                }
                _ => {}
            }
        }

        if let Some(expected) = issuer.expected_client_id.as_deref() {
            if let Some(azp) = payload.get("azp").and_then(Value::as_str) {
                if azp != expected {
                    return Err(ValidationError::AuthorizedPartyMismatch {
                        expected: expected.to_string(),
                        actual: azp.to_string(),
                    });
                }
            }
        }

        if !issuer.sub_optional_for.contains(&kind) && payload.get("sub").and_then(Value::as_str).is_none() {
            return Err(ValidationError::SubjectMissing);
        }

        let granted_scopes = scope_set(payload);
        for scope in &issuer.required_scopes {
            if !granted_scopes.contains(scope.as_str()) {
                return Err(ValidationError::ScopeMissing { scope: scope.clone() });
            }
        }

        let granted_roles = claim_as_string_set(payload.get("roles")).unwrap_or_default();
        for role in &issuer.required_roles {
            if !granted_roles.contains(role.as_str()) {
                return Err(ValidationError::RoleMissing { role: role.clone() });
            }
        }

        let granted_groups = claim_as_string_set(payload.get("groups")).unwrap_or_default();
        for group in &issuer.required_groups {
            if !granted_groups.contains(group.as_str()) {
                return Err(ValidationError::GroupMissing { group: group.clone() });
            }
        }

        Ok(())
    }
}

fn optional_i64(payload: &Map<String, Value>, claim: &'static str) -> Result<Option<i64>, ValidationError> {
    match payload.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            n.as_i64().map(Some).ok_or(ValidationError::ClaimOutOfRange { claim })
        }
        Some(_) => Err(ValidationError::ClaimOutOfRange { claim }),
    }
}

/// `aud` and `roles`/`groups` may be a single string or an array of strings.
fn claim_as_string_set(value: Option<&Value>) -> Option<std::collections::HashSet<String>> {
    match value {
        Some(Value::String(s)) => Some([s.clone()].into_iter().collect()),
        Some(Value::Array(items)) => {
            Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        }
        _ => None,
    }
}

/// `scope` is a single space-delimited string per RFC 8693; `scp` (as used by
/// some providers) is an array. Both are accepted and merged.
fn scope_set(payload: &Map<String, Value>) -> std::collections::HashSet<String> {
    let mut set = std::collections::HashSet::new();
    if let Some(Value::String(scope)) = payload.get("scope") {
        set.extend(scope.split_whitespace().map(str::to_string));
    }
    if let Some(scp) = claim_as_string_set(payload.get("scp")) {
        set.extend(scp);
    }
    set
}
