//! C11: header policy — algorithm allow-list membership, explicit `none`
//! rejection, `typ` checking, and `kid` resolution.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::Algorithm;
use crate::error::ValidationError;

/// The algorithm and key id extracted from a validated header.
#[derive(Debug)]
pub struct HeaderClaims {
    pub alg: Algorithm,
    pub kid: Option<String>,
}

pub struct HeaderValidator;

impl HeaderValidator {
    /// Validates `header` against the issuer's `allowed_algorithms`.
    ///
    /// `candidate_key_count` is the number of keys currently available from
    /// the issuer's key set — used only to decide whether a missing `kid` is
    /// tolerable (exactly one candidate key means there is no ambiguity).
    pub fn validate(
        header: &Map<String, Value>,
        allowed_algorithms: &HashSet<Algorithm>,
        candidate_key_count: usize,
    ) -> Result<HeaderClaims, ValidationError> {
        let alg_raw = header
            .get("alg")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingMandatoryClaim { claim: "alg" })?;

        if alg_raw.eq_ignore_ascii_case("none") {
            return Err(ValidationError::AlgorithmExplicitlyRejected);
        }

        let alg = Algorithm::from_str(alg_raw)
            .ok_or_else(|| ValidationError::UnsupportedAlgorithm { alg: alg_raw.to_string() })?;

        if !allowed_algorithms.contains(&alg) {
            return Err(ValidationError::UnsupportedAlgorithm { alg: alg_raw.to_string() });
        }

        if let Some(typ) = header.get("typ").and_then(Value::as_str) {
            if !typ.eq_ignore_ascii_case("JWT") && !typ.eq_ignore_ascii_case("at+jwt") {
                return Err(ValidationError::UnexpectedTokenType { typ: typ.to_string() });
            }
        }

        let kid = header.get("kid").and_then(Value::as_str).map(str::to_string);
        if kid.is_none() && candidate_key_count != 1 {
            return Err(ValidationError::KidRequired);
        }

        Ok(HeaderClaims { alg, kid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allow_all() -> HashSet<Algorithm> {
        [Algorithm::Rs256, Algorithm::Es256, Algorithm::Ps256].into_iter().collect()
    }

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn rejects_none_algorithm_case_insensitively() {
        let header = obj(json!({"alg": "NoNe"}));
        let err = HeaderValidator::validate(&header, &allow_all(), 1).unwrap_err();
        assert_eq!(err, ValidationError::AlgorithmExplicitlyRejected);
    }

    #[test]
    fn rejects_algorithm_outside_allow_list() {
        let header = obj(json!({"alg": "RS512"}));
        let err = HeaderValidator::validate(&header, &allow_all(), 1).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAlgorithm { .. }));
    }

    #[test]
    fn requires_kid_when_multiple_candidates() {
        let header = obj(json!({"alg": "RS256"}));
        let err = HeaderValidator::validate(&header, &allow_all(), 2).unwrap_err();
        assert_eq!(err, ValidationError::KidRequired);
    }

    #[test]
    fn tolerates_missing_kid_with_single_candidate() {
        let header = obj(json!({"alg": "RS256"}));
        let claims = HeaderValidator::validate(&header, &allow_all(), 1).unwrap();
        assert_eq!(claims.kid, None);
    }

    #[test]
    fn rejects_unexpected_typ() {
        let header = obj(json!({"alg": "RS256", "typ": "JWE"}));
        let err = HeaderValidator::validate(&header, &allow_all(), 1).unwrap_err();
        assert!(matches!(err, ValidationError::UnexpectedTokenType { .. }));
    }

    #[test]
    fn accepts_at_plus_jwt_typ() {
        let header = obj(json!({"alg": "RS256", "typ": "at+jwt", "kid": "k1"}));
        let claims = HeaderValidator::validate(&header, &allow_all(), 3).unwrap();
        assert_eq!(claims.kid.as_deref(), Some("k1"));
    }
}
