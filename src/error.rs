//! The closed, stable error surface returned by every public entry point.
//!
//! Every variant name here is part of the public contract: callers match on
//! it, dashboards group by it, and it is never renamed without a major
//! version bump. `Display` renders a human string that never embeds token
//! contents or claim values — only structural facts (sizes, key ids, issuer
//! strings already known to be untrusted input, never signatures or claims).

use thiserror::Error;

/// The stable identifier surface for validation failures.
///
/// Matches the taxonomy verbatim: each arm here is a named event. A handful
/// of events (`UsedRetiredKey`, `CryptoInternalError`) are recorded as
/// [`crate::metrics::EventKind`] counters but never surface directly as this
/// error type — they are folded into a caller-visible sibling
/// (`SignatureInvalid`) so crypto internals never leak past the boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    // --- Structural -----------------------------------------------------
    #[error("token is empty")]
    TokenEmpty,
    #[error("token exceeds maximum size of {max} bytes")]
    TokenTooLarge { max: usize },
    #[error("token is not a valid three-part compact JWS: {reason}")]
    InvalidStructure { reason: &'static str },
    #[error("base64url decoding failed for the {part} part")]
    Base64Invalid { part: &'static str },
    #[error("JSON parsing failed for the {part} part")]
    JsonParseFailed { part: &'static str },
    #[error("decoded {part} part exceeds {max} bytes")]
    PartTooLarge { part: &'static str, max: usize },
    #[error("JSON size limit exceeded while parsing the {part} part")]
    JsonLimitExceeded { part: &'static str },

    // --- Header / algorithm ----------------------------------------------
    #[error("algorithm {alg:?} is not in the allow-list")]
    UnsupportedAlgorithm { alg: String },
    #[error("the \"none\" algorithm is explicitly rejected")]
    AlgorithmExplicitlyRejected,
    #[error("unexpected token type {typ:?}")]
    UnexpectedTokenType { typ: String },
    #[error("token header has no \"kid\" and the key set has more than one candidate key")]
    KidRequired,
    #[error("algorithm {alg:?} requires a {expected} key but the resolved key is {actual}")]
    AlgorithmKeyMismatch {
        alg: String,
        expected: &'static str,
        actual: &'static str,
    },

    // --- Key / JWKS --------------------------------------------------------
    #[error("no usable key found for kid {kid:?}")]
    KeyNotFound { kid: Option<String> },
    #[error("failed to fetch JWKS from {url}: {reason}")]
    JwksFetchFailed { url: String, reason: String },
    #[error("JWKS refresh failed, continuing on the last healthy generation")]
    JwksRefreshFailed,
    #[error("JWKS response exceeded the {max}-byte size limit")]
    JwksContentSizeExceeded { max: usize },
    #[error("failed to parse JWKS document: {reason}")]
    JwksJsonParseFailed { reason: String },
    #[error("RSA key has modulus of {bits} bits, below the minimum of {min} bits")]
    RsaKeyTooSmall { bits: usize, min: usize },
    #[error("unsupported elliptic curve {curve:?}")]
    UnsupportedCurve { curve: String },

    // --- Signature -----------------------------------------------------
    #[error("signature verification failed")]
    SignatureInvalid,

    // --- Claims ----------------------------------------------------------
    #[error("token expired at {exp}, now is {now}")]
    TokenExpired { exp: i64, now: i64 },
    #[error("token not valid until {nbf}, now is {now}")]
    TokenNotYetValid { nbf: i64, now: i64 },
    #[error("issuer mismatch: expected {expected:?}, got {actual:?}")]
    IssuerMismatch { expected: String, actual: String },
    #[error("audience mismatch: token audience did not intersect the expected set")]
    AudienceMismatch,
    #[error("audience claim missing but an audience is required")]
    AudienceMissing,
    #[error("authorized party mismatch: expected {expected:?}, got {actual:?}")]
    AuthorizedPartyMismatch { expected: String, actual: String },
    #[error("subject claim missing")]
    SubjectMissing,
    #[error("mandatory claim {claim:?} missing")]
    MissingMandatoryClaim { claim: &'static str },
    #[error("claim {claim:?} is out of range")]
    ClaimOutOfRange { claim: &'static str },
    #[error("missing required scope {scope:?}")]
    ScopeMissing { scope: String },
    #[error("missing required role {role:?}")]
    RoleMissing { role: String },
    #[error("missing required group {group:?}")]
    GroupMissing { group: String },

    // --- Configuration -----------------------------------------------------
    #[error("no issuer configuration matches this token")]
    NoIssuerConfig,
    #[error("OIDC discovery issuer {discovered:?} does not match the .well-known origin {expected:?}")]
    IssuerDiscoveryMismatch { expected: String, discovered: String },

    // --- Cache internal ----------------------------------------------------
    #[error("internal cache error, bypassing cache for this request")]
    InternalCacheError,
}

impl ValidationError {
    /// The stable event name used for counters and structured logs.
    ///
    /// This mirrors the variant name exactly; kept as a separate method
    /// (rather than relying on `Debug`) so renaming a variant's fields never
    /// silently changes the logged identifier.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::TokenEmpty => "TokenEmpty",
            Self::TokenTooLarge { .. } => "TokenTooLarge",
            Self::InvalidStructure { .. } => "InvalidStructure",
            Self::Base64Invalid { .. } => "Base64Invalid",
            Self::JsonParseFailed { .. } => "JsonParseFailed",
            Self::PartTooLarge { .. } => "PartTooLarge",
            Self::JsonLimitExceeded { .. } => "JsonLimitExceeded",
            Self::UnsupportedAlgorithm { .. } => "UnsupportedAlgorithm",
            Self::AlgorithmExplicitlyRejected => "AlgorithmExplicitlyRejected",
            Self::UnexpectedTokenType { .. } => "UnexpectedTokenType",
            Self::KidRequired => "KidRequired",
            Self::AlgorithmKeyMismatch { .. } => "AlgorithmKeyMismatch",
            Self::KeyNotFound { .. } => "KeyNotFound",
            Self::JwksFetchFailed { .. } => "JwksFetchFailed",
            Self::JwksRefreshFailed => "JwksRefreshFailed",
            Self::JwksContentSizeExceeded { .. } => "JwksContentSizeExceeded",
            Self::JwksJsonParseFailed { .. } => "JwksJsonParseFailed",
            Self::RsaKeyTooSmall { .. } => "RsaKeyTooSmall",
            Self::UnsupportedCurve { .. } => "UnsupportedCurve",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::TokenExpired { .. } => "TokenExpired",
            Self::TokenNotYetValid { .. } => "TokenNotYetValid",
            Self::IssuerMismatch { .. } => "IssuerMismatch",
            Self::AudienceMismatch => "AudienceMismatch",
            Self::AudienceMissing => "AudienceMissing",
            Self::AuthorizedPartyMismatch { .. } => "AuthorizedPartyMismatch",
            Self::SubjectMissing => "SubjectMissing",
            Self::MissingMandatoryClaim { .. } => "MissingMandatoryClaim",
            Self::ClaimOutOfRange { .. } => "ClaimOutOfRange",
            Self::ScopeMissing { .. } => "ScopeMissing",
            Self::RoleMissing { .. } => "RoleMissing",
            Self::GroupMissing { .. } => "GroupMissing",
            Self::NoIssuerConfig => "NoIssuerConfig",
            Self::IssuerDiscoveryMismatch { .. } => "IssuerDiscoveryMismatch",
            Self::InternalCacheError => "InternalCacheError",
        }
    }

    /// Logs this error at the appropriate level with structured fields,
    /// never including token or claim contents.
    pub fn log(&self) {
        match self {
            Self::JwksFetchFailed { url, reason } => {
                tracing::warn!(event = self.event_name(), url = %url, reason = %reason, "jwks fetch failed");
            }
            Self::JwksRefreshFailed => {
                tracing::warn!(event = self.event_name(), "jwks refresh failed, staying on last healthy generation");
            }
            Self::IssuerDiscoveryMismatch { expected, discovered } => {
                tracing::warn!(event = self.event_name(), expected = %expected, discovered = %discovered, "oidc discovery issuer mismatch");
            }
            Self::InternalCacheError => {
                tracing::error!(event = self.event_name(), "validated-token cache error, bypassing cache");
            }
            _ => {
                tracing::debug!(event = self.event_name(), "validation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_matches_taxonomy() {
        assert_eq!(ValidationError::TokenEmpty.event_name(), "TokenEmpty");
        assert_eq!(
            ValidationError::AlgorithmExplicitlyRejected.event_name(),
            "AlgorithmExplicitlyRejected"
        );
        assert_eq!(
            ValidationError::KeyNotFound { kid: Some("k1".into()) }.event_name(),
            "KeyNotFound"
        );
    }

    #[test]
    fn display_never_embeds_raw_token() {
        let err = ValidationError::InvalidStructure { reason: "expected 3 parts, got 2" };
        let rendered = err.to_string();
        assert!(rendered.contains("expected 3 parts"));
    }
}
