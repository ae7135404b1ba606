//! C1: atomic counters per named security event kind.

use std::sync::atomic::{AtomicU64, Ordering};

/// Closed enumeration of everything the pipeline counts.
///
/// Mirrors [`crate::error::ValidationError::event_name`] plus a few
/// events-only kinds (`UsedRetiredKey`, `CryptoInternalError`, `NotModified`,
/// `CacheHit`, `CacheMiss`, `CacheEviction`) that never surface as an error
/// on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    TokenEmpty,
    TokenTooLarge,
    InvalidStructure,
    Base64Invalid,
    JsonParseFailed,
    PartTooLarge,
    JsonLimitExceeded,
    UnsupportedAlgorithm,
    AlgorithmExplicitlyRejected,
    UnexpectedTokenType,
    KidRequired,
    AlgorithmKeyMismatch,
    KeyNotFound,
    UsedRetiredKey,
    JwksFetchFailed,
    JwksRefreshFailed,
    JwksContentSizeExceeded,
    JwksJsonParseFailed,
    RsaKeyTooSmall,
    UnsupportedCurve,
    SignatureInvalid,
    CryptoInternalError,
    TokenExpired,
    TokenNotYetValid,
    IssuerMismatch,
    AudienceMismatch,
    AudienceMissing,
    AuthorizedPartyMismatch,
    SubjectMissing,
    MissingMandatoryClaim,
    ClaimOutOfRange,
    ScopeMissing,
    RoleMissing,
    GroupMissing,
    NoIssuerConfig,
    IssuerDiscoveryMismatch,
    InternalCacheError,
    NotModified,
    CacheHit,
    CacheMiss,
    CacheEviction,
    ValidationSucceeded,
}

const EVENT_COUNT: usize = 42;

impl EventKind {
    fn index(self) -> usize {
        // Stable, hand-maintained index — not derived from discriminant
        // values so reordering the enum above never silently changes the
        // slot an already-running process is incrementing.
        match self {
            Self::TokenEmpty => 0,
            Self::TokenTooLarge => 1,
            Self::InvalidStructure => 2,
            Self::Base64Invalid => 3,
            Self::JsonParseFailed => 4,
            Self::PartTooLarge => 5,
            Self::JsonLimitExceeded => 6,
            Self::UnsupportedAlgorithm => 7,
            Self::AlgorithmExplicitlyRejected => 8,
            Self::UnexpectedTokenType => 9,
            Self::KidRequired => 10,
            Self::AlgorithmKeyMismatch => 11,
            Self::KeyNotFound => 12,
            Self::UsedRetiredKey => 13,
            Self::JwksFetchFailed => 14,
            Self::JwksRefreshFailed => 15,
            Self::JwksContentSizeExceeded => 16,
            Self::JwksJsonParseFailed => 17,
            Self::RsaKeyTooSmall => 18,
            Self::UnsupportedCurve => 19,
            Self::SignatureInvalid => 20,
            Self::CryptoInternalError => 21,
            Self::TokenExpired => 22,
            Self::TokenNotYetValid => 23,
            Self::IssuerMismatch => 24,
            Self::AudienceMismatch => 25,
            Self::AudienceMissing => 26,
            Self::AuthorizedPartyMismatch => 27,
            Self::SubjectMissing => 28,
            Self::MissingMandatoryClaim => 29,
            Self::ClaimOutOfRange => 30,
            Self::ScopeMissing => 31,
            Self::RoleMissing => 32,
            Self::GroupMissing => 33,
            Self::NoIssuerConfig => 34,
            Self::IssuerDiscoveryMismatch => 35,
            Self::InternalCacheError => 36,
            Self::NotModified => 37,
            Self::CacheHit => 38,
            Self::CacheMiss => 39,
            Self::CacheEviction => 40,
            Self::ValidationSucceeded => 41,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TokenEmpty => "TokenEmpty",
            Self::TokenTooLarge => "TokenTooLarge",
            Self::InvalidStructure => "InvalidStructure",
            Self::Base64Invalid => "Base64Invalid",
            Self::JsonParseFailed => "JsonParseFailed",
            Self::PartTooLarge => "PartTooLarge",
            Self::JsonLimitExceeded => "JsonLimitExceeded",
            Self::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            Self::AlgorithmExplicitlyRejected => "AlgorithmExplicitlyRejected",
            Self::UnexpectedTokenType => "UnexpectedTokenType",
            Self::KidRequired => "KidRequired",
            Self::AlgorithmKeyMismatch => "AlgorithmKeyMismatch",
            Self::KeyNotFound => "KeyNotFound",
            Self::UsedRetiredKey => "UsedRetiredKey",
            Self::JwksFetchFailed => "JwksFetchFailed",
            Self::JwksRefreshFailed => "JwksRefreshFailed",
            Self::JwksContentSizeExceeded => "JwksContentSizeExceeded",
            Self::JwksJsonParseFailed => "JwksJsonParseFailed",
            Self::RsaKeyTooSmall => "RsaKeyTooSmall",
            Self::UnsupportedCurve => "UnsupportedCurve",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::CryptoInternalError => "CryptoInternalError",
            Self::TokenExpired => "TokenExpired",
            Self::TokenNotYetValid => "TokenNotYetValid",
            Self::IssuerMismatch => "IssuerMismatch",
            Self::AudienceMismatch => "AudienceMismatch",
            Self::AudienceMissing => "AudienceMissing",
            Self::AuthorizedPartyMismatch => "AuthorizedPartyMismatch",
            Self::SubjectMissing => "SubjectMissing",
            Self::MissingMandatoryClaim => "MissingMandatoryClaim",
            Self::ClaimOutOfRange => "ClaimOutOfRange",
            Self::ScopeMissing => "ScopeMissing",
            Self::RoleMissing => "RoleMissing",
            Self::GroupMissing => "GroupMissing",
            Self::NoIssuerConfig => "NoIssuerConfig",
            Self::IssuerDiscoveryMismatch => "IssuerDiscoveryMismatch",
            Self::InternalCacheError => "InternalCacheError",
            Self::NotModified => "NotModified",
            Self::CacheHit => "CacheHit",
            Self::CacheMiss => "CacheMiss",
            Self::CacheEviction => "CacheEviction",
            Self::ValidationSucceeded => "ValidationSucceeded",
        }
    }

    fn all() -> &'static [EventKind] {
        use EventKind::*;
        &[
            TokenEmpty, TokenTooLarge, InvalidStructure, Base64Invalid, JsonParseFailed,
            PartTooLarge, JsonLimitExceeded, UnsupportedAlgorithm, AlgorithmExplicitlyRejected,
            UnexpectedTokenType, KidRequired, AlgorithmKeyMismatch, KeyNotFound, UsedRetiredKey,
            JwksFetchFailed, JwksRefreshFailed, JwksContentSizeExceeded, JwksJsonParseFailed,
            RsaKeyTooSmall, UnsupportedCurve, SignatureInvalid, CryptoInternalError, TokenExpired,
            TokenNotYetValid, IssuerMismatch, AudienceMismatch, AudienceMissing,
            AuthorizedPartyMismatch, SubjectMissing, MissingMandatoryClaim, ClaimOutOfRange,
            ScopeMissing, RoleMissing, GroupMissing, NoIssuerConfig, IssuerDiscoveryMismatch,
            InternalCacheError, NotModified, CacheHit, CacheMiss, CacheEviction,
            ValidationSucceeded,
        ]
    }
}

/// Lock-free counters, one atomic slot per [`EventKind`].
///
/// Constructed once per `TokenValidator` and passed down as an explicit
/// collaborator — per SPEC_FULL.md's design note against global singleton
/// counters.
pub struct SecurityEventCounter {
    slots: Box<[AtomicU64; EVENT_COUNT]>,
}

impl Default for SecurityEventCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityEventCounter {
    pub fn new() -> Self {
        Self { slots: Box::new(std::array::from_fn(|_| AtomicU64::new(0))) }
    }

    pub fn increment(&self, kind: EventKind) {
        self.slots[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, kind: EventKind) -> u64 {
        self.slots[kind.index()].load(Ordering::Relaxed)
    }

    /// Snapshot of every non-zero counter, keyed by event name.
    pub fn snapshot(&self) -> std::collections::HashMap<&'static str, u64> {
        EventKind::all()
            .iter()
            .map(|&k| (k.name(), self.get(k)))
            .filter(|(_, v)| *v > 0)
            .collect()
    }

    /// Resets every counter to zero. Intended for test harnesses and
    /// operator-triggered metrics resets, not for normal pipeline use.
    pub fn reset(&self) {
        for slot in self.slots.iter() {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_independent_per_kind() {
        let counters = SecurityEventCounter::new();
        counters.increment(EventKind::TokenExpired);
        counters.increment(EventKind::TokenExpired);
        counters.increment(EventKind::SignatureInvalid);
        assert_eq!(counters.get(EventKind::TokenExpired), 2);
        assert_eq!(counters.get(EventKind::SignatureInvalid), 1);
        assert_eq!(counters.get(EventKind::TokenEmpty), 0);
    }

    #[test]
    fn reset_clears_all_counters() {
        let counters = SecurityEventCounter::new();
        counters.increment(EventKind::CacheHit);
        counters.reset();
        assert_eq!(counters.get(EventKind::CacheHit), 0);
    }

    #[test]
    fn snapshot_only_includes_nonzero() {
        let counters = SecurityEventCounter::new();
        counters.increment(EventKind::CacheMiss);
        let snap = counters.snapshot();
        assert_eq!(snap.get("CacheMiss"), Some(&1));
        assert!(snap.get("CacheHit").is_none());
    }
}
