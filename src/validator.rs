//! C16: the public façade — pipeline orchestration tying every other
//! component together, plus the observability surface (`health`,
//! `counters`, `performance`) and cooperative shutdown.
//!
//! `Drop` calling `shutdown()` defensively mirrors the teacher's
//! `Server`/`Dispatcher` cleanup paths: a caller who forgets to call
//! `shutdown()` explicitly still gets background threads stopped rather than
//! leaked past the validator's own lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::{CacheStats, ValidatedTokenCache};
use crate::config::{TokenKind, ValidatorConfig};
use crate::error::ValidationError;
use crate::issuer::{IssuerEntry, IssuerResolver};
use crate::jwks_loader::{JwksLoader, LoaderHealth};
use crate::metrics::{EventKind, MeasurementType, PerformanceMonitor, PerformanceStats, SecurityEventCounter};
use crate::token::content::{AccessTokenContent, IdTokenContent, RefreshTokenContent};
use crate::token::{ClaimValidator, ClaimView, HeaderValidator, SignatureValidator, TokenDecoder, ValidatedToken};

/// Aggregate health snapshot across every configured issuer.
#[derive(Debug, Clone)]
pub struct ValidatorHealth {
    pub issuers: HashMap<String, LoaderHealth>,
    pub cache: CacheStats,
}

/// The entry point of this crate: a configured, running validation pipeline.
pub struct TokenValidator {
    config: ValidatorConfig,
    issuers: IssuerResolver,
    issuer_names: Vec<(String, Arc<JwksLoader>)>,
    cache: Arc<ValidatedTokenCache>,
    counters: Arc<SecurityEventCounter>,
    perf: PerformanceMonitor,
}

impl TokenValidator {
    pub fn new(config: ValidatorConfig) -> Result<Self, ValidationError> {
        let counters = Arc::new(SecurityEventCounter::new());
        let mut entries = Vec::with_capacity(config.issuers.len());
        let mut issuer_names = Vec::with_capacity(config.issuers.len());

        for issuer_cfg in &config.issuers {
            let loader = Arc::new(JwksLoader::new(issuer_cfg.jwks.clone(), config.parser)?);
            loader.init(&counters)?;
            issuer_names.push((issuer_cfg.name.clone(), Arc::clone(&loader)));
            entries.push(IssuerEntry { config: issuer_cfg.clone(), loader });
        }

        let cache = ValidatedTokenCache::new(config.cache_max_size);
        cache.start_sweeper(config.cache_sweep_interval, now_epoch_secs);

        Ok(Self {
            issuers: IssuerResolver::new(entries),
            issuer_names,
            cache,
            counters,
            perf: PerformanceMonitor::new(),
            config,
        })
    }

    pub fn validate_access_token(&self, raw: &str) -> Result<AccessTokenContent, ValidationError> {
        match self.validate(raw, TokenKind::Access)? {
            ValidatedToken::Access(t) => Ok(t),
            other => {
                tracing::error!(kind = %discriminant(&other), "pipeline produced the wrong content kind for an access-token request");
                Err(ValidationError::InternalCacheError)
            }
        }
    }

    pub fn validate_id_token(&self, raw: &str) -> Result<IdTokenContent, ValidationError> {
        match self.validate(raw, TokenKind::Id)? {
            ValidatedToken::Id(t) => Ok(t),
            other => {
                tracing::error!(kind = %discriminant(&other), "pipeline produced the wrong content kind for an id-token request");
                Err(ValidationError::InternalCacheError)
            }
        }
    }

    pub fn validate_refresh_token(&self, raw: &str) -> Result<RefreshTokenContent, ValidationError> {
        match self.validate(raw, TokenKind::Refresh)? {
            ValidatedToken::Refresh(t) => Ok(t),
            other => {
                tracing::error!(kind = %discriminant(&other), "pipeline produced the wrong content kind for a refresh-token request");
                Err(ValidationError::InternalCacheError)
            }
        }
    }

    fn validate(&self, raw: &str, kind: TokenKind) -> Result<ValidatedToken, ValidationError> {
        let result = self
            .perf
            .time(MeasurementType::FullPipeline, || self.cache.get_or_compute(raw, || self.run_pipeline(raw, kind)));

        match &result {
            Ok(_) => self.counters.increment(EventKind::ValidationSucceeded),
            Err(e) => e.log(),
        }
        result
    }

    fn run_pipeline(&self, raw: &str, kind: TokenKind) -> Result<(ValidatedToken, Option<i64>), ValidationError> {
        let decoded = self
            .perf
            .time(MeasurementType::Decode, || TokenDecoder::decode(raw, &self.config.parser))
            .map_err(|e| self.count_and_return(e))?;

        let iss = decoded
            .payload
            .get("iss")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| self.count_and_return(ValidationError::MissingMandatoryClaim { claim: "iss" }))?
            .to_string();

        let issuer = self.issuers.resolve(&iss).map_err(|e| self.count_and_return(e))?;

        let candidate_count = issuer
            .loader
            .candidate_count(crate::config::KeyFamily::Rsa)
            .max(issuer.loader.candidate_count(crate::config::KeyFamily::Ec));

        let header_claims = self
            .perf
            .time(MeasurementType::HeaderValidate, || {
                HeaderValidator::validate(&decoded.header, &issuer.config.allowed_algorithms, candidate_count)
            })
            .map_err(|e| self.count_and_return(e))?;

        let key = issuer
            .loader
            .get_key(header_claims.kid.as_deref(), header_claims.alg.key_family(), &self.counters)
            .map_err(|e| self.count_and_return(e))?;

        self.perf
            .time(MeasurementType::SignatureVerify, || {
                SignatureValidator::verify(
                    header_claims.alg,
                    &key,
                    &decoded.signing_input,
                    &decoded.signature,
                    &self.counters,
                )
            })
            .map_err(|e| self.count_and_return(e))?;

        let now = now_epoch_secs();
        self.perf
            .time(MeasurementType::ClaimValidate, || {
                ClaimValidator::validate(
                    &decoded.payload,
                    &issuer.config,
                    kind,
                    now,
                    self.config.clock_skew_leeway,
                    self.config.nbf_future_tolerance,
                )
            })
            .map_err(|e| self.count_and_return(e))?;

        let token = match kind {
            TokenKind::Access => {
                ValidatedToken::Access(AccessTokenContent::from_payload(iss, decoded.payload))
            }
            TokenKind::Id => ValidatedToken::Id(IdTokenContent::from_payload(iss, decoded.payload)),
            TokenKind::Refresh => {
                ValidatedToken::Refresh(RefreshTokenContent::from_payload(iss, decoded.payload))
            }
        };

        let expires_at = token.expires_at();
        Ok((token, expires_at))
    }

    fn count_and_return(&self, err: ValidationError) -> ValidationError {
        self.counters.increment(event_kind_for(&err));
        err
    }

    pub fn health(&self) -> ValidatorHealth {
        let issuers = self
            .issuer_names
            .iter()
            .map(|(name, loader)| (name.clone(), loader.health()))
            .collect();
        ValidatorHealth { issuers, cache: self.cache.stats() }
    }

    pub fn counters(&self) -> &SecurityEventCounter {
        &self.counters
    }

    pub fn performance(&self) -> HashMap<&'static str, PerformanceStats> {
        self.perf.all_stats()
    }

    /// Stops every background thread (JWKS refreshers, cache sweeper),
    /// waiting up to the configured grace period for each to exit.
    pub fn shutdown(&self) {
        for (_, loader) in &self.issuer_names {
            loader.shutdown(self.config.shutdown_grace_period);
        }
        self.cache.shutdown(self.config.shutdown_grace_period);
    }
}

impl Drop for TokenValidator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn now_epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn discriminant(token: &ValidatedToken) -> &'static str {
    match token {
        ValidatedToken::Access(_) => "Access",
        ValidatedToken::Id(_) => "Id",
        ValidatedToken::Refresh(_) => "Refresh",
    }
}

fn event_kind_for(err: &ValidationError) -> EventKind {
    match err {
        ValidationError::TokenEmpty => EventKind::TokenEmpty,
        ValidationError::TokenTooLarge { .. } => EventKind::TokenTooLarge,
        ValidationError::InvalidStructure { .. } => EventKind::InvalidStructure,
        ValidationError::Base64Invalid { .. } => EventKind::Base64Invalid,
        ValidationError::JsonParseFailed { .. } => EventKind::JsonParseFailed,
        ValidationError::PartTooLarge { .. } => EventKind::PartTooLarge,
        ValidationError::JsonLimitExceeded { .. } => EventKind::JsonLimitExceeded,
        ValidationError::UnsupportedAlgorithm { .. } => EventKind::UnsupportedAlgorithm,
        ValidationError::AlgorithmExplicitlyRejected => EventKind::AlgorithmExplicitlyRejected,
        ValidationError::UnexpectedTokenType { .. } => EventKind::UnexpectedTokenType,
        ValidationError::KidRequired => EventKind::KidRequired,
        ValidationError::AlgorithmKeyMismatch { .. } => EventKind::AlgorithmKeyMismatch,
        ValidationError::KeyNotFound { .. } => EventKind::KeyNotFound,
        ValidationError::JwksFetchFailed { .. } => EventKind::JwksFetchFailed,
        ValidationError::JwksRefreshFailed => EventKind::JwksRefreshFailed,
        ValidationError::JwksContentSizeExceeded { .. } => EventKind::JwksContentSizeExceeded,
        ValidationError::JwksJsonParseFailed { .. } => EventKind::JwksJsonParseFailed,
        ValidationError::RsaKeyTooSmall { .. } => EventKind::RsaKeyTooSmall,
        ValidationError::UnsupportedCurve { .. } => EventKind::UnsupportedCurve,
        ValidationError::SignatureInvalid => EventKind::SignatureInvalid,
        ValidationError::TokenExpired { .. } => EventKind::TokenExpired,
        ValidationError::TokenNotYetValid { .. } => EventKind::TokenNotYetValid,
        ValidationError::IssuerMismatch { .. } => EventKind::IssuerMismatch,
        ValidationError::AudienceMismatch => EventKind::AudienceMismatch,
        ValidationError::AudienceMissing => EventKind::AudienceMissing,
        ValidationError::AuthorizedPartyMismatch { .. } => EventKind::AuthorizedPartyMismatch,
        ValidationError::SubjectMissing => EventKind::SubjectMissing,
        ValidationError::MissingMandatoryClaim { .. } => EventKind::MissingMandatoryClaim,
        ValidationError::ClaimOutOfRange { .. } => EventKind::ClaimOutOfRange,
        ValidationError::ScopeMissing { .. } => EventKind::ScopeMissing,
        ValidationError::RoleMissing { .. } => EventKind::RoleMissing,
        ValidationError::GroupMissing { .. } => EventKind::GroupMissing,
        ValidationError::NoIssuerConfig => EventKind::NoIssuerConfig,
        ValidationError::IssuerDiscoveryMismatch { .. } => EventKind::IssuerDiscoveryMismatch,
        ValidationError::InternalCacheError => EventKind::InternalCacheError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, IssuerConfig, JwksLoaderConfig, ParserConfig};
    use base64::Engine;
    use rsa::pkcs1v15::SigningKey;
    use rsa::traits::PublicKeyParts;
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use sha2::Sha256;
    use signature::{SignatureEncoding, Signer};

    const TEST_MODULUS_BITS: usize = 2048;

    fn test_keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, TEST_MODULUS_BITS).expect("keygen");
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    fn b64u(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn make_token(private: &RsaPrivateKey, kid: &str, claims: &serde_json::Value) -> String {
        let header = serde_json::json!({"alg": "RS256", "typ": "JWT", "kid": kid});
        let signing_input = format!(
            "{}.{}",
            b64u(header.to_string().as_bytes()),
            b64u(claims.to_string().as_bytes())
        );
        let signing_key = SigningKey::<Sha256>::new(private.clone());
        let signature = signing_key.sign(signing_input.as_bytes());
        format!("{signing_input}.{}", b64u(&signature.to_bytes()))
    }

    fn jwk_for(public: &RsaPublicKey, kid: &str) -> serde_json::Value {
        serde_json::json!({
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "n": b64u(&public.n().to_bytes_be()),
            "e": b64u(&public.e().to_bytes_be()),
        })
    }

    fn validator_with_issuer(jwks: serde_json::Value) -> TokenValidator {
        let issuer = IssuerConfig::new("primary", JwksLoaderConfig::static_jwks(jwks.to_string()))
            .with_issuer_identifier("https://issuer.example")
            .with_audience("api://default")
            .with_allowed_algorithms([Algorithm::Rs256]);
        let config = ValidatorConfig::default().with_parser(ParserConfig::default()).with_issuer(issuer);
        TokenValidator::new(config).expect("validator construction")
    }

    #[test]
    fn validates_a_well_formed_access_token_end_to_end() {
        let (private, public) = test_keypair();
        let jwks = serde_json::json!({"keys": [jwk_for(&public, "k1")]});
        let validator = validator_with_issuer(jwks);

        let claims = serde_json::json!({
            "iss": "https://issuer.example",
            "aud": "api://default",
            "sub": "user-1",
            "exp": 99999999999i64,
            "scope": "read",
        });
        let token = make_token(&private, "k1", &claims);

        let result = validator.validate_access_token(&token).expect("validation should succeed");
        assert_eq!(result.subject.as_deref(), Some("user-1"));
        assert!(result.scopes.contains("read"));
    }

    #[test]
    fn rejects_token_signed_by_the_wrong_key() {
        let (_, public) = test_keypair();
        let (wrong_private, _) = test_keypair();
        let jwks = serde_json::json!({"keys": [jwk_for(&public, "k1")]});
        let validator = validator_with_issuer(jwks);

        let claims = serde_json::json!({
            "iss": "https://issuer.example", "aud": "api://default", "sub": "u1", "exp": 99999999999i64
        });
        let token = make_token(&wrong_private, "k1", &claims);

        let err = validator.validate_access_token(&token).unwrap_err();
        assert_eq!(err, ValidationError::SignatureInvalid);
    }

    #[test]
    fn repeated_validation_hits_the_cache() {
        let (private, public) = test_keypair();
        let jwks = serde_json::json!({"keys": [jwk_for(&public, "k1")]});
        let validator = validator_with_issuer(jwks);

        let claims = serde_json::json!({
            "iss": "https://issuer.example", "aud": "api://default", "sub": "u1", "exp": 99999999999i64
        });
        let token = make_token(&private, "k1", &claims);

        validator.validate_access_token(&token).unwrap();
        validator.validate_access_token(&token).unwrap();
        assert_eq!(validator.health().cache.hits, 1);
    }

    #[test]
    fn unknown_issuer_fails_fast_without_touching_crypto() {
        let (_, public) = test_keypair();
        let jwks = serde_json::json!({"keys": [jwk_for(&public, "k1")]});
        let validator = validator_with_issuer(jwks);

        let claims = serde_json::json!({"iss": "https://other.example", "exp": 99999999999i64});
        let raw = format!(
            "{}.{}.{}",
            b64u(serde_json::json!({"alg": "RS256"}).to_string().as_bytes()),
            b64u(claims.to_string().as_bytes()),
            "c2ln"
        );

        let err = validator.validate_access_token(&raw).unwrap_err();
        assert_eq!(err, ValidationError::NoIssuerConfig);
    }
}
