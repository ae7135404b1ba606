//! C7: OIDC `.well-known/openid-configuration` discovery.
//!
//! A single lazy fetch cached in a `OnceLock`, mirroring the
//! `ValidatorCache::get_or_compile` "compute once, share forever" shape used
//! elsewhere in this crate for algorithm templates — discovery documents are
//! immutable for the lifetime of one loader, so there is no refresh path.

use std::sync::OnceLock;

use serde::Deserialize;
use url::Url;

use crate::error::ValidationError;
use crate::http::ResilientHttpFetcher;

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// The two endpoints this crate needs out of a discovery document.
#[derive(Debug, Clone)]
pub struct DiscoveredEndpoints {
    pub issuer: String,
    pub jwks_uri: String,
}

pub struct WellKnownResolver {
    discovery_url: String,
    resolved: OnceLock<DiscoveredEndpoints>,
}

impl WellKnownResolver {
    pub fn new(discovery_url: impl Into<String>) -> Self {
        Self { discovery_url: discovery_url.into(), resolved: OnceLock::new() }
    }

    /// Resolves `jwks_uri`, fetching and caching the discovery document on
    /// first call. Verifies the discovered issuer shares an origin with the
    /// `.well-known` URL, rejecting a document claiming a different issuer
    /// than the endpoint it was fetched from.
    pub fn resolve(
        &self,
        fetcher: &ResilientHttpFetcher,
    ) -> Result<&DiscoveredEndpoints, ValidationError> {
        if let Some(endpoints) = self.resolved.get() {
            return Ok(endpoints);
        }

        let outcome = fetcher.fetch(&self.discovery_url, None, None)?;
        let body = match outcome {
            crate::http::FetchOutcome::Modified { body, .. } => body,
            crate::http::FetchOutcome::NotModified => {
                return Err(ValidationError::JwksFetchFailed {
                    url: self.discovery_url.clone(),
                    reason: "unexpected 304 on first discovery fetch".to_string(),
                })
            }
        };

        let doc: DiscoveryDocument = serde_json::from_slice(&body).map_err(|e| {
            ValidationError::JwksJsonParseFailed { reason: format!("discovery document: {e}") }
        })?;

        self.check_origin_match(&doc.issuer)?;

        let endpoints = DiscoveredEndpoints { issuer: doc.issuer, jwks_uri: doc.jwks_uri };
        Ok(self.resolved.get_or_init(|| endpoints))
    }

    /// Returns the already-resolved endpoints without triggering a fetch.
    pub fn peek(&self) -> Option<&DiscoveredEndpoints> {
        self.resolved.get()
    }

    fn check_origin_match(&self, discovered_issuer: &str) -> Result<(), ValidationError> {
        let expected = Url::parse(&self.discovery_url).map_err(|_| {
            ValidationError::IssuerDiscoveryMismatch {
                expected: self.discovery_url.clone(),
                discovered: discovered_issuer.to_string(),
            }
        })?;
        let actual = Url::parse(discovered_issuer).map_err(|_| {
            ValidationError::IssuerDiscoveryMismatch {
                expected: self.discovery_url.clone(),
                discovered: discovered_issuer.to_string(),
            }
        })?;

        if expected.origin() != actual.origin() {
            return Err(ValidationError::IssuerDiscoveryMismatch {
                expected: expected.origin().ascii_serialization(),
                discovered: actual.origin().ascii_serialization(),
            });
        }
        Ok(())
    }
}
