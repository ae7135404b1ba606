//! C6: blocking HTTP client wrapper with conditional-GET caching, bounded
//! retries, response-size limiting, and an HTTPS-only transport policy.
//!
//! The HTTPS-except-loopback check is lifted straight from
//! `src/security/jwks_bearer.rs::JwksBearerProvider::new` (parse with `url`,
//! reject everything but `https` and `http` on exact `localhost`/`127.0.0.1`)
//! generalized into a reusable fetcher rather than inlined into one provider.
//! The retry loop mirrors that file's `refresh_jwks_if_needed` 3-attempt
//! fetch, replacing its fixed sleep with jittered backoff.

use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::config::JwksLoaderConfig;
use crate::error::ValidationError;

/// Result of one fetch attempt against a possibly-already-cached resource.
pub enum FetchOutcome {
    /// Body changed (or this is the first fetch); carries the new body plus
    /// any validator/cache headers to remember for the next conditional GET.
    Modified { body: Vec<u8>, etag: Option<String>, last_modified: Option<String> },
    /// Server returned 304 Not Modified; caller should keep its current data.
    NotModified,
}

pub struct ResilientHttpFetcher {
    client: reqwest::blocking::Client,
    max_response_size: usize,
    max_retries: u32,
}

impl ResilientHttpFetcher {
    pub fn new(config: &JwksLoaderConfig) -> Result<Self, ValidationError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.http_connect_timeout)
            .timeout(config.http_read_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .min_tls_version(tls_version(config.tls_min_version))
            .build()
            .map_err(|e| ValidationError::JwksFetchFailed {
                url: String::new(),
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            client,
            max_response_size: config.max_response_size,
            max_retries: config.max_retries,
        })
    }

    /// Fetches `url`, enforcing HTTPS except for exact `localhost`/`127.0.0.1`,
    /// and retrying transient failures with jittered backoff.
    pub fn fetch(
        &self,
        url: &str,
        prior_etag: Option<&str>,
        prior_last_modified: Option<&str>,
    ) -> Result<FetchOutcome, ValidationError> {
        enforce_https(url)?;

        let mut last_err = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(backoff_with_jitter(attempt));
            }
            match self.try_once(url, prior_etag, prior_last_modified) {
                Ok(outcome) => return Ok(outcome),
                Err(e) => last_err = e,
            }
        }

        Err(ValidationError::JwksFetchFailed { url: url.to_string(), reason: last_err })
    }

    fn try_once(
        &self,
        url: &str,
        prior_etag: Option<&str>,
        prior_last_modified: Option<&str>,
    ) -> Result<FetchOutcome, String> {
        let mut request = self.client.get(url);
        if let Some(etag) = prior_etag {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = prior_last_modified {
            request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().map_err(|e| e.to_string())?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !response.status().is_success() {
            return Err(format!("unexpected status {}", response.status()));
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_response_size {
                return Err(format!("content-length {len} exceeds limit"));
            }
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().map_err(|e| e.to_string())?;
        if body.len() > self.max_response_size {
            return Err(format!("response body of {} bytes exceeds limit", body.len()));
        }

        Ok(FetchOutcome::Modified { body: body.to_vec(), etag, last_modified })
    }
}

fn enforce_https(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|e| ValidationError::JwksFetchFailed {
        url: url.to_string(),
        reason: format!("invalid url: {e}"),
    })?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let host = parsed.host_str().unwrap_or_default();
            if host == "localhost" || host == "127.0.0.1" {
                Ok(())
            } else {
                Err(ValidationError::JwksFetchFailed {
                    url: url.to_string(),
                    reason: "http is only permitted for localhost/127.0.0.1".to_string(),
                })
            }
        }
        other => Err(ValidationError::JwksFetchFailed {
            url: url.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

fn tls_version(min: crate::config::TlsMinVersion) -> reqwest::tls::Version {
    match min {
        crate::config::TlsMinVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
        crate::config::TlsMinVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
    }
}

/// Exponential backoff with full jitter, capped at 5 seconds.
fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 100u64.saturating_mul(1u64 << attempt.min(6));
    let capped_ms = base_ms.min(5000);
    let jittered_ms = rand::thread_rng().gen_range(0..=capped_ms);
    Duration::from_millis(jittered_ms)
}
