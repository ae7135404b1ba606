//! Frozen configuration structs, built with fluent `#[must_use]` builders.
//!
//! Mirrors the construction style of `JwksBearerProvider` and
//! `ProviderJwksCacheConfig` in the retrieval pack this crate is built from:
//! a `Default`-derived struct plus chained `with_*`/bare-named setters that
//! take and return `Self` by value. `ValidatorConfig::from_env` layers a thin
//! optional override on top, for deployments that prefer environment-driven
//! tuning to recompiling a builder chain.

use std::collections::HashSet;
use std::env;
use std::time::Duration;

/// Minimum acceptable TLS protocol version for JWKS/discovery fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMinVersion {
    Tls12,
    Tls13,
}

impl Default for TlsMinVersion {
    fn default() -> Self {
        Self::Tls12
    }
}

/// The signature algorithms this crate is willing to verify.
///
/// Deliberately excludes `HS256`/`HS384`/`HS512` (symmetric algorithms are
/// rejected outright) and `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
    Ps256,
    Ps384,
    Ps512,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::Ps256 => "PS256",
            Self::Ps384 => "PS384",
            Self::Ps512 => "PS512",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            "ES256" => Some(Self::Es256),
            "ES384" => Some(Self::Es384),
            "ES512" => Some(Self::Es512),
            "PS256" => Some(Self::Ps256),
            "PS384" => Some(Self::Ps384),
            "PS512" => Some(Self::Ps512),
            _ => None,
        }
    }

    /// The key family this algorithm requires — the basis of the
    /// algorithm-confusion defense in `HeaderValidator`.
    pub fn key_family(self) -> KeyFamily {
        match self {
            Self::Rs256 | Self::Rs384 | Self::Rs512 | Self::Ps256 | Self::Ps384 | Self::Ps512 => {
                KeyFamily::Rsa
            }
            Self::Es256 | Self::Es384 | Self::Es512 => KeyFamily::Ec,
        }
    }

    fn default_allow_list() -> HashSet<Algorithm> {
        [
            Self::Rs256,
            Self::Rs384,
            Self::Rs512,
            Self::Es256,
            Self::Es384,
            Self::Es512,
            Self::Ps256,
            Self::Ps384,
            Self::Ps512,
        ]
        .into_iter()
        .collect()
    }
}

/// The key-material family a resolved key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
}

impl KeyFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
        }
    }
}

/// The three kinds of typed token content this crate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Id,
    Refresh,
}

/// Frozen limits enforced by the token decoder and JWKS parser (C3).
///
/// Every field here is checked *during* parsing, not in a post-hoc walk of an
/// already-built `serde_json::Value` — see [`crate::token::decoder`] and
/// [`crate::jwk::parser`] for the enforcement points.
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    pub max_token_size: usize,
    pub max_payload_size: usize,
    pub max_json_string: usize,
    pub max_json_buffer: usize,
    pub min_rsa_modulus_bits: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_token_size: 8192,
            max_payload_size: 8192,
            max_json_string: 4096,
            max_json_buffer: 131_072,
            min_rsa_modulus_bits: 2048,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub fn with_max_token_size(mut self, bytes: usize) -> Self {
        self.max_token_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_payload_size(mut self, bytes: usize) -> Self {
        self.max_payload_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_json_string(mut self, bytes: usize) -> Self {
        self.max_json_string = bytes;
        self
    }

    #[must_use]
    pub fn with_max_json_buffer(mut self, bytes: usize) -> Self {
        self.max_json_buffer = bytes;
        self
    }

    #[must_use]
    pub fn with_min_rsa_modulus_bits(mut self, bits: usize) -> Self {
        self.min_rsa_modulus_bits = bits;
        self
    }
}

/// Where a `JwksLoader` gets its key material from.
#[derive(Debug, Clone)]
pub enum JwksSource {
    /// Fetch over HTTP. `well_known` drives discovery first if `Some`.
    Http { jwks_url: Option<String>, well_known_url: Option<String> },
    /// Read once at `init()`, re-read only on an explicit `reload()`.
    File { path: std::path::PathBuf },
    /// Fixed in-memory JWKS document, never refreshed.
    Static { jwks_json: String },
}

/// Configuration for one `JwksLoader` instance.
#[derive(Debug, Clone)]
pub struct JwksLoaderConfig {
    pub source: JwksSource,
    pub refresh_interval: Option<Duration>,
    pub grace_window: Duration,
    pub max_retired_sets: usize,
    pub http_connect_timeout: Duration,
    pub http_read_timeout: Duration,
    pub tls_min_version: TlsMinVersion,
    pub max_response_size: usize,
    pub max_retries: u32,
}

impl JwksLoaderConfig {
    #[must_use]
    pub fn http(jwks_url: impl Into<String>) -> Self {
        Self {
            source: JwksSource::Http { jwks_url: Some(jwks_url.into()), well_known_url: None },
            ..Self::defaults()
        }
    }

    #[must_use]
    pub fn well_known(discovery_url: impl Into<String>) -> Self {
        Self {
            source: JwksSource::Http { jwks_url: None, well_known_url: Some(discovery_url.into()) },
            ..Self::defaults()
        }
    }

    #[must_use]
    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Self { source: JwksSource::File { path: path.into() }, ..Self::defaults() }
    }

    #[must_use]
    pub fn static_jwks(jwks_json: impl Into<String>) -> Self {
        Self { source: JwksSource::Static { jwks_json: jwks_json.into() }, ..Self::defaults() }
    }

    fn defaults() -> Self {
        Self {
            source: JwksSource::Static { jwks_json: "{\"keys\":[]}".to_string() },
            refresh_interval: Some(Duration::from_secs(3600)),
            grace_window: Duration::from_secs(600),
            max_retired_sets: 3,
            http_connect_timeout: Duration::from_secs(5),
            http_read_timeout: Duration::from_secs(10),
            tls_min_version: TlsMinVersion::default(),
            max_response_size: 8192 * 16,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn with_grace_window(mut self, window: Duration) -> Self {
        self.grace_window = window;
        self
    }

    #[must_use]
    pub fn with_max_retired_sets(mut self, n: usize) -> Self {
        self.max_retired_sets = n;
        self
    }

    #[must_use]
    pub fn with_http_connect_timeout(mut self, timeout: Duration) -> Self {
        self.http_connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_http_read_timeout(mut self, timeout: Duration) -> Self {
        self.http_read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_tls_min_version(mut self, version: TlsMinVersion) -> Self {
        self.tls_min_version = version;
        self
    }

    #[must_use]
    pub fn with_max_response_size(mut self, bytes: usize) -> Self {
        self.max_response_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// Per-issuer policy: expected identifiers, allowed algorithms, claim rules.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    pub name: String,
    pub issuer_identifier: Option<String>,
    pub expected_audience: HashSet<String>,
    pub expected_client_id: Option<String>,
    pub allowed_algorithms: HashSet<Algorithm>,
    pub sub_optional_for: HashSet<TokenKind>,
    pub required_scopes: Vec<String>,
    pub required_roles: Vec<String>,
    pub required_groups: Vec<String>,
    pub jwks: JwksLoaderConfig,
    pub enabled: bool,
}

impl IssuerConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, jwks: JwksLoaderConfig) -> Self {
        Self {
            name: name.into(),
            issuer_identifier: None,
            expected_audience: HashSet::new(),
            expected_client_id: None,
            allowed_algorithms: Algorithm::default_allow_list(),
            sub_optional_for: HashSet::new(),
            required_scopes: Vec::new(),
            required_roles: Vec::new(),
            required_groups: Vec::new(),
            jwks,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_issuer_identifier(mut self, issuer: impl Into<String>) -> Self {
        self.issuer_identifier = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audience.insert(audience.into());
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.expected_client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn with_allowed_algorithms(mut self, algs: impl IntoIterator<Item = Algorithm>) -> Self {
        self.allowed_algorithms = algs.into_iter().collect();
        self
    }

    /// Relax the `sub` requirement for every token kind. For finer control
    /// use [`Self::with_sub_optional_for`].
    #[must_use]
    pub fn claim_sub_optional(mut self, optional: bool) -> Self {
        if optional {
            self.sub_optional_for = [TokenKind::Access, TokenKind::Id, TokenKind::Refresh]
                .into_iter()
                .collect();
        } else {
            self.sub_optional_for.clear();
        }
        self
    }

    #[must_use]
    pub fn with_sub_optional_for(mut self, kinds: impl IntoIterator<Item = TokenKind>) -> Self {
        self.sub_optional_for = kinds.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_required_scopes(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
        self.required_scopes = scopes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_required_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.required_roles = roles.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_required_groups(mut self, groups: impl IntoIterator<Item = String>) -> Self {
        self.required_groups = groups.into_iter().collect();
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Top-level configuration consumed by `TokenValidator::builder()`.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub parser: ParserConfig,
    pub issuers: Vec<IssuerConfig>,
    pub clock_skew_leeway: Duration,
    pub nbf_future_tolerance: Duration,
    pub cache_max_size: usize,
    pub cache_sweep_interval: Duration,
    pub shutdown_grace_period: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            issuers: Vec::new(),
            clock_skew_leeway: Duration::from_secs(0),
            nbf_future_tolerance: Duration::from_secs(60),
            cache_max_size: 1000,
            cache_sweep_interval: Duration::from_secs(10),
            shutdown_grace_period: Duration::from_secs(10),
        }
    }
}

impl ValidatorConfig {
    #[must_use]
    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: IssuerConfig) -> Self {
        self.issuers.push(issuer);
        self
    }

    #[must_use]
    pub fn with_clock_skew_leeway(mut self, leeway: Duration) -> Self {
        self.clock_skew_leeway = leeway;
        self
    }

    #[must_use]
    pub fn with_nbf_future_tolerance(mut self, tolerance: Duration) -> Self {
        self.nbf_future_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_cache_max_size(mut self, size: usize) -> Self {
        self.cache_max_size = size;
        self
    }

    #[must_use]
    pub fn with_cache_sweep_interval(mut self, interval: Duration) -> Self {
        self.cache_sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace_period(mut self, period: Duration) -> Self {
        self.shutdown_grace_period = period;
        self
    }

    /// Overrides a handful of numeric knobs from environment variables,
    /// falling back to the struct default (or whatever was already set) on a
    /// missing or unparsable value. The builder chain remains the primary
    /// construction path; this is optional sugar for environment-driven
    /// deployments.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_usize("JWT_MAX_TOKEN_SIZE") {
            self.parser = self.parser.with_max_token_size(v);
        }
        if let Some(v) = env_usize("JWT_CACHE_MAX_SIZE") {
            self.cache_max_size = v;
        }
        if let Some(v) = env_u64("JWT_CACHE_SWEEP_INTERVAL_SECS") {
            self.cache_sweep_interval = Duration::from_secs(v);
        }
        self
    }
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_config_defaults_match_spec_table() {
        let cfg = ParserConfig::default();
        assert_eq!(cfg.max_token_size, 8192);
        assert_eq!(cfg.max_payload_size, 8192);
        assert_eq!(cfg.max_json_string, 4096);
        assert_eq!(cfg.max_json_buffer, 131_072);
        assert_eq!(cfg.min_rsa_modulus_bits, 2048);
    }

    #[test]
    fn default_allow_list_excludes_hmac_and_none() {
        let allowed = Algorithm::default_allow_list();
        assert!(allowed.contains(&Algorithm::Rs256));
        assert!(allowed.contains(&Algorithm::Es512));
        assert!(Algorithm::from_str("none").is_none());
        assert!(Algorithm::from_str("HS256").is_none());
    }

    #[test]
    fn algorithm_key_family_binds_correctly() {
        assert_eq!(Algorithm::Rs256.key_family(), KeyFamily::Rsa);
        assert_eq!(Algorithm::Ps512.key_family(), KeyFamily::Rsa);
        assert_eq!(Algorithm::Es256.key_family(), KeyFamily::Ec);
    }

    #[test]
    fn issuer_config_builder_chain() {
        let jwks = JwksLoaderConfig::http("https://issuer.example/jwks.json");
        let issuer = IssuerConfig::new("primary", jwks)
            .with_issuer_identifier("https://issuer.example")
            .with_audience("api://default")
            .claim_sub_optional(true);
        assert_eq!(issuer.issuer_identifier.as_deref(), Some("https://issuer.example"));
        assert!(issuer.expected_audience.contains("api://default"));
        assert!(issuer.sub_optional_for.contains(&TokenKind::Id));
    }

    #[test]
    fn validator_config_env_override() {
        std::env::set_var("JWT_CACHE_MAX_SIZE", "42");
        let cfg = ValidatorConfig::default().apply_env_overrides();
        assert_eq!(cfg.cache_max_size, 42);
        std::env::remove_var("JWT_CACHE_MAX_SIZE");
    }
}
