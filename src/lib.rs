//! # jwtguard
//!
//! **jwtguard** is a hardened JWT/JWKS validation core: signature
//! verification against RustCrypto primitives, key rotation with grace
//! windows, multi-issuer resolution, and a validated-token cache, built for
//! services that must verify bearer tokens on every request without
//! depending on an async runtime.
//!
//! ## Overview
//!
//! Construct a [`TokenValidator`] from a [`config::ValidatorConfig`] naming
//! one or more [`config::IssuerConfig`]s, each with its own JWKS source
//! (static document, local file, HTTP endpoint, or OIDC `.well-known`
//! discovery). Call `validate_access_token`/`validate_id_token`/
//! `validate_refresh_token` with a raw compact-JWS string; get back typed,
//! already-checked claim content or a [`error::ValidationError`].
//!
//! ## Architecture
//!
//! - **[`config`]** — frozen configuration structs built with fluent builders
//! - **[`error`]** — the closed, stable `ValidationError` surface
//! - **[`metrics`]** — security event counters and a striped performance monitor
//! - **[`jwk`]** — JWKS document parsing and key-material construction
//! - **[`algorithms`]** — signature verification over RustCrypto primitives
//! - **[`http`]** — the resilient, HTTPS-enforcing blocking fetch client
//! - **[`discovery`]** — OIDC `.well-known/openid-configuration` resolution
//! - **[`jwks_loader`]** — key-set lifecycle: fetch, generation-swap, grace-window retirement
//! - **[`token`]** — decode, header policy, signature orchestration, claim checks, typed content
//! - **[`cache`]** — fingerprint-keyed validated-token cache with singleflight coalescing
//! - **[`issuer`]** — multi-issuer resolution with lock-free steady-state reads
//! - **[`validator`]** — the public façade tying every component together
//!
//! ## Quick Start
//!
//! ```no_run
//! use jwtguard::config::{IssuerConfig, JwksLoaderConfig, ValidatorConfig};
//! use jwtguard::TokenValidator;
//!
//! let issuer = IssuerConfig::new("primary", JwksLoaderConfig::well_known(
//!     "https://issuer.example/.well-known/openid-configuration",
//! ))
//! .with_issuer_identifier("https://issuer.example")
//! .with_audience("api://default");
//!
//! let config = ValidatorConfig::default().with_issuer(issuer);
//! let validator = TokenValidator::new(config).expect("failed to build validator");
//!
//! match validator.validate_access_token("eyJ...") {
//!     Ok(token) => println!("validated subject {:?}", token.subject),
//!     Err(e) => eprintln!("rejected: {e}"),
//! }
//! ```
//!
//! ## Runtime Considerations
//!
//! Every blocking operation here — JWKS fetches, `.well-known` discovery,
//! background refresh — runs on plain `std::thread`, not an async runtime.
//! `validate_*` is always synchronous and safe to call from any executor
//! (or none) without bridging.

pub mod algorithms;
pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod issuer;
pub mod jwk;
pub mod jwks_loader;
pub mod metrics;
pub mod token;
pub mod validator;

pub use config::{IssuerConfig, JwksLoaderConfig, ParserConfig, ValidatorConfig};
pub use error::ValidationError;
pub use token::{AccessTokenContent, ClaimView, IdTokenContent, RefreshTokenContent, ValidatedToken};
pub use validator::{TokenValidator, ValidatorHealth};
