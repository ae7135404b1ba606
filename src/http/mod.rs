//! C6: resilient HTTP retrieval of JWKS and OIDC discovery documents.

pub mod fetcher;

pub use fetcher::{FetchOutcome, ResilientHttpFetcher};
