//! Compact-JWS decoding, header policy, signature verification, claim rules,
//! and the typed token content produced at the end of the pipeline.

pub mod claims;
pub mod content;
pub mod decoder;
pub mod header;
pub mod signature;

pub use claims::ClaimValidator;
pub use content::{AccessTokenContent, ClaimView, IdTokenContent, RefreshTokenContent, ValidatedToken};
pub use decoder::{DecodedToken, TokenDecoder};
pub use header::{HeaderClaims, HeaderValidator};
pub use signature::SignatureValidator;
