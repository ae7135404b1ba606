//! JWKS document parsing (C4) and JWK-to-verified-key conversion (C5).

pub mod key_material;
pub mod parser;

pub use key_material::KeyMaterial;
pub use parser::{Jwk, JwksParser};
