//! C9: algorithm allow-list, key-family mapping, and cached PSS parameter
//! templates.
//!
//! The "cached template, fresh verifier instance per call" split mirrors
//! `src/validator_cache.rs`'s double-checked-locking compiled-object cache:
//! there the expensive-to-build object is a compiled `JSONSchema`; here it is
//! a PSS padding-scheme descriptor (which `SHA` digest, MGF1, and salt
//! length a given algorithm needs). The verifier objects built from those
//! templates are never shared across concurrent verifications — the spec is
//! explicit that verifier *instances* must not be shared even though the
//! *templates* describing them are.

use std::sync::OnceLock;

use ecdsa::signature::Verifier;
use rsa::pss::Pss;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::config::{Algorithm, KeyFamily};
use crate::error::ValidationError;
use crate::jwk::KeyMaterial;

/// Hash size used by an algorithm, driving both the digest and (for PSS)
/// the MGF1/salt-length parameters, which must match the digest size exactly
/// per RFC 7518 §3.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashSize {
    Sha256,
    Sha384,
    Sha512,
}

impl HashSize {
    fn for_algorithm(alg: Algorithm) -> Self {
        match alg {
            Algorithm::Rs256 | Algorithm::Es256 | Algorithm::Ps256 => Self::Sha256,
            Algorithm::Rs384 | Algorithm::Es384 | Algorithm::Ps384 => Self::Sha384,
            Algorithm::Rs512 | Algorithm::Es512 | Algorithm::Ps512 => Self::Sha512,
        }
    }

    fn salt_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// A cached, reusable description of how to verify one algorithm. Building
/// this (mostly: picking the right digest/padding types) is cheap, but it is
/// still looked up through a cache keyed by `Algorithm` so `verify()` never
/// re-derives the mapping on the hot path.
struct AlgorithmTemplate {
    alg: Algorithm,
    hash: HashSize,
}

/// One `OnceLock` slot per algorithm — simpler than a `RwLock<HashMap>` for a
/// fixed, small, known-at-compile-time key set, while keeping the same
/// "compute once, share the computed template, never the instance" shape as
/// `ValidatorCache::get_or_compile`.
struct TemplateCache {
    rs256: OnceLock<AlgorithmTemplate>,
    rs384: OnceLock<AlgorithmTemplate>,
    rs512: OnceLock<AlgorithmTemplate>,
    es256: OnceLock<AlgorithmTemplate>,
    es384: OnceLock<AlgorithmTemplate>,
    es512: OnceLock<AlgorithmTemplate>,
    ps256: OnceLock<AlgorithmTemplate>,
    ps384: OnceLock<AlgorithmTemplate>,
    ps512: OnceLock<AlgorithmTemplate>,
}

impl TemplateCache {
    const fn new() -> Self {
        Self {
            rs256: OnceLock::new(),
            rs384: OnceLock::new(),
            rs512: OnceLock::new(),
            es256: OnceLock::new(),
            es384: OnceLock::new(),
            es512: OnceLock::new(),
            ps256: OnceLock::new(),
            ps384: OnceLock::new(),
            ps512: OnceLock::new(),
        }
    }

    fn get(&self, alg: Algorithm) -> &AlgorithmTemplate {
        let slot = match alg {
            Algorithm::Rs256 => &self.rs256,
            Algorithm::Rs384 => &self.rs384,
            Algorithm::Rs512 => &self.rs512,
            Algorithm::Es256 => &self.es256,
            Algorithm::Es384 => &self.es384,
            Algorithm::Es512 => &self.es512,
            Algorithm::Ps256 => &self.ps256,
            Algorithm::Ps384 => &self.ps384,
            Algorithm::Ps512 => &self.ps512,
        };
        slot.get_or_init(|| AlgorithmTemplate { alg, hash: HashSize::for_algorithm(alg) })
    }
}

static TEMPLATES: TemplateCache = TemplateCache::new();

/// Verifies `signature` over `signing_input` using `key`, for the given
/// algorithm. Produces a fresh verifier object on every call; only the
/// lightweight [`AlgorithmTemplate`] lookup is cached.
pub fn verify(
    alg: Algorithm,
    key: &KeyMaterial,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<bool, ValidationError> {
    if key.family() != alg.key_family() {
        return Err(ValidationError::AlgorithmKeyMismatch {
            alg: alg.as_str().to_string(),
            expected: family_name(alg.key_family()),
            actual: key.curve_or_kty(),
        });
    }

    let template = TEMPLATES.get(alg);

    match (alg, key) {
        (Algorithm::Rs256 | Algorithm::Rs384 | Algorithm::Rs512, KeyMaterial::Rsa { key, .. }) => {
            verify_rsa_pkcs1(key, template.hash, signing_input, signature)
        }
        (Algorithm::Ps256 | Algorithm::Ps384 | Algorithm::Ps512, KeyMaterial::Rsa { key, .. }) => {
            verify_rsa_pss(key, template.hash, signing_input, signature)
        }
        (Algorithm::Es256, KeyMaterial::EcP256 { key, .. }) => {
            let sig = p256::ecdsa::Signature::from_slice(signature)
                .map_err(|_| ValidationError::SignatureInvalid)?;
            Ok(key.verify(signing_input, &sig).is_ok())
        }
        (Algorithm::Es384, KeyMaterial::EcP384 { key, .. }) => {
            let sig = p384::ecdsa::Signature::from_slice(signature)
                .map_err(|_| ValidationError::SignatureInvalid)?;
            Ok(key.verify(signing_input, &sig).is_ok())
        }
        (Algorithm::Es512, KeyMaterial::EcP521 { key, .. }) => {
            let sig = p521::ecdsa::Signature::from_slice(signature)
                .map_err(|_| ValidationError::SignatureInvalid)?;
            Ok(key.verify(signing_input, &sig).is_ok())
        }
        _ => Err(ValidationError::AlgorithmKeyMismatch {
            alg: alg.as_str().to_string(),
            expected: family_name(alg.key_family()),
            actual: key.curve_or_kty(),
        }),
    }
}

fn verify_rsa_pkcs1(
    key: &rsa::RsaPublicKey,
    hash: HashSize,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<bool, ValidationError> {
    let result = match hash {
        HashSize::Sha256 => {
            let digest = Sha256::digest(signing_input);
            key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        }
        HashSize::Sha384 => {
            let digest = Sha384::digest(signing_input);
            key.verify(Pkcs1v15Sign::new::<Sha384>(), &digest, signature)
        }
        HashSize::Sha512 => {
            let digest = Sha512::digest(signing_input);
            key.verify(Pkcs1v15Sign::new::<Sha512>(), &digest, signature)
        }
    };
    Ok(result.is_ok())
}

/// PSS verification with the exact MGF1 hash and salt length matching the
/// digest size (32/48/64 bytes), per §4.3's requirement.
fn verify_rsa_pss(
    key: &rsa::RsaPublicKey,
    hash: HashSize,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<bool, ValidationError> {
    let result = match hash {
        HashSize::Sha256 => {
            let digest = Sha256::digest(signing_input);
            key.verify(Pss::new_with_salt::<Sha256>(hash.salt_len()), &digest, signature)
        }
        HashSize::Sha384 => {
            let digest = Sha384::digest(signing_input);
            key.verify(Pss::new_with_salt::<Sha384>(hash.salt_len()), &digest, signature)
        }
        HashSize::Sha512 => {
            let digest = Sha512::digest(signing_input);
            key.verify(Pss::new_with_salt::<Sha512>(hash.salt_len()), &digest, signature)
        }
    };
    Ok(result.is_ok())
}

fn family_name(family: KeyFamily) -> &'static str {
    family.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_size_matches_algorithm_digest() {
        assert_eq!(HashSize::for_algorithm(Algorithm::Rs256), HashSize::Sha256);
        assert_eq!(HashSize::for_algorithm(Algorithm::Es512), HashSize::Sha512);
        assert_eq!(HashSize::for_algorithm(Algorithm::Ps384), HashSize::Sha384);
    }

    #[test]
    fn salt_len_matches_digest_size_bytes() {
        assert_eq!(HashSize::Sha256.salt_len(), 32);
        assert_eq!(HashSize::Sha384.salt_len(), 48);
        assert_eq!(HashSize::Sha512.salt_len(), 64);
    }

    #[test]
    fn template_cache_is_stable_across_lookups() {
        let a = TEMPLATES.get(Algorithm::Rs256) as *const _;
        let b = TEMPLATES.get(Algorithm::Rs256) as *const _;
        assert_eq!(a, b);
    }
}
