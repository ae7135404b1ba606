//! C5: converts [`Jwk`] records into verified public-key objects with
//! algorithm-family binding.
//!
//! No direct teacher precedent for EC keys (the teacher only ever builds
//! `oct`/HMAC and RSA keys); built in the RustCrypto idiom since `rsa` is
//! already the pack's precedent for RSA (`airsstack-airsstack`) and
//! `p256`/`p384`/`p521` are its direct siblings.

use ecdsa::VerifyingKey;
use elliptic_curve::sec1::FromEncodedPoint;
use rsa::BigUint;

use crate::config::KeyFamily;
use crate::error::ValidationError;
use crate::jwk::parser::{decode_b64u, Jwk};

/// A resolved, verified public key, tagged with the family it belongs to.
#[derive(Clone)]
pub enum KeyMaterial {
    Rsa { key: Box<rsa::RsaPublicKey>, kid: Option<String> },
    EcP256 { key: Box<p256::ecdsa::VerifyingKey>, kid: Option<String> },
    EcP384 { key: Box<p384::ecdsa::VerifyingKey>, kid: Option<String> },
    EcP521 { key: Box<p521::ecdsa::VerifyingKey>, kid: Option<String> },
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(match self {
            Self::Rsa { .. } => "Rsa",
            Self::EcP256 { .. } => "EcP256",
            Self::EcP384 { .. } => "EcP384",
            Self::EcP521 { .. } => "EcP521",
        })
        .field("kid", &self.kid())
        .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn kid(&self) -> Option<&str> {
        match self {
            Self::Rsa { kid, .. }
            | Self::EcP256 { kid, .. }
            | Self::EcP384 { kid, .. }
            | Self::EcP521 { kid, .. } => kid.as_deref(),
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Rsa { .. } => KeyFamily::Rsa,
            Self::EcP256 { .. } | Self::EcP384 { .. } | Self::EcP521 { .. } => KeyFamily::Ec,
        }
    }

    /// The curve name, used only for `AlgorithmKeyMismatch`/diagnostic text.
    pub fn curve_or_kty(&self) -> &'static str {
        match self {
            Self::Rsa { .. } => "RSA",
            Self::EcP256 { .. } => "P-256",
            Self::EcP384 { .. } => "P-384",
            Self::EcP521 { .. } => "P-521",
        }
    }

    /// Builds verified key material from a parsed [`Jwk`], enforcing the
    /// minimum RSA modulus size and rejecting unsupported curves.
    pub fn from_jwk(jwk: &Jwk, min_rsa_modulus_bits: usize) -> Result<Self, ValidationError> {
        match jwk.kty.as_str() {
            "RSA" => Self::rsa_from_jwk(jwk, min_rsa_modulus_bits),
            "EC" => Self::ec_from_jwk(jwk),
            other => Err(ValidationError::UnsupportedCurve { curve: other.to_string() }),
        }
    }

    fn rsa_from_jwk(jwk: &Jwk, min_rsa_modulus_bits: usize) -> Result<Self, ValidationError> {
        let n_bytes = decode_b64u(jwk.n.as_deref().unwrap_or_default())?;
        let e_bytes = decode_b64u(jwk.e.as_deref().unwrap_or_default())?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);

        let bits = n.bits() as usize;
        if bits < min_rsa_modulus_bits {
            return Err(ValidationError::RsaKeyTooSmall { bits, min: min_rsa_modulus_bits });
        }

        let key = rsa::RsaPublicKey::new(n, e)
            .map_err(|_| ValidationError::JwksJsonParseFailed { reason: "invalid RSA key".into() })?;

        Ok(Self::Rsa { key: Box::new(key), kid: jwk.kid.clone() })
    }

    fn ec_from_jwk(jwk: &Jwk) -> Result<Self, ValidationError> {
        let crv = jwk.crv.as_deref().unwrap_or_default();
        let x = decode_b64u(jwk.x.as_deref().unwrap_or_default())?;
        let y = decode_b64u(jwk.y.as_deref().unwrap_or_default())?;

        match crv {
            "P-256" => {
                let point = p256::EncodedPoint::from_affine_coordinates(
                    &generic_array_owned(&x)?,
                    &generic_array_owned(&y)?,
                    false,
                );
                let key = VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| ValidationError::UnsupportedCurve { curve: crv.to_string() })?;
                Ok(Self::EcP256 { key: Box::new(key), kid: jwk.kid.clone() })
            }
            "P-384" => {
                let point = p384::EncodedPoint::from_affine_coordinates(
                    &generic_array_owned(&x)?,
                    &generic_array_owned(&y)?,
                    false,
                );
                let key = VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| ValidationError::UnsupportedCurve { curve: crv.to_string() })?;
                Ok(Self::EcP384 { key: Box::new(key), kid: jwk.kid.clone() })
            }
            "P-521" => {
                let point = p521::EncodedPoint::from_affine_coordinates(
                    &generic_array_owned(&x)?,
                    &generic_array_owned(&y)?,
                    false,
                );
                let key = p521::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|_| ValidationError::UnsupportedCurve { curve: crv.to_string() })?;
                Ok(Self::EcP521 { key: Box::new(key), kid: jwk.kid.clone() })
            }
            other => Err(ValidationError::UnsupportedCurve { curve: other.to_string() }),
        }
    }
}

/// Converts a coordinate byte slice into the fixed-size `GenericArray` the
/// `elliptic_curve` crate's `EncodedPoint` constructors expect, rejecting any
/// coordinate of the wrong width up front rather than panicking on slice
/// conversion.
fn generic_array_owned<N: elliptic_curve::generic_array::ArrayLength<u8>>(
    bytes: &[u8],
) -> Result<elliptic_curve::generic_array::GenericArray<u8, N>, ValidationError> {
    if bytes.len() != N::to_usize() {
        return Err(ValidationError::JwksJsonParseFailed {
            reason: "malformed EC coordinate".into(),
        });
    }
    Ok(elliptic_curve::generic_array::GenericArray::clone_from_slice(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use crate::jwk::parser::Jwk;

    fn rsa_jwk(n: &str, e: &str) -> Jwk {
        Jwk {
            kty: "RSA".into(),
            kid: Some("k1".into()),
            alg: Some("RS256".into()),
            key_use: None,
            n: Some(n.into()),
            e: Some(e.into()),
            crv: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn rejects_rsa_key_below_minimum_bits() {
        // 128-bit modulus encoded as base64url, far below the 2048-bit floor.
        let n = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode([0xFFu8; 16]);
        let jwk = rsa_jwk(&n, "AQAB");
        let err = KeyMaterial::from_jwk(&jwk, 2048).unwrap_err();
        match err {
            ValidationError::RsaKeyTooSmall { bits, min } => {
                assert!(bits <= 128);
                assert_eq!(min, 2048);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unsupported_curve_is_rejected() {
        let jwk = Jwk {
            kty: "EC".into(),
            kid: None,
            alg: None,
            key_use: None,
            n: None,
            e: None,
            crv: Some("P-192".into()),
            x: Some("aa".into()),
            y: Some("bb".into()),
        };
        assert!(KeyMaterial::from_jwk(&jwk, 2048).is_err());
    }
}
