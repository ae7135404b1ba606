//! C4: parses a JWKS document into a list of [`Jwk`] records under size and
//! shape limits.
//!
//! Grounded on `src/security/jwks_bearer.rs`'s manual JWKS walk (it iterates
//! the `keys` array and dispatches on `kty`/`alg` by hand rather than
//! deserializing into a typed struct with `#[serde(tag = "kty")]`, because
//! unsupported or malformed entries must be *dropped*, not fail the whole
//! document).

use base64::Engine;
use serde_json::Value;

use crate::config::ParserConfig;
use crate::error::ValidationError;

/// One parsed JWK entry. Fields are kept as their wire-format base64url
/// strings here; [`crate::jwk::KeyMaterial::from_jwk`] does the numeric
/// decode and curve/modulus validation.
#[derive(Debug, Clone)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    pub key_use: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

pub struct JwksParser;

impl JwksParser {
    /// Parses a JWKS document (either the `{"keys":[...]}` envelope or a
    /// single bare JWK object), enforcing the configured JSON size limits
    /// before handing the bytes to `serde_json`.
    pub fn parse(bytes: &[u8], config: &ParserConfig) -> Result<Vec<Jwk>, ValidationError> {
        if bytes.len() > config.max_json_buffer {
            return Err(ValidationError::JsonLimitExceeded { part: "jwks" });
        }

        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError::JwksJsonParseFailed { reason: e.to_string() })?;

        let entries: Vec<Value> = match value {
            Value::Object(ref map) if map.contains_key("keys") => map
                .get("keys")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            Value::Object(_) => vec![value],
            _ => {
                return Err(ValidationError::JwksJsonParseFailed {
                    reason: "expected a JSON object".to_string(),
                })
            }
        };

        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            match Self::parse_one(&entry, config) {
                Some(jwk) => keys.push(jwk),
                None => {
                    tracing::warn!(entry = %entry, "dropping unsupported or malformed JWK entry");
                }
            }
        }
        Ok(keys)
    }

    fn parse_one(entry: &Value, config: &ParserConfig) -> Option<Jwk> {
        let obj = entry.as_object()?;
        let kty = obj.get("kty")?.as_str()?.to_string();
        if kty != "RSA" && kty != "EC" {
            return None;
        }

        let str_field = |name: &str| -> Option<String> {
            let s = obj.get(name)?.as_str()?;
            if s.len() > config.max_json_string {
                return None;
            }
            Some(s.to_string())
        };

        let jwk = Jwk {
            kty,
            kid: str_field("kid"),
            alg: str_field("alg"),
            key_use: str_field("use"),
            n: str_field("n"),
            e: str_field("e"),
            crv: str_field("crv"),
            x: str_field("x"),
            y: str_field("y"),
        };

        match jwk.kty.as_str() {
            "RSA" if jwk.n.is_some() && jwk.e.is_some() => Some(jwk),
            "EC" if jwk.crv.is_some() && jwk.x.is_some() && jwk.y.is_some() => Some(jwk),
            _ => None,
        }
    }
}

pub(crate) fn decode_b64u(s: &str) -> Result<Vec<u8>, ValidationError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| ValidationError::Base64Invalid { part: "jwk" })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParserConfig {
        ParserConfig::default()
    }

    #[test]
    fn parses_keys_envelope() {
        let doc = serde_json::json!({
            "keys": [
                {"kty": "RSA", "kid": "k1", "alg": "RS256", "n": "abc", "e": "AQAB"}
            ]
        });
        let keys = JwksParser::parse(doc.to_string().as_bytes(), &cfg()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].kid.as_deref(), Some("k1"));
    }

    #[test]
    fn parses_bare_object() {
        let doc = serde_json::json!({"kty": "EC", "crv": "P-256", "x": "aa", "y": "bb"});
        let keys = JwksParser::parse(doc.to_string().as_bytes(), &cfg()).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].kty, "EC");
    }

    #[test]
    fn drops_entries_missing_kty() {
        let doc = serde_json::json!({"keys": [{"n": "abc", "e": "AQAB"}]});
        let keys = JwksParser::parse(doc.to_string().as_bytes(), &cfg()).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn drops_unsupported_kty_silently() {
        let doc = serde_json::json!({"keys": [{"kty": "oct", "k": "secret"}]});
        let keys = JwksParser::parse(doc.to_string().as_bytes(), &cfg()).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn rejects_oversized_document() {
        let tiny = ParserConfig::default().with_max_json_buffer(4);
        let doc = serde_json::json!({"keys": []});
        let err = JwksParser::parse(doc.to_string().as_bytes(), &tiny).unwrap_err();
        assert_eq!(err, ValidationError::JsonLimitExceeded { part: "jwks" });
    }
}
