//! C10: splits a compact JWS, base64url-decodes its parts, and parses the
//! header/payload JSON under the configured size limits.
//!
//! The `jsonwebtoken` crate's `decode_header`/internal split used by
//! `src/security/jwks_bearer.rs` is replaced here with a hand-rolled split,
//! since this crate owns the whole decode path (jsonwebtoken is not a
//! dependency — see `DESIGN.md`).

use base64::Engine;
use serde_json::{Map, Value};

use crate::config::ParserConfig;
use crate::error::ValidationError;

/// The fully decoded, not-yet-validated contents of a compact JWS.
#[derive(Debug)]
pub struct DecodedToken {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
    /// `header_b64u + '.' + payload_b64u`, exactly as it appeared on the
    /// wire — this is what gets hashed/verified, not a re-serialization.
    pub signing_input: Vec<u8>,
    pub signature: Vec<u8>,
}

pub struct TokenDecoder;

impl TokenDecoder {
    pub fn decode(raw: &str, config: &ParserConfig) -> Result<DecodedToken, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::TokenEmpty);
        }
        if raw.len() > config.max_token_size {
            return Err(ValidationError::TokenTooLarge { max: config.max_token_size });
        }

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(ValidationError::InvalidStructure {
                reason: "expected exactly 3 dot-separated parts",
            });
        }
        let [header_b64, payload_b64, signature_b64] = [parts[0], parts[1], parts[2]];
        if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
            return Err(ValidationError::InvalidStructure { reason: "empty segment" });
        }

        let header_bytes = decode_part(header_b64, "header", config)?;
        let payload_bytes = decode_part(payload_b64, "payload", config)?;
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| ValidationError::Base64Invalid { part: "signature" })?;

        let header = parse_json_object(&header_bytes, "header", config)?;
        let payload = parse_json_object(&payload_bytes, "payload", config)?;

        let mut signing_input = Vec::with_capacity(header_b64.len() + 1 + payload_b64.len());
        signing_input.extend_from_slice(header_b64.as_bytes());
        signing_input.push(b'.');
        signing_input.extend_from_slice(payload_b64.as_bytes());

        Ok(DecodedToken { header, payload, signing_input, signature })
    }
}

fn decode_part(
    part: &str,
    name: &'static str,
    config: &ParserConfig,
) -> Result<Vec<u8>, ValidationError> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| ValidationError::Base64Invalid { part: name })?;
    if bytes.len() > config.max_payload_size {
        return Err(ValidationError::PartTooLarge { part: name, max: config.max_payload_size });
    }
    Ok(bytes)
}

/// Parses `bytes` as a JSON object, enforcing `max_json_buffer` before
/// parsing and `max_json_string` per string value — a lightweight recursive
/// walk rather than a custom streaming parser, since `serde_json`'s `Value`
/// already gives duplicate-key-last-wins semantics for free and the buffer
/// size is already bounded by `max_payload_size` upstream.
fn parse_json_object(
    bytes: &[u8],
    name: &'static str,
    config: &ParserConfig,
) -> Result<Map<String, Value>, ValidationError> {
    if bytes.len() > config.max_json_buffer {
        return Err(ValidationError::JsonLimitExceeded { part: name });
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|_| ValidationError::JsonParseFailed { part: name })?;
    check_string_limits(&value, name, config)?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::JsonParseFailed { part: name }),
    }
}

fn check_string_limits(
    value: &Value,
    name: &'static str,
    config: &ParserConfig,
) -> Result<(), ValidationError> {
    match value {
        Value::String(s) if s.len() > config.max_json_string => {
            Err(ValidationError::JsonLimitExceeded { part: name })
        }
        Value::Array(items) => {
            for item in items {
                check_string_limits(item, name, config)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for v in map.values() {
                check_string_limits(v, name, config)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParserConfig {
        ParserConfig::default()
    }

    fn encode(value: &Value) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value.to_string())
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(TokenDecoder::decode("", &cfg()).unwrap_err(), ValidationError::TokenEmpty);
    }

    #[test]
    fn rejects_two_part_token() {
        let err = TokenDecoder::decode("a.b", &cfg()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidStructure { .. }));
    }

    #[test]
    fn rejects_oversized_token() {
        let tiny = ParserConfig::default().with_max_token_size(4);
        let err = TokenDecoder::decode("aaaaaaaaaa.bbbb.cccc", &tiny).unwrap_err();
        assert_eq!(err, ValidationError::TokenTooLarge { max: 4 });
    }

    #[test]
    fn decodes_well_formed_token() {
        let header = serde_json::json!({"alg": "RS256", "kid": "k1", "typ": "JWT"});
        let payload = serde_json::json!({"iss": "https://issuer.example", "exp": 9999999999i64});
        let raw = format!("{}.{}.{}", encode(&header), encode(&payload), "c2ln");
        let decoded = TokenDecoder::decode(&raw, &cfg()).unwrap();
        assert_eq!(decoded.header.get("alg").unwrap(), "RS256");
        assert_eq!(decoded.payload.get("iss").unwrap(), "https://issuer.example");
    }

    #[test]
    fn duplicate_json_keys_last_wins() {
        let raw_header = r#"{"alg":"RS256","alg":"ES256"}"#;
        let header_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw_header);
        let payload = serde_json::json!({"exp": 1});
        let raw = format!("{}.{}.{}", header_b64, encode(&payload), "c2ln");
        let decoded = TokenDecoder::decode(&raw, &cfg()).unwrap();
        assert_eq!(decoded.header.get("alg").unwrap(), "ES256");
    }
}
