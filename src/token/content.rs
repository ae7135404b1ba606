//! Typed token content produced at the end of the pipeline.
//!
//! Modeled as a flat tagged enum rather than a trait-object hierarchy: access,
//! ID, and refresh tokens share a handful of accessors but otherwise carry
//! different claim shapes, and a `match` on a closed enum is simpler to read
//! and exhaustiveness-check than a `dyn ClaimView` object hierarchy would be.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Shared read-only accessors common to every validated token kind.
pub trait ClaimView {
    fn issuer(&self) -> &str;
    fn subject(&self) -> Option<&str>;
    fn expires_at(&self) -> Option<i64>;
    fn raw_payload(&self) -> &Map<String, Value>;
}

#[derive(Debug, Clone)]
pub struct AccessTokenContent {
    pub issuer: String,
    pub subject: Option<String>,
    pub expires_at: Option<i64>,
    pub scopes: HashSet<String>,
    pub roles: HashSet<String>,
    pub groups: HashSet<String>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct IdTokenContent {
    pub issuer: String,
    pub subject: Option<String>,
    pub expires_at: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenContent {
    pub issuer: String,
    pub subject: Option<String>,
    pub expires_at: Option<i64>,
    pub payload: Map<String, Value>,
}

/// The validated, typed result of one pipeline run.
#[derive(Debug, Clone)]
pub enum ValidatedToken {
    Access(AccessTokenContent),
    Id(IdTokenContent),
    Refresh(RefreshTokenContent),
}

impl ClaimView for ValidatedToken {
    fn issuer(&self) -> &str {
        match self {
            Self::Access(t) => &t.issuer,
            Self::Id(t) => &t.issuer,
            Self::Refresh(t) => &t.issuer,
        }
    }

    fn subject(&self) -> Option<&str> {
        match self {
            Self::Access(t) => t.subject.as_deref(),
            Self::Id(t) => t.subject.as_deref(),
            Self::Refresh(t) => t.subject.as_deref(),
        }
    }

    fn expires_at(&self) -> Option<i64> {
        match self {
            Self::Access(t) => t.expires_at,
            Self::Id(t) => t.expires_at,
            Self::Refresh(t) => t.expires_at,
        }
    }

    fn raw_payload(&self) -> &Map<String, Value> {
        match self {
            Self::Access(t) => &t.payload,
            Self::Id(t) => &t.payload,
            Self::Refresh(t) => &t.payload,
        }
    }
}

impl ValidatedToken {
    pub fn as_access(&self) -> Option<&AccessTokenContent> {
        match self {
            Self::Access(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&IdTokenContent> {
        match self {
            Self::Id(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_refresh(&self) -> Option<&RefreshTokenContent> {
        match self {
            Self::Refresh(t) => Some(t),
            _ => None,
        }
    }
}

fn string_set(payload: &Map<String, Value>, claim: &str) -> HashSet<String> {
    match payload.get(claim) {
        Some(Value::String(s)) if claim == "scope" => {
            s.split_whitespace().map(str::to_string).collect()
        }
        Some(Value::String(s)) => [s.clone()].into_iter().collect(),
        Some(Value::Array(items)) => {
            items.iter().filter_map(Value::as_str).map(str::to_string).collect()
        }
        _ => HashSet::new(),
    }
}

impl AccessTokenContent {
    pub fn from_payload(issuer: String, payload: Map<String, Value>) -> Self {
        let mut scopes = string_set(&payload, "scope");
        scopes.extend(string_set(&payload, "scp"));
        Self {
            issuer,
            subject: payload.get("sub").and_then(Value::as_str).map(str::to_string),
            expires_at: payload.get("exp").and_then(Value::as_i64),
            scopes,
            roles: string_set(&payload, "roles"),
            groups: string_set(&payload, "groups"),
            payload,
        }
    }
}

impl IdTokenContent {
    pub fn from_payload(issuer: String, payload: Map<String, Value>) -> Self {
        Self {
            issuer,
            subject: payload.get("sub").and_then(Value::as_str).map(str::to_string),
            expires_at: payload.get("exp").and_then(Value::as_i64),
            name: payload.get("name").and_then(Value::as_str).map(str::to_string),
            email: payload.get("email").and_then(Value::as_str).map(str::to_string),
            payload,
        }
    }
}

impl RefreshTokenContent {
    pub fn from_payload(issuer: String, payload: Map<String, Value>) -> Self {
        Self {
            issuer,
            subject: payload.get("sub").and_then(Value::as_str).map(str::to_string),
            expires_at: payload.get("exp").and_then(Value::as_i64),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn access_token_merges_scope_and_scp() {
        let payload = obj(json!({"sub": "u1", "exp": 1, "scope": "read write", "scp": ["admin"]}));
        let token = AccessTokenContent::from_payload("iss".into(), payload);
        assert!(token.scopes.contains("read"));
        assert!(token.scopes.contains("admin"));
    }

    #[test]
    fn claim_view_dispatches_across_variants() {
        let access = ValidatedToken::Access(AccessTokenContent::from_payload(
            "iss".into(),
            obj(json!({"sub": "u1", "exp": 42})),
        ));
        assert_eq!(access.issuer(), "iss");
        assert_eq!(access.expires_at(), Some(42));
        assert_eq!(access.subject(), Some("u1"));
    }
}
