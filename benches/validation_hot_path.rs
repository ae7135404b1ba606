//! Hot-path benchmarks for the public `TokenValidator` façade: a cache hit,
//! a cache miss (full decode+verify+claims pipeline), and the same pipeline
//! under concurrent access — adapted from `jwt_cache_performance.rs`'s
//! `bench_cache_hit`/`bench_cache_miss`/`bench_concurrent_access` onto this
//! crate's RustCrypto-backed RS256 path instead of `jsonwebtoken`'s HS256.

use base64::Engine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jwtguard::config::{IssuerConfig, JwksLoaderConfig, ValidatorConfig};
use jwtguard::TokenValidator;
use rsa::pkcs1v15::SigningKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use std::sync::Arc;

fn b64u(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
    let mut rng = rand::thread_rng();
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("keygen");
    let public = RsaPublicKey::from(&private);
    (private, public)
}

fn jwk(public: &RsaPublicKey, kid: &str) -> serde_json::Value {
    serde_json::json!({
        "kty": "RSA", "kid": kid, "alg": "RS256",
        "n": b64u(&public.n().to_bytes_be()), "e": b64u(&public.e().to_bytes_be()),
    })
}

fn make_token(private: &RsaPrivateKey, kid: &str, sub: &str) -> String {
    let header = serde_json::json!({"alg": "RS256", "typ": "JWT", "kid": kid});
    let claims = serde_json::json!({
        "iss": "https://issuer.example",
        "aud": "api://default",
        "sub": sub,
        "exp": 99999999999i64,
        "scope": "read write",
    });
    let signing_input =
        format!("{}.{}", b64u(header.to_string().as_bytes()), b64u(claims.to_string().as_bytes()));
    let signing_key = SigningKey::<Sha256>::new(private.clone());
    let signature = signing_key.sign(signing_input.as_bytes());
    format!("{signing_input}.{}", b64u(&signature.to_bytes()))
}

fn build_validator(public: &RsaPublicKey) -> TokenValidator {
    let jwks = serde_json::json!({"keys": [jwk(public, "k1")]});
    let issuer = IssuerConfig::new("primary", JwksLoaderConfig::static_jwks(jwks.to_string()))
        .with_issuer_identifier("https://issuer.example")
        .with_audience("api://default");
    TokenValidator::new(ValidatorConfig::default().with_issuer(issuer)).expect("validator construction")
}

fn bench_cache_hit(c: &mut Criterion) {
    let (private, public) = keypair();
    let validator = build_validator(&public);
    let token = make_token(&private, "k1", "u1");
    validator.validate_access_token(&token).expect("warm-up validation");

    c.bench_function("validate_access_token_cache_hit", |b| {
        b.iter(|| black_box(validator.validate_access_token(black_box(&token))))
    });
}

fn bench_cache_miss(c: &mut Criterion) {
    let (private, public) = keypair();
    let validator = build_validator(&public);
    let mut counter = 0u64;

    c.bench_function("validate_access_token_cache_miss", |b| {
        b.iter(|| {
            counter += 1;
            let token = make_token(&private, "k1", &format!("u{counter}"));
            black_box(validator.validate_access_token(black_box(&token)))
        })
    });
}

fn bench_concurrent_hits(c: &mut Criterion) {
    let (private, public) = keypair();
    let validator = Arc::new(build_validator(&public));
    let token = Arc::new(make_token(&private, "k1", "u1"));
    validator.validate_access_token(&token).expect("warm-up validation");

    let mut group = c.benchmark_group("validate_access_token_concurrent");
    for threads in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &num_threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..num_threads)
                    .map(|_| {
                        let validator = Arc::clone(&validator);
                        let token = Arc::clone(&token);
                        std::thread::spawn(move || {
                            for _ in 0..50 {
                                black_box(validator.validate_access_token(&token)).ok();
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("benchmark worker thread");
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cache_hit, bench_cache_miss, bench_concurrent_hits);
criterion_main!(benches);
