//! C15: multi-issuer resolution with two-phase lazy initialization — a
//! pending queue drained under a single mutex during warm-up, frozen into a
//! lock-free immutable snapshot once every configured issuer has been
//! classified.
//!
//! The drain-then-freeze shape mirrors `ValidatorCache::get_or_compile`'s
//! "build once under a lock, then serve from the cached result" pattern,
//! generalized from a single cached value to a whole map plus an explicit
//! `optimized` flag so steady-state reads never touch a lock at all.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::config::IssuerConfig;
use crate::error::ValidationError;
use crate::jwks_loader::JwksLoader;

/// One configured, resolvable issuer: its policy plus its owned key loader.
pub struct IssuerEntry {
    pub config: IssuerConfig,
    pub loader: Arc<JwksLoader>,
}

impl std::fmt::Debug for IssuerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerEntry").field("config", &self.config).finish_non_exhaustive()
    }
}

impl IssuerEntry {
    fn identifier(&self) -> Option<String> {
        self.config.issuer_identifier.clone().or_else(|| self.loader.discovered_issuer())
    }
}

pub struct IssuerResolver {
    fast_path: DashMap<String, Arc<IssuerEntry>>,
    pending: Mutex<VecDeque<Arc<IssuerEntry>>>,
    snapshot: ArcSwap<Option<HashMap<String, Arc<IssuerEntry>>>>,
    optimized: AtomicBool,
    draining: AtomicBool,
}

impl IssuerResolver {
    pub fn new(entries: Vec<IssuerEntry>) -> Self {
        let pending: VecDeque<Arc<IssuerEntry>> = entries
            .into_iter()
            .filter(|e| e.config.enabled)
            .map(Arc::new)
            .collect();

        Self {
            fast_path: DashMap::new(),
            pending: Mutex::new(pending),
            snapshot: ArcSwap::from_pointee(None),
            optimized: AtomicBool::new(false),
            draining: AtomicBool::new(false),
        }
    }

    /// Resolves the issuer owning `iss`. Lock-free once optimized; during
    /// warm-up, may drain part of the pending queue under a short-held lock.
    pub fn resolve(&self, iss: &str) -> Result<Arc<IssuerEntry>, ValidationError> {
        if self.optimized.load(Ordering::Acquire) {
            return self
                .snapshot
                .load()
                .as_ref()
                .as_ref()
                .and_then(|m| m.get(iss).cloned())
                .ok_or(ValidationError::NoIssuerConfig);
        }

        if let Some(entry) = self.fast_path.get(iss) {
            return Ok(Arc::clone(entry.value()));
        }

        self.drain_until_match_or_empty(iss);

        if self.optimized.load(Ordering::Acquire) {
            return self
                .snapshot
                .load()
                .as_ref()
                .as_ref()
                .and_then(|m| m.get(iss).cloned())
                .ok_or(ValidationError::NoIssuerConfig);
        }

        self.fast_path.get(iss).map(|e| Arc::clone(e.value())).ok_or(ValidationError::NoIssuerConfig)
    }

    /// Drains the pending queue, classifying each entry by its identifier
    /// into `fast_path`, stopping as soon as `wanted` is found or the queue
    /// is empty. Only one thread drains at a time; others wait briefly for
    /// it to finish rather than draining concurrently.
    fn drain_until_match_or_empty(&self, wanted: &str) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let start = Instant::now();
            while self.draining.load(Ordering::Acquire) && start.elapsed() < Duration::from_millis(50) {
                std::thread::yield_now();
            }
            return;
        }

        loop {
            let next = {
                let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
                pending.pop_front()
            };

            let Some(entry) = next else {
                self.freeze();
                break;
            };

            let found = entry.identifier().as_deref() == Some(wanted);
            if let Some(id) = entry.identifier() {
                self.fast_path.insert(id, entry);
            }
            if found {
                break;
            }
        }

        self.draining.store(false, Ordering::Release);
    }

    fn freeze(&self) {
        let snapshot: HashMap<String, Arc<IssuerEntry>> = self
            .fast_path
            .iter()
            .map(|kv| (kv.key().clone(), Arc::clone(kv.value())))
            .collect();
        self.snapshot.store(Arc::new(Some(snapshot)));
        self.optimized.store(true, Ordering::Release);
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwksLoaderConfig;

    fn entry(name: &str, identifier: &str) -> IssuerEntry {
        let jwks = JwksLoaderConfig::static_jwks("{\"keys\":[]}");
        let loader = Arc::new(JwksLoader::new(jwks, crate::config::ParserConfig::default()).unwrap());
        IssuerEntry {
            config: IssuerConfig::new(name, JwksLoaderConfig::static_jwks("{\"keys\":[]}"))
                .with_issuer_identifier(identifier),
            loader,
        }
    }

    #[test]
    fn resolves_and_then_optimizes_after_drain() {
        let resolver = IssuerResolver::new(vec![
            entry("a", "https://a.example"),
            entry("b", "https://b.example"),
        ]);
        assert!(!resolver.is_optimized());

        let resolved = resolver.resolve("https://b.example").unwrap();
        assert_eq!(resolved.config.name, "b");

        // Draining stops as soon as "b" (the second entry) is found, so the
        // queue may not be empty yet; resolving "a" (left behind) drains
        // the rest and freezes the snapshot.
        let resolved_a = resolver.resolve("https://a.example").unwrap();
        assert_eq!(resolved_a.config.name, "a");
        assert!(resolver.is_optimized());
    }

    #[test]
    fn unknown_issuer_after_optimization_is_fast_rejected() {
        let resolver = IssuerResolver::new(vec![entry("a", "https://a.example")]);
        assert!(resolver.resolve("https://a.example").is_ok());
        assert!(resolver.is_optimized());
        let err = resolver.resolve("https://unknown.example").unwrap_err();
        assert_eq!(err, ValidationError::NoIssuerConfig);
    }

    #[test]
    fn disabled_issuers_are_never_resolvable() {
        let disabled = IssuerConfig::new("c", JwksLoaderConfig::static_jwks("{\"keys\":[]}"))
            .with_issuer_identifier("https://c.example")
            .disabled();
        let loader = Arc::new(
            JwksLoader::new(
                JwksLoaderConfig::static_jwks("{\"keys\":[]}"),
                crate::config::ParserConfig::default(),
            )
            .unwrap(),
        );
        let resolver = IssuerResolver::new(vec![IssuerEntry { config: disabled, loader }]);
        let err = resolver.resolve("https://c.example").unwrap_err();
        assert_eq!(err, ValidationError::NoIssuerConfig);
    }
}
