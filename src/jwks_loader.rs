//! C8: the key-set lifecycle — fetch, parse, generation-swap, grace-window
//! retirement, and background refresh.
//!
//! The background refresh task is a plain `std::thread` parked on a
//! `Condvar` with a timeout, woken immediately by `shutdown()` setting an
//! `Arc<AtomicBool>` flag — the same shape as the teacher's worker threads,
//! adapted from coroutine (`may`) to native threads since `validate()` must
//! stay synchronous and this crate carries no async runtime. The
//! current-generation pointer swap is `arc-swap`, not the teacher's
//! `Mutex<(Instant, HashMap<..>)>` in `jwks_bearer.rs`, because readers here
//! must never block behind a refresh in flight.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::{JwksLoaderConfig, JwksSource, KeyFamily, ParserConfig};
use crate::discovery::WellKnownResolver;
use crate::error::ValidationError;
use crate::http::{FetchOutcome, ResilientHttpFetcher};
use crate::jwk::{JwksParser, KeyMaterial};
use crate::metrics::{EventKind, SecurityEventCounter};

/// One immutable generation of resolved key material.
struct KeySet {
    generation: u64,
    keys: Vec<KeyMaterial>,
    etag: Option<String>,
    last_modified: Option<String>,
}

impl KeySet {
    fn empty(generation: u64) -> Self {
        Self { generation, keys: Vec::new(), etag: None, last_modified: None }
    }

    fn find(&self, kid: Option<&str>, family: KeyFamily) -> Option<&KeyMaterial> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid() == Some(kid) && k.family() == family),
            None => {
                let mut matching = self.keys.iter().filter(|k| k.family() == family);
                let first = matching.next()?;
                if matching.next().is_some() {
                    None
                } else {
                    Some(first)
                }
            }
        }
    }
}

/// Coarse health state surfaced by `TokenValidator::health()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Unstarted,
    Loading,
    Healthy,
    Degraded,
    Error,
}

impl LoaderState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::Unstarted,
            1 => Self::Loading,
            2 => Self::Healthy,
            3 => Self::Degraded,
            _ => Self::Error,
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Unstarted => 0,
            Self::Loading => 1,
            Self::Healthy => 2,
            Self::Degraded => 3,
            Self::Error => 4,
        }
    }
}

/// Point-in-time health snapshot.
#[derive(Debug, Clone)]
pub struct LoaderHealth {
    pub state: LoaderState,
    pub current_generation: u64,
    pub current_generation_age: Option<Duration>,
    pub retired_generations: usize,
}

pub struct JwksLoader {
    config: JwksLoaderConfig,
    parser_config: ParserConfig,
    fetcher: Option<ResilientHttpFetcher>,
    well_known: Option<WellKnownResolver>,
    current: ArcSwap<KeySet>,
    current_fetched_at: Mutex<Option<Instant>>,
    retired: Mutex<VecDeque<(Arc<KeySet>, Instant)>>,
    next_generation: AtomicU64,
    state: AtomicU8,
    shutdown: Arc<AtomicBool>,
    wake: Arc<(Mutex<()>, Condvar)>,
    refresh_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl JwksLoader {
    pub fn new(config: JwksLoaderConfig, parser_config: ParserConfig) -> Result<Self, ValidationError> {
        let needs_http = matches!(config.source, JwksSource::Http { .. });
        let fetcher = if needs_http { Some(ResilientHttpFetcher::new(&config)?) } else { None };
        let well_known = match &config.source {
            JwksSource::Http { well_known_url: Some(url), .. } => {
                Some(WellKnownResolver::new(url.clone()))
            }
            _ => None,
        };

        Ok(Self {
            config,
            parser_config,
            fetcher,
            well_known,
            current: ArcSwap::from_pointee(KeySet::empty(0)),
            current_fetched_at: Mutex::new(None),
            retired: Mutex::new(VecDeque::new()),
            next_generation: AtomicU64::new(1),
            state: AtomicU8::new(LoaderState::Unstarted.tag()),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new((Mutex::new(()), Condvar::new())),
            refresh_thread: Mutex::new(None),
        })
    }

    /// Performs the first synchronous load and, for sources with a refresh
    /// interval, spawns the background refresh thread.
    pub fn init(self: &Arc<Self>, counters: &Arc<SecurityEventCounter>) -> Result<(), ValidationError> {
        self.state.store(LoaderState::Loading.tag(), Ordering::Release);
        self.load_once(counters)?;
        self.state.store(LoaderState::Healthy.tag(), Ordering::Release);

        if let Some(interval) = self.config.refresh_interval {
            let loader = Arc::clone(self);
            let counters = Arc::clone(counters);
            let shutdown = Arc::clone(&self.shutdown);
            let wake = Arc::clone(&self.wake);
            let handle = std::thread::spawn(move || {
                background_refresh_loop(loader, counters, shutdown, wake, interval);
            });
            *self.refresh_thread.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
        }
        Ok(())
    }

    /// Explicit re-read for the `File` source variant; a no-op shape for
    /// sources that refresh on their own schedule.
    pub fn reload(&self, counters: &Arc<SecurityEventCounter>) -> Result<(), ValidationError> {
        self.load_once(counters)
    }

    fn load_once(&self, counters: &Arc<SecurityEventCounter>) -> Result<(), ValidationError> {
        let (bytes, etag, last_modified) = match self.fetch_bytes()? {
            Some(fetched) => fetched,
            None => return Ok(()), // 304 Not Modified, current generation stands.
        };

        let jwks = JwksParser::parse(&bytes, &self.parser_config)?;
        let mut keys = Vec::with_capacity(jwks.len());
        for jwk in &jwks {
            match KeyMaterial::from_jwk(jwk, self.parser_config.min_rsa_modulus_bits) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    e.log();
                    counters.increment(EventKind::from_validation_error(&e));
                }
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        let new_set = Arc::new(KeySet { generation, keys, etag, last_modified });
        let previous = self.current.swap(new_set);
        *self.current_fetched_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());

        if previous.generation != 0 || !previous.keys.is_empty() {
            let mut retired = self.retired.lock().unwrap_or_else(|p| p.into_inner());
            retired.push_back((previous, Instant::now()));
            self.prune_retired(&mut retired);
        }

        Ok(())
    }

    /// Returns the new body plus its cache validators on a change, or `None`
    /// on a 304 (current generation stands, validators included).
    #[allow(clippy::type_complexity)]
    fn fetch_bytes(&self) -> Result<Option<(Vec<u8>, Option<String>, Option<String>)>, ValidationError> {
        match &self.config.source {
            JwksSource::Static { jwks_json } => Ok(Some((jwks_json.clone().into_bytes(), None, None))),
            JwksSource::File { path } => std::fs::read(path)
                .map(|bytes| Some((bytes, None, None)))
                .map_err(|e| ValidationError::JwksFetchFailed {
                    url: path.display().to_string(),
                    reason: e.to_string(),
                }),
            JwksSource::Http { jwks_url, .. } => {
                let fetcher = self.fetcher.as_ref().expect("http source always has a fetcher");

                let url = if let Some(url) = jwks_url {
                    url.clone()
                } else if let Some(resolver) = &self.well_known {
                    resolver.resolve(fetcher)?.jwks_uri.clone()
                } else {
                    return Err(ValidationError::NoIssuerConfig);
                };

                let (prior_etag, prior_last_modified) = {
                    let current = self.current.load();
                    (current.etag.clone(), current.last_modified.clone())
                };

                match fetcher.fetch(&url, prior_etag.as_deref(), prior_last_modified.as_deref())? {
                    FetchOutcome::Modified { body, etag, last_modified } => Ok(Some((body, etag, last_modified))),
                    FetchOutcome::NotModified => Ok(None),
                }
            }
        }
    }

    fn prune_retired(&self, retired: &mut VecDeque<(Arc<KeySet>, Instant)>) {
        let grace = self.config.grace_window;
        while let Some((_, retired_at)) = retired.front() {
            if retired_at.elapsed() > grace {
                retired.pop_front();
            } else {
                break;
            }
        }
        while retired.len() > self.config.max_retired_sets {
            retired.pop_front();
        }
    }

    /// Looks up a key by `kid`/family, checking the current generation first
    /// and falling back to retired-but-not-yet-pruned generations.
    pub fn get_key(
        &self,
        kid: Option<&str>,
        family: KeyFamily,
        counters: &SecurityEventCounter,
    ) -> Result<KeyMaterial, ValidationError> {
        let current = self.current.load();
        if let Some(key) = current.find(kid, family) {
            return Ok(key.clone());
        }

        let retired = self.retired.lock().unwrap_or_else(|p| p.into_inner());
        for (set, _) in retired.iter().rev() {
            if let Some(key) = set.find(kid, family) {
                counters.increment(EventKind::UsedRetiredKey);
                return Ok(key.clone());
            }
        }

        Err(ValidationError::KeyNotFound { kid: kid.map(str::to_string) })
    }

    /// Total candidate keys of `family` in the current generation — used by
    /// `HeaderValidator` to decide whether a missing `kid` is tolerable.
    pub fn candidate_count(&self, family: KeyFamily) -> usize {
        self.current.load().keys.iter().filter(|k| k.family() == family).count()
    }

    /// The issuer identifier discovered via `.well-known`, if discovery has
    /// already completed — used by `IssuerResolver` to derive an identifier
    /// for configs that don't set one statically. Never triggers a fetch.
    pub fn discovered_issuer(&self) -> Option<String> {
        self.well_known.as_ref().and_then(WellKnownResolver::peek).map(|e| e.issuer.clone())
    }

    pub fn health(&self) -> LoaderHealth {
        let current = self.current.load();
        let fetched_at = *self.current_fetched_at.lock().unwrap_or_else(|p| p.into_inner());
        let retired_count = self.retired.lock().unwrap_or_else(|p| p.into_inner()).len();
        LoaderHealth {
            state: LoaderState::from_tag(self.state.load(Ordering::Acquire)),
            current_generation: current.generation,
            current_generation_age: fetched_at.map(|t| t.elapsed()),
            retired_generations: retired_count,
        }
    }

    /// Signals the background refresh thread to stop and waits for it to
    /// exit, within a caller-supplied grace period.
    pub fn shutdown(&self, grace_period: Duration) {
        self.shutdown.store(true, Ordering::Release);
        let (lock, cvar) = &*self.wake;
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        cvar.notify_all();
        drop(_guard);

        if let Some(handle) = self.refresh_thread.lock().unwrap_or_else(|p| p.into_inner()).take() {
            let start = Instant::now();
            while !handle.is_finished() && start.elapsed() < grace_period {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn background_refresh_loop(
    loader: Arc<JwksLoader>,
    counters: Arc<SecurityEventCounter>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<(Mutex<()>, Condvar)>,
    interval: Duration,
) {
    let (lock, cvar) = &*wake;
    loop {
        let guard = lock.lock().unwrap_or_else(|p| p.into_inner());
        let (_guard, timeout_result) = cvar
            .wait_timeout_while(guard, interval, |_| !shutdown.load(Ordering::Acquire))
            .unwrap_or_else(|p| p.into_inner());
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        if timeout_result.timed_out() {
            match loader.load_once(&counters) {
                Ok(()) => loader.state.store(LoaderState::Healthy.tag(), Ordering::Release),
                Err(e) => {
                    e.log();
                    loader.state.store(LoaderState::Degraded.tag(), Ordering::Release);
                }
            }
        }
    }
}

impl EventKind {
    /// Maps a key-material construction failure to its counter kind, for the
    /// "drop the bad key, keep the rest, still count it" path in
    /// `JwksLoader::load_once`.
    fn from_validation_error(err: &ValidationError) -> Self {
        match err {
            ValidationError::RsaKeyTooSmall { .. } => Self::RsaKeyTooSmall,
            ValidationError::UnsupportedCurve { .. } => Self::UnsupportedCurve,
            _ => Self::JwksJsonParseFailed,
        }
    }
}
