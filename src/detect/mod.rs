//! Registry scheme detection
//!
//! The detector answers one question: does this registry speak `http` or
//! `https`? Hosts already carrying a scheme prefix are answered without any
//! network access, which makes detection idempotent over already-resolved
//! references. Everything else goes through the fallback policy, optionally
//! front-run by an in-memory per-instance cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::constants::scheme;
use crate::probe::{ProbeOptions, Transport};

mod fallback;

pub use fallback::{DetectError, FallbackPolicy};


/// Capability of resolving a registry's wire scheme.
///
/// Decorators (credentials, metrics, retries) compose over this trait in any
/// order; see [`CredentialedSchemeDetector`].
pub trait SchemeDetect {
    /// Resolve the scheme token (`"http"` or `"https"`) for a host
    fn detect_scheme(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> impl Future<Output = Result<String, DetectError>> + Send;

    /// Best-effort variant that never errors: a detection failure is logged
    /// and the supplied default substituted
    fn detect_scheme_with_default(
        &self,
        host: &str,
        default_scheme: &str,
        options: &ProbeOptions,
    ) -> impl Future<Output = String> + Send
    where
        Self: Sync,
    {
        async move {
            match self.detect_scheme(host, options).await {
                Ok(resolved) => resolved,
                Err(err) => {
                    debug!(
                        host,
                        default_scheme,
                        error = %err,
                        "scheme detection failed, using default"
                    );
                    default_scheme.to_string()
                }
            }
        }
    }
}

/// Scheme detector with an optional per-instance cache.
///
/// The cache is keyed by the exact host string, populated on first
/// successful resolution, and never invalidated within the process. Reads
/// and writes are concurrency-safe; duplicate in-flight probes for the same
/// host are allowed and last-writer-wins.
#[derive(Debug, Clone)]
pub struct SchemeDetector<T: Transport> {
    transport: T,
    allow_insecure: bool,
    cache: Option<Arc<RwLock<HashMap<String, String>>>>,
}

impl<T: Transport + Send + Sync> SchemeDetector<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            allow_insecure: false,
            cache: None,
        }
    }

    /// Tolerate plaintext registries and invalid certificates
    pub fn allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    /// Enable the in-memory scheme cache
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Arc::new(RwLock::new(HashMap::new())));
        self
    }

    fn cached_scheme(&self, host: &str) -> Option<String> {
        let cache = self.cache.as_ref()?;
        cache.read().ok()?.get(host).cloned()
    }

    fn store_scheme(&self, host: &str, resolved: &str) {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.write() {
                cache.insert(host.to_string(), resolved.to_string());
            }
        }
    }
}

impl<T: Transport + Send + Sync> SchemeDetect for SchemeDetector<T> {
    async fn detect_scheme(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> Result<String, DetectError> {
        // Already-resolved hosts and forced schemes never touch the network.
        if host.starts_with(scheme::HTTPS_PREFIX) {
            return Ok(scheme::HTTPS.to_string());
        }
        if host.starts_with(scheme::HTTP_PREFIX) {
            return Ok(scheme::HTTP.to_string());
        }
        if let Some(forced) = &options.force_scheme {
            debug!(host, forced = %forced, "scheme forced by options");
            return Ok(forced.clone());
        }

        if let Some(cached) = self.cached_scheme(host) {
            debug!(host, scheme = %cached, "scheme served from cache");
            return Ok(cached);
        }

        // The transport is cloned per call so per-call options can never
        // bleed into a shared client.
        let policy = FallbackPolicy::new(self.transport.clone(), self.allow_insecure);
        let url = policy.resolve(host, options).await?;
        let resolved = if url.starts_with(scheme::HTTPS_PREFIX) {
            scheme::HTTPS
        } else {
            scheme::HTTP
        };
        self.store_scheme(host, resolved);
        Ok(resolved.to_string())
    }
}

/// Decorator that attaches per-host credentials before delegating.
///
/// A lookup failure is not fatal: it is logged and the probe proceeds
/// anonymously. Credentials supplied by the caller in `options` always win
/// over the store's. The inner detector's short-circuit and caching
/// behavior is untouched.
#[derive(Debug, Clone)]
pub struct CredentialedSchemeDetector<D, S> {
    inner: D,
    store: S,
}

impl<D: SchemeDetect, S: CredentialStore> CredentialedSchemeDetector<D, S> {
    pub fn new(inner: D, store: S) -> Self {
        Self { inner, store }
    }
}

impl<D, S> SchemeDetect for CredentialedSchemeDetector<D, S>
where
    D: SchemeDetect + Sync,
    S: CredentialStore + Sync,
{
    async fn detect_scheme(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> Result<String, DetectError> {
        let mut options = options.clone();
        if options.basic_auth.is_none() {
            let (_, bare_host) = fallback::split_scheme(host);
            match self.store.lookup(bare_host) {
                Ok(Some(credential)) => {
                    debug!(host = bare_host, "attaching stored credentials to probe");
                    options = options
                        .with_basic_auth(credential.username, credential.password);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        host = bare_host,
                        error = %err,
                        "credential lookup failed, probing anonymously"
                    );
                }
            }
        }
        self.inner.detect_scheme(host, &options).await
    }
}
