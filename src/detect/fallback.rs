//! Ordered path and protocol fallback
//!
//! Registries differ along two independent axes: which health path they
//! serve (an old registry may lack `/v2/` regardless of protocol) and which
//! scheme they speak (a wrong scheme is wrong on every path). The policy
//! iterates paths in the outer loop and protocols in the inner loop so a
//! failure on one axis never exhausts the other.

use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{probe::PATHS, scheme};
use crate::probe::{ProbeError, ProbeOptions, RegistryProber, Transport, TransportErrorKind};

/// Hint appended when an https probe got a plaintext answer and insecure
/// registries are not allowed
const HINT_PLAINTEXT_SERVER: &str =
    "the registry appears to speak plain HTTP; retry with insecure registries allowed";

/// Hint appended when an http probe got a malformed (likely TLS) answer
const HINT_TLS_SERVER: &str =
    "the registry appears to require TLS; retry with an https:// host";

/// Terminal outcome of scheme detection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DetectError {
    /// A real registry answered with its own error envelope
    #[error("registry at {url} responded with error ({status}): {message}")]
    Application {
        url: String,
        status: u16,
        message: String,
    },

    /// Certificate validation failed and insecure registries are not allowed
    #[error("certificate trust failure for {url}: {message}")]
    CertificateTrust { url: String, message: String },

    /// Every path and protocol combination failed; `attempts` preserves each
    /// failure message and any remediation hints so operators can see every
    /// avenue tried
    #[error("cannot determine scheme for registry {host}: {}", .attempts.join("; "))]
    NoReachableScheme { host: String, attempts: Vec<String> },
}

/// Split an explicit `scheme://` prefix off a host string
pub(crate) fn split_scheme(host: &str) -> (Option<&'static str>, &str) {
    if let Some(rest) = host.strip_prefix(scheme::HTTPS_PREFIX) {
        (Some(scheme::HTTPS), rest)
    } else if let Some(rest) = host.strip_prefix(scheme::HTTP_PREFIX) {
        (Some(scheme::HTTP), rest)
    } else {
        (None, host)
    }
}

/// Heuristic for hosts that commonly run plaintext registries: loopback and
/// RFC1918 addresses, `localhost`, and cluster-internal name suffixes.
pub(crate) fn is_private_host(host: &str) -> bool {
    // Bare IPv6 literals contain colons; try the whole string before
    // splitting a port off.
    let name = match host.parse::<IpAddr>() {
        Ok(_) => host,
        Err(_) => host
            .rsplit_once(':')
            .filter(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
            .map(|(name, _)| name)
            .unwrap_or(host)
            .trim_start_matches('[')
            .trim_end_matches(']'),
    };

    if let Ok(ip) = name.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_loopback(),
        };
    }

    name == "localhost"
        || name.ends_with(".localhost")
        || name.ends_with(".local")
        || name.ends_with(".internal")
        || name.ends_with(".svc")
        || name.ends_with(".cluster.local")
}

/// Tries well-known paths and candidate protocols in order, aggregating
/// failures.
#[derive(Debug, Clone)]
pub struct FallbackPolicy<T: Transport> {
    prober: RegistryProber<T>,
    allow_insecure: bool,
}

impl<T: Transport> FallbackPolicy<T> {
    pub fn new(transport: T, allow_insecure: bool) -> Self {
        Self {
            prober: RegistryProber::new(transport),
            allow_insecure,
        }
    }

    /// Resolve the URL a registry actually answers on.
    ///
    /// Candidate protocols: an explicit scheme on the host is taken alone;
    /// otherwise https, with http added when insecure registries are allowed
    /// or the host looks private. Each path+protocol combination is probed
    /// exactly once.
    ///
    /// An application-level answer or a non-tolerated certificate failure
    /// ends the search immediately. A certificate failure with insecure
    /// registries allowed counts as success, logged at warn. Everything else
    /// accumulates into [`DetectError::NoReachableScheme`].
    pub async fn resolve(
        &self,
        host: &str,
        options: &ProbeOptions,
    ) -> Result<String, DetectError> {
        let (explicit, bare_host) = split_scheme(host);
        let candidates: Vec<&str> = match explicit {
            Some(explicit) => vec![explicit],
            None if self.allow_insecure || is_private_host(bare_host) => {
                vec![scheme::HTTPS, scheme::HTTP]
            }
            None => vec![scheme::HTTPS],
        };
        debug!(host, ?candidates, "resolving registry scheme");

        let mut attempts = Vec::new();
        for path in PATHS {
            let mut terminal: Option<DetectError> = None;

            for candidate in &candidates {
                let url = format!("{}://{}{}", candidate, bare_host, path);
                match self.prober.probe(&url, options).await {
                    Ok(()) => return Ok(url),
                    Err(ProbeError::Application { status, message }) => {
                        // A real registry answered; other protocols are moot.
                        return Err(DetectError::Application {
                            url,
                            status,
                            message,
                        });
                    }
                    Err(ProbeError::CertificateTrust(message)) => {
                        if self.allow_insecure {
                            warn!(
                                url = %url,
                                error = %message,
                                "certificate verification failed, accepting because insecure registries are allowed"
                            );
                            return Ok(url);
                        }
                        attempts.push(format!("{}: {}", url, message));
                        if terminal.is_none() {
                            terminal = Some(DetectError::CertificateTrust { url, message });
                        }
                    }
                    Err(ProbeError::Connection { kind, message }) => {
                        attempts.push(format!("{}: {}", url, message));
                        match kind {
                            TransportErrorKind::PlaintextServer if !self.allow_insecure => {
                                attempts.push(HINT_PLAINTEXT_SERVER.to_string());
                            }
                            TransportErrorKind::TlsServer => {
                                attempts.push(HINT_TLS_SERVER.to_string());
                            }
                            _ => {}
                        }
                    }
                    Err(err @ ProbeError::RetryablePath { .. }) => {
                        attempts.push(format!("{}: {}", url, err));
                    }
                }
            }

            // Path-scoped failures fall through to the next path; anything
            // terminal ends the search with that error.
            if let Some(err) = terminal {
                return Err(err);
            }
        }

        Err(DetectError::NoReachableScheme {
            host: host.to_string(),
            attempts,
        })
    }
}
