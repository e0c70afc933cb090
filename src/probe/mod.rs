//! Registry protocol probing
//!
//! A probe is a single bounded GET against a well-known registry path, made
//! only to learn whether the endpoint is reachable and which scheme it
//! speaks. The prober holds no state and classifies every outcome so the
//! fallback policy can decide whether to try another path, another protocol,
//! or give up.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::constants::probe::DEFAULT_TIMEOUT_SECS;


/// Basic-auth credentials attached to a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Recognized per-probe options.
///
/// Options are applied to the request in a fixed order: basic auth first,
/// then the bearer token, so a bearer token wins when both are set.
/// `force_scheme` is consumed by the detector before any request is made.
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    pub basic_auth: Option<BasicAuth>,
    pub bearer_token: Option<String>,
    pub force_scheme: Option<String>,
}

impl ProbeOptions {
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_force_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.force_scheme = Some(scheme.into());
        self
    }
}

/// Classification of a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Certificate validation or hostname verification failed
    CertificateTrust,
    /// A TLS client received a plaintext response
    PlaintextServer,
    /// A plaintext client received a malformed (likely TLS) response
    TlsServer,
    /// Everything else: refused, timed out, unresolvable
    Connection,
}

/// A failure below the HTTP layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A response that made it through the transport
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The opaque HTTP transport a probe goes through.
///
/// Implementations must be cheap to clone and must apply `options` to the
/// individual request only, never to shared state, so concurrent callers
/// cannot observe each other's credentials. `skip_tls_verify` toggles
/// certificate verification for this call alone.
pub trait Transport: Clone {
    fn get(
        &self,
        url: &str,
        options: &ProbeOptions,
        skip_tls_verify: bool,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Transport backed by reqwest.
///
/// Two clients are built up front, one verifying and one not; selecting
/// between them per call keeps TLS toggling away from any shared mutable
/// configuration. reqwest clients are internally reference-counted, so
/// cloning this transport is cheap.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    verified: reqwest::Client,
    insecure: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let build = |insecure: bool| {
            reqwest::Client::builder()
                .timeout(timeout)
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| TransportError::new(TransportErrorKind::Connection, e.to_string()))
        };
        Ok(Self {
            verified: build(false)?,
            insecure: build(true)?,
        })
    }
}

impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        options: &ProbeOptions,
        skip_tls_verify: bool,
    ) -> Result<TransportResponse, TransportError> {
        let client = if skip_tls_verify {
            &self.insecure
        } else {
            &self.verified
        };

        let mut request = client.get(url);
        if let Some(basic) = &options.basic_auth {
            request = request.basic_auth(&basic.username, Some(&basic.password));
        }
        if let Some(token) = &options.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

/// Map a reqwest failure to a [`TransportError`].
///
/// Structured signals are consulted first; the remaining TLS failure modes
/// are only distinguishable by message text, so that matching lives in
/// [`classify_error_text`].
fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Connection, message);
    }
    TransportError::new(classify_error_text(&message), message)
}

/// Substring classification of transport error text.
///
/// Coupling to transport error strings is fragile; every signature lives
/// here so the whole scheme can be replaced in one place once the transport
/// exposes structured TLS errors.
fn classify_error_text(message: &str) -> TransportErrorKind {
    const CERTIFICATE_SIGNATURES: [&str; 6] = [
        "certificate",
        "self-signed",
        "self signed",
        "hostname mismatch",
        "UnknownIssuer",
        "NotValidForName",
    ];
    const PLAINTEXT_SERVER_SIGNATURES: [&str; 4] = [
        "wrong version number",
        "plain HTTP",
        "corrupt message",
        "record overflow",
    ];
    const TLS_SERVER_SIGNATURES: [&str; 3] = [
        "invalid HTTP version",
        "malformed HTTP response",
        "invalid status line",
    ];

    if CERTIFICATE_SIGNATURES.iter().any(|s| message.contains(s)) {
        TransportErrorKind::CertificateTrust
    } else if PLAINTEXT_SERVER_SIGNATURES.iter().any(|s| message.contains(s)) {
        TransportErrorKind::PlaintextServer
    } else if TLS_SERVER_SIGNATURES.iter().any(|s| message.contains(s)) {
        TransportErrorKind::TlsServer
    } else {
        TransportErrorKind::Connection
    }
}

/// Classified probe failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The endpoint answered with a non-2xx status and no recognizable error
    /// envelope; a different path on the same protocol may still succeed.
    /// Internal signal, always folded into a fallback decision.
    #[error("registry probe returned {status}: {message}")]
    RetryablePath { status: u16, message: String },

    /// The endpoint is a real registry that answered with its own error
    /// envelope; there is no point trying other protocols.
    #[error("registry responded with error ({status}): {message}")]
    Application { status: u16, message: String },

    /// Certificate validation failed
    #[error("certificate trust failure: {0}")]
    CertificateTrust(String),

    /// The endpoint could not be reached over this protocol
    #[error("connection failed: {message}")]
    Connection {
        kind: TransportErrorKind,
        message: String,
    },
}

/// Body shape of a Docker-style registry error response
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Extract a printable message from a registry error envelope, if the body
/// is one
fn parse_error_envelope(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let first = envelope.errors.first()?;
    if first.message.is_empty() {
        Some(first.code.clone())
    } else {
        Some(format!("{}: {}", first.code, first.message))
    }
}

/// Stateless prober; safe to call concurrently
#[derive(Debug, Clone)]
pub struct RegistryProber<T: Transport> {
    transport: T,
}

impl<T: Transport> RegistryProber<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Probe a candidate URL once.
    ///
    /// 200 is success. A non-200 carrying a registry error envelope is an
    /// application-level error; any other non-200 is retryable on a
    /// different path. Transport failures keep their classification.
    pub async fn probe(&self, url: &str, options: &ProbeOptions) -> Result<(), ProbeError> {
        debug!(url, "probing registry endpoint");

        let response = self
            .transport
            .get(url, options, false)
            .await
            .map_err(|e| match e.kind {
                TransportErrorKind::CertificateTrust => ProbeError::CertificateTrust(e.message),
                kind => ProbeError::Connection {
                    kind,
                    message: e.message,
                },
            })?;

        match response.status {
            200 => Ok(()),
            status => {
                if let Some(message) = parse_error_envelope(&response.body) {
                    Err(ProbeError::Application { status, message })
                } else {
                    Err(ProbeError::RetryablePath {
                        status,
                        message: status_text(status).to_string(),
                    })
                }
            }
        }
    }
}

/// Human-readable text for the statuses a probe commonly sees
fn status_text(status: u16) -> &'static str {
    match status {
        301 => "Moved Permanently",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unexpected Status",
    }
}
