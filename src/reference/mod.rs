//! Artifact reference parsing and validation
//!
//! A reference names an artifact in a registry, e.g.
//! `registry.example.com/org/repo:tag` or
//! `docker://docker.io/org/repo@sha256:<hex>`. Parsing is a single
//! left-to-right scan with no backtracking; validation is split per field so
//! callers can check only the fields their operation depends on.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::constants::protocol;

#[cfg(test)]
mod tests;

lazy_static! {
    // Lowercase-alphanumeric segments joined by '/'. Inside a segment the
    // allowed separators are a single '.', a single '_', a double '_', or a
    // run of '-'. ASCII classes are spelled out because the regex crate's \w
    // matches Unicode word characters.
    static ref PATH_PATTERN: Regex = Regex::new(
        r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*)*$"
    )
    .unwrap();
    static ref TAG_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_]{1,128}[A-Za-z0-9_.-]*$").unwrap();
    static ref FIRST_DIGEST_PATTERN: Regex =
        Regex::new(r"(sha256):([a-f0-9]{64})").unwrap();
}

/// Errors produced while parsing or validating a reference.
///
/// Parse errors (`MissingPathSeparator`, `MalformedAlgorithm`) are fatal for
/// the input string. Validation errors are field-scoped and independently
/// reported.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("malformed reference {0:?}: missing path separator")]
    MissingPathSeparator(String),

    #[error("malformed reference {0:?}: algorithm is invalid")]
    MalformedAlgorithm(String),

    #[error("invalid host {0:?}: {1}")]
    InvalidHost(String, String),

    #[error("invalid repository path {0:?}")]
    InvalidPath(String),

    #[error("invalid tag {0:?}")]
    InvalidTag(String),

    #[error("invalid digest {0:?}: {1}")]
    InvalidDigest(String, String),
}

/// Kind of artifact a reference names.
///
/// Supplying a hint to [`ArtifactReference::parse`] overrides whatever
/// protocol the string itself carries; the raw input is kept untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactType {
    ContainerImage,
    HelmChart,
    Binary,
}

impl ArtifactType {
    /// Protocol token for this artifact kind
    pub fn protocol(&self) -> &'static str {
        match self {
            ArtifactType::ContainerImage => protocol::DOCKER,
            ArtifactType::HelmChart => protocol::CHART,
            ArtifactType::Binary => protocol::BINARY,
        }
    }
}

/// A parsed artifact reference.
///
/// Immutable once constructed; the original input is retained in `raw` for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    protocol: String,
    host: String,
    path: String,
    tag: Option<String>,
    algorithm: Option<String>,
    digest: Option<String>,
    raw: String,
}

impl ArtifactReference {
    /// Parse a reference string.
    ///
    /// The scan runs left to right: an optional `scheme://` prefix, the host
    /// up to the first `/`, an optional `@algorithm:hexdigest` suffix, and an
    /// optional `:tag` in between. The digest is split off before the tag so
    /// that the `:` inside the digest pair is never mistaken for the tag
    /// separator.
    ///
    /// Parsing only checks structure; use the `validate_*` methods to check
    /// field grammars.
    pub fn parse(
        reference: &str,
        hint: Option<ArtifactType>,
    ) -> Result<Self, ReferenceError> {
        let (parsed_protocol, rest) = match reference.find("://") {
            Some(idx) if idx > 0 => (&reference[..idx], &reference[idx + 3..]),
            _ => (protocol::DOCKER, reference),
        };

        // The hint wins for classification but never rewrites the raw input.
        let protocol = match hint {
            Some(hint) => hint.protocol(),
            None => parsed_protocol,
        };

        let slash = match rest.find('/') {
            Some(idx) if idx > 0 => idx,
            _ => return Err(ReferenceError::MissingPathSeparator(reference.to_string())),
        };
        let host = &rest[..slash];
        let remainder = &rest[slash + 1..];

        let (pre_digest, algorithm, digest) = match remainder.split_once('@') {
            Some((pre, pair)) => {
                let (algorithm, digest) = pair
                    .split_once(':')
                    .ok_or_else(|| ReferenceError::MalformedAlgorithm(reference.to_string()))?;
                (pre, Some(algorithm.to_string()), Some(digest.to_string()))
            }
            None => (remainder, None, None),
        };

        let (path, tag) = match pre_digest.split_once(':') {
            Some((path, tag)) => (path, Some(tag.to_string())),
            None => (pre_digest, None),
        };

        Ok(Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            path: path.to_string(),
            tag,
            algorithm,
            digest,
            raw: reference.to_string(),
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Original input string, retained for diagnostics
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Run all field validations, reporting the first failure.
    ///
    /// Callers that only care about a subset of fields should call the
    /// individual `validate_*` methods instead.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        self.validate_host()?;
        self.validate_path()?;
        self.validate_tag()?;
        self.validate_digest()?;
        Ok(())
    }

    /// Check that the host parses as a URI authority.
    ///
    /// The host is parsed behind a throwaway scheme; anything the URL parser
    /// rejects in an authority (spaces, bad ports) fails, as does any
    /// non-ASCII input, which the parser would otherwise punycode-encode and
    /// accept.
    pub fn validate_host(&self) -> Result<(), ReferenceError> {
        if self.host.is_empty() {
            return Err(ReferenceError::InvalidHost(
                self.host.clone(),
                "host is empty".to_string(),
            ));
        }
        if !self.host.is_ascii() {
            return Err(ReferenceError::InvalidHost(
                self.host.clone(),
                "host contains non-ASCII characters".to_string(),
            ));
        }

        let probe = format!("registry://{}", self.host);
        let parsed = Url::parse(&probe)
            .map_err(|e| ReferenceError::InvalidHost(self.host.clone(), e.to_string()))?;

        if parsed.host_str().is_none() {
            return Err(ReferenceError::InvalidHost(
                self.host.clone(),
                "no host component".to_string(),
            ));
        }
        // A valid authority contributes nothing beyond host and port.
        if !parsed.username().is_empty()
            || parsed.query().is_some()
            || parsed.fragment().is_some()
            || !matches!(parsed.path(), "" | "/")
        {
            return Err(ReferenceError::InvalidHost(
                self.host.clone(),
                "host is not a plain authority".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the repository path grammar
    pub fn validate_path(&self) -> Result<(), ReferenceError> {
        if PATH_PATTERN.is_match(&self.path) {
            Ok(())
        } else {
            Err(ReferenceError::InvalidPath(self.path.clone()))
        }
    }

    /// Check the tag grammar; a reference without a tag passes
    pub fn validate_tag(&self) -> Result<(), ReferenceError> {
        match &self.tag {
            Some(tag) if !TAG_PATTERN.is_match(tag) => {
                Err(ReferenceError::InvalidTag(tag.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Check that the digest pair names a recognized algorithm family with a
    /// lowercase hex payload of the right length; a reference without a
    /// digest passes
    pub fn validate_digest(&self) -> Result<(), ReferenceError> {
        let (algorithm, digest) = match (&self.algorithm, &self.digest) {
            (Some(algorithm), Some(digest)) => (algorithm, digest),
            _ => return Ok(()),
        };
        let full = format!("{}:{}", algorithm, digest);

        let expected_len = match algorithm.as_str() {
            "sha256" => 64,
            "sha512" => 128,
            _ => {
                return Err(ReferenceError::InvalidDigest(
                    full,
                    format!("unrecognized algorithm {:?}", algorithm),
                ))
            }
        };
        if digest.len() != expected_len {
            return Err(ReferenceError::InvalidDigest(
                full,
                format!("expected {} hex characters, got {}", expected_len, digest.len()),
            ));
        }
        if !digest
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(ReferenceError::InvalidDigest(
                full,
                "digest is not lowercase hex".to_string(),
            ));
        }
        Ok(())
    }

    /// `host/path` with surrounding slashes trimmed from each side
    pub fn repository(&self) -> String {
        format!(
            "{}/{}",
            self.host.trim_matches('/'),
            self.path.trim_matches('/')
        )
    }

    /// The digest in `algorithm:hex` form when present, else the tag, else
    /// an empty string
    pub fn version(&self) -> String {
        match (&self.algorithm, &self.digest) {
            (Some(algorithm), Some(digest)) => format!("{}:{}", algorithm, digest),
            _ => self.tag.clone().unwrap_or_default(),
        }
    }

    /// Unambiguous full identity: repository, then `:tag` and
    /// `@algorithm:digest` in that order, each when present
    pub fn with_digest_string(&self) -> String {
        let mut out = self.repository();
        if let Some(tag) = &self.tag {
            out.push(':');
            out.push_str(tag);
        }
        if let (Some(algorithm), Some(digest)) = (&self.algorithm, &self.digest) {
            out.push('@');
            out.push_str(algorithm);
            out.push(':');
            out.push_str(digest);
        }
        out
    }
}

impl fmt::Display for ArtifactReference {
    /// Display form: repository plus `:tag` when a tag is present, else
    /// `@algorithm:digest` when a digest is present. The tag wins for
    /// display even when both exist; use
    /// [`ArtifactReference::with_digest_string`] for the unambiguous form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository())?;
        if let Some(tag) = &self.tag {
            return write!(f, ":{}", tag);
        }
        if let (Some(algorithm), Some(digest)) = (&self.algorithm, &self.digest) {
            return write!(f, "@{}:{}", algorithm, digest);
        }
        Ok(())
    }
}

/// Scan free-form text (e.g. tool output) for the first
/// `sha256:<64 hex>` occurrence and return its `(algorithm, digest)` pair.
///
/// First match only: tools may print several digests and callers rely on the
/// first line of output.
pub fn parse_first_digest(text: &str) -> Option<(String, String)> {
    FIRST_DIGEST_PATTERN
        .captures(text)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
}
