//! Credential stores for registry probing
//!
//! The detector only needs one thing from a credential backend: given a
//! registry host, hand back a username/password pair if one is known. The
//! [`CredentialStore`] trait captures that contract; [`DockerConfigStore`]
//! backs it with a Docker-style `config.json`, and
//! [`StaticCredentialStore`] backs it with an in-memory map for callers that
//! already hold Secret-shaped data.

use anyhow::{Context, Result};
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};


/// A username/password pair for a registry host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Key/value credential lookup by registry host.
///
/// `Ok(None)` means no credentials are known for the host; an `Err` means
/// the backend itself failed. Callers treat both as "probe anonymously".
pub trait CredentialStore {
    fn lookup(&self, host: &str) -> Result<Option<Credential>>;
}

/// In-memory credential store keyed by host
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    credentials: HashMap<String, Credential>,
}

impl StaticCredentialStore {
    pub fn new(credentials: impl IntoIterator<Item = (String, Credential)>) -> Self {
        Self {
            credentials: credentials.into_iter().collect(),
        }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn lookup(&self, host: &str) -> Result<Option<Credential>> {
        Ok(self.credentials.get(host).cloned())
    }
}

/// Docker config file structure, `auths` section only
#[derive(Debug, Clone, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

/// Entry in the Docker config auths section
#[derive(Debug, Clone, Deserialize)]
struct DockerAuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl DockerAuthEntry {
    /// Split username/password fields win; otherwise the packed base64
    /// `auth` field is decoded as `user:pass`
    fn to_credential(&self) -> Option<Credential> {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Some(Credential::new(username.clone(), password.clone()));
        }
        let auth = self.auth.as_ref()?;
        let decoded = base64::engine::general_purpose::STANDARD.decode(auth).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Credential::new(username, password))
    }
}

/// Credential store backed by a Docker-style config file.
///
/// The parsed config is cached after the first successful read; a missing
/// config file is an empty store, not an error.
pub struct DockerConfigStore {
    /// Explicit config path; when unset the usual discovery order applies
    path: Option<PathBuf>,
    config_cache: Arc<Mutex<Option<DockerConfig>>>,
}

impl DockerConfigStore {
    /// Store using the standard config discovery order
    pub fn new() -> Self {
        Self {
            path: None,
            config_cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Store reading exactly one config file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config_cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Paths checked for a Docker config, in order
    fn config_paths(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.path {
            return vec![path.clone()];
        }

        let mut paths = Vec::new();
        if let Ok(docker_config) = std::env::var("DOCKER_CONFIG") {
            paths.push(PathBuf::from(docker_config).join("config.json"));
        }
        if let Ok(auth_file) = std::env::var("REGISTRY_AUTH_FILE") {
            paths.push(PathBuf::from(auth_file));
        }
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            paths.push(PathBuf::from(xdg_runtime).join("containers/auth.json"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".docker/config.json"));
        }
        paths
    }

    fn load_config(&self) -> Result<DockerConfig> {
        {
            let cache = self
                .config_cache
                .lock()
                .map_err(|_| anyhow::anyhow!("config cache poisoned"))?;
            if let Some(config) = cache.as_ref() {
                return Ok(config.clone());
            }
        }

        for path in self.config_paths() {
            if !path.exists() {
                continue;
            }
            debug!("reading registry credentials from: {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            match serde_json::from_str::<DockerConfig>(&content) {
                Ok(config) => {
                    let mut cache = self
                        .config_cache
                        .lock()
                        .map_err(|_| anyhow::anyhow!("config cache poisoned"))?;
                    *cache = Some(config.clone());
                    return Ok(config);
                }
                Err(e) => {
                    warn!("failed to parse config at {}: {}", path.display(), e);
                }
            }
        }

        Ok(DockerConfig {
            auths: HashMap::new(),
        })
    }

    /// Key variants a host may be stored under in a config file
    fn host_variants(host: &str) -> Vec<String> {
        let mut variants = vec![host.to_string()];

        if host == "docker.io" || host == "index.docker.io" {
            variants.push("docker.io".to_string());
            variants.push("index.docker.io".to_string());
            variants.push("https://index.docker.io/v1/".to_string());
            variants.push("https://index.docker.io/v2/".to_string());
        } else if !host.starts_with("http://") && !host.starts_with("https://") {
            variants.push(format!("https://{}", host));
            variants.push(format!("http://{}", host));
            variants.push(format!("https://{}/v1/", host));
            variants.push(format!("https://{}/v2/", host));
        }

        variants
    }
}

impl Default for DockerConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for DockerConfigStore {
    fn lookup(&self, host: &str) -> Result<Option<Credential>> {
        let config = self.load_config()?;

        for variant in Self::host_variants(host) {
            if let Some(entry) = config.auths.get(&variant) {
                debug!(host, key = %variant, "found credential entry");
                return Ok(entry.to_credential());
            }
        }

        debug!(host, "no credentials found");
        Ok(None)
    }
}
