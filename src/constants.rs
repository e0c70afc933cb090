/// Protocol tokens identifying the transport convention of a reference
pub mod protocol {
    /// Container image convention, the default when a reference carries no scheme
    pub const DOCKER: &str = "docker";

    /// Helm chart convention
    pub const CHART: &str = "chart";

    /// Plain binary artifact convention
    pub const BINARY: &str = "binary";
}

/// Wire scheme tokens consumed by registry clients
pub mod scheme {
    /// TLS transport
    pub const HTTPS: &str = "https";

    /// Plaintext transport
    pub const HTTP: &str = "http";

    /// Prefix form of [`HTTPS`] as it appears in host strings
    pub const HTTPS_PREFIX: &str = "https://";

    /// Prefix form of [`HTTP`] as it appears in host strings
    pub const HTTP_PREFIX: &str = "http://";
}

/// Registry probing constants
pub mod probe {
    /// Health-check paths tried in order: the distribution API root, then the
    /// legacy ping endpoint still served by older registries
    pub const PATHS: [&str; 2] = ["/v2/", "/v1/_ping"];

    /// Default per-probe timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
}
