pub mod auth;
pub mod constants;
pub mod detect;
pub mod probe;
pub mod reference;

pub use auth::{Credential, CredentialStore, DockerConfigStore, StaticCredentialStore};
pub use detect::{
    CredentialedSchemeDetector, DetectError, FallbackPolicy, SchemeDetect, SchemeDetector,
};
pub use probe::{
    BasicAuth, ProbeError, ProbeOptions, RegistryProber, ReqwestTransport, Transport,
    TransportError, TransportErrorKind, TransportResponse,
};
pub use reference::{ArtifactReference, ArtifactType, ReferenceError};
