//! Tests for reference parsing and validation

use super::*;

const SHA256_HEX: &str = "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";

#[test]
fn test_parse_full_reference() {
    let input = format!("docker://docker.io/katanomi/pkg:v1@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();

    assert_eq!(reference.protocol(), "docker");
    assert_eq!(reference.host(), "docker.io");
    assert_eq!(reference.path(), "katanomi/pkg");
    assert_eq!(reference.tag(), Some("v1"));
    assert_eq!(reference.algorithm(), Some("sha256"));
    assert_eq!(reference.digest(), Some(SHA256_HEX));
    assert_eq!(reference.raw(), input);
}

#[test]
fn test_parse_defaults_to_docker_protocol() {
    let reference = ArtifactReference::parse("docker.io/katanomi/pkg", None).unwrap();
    assert_eq!(reference.protocol(), "docker");
    assert_eq!(reference.host(), "docker.io");
    assert_eq!(reference.path(), "katanomi/pkg");
    assert!(reference.tag().is_none());
    assert!(reference.digest().is_none());
}

#[test]
fn test_parse_hint_overrides_protocol_but_not_raw() {
    let input = "docker://charts.example.com/stable/nginx:1.2.3";
    let reference = ArtifactReference::parse(input, Some(ArtifactType::HelmChart)).unwrap();
    assert_eq!(reference.protocol(), "chart");
    assert_eq!(reference.raw(), input);

    let reference = ArtifactReference::parse(input, Some(ArtifactType::Binary)).unwrap();
    assert_eq!(reference.protocol(), "binary");
}

#[test]
fn test_parse_host_with_port() {
    let reference = ArtifactReference::parse("localhost:5000/app/api:v2", None).unwrap();
    assert_eq!(reference.host(), "localhost:5000");
    assert_eq!(reference.path(), "app/api");
    assert_eq!(reference.tag(), Some("v2"));
}

#[test]
fn test_parse_missing_path_separator() {
    for input in ["docker.io", "", "docker://registry.example.com", "/path/only"] {
        let err = ArtifactReference::parse(input, None).unwrap_err();
        assert!(
            matches!(err, ReferenceError::MissingPathSeparator(_)),
            "expected missing-separator error for {:?}, got {:?}",
            input,
            err
        );
    }
}

#[test]
fn test_parse_digest_pair_without_colon() {
    let err = ArtifactReference::parse("docker.io/app@deadbeef", None).unwrap_err();
    assert!(matches!(err, ReferenceError::MalformedAlgorithm(_)));
    assert!(err.to_string().contains("algorithm is invalid"));
}

#[test]
fn test_parse_digest_colon_not_mistaken_for_tag() {
    let input = format!("docker.io/katanomi/pkg@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert!(reference.tag().is_none());
    assert_eq!(reference.path(), "katanomi/pkg");
    assert_eq!(reference.algorithm(), Some("sha256"));
    assert_eq!(reference.digest(), Some(SHA256_HEX));
}

#[test]
fn test_display_round_trips_host_path_tag() {
    for input in [
        "docker.io/katanomi/pkg:v1",
        "registry.example.com:5000/a/b/c:latest",
        "gcr.io/project/image:1.0.0-rc.1",
    ] {
        let reference = ArtifactReference::parse(input, None).unwrap();
        assert_eq!(reference.to_string(), input);
    }
}

#[test]
fn test_with_digest_string_round_trips() {
    let input = format!("docker.io/katanomi/pkg@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert_eq!(reference.with_digest_string(), input);

    let input = format!("docker.io/katanomi/pkg:v1@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert_eq!(reference.with_digest_string(), input);
}

#[test]
fn test_display_prefers_tag_over_digest() {
    let input = format!("docker.io/katanomi/pkg:v1@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert_eq!(reference.to_string(), "docker.io/katanomi/pkg:v1");
}

#[test]
fn test_version_prefers_digest_over_tag() {
    let input = format!("docker.io/katanomi/pkg:v1@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert_eq!(reference.version(), format!("sha256:{}", SHA256_HEX));

    let reference = ArtifactReference::parse("docker.io/katanomi/pkg:v1", None).unwrap();
    assert_eq!(reference.version(), "v1");

    let reference = ArtifactReference::parse("docker.io/katanomi/pkg", None).unwrap();
    assert_eq!(reference.version(), "");
}

#[test]
fn test_repository() {
    let reference = ArtifactReference::parse("docker.io/katanomi/pkg:v1", None).unwrap();
    assert_eq!(reference.repository(), "docker.io/katanomi/pkg");
}

#[test]
fn test_validate_host() {
    for host in ["registry.example.com", "localhost:5000", "10.0.0.1:443"] {
        let reference =
            ArtifactReference::parse(&format!("{}/repo", host), None).unwrap();
        assert!(reference.validate_host().is_ok(), "expected valid host {:?}", host);
    }

    for host in ["bad host", "例え.jp", "host:port:extra", "user@host"] {
        let reference = ArtifactReference {
            protocol: "docker".to_string(),
            host: host.to_string(),
            path: "repo".to_string(),
            tag: None,
            algorithm: None,
            digest: None,
            raw: format!("{}/repo", host),
        };
        assert!(
            reference.validate_host().is_err(),
            "expected invalid host {:?}",
            host
        );
    }
}

#[test]
fn test_validate_path() {
    for path in [
        "repo",
        "org/repo",
        "a/b/c",
        "my-app/some__thing",
        "a.b/c_d",
        "a--b/c",
    ] {
        let reference =
            ArtifactReference::parse(&format!("docker.io/{}", path), None).unwrap();
        assert!(reference.validate_path().is_ok(), "expected valid path {:?}", path);
    }

    for path in ["中文", "Repo", "a..b", "a&b", "a___b", "a/", ""] {
        let reference = ArtifactReference {
            protocol: "docker".to_string(),
            host: "docker.io".to_string(),
            path: path.to_string(),
            tag: None,
            algorithm: None,
            digest: None,
            raw: format!("docker.io/{}", path),
        };
        assert!(
            reference.validate_path().is_err(),
            "expected invalid path {:?}",
            path
        );
    }
}

#[test]
fn test_validate_tag() {
    for tag in ["latest", "v1.0.0", "1.2.3-rc.1", "a"] {
        let reference =
            ArtifactReference::parse(&format!("docker.io/repo:{}", tag), None).unwrap();
        assert!(reference.validate_tag().is_ok(), "expected valid tag {:?}", tag);
    }

    for tag in ["a b", "a&b", "", ".hidden", "-leading"] {
        let reference = ArtifactReference {
            protocol: "docker".to_string(),
            host: "docker.io".to_string(),
            path: "repo".to_string(),
            tag: Some(tag.to_string()),
            algorithm: None,
            digest: None,
            raw: format!("docker.io/repo:{}", tag),
        };
        assert!(reference.validate_tag().is_err(), "expected invalid tag {:?}", tag);
    }
}

#[test]
fn test_validate_tag_skipped_when_absent() {
    let reference = ArtifactReference::parse("docker.io/repo", None).unwrap();
    assert!(reference.validate_tag().is_ok());
}

#[test]
fn test_validate_digest() {
    let input = format!("docker.io/repo@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert!(reference.validate_digest().is_ok());

    let sha512_hex = SHA256_HEX.repeat(2);
    let input = format!("docker.io/repo@sha512:{}", sha512_hex);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert!(reference.validate_digest().is_ok());

    // wrong length
    let reference = ArtifactReference::parse("docker.io/repo@sha256:deadbeef", None).unwrap();
    assert!(reference.validate_digest().is_err());

    // uppercase hex
    let input = format!("docker.io/repo@sha256:{}", SHA256_HEX.to_uppercase());
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert!(reference.validate_digest().is_err());

    // unknown algorithm family
    let input = format!("docker.io/repo@md5:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    let err = reference.validate_digest().unwrap_err();
    assert!(err.to_string().contains("unrecognized algorithm"));
}

#[test]
fn test_validate_digest_skipped_when_absent() {
    let reference = ArtifactReference::parse("docker.io/repo:v1", None).unwrap();
    assert!(reference.validate_digest().is_ok());
}

#[test]
fn test_validate_checks_all_fields() {
    let input = format!("docker.io/katanomi/pkg:v1@sha256:{}", SHA256_HEX);
    let reference = ArtifactReference::parse(&input, None).unwrap();
    assert!(reference.validate().is_ok());

    let reference = ArtifactReference::parse("docker.io/Repo:v1", None).unwrap();
    assert!(matches!(
        reference.validate().unwrap_err(),
        ReferenceError::InvalidPath(_)
    ));
}

#[test]
fn test_fields_validated_independently() {
    // Bad tag must not block host or path validation.
    let reference = ArtifactReference::parse("docker.io/repo:a b", None).unwrap();
    assert!(reference.validate_host().is_ok());
    assert!(reference.validate_path().is_ok());
    assert!(reference.validate_tag().is_err());
}

#[test]
fn test_parse_first_digest_returns_first_match() {
    let second = "b".repeat(64);
    let text = format!(
        "pushed layer sha256:{}\npushed manifest sha256:{}\n",
        SHA256_HEX, second
    );
    let (algorithm, digest) = parse_first_digest(&text).unwrap();
    assert_eq!(algorithm, "sha256");
    assert_eq!(digest, SHA256_HEX);
}

#[test]
fn test_parse_first_digest_no_match() {
    assert!(parse_first_digest("no digests here").is_none());
    // too short to be a sha256 payload
    assert!(parse_first_digest("sha256:deadbeef").is_none());
}

#[test]
fn test_parse_first_digest_embedded() {
    let text = format!("Digest: sha256:{} Size: 1234", SHA256_HEX);
    let (_, digest) = parse_first_digest(&text).unwrap();
    assert_eq!(digest, SHA256_HEX);
}
