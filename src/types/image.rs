// ABOUTME: Digest-qualified image reference recorded after a successful build.
// ABOUTME: Parses build-result payloads into a "name@sha256:..." reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseBuiltImageError {
    #[error("image name cannot be empty")]
    EmptyName,

    #[error("image digest cannot be empty")]
    EmptyDigest,

    #[error("image digest must start with an algorithm prefix: {0}")]
    MissingAlgorithm(String),
}

/// The immutable image reference a build produced: registry path plus content
/// digest. A deployment records exactly one of these, at most once, and the
/// runtime service is always pointed at the digest rather than a moving tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltImage {
    name: String,
    digest: String,
}

impl BuiltImage {
    pub fn new(name: &str, digest: &str) -> Result<Self, ParseBuiltImageError> {
        let name = name.trim();
        let digest = digest.trim();

        if name.is_empty() {
            return Err(ParseBuiltImageError::EmptyName);
        }

        if digest.is_empty() {
            return Err(ParseBuiltImageError::EmptyDigest);
        }

        // Digests come back as "sha256:<hex>"; anything without the algorithm
        // prefix is not addressable by the runtime.
        if !digest.contains(':') {
            return Err(ParseBuiltImageError::MissingAlgorithm(digest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            digest: digest.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The full "name@digest" reference handed to the container runtime.
    pub fn reference(&self) -> String {
        format!("{}@{}", self.name, self.digest)
    }
}

impl fmt::Display for BuiltImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}
