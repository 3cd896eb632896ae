// ABOUTME: Slug type for service, queue, and image naming.
// ABOUTME: Built from project and environment names, validated as a DNS label.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,

    #[error("slug exceeds maximum length of 63 characters")]
    TooLong,
}

/// A lowercase, hyphenated name derived from human-entered project and
/// environment names. Used as the runtime service name, the queue name, and
/// the image path segment, so it must stay a valid DNS label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    /// Slugify arbitrary input: lowercase, alphanumerics kept, every run of
    /// other characters collapsed to a single hyphen, hyphens trimmed.
    pub fn from_name(input: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(input.len());
        let mut pending_hyphen = false;

        for c in input.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }

        if out.len() > 63 {
            return Err(SlugError::TooLong);
        }

        Ok(Self(out))
    }

    /// The canonical "{project}-{environment}" slug used for services and
    /// queues. Deterministic: same inputs always produce the same slug.
    pub fn for_environment(project_name: &str, environment_name: &str) -> Result<Self, SlugError> {
        Self::from_name(&format!("{project_name} {environment_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
