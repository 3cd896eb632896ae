// ABOUTME: Flat environment-variable set backed by a dotenv-style text blob.
// ABOUTME: The environment owns the stored blob; deployments layer injected keys on a copy.

use std::collections::BTreeMap;

/// A key/value set of environment variables.
///
/// The canonical form is a text blob of `KEY=value` lines stored on the
/// environment record. Deployments parse a transient copy and inject
/// platform-owned keys on top of it; the stored blob is never mutated by
/// injection, so user-entered values survive every deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    // BTreeMap keeps serialization order stable across round trips.
    vars: BTreeMap<String, String>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a blob of `KEY=value` lines. Blank lines and lines starting with
    /// `#` are skipped; values keep everything after the first `=`, so values
    /// containing `=` (base64 keys, DSNs) survive intact. Lines with no `=`
    /// are ignored rather than treated as errors, matching how loosely users
    /// paste these in.
    pub fn from_blob(blob: &str) -> Self {
        let mut vars = BTreeMap::new();

        for line in blob.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    vars.insert(key.to_string(), value.trim().to_string());
                }
            }
        }

        Self { vars }
    }

    /// Serialize back to the canonical blob: one `KEY=value` per line, keys
    /// sorted.
    pub fn to_blob(&self) -> String {
        self.vars
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Set a single variable, overwriting any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Overlay a batch of variables. Injected keys win over existing ones,
    /// which is how platform-owned keys take precedence over user keys of the
    /// same name at deploy time.
    pub fn inject<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.vars.insert(key.into(), value.into());
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate entries in stable (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
