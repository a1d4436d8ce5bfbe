//! Names of the volumes a lifecycle uses

use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

const RANDOM_LENGTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeName(String);

impl VolumeName {
    /// `prefix` followed by random lowercase hex
    pub fn random(prefix: &str) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", prefix, &random[..RANDOM_LENGTH]))
    }

    /// `prefix` + hex of the first `digest_length` bytes of sha256(`value`) + `suffix`
    pub fn based_on(value: &str, prefix: &str, suffix: &str, digest_length: usize) -> Self {
        let digest = Sha256::digest(value.as_bytes());
        let length = digest_length.min(digest.len());
        Self(format!("{}{}{}", prefix, hex::encode(&digest[..length]), suffix))
    }

    pub fn of(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
