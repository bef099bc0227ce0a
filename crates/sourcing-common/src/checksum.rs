//! Content digests for payload deduplication
//!
//! The digest is computed over the raw fetched bytes (before compression), so
//! identical payloads hash identically no matter which candidate produced them.

use crate::error::{Result, SourcingError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a payload (64 lowercase characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Digest an in-memory payload
    pub fn of(content: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(content)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 characters, used in log lines
    pub fn short(&self) -> &str {
        &self.0[..16.min(self.0.len())]
    }

    /// Verify a payload against this digest
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        let actual = Self::of(content);
        if actual == *self {
            Ok(())
        } else {
            Err(SourcingError::ChecksumMismatch {
                expected: self.0.clone(),
                actual: actual.0,
            })
        }
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_value() {
        let digest = ContentDigest::of(b"hello world");
        assert_eq!(
            digest.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(digest.short(), "b94d27b9934d3e08");
    }

    #[test]
    fn test_verify_mismatch() {
        let digest = ContentDigest::of(b"a");
        assert!(digest.verify(b"a").is_ok());
        assert!(matches!(
            digest.verify(b"b"),
            Err(SourcingError::ChecksumMismatch { .. })
        ));
    }
}
