//! SHA-256 streaming digest helpers. `rocfl` supports a family of digest algorithms;
//! this adapter only ever needs SHA-256 (`spec.md` 4.4: "the digest algorithm for
//! classification and commit must be the same (SHA-256)"), so the generic
//! `DynDigest`-backed reader is specialized down to one concrete hasher.

use std::io::{self, Read};

use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 digest. Always lowercase, always 64 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        HexDigest(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HexDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HexDigest {
    fn from(s: String) -> Self {
        HexDigest(s.to_ascii_lowercase())
    }
}

impl From<&str> for HexDigest {
    fn from(s: &str) -> Self {
        HexDigest(s.to_ascii_lowercase())
    }
}

/// Reader wrapper that hashes every byte as it passes through.
pub struct DigestReader<R: Read> {
    hasher: Sha256,
    inner: R,
}

impl<R: Read> DigestReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            hasher: Sha256::new(),
            inner,
        }
    }

    pub fn finalize_hex(self) -> HexDigest {
        HexDigest::from_bytes(self.hasher.finalize().into())
    }
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

/// Hashes an in-memory buffer directly, for the metadata composer's envelope digest.
pub fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}
