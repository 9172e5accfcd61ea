//! Streaming content digests.
//!
//! Files are read through a fixed-size buffer so memory use does not grow
//! with file size. A file that cannot be read yields no digest at all; a
//! partial digest is never returned.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Default buffer size for streaming reads (64KB)
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Hex length of a 256-bit digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash algorithm used for content digests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Blake3,
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

/// Lowercase hex digest of a file's full content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileDigest(String);

impl FileDigest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digest of an in-memory byte slice.
    pub fn of_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => FileDigest(hex::encode(Sha256::digest(data))),
            HashAlgorithm::Blake3 => FileDigest(blake3::hash(data).to_hex().to_string()),
        }
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes file digests with a fixed algorithm and buffer size.
#[derive(Debug, Clone)]
pub struct DigestEngine {
    algorithm: HashAlgorithm,
    buffer_size: usize,
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl DigestEngine {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            buffer_size: BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest the file at `path`, or `None` if it vanished or could not be read.
    pub fn digest(&self, path: &Path) -> Option<FileDigest> {
        match self.try_digest(path) {
            Ok(d) => Some(d),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "file vanished before it could be hashed");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot hash file");
                None
            }
        }
    }

    fn try_digest(&self, path: &Path) -> io::Result<FileDigest> {
        let mut file = File::open(path)?;
        let mut buffer = vec![0u8; self.buffer_size];
        let hex = match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    match file.read(&mut buffer)? {
                        0 => break,
                        n => hasher.update(&buffer[..n]),
                    }
                }
                hex::encode(hasher.finalize())
            }
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                loop {
                    match file.read(&mut buffer)? {
                        0 => break,
                        n => {
                            hasher.update(&buffer[..n]);
                        }
                    }
                }
                hasher.finalize().to_hex().to_string()
            }
        };
        Ok(FileDigest(hex))
    }
}
