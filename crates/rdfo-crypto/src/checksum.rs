use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest algorithm used for part checksums.
///
/// The algorithm is fixed per store. Switching it once data exists leaves
/// older versions checksummed with the previous algorithm; the algorithm
/// name stored with each [`Checksum`] keeps them verifiable, but tools that
/// compare digests across versions must not assume a single algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Blake3 => "blake3",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Look up an algorithm by name, ignoring case and a `-` separator.
    pub fn from_name(name: &str) -> Result<Self, ChecksumError> {
        match name.to_ascii_lowercase().replace('-', "").as_str() {
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            _ => Err(ChecksumError::UnknownAlgorithm(name.to_string())),
        }
    }

    /// A fresh incremental hasher.
    pub fn hasher(&self) -> ChecksumHasher {
        match self {
            ChecksumAlgorithm::Blake3 => ChecksumHasher::Blake3(Box::new(blake3::Hasher::new())),
            ChecksumAlgorithm::Sha256 => ChecksumHasher::Sha256(Sha256::new()),
        }
    }

    /// Checksum a complete buffer.
    pub fn digest(&self, data: &[u8]) -> Checksum {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// A digest tagged with the algorithm that produced it.
///
/// Displayed and parsed as `algorithm:hexdigest`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub digest: String,
}

impl Checksum {
    /// Returns `true` if `data` hashes to this checksum.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == *self
    }

    /// Fail with [`ChecksumError::Mismatch`] unless `data` matches.
    pub fn check(&self, data: &[u8]) -> Result<(), ChecksumError> {
        let actual = self.algorithm.digest(data);
        if actual == *self {
            Ok(())
        } else {
            Err(ChecksumError::Mismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.digest[..self.digest.len().min(12)];
        write!(f, "Checksum({}:{short})", self.algorithm)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (alg, digest) = s
            .split_once(':')
            .ok_or_else(|| ChecksumError::Malformed(s.to_string()))?;
        let algorithm = ChecksumAlgorithm::from_name(alg)?;
        let bytes = hex::decode(digest).map_err(|_| ChecksumError::Malformed(s.to_string()))?;
        if bytes.len() != 32 {
            return Err(ChecksumError::Malformed(s.to_string()));
        }
        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }
}

/// Incremental hasher for either algorithm.
///
/// Implements [`io::Write`] so it can sit behind a tee while bytes stream to
/// storage.
pub enum ChecksumHasher {
    Blake3(Box<blake3::Hasher>),
    Sha256(Sha256),
}

impl ChecksumHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            ChecksumHasher::Blake3(h) => {
                h.update(data);
            }
            ChecksumHasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Checksum {
        match self {
            ChecksumHasher::Blake3(h) => Checksum {
                algorithm: ChecksumAlgorithm::Blake3,
                digest: h.finalize().to_hex().to_string(),
            },
            ChecksumHasher::Sha256(h) => Checksum {
                algorithm: ChecksumAlgorithm::Sha256,
                digest: hex::encode(h.finalize()),
            },
        }
    }
}

impl io::Write for ChecksumHasher {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Errors from checksum operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("malformed checksum: {0}")]
    Malformed(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}
