//! Common utilities

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use xxhash_rust::xxh3::Xxh3;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    /// Fast non-cryptographic hash, used for content-equality checks.
    #[default]
    Xxh3,
    /// Cryptographic hash, used for cache-key suffixes.
    Sha256,
}

/// Compute hash of bytes
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Xxh3 => {
            let mut hasher = Xxh3::new();
            hasher.update(data);
            format!("{:016x}", hasher.digest())
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            format!("{:x}", hasher.finalize())
        }
    }
}

/// Compute hash of file content, reading in chunks so large files do not
/// have to fit in memory.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];

    match algorithm {
        HashAlgorithm::Xxh3 => {
            let mut hasher = Xxh3::new();
            loop {
                let n = reader.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(format!("{:016x}", hasher.digest()))
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            loop {
                let n = reader.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        }
    }
}

/// First `len` hex characters of the SHA-256 digest of `input`.
pub fn short_hash(input: &str, len: usize) -> String {
    let mut hex = hash_bytes(input.as_bytes(), HashAlgorithm::Sha256);
    hex.truncate(len);
    hex
}

/// Check whether two files have identical content (by hash).
///
/// Any read failure, including a missing file, counts as "no match".
pub fn files_match(a: &Path, b: &Path) -> bool {
    match (
        hash_file(a, HashAlgorithm::Xxh3),
        hash_file(b, HashAlgorithm::Xxh3),
    ) {
        (Ok(ha), Ok(hb)) => ha == hb,
        _ => false,
    }
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
