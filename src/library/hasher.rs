//! SHA-256 digests used as cache keys.
//!
//! These are namespacing keys only (preview deduplication, per-repository
//! document cache folders), never integrity checks.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read size when streaming a file through the digest (1 MiB)
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Hex SHA-256 of a file's contents, read in 1 MiB chunks
pub async fn hash_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of a string's UTF-8 bytes
pub fn hash_text(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_hash_file_is_stable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sample.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();

        let first = hash_file(&path).await.unwrap();
        let second = hash_file(&path).await.unwrap();

        assert_eq!(first, second);
        // Same bytes hash the same whether read from disk or given as text
        assert_eq!(first, hash_text("hello"));
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn test_hash_file_spanning_chunks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.bin");
        let data = vec![7u8; HASH_CHUNK_SIZE * 2 + 13];
        tokio::fs::write(&path, &data).await.unwrap();

        let expected = hex::encode(Sha256::digest(&data));
        assert_eq!(hash_file(&path).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_hash_file_missing() {
        let temp = TempDir::new().unwrap();
        let result = hash_file(&temp.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_text() {
        assert_eq!(hash_text("user/repo"), hash_text("user/repo"));
        assert_ne!(hash_text("user/repo"), hash_text("user/repo2"));
    }
}
