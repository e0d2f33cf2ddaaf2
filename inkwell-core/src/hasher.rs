//! Content hashing for upload deduplication.
//!
//! Produces SHA-256 digests of raw bytes, hex-encoded. Unlike text dedup there
//! is no normalization: two buffers hash equal only if they are bit-identical.

use std::io::Read;

use sha2::{Digest, Sha256};

use crate::error::{ErrorValue, Result};

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// Content hasher for per-owner upload dedup.
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the lowercase hex SHA-256 digest of `content`.
    ///
    /// ```rust
    /// use inkwell_core::ContentHasher;
    ///
    /// let hash = ContentHasher::digest(b"hello");
    /// assert_eq!(hash.len(), 64);
    /// ```
    #[must_use]
    pub fn digest(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Streams `reader` to the end and returns its digest.
    ///
    /// A read failure is reported as an `Internal` error.
    pub fn digest_reader<R: Read>(mut reader: R) -> Result<String> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read upload content");
                    return Err(ErrorValue::internal(format!(
                        "Failed to read content: {}",
                        e
                    )));
                }
            };
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
        }
    }

    #[test]
    fn test_digest_is_64_char_hex() {
        let hash = ContentHasher::digest(b"some image bytes");
        assert_eq!(hash.len(), DIGEST_HEX_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_sha256_vector() {
        assert_eq!(
            ContentHasher::digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            ContentHasher::digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let data = vec![7u8; 4096];
        assert_eq!(ContentHasher::digest(&data), ContentHasher::digest(&data));
    }

    #[test]
    fn test_single_byte_change_changes_digest() {
        let original: Vec<u8> = (0..=255).collect();
        let base = ContentHasher::digest(&original);
        for i in [0usize, 17, 128, 255] {
            let mut mutated = original.clone();
            mutated[i] ^= 0x01;
            assert_ne!(ContentHasher::digest(&mutated), base, "byte {} flipped", i);
        }
    }

    #[test]
    fn test_reader_matches_slice_digest() {
        // Larger than one read chunk
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHasher::digest_reader(std::io::Cursor::new(&data)).unwrap();
        assert_eq!(streamed, ContentHasher::digest(&data));
    }

    #[test]
    fn test_reader_failure_is_internal() {
        let err = ContentHasher::digest_reader(FailingReader).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
        assert_eq!(err.status_code(), 500);
    }
}
