//! SHA-256 goldens for result buffers.
//!
//! Goldens are stored in test tables as four little-endian `u64` words rather
//! than 32 raw bytes, so a captured digest can be pasted straight back into a
//! descriptor row.

use sha2::{Digest, Sha256};
use std::fmt;

/// Digests `bytes` and folds the 32-byte digest into four little-endian
/// `u64` words, the form goldens are written in.
pub fn sha256_words(bytes: &[u8]) -> [u64; 4] {
    let digest = Sha256::digest(bytes);
    let mut words = [0u64; 4];
    for (word, chunk) in words.iter_mut().zip(digest.chunks_exact(8)) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *word = u64::from_le_bytes(raw);
    }
    words
}

/// Renders a golden as a pasteable array literal, for capturing new
/// expectations from a known-good run.
pub fn format_golden(words: &[u64; 4]) -> String {
    format!(
        "[{:#018x}, {:#018x}, {:#018x}, {:#018x}]",
        words[0], words[1], words[2], words[3]
    )
}

/// Digest printed as `0x` followed by the 32 digest bytes in order, the form
/// used in failure output.
pub struct HexDigest(pub [u64; 4]);

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for word in self.0 {
            for byte in word.to_le_bytes() {
                write!(f, "{byte:02x}")?;
            }
        }
        Ok(())
    }
}
