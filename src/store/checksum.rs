//! CRC32 checksum over persisted snapshots
//!
//! Every load verifies the checksum; a mismatch aborts the load.

use crc32fast::Hasher;

/// CRC32 (IEEE) of `data`
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Whether `data` hashes to `expected`
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}
