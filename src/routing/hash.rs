//! Key hashing for partition and ketama routing
//!
//! Both functions are deterministic: the same key always maps to the same
//! value, independent of process or platform.

use crc32fast::Hasher;

/// Ring points contributed by each node
pub const KETAMA_POINTS_PER_NODE: usize = 160;

/// 15-bit partition hash: `(crc32(key) >> 16) & 0x7fff`
pub fn partition_hash(key: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(key);
    (hasher.finalize() >> 16) & 0x7fff
}

/// Partition index for a power-of-two partition count
pub fn partition_index(key: &[u8], partitions: usize) -> usize {
    (partition_hash(key) as usize) & (partitions - 1)
}

/// First four MD5 bytes of the key, little-endian
pub fn ketama_hash(key: &[u8]) -> u32 {
    let digest = md5::compute(key);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Ring points for one node address
///
/// 40 digests of `"<address>-<i>"`, each split into four little-endian
/// points.
pub fn ketama_points(address: &str) -> Vec<u32> {
    let mut points = Vec::with_capacity(KETAMA_POINTS_PER_NODE);
    for i in 0..KETAMA_POINTS_PER_NODE / 4 {
        let digest = md5::compute(format!("{}-{}", address, i));
        for chunk in digest.0.chunks_exact(4) {
            points.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
    }
    points
}
