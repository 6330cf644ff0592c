//! Hash functions for FilterGate
//!
//! Lookup tables bucket rules by a Murmur3 32-bit hash of a hostname or
//! domain. Buckets may collide; every candidate is re-verified against the
//! request, so the hash only needs to be fast and well distributed.

const HOSTNAME_SEED: u32 = 0x9e3779b9; // Golden ratio

/// Longest hostname hashed without a heap allocation.
const STACK_BUF_LEN: usize = 256;

/// Murmur3 32-bit hash implementation.
/// Optimized for short strings (typical domain lengths).
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;
    let mut i = 0;

    // Process 4-byte chunks
    let chunks = (len >> 2) << 2; // Round down to multiple of 4
    while i < chunks {
        let k = u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);

        i += 4;
    }

    // Process remaining bytes
    let mut k: u32 = 0;
    let remainder = len & 3;
    if remainder >= 3 {
        k ^= (data[i + 2] as u32) << 16;
    }
    if remainder >= 2 {
        k ^= (data[i + 1] as u32) << 8;
    }
    if remainder >= 1 {
        k ^= data[i] as u32;
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);
        h ^= k;
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Hash a hostname or domain for bucket lookup.
/// Lowercases the input before hashing for case-insensitive matching.
#[inline]
pub fn hash_hostname(hostname: &str) -> u32 {
    let bytes = hostname.as_bytes();
    if bytes.len() > STACK_BUF_LEN {
        return murmur3_32(hostname.to_ascii_lowercase().as_bytes(), HOSTNAME_SEED);
    }

    // Fast lowercase conversion for ASCII domains
    let mut buf = [0u8; STACK_BUF_LEN];
    for (i, &b) in bytes.iter().enumerate() {
        buf[i] = b.to_ascii_lowercase();
    }

    murmur3_32(&buf[..bytes.len()], HOSTNAME_SEED)
}
