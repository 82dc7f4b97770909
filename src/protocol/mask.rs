//! Payload masking (RFC 6455 Section 5.3).
//!
//! Clients mask every frame they send with a 4-byte key. Unmasking is the same
//! XOR operation as masking.

/// Byte-at-a-time XOR. Reference implementation for [`apply_mask_fast`].
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i & 3];
    }
}

/// XOR `data` with `mask`, eight bytes per step.
///
/// Produces exactly the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let wide = u64::from_ne_bytes([
        mask[0], mask[1], mask[2], mask[3], mask[0], mask[1], mask[2], mask[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        let masked = u64::from_ne_bytes(word) ^ wide;
        chunk.copy_from_slice(&masked.to_ne_bytes());
    }

    // chunks are multiples of 8, so the tail starts on a key boundary
    apply_mask(chunks.into_remainder(), mask);
}
