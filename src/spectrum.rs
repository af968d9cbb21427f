//! Unpacking of the DP5's 24-bit packed spectrum buffer.

use crate::constants::BYTES_PER_CHANNEL;

/// Convert a 24-bit little-endian packed channel buffer into native
/// counts.
///
/// `raw` must hold at least `3 * num_channels` bytes; the acquisition
/// layer validates both the reply length and the channel count before
/// calling.
pub fn unpack_spectrum(raw: &[u8], num_channels: usize) -> Vec<u32> {
    debug_assert!(raw.len() >= BYTES_PER_CHANNEL * num_channels);
    raw.chunks_exact(BYTES_PER_CHANNEL)
        .take(num_channels)
        .map(|c| u32::from(c[0]) | (u32::from(c[1]) << 8) | (u32::from(c[2]) << 16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::unpack_spectrum;

    #[test]
    fn unpacks_low_middle_high_bytes() {
        let raw = [0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFF];
        assert_eq!(unpack_spectrum(&raw, 2), vec![0x030201, 0xFFFFFF]);
    }

    #[test]
    fn zero_channels_gives_empty_spectrum() {
        assert_eq!(unpack_spectrum(&[], 0), Vec::<u32>::new());
    }

    #[test]
    fn extra_trailing_bytes_are_ignored() {
        let raw = [0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
        assert_eq!(unpack_spectrum(&raw, 2), vec![1, 2]);
    }
}
