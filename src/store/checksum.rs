//! CRC32 (IEEE) checksums for revision log records

use crc32fast::Hasher;

pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_detects_single_bit_flip() {
        let mut data = b"revision batch".to_vec();
        let original = compute_checksum(&data);
        assert!(verify_checksum(&data, original));

        data[3] ^= 0x01;
        assert!(!verify_checksum(&data, original));
    }
}
