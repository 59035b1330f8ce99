//! Little-endian integer serialization, as used for domains, seeds and
//! shuffling position windows.
//!
//! The `int_to_bytesN` naming follows the `int_to_bytes` function in the
//! Ethereum consensus spec, which these functions implement for the handful
//! of widths the chain actually uses.

/// Returns `int` as little-endian bytes with a length of 1.
pub fn int_to_bytes1(int: u8) -> Vec<u8> {
    vec![int]
}

/// Returns `int` as little-endian bytes with a length of 4.
pub fn int_to_bytes4(int: u32) -> [u8; 4] {
    int.to_le_bytes()
}

/// Returns `int` as little-endian bytes with a length of 8.
pub fn int_to_bytes8(int: u64) -> Vec<u8> {
    int.to_le_bytes().to_vec()
}

/// Returns `int` as little-endian bytes with a length of 32, right-padded
/// with zeroes.
pub fn int_to_bytes32(int: u64) -> Vec<u8> {
    let mut bytes = int.to_le_bytes().to_vec();
    bytes.resize(32, 0);
    bytes
}

/// Returns `int` as a little-endian 32-byte array, right-padded with zeroes.
pub fn int_to_fixed_bytes32(int: u64) -> [u8; 32] {
    let mut bytes = [0; 32];
    bytes[0..8].copy_from_slice(&int.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_bytes32() {
        assert_eq!(int_to_fixed_bytes32(0)[..], int_to_bytes32(0)[..]);
        assert_eq!(int_to_fixed_bytes32(1)[..], int_to_bytes32(1)[..]);
        assert_eq!(
            int_to_fixed_bytes32(u64::max_value())[..],
            int_to_bytes32(u64::max_value())[..]
        );
    }

    #[test]
    fn int_to_bytes4_le() {
        assert_eq!(int_to_bytes4(0), [0, 0, 0, 0]);
        assert_eq!(int_to_bytes4(1), [1, 0, 0, 0]);
        assert_eq!(int_to_bytes4(257), [1, 1, 0, 0]);
    }

    #[test]
    fn known_vectors() {
        // int_to_bytes(1, 32), from the consensus spec test vectors.
        assert_eq!(
            hex::encode(int_to_bytes32(1)),
            "0100000000000000000000000000000000000000000000000000000000000000",
        );
        assert_eq!(hex::encode(int_to_bytes8(16_777_216)), "0000000100000000");
    }
}
