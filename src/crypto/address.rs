//! Base58 address codec.
//!
//! An address is `Base58(version ‖ pubkey_hash ‖ checksum)` where the
//! checksum is the first four bytes of a double SHA-256 over
//! `version ‖ pubkey_hash`.

use crate::crypto::hash::checksum;
use crate::error::{CoinError, Result};

pub const ADDRESS_VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;

// version byte + at least one payload byte + checksum
const MIN_PAYLOAD_LEN: usize = ADDRESS_CHECK_SUM_LEN + 2;

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| CoinError::AddressDecodingError(e.to_string()))
}

///
/// The `convert_address` function converts a public key hash to an address.
/// It prepends the address version, appends the checksum, and encodes the
/// result using Base58.
///
/// # Arguments
///
/// * `pub_key_hash` - A reference to the 20-byte public key hash.
pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![ADDRESS_VERSION];
    payload.extend_from_slice(pub_key_hash);
    let chk = checksum(payload.as_slice());
    payload.extend_from_slice(chk.as_slice());
    base58_encode(payload.as_slice())
}

///
/// The `validate_address` function validates an address by decoding it,
/// separating its components, and recomputing the checksum.
///
/// # Arguments
///
/// * `address` - A reference to the address.
pub fn validate_address(address: &str) -> Result<bool> {
    let payload = base58_decode(address)?;
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(CoinError::InvalidAddress(format!(
            "address payload too short: {}",
            address
        )));
    }
    let actual_checksum = &payload[payload.len() - ADDRESS_CHECK_SUM_LEN..];
    let target_checksum = checksum(&payload[..payload.len() - ADDRESS_CHECK_SUM_LEN]);
    Ok(actual_checksum.eq(target_checksum.as_slice()))
}

///
/// The `pub_key_hash_from_address` function decodes an address and extracts
/// the public key hash between the version byte and the checksum.
///
/// # Arguments
///
/// * `address` - A reference to the address.
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>> {
    let payload = base58_decode(address)?;
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(CoinError::InvalidAddress(format!(
            "address payload too short: {}",
            address
        )));
    }
    Ok(payload[1..payload.len() - ADDRESS_CHECK_SUM_LEN].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash_pub_key;

    #[test]
    fn test_address_round_trip() {
        let pub_key_hash = hash_pub_key(b"some public key bytes");
        let address = convert_address(&pub_key_hash);

        assert!(validate_address(&address).expect("Failed to validate"));
        assert_eq!(
            pub_key_hash_from_address(&address).expect("Failed to decode"),
            pub_key_hash
        );
    }

    #[test]
    fn test_tampered_address_fails_checksum() {
        let address = convert_address(&hash_pub_key(b"some public key bytes"));
        // Flip one character into another valid Base58 character.
        let mut chars: Vec<char> = address.chars().collect();
        chars[3] = if chars[3] == '2' { '3' } else { '2' };
        let tampered: String = chars.into_iter().collect();

        let valid = validate_address(&tampered).unwrap_or(false);
        assert!(!valid);
    }

    #[test]
    fn test_malformed_base58_is_rejected() {
        // '0' and 'l' are not in the Base58 alphabet
        assert!(validate_address("0OIl").is_err());
    }

    #[test]
    fn test_short_payload_is_rejected() {
        let short = base58_encode(&[ADDRESS_VERSION, 1, 2]);
        assert!(validate_address(&short).is_err());
        assert!(pub_key_hash_from_address(&short).is_err());
    }

    #[test]
    fn test_base58_round_trip() {
        let data = vec![0u8, 1, 2, 3, 254, 255];
        let encoded = base58_encode(&data);
        let decoded = base58_decode(&encoded).expect("Failed to decode");
        assert_eq!(data, decoded);
    }
}
