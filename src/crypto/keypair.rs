use crate::error::{CoinError, Result};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair};

///
/// The `new_key_pair` function generates a new ECDSA P-256 key pair and returns
/// the private key as a byte vector. It utilizes `EcdsaKeyPair` and
/// `SystemRandom` from the ring crate to generate a private key in PKCS#8
/// format and converts it to a byte vector.
///
pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    // Generates new key pair serialized as a PKCS#8 document.
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| CoinError::WalletKeyPairError(e.to_string()))?;
    Ok(pkcs8.as_ref().to_vec())
}

///
/// The `public_key_from_pkcs8` function recovers the serialized public key
/// from a PKCS#8 private-key document. The result is the fixed-width
/// uncompressed curve point (`0x04 ‖ X ‖ Y`, 65 bytes) that travels inside
/// transaction inputs.
///
/// # Arguments
///
/// * `pkcs8` - A reference to the PKCS#8 document.
pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::WalletKeyPairError(e.to_string()))?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_generation_is_random() {
        let key1 = new_key_pair().expect("Failed to generate first key pair");
        let key2 = new_key_pair().expect("Failed to generate second key pair");

        assert_ne!(key1, key2, "Generated keys should be different");
        assert!(!key1.is_empty());
    }

    #[test]
    fn test_public_key_shape() {
        let pkcs8 = new_key_pair().expect("Failed to generate key pair");
        let public_key = public_key_from_pkcs8(&pkcs8).expect("Failed to recover public key");

        assert_eq!(public_key.len(), 65, "P-256 public key should be 65 bytes");
        assert_eq!(public_key[0], 0x04, "Public key should be uncompressed");
    }

    #[test]
    fn test_public_key_recovery_is_stable() {
        let pkcs8 = new_key_pair().expect("Failed to generate key pair");
        let pk1 = public_key_from_pkcs8(&pkcs8).expect("Failed to recover public key");
        let pk2 = public_key_from_pkcs8(&pkcs8).expect("Failed to recover public key");
        assert_eq!(pk1, pk2);
    }

    #[test]
    fn test_public_key_from_garbage_fails() {
        let result = public_key_from_pkcs8(&[0u8; 16]);
        assert!(result.is_err());
    }
}
