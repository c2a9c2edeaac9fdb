use crate::error::{CoinError, Result};
use ring::signature::{ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair};

///
/// The `ecdsa_p256_sha256_sign_digest` function signs the provided message
/// using the ECDSA P-256 SHA-256 algorithm. Given a private key in PKCS#8
/// format, it creates an ECDSA key pair, signs the message, and returns the
/// fixed-format signature (`r ‖ s`, two equal 32-byte halves) as a byte
/// vector.
///
/// # Arguments
///
/// * `pkcs8` - A reference to the PKCS#8 document.
/// * `message` - A reference to the message.
pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| CoinError::TransactionSignatureError(e.to_string()))?;
    key_pair
        .sign(&rng, message)
        .map(|signature| signature.as_ref().to_vec())
        .map_err(|e| CoinError::TransactionSignatureError(e.to_string()))
}

///
/// The `ecdsa_p256_sha256_sign_verify` function verifies an ECDSA P-256
/// SHA-256 signature against a provided message using the corresponding
/// public key. It constructs an unparsed public key from the byte slice and
/// uses it to verify the signature, returning a boolean indicating validity.
///
/// # Arguments
///
/// * `public_key` - A reference to the serialized public key.
/// * `signature` - A reference to the signature.
/// * `message` - A reference to the message.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    let result = peer_public_key.verify(message, signature);
    result.is_ok()
}
