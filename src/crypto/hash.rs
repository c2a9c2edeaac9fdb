use ring::digest::{Context, SHA256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

///
/// The `sha256_digest` function performs a SHA-256 hash operation on the provided data input,
/// returning the resulting hash as a vector of bytes.
/// It initializes a hashing context with SHA-256, updates the context with the input data,
/// generates the hash digest, and converts it to a vector of bytes for output.
///
/// # Arguments
///
/// * `data` - A reference to the input data.
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

///
/// The `hash_pub_key` function derives the 20-byte on-chain recipient
/// identifier from a serialized public key: RIPEMD-160(SHA-256(pub_key)).
///
/// # Arguments
///
/// * `pub_key` - A reference to the serialized public key.
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let sha = Sha256::digest(pub_key);
    Ripemd160::digest(sha).to_vec()
}

///
/// The `checksum` function generates an address checksum by applying a double
/// SHA-256 hash and extracting the first four bytes.
///
/// # Arguments
///
/// * `payload` - A reference to the versioned payload.
pub fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = sha256_digest(payload);
    let second_sha = sha256_digest(first_sha.as_slice());
    second_sha[0..super::address::ADDRESS_CHECK_SUM_LEN].to_vec()
}
