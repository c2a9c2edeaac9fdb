// Cryptographic primitives: hashing, P-256 key pairs, ECDSA signatures and
// Base58 address encoding.
pub mod address;
pub mod hash;
pub mod keypair;
pub mod signature;

pub use address::{
    ADDRESS_CHECK_SUM_LEN, ADDRESS_VERSION, base58_decode, base58_encode, convert_address,
    pub_key_hash_from_address, validate_address,
};
pub use hash::{checksum, hash_pub_key, sha256_digest};
pub use keypair::{new_key_pair, public_key_from_pkcs8};
pub use signature::{ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify};
