//! Halflife Cryptography
//!
//! Key pairs, input signatures, hashing and address derivation

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use sha3::Sha3_256;
use thiserror::Error;

/// Length in bytes of the account part of an address
const ADDRESS_LENGTH: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// Key pair owning the UTXOs of one address
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create keypair from private key hex
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| CryptoError::InvalidPrivateKey)?;

        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Address receiving the outputs this key pair can spend
    pub fn address(&self) -> String {
        address_from_key_bytes(self.verifying_key.as_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message))
    }

    /// Verify a signature against a hex encoded public key
    pub fn verify(
        public_key_hex: &str,
        message: &[u8],
        signature_bytes: &[u8],
    ) -> Result<(), CryptoError> {
        let verifying_key = decode_public_key(public_key_hex)?;

        let sig_array: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;

        let signature = Signature::from_bytes(&sig_array);

        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Same as [`KeyPair::verify`] with a hex encoded signature
    pub fn verify_hex(
        public_key_hex: &str,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), CryptoError> {
        let signature_bytes =
            hex::decode(signature_hex).map_err(|_| CryptoError::InvalidSignature)?;
        Self::verify(public_key_hex, message, &signature_bytes)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

fn decode_public_key(public_key_hex: &str) -> Result<VerifyingKey, CryptoError> {
    let pub_key_bytes = hex::decode(public_key_hex).map_err(|_| CryptoError::InvalidPublicKey)?;

    let pub_key_array: [u8; 32] = pub_key_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;

    VerifyingKey::from_bytes(&pub_key_array).map_err(|_| CryptoError::InvalidPublicKey)
}

fn address_from_key_bytes(key_bytes: &[u8]) -> String {
    let digest = Sha3_256::digest(key_bytes);
    format!("0x{}", hex::encode(&digest[digest.len() - ADDRESS_LENGTH..]))
}

/// Hash data with SHA256
pub fn hash_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hash data and return as hex string
pub fn hash_sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_sha256(data))
}

/// Derive the address owning outputs spendable with this public key
pub fn public_key_to_address(public_key_hex: &str) -> Result<String, CryptoError> {
    let verifying_key = decode_public_key(public_key_hex)?;
    Ok(address_from_key_bytes(verifying_key.as_bytes()))
}
