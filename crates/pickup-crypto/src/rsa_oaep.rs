//! Direct RSA-OAEP (SHA-256) encryption for short payloads

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::Oaep;
use sha2::Sha256;

use crate::cipher::CipherError;
use crate::keys::{RsaPrivateKey, RsaPublicKey};

/// OAEP overhead for SHA-256: two digests plus two bytes
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// Largest plaintext a key can take under OAEP-SHA256 (190 bytes for RSA-2048)
pub fn max_plaintext_len(key: &RsaPublicKey) -> usize {
    key.inner().size().saturating_sub(OAEP_OVERHEAD)
}

pub fn encrypt(plaintext: &[u8], recipient: &RsaPublicKey) -> Result<Vec<u8>, CipherError> {
    let max = max_plaintext_len(recipient);
    if plaintext.len() > max {
        return Err(CipherError::PlaintextTooLong {
            max,
            actual: plaintext.len(),
        });
    }
    recipient
        .inner()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|_| CipherError::EncryptionFailed)
}

pub fn decrypt(ciphertext: &[u8], owner: &RsaPrivateKey) -> Result<Vec<u8>, CipherError> {
    owner
        .inner()
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)
}
