//! ECIES-style hybrid encryption over P-256
//!
//! Blob layout: ephemeral public key (33, compressed) || IV (16) || AES-256-CBC
//! ciphertext (PKCS#7). The prefix widths are protocol constants.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::{CipherError, KeyDerivation};
use crate::keys::{EcPrivateKey, EcPublicKey};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Compressed ephemeral public key length
pub const EPHEMERAL_KEY_LEN: usize = 33;
/// AES-CBC IV length
pub const IV_LEN: usize = 16;
/// Fixed-width prefix before the ciphertext
pub const HEADER_LEN: usize = EPHEMERAL_KEY_LEN + IV_LEN;
/// AES-256 key length
pub const SYMMETRIC_KEY_LEN: usize = 32;

const HKDF_INFO: &[u8] = b"pickup-pass/ecies/aes-256-cbc";

fn derive_key(
    shared_secret: &[u8],
    derivation: KeyDerivation,
) -> Result<Zeroizing<[u8; SYMMETRIC_KEY_LEN]>, CipherError> {
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    match derivation {
        KeyDerivation::Truncate => {
            if shared_secret.len() < SYMMETRIC_KEY_LEN {
                return Err(CipherError::KeyDerivation);
            }
            key.copy_from_slice(&shared_secret[..SYMMETRIC_KEY_LEN]);
        }
        KeyDerivation::HkdfSha256 => {
            Hkdf::<Sha256>::new(None, shared_secret)
                .expand(HKDF_INFO, &mut key[..])
                .map_err(|_| CipherError::KeyDerivation)?;
        }
    }
    Ok(key)
}

/// Encrypt `plaintext` for the holder of `recipient`'s private key.
///
/// A fresh ephemeral key pair and IV are drawn on every call.
pub fn encrypt(
    plaintext: &[u8],
    recipient: &EcPublicKey,
    derivation: KeyDerivation,
) -> Result<Vec<u8>, CipherError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let ephemeral_public = ephemeral.public_key().to_encoded_point(true);
    let shared = ephemeral.diffie_hellman(recipient.inner());
    let key = derive_key(shared.raw_secret_bytes().as_slice(), derivation)?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new_from_slices(&key[..], &iv)
        .map_err(|_| CipherError::EncryptionFailed)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.extend_from_slice(ephemeral_public.as_bytes());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Anything past the length check fails as `DecryptionFailed` with no further detail.
pub fn decrypt(
    blob: &[u8],
    owner: &EcPrivateKey,
    derivation: KeyDerivation,
) -> Result<Vec<u8>, CipherError> {
    if blob.len() < HEADER_LEN {
        return Err(CipherError::Decode(format!(
            "expected at least {HEADER_LEN} bytes, got {}",
            blob.len()
        )));
    }

    let (ephemeral_bytes, rest) = blob.split_at(EPHEMERAL_KEY_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let ephemeral = p256::PublicKey::from_sec1_bytes(ephemeral_bytes)
        .map_err(|_| CipherError::DecryptionFailed)?;
    let shared = p256::ecdh::diffie_hellman(
        owner.inner().to_nonzero_scalar(),
        ephemeral.as_affine(),
    );
    let key = derive_key(shared.raw_secret_bytes().as_slice(), derivation)?;

    Aes256CbcDec::new_from_slices(&key[..], iv)
        .map_err(|_| CipherError::DecryptionFailed)?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::EcKeyPair;

    fn roundtrip(plaintext: &[u8], derivation: KeyDerivation) -> Vec<u8> {
        let pair = EcKeyPair::generate();
        let blob = encrypt(plaintext, pair.public_key(), derivation).unwrap();
        decrypt(&blob, pair.private_key(), derivation).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = br#"{"name":"Lee","totp":"123456"}"#;
        assert_eq!(roundtrip(plaintext, KeyDerivation::Truncate), plaintext);
    }

    #[test]
    fn test_roundtrip_empty_plaintext() {
        assert!(roundtrip(b"", KeyDerivation::Truncate).is_empty());
    }

    #[test]
    fn test_roundtrip_multibyte_text() {
        let plaintext = "王小明 ✓ émoji 🚚".as_bytes();
        assert_eq!(roundtrip(plaintext, KeyDerivation::Truncate), plaintext);
    }

    #[test]
    fn test_roundtrip_large_payload() {
        let plaintext: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip(&plaintext, KeyDerivation::Truncate), plaintext);
    }

    #[test]
    fn test_roundtrip_hkdf() {
        let plaintext = b"hardened derivation";
        assert_eq!(roundtrip(plaintext, KeyDerivation::HkdfSha256), plaintext);
    }

    #[test]
    fn test_blob_layout() {
        let pair = EcKeyPair::generate();
        let blob = encrypt(b"0123456789", pair.public_key(), KeyDerivation::Truncate).unwrap();

        // one padded block after the header
        assert_eq!(blob.len(), HEADER_LEN + 16);
        assert!(blob[0] == 0x02 || blob[0] == 0x03);
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let pair = EcKeyPair::generate();
        let a = encrypt(b"same input", pair.public_key(), KeyDerivation::Truncate).unwrap();
        let b = encrypt(b"same input", pair.public_key(), KeyDerivation::Truncate).unwrap();

        assert_ne!(a, b);
        assert_ne!(a[..EPHEMERAL_KEY_LEN], b[..EPHEMERAL_KEY_LEN]);
        assert_ne!(a[EPHEMERAL_KEY_LEN..HEADER_LEN], b[EPHEMERAL_KEY_LEN..HEADER_LEN]);
    }

    #[test]
    fn test_short_blob_is_decode_error() {
        let pair = EcKeyPair::generate();
        let result = decrypt(&[0u8; HEADER_LEN - 1], pair.private_key(), KeyDerivation::Truncate);
        assert!(matches!(result, Err(CipherError::Decode(_))));
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let owner = EcKeyPair::generate();
        let stranger = EcKeyPair::generate();
        let plaintext = b"secret pickup data";

        let blob = encrypt(plaintext, owner.public_key(), KeyDerivation::Truncate).unwrap();
        let result = decrypt(&blob, stranger.private_key(), KeyDerivation::Truncate);

        // CBC has no authentication: a wrong key almost always breaks the padding,
        // and when it does not the output is garbage.
        assert!(result.map(|p| p != plaintext).unwrap_or(true));
    }

    #[test]
    fn test_mismatched_derivation_does_not_recover_plaintext() {
        let pair = EcKeyPair::generate();
        let plaintext = b"derivation must match";

        let blob = encrypt(plaintext, pair.public_key(), KeyDerivation::HkdfSha256).unwrap();
        let result = decrypt(&blob, pair.private_key(), KeyDerivation::Truncate);
        assert!(result.map(|p| p != plaintext).unwrap_or(true));
    }

    #[test]
    fn test_corrupted_ephemeral_key_fails() {
        let pair = EcKeyPair::generate();
        let mut blob = encrypt(b"data", pair.public_key(), KeyDerivation::Truncate).unwrap();

        // 0x05 is not a valid SEC1 tag
        blob[0] = 0x05;
        let result = decrypt(&blob, pair.private_key(), KeyDerivation::Truncate);
        assert_eq!(result, Err(CipherError::DecryptionFailed));
    }
}
