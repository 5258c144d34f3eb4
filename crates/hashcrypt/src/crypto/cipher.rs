//! AES-128-CBC sealing and opening of individual field values.
//!
//! **Confidentiality only.** CBC with PKCS#7 padding provides no integrity
//! protection: a modified envelope either fails padding validation or opens
//! to different bytes. Callers that need tamper detection must not use this
//! module.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Byte length of an AES-128 data key (16 bytes = 128 bits).
pub const KEY_LEN: usize = 16;

/// Byte length of the random IV prefixed to every envelope.
pub const NONCE_LEN: usize = 16;

/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The data key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid data key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// The envelope cannot hold a nonce and at least one cipher block.
    #[error("envelope too short: {0} bytes")]
    Truncated(usize),

    /// The ciphertext after the nonce is not a whole number of blocks.
    #[error("ciphertext length {0} is not a multiple of {BLOCK_LEN}")]
    Malformed(usize),

    /// PKCS#7 padding did not validate after decryption.
    #[error("invalid padding")]
    Padding,
}

/// Encrypt `plaintext` under `key` and return `nonce || ciphertext`.
///
/// A fresh IV is drawn from the OS CSPRNG for every call, so sealing the same
/// value twice yields different envelopes.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    ensure_key_len(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = Aes128CbcEnc::new_from_slices(key, &nonce)
        .map_err(|_| CipherError::InvalidKeyLength(key.len()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Split the IV from `envelope`, decrypt the remainder and strip the padding.
///
/// The returned plaintext is exactly the unpadded length reported by the
/// cipher, so payloads containing `0x00` bytes survive unchanged.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] for a bad key,
/// [`CipherError::Truncated`] or [`CipherError::Malformed`] for an envelope
/// with the wrong shape, and [`CipherError::Padding`] when unpadding fails
/// (usually a wrong key or a modified envelope).
pub fn open(key: &[u8], envelope: &[u8]) -> Result<Vec<u8>, CipherError> {
    ensure_key_len(key)?;

    if envelope.len() < NONCE_LEN + BLOCK_LEN {
        return Err(CipherError::Truncated(envelope.len()));
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CipherError::Malformed(ciphertext.len()));
    }

    Aes128CbcDec::new_from_slices(key, nonce)
        .map_err(|_| CipherError::InvalidKeyLength(key.len()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Padding)
}

fn ensure_key_len(key: &[u8]) -> Result<(), CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength(key.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn seal_open_round_trip() {
        let key = random_key();
        let envelope = seal(&key, b"1234567891").unwrap();
        assert_eq!(open(&key, &envelope).unwrap(), b"1234567891");
    }

    #[test]
    fn envelope_is_nonce_plus_padded_blocks() {
        let key = random_key();
        // 10 bytes pad to one block; 16 bytes gain a full padding block.
        assert_eq!(seal(&key, b"1234567891").unwrap().len(), NONCE_LEN + 16);
        assert_eq!(seal(&key, &[7u8; 16]).unwrap().len(), NONCE_LEN + 32);
    }

    #[test]
    fn empty_plaintext_seals_to_one_padding_block() {
        let key = random_key();
        let envelope = seal(&key, b"").unwrap();
        assert_eq!(envelope.len(), NONCE_LEN + BLOCK_LEN);
        assert!(open(&key, &envelope).unwrap().is_empty());
    }

    #[test]
    fn embedded_null_bytes_survive() {
        let key = random_key();
        let plaintext = b"abc\0def\0\0";
        let envelope = seal(&key, plaintext).unwrap();
        assert_eq!(open(&key, &envelope).unwrap(), plaintext);
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let key = random_key();
        let a = seal(&key, b"same value").unwrap();
        let b = seal(&key, b"same value").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            seal(&[0u8; 32], b"x"),
            Err(CipherError::InvalidKeyLength(32))
        ));
        assert!(matches!(
            open(&[0u8; 8], &[0u8; 32]),
            Err(CipherError::InvalidKeyLength(8))
        ));
    }

    #[test]
    fn truncated_envelope_rejected() {
        let key = random_key();
        assert!(matches!(
            open(&key, &[0u8; NONCE_LEN]),
            Err(CipherError::Truncated(16))
        ));
    }

    #[test]
    fn partial_block_rejected() {
        let key = random_key();
        let mut envelope = seal(&key, b"hello").unwrap();
        envelope.push(0);
        assert!(matches!(
            open(&key, &envelope),
            Err(CipherError::Malformed(17))
        ));
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let key = random_key();
        let other = random_key();
        let envelope = seal(&key, b"secret").unwrap();
        // Without authentication a wrong key usually fails unpadding, but it
        // may occasionally produce valid padding over garbage.
        match open(&other, &envelope) {
            Ok(pt) => assert_ne!(pt, b"secret"),
            Err(e) => assert!(matches!(e, CipherError::Padding)),
        }
    }

    #[test]
    fn known_answer_with_fixed_iv() {
        // NIST SP 800-38A F.2.1, first block, decrypted through `open` with
        // a hand-built PKCS#7 tail block.
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let block = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();

        let ciphertext = Aes128CbcEnc::new_from_slices(&key, &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(&block);
        assert_eq!(
            hex::encode(&ciphertext[..BLOCK_LEN]),
            "7649abac8119b246cee98e9b12e9197d"
        );

        let mut envelope = iv.clone();
        envelope.extend_from_slice(&ciphertext);
        assert_eq!(open(&key, &envelope).unwrap(), block);
    }
}
