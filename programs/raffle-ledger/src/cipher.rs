use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use anchor_lang::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use solana_program::hash::hashv;

use crate::constants::*;
use crate::error::LedgerError;

/// Source of the symmetric key instant-win records are sealed with.
/// Swap the implementation to move the key into a KMS or HSM.
pub trait KeyProvider: Send + Sync {
    fn instant_win_key(&self) -> Result<[u8; 32]>;
}

/// Holds a key derived once from a configured secret.
pub struct StaticKeyProvider {
    key: [u8; 32],
}

impl StaticKeyProvider {
    pub fn from_secret(secret: &str) -> Result<Self> {
        require!(!secret.is_empty(), LedgerError::KeyUnavailable);
        Ok(Self {
            key: hashv(&[INSTANT_WIN_KEY_DOMAIN, secret.as_bytes()]).to_bytes(),
        })
    }

    pub fn from_key(key: [u8; 32]) -> Self {
        Self { key }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn instant_win_key(&self) -> Result<[u8; 32]> {
        Ok(self.key)
    }
}

fn cipher_for(key: &[u8; 32]) -> Result<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| error!(LedgerError::KeyUnavailable))
}

/// AES-256-GCM with a fresh random nonce. Output is `hex(nonce):hex(ciphertext)`.
/// `aad` is authenticated but not stored; `open` must be given the same value.
pub fn seal(key: &[u8; 32], aad: &[u8], plaintext: &[u8]) -> Result<String> {
    let cipher = cipher_for(key)?;
    let mut nonce = [0u8; SEAL_NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|_| error!(LedgerError::SerializationFailed))?;

    Ok(format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)))
}

/// Inverse of `seal`. Any malformed or altered record is `SealedRecordCorrupted`.
pub fn open(key: &[u8; 32], aad: &[u8], sealed: &str) -> Result<Vec<u8>> {
    let (nonce_hex, ciphertext_hex) = sealed
        .split_once(':')
        .ok_or_else(|| error!(LedgerError::SealedRecordCorrupted))?;
    let nonce = hex::decode(nonce_hex).map_err(|_| error!(LedgerError::SealedRecordCorrupted))?;
    let ciphertext =
        hex::decode(ciphertext_hex).map_err(|_| error!(LedgerError::SealedRecordCorrupted))?;
    require!(nonce.len() == SEAL_NONCE_LEN, LedgerError::SealedRecordCorrupted);

    cipher_for(key)?
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad,
            },
        )
        .map_err(|_| error!(LedgerError::SealedRecordCorrupted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_error;

    fn key() -> [u8; 32] {
        StaticKeyProvider::from_secret("test-secret")
            .unwrap()
            .instant_win_key()
            .unwrap()
    }

    #[test]
    fn test_open_recovers_plaintext() {
        let sealed = seal(&key(), b"comp-1", b"payload").unwrap();
        assert_eq!(open(&key(), b"comp-1", &sealed).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_nonce_is_fresh_per_record() {
        let a = seal(&key(), b"comp-1", b"payload").unwrap();
        let b = seal(&key(), b"comp-1", b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_aad_is_rejected() {
        let sealed = seal(&key(), b"comp-1", b"payload").unwrap();
        let err = open(&key(), b"comp-2", &sealed).unwrap_err();
        assert!(is_error(&err, LedgerError::SealedRecordCorrupted));
    }

    #[test]
    fn test_flipped_byte_is_rejected() {
        let sealed = seal(&key(), b"comp-1", b"payload").unwrap();
        let (nonce, ct) = sealed.split_once(':').unwrap();
        let mut bytes = hex::decode(ct).unwrap();
        bytes[0] ^= 0x01;
        let altered = format!("{}:{}", nonce, hex::encode(bytes));
        assert!(open(&key(), b"comp-1", &altered).is_err());
        assert!(open(&key(), b"comp-1", "not-sealed").is_err());
    }

    #[test]
    fn test_empty_secret_is_rejected() {
        assert!(StaticKeyProvider::from_secret("").is_err());
    }
}
