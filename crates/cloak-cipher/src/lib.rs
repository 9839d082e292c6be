//! At-rest encryption of destination URLs.
//!
//! Every URL is encrypted with AES in CTR mode under a fresh random IV.
//! The IV is prepended to the ciphertext and the whole blob is hex encoded
//! for storage:
//!
//! ```text
//! hex( iv[16] || aes-ctr(key, iv, url) )
//! ```

mod key;

pub use key::CipherKey;

use aes::{Aes128, Aes192, Aes256};
use cloak_core::{CipherError, EntropySource, OsEntropy};
use ctr::cipher::{KeyIvInit, StreamCipher};
use std::sync::Arc;

type Result<T> = std::result::Result<T, CipherError>;

/// AES block size, which is also the IV length.
pub const IV_LEN: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Symmetric cipher for URL payloads.
///
/// Holds no mutable state besides the injected random source, so a single
/// instance can be shared across request handlers.
#[derive(Clone)]
pub struct Cipher {
    key: CipherKey,
    entropy: Arc<dyn EntropySource>,
}

impl Cipher {
    /// Creates a cipher that draws IVs from the operating system.
    pub fn new(key: CipherKey) -> Self {
        Self::with_entropy(key, Arc::new(OsEntropy))
    }

    /// Creates a cipher that draws IVs from the given source.
    pub fn with_entropy(key: CipherKey, entropy: Arc<dyn EntropySource>) -> Self {
        Self { key, entropy }
    }

    /// Encrypts a URL and returns the hex encoded `iv || ciphertext` blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let blob = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(hex::encode(blob))
    }

    /// Decodes and decrypts a blob produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = hex::decode(encoded)
            .map_err(|e| CipherError::Decryption(format!("invalid hex payload: {e}")))?;
        let plaintext = self.decrypt_bytes(&blob)?;
        String::from_utf8(plaintext)
            .map_err(|e| CipherError::Decryption(format!("payload is not utf-8: {e}")))
    }

    /// Encrypts raw bytes, returning `iv || ciphertext`.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut blob = vec![0u8; IV_LEN + plaintext.len()];
        let (iv, body) = blob.split_at_mut(IV_LEN);
        self.entropy.fill(iv)?;
        body.copy_from_slice(plaintext);
        self.apply_keystream(iv, body)
            .map_err(CipherError::Encryption)?;
        Ok(blob)
    }

    /// Splits the IV from `blob` and decrypts the remainder.
    pub fn decrypt_bytes(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < IV_LEN {
            return Err(CipherError::Decryption(format!(
                "ciphertext is {} bytes, shorter than the {IV_LEN}-byte iv",
                blob.len()
            )));
        }

        let (iv, body) = blob.split_at(IV_LEN);
        let mut plaintext = body.to_vec();
        self.apply_keystream(iv, &mut plaintext)
            .map_err(CipherError::Decryption)?;
        Ok(plaintext)
    }

    fn apply_keystream(&self, iv: &[u8], buf: &mut [u8]) -> std::result::Result<(), String> {
        // CTR is symmetric: the same call encrypts and decrypts.
        match &self.key {
            CipherKey::Aes128(key) => Aes128Ctr::new_from_slices(key, iv)
                .map(|mut c| c.apply_keystream(buf))
                .map_err(|e| e.to_string()),
            CipherKey::Aes192(key) => Aes192Ctr::new_from_slices(key, iv)
                .map(|mut c| c.apply_keystream(buf))
                .map_err(|e| e.to_string()),
            CipherKey::Aes256(key) => Aes256Ctr::new_from_slices(key, iv)
                .map(|mut c| c.apply_keystream(buf))
                .map_err(|e| e.to_string()),
        }
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::{EntropyError, SeededEntropy};

    const KEY_256: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    fn cipher() -> Cipher {
        Cipher::new(CipherKey::from_bytes(KEY_256).unwrap())
    }

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn fill(&self, _dest: &mut [u8]) -> std::result::Result<(), EntropyError> {
            Err(EntropyError("device unavailable".to_string()))
        }
    }

    #[test]
    fn round_trip_all_key_sizes() {
        for len in [16, 24, 32] {
            let key = CipherKey::from_bytes(&KEY_256[..len]).unwrap();
            let cipher = Cipher::new(key);
            for url in ["https://example.com", "http://a.b/c?d=e&f=g#h", "https://例え.jp/パス"] {
                let sealed = cipher.encrypt(url).unwrap();
                assert_eq!(cipher.decrypt(&sealed).unwrap(), url);
            }
        }
    }

    #[test]
    fn round_trip_empty_plaintext() {
        let cipher = cipher();
        let sealed = cipher.encrypt("").unwrap();
        assert_eq!(sealed.len(), IV_LEN * 2);
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "");
    }

    #[test]
    fn iv_is_fresh_per_call() {
        let cipher = cipher();
        let first = cipher.encrypt_bytes(b"https://example.com").unwrap();
        let second = cipher.encrypt_bytes(b"https://example.com").unwrap();

        assert_ne!(first[..IV_LEN], second[..IV_LEN]);
        assert_ne!(first, second);
    }

    #[test]
    fn ciphertext_does_not_contain_plaintext() {
        let cipher = cipher();
        let blob = cipher.encrypt_bytes(b"https://example.com").unwrap();
        assert_eq!(blob.len(), IV_LEN + "https://example.com".len());
        assert_ne!(&blob[IV_LEN..], b"https://example.com");
    }

    #[test]
    fn blobs_shorter_than_a_block_are_rejected() {
        let cipher = cipher();
        for len in 0..IV_LEN {
            let err = cipher.decrypt_bytes(&vec![7u8; len]).unwrap_err();
            assert!(matches!(err, CipherError::Decryption(_)));

            let err = cipher.decrypt(&hex::encode(vec![7u8; len])).unwrap_err();
            assert!(matches!(err, CipherError::Decryption(_)));
        }
    }

    #[test]
    fn invalid_hex_is_rejected() {
        let err = cipher().decrypt("not hex at all").unwrap_err();
        assert!(matches!(err, CipherError::Decryption(_)));
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let sealed = cipher().encrypt("https://example.com").unwrap();
        let other = Cipher::new(CipherKey::from_bytes(b"fedcba9876543210fedcba9876543210").unwrap());

        match other.decrypt(&sealed) {
            Ok(url) => assert_ne!(url, "https://example.com"),
            Err(err) => assert!(matches!(err, CipherError::Decryption(_))),
        }
    }

    #[test]
    fn seeded_entropy_makes_output_reproducible() {
        let key = CipherKey::from_bytes(KEY_256).unwrap();
        let a = Cipher::with_entropy(key.clone(), Arc::new(SeededEntropy::new(7)));
        let b = Cipher::with_entropy(key, Arc::new(SeededEntropy::new(7)));

        assert_eq!(
            a.encrypt("https://example.com").unwrap(),
            b.encrypt("https://example.com").unwrap()
        );
    }

    #[test]
    fn entropy_failure_is_an_encryption_error() {
        let key = CipherKey::from_bytes(KEY_256).unwrap();
        let cipher = Cipher::with_entropy(key, Arc::new(BrokenEntropy));

        let err = cipher.encrypt("https://example.com").unwrap_err();
        assert!(matches!(err, CipherError::Encryption(_)));
    }

    #[test]
    fn debug_hides_key_material() {
        let rendered = format!("{:?}", cipher());
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
