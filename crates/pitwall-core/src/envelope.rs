//! EnvelopeCipher: hybrid encryption of record content.
//!
//! Content is sealed with an AEAD under a fresh 256-bit data key; the data key
//! is wrapped under the recipient's RSA public key with OAEP/SHA-256.
//!
//! Storage format of the sealed body is `ciphertext || tag`, tag fixed at the
//! last [`TAG_LEN`] bytes.
//!
//! Failure kinds are kept apart: a bad private key or corrupted wrapped key
//! yields [`CryptoError::KeyUnwrap`]; a bad tag, nonce or ciphertext yields
//! [`CryptoError::Authentication`].

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce as AesNonce};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use rand::RngCore;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::encoding::{base64_array, base64_bytes};
use crate::error::{CryptoError, Result};
use crate::keys::{PrivateKeyPem, PublicKeyPem};

/// Data key length in bytes (256 bits).
pub const DATA_KEY_LEN: usize = 32;

/// Nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AEAD tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Decrypted content. Wiped from memory on drop.
pub type Plaintext = Zeroizing<Vec<u8>>;

/// AEAD used for record content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ContentCipher {
    /// AES-256-GCM.
    #[default]
    Aes256Gcm = 1,
    /// ChaCha20-Poly1305 with 256-bit key.
    #[serde(rename = "chacha20_poly1305")]
    ChaCha20Poly1305 = 2,
}

impl ContentCipher {
    /// Stable numeric tag for storage.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse the stable numeric tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ContentCipher::Aes256Gcm),
            2 => Some(ContentCipher::ChaCha20Poly1305),
            _ => None,
        }
    }
}

/// A 96-bit AEAD nonce, fresh per encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNonce(#[serde(with = "base64_array")] pub [u8; NONCE_LEN]);

impl ContentNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from a slice, failing on the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::Malformed(format!("nonce must be {NONCE_LEN} bytes")))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// A data key encrypted under one principal's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedKey(#[serde(with = "base64_bytes")] Vec<u8>);

impl WrappedKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Output of [`EnvelopeCipher::encrypt`]. Never contains the raw data key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedContent {
    /// AEAD that produced the ciphertext.
    pub cipher: ContentCipher,

    /// Encrypted content, without the tag.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// AEAD authentication tag.
    #[serde(with = "base64_array")]
    pub tag: [u8; TAG_LEN],

    /// Nonce used for this encryption.
    pub nonce: ContentNonce,

    /// Data key wrapped under the owner's public key.
    pub wrapped_key: WrappedKey,
}

impl SealedContent {
    /// `ciphertext || tag`, the stored body.
    pub fn combined(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Rebuild from a stored `ciphertext || tag` body.
    pub fn from_combined(
        cipher: ContentCipher,
        body: &[u8],
        nonce: ContentNonce,
        wrapped_key: WrappedKey,
    ) -> Result<Self> {
        let (ciphertext, tag) = split_tag(body)?;
        Ok(Self {
            cipher,
            ciphertext: ciphertext.to_vec(),
            tag,
            nonce,
            wrapped_key,
        })
    }
}

/// Split a `ciphertext || tag` body on the fixed tag boundary.
pub fn split_tag(body: &[u8]) -> Result<(&[u8], [u8; TAG_LEN])> {
    if body.len() < TAG_LEN {
        return Err(CryptoError::Malformed(format!(
            "sealed body is {} bytes, shorter than the {TAG_LEN}-byte tag",
            body.len()
        )));
    }
    let (ciphertext, tag) = body.split_at(body.len() - TAG_LEN);
    let mut arr = [0u8; TAG_LEN];
    arr.copy_from_slice(tag);
    Ok((ciphertext, arr))
}

/// A 256-bit symmetric data key. Lives only inside one envelope operation.
struct DataKey(Zeroizing<[u8; DATA_KEY_LEN]>);

impl DataKey {
    fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; DATA_KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    fn wrap(&self, recipient: &PublicKeyPem) -> Result<WrappedKey> {
        let public = recipient.to_rsa()?;
        let wrapped = public
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha256>(), &self.0[..])
            .map_err(|e| CryptoError::Encryption(format!("key wrap: {e}")))?;
        Ok(WrappedKey(wrapped))
    }

    fn unwrap(wrapped: &WrappedKey, holder: &PrivateKeyPem) -> Result<Self> {
        let private = holder.to_rsa()?;
        let bytes = Zeroizing::new(
            private
                .decrypt(Oaep::new::<Sha256>(), &wrapped.0)
                .map_err(|_| CryptoError::KeyUnwrap)?,
        );
        if bytes.len() != DATA_KEY_LEN {
            return Err(CryptoError::KeyUnwrap);
        }
        let mut key = Zeroizing::new([0u8; DATA_KEY_LEN]);
        key.copy_from_slice(&bytes);
        Ok(Self(key))
    }

    fn seal(&self, cipher: ContentCipher, nonce: &ContentNonce, plaintext: &[u8]) -> Result<Vec<u8>> {
        let sealed = match cipher {
            ContentCipher::Aes256Gcm => Aes256Gcm::new_from_slice(&self.0[..])
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(AesNonce::from_slice(&nonce.0), plaintext),
            ContentCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.0[..])
                .map_err(|e| CryptoError::Encryption(e.to_string()))?
                .encrypt(ChaChaNonce::from_slice(&nonce.0), plaintext),
        };
        sealed.map_err(|_| CryptoError::Encryption("aead seal failed".into()))
    }

    fn open(&self, cipher: ContentCipher, nonce: &ContentNonce, body: &[u8]) -> Result<Vec<u8>> {
        let opened = match cipher {
            ContentCipher::Aes256Gcm => Aes256Gcm::new_from_slice(&self.0[..])
                .map_err(|_| CryptoError::Authentication)?
                .decrypt(AesNonce::from_slice(&nonce.0), body),
            ContentCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.0[..])
                .map_err(|_| CryptoError::Authentication)?
                .decrypt(ChaChaNonce::from_slice(&nonce.0), body),
        };
        opened.map_err(|_| CryptoError::Authentication)
    }
}

/// Hybrid encryptor. Holds only the choice of AEAD, never key material.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCipher {
    cipher: ContentCipher,
}

impl EnvelopeCipher {
    /// Create an encryptor that seals new content with `cipher`.
    pub const fn new(cipher: ContentCipher) -> Self {
        Self { cipher }
    }

    /// Encrypt `plaintext` for `recipient`.
    ///
    /// A new data key and nonce are drawn on every call.
    pub fn encrypt(&self, plaintext: &[u8], recipient: &PublicKeyPem) -> Result<SealedContent> {
        let data_key = DataKey::generate();
        let nonce = ContentNonce::generate();

        let body = data_key.seal(self.cipher, &nonce, plaintext)?;
        let wrapped_key = data_key.wrap(recipient)?;
        let (ciphertext, tag) = split_tag(&body)?;

        Ok(SealedContent {
            cipher: self.cipher,
            ciphertext: ciphertext.to_vec(),
            tag,
            nonce,
            wrapped_key,
        })
    }

    /// Decrypt `sealed` with the private key matching its wrapped key.
    pub fn decrypt(sealed: &SealedContent, recipient: &PrivateKeyPem) -> Result<Plaintext> {
        Self::decrypt_with(sealed, &sealed.wrapped_key, recipient)
    }

    /// Decrypt `sealed` using a different wrapping of its data key, e.g. a grant's.
    pub fn decrypt_with(
        sealed: &SealedContent,
        wrapped_key: &WrappedKey,
        holder: &PrivateKeyPem,
    ) -> Result<Plaintext> {
        let data_key = DataKey::unwrap(wrapped_key, holder)?;
        let body = sealed.combined();
        Ok(Zeroizing::new(data_key.open(sealed.cipher, &sealed.nonce, &body)?))
    }

    /// Unwrap with `holder` and immediately re-wrap for `recipient`.
    ///
    /// The raw data key never leaves this call. OAEP is randomized, so the
    /// result never equals the input bytes even for the same recipient.
    pub fn rewrap(
        wrapped_key: &WrappedKey,
        holder: &PrivateKeyPem,
        recipient: &PublicKeyPem,
    ) -> Result<WrappedKey> {
        let data_key = DataKey::unwrap(wrapped_key, holder)?;
        data_key.wrap(recipient)
    }
}
