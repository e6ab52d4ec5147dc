//! # Pitwall Core
//!
//! Pure cryptographic primitives for Pitwall: per-team key pairs, envelope
//! encryption of record content, key re-wrapping and record signatures.
//!
//! This crate contains no I/O, no storage, no networking. Every operation
//! borrows key material for the duration of one call and keeps nothing.
//!
//! ## Key Types
//!
//! - [`KeyVault`] / [`KeyPair`] - RSA-2048 key generation, PEM encoded
//! - [`EnvelopeCipher`] - AEAD content encryption + RSA-OAEP key wrapping
//! - [`SignatureService`] - RSA-PSS signatures over record plaintext
//! - [`Record`] / [`Grant`] / [`Principal`] - the protected data model
//!
//! ## Encryption Model
//!
//! 1. **Data Key**: a fresh 256-bit key encrypts one record (AES-256-GCM by default)
//! 2. **Wrapped Key**: the data key, encrypted under a team's RSA public key
//! 3. **Grant**: the same data key wrapped again, independently, for another team
//!
//! ```rust,no_run
//! use pitwall_core::{EnvelopeCipher, KeyVault};
//!
//! let owner = KeyVault::generate().unwrap();
//! let sealed = EnvelopeCipher::default().encrypt(b"{\"x\":1}", owner.public_key()).unwrap();
//! let plaintext = EnvelopeCipher::decrypt(&sealed, owner.private_key()).unwrap();
//! assert_eq!(&plaintext[..], b"{\"x\":1}");
//! ```

pub mod digest;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod record;
pub mod signature;
pub mod types;

pub use digest::integrity_digest;
pub use envelope::{
    ContentCipher, ContentNonce, EnvelopeCipher, Plaintext, SealedContent, WrappedKey,
    DATA_KEY_LEN, NONCE_LEN, TAG_LEN,
};
pub use error::{CryptoError, Result};
pub use keys::{KeyPair, KeyVault, PrivateKeyPem, PublicKeyPem, RSA_MODULUS_BITS, RSA_PUBLIC_EXPONENT};
pub use record::{Classification, Grant, Principal, Record};
pub use signature::{RecordSignature, SignatureService};
pub use types::{now_millis, RecordId, TeamId};
