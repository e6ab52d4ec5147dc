//! KeyVault: per-team RSA key pairs.
//!
//! Keys are generated once per principal and exchanged as PEM text
//! (PKCS#8 for the private half, SPKI for the public half). The private PEM
//! lives in a zeroizing buffer and never appears in `Debug` output.

use std::fmt;

use rand::rngs::ThreadRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Modulus size of every generated key pair.
pub const RSA_MODULUS_BITS: usize = 2048;

/// Public exponent of every generated key pair.
pub const RSA_PUBLIC_EXPONENT: u32 = 65_537;

/// A PEM-encoded (SPKI) RSA public key. Freely distributable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKeyPem(String);

impl PublicKeyPem {
    /// Wrap PEM text after checking that it parses as a 2048-bit RSA key.
    pub fn parse(pem: impl Into<String>) -> Result<Self> {
        let key = Self(pem.into());
        key.to_rsa()?;
        Ok(key)
    }

    /// Wrap PEM text that is already known to be valid (e.g. read back from storage).
    pub fn from_trusted(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    /// The PEM text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short Blake3 fingerprint, safe to log.
    pub fn fingerprint(&self) -> String {
        blake3::hash(self.0.as_bytes()).to_hex()[..16].to_string()
    }

    pub(crate) fn to_rsa(&self) -> Result<RsaPublicKey> {
        let key = RsaPublicKey::from_public_key_pem(&self.0)
            .map_err(|e| CryptoError::InvalidKey(format!("public key: {e}")))?;
        check_modulus(key.size())?;
        Ok(key)
    }
}

impl fmt::Display for PublicKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A PEM-encoded (PKCS#8) RSA private key.
///
/// Owned by exactly one principal's storage record.
#[derive(Clone)]
pub struct PrivateKeyPem(Zeroizing<String>);

impl PrivateKeyPem {
    /// Wrap PEM text read back from storage.
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self(Zeroizing::new(pem.into()))
    }

    /// The PEM text. Callers must not log or transmit it.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub(crate) fn to_rsa(&self) -> Result<RsaPrivateKey> {
        let key = RsaPrivateKey::from_pkcs8_pem(&self.0)
            .map_err(|_| CryptoError::InvalidKey("private key is not valid PKCS#8 PEM".into()))?;
        check_modulus(key.size())?;
        Ok(key)
    }
}

impl fmt::Debug for PrivateKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyPem(<redacted>)")
    }
}

/// An RSA key pair belonging to one principal.
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: PublicKeyPem,
    private: PrivateKeyPem,
}

impl KeyPair {
    /// Reassemble a key pair from stored PEM halves.
    pub fn from_parts(public: PublicKeyPem, private: PrivateKeyPem) -> Self {
        Self { public, private }
    }

    /// The public half.
    pub fn public_key(&self) -> &PublicKeyPem {
        &self.public
    }

    /// The private half.
    pub fn private_key(&self) -> &PrivateKeyPem {
        &self.private
    }
}

/// Generates fresh, independent key pairs.
pub struct KeyVault;

impl KeyVault {
    /// Generate a key pair from the thread-local CSPRNG.
    pub fn generate() -> Result<KeyPair> {
        let mut rng: ThreadRng = rand::thread_rng();
        Self::generate_with_rng(&mut rng)
    }

    /// Generate a key pair from the given entropy source.
    ///
    /// Fails only if the RNG cannot produce a prime; callers treat that as fatal.
    pub fn generate_with_rng<R: rand::CryptoRng + rand::RngCore>(rng: &mut R) -> Result<KeyPair> {
        let exponent = BigUint::from(RSA_PUBLIC_EXPONENT);
        let private = RsaPrivateKey::new_with_exp(rng, RSA_MODULUS_BITS, &exponent)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(format!("private key encoding: {e}")))?;
        let public_pem = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(format!("public key encoding: {e}")))?;

        Ok(KeyPair {
            public: PublicKeyPem(public_pem),
            private: PrivateKeyPem(private_pem),
        })
    }
}

fn check_modulus(size_bytes: usize) -> Result<()> {
    if size_bytes * 8 != RSA_MODULUS_BITS {
        return Err(CryptoError::InvalidKey(format!(
            "expected {RSA_MODULUS_BITS}-bit modulus, got {}",
            size_bytes * 8
        )));
    }
    Ok(())
}
