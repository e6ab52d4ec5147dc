//! SignatureService: RSA-PSS/SHA-256 signatures over record plaintext.
//!
//! Signatures are made with the uploader team's private key and checked with
//! its public key. Signing is randomized (PSS salt plus blinding), so two
//! signatures over the same bytes differ while both verify.

use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::encoding::base64_bytes;
use crate::error::{CryptoError, Result};
use crate::keys::{PrivateKeyPem, PublicKeyPem};

/// A detached RSA-PSS signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSignature(#[serde(with = "base64_bytes")] Vec<u8>);

impl RecordSignature {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Produces and checks record signatures.
pub struct SignatureService;

impl SignatureService {
    /// Sign `message` with `signer`.
    pub fn sign(message: &[u8], signer: &PrivateKeyPem) -> Result<RecordSignature> {
        let signing_key = BlindedSigningKey::<Sha256>::new(signer.to_rsa()?);
        let signature = signing_key
            .try_sign_with_rng(&mut rand::thread_rng(), message)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(RecordSignature(signature.to_vec()))
    }

    /// Check `signature` over `message`.
    ///
    /// Any failure, including an unparseable key or signature, is `false`.
    pub fn verify(message: &[u8], signature: &RecordSignature, signer: &PublicKeyPem) -> bool {
        Self::try_verify(message, signature, signer).is_ok()
    }

    /// Like [`verify`](Self::verify), but reports why verification failed.
    pub fn try_verify(
        message: &[u8],
        signature: &RecordSignature,
        signer: &PublicKeyPem,
    ) -> Result<()> {
        let verifying_key = VerifyingKey::<Sha256>::new(signer.to_rsa()?);
        let signature = Signature::try_from(signature.as_bytes())
            .map_err(|e| CryptoError::Malformed(format!("signature: {e}")))?;
        verifying_key
            .verify(message, &signature)
            .map_err(|_| CryptoError::Malformed("signature does not match".into()))
    }
}
