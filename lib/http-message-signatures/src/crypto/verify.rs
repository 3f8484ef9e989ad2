use super::Algorithm;
use crate::error::{Error, ErrorKind, Result};
use ring::{
    hmac,
    signature::{
        UnparsedPublicKey, VerificationAlgorithm, ECDSA_P256_SHA256_FIXED,
        ECDSA_P384_SHA384_FIXED, ED25519, RSA_PKCS1_2048_8192_SHA256, RSA_PSS_2048_8192_SHA512,
    },
};
use std::fmt;

/// Key material able to check signatures
#[derive(Clone, PartialEq)]
#[non_exhaustive]
pub enum VerifyingKey {
    /// DER-encoded `RSAPublicKey`
    Rsa(Vec<u8>),

    /// Uncompressed SEC1 point on P-256
    EcdsaP256(Vec<u8>),

    /// Uncompressed SEC1 point on P-384
    EcdsaP384(Vec<u8>),

    /// Raw 32 byte Ed25519 public key
    Ed25519(Vec<u8>),

    /// Shared HMAC secret
    Secret(Vec<u8>),
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa(key) => f.debug_tuple("Rsa").field(key).finish(),
            Self::EcdsaP256(key) => f.debug_tuple("EcdsaP256").field(key).finish(),
            Self::EcdsaP384(key) => f.debug_tuple("EcdsaP384").field(key).finish(),
            Self::Ed25519(key) => f.debug_tuple("Ed25519").field(key).finish(),
            Self::Secret(..) => f.write_str("Secret(..)"),
        }
    }
}

fn verify_asymmetric(
    algorithm: &'static dyn VerificationAlgorithm,
    key: &[u8],
    msg: &[u8],
    signature: &[u8],
) -> Result<()> {
    UnparsedPublicKey::new(algorithm, key)
        .verify(msg, signature)
        .map_err(|_| Error::new(ErrorKind::SigVerification, "Signature doesn't match"))
}

fn ensure_length(algorithm: Algorithm, signature: &[u8], expected: usize) -> Result<()> {
    if signature.len() == expected {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::SigInvalidSignature,
            format!(
                "'{algorithm}' signatures are {expected} bytes long, got {}",
                signature.len()
            ),
        ))
    }
}

/// Verify that the signature over the message was produced by the key using the algorithm
#[inline]
pub fn verify(
    algorithm: Algorithm,
    key: &VerifyingKey,
    msg: &[u8],
    signature: &[u8],
) -> Result<()> {
    match (algorithm, key) {
        (Algorithm::RsaPssSha512, VerifyingKey::Rsa(key)) => {
            verify_asymmetric(&RSA_PSS_2048_8192_SHA512, key, msg, signature)
        }
        (Algorithm::RsaPkcs1Sha256, VerifyingKey::Rsa(key)) => {
            verify_asymmetric(&RSA_PKCS1_2048_8192_SHA256, key, msg, signature)
        }
        (Algorithm::EcdsaP256Sha256, VerifyingKey::EcdsaP256(key)) => {
            ensure_length(algorithm, signature, 64)?;
            verify_asymmetric(&ECDSA_P256_SHA256_FIXED, key, msg, signature)
        }
        (Algorithm::EcdsaP384Sha384, VerifyingKey::EcdsaP384(key)) => {
            ensure_length(algorithm, signature, 96)?;
            verify_asymmetric(&ECDSA_P384_SHA384_FIXED, key, msg, signature)
        }
        (Algorithm::Ed25519, VerifyingKey::Ed25519(key)) => {
            verify_asymmetric(&ED25519, key, msg, signature)
        }
        (Algorithm::HmacSha256, VerifyingKey::Secret(secret)) => {
            if secret.is_empty() {
                return Err(Error::new(ErrorKind::SigSecretKey, "Shared secret is empty"));
            }

            let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
            hmac::verify(&key, msg, signature)
                .map_err(|_| Error::new(ErrorKind::SigVerification, "Signature doesn't match"))
        }
        (Algorithm::HmacSha256, _) => Err(Error::new(
            ErrorKind::SigSecretKey,
            "'hmac-sha256' needs a shared secret",
        )),
        (algorithm, _) => Err(Error::new(
            ErrorKind::SigPublicKey,
            format!("Key type doesn't match algorithm '{algorithm}'"),
        )),
    }
}
