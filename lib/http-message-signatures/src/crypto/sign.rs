use super::{Algorithm, VerifyingKey};
use crate::error::{Error, ErrorKind, Result};
use ring::{
    hmac,
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaEncoding, RsaKeyPair, RSA_PKCS1_SHA256,
        RSA_PSS_SHA512,
    },
};
use std::fmt;

/// Key material able to produce signatures
#[non_exhaustive]
pub enum SigningKey {
    /// RSA key pair, usable with both RSA algorithms
    Rsa(RsaKeyPair),

    /// ECDSA key pair on P-256
    EcdsaP256(EcdsaKeyPair),

    /// ECDSA key pair on P-384
    EcdsaP384(EcdsaKeyPair),

    /// Ed25519 key pair
    Ed25519(Ed25519KeyPair),

    /// Shared HMAC secret
    Secret(Vec<u8>),
}

impl SigningKey {
    /// Shared HMAC secret
    #[must_use]
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::Secret(secret.into())
    }

    /// Check whether the key can be used with the algorithm
    pub fn ensure_compatible(&self, algorithm: Algorithm) -> Result<()> {
        match (algorithm, self) {
            (Algorithm::RsaPssSha512 | Algorithm::RsaPkcs1Sha256, Self::Rsa(..))
            | (Algorithm::EcdsaP256Sha256, Self::EcdsaP256(..))
            | (Algorithm::EcdsaP384Sha384, Self::EcdsaP384(..))
            | (Algorithm::Ed25519, Self::Ed25519(..)) => Ok(()),
            (Algorithm::HmacSha256, Self::Secret(secret)) if !secret.is_empty() => Ok(()),
            (Algorithm::HmacSha256, Self::Secret(..)) => Err(Error::new(
                ErrorKind::SigSecretKey,
                "Shared secret is empty",
            )),
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

    /// Key verifying the signatures of this key
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(key) => VerifyingKey::Rsa(key.public_key().as_ref().to_vec()),
            Self::EcdsaP256(key) => VerifyingKey::EcdsaP256(key.public_key().as_ref().to_vec()),
            Self::EcdsaP384(key) => VerifyingKey::EcdsaP384(key.public_key().as_ref().to_vec()),
            Self::Ed25519(key) => VerifyingKey::Ed25519(key.public_key().as_ref().to_vec()),
            Self::Secret(secret) => VerifyingKey::Secret(secret.clone()),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rsa(..) => "Rsa",
            Self::EcdsaP256(..) => "EcdsaP256",
            Self::EcdsaP384(..) => "EcdsaP384",
            Self::Ed25519(..) => "Ed25519",
            Self::Secret(..) => "Secret",
        };

        write!(f, "SigningKey::{name}(..)")
    }
}

fn signing_error(algorithm: Algorithm) -> Error {
    Error::new(
        ErrorKind::SigSigning,
        format!("Failed to sign message with '{algorithm}'"),
    )
}

fn sign_rsa(
    key: &RsaKeyPair,
    padding: &'static dyn RsaEncoding,
    algorithm: Algorithm,
    msg: &[u8],
) -> Result<Vec<u8>> {
    let mut buf = vec![0; key.public().modulus_len()];

    let rng = SystemRandom::new();
    key.sign(padding, &rng, msg, &mut buf)
        .map_err(|_| signing_error(algorithm))?;

    Ok(buf)
}

/// Sign a message with the key using the algorithm
///
/// Returns the raw signature bytes (ECDSA signatures are fixed-width `r || s`)
#[inline]
pub fn sign(algorithm: Algorithm, key: &SigningKey, msg: &[u8]) -> Result<Vec<u8>> {
    key.ensure_compatible(algorithm)?;

    match (algorithm, key) {
        (Algorithm::RsaPssSha512, SigningKey::Rsa(key)) => {
            sign_rsa(key, &RSA_PSS_SHA512, algorithm, msg)
        }
        (Algorithm::RsaPkcs1Sha256, SigningKey::Rsa(key)) => {
            sign_rsa(key, &RSA_PKCS1_SHA256, algorithm, msg)
        }
        (Algorithm::EcdsaP256Sha256, SigningKey::EcdsaP256(key))
        | (Algorithm::EcdsaP384Sha384, SigningKey::EcdsaP384(key)) => {
            let rng = SystemRandom::new();
            let signature = key.sign(&rng, msg).map_err(|_| signing_error(algorithm))?;

            Ok(signature.as_ref().to_vec())
        }
        (Algorithm::Ed25519, SigningKey::Ed25519(key)) => Ok(key.sign(msg).as_ref().to_vec()),
        (Algorithm::HmacSha256, SigningKey::Secret(secret)) => {
            let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
            Ok(hmac::sign(&key, msg).as_ref().to_vec())
        }
        _ => Err(signing_error(algorithm)),
    }
}
