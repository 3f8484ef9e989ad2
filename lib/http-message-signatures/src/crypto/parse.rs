//!
//! Parse cryptographic keys for use with the signature algorithms
//!

use super::{SigningKey, VerifyingKey};
use const_oid::{
    db::{
        rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SECP_256_R_1, SECP_384_R_1},
        rfc8410::ID_ED_25519,
    },
    ObjectIdentifier,
};
use miette::Diagnostic;
use pkcs8::{Document, PrivateKeyInfo, SecretDocument, SubjectPublicKeyInfoRef};
use ring::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, Ed25519KeyPair, RsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
        ECDSA_P384_SHA384_FIXED_SIGNING,
    },
};
use thiserror::Error;

const PKCS1_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// Key parsing error
#[derive(Debug, Diagnostic, Error)]
pub enum Error {
    /// Malformed DER structure
    #[error(transparent)]
    Der(#[from] pkcs8::der::Error),

    /// Key rejected
    #[error(transparent)]
    KeyRejected(#[from] ring::error::KeyRejected),

    /// Malformed key
    #[error("Malformed key")]
    MalformedKey,

    /// Malformed PKCS#8 document
    #[error(transparent)]
    Pkcs8(#[from] pkcs8::Error),

    /// Malformed algorithm identifier
    #[error(transparent)]
    Spki(#[from] pkcs8::spki::Error),

    /// Unknown key type
    #[error("Unknown key type")]
    UnknownKeyType,
}

impl From<Error> for crate::Error {
    fn from(error: Error) -> Self {
        Self::with_source(crate::ErrorKind::SigPublicKey, "Failed to parse key", error)
    }
}

enum Curve {
    P256,
    P384,
}

fn curve(parameters: ObjectIdentifier) -> Result<Curve, Error> {
    if parameters == SECP_256_R_1 {
        Ok(Curve::P256)
    } else if parameters == SECP_384_R_1 {
        Ok(Curve::P384)
    } else {
        Err(Error::UnknownKeyType)
    }
}

/// Parse a public key from its SPKI PEM form
///
/// Currently supported algorithms:
///
/// - RSA
/// - ECDSA on P-256 and P-384
/// - Ed25519
#[inline]
pub fn public_key(pem: &str) -> Result<VerifyingKey, Error> {
    let (_pem_tag, document) = Document::from_pem(pem)?;
    let spki: SubjectPublicKeyInfoRef<'_> = document.decode_msg()?;

    let raw_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or(Error::MalformedKey)?
        .to_vec();

    let key = if spki.algorithm.oid == RSA_ENCRYPTION {
        VerifyingKey::Rsa(raw_bytes)
    } else if spki.algorithm.oid == ID_ED_25519 {
        VerifyingKey::Ed25519(raw_bytes)
    } else if spki.algorithm.oid == ID_EC_PUBLIC_KEY {
        match curve(spki.algorithm.parameters_oid()?)? {
            Curve::P256 => VerifyingKey::EcdsaP256(raw_bytes),
            Curve::P384 => VerifyingKey::EcdsaP384(raw_bytes),
        }
    } else {
        return Err(Error::UnknownKeyType);
    };

    Ok(key)
}

/// Parse a private key from its DER-encoded PKCS#8 form
#[inline]
pub fn private_key_der(der: &[u8]) -> Result<SigningKey, Error> {
    let private_key_raw = PrivateKeyInfo::try_from(der)?;

    let signing_key = if private_key_raw.algorithm.oid == RSA_ENCRYPTION {
        SigningKey::Rsa(RsaKeyPair::from_pkcs8(der)?)
    } else if private_key_raw.algorithm.oid == ID_ED_25519 {
        SigningKey::Ed25519(Ed25519KeyPair::from_pkcs8_maybe_unchecked(der)?)
    } else if private_key_raw.algorithm.oid == ID_EC_PUBLIC_KEY {
        let rng = SystemRandom::new();
        match curve(private_key_raw.algorithm.parameters_oid()?)? {
            Curve::P256 => SigningKey::EcdsaP256(EcdsaKeyPair::from_pkcs8(
                &ECDSA_P256_SHA256_FIXED_SIGNING,
                der,
                &rng,
            )?),
            Curve::P384 => SigningKey::EcdsaP384(EcdsaKeyPair::from_pkcs8(
                &ECDSA_P384_SHA384_FIXED_SIGNING,
                der,
                &rng,
            )?),
        }
    } else {
        return Err(Error::UnknownKeyType);
    };

    Ok(signing_key)
}

/// Parse a private key from its PEM form.
/// This function uses constant-time PEM decoding and zeroizes any temporary allocations.
///
/// Accepts PKCS#8 (`PRIVATE KEY`) documents and PKCS#1 (`RSA PRIVATE KEY`) RSA keys.
///
/// Currently supported algorithms:
///
/// - RSA
/// - ECDSA on P-256 and P-384
/// - Ed25519
#[inline]
pub fn private_key(pem: &str) -> Result<SigningKey, Error> {
    let (tag_line, document) = SecretDocument::from_pem(pem)?;

    if tag_line == PKCS1_PRIVATE_KEY_LABEL {
        return Ok(SigningKey::Rsa(RsaKeyPair::from_der(document.as_bytes())?));
    }

    private_key_der(document.as_bytes())
}
