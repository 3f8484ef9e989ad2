//!
//! Common cryptographic operations
//!

use crate::error::{Error, ErrorKind, Result};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

mod sign;
mod verify;

pub mod parse;

pub use self::sign::{sign, SigningKey};
pub use self::verify::{verify, VerifyingKey};

/// Signature algorithms
#[derive(
    AsRefStr, Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, IntoStaticStr, PartialEq,
)]
#[non_exhaustive]
pub enum Algorithm {
    /// RSASSA-PSS using SHA-512
    #[strum(serialize = "rsa-pss-sha512")]
    RsaPssSha512,

    /// RSASSA-PKCS1-v1_5 using SHA-256
    #[strum(serialize = "rsa-v1_5-sha256")]
    RsaPkcs1Sha256,

    /// ECDSA on P-256 using SHA-256, fixed-width `r || s` encoding
    #[strum(serialize = "ecdsa-p256-sha256")]
    EcdsaP256Sha256,

    /// ECDSA on P-384 using SHA-384, fixed-width `r || s` encoding
    #[strum(serialize = "ecdsa-p384-sha384")]
    EcdsaP384Sha384,

    /// EdDSA using curve25519
    #[strum(serialize = "ed25519")]
    Ed25519,

    /// HMAC using SHA-256
    #[strum(serialize = "hmac-sha256")]
    HmacSha256,
}

impl Algorithm {
    /// Parse an algorithm from its identifier
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name).map_err(|_| {
            Error::new(
                ErrorKind::SigUnsupportedAlgorithm,
                format!("Unsupported algorithm '{name}'"),
            )
        })
    }

    /// Whether the algorithm uses a shared secret
    #[must_use]
    pub fn is_symmetric(self) -> bool {
        matches!(self, Self::HmacSha256)
    }
}
