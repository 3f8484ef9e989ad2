//!
//! Error taxonomy shared by signing, verification and negotiation
//!

use crate::BoxError;
use miette::Diagnostic;
use std::{borrow::Cow, fmt};
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Result type defaulting to [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Broad category an [`ErrorKind`] belongs to
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The message carries no usable signature at all (headers, digest or body problems)
    NoSignature,

    /// One particular signature failed. Other labels on the same message might still be fine
    Signature,

    /// The caller-supplied signing input is invalid
    SigningInput,

    /// The `Accept-Signature` advertisement is missing or malformed
    AcceptSignature,
}

/// Machine-checkable error code
#[derive(AsRefStr, Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// `Signature`/`Signature-Input` header (or the requested label) is missing
    NoSigMissingSignature,

    /// `Signature`/`Signature-Input` header isn't a structured dictionary
    NoSigInvalidSignature,

    /// A signature related header (e.g. `Content-Digest`) couldn't be parsed
    NoSigInvalidHeader,

    /// The body doesn't match the `Content-Digest` header
    NoSigWrongDigest,

    /// None of the requested digest algorithms is supported
    NoSigUnsupportedDigest,

    /// Reading the body failed
    NoSigBodyRead,

    /// The signature value or its input is malformed
    SigInvalidSignature,

    /// The key fetcher failed or got cancelled
    SigKeyFetch,

    /// Cryptographic verification failed
    SigVerification,

    /// Wrong or missing asymmetric key for the algorithm
    SigPublicKey,

    /// Wrong or missing shared secret for the algorithm
    SigSecretKey,

    /// Algorithm isn't supported
    SigUnsupportedAlgorithm,

    /// The crypto backend failed to produce a signature
    SigSigning,

    /// The signature is valid but doesn't satisfy the verify profile
    SigFailedProfile,

    /// Invalid signing options (naming, duplicates, inapplicable components)
    InvalidSignatureOptions,

    /// A component couldn't be read from the message
    InvalidComponent,

    /// A metadata parameter is unknown or its value is unavailable
    InvalidMetadata,

    /// The message uses a feature this implementation doesn't support
    Unsupported,

    /// No `Accept-Signature` entry present
    MissingAcceptSignature,

    /// `Accept-Signature` header is malformed
    InvalidAcceptSignature,
}

impl ErrorKind {
    /// Category of the error code
    #[must_use]
    pub fn class(self) -> ErrorClass {
        match self {
            Self::NoSigMissingSignature
            | Self::NoSigInvalidSignature
            | Self::NoSigInvalidHeader
            | Self::NoSigWrongDigest
            | Self::NoSigUnsupportedDigest
            | Self::NoSigBodyRead => ErrorClass::NoSignature,
            Self::SigInvalidSignature
            | Self::SigKeyFetch
            | Self::SigVerification
            | Self::SigPublicKey
            | Self::SigSecretKey
            | Self::SigUnsupportedAlgorithm
            | Self::SigSigning
            | Self::SigFailedProfile => ErrorClass::Signature,
            Self::InvalidSignatureOptions
            | Self::InvalidComponent
            | Self::InvalidMetadata
            | Self::Unsupported => ErrorClass::SigningInput,
            Self::MissingAcceptSignature | Self::InvalidAcceptSignature => {
                ErrorClass::AcceptSignature
            }
        }
    }
}

/// Error returned by every fallible operation of this crate
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Construct a new error without a cause
    #[must_use]
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Construct a new error wrapping its cause
    #[must_use]
    #[track_caller]
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Error code
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description, without the code
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind))
    }
}
