//!
//! HTTP message signatures
//!
//! Computes signature bases over selected components of an HTTP request or response,
//! signs them with one of six algorithms and verifies received signatures against a policy.
//!
//! The `Signature`, `Signature-Input`, `Content-Digest` and `Accept-Signature` headers are
//! structured field values and are parsed/serialised with the `sfv` crate.
//!

#![deny(missing_docs)]

use http::HeaderName;

pub mod accept;
pub mod base;
pub mod clock;
pub mod component;
pub mod config;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod message;
pub mod metadata;
pub mod sign;
pub mod verify;

mod util;

pub use self::accept::AcceptSignature;
pub use self::clock::Clock;
pub use self::component::ComponentId;
pub use self::crypto::Algorithm;
pub use self::digest::DigestAlgorithm;
pub use self::error::{Error, ErrorClass, ErrorKind, Result};
pub use self::message::{AddDebugInfo, Message};
pub use self::metadata::{Metadata, MetadataProvider};
pub use self::sign::{PrivateKey, Signer, SigningProfile};
pub use self::verify::{
    FetchContext, KeyFetcher, KeySpec, VerifyFailure, VerifyProfile, VerifyResult, Verifier,
};

/// Type-erased error used for caller-provided hooks (key fetchers, metadata providers)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Label used when a profile doesn't name one
pub const DEFAULT_SIGNATURE_LABEL: &str = "sig1";

static SIGNATURE_HEADER: HeaderName = HeaderName::from_static("signature");
static SIGNATURE_INPUT_HEADER: HeaderName = HeaderName::from_static("signature-input");
static CONTENT_DIGEST_HEADER: HeaderName = HeaderName::from_static("content-digest");
static ACCEPT_SIGNATURE_HEADER: HeaderName = HeaderName::from_static("accept-signature");
