//!
//! Verification of HTTP message signatures
//!

use crate::{
    base,
    clock::Clock,
    crypto::{self, Algorithm, VerifyingKey},
    digest,
    error::{Error, ErrorKind, Result},
    message::Message,
    metadata::{Metadata, MetadataProvider, ParamsMetadata},
    BoxError,
};
use bytes::Bytes;
use http::{Extensions, HeaderMap};
use http_body::Body;
use miette::Diagnostic;
use std::{
    collections::HashMap,
    fmt,
    future::{self, Future},
    hash::BuildHasher,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub use self::extract::{ExtractedSignature, Signatures};
pub use self::profile::{VerifyProfile, VerifyProfileBuilder, VerifyProfileBuilderError};

mod extract;
mod profile;

/// Label selecting the first signature present on the message
pub const WILDCARD_LABEL: &str = "*";

/// Key material and the algorithm it's used with
#[derive(Clone, Debug, PartialEq)]
pub struct KeySpec {
    /// Identifier of the key
    pub key_id: Option<String>,

    /// Algorithm the key is used with
    pub algorithm: Algorithm,

    /// Verification key
    pub key: VerifyingKey,
}

/// Context handed to a [`KeyFetcher`]
pub struct FetchContext<'a> {
    headers: &'a HeaderMap,
    extensions: &'a Extensions,
    cancellation: CancellationToken,
}

impl FetchContext<'_> {
    /// Headers of the message being verified
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.headers
    }

    /// Extensions of the message being verified
    #[must_use]
    pub fn extensions(&self) -> &Extensions {
        self.extensions
    }

    /// Token that gets cancelled when the caller gives up on the verification
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl fmt::Debug for FetchContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchContext")
            .field("headers", &self.headers)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Source of verification keys
///
/// Keys are fetched fresh for every verification and never cached by the verifier
pub trait KeyFetcher: Send + Sync {
    /// Fetch the key named by the `keyid` parameter
    fn fetch_by_key_id(
        &self,
        context: &FetchContext<'_>,
        key_id: &str,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send;

    /// Fetch a key for a signature without `keyid`
    ///
    /// Fails by default
    fn fetch(
        &self,
        context: &FetchContext<'_>,
        metadata: &dyn MetadataProvider,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send {
        let _ = (context, metadata);
        let key_spec: Result<KeySpec, BoxError> = Err("Signature doesn't name a key".into());
        future::ready(key_spec)
    }
}

impl<S> KeyFetcher for HashMap<String, KeySpec, S>
where
    S: BuildHasher + Send + Sync,
{
    fn fetch_by_key_id(
        &self,
        _context: &FetchContext<'_>,
        key_id: &str,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send {
        let key_spec: Result<KeySpec, BoxError> = self
            .get(key_id)
            .cloned()
            .ok_or_else(|| format!("Unknown key '{key_id}'").into());

        future::ready(key_spec)
    }
}

impl KeyFetcher for KeySpec {
    fn fetch_by_key_id(
        &self,
        _context: &FetchContext<'_>,
        key_id: &str,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send {
        let key_spec: Result<KeySpec, BoxError> = match self.key_id {
            Some(ref own_id) if own_id != key_id => Err(format!("Unknown key '{key_id}'").into()),
            _ => Ok(self.clone()),
        };

        future::ready(key_spec)
    }

    fn fetch(
        &self,
        _context: &FetchContext<'_>,
        _metadata: &dyn MetadataProvider,
    ) -> impl Future<Output = Result<KeySpec, BoxError>> + Send {
        let key_spec: Result<KeySpec, BoxError> = Ok(self.clone());
        future::ready(key_spec)
    }
}

/// Diagnostics recorded when the message carries [`AddDebugInfo`](crate::AddDebugInfo)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerifyDebugInfo {
    /// Exact signature base the signature got checked against
    pub signature_base: String,
}

/// Outcome of a verification
///
/// Fields are filled in as far as the verification got
#[derive(Clone, Debug, Default)]
pub struct VerifyResult {
    /// Whether the signature is valid and satisfies the profile
    pub verified: bool,

    /// Label of the checked signature
    pub label: Option<String>,

    /// Key the signature got checked with
    pub key_spec: Option<KeySpec>,

    /// Metadata of the checked signature
    pub metadata: Option<ParamsMetadata>,

    /// Debug information
    pub debug: Option<VerifyDebugInfo>,
}

/// Failed verification, together with everything gathered before the failure
#[derive(Debug, Error)]
#[error("Signature verification failed")]
pub struct VerifyFailure {
    /// Partial result
    pub result: VerifyResult,

    /// Cause of the failure
    #[source]
    pub error: Error,
}

impl VerifyFailure {
    /// Error code of the cause
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl Diagnostic for VerifyFailure {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.error.kind()))
    }
}

impl From<VerifyFailure> for Error {
    fn from(failure: VerifyFailure) -> Self {
        failure.error
    }
}

/// Verifies signatures on messages against a profile
#[derive(Debug)]
pub struct Verifier<K> {
    keys: K,
    profile: VerifyProfile,
    clock: Clock,
}

impl<K> Verifier<K>
where
    K: KeyFetcher,
{
    /// Create a new verifier
    #[must_use]
    pub fn new(keys: K, profile: VerifyProfile) -> Self {
        Self {
            keys,
            profile,
            clock: Clock::system(),
        }
    }

    /// Replace the clock the timing checks are run against
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Profile of the verifier
    #[must_use]
    pub fn profile(&self) -> &VerifyProfile {
        &self.profile
    }

    /// Verify the signature selected by the profile
    ///
    /// A present `Content-Digest` header is checked against the body first.
    /// The key fetch can be cancelled by placing a [`CancellationToken`] into the extensions of
    /// the message.
    #[instrument(skip_all, fields(label = %self.profile.label))]
    pub async fn verify<M>(&self, message: &mut M) -> Result<VerifyResult, VerifyFailure>
    where
        M: Message + ?Sized,
        M::Body: Body<Data = Bytes> + From<Bytes>,
        <M::Body as Body>::Error: Into<BoxError>,
    {
        let mut result = VerifyResult::default();

        match self.verify_into(message, &mut result).await {
            Ok(()) => {
                result.verified = true;
                Ok(result)
            }
            Err(error) => {
                debug!(%error, "rejected signature");
                Err(VerifyFailure { result, error })
            }
        }
    }

    async fn verify_into<M>(&self, message: &mut M, result: &mut VerifyResult) -> Result<()>
    where
        M: Message + ?Sized,
        M::Body: Body<Data = Bytes> + From<Bytes>,
        <M::Body as Body>::Error: Into<BoxError>,
    {
        digest::verify_content_digest(message).await?;

        let message = &*message;
        let signature = Signatures::parse(message.headers())?.extract(&self.profile.label)?;
        result.label = Some(signature.label.clone());
        result.metadata = Some(signature.params.clone());

        let signature_base = base::construct(
            message,
            &signature.components,
            &signature.metadata,
            &signature.params,
        )?;

        if message.is_debug() {
            result.debug = Some(VerifyDebugInfo {
                signature_base: String::from_utf8_lossy(&signature_base.base).into_owned(),
            });
        }

        let key_spec = self.fetch_key(message, &signature).await?;
        result.key_spec = Some(key_spec.clone());

        crypto::verify(
            key_spec.algorithm,
            &key_spec.key,
            &signature_base.base,
            &signature.signature,
        )?;

        self.profile
            .check(&signature, &key_spec, message.headers(), self.clock.now())
    }

    async fn fetch_key<M>(&self, message: &M, signature: &ExtractedSignature) -> Result<KeySpec>
    where
        M: Message + ?Sized,
    {
        let cancellation = message
            .extensions()
            .get::<CancellationToken>()
            .cloned()
            .unwrap_or_default();

        let context = FetchContext {
            headers: message.headers(),
            extensions: message.extensions(),
            cancellation: cancellation.clone(),
        };

        let key_id = if signature.metadata.contains(&Metadata::KeyId) {
            let key_id = signature.params.key_id().map_err(|error| {
                Error::with_source(ErrorKind::SigInvalidSignature, "Invalid 'keyid'", error)
            })?;
            Some(key_id)
        } else {
            None
        };

        let fetch = async {
            match key_id {
                Some(key_id) => self.keys.fetch_by_key_id(&context, key_id).await,
                None => self.keys.fetch(&context, &signature.params).await,
            }
        };

        let Some(key_spec) = cancellation.run_until_cancelled(fetch).await else {
            debug!("key fetch got cancelled");
            return Err(Error::new(ErrorKind::SigKeyFetch, "Key fetch got cancelled"));
        };

        key_spec.map_err(|error| {
            debug!(key_id, %error, "failed to fetch key");
            Error::with_source(ErrorKind::SigKeyFetch, "Failed to fetch key", error)
        })
    }
}
