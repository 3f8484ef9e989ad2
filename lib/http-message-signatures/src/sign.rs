//!
//! Signing of HTTP messages
//!

use crate::{
    base,
    clock::Clock,
    component::ComponentId,
    crypto::{self, Algorithm, SigningKey},
    digest::{self, DigestAlgorithm},
    error::{Error, ErrorKind, Result},
    message::Message,
    metadata::{Metadata, MetadataProvider},
    util::{self, UnixTimestampExt},
    BoxError, CONTENT_DIGEST_HEADER, DEFAULT_SIGNATURE_LABEL, SIGNATURE_HEADER,
    SIGNATURE_INPUT_HEADER,
};
use bytes::Bytes;
use derive_builder::Builder;
use http::{HeaderMap, HeaderName, HeaderValue};
use http_body::Body;
use ring::rand::{SecureRandom, SystemRandom};
use sfv::{BareItem, Item, Key, KeyRef, ListEntry, Parameters, SerializeValue};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, instrument};

/// Lifetime of a signature unless configured otherwise
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(5 * 60);

const DEFAULT_NONCE_LENGTH: usize = 32;

/// Source of `nonce` values
pub trait NonceGenerator: fmt::Debug + Send + Sync {
    /// Produce a fresh nonce
    fn generate(&self) -> Result<String, BoxError>;
}

/// Random bytes, encoded as base64
#[derive(Clone, Debug)]
pub struct RandomNonce {
    length: usize,
}

impl RandomNonce {
    /// Nonces made of `length` random bytes
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomNonce {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LENGTH)
    }
}

impl NonceGenerator for RandomNonce {
    fn generate(&self) -> Result<String, BoxError> {
        let mut buf = vec![0; self.length];
        SystemRandom::new()
            .fill(&mut buf)
            .map_err(|_| "Failed to gather randomness")?;

        Ok(base64_simd::STANDARD.encode_to_string(buf))
    }
}

/// Always the same nonce. Only useful to produce reproducible signatures.
#[derive(Clone, Debug)]
pub struct FixedNonce(String);

impl FixedNonce {
    /// Always return `nonce`
    #[must_use]
    pub fn new(nonce: impl Into<String>) -> Self {
        Self(nonce.into())
    }
}

impl NonceGenerator for FixedNonce {
    fn generate(&self) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// What to sign and how
#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct SigningProfile {
    /// Signature algorithm
    pub algorithm: Algorithm,

    /// Digest used when `content-digest` is covered and the message doesn't carry one yet
    #[builder(default)]
    pub digest_algorithm: DigestAlgorithm,

    /// Covered components, in order
    #[builder(default)]
    pub fields: Vec<ComponentId>,

    /// Metadata parameters, in order
    #[builder(default)]
    pub metadata: Vec<Metadata>,

    /// Label of the signature
    #[builder(default = "DEFAULT_SIGNATURE_LABEL.into()", setter(into))]
    pub label: String,

    /// Offset of `expires` from `created`
    #[builder(default = "DEFAULT_EXPIRES_IN")]
    pub expires_in: Duration,

    /// Source of `nonce` values
    #[builder(default = "Arc::new(RandomNonce::default())")]
    pub nonce: Arc<dyn NonceGenerator>,
}

impl SigningProfile {
    /// Return a builder of the signing profile
    #[must_use]
    pub fn builder() -> SigningProfileBuilder {
        SigningProfileBuilder::default()
    }

    /// Whether the body digest is covered by the signature
    #[must_use]
    pub fn covers_content_digest(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.name() == CONTENT_DIGEST_HEADER.as_str())
    }
}

impl SigningProfileBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref label) = self.label {
            label_key(label).map_err(|error| error.to_string())?;
        }

        if let Some(ref metadata) = self.metadata {
            for (idx, name) in metadata.iter().enumerate() {
                if metadata[..idx].contains(name) {
                    return Err(format!("Metadata '{name}' is listed more than once"));
                }
            }
        }

        Ok(())
    }
}

impl From<SigningProfileBuilderError> for Error {
    fn from(error: SigningProfileBuilderError) -> Self {
        Self::with_source(
            ErrorKind::InvalidSignatureOptions,
            "Invalid signing profile",
            error,
        )
    }
}

/// Signing key together with the metadata describing it
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct PrivateKey {
    /// Signing key
    key: SigningKey,

    /// Identifier emitted as `keyid`
    #[builder(default, setter(into, strip_option))]
    key_id: Option<String>,

    /// Value emitted as `tag`
    #[builder(default, setter(into, strip_option))]
    tag: Option<String>,
}

impl PrivateKey {
    /// Return a builder of the private key
    #[must_use]
    pub fn builder() -> PrivateKeyBuilder {
        PrivateKeyBuilder::default()
    }

    /// Private key without an identifier
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            key_id: None,
            tag: None,
        }
    }

    /// Signing key
    #[must_use]
    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    /// Identifier of the key
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }
}

impl From<PrivateKeyBuilderError> for Error {
    fn from(error: PrivateKeyBuilderError) -> Self {
        Self::with_source(
            ErrorKind::InvalidSignatureOptions,
            "Invalid private key",
            error,
        )
    }
}

fn label_key(label: &str) -> Result<Key> {
    KeyRef::from_str(label)
        .map(ToOwned::to_owned)
        .map_err(|error| {
            Error::with_source(
                ErrorKind::InvalidSignatureOptions,
                format!("Invalid signature label '{label}'"),
                error,
            )
        })
}

struct SigningMetadata<'a> {
    created: i64,
    expires: i64,
    nonce: Option<String>,
    algorithm: Algorithm,
    key: &'a PrivateKey,
}

impl MetadataProvider for SigningMetadata<'_> {
    fn created(&self) -> Result<i64, BoxError> {
        Ok(self.created)
    }

    fn expires(&self) -> Result<i64, BoxError> {
        Ok(self.expires)
    }

    fn nonce(&self) -> Result<&str, BoxError> {
        self.nonce
            .as_deref()
            .ok_or_else(|| "No nonce generated".into())
    }

    fn alg(&self) -> Result<&str, BoxError> {
        Ok(self.algorithm.into())
    }

    fn key_id(&self) -> Result<&str, BoxError> {
        self.key
            .key_id
            .as_deref()
            .ok_or_else(|| "Key has no identifier".into())
    }

    fn tag(&self) -> Result<&str, BoxError> {
        self.key
            .tag
            .as_deref()
            .ok_or_else(|| "Key has no tag".into())
    }
}

/// Insert or replace the member of a dictionary header
///
/// Members with other labels are preserved. A malformed existing header gets replaced entirely.
fn set_member(
    headers: &mut HeaderMap,
    name: &HeaderName,
    label: &Key,
    entry: ListEntry,
) -> Result<()> {
    let mut dictionary = util::combined_field_value(headers, name)
        .ok()
        .flatten()
        .and_then(|value| sfv::Parser::new(&value).parse_dictionary().ok())
        .unwrap_or_default();

    dictionary.insert(label.clone(), entry);

    let value = dictionary.serialize_value().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidSignatureOptions,
            format!("Failed to serialise '{name}' header"),
        )
    })?;

    let value = HeaderValue::from_str(&value).map_err(|error| {
        Error::with_source(
            ErrorKind::InvalidSignatureOptions,
            format!("Serialised '{name}' header isn't a valid header value"),
            error,
        )
    })?;

    headers.insert(name.clone(), value);

    Ok(())
}

/// Signs messages according to a profile
#[derive(Debug)]
pub struct Signer {
    profile: SigningProfile,
    key: PrivateKey,
    label: Key,
    clock: Clock,
}

impl Signer {
    /// Create a new signer
    ///
    /// Errors if the key can't be used with the algorithm of the profile,
    /// or lacks the `keyid`/`tag` the profile asks for
    pub fn new(profile: SigningProfile, key: PrivateKey) -> Result<Self> {
        key.key.ensure_compatible(profile.algorithm)?;

        for (name, value) in [(Metadata::KeyId, &key.key_id), (Metadata::Tag, &key.tag)] {
            if value.is_none() && profile.metadata.contains(&name) {
                return Err(Error::new(
                    ErrorKind::InvalidMetadata,
                    format!("Profile asks for '{name}' but the key has none"),
                ));
            }
        }

        let label = label_key(&profile.label)?;

        Ok(Self {
            profile,
            key,
            label,
            clock: Clock::system(),
        })
    }

    /// Replace the clock `created` and `expires` are read from
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Profile of the signer
    #[must_use]
    pub fn profile(&self) -> &SigningProfile {
        &self.profile
    }

    /// Sign the message and attach the `Signature` and `Signature-Input` headers
    ///
    /// Adds a `Content-Digest` header first if the profile covers it and the message doesn't
    /// have one yet
    #[instrument(
        skip_all,
        fields(label = %self.profile.label, algorithm = %self.profile.algorithm)
    )]
    pub async fn sign<M>(&self, message: &mut M) -> Result<()>
    where
        M: Message + ?Sized,
        M::Body: Body<Data = Bytes> + From<Bytes>,
        <M::Body as Body>::Error: Into<BoxError>,
    {
        if self.profile.covers_content_digest() {
            digest::add_content_digest(message, self.profile.digest_algorithm).await?;
        }

        let created = self.clock.now().to_unix_timestamp().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidMetadata,
                "Clock reads a time before the unix epoch",
            )
        })?;
        let expires = i64::try_from(self.profile.expires_in.as_secs())
            .ok()
            .and_then(|expires_in| created.checked_add(expires_in))
            .ok_or_else(|| Error::new(ErrorKind::InvalidMetadata, "Expiry is out of range"))?;

        let nonce = if self.profile.metadata.contains(&Metadata::Nonce) {
            let nonce = self.profile.nonce.generate().map_err(|error| {
                Error::with_source(ErrorKind::InvalidMetadata, "Failed to generate nonce", error)
            })?;
            Some(nonce)
        } else {
            None
        };

        let provider = SigningMetadata {
            created,
            expires,
            nonce,
            algorithm: self.profile.algorithm,
            key: &self.key,
        };

        let signature_base = base::construct(
            &*message,
            &self.profile.fields,
            &self.profile.metadata,
            &provider,
        )?;
        let signature = crypto::sign(self.profile.algorithm, &self.key.key, &signature_base.base)?;

        debug!(signature_input = %signature_base.signature_input, "signed message");

        let headers = message.headers_mut();
        set_member(
            headers,
            &SIGNATURE_INPUT_HEADER,
            &self.label,
            ListEntry::InnerList(signature_base.signature_params),
        )?;
        set_member(
            headers,
            &SIGNATURE_HEADER,
            &self.label,
            ListEntry::Item(Item {
                bare_item: BareItem::ByteSequence(signature),
                params: Parameters::new(),
            }),
        )?;

        Ok(())
    }
}
