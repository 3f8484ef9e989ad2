//!
//! `Content-Digest` calculation and verification
//!

use crate::{
    error::{Error, ErrorKind, Result},
    message::Message,
    util, BoxError, CONTENT_DIGEST_HEADER,
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use http_body::Body;
use http_body_util::BodyExt;
use sfv::{BareItem, Dictionary, Item, KeyRef, ListEntry, Parameters, SerializeValue};
use sha2::{Digest, Sha256, Sha512};
use std::{mem, str::FromStr};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Digest algorithms usable in `Content-Digest`
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Display, EnumString, Eq, IntoStaticStr, PartialEq,
)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    /// SHA-256
    #[default]
    #[strum(serialize = "sha-256")]
    Sha256,

    /// SHA-512
    #[strum(serialize = "sha-512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Parse an algorithm from its `Content-Digest` key
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name).map_err(|_| {
            Error::new(
                ErrorKind::NoSigUnsupportedDigest,
                format!("Unsupported digest algorithm '{name}'"),
            )
        })
    }

    /// Hash the data
    #[must_use]
    pub fn digest(self, data: impl AsRef<[u8]>) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// `Content-Digest` header value carrying the digest
    pub fn header_value(self, digest: Vec<u8>) -> Result<HeaderValue> {
        let mut dictionary = Dictionary::new();
        dictionary.insert(
            KeyRef::constant(self.into()).to_owned(),
            ListEntry::Item(Item {
                bare_item: BareItem::ByteSequence(digest),
                params: Parameters::new(),
            }),
        );

        let value = dictionary.serialize_value().ok_or_else(|| {
            Error::new(ErrorKind::NoSigInvalidHeader, "Failed to serialise digest")
        })?;

        HeaderValue::from_str(&value).map_err(|error| {
            Error::with_source(
                ErrorKind::NoSigInvalidHeader,
                "Serialised digest isn't a valid header value",
                error,
            )
        })
    }
}

/// Parse the `Content-Digest` header
///
/// Returns the first member with a supported algorithm, or `None` if the header is absent
pub fn parse_header(headers: &HeaderMap) -> Result<Option<(DigestAlgorithm, Vec<u8>)>> {
    let Some(value) = util::combined_field_value(headers, &CONTENT_DIGEST_HEADER).map_err(
        |error| Error::with_source(ErrorKind::NoSigInvalidHeader, "Malformed digest header", error),
    )?
    else {
        return Ok(None);
    };

    let dictionary = sfv::Parser::new(&value).parse_dictionary().map_err(|error| {
        Error::with_source(
            ErrorKind::NoSigInvalidHeader,
            "Digest header isn't a dictionary",
            error,
        )
    })?;

    for (key, entry) in &dictionary {
        let Ok(algorithm) = DigestAlgorithm::from_str(key.as_str()) else {
            continue;
        };

        let ListEntry::Item(Item {
            bare_item: BareItem::ByteSequence(ref digest),
            ..
        }) = *entry
        else {
            debug!(%algorithm, "skipping digest member that isn't a byte sequence");
            continue;
        };

        return Ok(Some((algorithm, digest.clone())));
    }

    Err(Error::new(
        ErrorKind::NoSigUnsupportedDigest,
        "None of the digest algorithms is supported",
    ))
}

/// Hash the body, leaving an equivalent body in its place
///
/// Bodies that are known to be empty aren't read at all
pub async fn digest_body<B>(algorithm: DigestAlgorithm, body: &mut B) -> Result<Vec<u8>>
where
    B: Body<Data = Bytes> + From<Bytes>,
    B::Error: Into<BoxError>,
{
    if body.is_end_stream() || body.size_hint().exact() == Some(0) {
        return Ok(algorithm.digest(b""));
    }

    let collected = mem::replace(body, B::from(Bytes::new()))
        .collect()
        .await
        .map_err(|error| {
            Error::with_source(ErrorKind::NoSigBodyRead, "Failed to read body", error)
        })?
        .to_bytes();

    let digest = algorithm.digest(&collected);
    *body = B::from(collected);

    Ok(digest)
}

/// Add a `Content-Digest` header to the message, unless it already has one
pub async fn add_content_digest<M>(message: &mut M, algorithm: DigestAlgorithm) -> Result<()>
where
    M: Message + ?Sized,
    M::Body: Body<Data = Bytes> + From<Bytes>,
    <M::Body as Body>::Error: Into<BoxError>,
{
    if message.headers().contains_key(&CONTENT_DIGEST_HEADER) {
        return Ok(());
    }

    let digest = digest_body(algorithm, message.body_mut()).await?;
    let header_value = algorithm.header_value(digest)?;
    message
        .headers_mut()
        .insert(CONTENT_DIGEST_HEADER.clone(), header_value);

    Ok(())
}

/// Check the body against the `Content-Digest` header
///
/// Messages without the header pass. Returns the algorithm that got checked.
pub async fn verify_content_digest<M>(message: &mut M) -> Result<Option<DigestAlgorithm>>
where
    M: Message + ?Sized,
    M::Body: Body<Data = Bytes> + From<Bytes>,
    <M::Body as Body>::Error: Into<BoxError>,
{
    let Some((algorithm, expected)) = parse_header(message.headers())? else {
        return Ok(None);
    };

    let actual = digest_body(algorithm, message.body_mut()).await?;
    if !bool::from(expected.as_slice().ct_eq(actual.as_slice())) {
        debug!(%algorithm, "body doesn't match digest header");
        return Err(Error::new(
            ErrorKind::NoSigWrongDigest,
            "Body doesn't match the digest header",
        ));
    }

    Ok(Some(algorithm))
}
