//!
//! `Accept-Signature` negotiation
//!
//! Servers advertise the signature they expect,
//! clients turn the advertisement into a signing profile
//!

use crate::{
    component::ComponentId,
    crypto::Algorithm,
    error::{Error, ErrorKind, Result},
    metadata::Metadata,
    sign::{FixedNonce, SigningProfileBuilder},
    util, ACCEPT_SIGNATURE_HEADER,
};
use http::HeaderMap;
use sfv::{BareItem, ListEntry, Parameters};
use std::sync::Arc;

/// Parsed `Accept-Signature` entry
#[derive(Clone, Debug, PartialEq)]
pub struct AcceptSignature {
    /// Label the signature should carry
    pub label: String,

    /// Components to cover, in order
    pub fields: Vec<ComponentId>,

    /// Requested metadata, in order. Unknown parameters are skipped.
    pub metadata: Vec<Metadata>,

    /// Nonce the server wants echoed back
    pub nonce: Option<String>,

    /// Requested algorithm identifier, as sent
    pub algorithm: Option<String>,

    /// Requested key
    pub key_id: Option<String>,

    /// Requested tag
    pub tag: Option<String>,
}

fn invalid(message: &'static str) -> Error {
    Error::new(ErrorKind::InvalidAcceptSignature, message)
}

fn string_param(params: &Parameters, name: Metadata) -> Option<String> {
    params
        .iter()
        .find(|(key, _)| key.as_str() == name.as_ref())
        .and_then(|(_, value)| value.as_string())
        .map(|value| value.as_str().to_string())
}

impl AcceptSignature {
    /// Parse an `Accept-Signature` header value
    ///
    /// Only the first dictionary member is considered
    pub fn parse(value: &str) -> Result<Self> {
        if value.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::MissingAcceptSignature,
                "Empty 'accept-signature' header",
            ));
        }

        let dictionary = sfv::Parser::new(value).parse_dictionary().map_err(|error| {
            Error::with_source(
                ErrorKind::InvalidAcceptSignature,
                "'accept-signature' header isn't a dictionary",
                error,
            )
        })?;

        let Some((label, entry)) = dictionary.iter().next() else {
            return Err(Error::new(
                ErrorKind::MissingAcceptSignature,
                "No 'accept-signature' entry",
            ));
        };

        let ListEntry::InnerList(ref inner_list) = *entry else {
            return Err(invalid("'accept-signature' entry isn't an inner list"));
        };

        let fields = inner_list
            .items
            .iter()
            .map(|item| {
                if !matches!(item.bare_item, BareItem::String(..)) {
                    return Err(invalid("Component names have to be strings"));
                }

                ComponentId::from_item(item).map_err(|error| {
                    Error::with_source(
                        ErrorKind::InvalidAcceptSignature,
                        "Malformed component identifier",
                        error,
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = inner_list
            .params
            .keys()
            .filter_map(|key| Metadata::parse(key.as_str()).ok())
            .collect();

        let params = &inner_list.params;
        Ok(Self {
            label: label.as_str().to_string(),
            fields,
            metadata,
            nonce: string_param(params, Metadata::Nonce),
            algorithm: string_param(params, Metadata::Alg),
            key_id: string_param(params, Metadata::KeyId),
            tag: string_param(params, Metadata::Tag),
        })
    }

    /// Read the advertisement from the headers of a message
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let value = util::combined_field_value(headers, &ACCEPT_SIGNATURE_HEADER)
            .map_err(|error| {
                Error::with_source(
                    ErrorKind::InvalidAcceptSignature,
                    "'accept-signature' header isn't visible ASCII",
                    error,
                )
            })?
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::MissingAcceptSignature,
                    "Missing 'accept-signature' header",
                )
            })?;

        Self::parse(&value)
    }

    /// Requested algorithm, if it's one this crate implements
    #[must_use]
    pub fn supported_algorithm(&self) -> Option<Algorithm> {
        self.algorithm
            .as_deref()
            .and_then(|name| Algorithm::parse(name).ok())
    }

    /// Signing profile pre-filled with the advertised label, components and metadata
    ///
    /// The algorithm is set when the advertised one is supported, a requested nonce is echoed back.
    /// `keyid` and `tag` belong to the [`PrivateKey`](crate::PrivateKey) and aren't part of the
    /// profile.
    #[must_use]
    pub fn signing_profile(&self) -> SigningProfileBuilder {
        let mut builder = SigningProfileBuilder::default()
            .label(self.label.clone())
            .fields(self.fields.clone())
            .metadata(self.metadata.clone());

        if let Some(algorithm) = self.supported_algorithm() {
            builder = builder.algorithm(algorithm);
        }

        if let Some(ref nonce) = self.nonce {
            builder = builder.nonce(Arc::new(FixedNonce::new(nonce.clone())));
        }

        builder
    }
}
