//!
//! Signature metadata (the parameters attached to `@signature-params`)
//!

use crate::{
    error::{Error, ErrorKind, Result},
    BoxError,
};
use sfv::{BareItem, Integer, Key, KeyRef, StringRef};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Names of the metadata parameters a signature can carry
#[derive(
    AsRefStr, Clone, Copy, Debug, Display, EnumString, Eq, Hash, IntoStaticStr, PartialEq,
)]
#[strum(serialize_all = "lowercase")]
pub enum Metadata {
    /// Creation time as unix timestamp
    Created,

    /// Expiration time as unix timestamp
    Expires,

    /// Random value to detect replays
    Nonce,

    /// Algorithm identifier
    Alg,

    /// Identifier of the key used to sign
    KeyId,

    /// Application-specific tag
    Tag,
}

impl Metadata {
    /// Parse a metadata name
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name).map_err(|_| {
            Error::new(
                ErrorKind::InvalidMetadata,
                format!("Unknown metadata parameter '{name}'"),
            )
        })
    }

    /// Parameter key of this metadata entry
    #[must_use]
    pub fn key(self) -> Key {
        KeyRef::constant(self.into()).to_owned()
    }

    /// Look up the value of this metadata entry from the provider and convert it into a
    /// structured field value
    pub fn value(self, provider: &dyn MetadataProvider) -> Result<BareItem> {
        let unavailable = |error: BoxError| {
            Error::with_source(
                ErrorKind::InvalidMetadata,
                format!("Value for metadata '{self}' is unavailable"),
                error,
            )
        };

        match self {
            Self::Created | Self::Expires => {
                let value = if self == Self::Created {
                    provider.created()
                } else {
                    provider.expires()
                }
                .map_err(unavailable)?;

                let integer = Integer::try_from(value).map_err(|error| {
                    Error::with_source(
                        ErrorKind::InvalidMetadata,
                        format!("Value for metadata '{self}' is out of range"),
                        error,
                    )
                })?;

                Ok(BareItem::Integer(integer))
            }
            Self::Nonce | Self::Alg | Self::KeyId | Self::Tag => {
                let value = match self {
                    Self::Nonce => provider.nonce(),
                    Self::Alg => provider.alg(),
                    Self::KeyId => provider.key_id(),
                    _ => provider.tag(),
                }
                .map_err(unavailable)?;

                let string = StringRef::from_str(value).map_err(|error| {
                    Error::with_source(
                        ErrorKind::InvalidMetadata,
                        format!("Value for metadata '{self}' isn't printable ASCII"),
                        error,
                    )
                })?;

                Ok(BareItem::String(string.to_owned()))
            }
        }
    }
}

/// Source of metadata values
///
/// On the signing side it's backed by the profile and key, on the verifying side by the
/// received parameters
pub trait MetadataProvider: Send + Sync {
    /// `created` as unix timestamp
    fn created(&self) -> Result<i64, BoxError>;

    /// `expires` as unix timestamp
    fn expires(&self) -> Result<i64, BoxError>;

    /// `nonce` value
    fn nonce(&self) -> Result<&str, BoxError>;

    /// `alg` value
    fn alg(&self) -> Result<&str, BoxError>;

    /// `keyid` value
    fn key_id(&self) -> Result<&str, BoxError>;

    /// `tag` value
    fn tag(&self) -> Result<&str, BoxError>;
}

/// Metadata as received in a `Signature-Input` entry
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamsMetadata {
    params: sfv::Parameters,
}

impl ParamsMetadata {
    /// Wrap the parameters of a signature input
    #[must_use]
    pub fn new(params: sfv::Parameters) -> Self {
        Self { params }
    }

    /// Raw parameters
    #[must_use]
    pub fn params(&self) -> &sfv::Parameters {
        &self.params
    }

    /// Whether the parameter is present
    #[must_use]
    pub fn contains(&self, name: Metadata) -> bool {
        self.get(name).is_some()
    }

    fn get(&self, name: Metadata) -> Option<&BareItem> {
        self.params
            .iter()
            .find(|(key, _)| key.as_str() == name.as_ref())
            .map(|(_, value)| value)
    }

    fn integer(&self, name: Metadata) -> Result<i64, BoxError> {
        let value = self
            .get(name)
            .ok_or_else(|| format!("No '{name}' parameter"))?;

        value
            .as_integer()
            .map(i64::from)
            .ok_or_else(|| format!("'{name}' parameter isn't an integer").into())
    }

    fn string(&self, name: Metadata) -> Result<&str, BoxError> {
        let value = self
            .get(name)
            .ok_or_else(|| format!("No '{name}' parameter"))?;

        value
            .as_string()
            .map(StringRef::as_str)
            .ok_or_else(|| format!("'{name}' parameter isn't a string").into())
    }
}

impl MetadataProvider for ParamsMetadata {
    fn created(&self) -> Result<i64, BoxError> {
        self.integer(Metadata::Created)
    }

    fn expires(&self) -> Result<i64, BoxError> {
        self.integer(Metadata::Expires)
    }

    fn nonce(&self) -> Result<&str, BoxError> {
        self.string(Metadata::Nonce)
    }

    fn alg(&self) -> Result<&str, BoxError> {
        self.string(Metadata::Alg)
    }

    fn key_id(&self) -> Result<&str, BoxError> {
        self.string(Metadata::KeyId)
    }

    fn tag(&self) -> Result<&str, BoxError> {
        self.string(Metadata::Tag)
    }
}
