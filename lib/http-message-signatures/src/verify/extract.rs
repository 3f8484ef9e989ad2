use super::WILDCARD_LABEL;
use crate::{
    component::ComponentId,
    error::{Error, ErrorKind, Result},
    metadata::{Metadata, ParamsMetadata},
    util, SIGNATURE_HEADER, SIGNATURE_INPUT_HEADER,
};
use http::{HeaderMap, HeaderName};
use sfv::{BareItem, Dictionary, Item, ListEntry};

/// Parsed `Signature` and `Signature-Input` headers
#[derive(Debug)]
pub struct Signatures {
    inputs: Dictionary,
    signatures: Dictionary,
}

/// Signature selected for verification
#[derive(Clone, Debug)]
pub struct ExtractedSignature {
    /// Label of the signature
    pub label: String,

    /// Raw signature bytes
    pub signature: Vec<u8>,

    /// Covered components, in order
    pub components: Vec<ComponentId>,

    /// Metadata names, in order
    pub metadata: Vec<Metadata>,

    /// Metadata values
    pub params: ParamsMetadata,
}

fn parse_dictionary(headers: &HeaderMap, name: &HeaderName) -> Result<Dictionary> {
    let value = util::combined_field_value(headers, name)
        .map_err(|error| {
            Error::with_source(
                ErrorKind::NoSigInvalidSignature,
                format!("'{name}' header isn't visible ASCII"),
                error,
            )
        })?
        .ok_or_else(|| {
            Error::new(
                ErrorKind::NoSigMissingSignature,
                format!("Missing '{name}' header"),
            )
        })?;

    sfv::Parser::new(&value)
        .parse_dictionary()
        .map_err(|error| {
            Error::with_source(
                ErrorKind::NoSigInvalidSignature,
                format!("'{name}' header isn't a dictionary"),
                error,
            )
        })
}

fn member<'a>(dictionary: &'a Dictionary, label: &str) -> Option<&'a ListEntry> {
    dictionary
        .iter()
        .find(|(key, _)| key.as_str() == label)
        .map(|(_, entry)| entry)
}

impl Signatures {
    /// Parse both signature headers of a message
    pub fn parse(headers: &HeaderMap) -> Result<Self> {
        Ok(Self {
            inputs: parse_dictionary(headers, &SIGNATURE_INPUT_HEADER)?,
            signatures: parse_dictionary(headers, &SIGNATURE_HEADER)?,
        })
    }

    /// Pick the signature with the label
    ///
    /// The wildcard label picks the first input that has a signature with the same label
    pub fn extract(&self, label: &str) -> Result<ExtractedSignature> {
        let input = if label == WILDCARD_LABEL {
            self.inputs
                .iter()
                .find(|(key, _)| member(&self.signatures, key.as_str()).is_some())
        } else {
            self.inputs.iter().find(|(key, _)| key.as_str() == label)
        };

        let Some((label, input)) = input else {
            return Err(Error::new(
                ErrorKind::NoSigMissingSignature,
                format!("No signature input labelled '{label}'"),
            ));
        };

        let signature = member(&self.signatures, label.as_str()).ok_or_else(|| {
            Error::new(
                ErrorKind::NoSigMissingSignature,
                format!("No signature labelled '{}'", label.as_str()),
            )
        })?;

        let ListEntry::Item(Item {
            bare_item: BareItem::ByteSequence(ref signature),
            ..
        }) = *signature
        else {
            return Err(Error::new(
                ErrorKind::SigInvalidSignature,
                "Signature isn't a byte sequence",
            ));
        };

        let ListEntry::InnerList(ref input) = *input else {
            return Err(Error::new(
                ErrorKind::SigInvalidSignature,
                "Signature input isn't an inner list",
            ));
        };

        let components = input
            .items
            .iter()
            .map(|item| {
                ComponentId::from_item(item).map_err(|error| {
                    Error::with_source(
                        ErrorKind::SigInvalidSignature,
                        "Malformed component identifier",
                        error,
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = input
            .params
            .keys()
            .map(|key| Metadata::parse(key.as_str()))
            .collect::<Result<Vec<_>>>()?;

        Ok(ExtractedSignature {
            label: label.as_str().to_string(),
            signature: signature.clone(),
            components,
            metadata,
            params: ParamsMetadata::new(input.params.clone()),
        })
    }
}
