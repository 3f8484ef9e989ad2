//!
//! Signature base calculation
//!

use crate::{
    component::{self, ComponentId},
    error::{Error, ErrorKind, Result},
    message::Message,
    metadata::{Metadata, MetadataProvider},
};
use sfv::{InnerList, ListEntry, Parameters, SerializeValue};
use std::fmt::Write;

/// Calculated signature base
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureBase {
    /// Bytes that get signed
    pub base: Vec<u8>,

    /// `@signature-params` value, emitted as the `Signature-Input` member
    pub signature_params: InnerList,

    /// Serialised form of `signature_params`
    pub signature_input: String,
}

/// Construct the signature base over the given components and metadata
///
/// One line per component, in the given order, followed by the `@signature-params` line
/// (without trailing newline)
#[inline]
pub fn construct<M>(
    message: &M,
    components: &[ComponentId],
    metadata: &[Metadata],
    provider: &dyn MetadataProvider,
) -> Result<SignatureBase>
where
    M: Message + ?Sized,
{
    let mut base = String::new();
    let mut seen = Vec::with_capacity(components.len());
    let mut items = Vec::with_capacity(components.len());

    for component in components {
        let identifier = component.serialize();
        if seen.contains(&identifier) {
            return Err(Error::new(
                ErrorKind::InvalidSignatureOptions,
                format!("Component {identifier} is covered more than once"),
            ));
        }

        let value = component::resolve(component, message)?;
        let _ = writeln!(base, "{identifier}: {value}");

        items.push(component.to_item());
        seen.push(identifier);
    }

    let mut params = Parameters::new();
    for name in metadata {
        let key = name.key();
        if params.contains_key(&key) {
            return Err(Error::new(
                ErrorKind::InvalidMetadata,
                format!("Metadata '{name}' is given more than once"),
            ));
        }

        params.insert(key, name.value(provider)?);
    }

    let signature_params = InnerList::with_params(items, params);
    let signature_input = vec![ListEntry::InnerList(signature_params.clone())]
        .serialize_value()
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidSignatureOptions,
                "Failed to serialise signature parameters",
            )
        })?;

    let _ = write!(base, "\"@signature-params\": {signature_input}");

    if !base.is_ascii() {
        return Err(Error::new(
            ErrorKind::InvalidComponent,
            "Signature base contains non-ASCII characters",
        ));
    }

    Ok(SignatureBase {
        base: base.into_bytes(),
        signature_params,
        signature_input,
    })
}
