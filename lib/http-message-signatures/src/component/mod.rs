//!
//! Component identifiers
//!
//! A component is either an HTTP field (lower-cased header name) or a derived component
//! starting with `@`. Identifiers are structured field strings and can carry parameters
//! (e.g. `"@query-param";name="Pet"`).
//!

use crate::{
    error::{Error, ErrorKind, Result},
    util,
};
use sfv::{BareItem, Item, KeyRef, Parameters, SerializeValue, StringRef};
use std::{fmt, str::FromStr};
use strum::{AsRefStr, EnumString, IntoStaticStr};

pub use self::resolve::resolve;

mod resolve;

/// Components derived from the message rather than read from a header
#[derive(AsRefStr, Clone, Copy, Debug, EnumString, Eq, Hash, IntoStaticStr, PartialEq)]
pub enum DerivedComponent {
    /// Request method
    #[strum(serialize = "@method")]
    Method,

    /// Full target URI
    #[strum(serialize = "@target-uri")]
    TargetUri,

    /// Lower-cased authority
    #[strum(serialize = "@authority")]
    Authority,

    /// Lower-cased scheme
    #[strum(serialize = "@scheme")]
    Scheme,

    /// Path and query, as sent on the request line
    #[strum(serialize = "@request-target")]
    RequestTarget,

    /// Absolute path
    #[strum(serialize = "@path")]
    Path,

    /// Query including the leading `?`
    #[strum(serialize = "@query")]
    Query,

    /// Single query parameter, selected by the `name` parameter
    #[strum(serialize = "@query-param")]
    QueryParam,

    /// Three-digit status code of a response
    #[strum(serialize = "@status")]
    Status,
}

/// Identifier of a covered component
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentId {
    name: sfv::String,
    params: Parameters,
}

impl ComponentId {
    /// Component identified by its name only
    ///
    /// The name gets lower-cased.
    /// Errors if it's empty or contains anything besides printable ASCII.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() || !util::is_printable_ascii(&name) {
            return Err(Error::new(
                ErrorKind::InvalidSignatureOptions,
                format!("Invalid component name '{name}'"),
            ));
        }

        let name = StringRef::from_str(&name).map_err(|error| {
            Error::with_source(
                ErrorKind::InvalidSignatureOptions,
                format!("Invalid component name '{name}'"),
                error,
            )
        })?;

        Ok(Self {
            name: name.to_owned(),
            params: Parameters::new(),
        })
    }

    /// Component with a name known to be a valid, lower-case identifier
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self {
            name: StringRef::constant(name).to_owned(),
            params: Parameters::new(),
        }
    }

    /// `@query-param` component selecting the parameter called `name`
    pub fn query_param(name: &str) -> Result<Self> {
        let value = StringRef::from_str(name).map_err(|error| {
            Error::with_source(
                ErrorKind::InvalidSignatureOptions,
                format!("Invalid query parameter name '{name}'"),
                error,
            )
        })?;

        let component = Self::from(DerivedComponent::QueryParam);
        Ok(component.with_param(KeyRef::constant("name"), BareItem::String(value.to_owned())))
    }

    /// Attach a parameter to the identifier
    #[must_use]
    pub fn with_param(mut self, key: &KeyRef, value: BareItem) -> Self {
        self.params.insert(key.to_owned(), value);
        self
    }

    /// Convert a structured field item into a component identifier
    pub fn from_item(item: &Item) -> Result<Self> {
        let Some(name) = item.bare_item.as_string() else {
            return Err(Error::new(
                ErrorKind::InvalidSignatureOptions,
                "Component identifiers have to be strings",
            ));
        };

        if name.as_str().is_empty()
            || name.as_str().bytes().any(|byte| byte.is_ascii_uppercase())
        {
            return Err(Error::new(
                ErrorKind::InvalidSignatureOptions,
                format!("Component name '{}' has to be lower-case", name.as_str()),
            ));
        }

        Ok(Self {
            name: name.to_owned(),
            params: item.params.clone(),
        })
    }

    /// Name of the component, without parameters
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Parameters attached to the identifier
    #[must_use]
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Look up a single identifier parameter
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&BareItem> {
        self.params
            .iter()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, value)| value)
    }

    /// Whether this is a derived component
    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.name().starts_with('@')
    }

    /// Structured field item of this identifier, as it appears in `Signature-Input`
    #[must_use]
    pub fn to_item(&self) -> Item {
        Item {
            bare_item: BareItem::String(self.name.clone()),
            params: self.params.clone(),
        }
    }

    /// Serialised identifier, as it appears at the start of a signature base line
    #[must_use]
    pub fn serialize(&self) -> String {
        self.to_item().serialize_value()
    }
}

impl From<DerivedComponent> for ComponentId {
    fn from(component: DerivedComponent) -> Self {
        Self::from_static(component.into())
    }
}

impl FromStr for ComponentId {
    type Err = Error;

    /// Accepts either a bare name (`content-type`, `@method`) or a serialised identifier
    /// (`"@query-param";name="Pet"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.starts_with('"') {
            return Self::new(s);
        }

        let item = sfv::Parser::new(s).parse_item().map_err(|error| {
            Error::with_source(
                ErrorKind::InvalidSignatureOptions,
                format!("Malformed component identifier '{s}'"),
                error,
            )
        })?;

        Self::from_item(&item)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}
