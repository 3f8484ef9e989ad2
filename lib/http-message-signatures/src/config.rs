//!
//! Serialisable signing and verification settings
//!

use crate::{
    component::ComponentId,
    crypto::Algorithm,
    digest::DigestAlgorithm,
    error::Result,
    metadata::Metadata,
    sign::SigningProfile,
    verify::VerifyProfile,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of a signing and/or verifying party
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    /// Outgoing signatures
    pub signing: Option<SigningConfiguration>,

    /// Incoming signatures
    pub verify: Option<VerifyConfiguration>,
}

/// Mirrors [`SigningProfile`]. Names are validated when converting.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub struct SigningConfiguration {
    pub algorithm: String,
    pub digest_algorithm: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<String>,
    pub label: Option<String>,
    pub expires_in_secs: Option<u64>,
}

/// Unset values keep the defaults of [`VerifyProfile`]
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub struct VerifyConfiguration {
    pub label: Option<String>,
    pub required_fields: Option<Vec<String>>,
    pub required_metadata: Option<Vec<String>>,
    pub disallowed_metadata: Option<Vec<String>>,
    pub allowed_algorithms: Option<Vec<String>>,
    #[serde(default)]
    pub disable_time_enforcement: bool,
    #[serde(default)]
    pub disable_expiration_enforcement: bool,
    pub created_valid_secs: Option<u64>,
    pub expired_skew_secs: Option<u64>,
    pub date_field_skew_secs: Option<u64>,
}

fn components(names: &[String]) -> Result<Vec<ComponentId>> {
    names.iter().map(|name| name.parse()).collect()
}

fn metadata(names: &[String]) -> Result<Vec<Metadata>> {
    names.iter().map(|name| Metadata::parse(name)).collect()
}

fn algorithms(names: &[String]) -> Result<Vec<Algorithm>> {
    names.iter().map(|name| Algorithm::parse(name)).collect()
}

impl SigningConfiguration {
    /// Validate the names and build a signing profile
    pub fn to_profile(&self) -> Result<SigningProfile> {
        let mut builder = SigningProfile::builder()
            .algorithm(Algorithm::parse(&self.algorithm)?)
            .fields(components(&self.fields)?)
            .metadata(metadata(&self.metadata)?);

        if let Some(ref digest_algorithm) = self.digest_algorithm {
            builder = builder.digest_algorithm(DigestAlgorithm::parse(digest_algorithm)?);
        }
        if let Some(ref label) = self.label {
            builder = builder.label(label.clone());
        }
        if let Some(secs) = self.expires_in_secs {
            builder = builder.expires_in(Duration::from_secs(secs));
        }

        Ok(builder.build()?)
    }
}

impl VerifyConfiguration {
    /// Validate the names and build a verify profile
    pub fn to_profile(&self) -> Result<VerifyProfile> {
        let mut builder = VerifyProfile::builder()
            .disable_time_enforcement(self.disable_time_enforcement)
            .disable_expiration_enforcement(self.disable_expiration_enforcement);

        if let Some(ref label) = self.label {
            builder = builder.label(label.clone());
        }
        if let Some(ref fields) = self.required_fields {
            builder = builder.required_fields(components(fields)?);
        }
        if let Some(ref names) = self.required_metadata {
            builder = builder.required_metadata(metadata(names)?);
        }
        if let Some(ref names) = self.disallowed_metadata {
            builder = builder.disallowed_metadata(metadata(names)?);
        }
        if let Some(ref names) = self.allowed_algorithms {
            builder = builder.allowed_algorithms(algorithms(names)?);
        }
        if let Some(secs) = self.created_valid_secs {
            builder = builder.created_valid_duration(Duration::from_secs(secs));
        }
        if let Some(secs) = self.expired_skew_secs {
            builder = builder.expired_skew(Duration::from_secs(secs));
        }
        if let Some(secs) = self.date_field_skew_secs {
            builder = builder.date_field_skew(Duration::from_secs(secs));
        }

        Ok(builder.build()?)
    }
}
