use super::{extract::ExtractedSignature, KeySpec, WILDCARD_LABEL};
use crate::{
    component::{ComponentId, DerivedComponent},
    crypto::Algorithm,
    error::{Error, ErrorKind, Result},
    metadata::{Metadata, MetadataProvider},
    util::UnixTimestampExt,
    DEFAULT_SIGNATURE_LABEL,
};
use derive_builder::Builder;
use http::{header::DATE, HeaderMap};
use sfv::KeyRef;
use std::time::{Duration, SystemTime};

/// Policy a valid signature additionally has to satisfy
#[derive(Builder, Clone, Debug)]
#[builder(default, pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct VerifyProfile {
    /// Label of the signature to verify. `*` picks the first signature present.
    #[builder(setter(into))]
    pub label: String,

    /// Components the signature has to cover
    pub required_fields: Vec<ComponentId>,

    /// Metadata the signature has to carry
    pub required_metadata: Vec<Metadata>,

    /// Metadata the signature must not carry
    pub disallowed_metadata: Vec<Metadata>,

    /// Algorithms keys are allowed to use
    pub allowed_algorithms: Vec<Algorithm>,

    /// Skip all timing checks
    pub disable_time_enforcement: bool,

    /// Skip the `expires` check
    pub disable_expiration_enforcement: bool,

    /// Maximum age of a signature, measured from `created`. Zero disables the check.
    pub created_valid_duration: Duration,

    /// Tolerance for clock differences when checking `created` and `expires`
    pub expired_skew: Duration,

    /// Maximum distance between the `Date` header and `created`. Zero disables the check.
    pub date_field_skew: Duration,
}

impl Default for VerifyProfile {
    fn default() -> Self {
        Self {
            label: DEFAULT_SIGNATURE_LABEL.into(),
            required_fields: vec![
                ComponentId::from_static("content-digest"),
                ComponentId::from(DerivedComponent::Method),
                ComponentId::from(DerivedComponent::TargetUri),
            ],
            required_metadata: vec![Metadata::Created, Metadata::KeyId],
            disallowed_metadata: vec![Metadata::Alg],
            allowed_algorithms: vec![
                Algorithm::EcdsaP256Sha256,
                Algorithm::EcdsaP384Sha384,
                Algorithm::Ed25519,
                Algorithm::HmacSha256,
            ],
            disable_time_enforcement: false,
            disable_expiration_enforcement: false,
            created_valid_duration: Duration::from_secs(5 * 60),
            expired_skew: Duration::ZERO,
            date_field_skew: Duration::from_secs(60),
        }
    }
}

impl VerifyProfileBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref label) = self.label {
            if label != WILDCARD_LABEL && KeyRef::from_str(label).is_err() {
                return Err(format!("Invalid signature label '{label}'"));
            }
        }

        let defaults = VerifyProfile::default();
        let required = self
            .required_metadata
            .as_ref()
            .unwrap_or(&defaults.required_metadata);
        let disallowed = self
            .disallowed_metadata
            .as_ref()
            .unwrap_or(&defaults.disallowed_metadata);

        if let Some(name) = required.iter().find(|name| disallowed.contains(name)) {
            return Err(format!("Metadata '{name}' is both required and disallowed"));
        }

        if matches!(self.allowed_algorithms, Some(ref algorithms) if algorithms.is_empty()) {
            return Err("At least one algorithm has to be allowed".into());
        }

        Ok(())
    }
}

impl From<VerifyProfileBuilderError> for Error {
    fn from(error: VerifyProfileBuilderError) -> Self {
        Self::with_source(
            ErrorKind::InvalidSignatureOptions,
            "Invalid verify profile",
            error,
        )
    }
}

fn is_subset<I>(left: &[I], right: &[I]) -> bool
where
    I: PartialEq,
{
    if left.len() <= right.len() {
        left.iter().all(|item| right.contains(item))
    } else {
        false
    }
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn failed(message: impl Into<std::borrow::Cow<'static, str>>) -> Error {
    Error::new(ErrorKind::SigFailedProfile, message)
}

impl VerifyProfile {
    /// Return a builder of the verify profile
    ///
    /// Fields that aren't set keep their default value
    #[must_use]
    pub fn builder() -> VerifyProfileBuilder {
        VerifyProfileBuilder::default()
    }

    /// Check a cryptographically valid signature against the policy
    pub(crate) fn check(
        &self,
        signature: &ExtractedSignature,
        key_spec: &KeySpec,
        headers: &HeaderMap,
        now: SystemTime,
    ) -> Result<()> {
        let covered: Vec<String> = signature
            .components
            .iter()
            .map(ComponentId::serialize)
            .collect();
        let required: Vec<String> = self
            .required_fields
            .iter()
            .map(ComponentId::serialize)
            .collect();

        if !is_subset(&required, &covered) {
            let missing = required
                .iter()
                .filter(|identifier| !covered.contains(identifier))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");

            return Err(failed(format!("Required components {missing} aren't covered")));
        }

        if let Some(name) = self
            .required_metadata
            .iter()
            .find(|name| !signature.metadata.contains(name))
        {
            return Err(failed(format!("Required metadata '{name}' is missing")));
        }

        if let Some(name) = self
            .disallowed_metadata
            .iter()
            .find(|name| signature.metadata.contains(name))
        {
            return Err(failed(format!("Metadata '{name}' isn't allowed")));
        }

        if !self.allowed_algorithms.contains(&key_spec.algorithm) {
            return Err(failed(format!(
                "Algorithm '{}' isn't allowed",
                key_spec.algorithm
            )));
        }

        if signature.metadata.contains(&Metadata::Alg) {
            let alg = signature
                .params
                .alg()
                .map_err(|error| {
                    Error::with_source(ErrorKind::SigFailedProfile, "Invalid 'alg'", error)
                })?;

            if alg != key_spec.algorithm.as_ref() {
                return Err(failed(format!(
                    "Signature claims algorithm '{alg}' but the key uses '{}'",
                    key_spec.algorithm
                )));
            }
        }

        if self.disable_time_enforcement {
            return Ok(());
        }

        self.check_timing(signature, headers, now)
    }

    fn check_timing(
        &self,
        signature: &ExtractedSignature,
        headers: &HeaderMap,
        now: SystemTime,
    ) -> Result<()> {
        let now = now
            .to_unix_timestamp()
            .ok_or_else(|| failed("Clock reads a time before the unix epoch"))?;
        let skew = secs(self.expired_skew);

        if signature.metadata.contains(&Metadata::Created) {
            let created = signature.params.created().map_err(|error| {
                Error::with_source(ErrorKind::SigFailedProfile, "Invalid 'created'", error)
            })?;

            if created > now.saturating_add(skew) {
                return Err(failed("Signature was created in the future"));
            }

            if !self.created_valid_duration.is_zero()
                && now.saturating_sub(created) > secs(self.created_valid_duration)
            {
                return Err(failed("Signature is too old"));
            }

            if !self.date_field_skew.is_zero() {
                if let Some(date) = headers.get(DATE) {
                    let date = date
                        .to_str()
                        .map_err(|error| {
                            Error::with_source(
                                ErrorKind::SigFailedProfile,
                                "Invalid date header",
                                error,
                            )
                        })
                        .and_then(|date| {
                            httpdate::parse_http_date(date).map_err(|error| {
                                Error::with_source(
                                    ErrorKind::SigFailedProfile,
                                    "Invalid date header",
                                    error,
                                )
                            })
                        })?
                        .to_unix_timestamp()
                        .ok_or_else(|| failed("Date header is before the unix epoch"))?;

                    if date.abs_diff(created) > self.date_field_skew.as_secs() {
                        return Err(failed("Date header and 'created' are too far apart"));
                    }
                }
            }
        }

        if !self.disable_expiration_enforcement && signature.metadata.contains(&Metadata::Expires) {
            let expires = signature.params.expires().map_err(|error| {
                Error::with_source(ErrorKind::SigFailedProfile, "Invalid 'expires'", error)
            })?;

            if now > expires.saturating_add(skew) {
                return Err(failed("Signature has expired"));
            }
        }

        Ok(())
    }
}
