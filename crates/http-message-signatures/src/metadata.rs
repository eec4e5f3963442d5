// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! Signature metadata: the ordered covered-components list plus the
//! signature parameters carried on the `Signature-Input` inner list.
//!
//! The recognized parameters are `alg`, `created`, `expires`, `keyid`,
//! `nonce` and `tag`. `created` and `expires` are stored as integer Unix
//! seconds and exposed as [`SystemTime`]; the remaining four are strings.
//! Parameters keep their wire order so a parsed value serializes back
//! byte-identically.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sfv::SerializeValue;

use crate::components::ComponentIdentifier;
use crate::error::SignatureError;

/// The ordered covered-components list together with its parameter tail.
#[derive(Debug, Clone, Default)]
pub struct SignatureMetadata {
    components: Vec<ComponentIdentifier>,
    params: sfv::Parameters,
}

impl SignatureMetadata {
    /// An empty metadata value: no covered components, no parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a covered component.
    ///
    /// # Errors
    ///
    /// Fails if an equal identifier is already covered. Equality ignores
    /// parameter order, so `"f";sf;key="a"` and `"f";key="a";sf` collide.
    pub fn push(&mut self, component: ComponentIdentifier) -> Result<(), SignatureError> {
        if self.components.contains(&component) {
            return Err(SignatureError::Validation(format!(
                "duplicate covered component `{}`",
                component.name().as_str()
            )));
        }
        self.components.push(component);
        Ok(())
    }

    /// The covered components, in coverage order.
    pub fn components(&self) -> &[ComponentIdentifier] {
        &self.components
    }

    /// The raw signature parameters, in wire order.
    pub fn params(&self) -> &sfv::Parameters {
        &self.params
    }

    fn string_param(&self, key: &str) -> Result<Option<&str>, SignatureError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => match value.as_string() {
                Some(s) => Ok(Some(s.as_str())),
                None => Err(SignatureError::Validation(format!(
                    "signature parameter `{key}` must be a string"
                ))),
            },
        }
    }

    fn integer_param(&self, key: &str) -> Result<Option<i64>, SignatureError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => match value.as_integer() {
                Some(integer) => Ok(Some(integer.into())),
                None => Err(SignatureError::Validation(format!(
                    "signature parameter `{key}` must be an integer"
                ))),
            },
        }
    }

    fn set_string_param(&mut self, key: &'static str, value: &str) -> Result<(), SignatureError> {
        self.params.insert(
            sfv::KeyRef::constant(key).to_owned(),
            sfv::BareItem::String(sfv::StringRef::from_str(value)?.to_owned()),
        );
        Ok(())
    }

    fn set_timestamp_param(
        &mut self,
        key: &'static str,
        time: SystemTime,
    ) -> Result<(), SignatureError> {
        let seconds = time
            .duration_since(UNIX_EPOCH)
            .map_err(|_| {
                SignatureError::InvalidArgument(format!(
                    "`{key}` timestamps before the Unix epoch are not representable"
                ))
            })
            .and_then(|duration| {
                i64::try_from(duration.as_secs()).map_err(|_| {
                    SignatureError::InvalidArgument(format!(
                        "`{key}` timestamp does not fit in 64 bits"
                    ))
                })
            })?;
        // RFC 8941 integers carry at most fifteen digits.
        if seconds > 999_999_999_999_999 {
            return Err(SignatureError::InvalidArgument(format!(
                "`{key}` timestamp exceeds the RFC 8941 integer range"
            )));
        }
        self.params.insert(
            sfv::KeyRef::constant(key).to_owned(),
            sfv::BareItem::Integer(sfv::Integer::constant(seconds)),
        );
        Ok(())
    }

    fn timestamp_param(&self, key: &str) -> Result<Option<SystemTime>, SignatureError> {
        Ok(self.integer_param(key)?.map(|seconds| {
            if seconds >= 0 {
                UNIX_EPOCH + Duration::from_secs(seconds.unsigned_abs())
            } else {
                UNIX_EPOCH - Duration::from_secs(seconds.unsigned_abs())
            }
        }))
    }

    /// The `alg` parameter, if set.
    pub fn alg(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("alg")
    }

    /// Set the `alg` parameter.
    pub fn set_alg(&mut self, alg: &str) -> Result<(), SignatureError> {
        self.set_string_param("alg", alg)
    }

    /// The `keyid` parameter, if set.
    pub fn keyid(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("keyid")
    }

    /// Set the `keyid` parameter.
    pub fn set_keyid(&mut self, keyid: &str) -> Result<(), SignatureError> {
        self.set_string_param("keyid", keyid)
    }

    /// The `nonce` parameter, if set.
    pub fn nonce(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("nonce")
    }

    /// Set the `nonce` parameter.
    pub fn set_nonce(&mut self, nonce: &str) -> Result<(), SignatureError> {
        self.set_string_param("nonce", nonce)
    }

    /// The `tag` parameter, if set.
    pub fn tag(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("tag")
    }

    /// Set the `tag` parameter.
    pub fn set_tag(&mut self, tag: &str) -> Result<(), SignatureError> {
        self.set_string_param("tag", tag)
    }

    /// The `created` parameter as a timestamp, if set.
    pub fn created(&self) -> Result<Option<SystemTime>, SignatureError> {
        self.timestamp_param("created")
    }

    /// Set the `created` parameter from a timestamp, truncating to whole
    /// seconds.
    pub fn set_created(&mut self, time: SystemTime) -> Result<(), SignatureError> {
        self.set_timestamp_param("created", time)
    }

    /// The `expires` parameter as a timestamp, if set.
    pub fn expires(&self) -> Result<Option<SystemTime>, SignatureError> {
        self.timestamp_param("expires")
    }

    /// Set the `expires` parameter from a timestamp, truncating to whole
    /// seconds.
    pub fn set_expires(&mut self, time: SystemTime) -> Result<(), SignatureError> {
        self.set_timestamp_param("expires", time)
    }

    /// Whether the signature is expired at `now` according to the `expires`
    /// parameter, or `None` when no expiry is set. Acceptance policy,
    /// including clock skew, stays with the caller.
    pub fn is_expired(&self, now: SystemTime) -> Result<Option<bool>, SignatureError> {
        Ok(self.expires()?.map(|expires| now >= expires))
    }

    pub(crate) fn to_inner_list(&self) -> Result<sfv::InnerList, SignatureError> {
        let mut items = Vec::with_capacity(self.components.len());
        for component in &self.components {
            items.push(component.to_item()?);
        }
        Ok(sfv::InnerList::with_params(items, self.params.clone()))
    }

    /// The wire form of this metadata: the parenthesized inner list of
    /// covered components followed by the parameter tail. This is exactly
    /// the value of the `@signature-params` base line.
    ///
    /// # Errors
    ///
    /// Fails if a component name cannot be re-serialized, which cannot
    /// happen for values built by this crate's constructors or parsers.
    pub fn serialize(&self) -> Result<String, SignatureError> {
        vec![sfv::ListEntry::InnerList(self.to_inner_list()?)]
            .serialize_value()
            .ok_or_else(|| {
                SignatureError::InvalidArgument("signature metadata failed to serialize".into())
            })
    }
}

impl TryFrom<sfv::InnerList> for SignatureMetadata {
    type Error = SignatureError;

    fn try_from(list: sfv::InnerList) -> Result<Self, Self::Error> {
        let mut metadata = SignatureMetadata::new();
        for item in list.items {
            metadata.push(item.try_into()?)?;
        }

        for (key, value) in &list.params {
            match key.as_str() {
                "alg" | "keyid" | "nonce" | "tag" => {
                    if value.as_string().is_none() {
                        return Err(SignatureError::Validation(format!(
                            "signature parameter `{}` must be a string",
                            key.as_str()
                        )));
                    }
                }
                "created" | "expires" => {
                    if value.as_integer().is_none() {
                        return Err(SignatureError::Validation(format!(
                            "signature parameter `{}` must be an integer",
                            key.as_str()
                        )));
                    }
                }
                other => {
                    return Err(SignatureError::Validation(format!(
                        "unrecognized signature parameter `{other}`"
                    )));
                }
            }
        }
        metadata.params = list.params;

        Ok(metadata)
    }
}
