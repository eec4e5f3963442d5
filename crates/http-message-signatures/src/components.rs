// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! Component identifiers, the unit of coverage in an HTTP message signature.
//!
//! An identifier pairs a component name with a set of RFC 8941 parameters.
//! Names are either lowercase HTTP field names or one of the derived names
//! registered in RFC 9421 Section 2.2. Identifiers parsed from a
//! `Signature-Input` header are validated against the component rules of the
//! RFC; identifiers assembled programmatically through the typed
//! constructors are trusted as-is.
//!
//! Two identifiers compare equal when their names match and their parameters
//! carry the same key/value pairs in any order. Serialization preserves the
//! insertion order of parameters, so equal identifiers may still serialize
//! differently; hashing uses a sorted view so equal identifiers always hash
//! equally.

use std::hash::{Hash, Hasher};

use sfv::SerializeValue;

use crate::error::SignatureError;

/// Derived component names registered in RFC 9421 Section 2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedName {
    /// `@method`, the request method as sent
    Method,
    /// `@target-uri`, the full target URI of the request
    TargetUri,
    /// `@authority`, the normalized authority of the target URI
    Authority,
    /// `@scheme`, the lowercase scheme of the target URI
    Scheme,
    /// `@request-target`, the request target exactly as sent on the wire
    RequestTarget,
    /// `@path`, the raw path of the target URI
    Path,
    /// `@query`, the raw query of the target URI including the leading `?`
    Query,
    /// `@query-param`, a single decoded-then-re-encoded query parameter
    QueryParam,
    /// `@status`, the three-digit response status code
    Status,
    /// `@signature-params`, the metadata line itself. Never a covered
    /// component; it exists so the terminating base line can be named.
    SignatureParams,
}

impl DerivedName {
    /// The wire spelling of this derived name, including the `@` prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            DerivedName::Method => "@method",
            DerivedName::TargetUri => "@target-uri",
            DerivedName::Authority => "@authority",
            DerivedName::Scheme => "@scheme",
            DerivedName::RequestTarget => "@request-target",
            DerivedName::Path => "@path",
            DerivedName::Query => "@query",
            DerivedName::QueryParam => "@query-param",
            DerivedName::Status => "@status",
            DerivedName::SignatureParams => "@signature-params",
        }
    }

    /// Look up a registered derived name from its wire spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        let derived = match name {
            "@method" => DerivedName::Method,
            "@target-uri" => DerivedName::TargetUri,
            "@authority" => DerivedName::Authority,
            "@scheme" => DerivedName::Scheme,
            "@request-target" => DerivedName::RequestTarget,
            "@path" => DerivedName::Path,
            "@query" => DerivedName::Query,
            "@query-param" => DerivedName::QueryParam,
            "@status" => DerivedName::Status,
            "@signature-params" => DerivedName::SignatureParams,
            _ => return None,
        };
        Some(derived)
    }
}

/// A component name: a registered derived name or a lowercase HTTP field
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentName {
    /// One of the derived names registered in RFC 9421.
    Derived(DerivedName),
    /// An HTTP field name. Always lowercase.
    Field(String),
}

impl ComponentName {
    /// The wire spelling of this name.
    pub fn as_str(&self) -> &str {
        match self {
            ComponentName::Derived(derived) => derived.as_str(),
            ComponentName::Field(name) => name,
        }
    }
}

/// A component identifier: a component name plus its RFC 8941 parameters.
#[derive(Debug, Clone)]
pub struct ComponentIdentifier {
    name: ComponentName,
    params: sfv::Parameters,
}

impl ComponentIdentifier {
    /// An identifier for an HTTP field. The name is lowercased; no further
    /// validation is applied to values built through this constructor.
    pub fn field(name: &str) -> Self {
        ComponentIdentifier {
            name: ComponentName::Field(name.to_ascii_lowercase()),
            params: sfv::Parameters::new(),
        }
    }

    /// An identifier for a derived component with no parameters.
    pub fn derived(name: DerivedName) -> Self {
        ComponentIdentifier {
            name: ComponentName::Derived(name),
            params: sfv::Parameters::new(),
        }
    }

    /// An identifier for `@query-param` selecting the given parameter name.
    ///
    /// # Errors
    ///
    /// Fails if `name` is not a valid RFC 8941 string.
    pub fn query_param(name: &str) -> Result<Self, SignatureError> {
        let mut id = ComponentIdentifier::derived(DerivedName::QueryParam);
        id.params.insert(
            sfv::KeyRef::constant("name").to_owned(),
            sfv::BareItem::String(sfv::StringRef::from_str(name)?.to_owned()),
        );
        Ok(id)
    }

    /// Parse an identifier from its wire form, e.g. `"my-field";key="a"`,
    /// applying the full set of validation rules.
    ///
    /// # Errors
    ///
    /// Fails on RFC 8941 syntax errors and on any violation of the component
    /// rules checked by the [`TryFrom<sfv::Item>`] conversion.
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        sfv::Parser::new(input).parse_item()?.try_into()
    }

    fn flag(mut self, key: &'static str) -> Self {
        self.params
            .insert(sfv::KeyRef::constant(key).to_owned(), sfv::BareItem::Boolean(true));
        self
    }

    /// Mark this field as a structured field to be strictly re-serialized.
    pub fn with_sf(self) -> Self {
        self.flag("sf")
    }

    /// Mark each value of this field for byte-sequence wrapping.
    pub fn with_bs(self) -> Self {
        self.flag("bs")
    }

    /// Resolve this component from the request rather than the target
    /// message.
    pub fn with_req(self) -> Self {
        self.flag("req")
    }

    /// Resolve this field from the trailer section.
    pub fn with_tr(self) -> Self {
        self.flag("tr")
    }

    /// Select a single member of a dictionary-valued field.
    ///
    /// # Errors
    ///
    /// Fails if `member` is not a valid RFC 8941 string.
    pub fn with_key(mut self, member: &str) -> Result<Self, SignatureError> {
        self.params.insert(
            sfv::KeyRef::constant("key").to_owned(),
            sfv::BareItem::String(sfv::StringRef::from_str(member)?.to_owned()),
        );
        Ok(self)
    }

    /// Attach an arbitrary parameter. A later insertion with the same key
    /// overwrites the earlier value in place.
    ///
    /// # Errors
    ///
    /// Fails if `key` is not a valid RFC 8941 key.
    pub fn set_param(&mut self, key: &str, value: sfv::BareItem) -> Result<(), SignatureError> {
        self.params.insert(sfv::KeyRef::from_str(key)?.to_owned(), value);
        Ok(())
    }

    /// The component name.
    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    /// The raw parameter set, in insertion order.
    pub fn params(&self) -> &sfv::Parameters {
        &self.params
    }

    /// Whether this identifier names a derived component.
    pub fn is_derived(&self) -> bool {
        matches!(self.name, ComponentName::Derived(_))
    }

    /// The value of a boolean parameter. An absent parameter reads as
    /// `false`; a present parameter of another type is a validation error.
    pub fn boolean_param(&self, key: &str) -> Result<bool, SignatureError> {
        match self.params.get(key) {
            None => Ok(false),
            Some(value) => value.as_boolean().ok_or_else(|| {
                SignatureError::Validation(format!(
                    "`{key}` parameter on `{}` must be a boolean",
                    self.name.as_str()
                ))
            }),
        }
    }

    /// The value of a string parameter, if present. A present parameter of
    /// another type is a validation error.
    pub fn string_param(&self, key: &str) -> Result<Option<&str>, SignatureError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => match value.as_string() {
                Some(s) => Ok(Some(s.as_str())),
                None => Err(SignatureError::Validation(format!(
                    "`{key}` parameter on `{}` must be a string",
                    self.name.as_str()
                ))),
            },
        }
    }

    /// Whether the `req` flag is set.
    pub fn from_request(&self) -> Result<bool, SignatureError> {
        self.boolean_param("req")
    }

    /// Whether the `tr` flag is set.
    pub fn from_trailer(&self) -> Result<bool, SignatureError> {
        self.boolean_param("tr")
    }

    /// Whether the `sf` flag is set.
    pub fn wants_strict_serialization(&self) -> Result<bool, SignatureError> {
        self.boolean_param("sf")
    }

    /// Whether the `bs` flag is set.
    pub fn wants_byte_wrapping(&self) -> Result<bool, SignatureError> {
        self.boolean_param("bs")
    }

    /// The dictionary member selected by the `key` parameter, if any.
    pub fn key_member(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("key")
    }

    /// The query parameter selected by the `name` parameter, if any.
    pub fn query_param_name(&self) -> Result<Option<&str>, SignatureError> {
        self.string_param("name")
    }

    /// The wire form of this identifier: the quoted name followed by its
    /// parameters in insertion order.
    ///
    /// # Errors
    ///
    /// Fails only if the name cannot be represented as an RFC 8941 string,
    /// which cannot happen for identifiers built by this crate's
    /// constructors or parsers.
    pub fn serialize(&self) -> Result<String, SignatureError> {
        Ok(self.to_item()?.serialize_value())
    }

    pub(crate) fn to_item(&self) -> Result<sfv::Item, SignatureError> {
        Ok(sfv::Item {
            bare_item: sfv::BareItem::String(
                sfv::StringRef::from_str(self.name.as_str())?.to_owned(),
            ),
            params: self.params.clone(),
        })
    }

    fn validate_field_params(&self) -> Result<(), SignatureError> {
        for (key, value) in &self.params {
            match key.as_str() {
                "sf" | "bs" | "req" | "tr" => {
                    if value.as_boolean().is_none() {
                        return Err(SignatureError::Validation(format!(
                            "`{}` parameter on `{}` must be a boolean",
                            key.as_str(),
                            self.name.as_str()
                        )));
                    }
                }
                "key" => {
                    if value.as_string().is_none() {
                        return Err(SignatureError::Validation(format!(
                            "`key` parameter on `{}` must be a string",
                            self.name.as_str()
                        )));
                    }
                }
                other => {
                    return Err(SignatureError::Validation(format!(
                        "unexpected parameter `{other}` on field component `{}`, only sf / key / bs / req / tr allowed",
                        self.name.as_str()
                    )));
                }
            }
        }

        if self.boolean_param("bs")?
            && (self.boolean_param("sf")? || self.params.contains_key("key"))
        {
            return Err(SignatureError::Validation(format!(
                "`bs` cannot be combined with `sf` or `key` on `{}`",
                self.name.as_str()
            )));
        }

        Ok(())
    }

    fn validate_derived_params(&self, derived: DerivedName) -> Result<(), SignatureError> {
        match derived {
            DerivedName::QueryParam => {
                for (key, value) in &self.params {
                    match key.as_str() {
                        "name" => {
                            if value.as_string().is_none() {
                                return Err(SignatureError::Validation(
                                    "`name` parameter on `@query-param` must be a string".into(),
                                ));
                            }
                        }
                        "req" => {
                            if value.as_boolean().is_none() {
                                return Err(SignatureError::Validation(
                                    "`req` parameter on `@query-param` must be a boolean".into(),
                                ));
                            }
                        }
                        other => {
                            return Err(SignatureError::Validation(format!(
                                "unexpected parameter `{other}` on `@query-param`, only name / req allowed"
                            )));
                        }
                    }
                }
                if self.string_param("name")?.is_none() {
                    return Err(SignatureError::Validation(
                        "`@query-param` requires a `name` parameter".into(),
                    ));
                }
            }
            // The status is a property of the response alone; a
            // request-scoped status can never resolve.
            DerivedName::Status => {
                if let Some((key, _)) = self.params.iter().next() {
                    return Err(SignatureError::Validation(format!(
                        "unexpected parameter `{}` on `@status`",
                        key.as_str()
                    )));
                }
            }
            _ => {
                for (key, value) in &self.params {
                    match key.as_str() {
                        "req" => {
                            if value.as_boolean().is_none() {
                                return Err(SignatureError::Validation(format!(
                                    "`req` parameter on `{}` must be a boolean",
                                    derived.as_str()
                                )));
                            }
                        }
                        other => {
                            return Err(SignatureError::Validation(format!(
                                "unexpected parameter `{other}` on `{}`, only req allowed",
                                derived.as_str()
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<sfv::Item> for ComponentIdentifier {
    type Error = SignatureError;

    fn try_from(item: sfv::Item) -> Result<Self, Self::Error> {
        let name = match item.bare_item {
            sfv::BareItem::String(inner) => inner.as_str().to_owned(),
            other => {
                return Err(SignatureError::Validation(format!(
                    "component names must be RFC 8941 strings, found {other:?}"
                )));
            }
        };

        if name.starts_with('@') {
            let derived = DerivedName::from_name(&name).ok_or_else(|| {
                SignatureError::Validation(format!(
                    "`{name}` is not a registered derived component name"
                ))
            })?;
            if derived == DerivedName::SignatureParams {
                return Err(SignatureError::Validation(
                    "`@signature-params` cannot appear as a covered component".into(),
                ));
            }
            let id = ComponentIdentifier {
                name: ComponentName::Derived(derived),
                params: item.params,
            };
            id.validate_derived_params(derived)?;
            Ok(id)
        } else {
            if name.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(SignatureError::Validation(format!(
                    "field component name `{name}` must not contain uppercase characters"
                )));
            }
            let id = ComponentIdentifier {
                name: ComponentName::Field(name),
                params: item.params,
            };
            id.validate_field_params()?;
            Ok(id)
        }
    }
}

impl PartialEq for ComponentIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .all(|(key, value)| other.params.get(key.as_str()) == Some(value))
    }
}

impl Eq for ComponentIdentifier {}

impl Hash for ComponentIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);

        // Equality ignores parameter order, so the hash must too. Each bare
        // item is hashed through its canonical serialization.
        let mut entries: Vec<(&str, String)> = self
            .params
            .iter()
            .map(|(key, value)| {
                let item = sfv::Item {
                    bare_item: value.clone(),
                    params: sfv::Parameters::new(),
                };
                (key.as_str(), item.serialize_value())
            })
            .collect();
        entries.sort_unstable();
        for (key, serialized) in entries {
            key.hash(state);
            serialized.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::hash::{DefaultHasher, Hash, Hasher};

    use super::*;

    fn hash_of(id: &ComponentIdentifier) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn parses_plain_field_component() {
        let id = ComponentIdentifier::parse("\"content-digest\"").unwrap();
        assert_eq!(id.name().as_str(), "content-digest");
        assert!(!id.is_derived());
        assert!(id.params().is_empty());
    }

    #[test]
    fn parses_derived_component_with_req() {
        let id = ComponentIdentifier::parse("\"@authority\";req").unwrap();
        assert!(id.is_derived());
        assert!(id.from_request().unwrap());
        assert_eq!(id.serialize().unwrap(), "\"@authority\";req");
    }

    #[test]
    fn rejects_uppercase_field_name() {
        assert!(ComponentIdentifier::parse("\"MyField\"").is_err());
    }

    #[test]
    fn rejects_unregistered_derived_name() {
        assert!(ComponentIdentifier::parse("\"@unknown\"").is_err());
    }

    #[test]
    fn rejects_query_param_without_name() {
        assert!(ComponentIdentifier::parse("\"@query-param\"").is_err());
    }

    #[test]
    fn rejects_signature_params_as_covered_component() {
        assert!(ComponentIdentifier::parse("\"@signature-params\"").is_err());
    }

    #[test]
    fn rejects_bs_combined_with_sf_or_key() {
        assert!(ComponentIdentifier::parse("\"my-field\";bs;sf").is_err());
        assert!(ComponentIdentifier::parse("\"my-field\";bs;key=\"x\"").is_err());
    }

    #[test]
    fn rejects_req_on_status() {
        assert!(ComponentIdentifier::parse("\"@status\";req").is_err());
    }

    #[test]
    fn rejects_token_component_name() {
        assert!(ComponentIdentifier::parse("my-field").is_err());
    }

    #[test]
    fn rejects_mistyped_parameters() {
        assert!(ComponentIdentifier::parse("\"my-field\";sf=1").is_err());
        assert!(ComponentIdentifier::parse("\"my-field\";key=token").is_err());
        assert!(ComponentIdentifier::parse("\"@query-param\";name=var").is_err());
    }

    #[test]
    fn equality_ignores_parameter_order() {
        let left = ComponentIdentifier::parse("\"my-field\";sf;key=\"a\"").unwrap();
        let right = ComponentIdentifier::parse("\"my-field\";key=\"a\";sf").unwrap();
        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
        assert_ne!(left.serialize().unwrap(), right.serialize().unwrap());
    }

    #[test]
    fn equality_distinguishes_parameter_values() {
        let left = ComponentIdentifier::parse("\"my-field\";key=\"a\"").unwrap();
        let right = ComponentIdentifier::parse("\"my-field\";key=\"b\"").unwrap();
        assert_ne!(left, right);
    }

    #[test]
    fn false_boolean_parameter_round_trips() {
        let id = ComponentIdentifier::parse("\"my-field\";sf=?0").unwrap();
        assert!(!id.wants_strict_serialization().unwrap());
        assert_eq!(id.serialize().unwrap(), "\"my-field\";sf=?0");
    }

    #[test]
    fn query_param_constructor_matches_wire_form() {
        let id = ComponentIdentifier::query_param("var").unwrap();
        assert_eq!(id.serialize().unwrap(), "\"@query-param\";name=\"var\"");
        assert_eq!(
            id,
            ComponentIdentifier::parse("\"@query-param\";name=\"var\"").unwrap()
        );
    }

    #[test]
    fn field_constructor_lowercases() {
        let id = ComponentIdentifier::field("Content-Length");
        assert_eq!(id.serialize().unwrap(), "\"content-length\"");
    }
}
