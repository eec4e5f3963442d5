// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! The message context: everything a signature base needs to know about an
//! HTTP exchange.
//!
//! A context bundles the request method and target URI, an optional
//! request-target override, an optional response status, and four field
//! pools: headers and trailers of the message being signed, plus headers and
//! trailers of the associated request for components carrying the `req`
//! flag. Field names are looked up case-insensitively while values keep
//! their arrival order.
//!
//! A context is assembled through the setters, then read concurrently as
//! often as needed; resolution never mutates.

use std::collections::HashMap;

use http::Uri;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sfv::SerializeValue;

use crate::components::{ComponentIdentifier, ComponentName, DerivedName};
use crate::error::SignatureError;

/// Everything except RFC 3986 unreserved characters is percent-encoded, so
/// a decoded space always re-encodes as `%20` and never as `+`.
const QUERY_PARAM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The RFC 8941 top-level types a structured field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFieldType {
    /// An RFC 8941 list.
    List,
    /// An RFC 8941 dictionary.
    Dictionary,
    /// A single RFC 8941 item.
    Item,
}

/// Structured types of the IANA-registered structured fields, consulted
/// when a component carries the `sf` parameter and the caller has not
/// classified the field itself.
fn registered_field_type(name: &str) -> Option<StructuredFieldType> {
    let ty = match name {
        "accept-ch" => StructuredFieldType::List,
        "cache-status" => StructuredFieldType::List,
        "cdn-cache-control" => StructuredFieldType::Dictionary,
        "client-cert" => StructuredFieldType::Item,
        "client-cert-chain" => StructuredFieldType::List,
        "content-digest" => StructuredFieldType::Dictionary,
        "cross-origin-embedder-policy" => StructuredFieldType::Item,
        "cross-origin-embedder-policy-report-only" => StructuredFieldType::Item,
        "cross-origin-opener-policy" => StructuredFieldType::Item,
        "cross-origin-opener-policy-report-only" => StructuredFieldType::Item,
        "origin-agent-cluster" => StructuredFieldType::Item,
        "priority" => StructuredFieldType::Dictionary,
        "proxy-status" => StructuredFieldType::List,
        "repr-digest" => StructuredFieldType::Dictionary,
        "signature" => StructuredFieldType::Dictionary,
        "signature-input" => StructuredFieldType::Dictionary,
        "want-content-digest" => StructuredFieldType::Dictionary,
        "want-repr-digest" => StructuredFieldType::Dictionary,
        _ => return None,
    };
    Some(ty)
}

/// An insertion-ordered pool of HTTP fields with case-insensitive name
/// lookup. The original spelling of each name is retained.
#[derive(Debug, Clone, Default)]
struct FieldPool {
    entries: Vec<(String, String)>,
}

impl FieldPool {
    fn append(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_owned(), value.to_owned()));
    }

    fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(stored, _)| stored.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
struct TargetUri {
    raw: String,
    parsed: Uri,
}

/// The data sources from which component values are resolved.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    method: Option<String>,
    target_uri: Option<TargetUri>,
    request_target: Option<String>,
    status: Option<u16>,
    headers: FieldPool,
    trailers: FieldPool,
    request_headers: FieldPool,
    request_trailers: FieldPool,
    field_types: HashMap<String, StructuredFieldType>,
}

impl MessageContext {
    /// A context with nothing set. Every component resolves to absent until
    /// the corresponding setter runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request method, exactly as it appears on the request line.
    pub fn set_method(&mut self, method: &str) {
        self.method = Some(method.to_owned());
    }

    /// Set the target URI of the request.
    ///
    /// # Errors
    ///
    /// Fails if `uri` is not parseable URI syntax.
    pub fn set_target_uri(&mut self, uri: &str) -> Result<(), SignatureError> {
        let parsed: Uri = uri
            .parse()
            .map_err(|e| SignatureError::InvalidArgument(format!("invalid target URI: {e}")))?;
        self.target_uri = Some(TargetUri {
            raw: uri.to_owned(),
            parsed,
        });
        Ok(())
    }

    /// Set the request target exactly as sent on the request line. It is
    /// never derived from the target URI.
    pub fn set_request_target(&mut self, request_target: &str) {
        self.request_target = Some(request_target.to_owned());
    }

    /// Set the response status code.
    ///
    /// # Errors
    ///
    /// Fails for codes outside 100-999, which cannot appear on a status
    /// line.
    pub fn set_status(&mut self, status: u16) -> Result<(), SignatureError> {
        if !(100..=999).contains(&status) {
            return Err(SignatureError::InvalidArgument(format!(
                "status code {status} is not three digits"
            )));
        }
        self.status = Some(status);
        Ok(())
    }

    /// Append a header field of the message being signed.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    /// Append a trailer field of the message being signed.
    pub fn add_trailer(&mut self, name: &str, value: &str) {
        self.trailers.append(name, value);
    }

    /// Append a header field of the associated request, consulted by
    /// components carrying the `req` flag.
    pub fn add_request_header(&mut self, name: &str, value: &str) {
        self.request_headers.append(name, value);
    }

    /// Append a trailer field of the associated request.
    pub fn add_request_trailer(&mut self, name: &str, value: &str) {
        self.request_trailers.append(name, value);
    }

    /// Declare the RFC 8941 type of a field for `sf` re-serialization,
    /// overriding the built-in registry.
    pub fn set_field_type(&mut self, name: &str, ty: StructuredFieldType) {
        self.field_types.insert(name.to_ascii_lowercase(), ty);
    }

    /// Compute the value of a covered component, or `None` when the message
    /// carries no such component.
    ///
    /// # Errors
    ///
    /// Fails when a `key` lookup cannot be satisfied, when `sf` is applied
    /// to a field of unknown or unparseable structured type, or when the
    /// identifier's parameters are malformed.
    pub fn resolve(&self, id: &ComponentIdentifier) -> Result<Option<String>, SignatureError> {
        match id.name() {
            ComponentName::Derived(derived) => self.resolve_derived(*derived, id),
            ComponentName::Field(name) => self.resolve_field(name, id),
        }
    }

    fn resolve_derived(
        &self,
        name: DerivedName,
        id: &ComponentIdentifier,
    ) -> Result<Option<String>, SignatureError> {
        let value = match name {
            DerivedName::Method => self.method.clone(),
            DerivedName::TargetUri => self.target_uri.as_ref().map(|uri| uri.raw.clone()),
            DerivedName::Authority => self.authority(),
            DerivedName::Scheme => self
                .target_uri
                .as_ref()
                .and_then(|uri| uri.parsed.scheme_str())
                .map(str::to_ascii_lowercase),
            DerivedName::Path => self.target_uri.as_ref().map(|uri| {
                let path = uri.parsed.path();
                if path.is_empty() {
                    "/".to_owned()
                } else {
                    path.to_owned()
                }
            }),
            DerivedName::Query => self
                .target_uri
                .as_ref()
                .map(|uri| match uri.parsed.query() {
                    Some(query) => format!("?{query}"),
                    None => "?".to_owned(),
                }),
            DerivedName::QueryParam => return self.query_param_value(id),
            DerivedName::RequestTarget => self.request_target.clone(),
            DerivedName::Status => self.status.map(|status| status.to_string()),
            DerivedName::SignatureParams => {
                return Err(SignatureError::Validation(
                    "`@signature-params` has no component value".into(),
                ));
            }
        };
        Ok(value)
    }

    fn authority(&self) -> Option<String> {
        let uri = &self.target_uri.as_ref()?.parsed;
        let authority = uri.authority()?;

        let mut out = String::new();
        // Userinfo keeps its case; only the host is lowercased.
        if let Some(at) = authority.as_str().rfind('@') {
            out.push_str(&authority.as_str()[..=at]);
        }
        out.push_str(&authority.host().to_ascii_lowercase());
        if let Some(port) = authority.port_u16() {
            let default = match uri.scheme_str() {
                Some(scheme) if scheme.eq_ignore_ascii_case("http") => Some(80),
                Some(scheme) if scheme.eq_ignore_ascii_case("https") => Some(443),
                _ => None,
            };
            if default != Some(port) {
                out.push(':');
                out.push_str(&port.to_string());
            }
        }
        Some(out)
    }

    fn query_param_value(
        &self,
        id: &ComponentIdentifier,
    ) -> Result<Option<String>, SignatureError> {
        let wanted = id.query_param_name()?.ok_or_else(|| {
            SignatureError::Validation("`@query-param` requires a `name` parameter".into())
        })?;
        let Some(target_uri) = self.target_uri.as_ref() else {
            return Ok(None);
        };
        let Some(query) = target_uri.parsed.query() else {
            return Ok(None);
        };

        // Decode form-style (`+` becomes a space), then re-encode both
        // sides. The last occurrence of a repeated name wins.
        let mut found = None;
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            if utf8_percent_encode(&name, QUERY_PARAM_ENCODE_SET).to_string() == wanted {
                found = Some(utf8_percent_encode(&value, QUERY_PARAM_ENCODE_SET).to_string());
            }
        }
        Ok(found)
    }

    fn resolve_field(
        &self,
        name: &str,
        id: &ComponentIdentifier,
    ) -> Result<Option<String>, SignatureError> {
        let pool = match (id.from_request()?, id.from_trailer()?) {
            (false, false) => &self.headers,
            (false, true) => &self.trailers,
            (true, false) => &self.request_headers,
            (true, true) => &self.request_trailers,
        };

        let mut values: Vec<String> = pool.values(name).map(canonicalize_field_value).collect();
        if values.is_empty() {
            if let Some(member) = id.key_member()? {
                return Err(SignatureError::BaseConstruction(format!(
                    "cannot resolve member `{member}`: field `{name}` is missing"
                )));
            }
            return Ok(None);
        }

        if id.wants_byte_wrapping()? {
            values = values
                .into_iter()
                .map(|value| {
                    sfv::Item {
                        bare_item: sfv::BareItem::ByteSequence(value.into_bytes()),
                        params: sfv::Parameters::new(),
                    }
                    .serialize_value()
                })
                .collect();
        }
        let joined = values.join(", ");

        if let Some(member) = id.key_member()? {
            return self.dictionary_member(name, &joined, member).map(Some);
        }
        if id.wants_strict_serialization()? {
            return self.strict_reserialize(name, &joined).map(Some);
        }
        Ok(Some(joined))
    }

    fn dictionary_member(
        &self,
        field: &str,
        joined: &str,
        member: &str,
    ) -> Result<String, SignatureError> {
        let dictionary = sfv::Parser::new(joined).parse_dictionary().map_err(|e| {
            SignatureError::BaseConstruction(format!(
                "field `{field}` is not a valid dictionary: {e}"
            ))
        })?;
        match dictionary.get(member) {
            Some(sfv::ListEntry::Item(item)) => Ok(item.serialize_value()),
            Some(sfv::ListEntry::InnerList(inner)) => {
                vec![sfv::ListEntry::InnerList(inner.clone())]
                    .serialize_value()
                    .ok_or_else(|| {
                        SignatureError::BaseConstruction(format!(
                            "member `{member}` of field `{field}` failed to serialize"
                        ))
                    })
            }
            None => Err(SignatureError::BaseConstruction(format!(
                "dictionary field `{field}` has no member `{member}`"
            ))),
        }
    }

    fn strict_reserialize(&self, field: &str, joined: &str) -> Result<String, SignatureError> {
        let ty = self
            .field_types
            .get(field)
            .copied()
            .or_else(|| registered_field_type(field))
            .ok_or_else(|| {
                SignatureError::BaseConstruction(format!(
                    "no structured type known for field `{field}`"
                ))
            })?;

        match ty {
            StructuredFieldType::Item => Ok(sfv::Parser::new(joined)
                .parse_item()
                .map_err(|e| strict_parse_error(field, "item", e))?
                .serialize_value()),
            StructuredFieldType::List => sfv::Parser::new(joined)
                .parse_list()
                .map_err(|e| strict_parse_error(field, "list", e))?
                .serialize_value()
                .ok_or_else(|| empty_strict_value(field)),
            StructuredFieldType::Dictionary => sfv::Parser::new(joined)
                .parse_dictionary()
                .map_err(|e| strict_parse_error(field, "dictionary", e))?
                .serialize_value()
                .ok_or_else(|| empty_strict_value(field)),
        }
    }
}

fn strict_parse_error(field: &str, ty: &str, e: sfv::Error) -> SignatureError {
    SignatureError::BaseConstruction(format!("field `{field}` is not a valid {ty}: {e}"))
}

fn empty_strict_value(field: &str) -> SignatureError {
    SignatureError::BaseConstruction(format!(
        "field `{field}` is empty and has no strict serialization"
    ))
}

/// Strip surrounding whitespace and collapse obsolete line folding, turning
/// each `OWS CRLF RWS` run into a single space.
fn canonicalize_field_value(raw: &str) -> String {
    let trimmed = raw.trim_matches([' ', '\t']);
    if !trimmed.contains("\r\n") {
        return trimmed.to_owned();
    }
    trimmed
        .split("\r\n")
        .map(|segment| segment.trim_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join(" ")
}
