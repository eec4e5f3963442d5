// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! Codecs for the two wire fields defined by RFC 9421.
//!
//! `Signature-Input` is an RFC 8941 dictionary whose member values are inner
//! lists of component identifiers carrying the signature parameters;
//! `Signature` is a dictionary whose member values are byte sequences. The
//! dictionary key, called the label, ties one metadata block to one
//! signature. Both types preserve member insertion order, so a parsed field
//! serializes back byte-identically up to inter-member whitespace.

use indexmap::IndexMap;
use sfv::SerializeValue;

use crate::error::SignatureError;
use crate::metadata::SignatureMetadata;

/// The parsed value of a `Signature-Input` field: label to metadata, in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct SignatureInput {
    members: IndexMap<sfv::Key, SignatureMetadata>,
}

impl SignatureInput {
    /// An empty field value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a labeled metadata block, replacing any previous block under
    /// the same label.
    ///
    /// # Errors
    ///
    /// Fails if `label` is not a valid RFC 8941 key.
    pub fn insert(
        &mut self,
        label: &str,
        metadata: SignatureMetadata,
    ) -> Result<(), SignatureError> {
        self.members
            .insert(sfv::KeyRef::from_str(label)?.to_owned(), metadata);
        Ok(())
    }

    /// The metadata block under `label`, if present.
    pub fn get(&self, label: &str) -> Option<&SignatureMetadata> {
        self.members.get(label)
    }

    /// The labels, in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|k| k.as_str())
    }

    /// The members, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SignatureMetadata)> {
        self.members
            .iter()
            .map(|(label, metadata)| (label.as_str(), metadata))
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the field has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Parse a `Signature-Input` field value.
    ///
    /// # Errors
    ///
    /// Fails on RFC 8941 syntax errors, on members that are not inner
    /// lists, and on any component or parameter validation failure.
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let dictionary = sfv::Parser::new(input).parse_dictionary()?;
        let mut members = IndexMap::with_capacity(dictionary.len());
        for (label, entry) in dictionary {
            let inner = match entry {
                sfv::ListEntry::InnerList(inner) => inner,
                sfv::ListEntry::Item(_) => {
                    return Err(SignatureError::Validation(format!(
                        "`Signature-Input` member `{}` must be an inner list",
                        label.as_str()
                    )));
                }
            };
            members.insert(label, SignatureMetadata::try_from(inner)?);
        }
        Ok(SignatureInput { members })
    }

    /// The wire form of this field value.
    ///
    /// # Errors
    ///
    /// Fails on an empty field, which RFC 8941 cannot represent.
    pub fn serialize(&self) -> Result<String, SignatureError> {
        let mut dictionary = sfv::Dictionary::with_capacity(self.members.len());
        for (label, metadata) in &self.members {
            dictionary.insert(
                label.clone(),
                sfv::ListEntry::InnerList(metadata.to_inner_list()?),
            );
        }
        dictionary.serialize_value().ok_or_else(|| {
            SignatureError::InvalidArgument(
                "cannot serialize an empty `Signature-Input` field".into(),
            )
        })
    }
}

/// The parsed value of a `Signature` field: label to signature bytes, in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    members: IndexMap<sfv::Key, Vec<u8>>,
}

impl Signature {
    /// An empty field value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert labeled signature bytes, replacing any previous bytes under
    /// the same label.
    ///
    /// # Errors
    ///
    /// Fails if `label` is not a valid RFC 8941 key.
    pub fn insert(&mut self, label: &str, signature: Vec<u8>) -> Result<(), SignatureError> {
        self.members
            .insert(sfv::KeyRef::from_str(label)?.to_owned(), signature);
        Ok(())
    }

    /// The signature bytes under `label`, if present.
    pub fn get(&self, label: &str) -> Option<&[u8]> {
        self.members.get(label).map(Vec::as_slice)
    }

    /// The labels, in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|k| k.as_str())
    }

    /// The members, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.members
            .iter()
            .map(|(label, signature)| (label.as_str(), signature.as_slice()))
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the field has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Parse a `Signature` field value.
    ///
    /// # Errors
    ///
    /// Fails on RFC 8941 syntax errors and on members that are anything but
    /// a bare byte-sequence item.
    pub fn parse(input: &str) -> Result<Self, SignatureError> {
        let dictionary = sfv::Parser::new(input).parse_dictionary()?;
        let mut members = IndexMap::with_capacity(dictionary.len());
        for (label, entry) in dictionary {
            let bytes = match entry {
                sfv::ListEntry::Item(sfv::Item {
                    bare_item: sfv::BareItem::ByteSequence(bytes),
                    params,
                }) if params.is_empty() => bytes,
                _ => {
                    return Err(SignatureError::Validation(format!(
                        "`Signature` member `{}` must be a bare byte sequence",
                        label.as_str()
                    )));
                }
            };
            members.insert(label, bytes);
        }
        Ok(Signature { members })
    }

    /// The wire form of this field value.
    ///
    /// # Errors
    ///
    /// Fails on an empty field, which RFC 8941 cannot represent.
    pub fn serialize(&self) -> Result<String, SignatureError> {
        let mut dictionary = sfv::Dictionary::with_capacity(self.members.len());
        for (label, signature) in &self.members {
            dictionary.insert(
                label.clone(),
                sfv::ListEntry::Item(sfv::Item {
                    bare_item: sfv::BareItem::ByteSequence(signature.clone()),
                    params: sfv::Parameters::new(),
                }),
            );
        }
        dictionary.serialize_value().ok_or_else(|| {
            SignatureError::InvalidArgument("cannot serialize an empty `Signature` field".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INPUT: &str = "sig1=(\"@method\" \"@authority\" \"content-digest\");created=1618884475;keyid=\"test-key-rsa-pss\";alg=\"rsa-pss-sha512\"";

    #[test]
    fn signature_input_round_trips() {
        let parsed = SignatureInput::parse(INPUT).unwrap();
        assert_eq!(parsed.serialize().unwrap(), INPUT);
    }

    #[test]
    fn signature_input_preserves_member_order() {
        let two = "sig1=(\"@method\");created=1618884475, sig2=(\"@authority\");created=1618884480";
        let parsed = SignatureInput::parse(two).unwrap();
        let labels: Vec<&str> = parsed.labels().collect();
        assert_eq!(labels, ["sig1", "sig2"]);
        assert_eq!(parsed.serialize().unwrap(), two);
    }

    #[test]
    fn signature_input_rejects_item_members() {
        assert!(SignatureInput::parse("sig1=\"@method\"").is_err());
    }

    #[test]
    fn signature_input_rejects_invalid_components() {
        assert!(SignatureInput::parse("sig1=(\"MyField\")").is_err());
        assert!(SignatureInput::parse("sig1=(\"@unknown\")").is_err());
        assert!(SignatureInput::parse("sig1=(\"@method\" \"@method\")").is_err());
    }

    #[test]
    fn signature_round_trips() {
        let input = "sig1=:dGhpcyBpcyBub3QgYSByZWFsIHNpZ25hdHVyZQ==:";
        let parsed = Signature::parse(input).unwrap();
        assert_eq!(
            parsed.get("sig1").unwrap(),
            b"this is not a real signature"
        );
        assert_eq!(parsed.serialize().unwrap(), input);
    }

    #[test]
    fn signature_rejects_non_byte_sequence_members() {
        assert!(Signature::parse("sig1=\"not bytes\"").is_err());
        assert!(Signature::parse("sig1=(:AAAA:)").is_err());
        assert!(Signature::parse("sig1=:AAAA:;x=1").is_err());
    }

    #[test]
    fn empty_fields_do_not_serialize() {
        assert!(SignatureInput::new().serialize().is_err());
        assert!(Signature::new().serialize().is_err());
    }

    #[test]
    fn labels_agree_across_fields_by_construction() {
        let mut signature_input = SignatureInput::new();
        signature_input
            .insert("sig1", SignatureMetadata::new())
            .unwrap();
        let mut signature = Signature::new();
        signature.insert("sig1", vec![1, 2, 3]).unwrap();

        assert!(signature_input.get("sig1").is_some());
        assert!(signature.get("sig1").is_some());
        assert!(signature.get("sig2").is_none());
    }
}
