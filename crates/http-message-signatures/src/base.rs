// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! Assembly of the signature base, the canonical byte string that is
//! actually signed and verified.
//!
//! The base is one line per covered component, `<identifier>: <value>`,
//! followed by a `"@signature-params"` line holding the serialized
//! metadata. Lines are joined with a single LF and the final line has no
//! trailing separator. Building is deterministic: the same metadata and
//! context always produce byte-identical output.

use std::fmt::Write as _;

use crate::components::ComponentIdentifier;
use crate::context::MessageContext;
use crate::error::SignatureError;
use crate::metadata::SignatureMetadata;

/// A fully resolved signature base.
#[derive(Debug, Clone)]
pub struct SignatureBase {
    lines: Vec<(ComponentIdentifier, String)>,
    params_line: String,
}

impl SignatureBase {
    /// Resolve every covered component against `context` and assemble the
    /// base.
    ///
    /// A derived component with no resolvable value fails the build; a
    /// normal field that is absent from its pool contributes an empty
    /// value.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable derived components and on any resolution error
    /// surfaced by the context.
    pub fn build(
        metadata: &SignatureMetadata,
        context: &MessageContext,
    ) -> Result<Self, SignatureError> {
        let mut lines = Vec::with_capacity(metadata.components().len());
        for component in metadata.components() {
            let value = match context.resolve(component)? {
                Some(value) => value,
                None if component.is_derived() => {
                    return Err(SignatureError::BaseConstruction(format!(
                        "no value for derived component `{}`",
                        component.name().as_str()
                    )));
                }
                None => String::new(),
            };
            lines.push((component.clone(), value));
        }

        Ok(SignatureBase {
            lines,
            params_line: metadata.serialize()?,
        })
    }

    /// The serialized metadata carried on the final base line. This is the
    /// member value to place in the `Signature-Input` field.
    pub fn signature_params(&self) -> &str {
        &self.params_line
    }

    /// The component lines, in coverage order.
    pub fn lines(&self) -> impl Iterator<Item = (&ComponentIdentifier, &str)> {
        self.lines
            .iter()
            .map(|(component, value)| (component, value.as_str()))
    }

    /// The canonical string form of the base. Its UTF-8 bytes are what the
    /// signer and verifier capabilities consume.
    ///
    /// # Errors
    ///
    /// Fails if any resolved value pushed the base outside ASCII.
    pub fn serialize(&self) -> Result<String, SignatureError> {
        let mut output = String::new();
        for (component, value) in &self.lines {
            let identifier = component.serialize()?;
            let _ = writeln!(output, "{identifier}: {value}");
        }
        let _ = write!(output, "\"@signature-params\": {}", self.params_line);

        if !output.is_ascii() {
            return Err(SignatureError::BaseConstruction(
                "signature base contains non-ASCII characters".into(),
            ));
        }
        Ok(output)
    }
}
