// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! # http-message-signatures library
//!
//! `http-message-signatures` is a Rust implementation of HTTP Message
//! Signatures as defined in
//! [RFC 9421](https://datatracker.ietf.org/doc/html/rfc9421), built on the
//! structured field values of
//! [RFC 8941](https://datatracker.ietf.org/doc/html/rfc8941).
//!
//! ## Features
//!
//! - **Signature bases**: deterministic, byte-exact canonicalization of
//!   covered message components, including the `sf`, `key`, `bs`, `req` and
//!   `tr` parameters and the full set of derived components
//! - **Wire fields**: parsers and serializers for the `Signature-Input` and
//!   `Signature` field values
//! - **Pluggable cryptography**: signing and verification are two
//!   byte-oriented capabilities, with reference backends for the common
//!   JOSE algorithms in [`algorithms`]
//!
//! ## Signing
//!
//! ```
//! use http_message_signatures::{
//!     ComponentIdentifier, DerivedName, MessageContext, SignatureMetadata,
//!     algorithms::JoseSigner, sign_message,
//! };
//!
//! let mut context = MessageContext::new();
//! context.set_method("GET");
//! context.set_target_uri("https://example.com/data")?;
//!
//! let mut metadata = SignatureMetadata::new();
//! metadata.push(ComponentIdentifier::derived(DerivedName::Method))?;
//! metadata.push(ComponentIdentifier::derived(DerivedName::Authority))?;
//! metadata.set_keyid("test-key")?;
//!
//! let signer = JoseSigner::hs256(b"a-shared-secret".to_vec());
//! let (signature_input, signature) = sign_message("sig1", &metadata, &context, &signer)?;
//!
//! // Transmit both serialized values as HTTP fields.
//! let _ = signature_input.serialize()?;
//! let _ = signature.serialize()?;
//! # Ok::<(), http_message_signatures::SignatureError>(())
//! ```
//!
//! Verification mirrors signing: parse the two received field values,
//! rebuild the base from the observed message, and hand both byte strings
//! to a [`Verifier`].

pub mod algorithms;
pub mod base;
pub mod components;
pub mod context;
pub mod error;
pub mod fields;
pub mod metadata;

pub use base::SignatureBase;
pub use components::{ComponentIdentifier, ComponentName, DerivedName};
pub use context::{MessageContext, StructuredFieldType};
pub use error::SignatureError;
pub use fields::{Signature, SignatureInput};
pub use metadata::SignatureMetadata;

/// The signing capability. Implementations hold their own key material and
/// algorithm; the signature base reaches them as an opaque byte string.
pub trait Signer {
    /// Produce signature bytes over the signature base.
    ///
    /// # Errors
    ///
    /// Returns a crypto error when the backend rejects the operation.
    fn sign(&self, signature_base: &[u8]) -> Result<Vec<u8>, SignatureError>;
}

/// The verification capability, mirroring [`Signer`].
pub trait Verifier {
    /// Check signature bytes against the signature base. `Ok(false)` means
    /// the signature is well-formed but does not match.
    ///
    /// # Errors
    ///
    /// Returns a crypto error when the backend cannot process the input at
    /// all, such as a signature of impossible length.
    fn verify(&self, signature_base: &[u8], signature: &[u8]) -> Result<bool, SignatureError>;
}

/// Sign one message: build the signature base from `metadata` and
/// `context`, sign it, and return the pair of single-member field values
/// ready for serialization under `label`.
///
/// # Errors
///
/// Returns base-construction errors from the build and crypto errors from
/// the signer.
pub fn sign_message(
    label: &str,
    metadata: &SignatureMetadata,
    context: &MessageContext,
    signer: &impl Signer,
) -> Result<(SignatureInput, Signature), SignatureError> {
    let base = SignatureBase::build(metadata, context)?;
    let signature_bytes = signer.sign(base.serialize()?.as_bytes())?;

    let mut signature_input = SignatureInput::new();
    signature_input.insert(label, metadata.clone())?;
    let mut signature = Signature::new();
    signature.insert(label, signature_bytes)?;
    Ok((signature_input, signature))
}

/// Verify the signature under `label`: recover its metadata from
/// `signature_input`, rebuild the base from `context`, and check the
/// signature bytes.
///
/// # Errors
///
/// Fails with a validation error when `label` is missing from either field,
/// with base-construction errors when the base cannot be rebuilt, and with
/// crypto errors from the verifier.
pub fn verify_message(
    label: &str,
    signature_input: &SignatureInput,
    signature: &Signature,
    context: &MessageContext,
    verifier: &impl Verifier,
) -> Result<bool, SignatureError> {
    let metadata = signature_input.get(label).ok_or_else(|| {
        SignatureError::Validation(format!("`Signature-Input` has no member labeled `{label}`"))
    })?;
    let signature_bytes = signature.get(label).ok_or_else(|| {
        SignatureError::Validation(format!("`Signature` has no member labeled `{label}`"))
    })?;

    let base = SignatureBase::build(metadata, context)?;
    verifier.verify(base.serialize()?.as_bytes(), signature_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{JoseSigner, JoseVerifier};

    fn context() -> MessageContext {
        let mut context = MessageContext::new();
        context.set_method("GET");
        context.set_target_uri("https://example.com/data").unwrap();
        context
    }

    fn metadata() -> SignatureMetadata {
        let mut metadata = SignatureMetadata::new();
        metadata
            .push(ComponentIdentifier::derived(DerivedName::Method))
            .unwrap();
        metadata
            .push(ComponentIdentifier::derived(DerivedName::Authority))
            .unwrap();
        metadata.set_keyid("test-shared-secret").unwrap();
        metadata
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let secret = b"correct horse battery staple".to_vec();
        let (signature_input, signature) = sign_message(
            "sig1",
            &metadata(),
            &context(),
            &JoseSigner::hs256(secret.clone()),
        )
        .unwrap();

        let verified = verify_message(
            "sig1",
            &signature_input,
            &signature,
            &context(),
            &JoseVerifier::hs256(secret),
        )
        .unwrap();
        assert!(verified);
    }

    #[test]
    fn verification_fails_against_a_changed_message() {
        let secret = b"correct horse battery staple".to_vec();
        let (signature_input, signature) = sign_message(
            "sig1",
            &metadata(),
            &context(),
            &JoseSigner::hs256(secret.clone()),
        )
        .unwrap();

        let mut tampered = MessageContext::new();
        tampered.set_method("GET");
        tampered.set_target_uri("https://example.com:8443/data").unwrap();
        let verified = verify_message(
            "sig1",
            &signature_input,
            &signature,
            &tampered,
            &JoseVerifier::hs256(secret),
        )
        .unwrap();
        assert!(!verified);
    }

    #[test]
    fn missing_labels_are_validation_errors() {
        let secret = b"secret".to_vec();
        let (signature_input, signature) =
            sign_message("sig1", &metadata(), &context(), &JoseSigner::hs256(secret.clone()))
                .unwrap();

        assert!(
            verify_message(
                "sig2",
                &signature_input,
                &signature,
                &context(),
                &JoseVerifier::hs256(secret),
            )
            .is_err()
        );
    }
}
