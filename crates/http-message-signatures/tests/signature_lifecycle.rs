// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! End-to-end signing and verification: field values travel over the wire
//! as strings, get re-parsed, and verify against a rebuilt context.

use http_message_signatures::{
    ComponentIdentifier, DerivedName, MessageContext, Signature, SignatureInput,
    SignatureMetadata, Signer, Verifier,
    algorithms::{JoseSigner, JoseVerifier},
    sign_message, verify_message,
};

const ED25519_PRIVATE: [u8; 32] = [
    0x9f, 0x83, 0x62, 0xf8, 0x7a, 0x48, 0x4a, 0x95, 0x4e, 0x6e, 0x74, 0x0c, 0x5b, 0x4c, 0x0e,
    0x84, 0x22, 0x91, 0x39, 0xa2, 0x0a, 0xa8, 0xab, 0x56, 0xff, 0x66, 0x58, 0x6f, 0x6a, 0x7d,
    0x29, 0xc5,
];

const ED25519_PUBLIC: [u8; 32] = [
    0x26, 0xb4, 0x0b, 0x8f, 0x93, 0xff, 0xf3, 0xd8, 0x97, 0x11, 0x2f, 0x7e, 0xbc, 0x58, 0x2b,
    0x23, 0x2d, 0xbd, 0x72, 0x51, 0x7d, 0x08, 0x2f, 0xe8, 0x3c, 0xfb, 0x30, 0xdd, 0xce, 0x43,
    0xd1, 0xbb,
];

fn request_context() -> MessageContext {
    let mut context = MessageContext::new();
    context.set_method("POST");
    context
        .set_target_uri("https://example.com/foo?param=Value&Pet=dog")
        .unwrap();
    context.add_header("Content-Type", "application/json");
    context.add_header("Content-Length", "18");
    context
}

fn request_metadata() -> SignatureMetadata {
    let mut metadata = SignatureMetadata::new();
    metadata
        .push(ComponentIdentifier::derived(DerivedName::Method))
        .unwrap();
    metadata
        .push(ComponentIdentifier::derived(DerivedName::Authority))
        .unwrap();
    metadata
        .push(ComponentIdentifier::derived(DerivedName::Path))
        .unwrap();
    metadata
        .push(ComponentIdentifier::field("content-type"))
        .unwrap();
    metadata
        .push(ComponentIdentifier::field("content-length"))
        .unwrap();
    metadata.set_keyid("test-key-ed25519").unwrap();
    metadata.set_alg("EdDSA").unwrap();
    metadata
}

#[test]
fn signed_fields_survive_the_wire_and_verify() {
    let signer = JoseSigner::ed25519_from_bytes(&ED25519_PRIVATE).unwrap();
    let context = request_context();
    let (signature_input, signature) =
        sign_message("sig1", &request_metadata(), &context, &signer).unwrap();

    // Serialize both fields, then parse them back as a receiver would.
    let received_input = SignatureInput::parse(&signature_input.serialize().unwrap()).unwrap();
    let received_signature = Signature::parse(&signature.serialize().unwrap()).unwrap();

    let verifier = JoseVerifier::ed25519_from_bytes(&ED25519_PUBLIC).unwrap();
    let verified = verify_message(
        "sig1",
        &received_input,
        &received_signature,
        &context,
        &verifier,
    )
    .unwrap();
    assert!(verified);
}

#[test]
fn any_base_perturbation_breaks_verification() {
    let signer = JoseSigner::ed25519_from_bytes(&ED25519_PRIVATE).unwrap();
    let verifier = JoseVerifier::ed25519_from_bytes(&ED25519_PUBLIC).unwrap();
    let metadata = request_metadata();
    let (signature_input, signature) =
        sign_message("sig1", &metadata, &request_context(), &signer).unwrap();

    // A non-default port sneaks into @authority.
    let mut other_port = request_context();
    other_port
        .set_target_uri("https://example.com:8443/foo?param=Value&Pet=dog")
        .unwrap();
    assert!(
        !verify_message("sig1", &signature_input, &signature, &other_port, &verifier).unwrap()
    );

    // Method case changes.
    let mut lowercase_method = request_context();
    lowercase_method.set_method("post");
    assert!(
        !verify_message(
            "sig1",
            &signature_input,
            &signature,
            &lowercase_method,
            &verifier
        )
        .unwrap()
    );

    // A covered header changes.
    let mut other_length = request_context();
    other_length.add_header("Content-Length", "19");
    assert!(
        !verify_message(
            "sig1",
            &signature_input,
            &signature,
            &other_length,
            &verifier
        )
        .unwrap()
    );
}

#[test]
fn flipped_signature_bits_do_not_verify() {
    let signer = JoseSigner::ed25519_from_bytes(&ED25519_PRIVATE).unwrap();
    let verifier = JoseVerifier::ed25519_from_bytes(&ED25519_PUBLIC).unwrap();
    let context = request_context();
    let metadata = request_metadata();
    let (signature_input, signature) =
        sign_message("sig1", &metadata, &context, &signer).unwrap();

    let original = signature.get("sig1").unwrap().to_vec();
    for bit in [0usize, 7, 250, 511] {
        let mut tampered_bytes = original.clone();
        tampered_bytes[bit / 8] ^= 1 << (bit % 8);
        let mut tampered = Signature::new();
        tampered.insert("sig1", tampered_bytes).unwrap();
        assert!(
            !verify_message("sig1", &signature_input, &tampered, &context, &verifier).unwrap()
        );
    }
}

// A fixed wire vector: parsing the two received fields, rebuilding the base
// from the observed message, and checking the signature against a known
// public key must all land byte-exactly.
#[test]
fn known_wire_vector_verifies() {
    let signature_input = SignatureInput::parse(
        "sig1=(\"@authority\");created=1735689600;keyid=\"poqkLGiymh_W0uP6PZFw-dvez3QJT5SolqXBCW38r0U\";alg=\"ed25519\";expires=1735693200;nonce=\"gubxywVx7hzbYKatLgzuKDllDAIXAkz41PydU7aOY7vT+Mb3GJNxW0qD4zJ+IOQ1NVtg+BNbTCRUMt1Ojr5BgA==\";tag=\"web-bot-auth\"",
    )
    .unwrap();
    let signature = Signature::parse(
        "sig1=:uz2SAv+VIemw+Oo890bhYh6Xf5qZdLUgv6/PbiQfCFXcX/vt1A8Pf7OcgL2yUDUYXFtffNpkEr5W6dldqFrkDg==:",
    )
    .unwrap();

    let mut context = MessageContext::new();
    context.set_target_uri("https://example.com").unwrap();

    let verifier = JoseVerifier::ed25519_from_bytes(&ED25519_PUBLIC).unwrap();
    let verified =
        verify_message("sig1", &signature_input, &signature, &context, &verifier).unwrap();
    assert!(verified);

    let metadata = signature_input.get("sig1").unwrap();
    assert_eq!(metadata.keyid().unwrap(), Some("poqkLGiymh_W0uP6PZFw-dvez3QJT5SolqXBCW38r0U"));
    assert_eq!(metadata.alg().unwrap(), Some("ed25519"));
}

#[test]
fn every_backend_round_trips_through_the_drivers() {
    use rand::rngs::OsRng;

    let context = request_context();
    let metadata = request_metadata();

    let rsa_private = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let rsa_public = rsa_private.to_public_key();
    let p256_private = p256::ecdsa::SigningKey::random(&mut OsRng);
    let k256_private = k256::ecdsa::SigningKey::random(&mut OsRng);

    let pairs: Vec<(JoseSigner, JoseVerifier)> = vec![
        (
            JoseSigner::hs256(b"shared".to_vec()),
            JoseVerifier::hs256(b"shared".to_vec()),
        ),
        (
            JoseSigner::rs256(rsa_private.clone()),
            JoseVerifier::rs256(rsa_public.clone()),
        ),
        (
            JoseSigner::ps256(rsa_private),
            JoseVerifier::ps256(rsa_public),
        ),
        (
            JoseSigner::es256(p256_private.clone()),
            JoseVerifier::es256(p256::ecdsa::VerifyingKey::from(&p256_private)),
        ),
        (
            JoseSigner::es256k(k256_private.clone()),
            JoseVerifier::es256k(k256::ecdsa::VerifyingKey::from(&k256_private)),
        ),
        (
            JoseSigner::ed25519_from_bytes(&ED25519_PRIVATE).unwrap(),
            JoseVerifier::ed25519_from_bytes(&ED25519_PUBLIC).unwrap(),
        ),
    ];

    for (signer, verifier) in &pairs {
        let mut metadata = metadata.clone();
        metadata.set_alg(signer.alg()).unwrap();
        let (signature_input, signature) =
            sign_message("sig1", &metadata, &context, signer).unwrap();
        assert!(
            verify_message("sig1", &signature_input, &signature, &context, verifier).unwrap(),
            "{} round trip failed",
            signer.alg()
        );
    }
}

#[test]
fn capabilities_are_object_safe() {
    let signer = JoseSigner::hs256(b"secret".to_vec());
    let verifier = JoseVerifier::hs256(b"secret".to_vec());
    let signer_object: &dyn Signer = &signer;
    let verifier_object: &dyn Verifier = &verifier;

    let signature = signer_object.sign(b"base").unwrap();
    assert!(verifier_object.verify(b"base", &signature).unwrap());
}
