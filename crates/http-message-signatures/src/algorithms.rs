// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

//! Reference signing and verification backends for the JOSE algorithms
//! commonly used with HTTP message signatures: HS256, RS256, PS256, ES256,
//! ES256K and EdDSA (Ed25519).
//!
//! These are collaborators, not part of the canonicalization core: the core
//! only ever sees the [`Signer`] and [`Verifier`] capabilities, so any other
//! backend can stand in. ECDSA signatures use the fixed-width `r || s`
//! encoding; HMAC verification compares in constant time.

use sha2::Sha256;

use crate::error::SignatureError;
use crate::{Signer, Verifier};

type HmacSha256 = hmac::Hmac<Sha256>;

/// A signing backend bound to one algorithm and one private key.
pub enum JoseSigner {
    /// HMAC with SHA-256 over a shared secret.
    Hs256 {
        /// The shared secret.
        key: Vec<u8>,
    },
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256(rsa::pkcs1v15::SigningKey<Sha256>),
    /// RSASSA-PSS with SHA-256.
    Ps256(rsa::pss::BlindedSigningKey<Sha256>),
    /// ECDSA over P-256 with SHA-256.
    Es256(p256::ecdsa::SigningKey),
    /// ECDSA over secp256k1 with SHA-256.
    Es256k(k256::ecdsa::SigningKey),
    /// Ed25519.
    Ed25519(ed25519_dalek::SigningKey),
}

impl JoseSigner {
    /// An HS256 signer over a shared secret.
    pub fn hs256(key: impl Into<Vec<u8>>) -> Self {
        JoseSigner::Hs256 { key: key.into() }
    }

    /// An RS256 signer over an RSA private key.
    pub fn rs256(key: rsa::RsaPrivateKey) -> Self {
        JoseSigner::Rs256(rsa::pkcs1v15::SigningKey::new(key))
    }

    /// A PS256 signer over an RSA private key. Signing is randomized, so
    /// repeated signatures over the same base differ while all verifying.
    pub fn ps256(key: rsa::RsaPrivateKey) -> Self {
        JoseSigner::Ps256(rsa::pss::BlindedSigningKey::new(key))
    }

    /// An ES256 signer over a P-256 private key.
    pub fn es256(key: p256::ecdsa::SigningKey) -> Self {
        JoseSigner::Es256(key)
    }

    /// An ES256K signer over a secp256k1 private key.
    pub fn es256k(key: k256::ecdsa::SigningKey) -> Self {
        JoseSigner::Es256k(key)
    }

    /// An EdDSA signer over an Ed25519 private key.
    pub fn ed25519(key: ed25519_dalek::SigningKey) -> Self {
        JoseSigner::Ed25519(key)
    }

    /// An EdDSA signer from raw private key bytes.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not a valid Ed25519 secret key.
    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let key = ed25519_dalek::SigningKey::try_from(bytes)
            .map_err(|_| SignatureError::Crypto("invalid Ed25519 private key length".into()))?;
        Ok(JoseSigner::Ed25519(key))
    }

    /// The JOSE name of this signer's algorithm, suitable for the `alg`
    /// signature parameter.
    pub fn alg(&self) -> &'static str {
        match self {
            JoseSigner::Hs256 { .. } => "HS256",
            JoseSigner::Rs256(_) => "RS256",
            JoseSigner::Ps256(_) => "PS256",
            JoseSigner::Es256(_) => "ES256",
            JoseSigner::Es256k(_) => "ES256K",
            JoseSigner::Ed25519(_) => "EdDSA",
        }
    }
}

impl Signer for JoseSigner {
    fn sign(&self, signature_base: &[u8]) -> Result<Vec<u8>, SignatureError> {
        match self {
            JoseSigner::Hs256 { key } => {
                use hmac::Mac;
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|_| SignatureError::Crypto("HMAC rejected the key".into()))?;
                mac.update(signature_base);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            JoseSigner::Rs256(key) => {
                use rsa::signature::{SignatureEncoding, Signer};
                Ok(key.sign(signature_base).to_vec())
            }
            JoseSigner::Ps256(key) => {
                use rsa::signature::{RandomizedSigner, SignatureEncoding};
                let signature = key.sign_with_rng(&mut rand::rngs::OsRng, signature_base);
                Ok(signature.to_vec())
            }
            JoseSigner::Es256(key) => {
                use p256::ecdsa::{Signature, signature::Signer};
                let signature: Signature = key.sign(signature_base);
                Ok(signature.to_bytes().to_vec())
            }
            JoseSigner::Es256k(key) => {
                use k256::ecdsa::{Signature, signature::Signer};
                let signature: Signature = key.sign(signature_base);
                Ok(signature.to_bytes().to_vec())
            }
            JoseSigner::Ed25519(key) => {
                use ed25519_dalek::Signer;
                Ok(key.sign(signature_base).to_vec())
            }
        }
    }
}

/// A verification backend bound to one algorithm and one public key (or,
/// for HS256, the shared secret).
pub enum JoseVerifier {
    /// HMAC with SHA-256 over a shared secret.
    Hs256 {
        /// The shared secret.
        key: Vec<u8>,
    },
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256(rsa::pkcs1v15::VerifyingKey<Sha256>),
    /// RSASSA-PSS with SHA-256.
    Ps256(rsa::pss::VerifyingKey<Sha256>),
    /// ECDSA over P-256 with SHA-256.
    Es256(p256::ecdsa::VerifyingKey),
    /// ECDSA over secp256k1 with SHA-256.
    Es256k(k256::ecdsa::VerifyingKey),
    /// Ed25519.
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl JoseVerifier {
    /// An HS256 verifier over a shared secret.
    pub fn hs256(key: impl Into<Vec<u8>>) -> Self {
        JoseVerifier::Hs256 { key: key.into() }
    }

    /// An RS256 verifier over an RSA public key.
    pub fn rs256(key: rsa::RsaPublicKey) -> Self {
        JoseVerifier::Rs256(rsa::pkcs1v15::VerifyingKey::new(key))
    }

    /// A PS256 verifier over an RSA public key.
    pub fn ps256(key: rsa::RsaPublicKey) -> Self {
        JoseVerifier::Ps256(rsa::pss::VerifyingKey::new(key))
    }

    /// An ES256 verifier over a P-256 public key.
    pub fn es256(key: p256::ecdsa::VerifyingKey) -> Self {
        JoseVerifier::Es256(key)
    }

    /// An ES256 verifier from a SEC1-encoded public key.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not a valid SEC1 encoding of a P-256 point.
    pub fn es256_from_sec1(bytes: &[u8]) -> Result<Self, SignatureError> {
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| SignatureError::Crypto("invalid P-256 public key".into()))?;
        Ok(JoseVerifier::Es256(key))
    }

    /// An ES256K verifier over a secp256k1 public key.
    pub fn es256k(key: k256::ecdsa::VerifyingKey) -> Self {
        JoseVerifier::Es256k(key)
    }

    /// An EdDSA verifier over an Ed25519 public key.
    pub fn ed25519(key: ed25519_dalek::VerifyingKey) -> Self {
        JoseVerifier::Ed25519(key)
    }

    /// An EdDSA verifier from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not a valid Ed25519 public key.
    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let key = ed25519_dalek::VerifyingKey::try_from(bytes)
            .map_err(|_| SignatureError::Crypto("invalid Ed25519 public key".into()))?;
        Ok(JoseVerifier::Ed25519(key))
    }

    /// The JOSE name of this verifier's algorithm.
    pub fn alg(&self) -> &'static str {
        match self {
            JoseVerifier::Hs256 { .. } => "HS256",
            JoseVerifier::Rs256(_) => "RS256",
            JoseVerifier::Ps256(_) => "PS256",
            JoseVerifier::Es256(_) => "ES256",
            JoseVerifier::Es256k(_) => "ES256K",
            JoseVerifier::Ed25519(_) => "EdDSA",
        }
    }
}

impl Verifier for JoseVerifier {
    fn verify(&self, signature_base: &[u8], signature: &[u8]) -> Result<bool, SignatureError> {
        match self {
            JoseVerifier::Hs256 { key } => {
                use hmac::Mac;
                let mut mac = HmacSha256::new_from_slice(key)
                    .map_err(|_| SignatureError::Crypto("HMAC rejected the key".into()))?;
                mac.update(signature_base);
                Ok(mac.verify_slice(signature).is_ok())
            }
            JoseVerifier::Rs256(key) => {
                use rsa::signature::Verifier;
                let signature = rsa::pkcs1v15::Signature::try_from(signature)
                    .map_err(|_| SignatureError::Crypto("malformed RSA signature".into()))?;
                Ok(key.verify(signature_base, &signature).is_ok())
            }
            JoseVerifier::Ps256(key) => {
                use rsa::signature::Verifier;
                let signature = rsa::pss::Signature::try_from(signature)
                    .map_err(|_| SignatureError::Crypto("malformed RSA-PSS signature".into()))?;
                Ok(key.verify(signature_base, &signature).is_ok())
            }
            JoseVerifier::Es256(key) => {
                use p256::ecdsa::{Signature, signature::Verifier};
                let signature = Signature::from_slice(signature)
                    .map_err(|_| SignatureError::Crypto("malformed ECDSA signature".into()))?;
                Ok(key.verify(signature_base, &signature).is_ok())
            }
            JoseVerifier::Es256k(key) => {
                use k256::ecdsa::{Signature, signature::Verifier};
                let signature = Signature::from_slice(signature)
                    .map_err(|_| SignatureError::Crypto("malformed ECDSA signature".into()))?;
                Ok(key.verify(signature_base, &signature).is_ok())
            }
            JoseVerifier::Ed25519(key) => {
                use ed25519_dalek::Verifier;
                let signature = ed25519_dalek::Signature::try_from(signature)
                    .map_err(|_| SignatureError::Crypto("malformed Ed25519 signature".into()))?;
                Ok(key.verify(signature_base, &signature).is_ok())
            }
        }
    }
}
