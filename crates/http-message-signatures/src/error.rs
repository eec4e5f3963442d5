// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the Apache 2.0 license found in the LICENSE file or at:
//     https://opensource.org/licenses/Apache-2.0

use thiserror::Error;

/// Errors that may be thrown by this crate.
///
/// Every failure mode falls into one of four buckets: bad arguments supplied
/// to a constructor or setter, invalid wire data discovered while parsing,
/// a component value that cannot be produced while assembling a signature
/// base, and failures reported by a cryptographic backend. Errors abort the
/// current sign or verify call; no partial output is ever produced.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// A caller-supplied value was rejected before any parsing took place,
    /// such as a malformed target URI or a status code outside 100-999.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Wire data violated the component or parameter rules of RFC 9421,
    /// such as an unregistered derived component name or an incompatible
    /// parameter combination.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A field value could not be parsed or re-serialized as an RFC 8941
    /// structured field value.
    #[error("structured field error: {0}")]
    Sfv(#[from] sfv::Error),

    /// The signature base could not be assembled, typically because a
    /// covered component has no resolvable value.
    #[error("cannot construct signature base: {0}")]
    BaseConstruction(String),

    /// A signer or verifier backend rejected its input.
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}
