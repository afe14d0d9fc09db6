/*!
Schema-driven anonymous credentials on top of the `anoncred-crypto` engine.

A credential is a JSON object. Its [`Schema`](schema::Schema) flattens it into a canonical,
sorted list of leaf paths and encodes each leaf as a field element, so that every party derives
the same message vector. The rest of this crate orchestrates the engine around those vectors:

- [`disclosure`] splits encoded messages into revealed and hidden parts.
- [`statements`] and [`meta_statements`] build the typed inputs of a composite proof, and
  [`proof_spec`] assembles and validates them and talks to the engine through a byte contract.
- [`credential`], [`issuer`] and [`blind`] cover plain and blind issuance.
- [`presentation`] proves possession of one or more credentials with selective disclosure and
  equality constraints across them.
- [`revocation`] keeps the membership set behind an accumulator.

Signatures are generic over [`SignatureScheme`](scheme::SignatureScheme): BBS, BBS+,
Pointcheval-Sanders, and keyed-verification MACs.
*/
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod blind;
pub mod credential;
pub mod disclosure;
pub mod encoding;
pub mod issuer;
pub mod meta_statements;
pub mod presentation;
pub mod proof_spec;
pub mod revocation;
pub mod schema;
pub mod scheme;
pub mod statements;

mod serde_base64;

pub use anoncred_crypto::{BlindingFactor, Message, VerifyResult};

use thiserror::Error;

#[allow(unused)]
mod types {
    pub use anoncred_crypto::{
        bbs, bbs_plus, composite, mac, pedersen::PedersenParameters, pointcheval_sanders as ps,
    };
    pub use bls12_381::{G1Projective, Scalar};
}

/// Trait synonym for a cryptographically secure random number generator.
pub trait Rng: rand::CryptoRng + rand::RngCore {}
impl<T: rand::CryptoRng + rand::RngCore> Rng for T {}

/// Errors raised while encoding, assembling, issuing or presenting credentials.
///
/// A proof or signature that simply fails to verify is not an error; see [`VerifyResult`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An object's leaf paths differ from the schema's.
    #[error("object does not match schema: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        /// Schema paths with no value in the object.
        missing: Vec<String>,
        /// Object paths the schema does not declare.
        unexpected: Vec<String>,
    },
    /// Attribute names that are not leaves of the schema.
    #[error("{count} attribute name(s) not found in schema: {names:?}")]
    UnknownFieldName {
        /// The number of names that did not match.
        count: usize,
        /// The names that did not match.
        names: Vec<String>,
    },
    /// A value cannot be encoded under its declared encoding.
    #[error("cannot encode `{path}`: {reason}")]
    EncodingRangeError {
        /// Path of the offending leaf.
        path: String,
        /// What was wrong with the value.
        reason: String,
    },
    /// A message index beyond the message count of a key or schema.
    #[error("message index {index} is out of range for {count} messages")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of messages available.
        count: usize,
    },
    /// A proof specification is malformed.
    #[error("invalid proof specification: {0}")]
    InvalidProofSpec(String),
    /// A proof or signature that had to hold before continuing did not.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
    /// A schema definition is malformed.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// Values from different signature schemes were combined.
    #[error("expected a {expected} value, got {got}")]
    SchemeMismatch {
        /// The scheme that was expected.
        expected: scheme::SignatureScheme,
        /// The scheme that was supplied.
        got: scheme::SignatureScheme,
    },
    /// A top-level credential field collides with a reserved name.
    #[error("`{0}` is a reserved credential field")]
    ReservedFieldName(String),
    /// Attributes bound by an equality constraint have different values.
    #[error("attributes constrained to be equal differ: {0}")]
    EqualityViolation(String),
    /// The requested operation is not available for this scheme.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// The credential has not been signed.
    #[error("credential has no signature")]
    MissingSignature,
    /// The member is already in the accumulator.
    #[error("member is already in the accumulator")]
    DuplicateMember,
    /// The member is not in the accumulator.
    #[error("member is not in the accumulator")]
    NotAMember,
    /// A value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// An error raised by the cryptographic engine.
    #[error(transparent)]
    Crypto(#[from] anoncred_crypto::Error),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
