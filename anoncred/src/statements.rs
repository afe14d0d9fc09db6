/*!
Statements and witnesses for composite proofs.

A [`Statement`] is a public claim (knowledge of a signature with some messages revealed, or
knowledge of a commitment opening) and a [`Witness`] holds the secrets behind it. Both carry the
engine's encoding as opaque bytes; besides those bytes this crate only keeps what it needs to
validate a proof specification: the statement kind, its message count and the indices it reveals.

Signature statements are built through [`SignatureBuilder`], implemented once per scheme.
[`builder_for`] selects the implementation for a [`SignatureScheme`].
*/

use crate::{
    proof_spec::SetupParams,
    scheme::{PublicKey, Signature, SignatureParams, SignatureScheme, VerificationKey},
    types::*,
    BlindingFactor, Error, Message,
};
use anoncred_crypto::{
    composite::{self, ParamsRef},
    pedersen::Commitment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// What a statement proves knowledge of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    /// A signature of the given scheme.
    Signature(SignatureScheme),
    /// The opening of a Pedersen commitment.
    PedersenCommitment,
}

/// An encoded statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    kind: StatementKind,
    message_count: usize,
    revealed: BTreeSet<usize>,
    bytes: Vec<u8>,
}

impl Statement {
    fn encode(
        kind: StatementKind,
        message_count: usize,
        revealed: BTreeSet<usize>,
        statement: &composite::Statement,
    ) -> Result<Self, Error> {
        Ok(Self {
            kind,
            message_count,
            revealed,
            bytes: anoncred_crypto::encode(statement)?,
        })
    }

    /// What the statement proves knowledge of.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The number of messages the statement covers.
    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// Indices of the messages the statement reveals.
    pub fn revealed_indices(&self) -> &BTreeSet<usize> {
        &self.revealed
    }

    /// The engine encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An encoded witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    kind: StatementKind,
    bytes: Vec<u8>,
}

impl Witness {
    fn encode(kind: StatementKind, witness: &composite::Witness) -> Result<Self, Error> {
        Ok(Self {
            kind,
            bytes: anoncred_crypto::encode(witness)?,
        })
    }

    /// The kind of statement this witness answers.
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The engine encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Where a statement finds the issuer's parameters and public key.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// Embedded in the statement.
    Inline(&'a VerificationKey),
    /// By index into the [`SetupParams`] of the proof specification. The key itself is still
    /// needed to check message indices.
    Setup {
        /// The key stored at those indices.
        key: &'a VerificationKey,
        /// Index of the parameters. Unused for Pointcheval-Sanders, whose key holds its generators.
        params: usize,
        /// Index of the public key.
        public_key: usize,
    },
}

impl<'a> KeySource<'a> {
    /// Store `key` in `setup` and refer to it by index.
    pub fn setup(key: &'a VerificationKey, setup: &mut SetupParams) -> Result<Self, Error> {
        let (params, public_key) = setup.add_verification_key(key)?;
        Ok(KeySource::Setup {
            key,
            params,
            public_key,
        })
    }

    /// The key, wherever it is stored.
    pub fn key(&self) -> &'a VerificationKey {
        match *self {
            KeySource::Inline(key) | KeySource::Setup { key, .. } => key,
        }
    }

    fn params<T: Clone>(&self, inline: &T) -> ParamsRef<T> {
        match self {
            KeySource::Inline(_) => ParamsRef::Inline(inline.clone()),
            KeySource::Setup { params, .. } => ParamsRef::Setup(*params),
        }
    }

    fn public_key<T: Clone>(&self, inline: &T) -> ParamsRef<T> {
        match self {
            KeySource::Inline(_) => ParamsRef::Inline(inline.clone()),
            KeySource::Setup { public_key, .. } => ParamsRef::Setup(*public_key),
        }
    }
}

fn check_indices(message_count: usize, messages: &BTreeMap<usize, Scalar>) -> Result<(), Error> {
    match messages.keys().find(|&&i| i >= message_count) {
        Some(&index) => Err(Error::IndexOutOfRange {
            index,
            count: message_count,
        }),
        None => Ok(()),
    }
}

/// Builds statements and witnesses about signatures of one scheme.
pub trait SignatureBuilder {
    /// The scheme handled by this builder.
    fn scheme(&self) -> SignatureScheme;

    /// A statement of knowledge of a signature under `key` on a message whose entries at the
    /// indices of `revealed` are disclosed.
    fn build_statement(
        &self,
        key: KeySource<'_>,
        revealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Statement, Error>;

    /// The witness for a statement built by [`SignatureBuilder::build_statement`], checked against
    /// the message count of `key`.
    fn build_witness(
        &self,
        key: &VerificationKey,
        signature: &Signature,
        unrevealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Witness, Error>;
}

/// [`SignatureBuilder`] for BBS.
#[derive(Debug, Clone, Copy, Default)]
pub struct BbsBuilder;

/// [`SignatureBuilder`] for BBS+.
#[derive(Debug, Clone, Copy, Default)]
pub struct BbsPlusBuilder;

/// [`SignatureBuilder`] for Pointcheval-Sanders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsBuilder;

/// [`SignatureBuilder`] for keyed-verification MACs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacBuilder;

/// The builder for `scheme`.
pub fn builder_for(scheme: SignatureScheme) -> &'static dyn SignatureBuilder {
    match scheme {
        SignatureScheme::Bbs => &BbsBuilder,
        SignatureScheme::BbsPlus => &BbsPlusBuilder,
        SignatureScheme::Ps => &PsBuilder,
        SignatureScheme::Mac => &MacBuilder,
    }
}

/// Build a signature statement through [`builder_for`] the key's scheme.
pub fn signature_statement(
    key: KeySource<'_>,
    revealed: &BTreeMap<usize, Scalar>,
) -> Result<Statement, Error> {
    builder_for(key.key().scheme()).build_statement(key, revealed)
}

/// Build a signature witness through [`builder_for`] the signature's scheme.
pub fn signature_witness(
    key: &VerificationKey,
    signature: &Signature,
    unrevealed: &BTreeMap<usize, Scalar>,
) -> Result<Witness, Error> {
    builder_for(signature.scheme()).build_witness(key, signature, unrevealed)
}

fn scheme_mismatch(expected: SignatureScheme, got: SignatureScheme) -> Error {
    Error::SchemeMismatch { expected, got }
}

/// Shared check of the witness builders: the key belongs to the scheme and every hidden index is
/// one of its messages.
fn check_witness(
    scheme: SignatureScheme,
    key: &VerificationKey,
    unrevealed: &BTreeMap<usize, Scalar>,
) -> Result<(), Error> {
    if key.scheme() != scheme {
        return Err(scheme_mismatch(scheme, key.scheme()));
    }
    check_indices(key.message_count(), unrevealed)
}

/// Shared body of the statement builders: check the key's scheme and the revealed indices, then
/// encode the engine statement.
fn encode_signature_statement(
    scheme: SignatureScheme,
    key: KeySource<'_>,
    revealed: &BTreeMap<usize, Scalar>,
    statement: Option<composite::Statement>,
) -> Result<Statement, Error> {
    let statement = statement.ok_or_else(|| scheme_mismatch(scheme, key.key().scheme()))?;
    let message_count = key.key().message_count();
    check_indices(message_count, revealed)?;
    Statement::encode(
        StatementKind::Signature(scheme),
        message_count,
        revealed.keys().copied().collect(),
        &statement,
    )
}

impl SignatureBuilder for BbsBuilder {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Bbs
    }

    fn build_statement(
        &self,
        key: KeySource<'_>,
        revealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Statement, Error> {
        let statement = match (&key.key().params, &key.key().public_key) {
            (SignatureParams::Bbs(params), PublicKey::Bbs(public_key)) => {
                Some(composite::Statement::BbsSignature {
                    params: key.params(params),
                    public_key: key.public_key(public_key),
                    revealed: revealed.clone(),
                })
            }
            _ => None,
        };
        encode_signature_statement(self.scheme(), key, revealed, statement)
    }

    fn build_witness(
        &self,
        key: &VerificationKey,
        signature: &Signature,
        unrevealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Witness, Error> {
        check_witness(self.scheme(), key, unrevealed)?;
        match signature {
            Signature::Bbs(signature) => Witness::encode(
                StatementKind::Signature(self.scheme()),
                &composite::Witness::BbsSignature {
                    signature: *signature,
                    hidden: unrevealed.clone(),
                },
            ),
            other => Err(scheme_mismatch(self.scheme(), other.scheme())),
        }
    }
}

impl SignatureBuilder for BbsPlusBuilder {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::BbsPlus
    }

    fn build_statement(
        &self,
        key: KeySource<'_>,
        revealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Statement, Error> {
        let statement = match (&key.key().params, &key.key().public_key) {
            (SignatureParams::BbsPlus(params), PublicKey::BbsPlus(public_key)) => {
                Some(composite::Statement::BbsPlusSignature {
                    params: key.params(params),
                    public_key: key.public_key(public_key),
                    revealed: revealed.clone(),
                })
            }
            _ => None,
        };
        encode_signature_statement(self.scheme(), key, revealed, statement)
    }

    fn build_witness(
        &self,
        key: &VerificationKey,
        signature: &Signature,
        unrevealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Witness, Error> {
        check_witness(self.scheme(), key, unrevealed)?;
        match signature {
            Signature::BbsPlus(signature) => Witness::encode(
                StatementKind::Signature(self.scheme()),
                &composite::Witness::BbsPlusSignature {
                    signature: *signature,
                    hidden: unrevealed.clone(),
                },
            ),
            other => Err(scheme_mismatch(self.scheme(), other.scheme())),
        }
    }
}

impl SignatureBuilder for PsBuilder {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Ps
    }

    fn build_statement(
        &self,
        key: KeySource<'_>,
        revealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Statement, Error> {
        let statement = match &key.key().public_key {
            PublicKey::Ps(public_key) => Some(composite::Statement::PsSignature {
                public_key: key.public_key(public_key),
                revealed: revealed.clone(),
            }),
            _ => None,
        };
        encode_signature_statement(self.scheme(), key, revealed, statement)
    }

    fn build_witness(
        &self,
        key: &VerificationKey,
        signature: &Signature,
        unrevealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Witness, Error> {
        check_witness(self.scheme(), key, unrevealed)?;
        match signature {
            Signature::Ps(signature) => Witness::encode(
                StatementKind::Signature(self.scheme()),
                &composite::Witness::PsSignature {
                    signature: *signature,
                    hidden: unrevealed.clone(),
                },
            ),
            other => Err(scheme_mismatch(self.scheme(), other.scheme())),
        }
    }
}

impl SignatureBuilder for MacBuilder {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Mac
    }

    fn build_statement(
        &self,
        key: KeySource<'_>,
        revealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Statement, Error> {
        let statement = match (&key.key().params, &key.key().public_key) {
            (SignatureParams::Mac(params), PublicKey::Mac(public_key)) => {
                Some(composite::Statement::MacSignature {
                    params: key.params(params),
                    public_key: key.public_key(public_key),
                    revealed: revealed.clone(),
                })
            }
            _ => None,
        };
        encode_signature_statement(self.scheme(), key, revealed, statement)
    }

    fn build_witness(
        &self,
        key: &VerificationKey,
        signature: &Signature,
        unrevealed: &BTreeMap<usize, Scalar>,
    ) -> Result<Witness, Error> {
        check_witness(self.scheme(), key, unrevealed)?;
        match signature {
            Signature::Mac { mac, .. } => Witness::encode(
                StatementKind::Signature(self.scheme()),
                &composite::Witness::MacSignature {
                    mac: *mac,
                    hidden: unrevealed.clone(),
                },
            ),
            other => Err(scheme_mismatch(self.scheme(), other.scheme())),
        }
    }
}

/// A statement of knowledge of the opening of `commitment` under `params`.
pub fn commitment_statement(
    params: &PedersenParameters<G1Projective>,
    commitment: Commitment<G1Projective>,
) -> Result<Statement, Error> {
    Statement::encode(
        StatementKind::PedersenCommitment,
        params.message_len(),
        BTreeSet::new(),
        &composite::Statement::PedersenCommitment {
            params: ParamsRef::Inline(params.clone()),
            commitment,
        },
    )
}

/// The witness for a [`commitment_statement`].
pub fn commitment_witness(blinding_factor: BlindingFactor, opening: Message) -> Result<Witness, Error> {
    Witness::encode(
        StatementKind::PedersenCommitment,
        &composite::Witness::PedersenCommitment {
            blinding_factor,
            opening,
        },
    )
}
