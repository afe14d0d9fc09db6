//! Composite proofs: one Fiat-Shamir proof over several statements, with hidden messages
//! constrained to be equal across (or within) statements.
//!
//! A [`ProofSpec`] lists the [`Statement`]s being proven, the equality constraints among their
//! hidden messages, shared [`SetupParam`]s that statements may refer to by index, and an optional
//! context string. The prover supplies one [`Witness`] per statement. Equal messages get one
//! shared commitment scalar, so the verifier accepts a constraint exactly when the corresponding
//! response scalars agree.
//!
//! The same operations are offered over encoded values by [`generate_proof`], [`verify_proof`]
//! and [`keyed_proofs`], for callers that treat statements, witnesses, and proofs as opaque bytes.
//!
//! Proof generation does not check that the witness values themselves satisfy the equality
//! constraints. Such a proof simply fails verification.

use crate::{
    bbs, bbs_plus,
    common::*,
    decode, encode,
    mac::{self, KeyedProof, Mac},
    pedersen::{Commitment, PedersenParameters},
    pointcheval_sanders as ps,
    proofs::{
        check_indices, check_partition, hidden_indices, BbsPlusSignatureProof,
        BbsPlusSignatureProofBuilder, BbsSignatureProof, BbsSignatureProofBuilder, Challenge,
        ChallengeBuilder, ChallengeInput, CommitmentProof, CommitmentProofBuilder, SignatureProof,
        SignatureProofBuilder,
    },
    serde::SerializeElement,
    VerifyResult,
};
use ff::Field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Domain separator for composite proof challenges.
const CHALLENGE_DOMAIN: &[u8] = b"anoncred composite proof";

/// A parameter given directly, or by index into [`ProofSpec::setup_params`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamsRef<T> {
    /// The parameter itself.
    Inline(T),
    /// Index of a setup parameter.
    Setup(usize),
}

impl<T: FromSetupParam> ParamsRef<T> {
    fn resolve<'a>(&'a self, setup_params: &'a [SetupParam]) -> Result<&'a T, Error> {
        match self {
            ParamsRef::Inline(value) => Ok(value),
            ParamsRef::Setup(index) => setup_params
                .get(*index)
                .and_then(T::from_setup_param)
                .ok_or(Error::InvalidSetupParam { index: *index }),
        }
    }
}

/// A parameter shared among the statements of a [`ProofSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum SetupParam {
    /// Pointcheval-Sanders public key.
    PsPublicKey(ps::PublicKey),
    /// BBS parameters.
    BbsParams(bbs::Params),
    /// BBS public key.
    BbsPublicKey(bbs::PublicKey),
    /// BBS+ parameters.
    BbsPlusParams(bbs_plus::Params),
    /// BBS+ public key.
    BbsPlusPublicKey(bbs_plus::PublicKey),
    /// MAC parameters.
    MacParams(mac::Params),
    /// MAC public key.
    MacPublicKey(mac::PublicKey),
    /// Pedersen commitment parameters in G1.
    PedersenParameters(PedersenParameters<G1Projective>),
}

/// Types that may be stored as a [`SetupParam`].
pub trait FromSetupParam {
    /// Borrow the value if `param` holds this type.
    fn from_setup_param(param: &SetupParam) -> Option<&Self>;
}

macro_rules! impl_from_setup_param {
    ($($variant:ident => $type:ty),* $(,)?) => {
        $(
            impl FromSetupParam for $type {
                fn from_setup_param(param: &SetupParam) -> Option<&Self> {
                    match param {
                        SetupParam::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_setup_param! {
    PsPublicKey => ps::PublicKey,
    BbsParams => bbs::Params,
    BbsPublicKey => bbs::PublicKey,
    BbsPlusParams => bbs_plus::Params,
    BbsPlusPublicKey => bbs_plus::PublicKey,
    MacParams => mac::Params,
    MacPublicKey => mac::PublicKey,
    PedersenParameters => PedersenParameters<G1Projective>,
}

/// A public claim proven by a composite proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statement {
    /// Knowledge of a Pointcheval-Sanders signature on a message with `revealed` entries.
    PsSignature {
        /// Signer's public key.
        public_key: ParamsRef<ps::PublicKey>,
        /// The disclosed messages, by index.
        #[serde(with = "SerializeElement")]
        revealed: BTreeMap<usize, Scalar>,
    },
    /// Knowledge of a BBS signature on a message with `revealed` entries.
    BbsSignature {
        /// Signature parameters.
        params: ParamsRef<bbs::Params>,
        /// Signer's public key.
        public_key: ParamsRef<bbs::PublicKey>,
        /// The disclosed messages, by index.
        #[serde(with = "SerializeElement")]
        revealed: BTreeMap<usize, Scalar>,
    },
    /// Knowledge of a BBS+ signature on a message with `revealed` entries.
    BbsPlusSignature {
        /// Signature parameters.
        params: ParamsRef<bbs_plus::Params>,
        /// Signer's public key.
        public_key: ParamsRef<bbs_plus::PublicKey>,
        /// The disclosed messages, by index.
        #[serde(with = "SerializeElement")]
        revealed: BTreeMap<usize, Scalar>,
    },
    /// Knowledge of a MAC on a message with `revealed` entries. Complete verification also needs
    /// the issuer to check the [`KeyedProof`].
    MacSignature {
        /// MAC parameters.
        params: ParamsRef<mac::Params>,
        /// Issuer's public key.
        public_key: ParamsRef<mac::PublicKey>,
        /// The disclosed messages, by index.
        #[serde(with = "SerializeElement")]
        revealed: BTreeMap<usize, Scalar>,
    },
    /// Knowledge of the opening of a Pedersen commitment.
    PedersenCommitment {
        /// Commitment parameters.
        params: ParamsRef<PedersenParameters<G1Projective>>,
        /// The commitment.
        commitment: Commitment<G1Projective>,
    },
}

/// The secret values behind a [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Witness {
    /// Witness for [`Statement::PsSignature`].
    PsSignature {
        /// The signature.
        signature: ps::Signature,
        /// The undisclosed messages, by index.
        #[serde(with = "SerializeElement")]
        hidden: BTreeMap<usize, Scalar>,
    },
    /// Witness for [`Statement::BbsSignature`].
    BbsSignature {
        /// The signature.
        signature: bbs::Signature,
        /// The undisclosed messages, by index.
        #[serde(with = "SerializeElement")]
        hidden: BTreeMap<usize, Scalar>,
    },
    /// Witness for [`Statement::BbsPlusSignature`].
    BbsPlusSignature {
        /// The signature.
        signature: bbs_plus::Signature,
        /// The undisclosed messages, by index.
        #[serde(with = "SerializeElement")]
        hidden: BTreeMap<usize, Scalar>,
    },
    /// Witness for [`Statement::MacSignature`].
    MacSignature {
        /// The MAC.
        mac: Mac,
        /// The undisclosed messages, by index.
        #[serde(with = "SerializeElement")]
        hidden: BTreeMap<usize, Scalar>,
    },
    /// Witness for [`Statement::PedersenCommitment`].
    PedersenCommitment {
        /// Blinding factor of the commitment.
        blinding_factor: BlindingFactor,
        /// The committed message.
        opening: Message,
    },
}

/// A statement with every parameter reference looked up.
#[derive(Debug, Clone, Copy)]
enum Resolved<'a> {
    Ps {
        public_key: &'a ps::PublicKey,
        revealed: &'a BTreeMap<usize, Scalar>,
    },
    Bbs {
        params: &'a bbs::Params,
        public_key: &'a bbs::PublicKey,
        revealed: &'a BTreeMap<usize, Scalar>,
    },
    BbsPlus {
        params: &'a bbs_plus::Params,
        public_key: &'a bbs_plus::PublicKey,
        revealed: &'a BTreeMap<usize, Scalar>,
    },
    Mac {
        params: &'a mac::Params,
        public_key: &'a mac::PublicKey,
        revealed: &'a BTreeMap<usize, Scalar>,
    },
    Pedersen {
        params: &'a PedersenParameters<G1Projective>,
        commitment: Commitment<G1Projective>,
    },
}

impl<'a> Resolved<'a> {
    fn message_count(&self) -> usize {
        match self {
            Resolved::Ps { public_key, .. } => public_key.message_count(),
            Resolved::Bbs { params, .. } => params.message_count(),
            Resolved::BbsPlus { params, .. } => params.message_count(),
            Resolved::Mac { params, .. } => params.message_count(),
            Resolved::Pedersen { params, .. } => params.message_len(),
        }
    }

    fn revealed(&self) -> Option<&'a BTreeMap<usize, Scalar>> {
        match *self {
            Resolved::Ps { revealed, .. }
            | Resolved::Bbs { revealed, .. }
            | Resolved::BbsPlus { revealed, .. }
            | Resolved::Mac { revealed, .. } => Some(revealed),
            Resolved::Pedersen { .. } => None,
        }
    }

    /// The message indices whose response scalars the statement's proof exposes, in order.
    fn constrainable_indices(&self) -> Vec<usize> {
        match self.revealed() {
            Some(revealed) => hidden_indices(self.message_count(), revealed),
            None => (0..self.message_count()).collect(),
        }
    }
}

impl ChallengeInput for Resolved<'_> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        match self {
            Resolved::Ps {
                public_key,
                revealed,
            } => {
                builder.consume_bytes(b"PS");
                builder.consume(*public_key);
                builder.consume(*revealed);
            }
            Resolved::Bbs {
                params,
                public_key,
                revealed,
            } => {
                builder.consume_bytes(b"BBS");
                builder.consume(*params);
                builder.consume(*public_key);
                builder.consume(*revealed);
            }
            Resolved::BbsPlus {
                params,
                public_key,
                revealed,
            } => {
                builder.consume_bytes(b"BBS+");
                builder.consume(*params);
                builder.consume(*public_key);
                builder.consume(*revealed);
            }
            Resolved::Mac {
                params,
                public_key,
                revealed,
            } => {
                builder.consume_bytes(b"MAC");
                builder.consume(*params);
                builder.consume(*public_key);
                builder.consume(*revealed);
            }
            Resolved::Pedersen { params, commitment } => {
                builder.consume_bytes(b"Pedersen");
                builder.consume(*params);
                builder.consume(commitment);
            }
        }
    }
}

impl Statement {
    fn resolve<'a>(&'a self, setup_params: &'a [SetupParam]) -> Result<Resolved<'a>, Error> {
        Ok(match self {
            Statement::PsSignature {
                public_key,
                revealed,
            } => Resolved::Ps {
                public_key: public_key.resolve(setup_params)?,
                revealed,
            },
            Statement::BbsSignature {
                params,
                public_key,
                revealed,
            } => Resolved::Bbs {
                params: params.resolve(setup_params)?,
                public_key: public_key.resolve(setup_params)?,
                revealed,
            },
            Statement::BbsPlusSignature {
                params,
                public_key,
                revealed,
            } => Resolved::BbsPlus {
                params: params.resolve(setup_params)?,
                public_key: public_key.resolve(setup_params)?,
                revealed,
            },
            Statement::MacSignature {
                params,
                public_key,
                revealed,
            } => Resolved::Mac {
                params: params.resolve(setup_params)?,
                public_key: public_key.resolve(setup_params)?,
                revealed,
            },
            Statement::PedersenCommitment { params, commitment } => Resolved::Pedersen {
                params: params.resolve(setup_params)?,
                commitment: *commitment,
            },
        })
    }
}

/// Everything a prover and verifier must agree on before a composite proof is made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSpec {
    /// The statements being proven, in order.
    pub statements: Vec<Statement>,
    /// Sets of `(statement index, message index)` pairs whose hidden messages must be equal.
    pub equalities: Vec<BTreeSet<(usize, usize)>>,
    /// Parameters that statements refer to by index.
    pub setup_params: Vec<SetupParam>,
    /// Public data bound into the challenge.
    pub context: Option<Vec<u8>>,
}

/// A partially-built proof of one statement.
#[derive(Debug)]
enum StatementProofBuilder {
    Ps(SignatureProofBuilder),
    Bbs(BbsSignatureProofBuilder),
    BbsPlus(BbsPlusSignatureProofBuilder),
    Mac(BbsPlusSignatureProofBuilder),
    Pedersen {
        builder: CommitmentProofBuilder<G1Projective>,
        opening: Message,
        blinding_factor: BlindingFactor,
    },
}

impl ChallengeInput for StatementProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        match self {
            StatementProofBuilder::Ps(inner) => builder.consume(inner),
            StatementProofBuilder::Bbs(inner) => builder.consume(inner),
            StatementProofBuilder::BbsPlus(inner) | StatementProofBuilder::Mac(inner) => {
                builder.consume(inner)
            }
            StatementProofBuilder::Pedersen { builder: inner, .. } => builder.consume(inner),
        }
    }
}

impl StatementProofBuilder {
    fn generate_proof_response(self, challenge: Challenge) -> Result<StatementProof, Error> {
        Ok(match self {
            StatementProofBuilder::Ps(inner) => {
                StatementProof::PsSignature(inner.generate_proof_response(challenge)?)
            }
            StatementProofBuilder::Bbs(inner) => {
                StatementProof::BbsSignature(inner.generate_proof_response(challenge)?)
            }
            StatementProofBuilder::BbsPlus(inner) => {
                StatementProof::BbsPlusSignature(inner.generate_proof_response(challenge)?)
            }
            StatementProofBuilder::Mac(inner) => {
                StatementProof::MacSignature(inner.generate_proof_response(challenge)?)
            }
            StatementProofBuilder::Pedersen {
                builder,
                opening,
                blinding_factor,
            } => StatementProof::PedersenCommitment(builder.generate_proof_response(
                &opening,
                blinding_factor,
                challenge,
            )?),
        })
    }
}

/// The proof of one statement within a [`Proof`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum StatementProof {
    /// Proof for [`Statement::PsSignature`].
    PsSignature(SignatureProof),
    /// Proof for [`Statement::BbsSignature`].
    BbsSignature(BbsSignatureProof),
    /// Proof for [`Statement::BbsPlusSignature`].
    BbsPlusSignature(BbsPlusSignatureProof),
    /// Proof for [`Statement::MacSignature`].
    MacSignature(BbsPlusSignatureProof),
    /// Proof for [`Statement::PedersenCommitment`].
    PedersenCommitment(CommitmentProof<G1Projective>),
}

impl ChallengeInput for StatementProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        match self {
            StatementProof::PsSignature(inner) => builder.consume(inner),
            StatementProof::BbsSignature(inner) => builder.consume(inner),
            StatementProof::BbsPlusSignature(inner) | StatementProof::MacSignature(inner) => {
                builder.consume(inner)
            }
            StatementProof::PedersenCommitment(inner) => builder.consume(inner),
        }
    }
}

impl StatementProof {
    fn conjunction_response_scalars(&self) -> &[Scalar] {
        match self {
            StatementProof::PsSignature(inner) => inner.conjunction_response_scalars(),
            StatementProof::BbsSignature(inner) => inner.conjunction_response_scalars(),
            StatementProof::BbsPlusSignature(inner) | StatementProof::MacSignature(inner) => {
                inner.conjunction_response_scalars()
            }
            StatementProof::PedersenCommitment(inner) => inner.conjunction_response_scalars(),
        }
    }

    fn verify(&self, statement: &Resolved<'_>, challenge: Challenge) -> Result<bool, Error> {
        match (self, *statement) {
            (
                StatementProof::PsSignature(proof),
                Resolved::Ps {
                    public_key,
                    revealed,
                },
            ) => proof.verify_knowledge_of_signature(public_key, revealed, challenge),
            (
                StatementProof::BbsSignature(proof),
                Resolved::Bbs {
                    params,
                    public_key,
                    revealed,
                },
            ) => proof.verify_knowledge_of_signature(params, public_key, revealed, challenge),
            (
                StatementProof::BbsPlusSignature(proof),
                Resolved::BbsPlus {
                    params,
                    public_key,
                    revealed,
                },
            ) => proof.verify_knowledge_of_signature(params, public_key, revealed, challenge),
            (StatementProof::MacSignature(proof), Resolved::Mac { params, revealed, .. }) => {
                proof.verify_knowledge_of_mac(params, revealed, challenge)
            }
            (
                StatementProof::PedersenCommitment(proof),
                Resolved::Pedersen { params, commitment },
            ) => proof.verify_knowledge_of_opening(params, commitment, challenge),
            _ => Ok(false),
        }
    }
}

/// A composite proof: one [`StatementProof`] per statement of its [`ProofSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    statement_proofs: Vec<StatementProof>,
}

impl Proof {
    /// The proofs of the individual statements, in statement order.
    pub fn statement_proofs(&self) -> &[StatementProof] {
        &self.statement_proofs
    }

    /// The parts of the proof only a MAC issuer can check, keyed by statement index.
    pub fn keyed_proofs(&self) -> BTreeMap<usize, KeyedProof> {
        self.statement_proofs
            .iter()
            .enumerate()
            .filter_map(|(i, proof)| match proof {
                StatementProof::MacSignature(inner) => Some((i, inner.keyed_proof())),
                _ => None,
            })
            .collect()
    }
}

impl ProofSpec {
    /// Create a spec without setup parameters or context.
    pub fn new(statements: Vec<Statement>, equalities: Vec<BTreeSet<(usize, usize)>>) -> Self {
        Self {
            statements,
            equalities,
            setup_params: Vec::new(),
            context: None,
        }
    }

    /// Check that every parameter reference resolves and that every equality names a hidden
    /// message of an existing statement.
    pub fn validate(&self) -> Result<(), Error> {
        self.resolve().map(|_| ())
    }

    fn resolve(&self) -> Result<Vec<Resolved<'_>>, Error> {
        let resolved = self
            .statements
            .iter()
            .map(|statement| statement.resolve(&self.setup_params))
            .collect::<Result<Vec<_>, _>>()?;

        for statement in &resolved {
            if let Some(revealed) = statement.revealed() {
                check_indices(statement.message_count(), revealed)?;
            }
        }

        for &(statement, message) in self.equalities.iter().flatten() {
            let target = resolved.get(statement).ok_or(Error::StatementOutOfRange {
                statement,
                count: resolved.len(),
            })?;
            if message >= target.message_count() {
                return Err(Error::IndexOutOfRange {
                    index: message,
                    length: target.message_count(),
                });
            }
            if target
                .revealed()
                .map_or(false, |revealed| revealed.contains_key(&message))
            {
                return Err(Error::RevealedMessageInEquality { statement, message });
            }
        }
        Ok(resolved)
    }

    /// Merge overlapping equality sets, so that each pair belongs to at most one class.
    fn equality_classes(&self) -> Vec<BTreeSet<(usize, usize)>> {
        let mut classes: Vec<BTreeSet<(usize, usize)>> = Vec::new();
        for set in self.equalities.iter().filter(|set| !set.is_empty()) {
            let mut merged = set.clone();
            classes.retain(|class| {
                if class.is_disjoint(&merged) {
                    true
                } else {
                    merged.extend(class.iter().copied());
                    false
                }
            });
            classes.push(merged);
        }
        classes
    }

    fn challenge<T: ChallengeInput>(
        &self,
        resolved: &[Resolved<'_>],
        classes: &[BTreeSet<(usize, usize)>],
        proof_parts: &[T],
        nonce: Option<&[u8]>,
    ) -> Challenge {
        let mut builder = ChallengeBuilder::new().with_bytes(CHALLENGE_DOMAIN);
        builder.consume(resolved);
        builder.consume_bytes((classes.len() as u64).to_le_bytes());
        for class in classes {
            builder.consume_bytes((class.len() as u64).to_le_bytes());
            for &(statement, message) in class {
                builder.consume_bytes((statement as u64).to_le_bytes());
                builder.consume_bytes((message as u64).to_le_bytes());
            }
        }
        consume_optional_bytes(&mut builder, self.context.as_deref());
        builder.consume(proof_parts);
        consume_optional_bytes(&mut builder, nonce);
        builder.finish()
    }

    /// Prove every statement, with one witness per statement.
    ///
    /// The optional `nonce` is bound into the challenge, and the verifier must supply the same
    /// one.
    pub fn prove(
        &self,
        rng: &mut impl Rng,
        witnesses: &[Witness],
        nonce: Option<&[u8]>,
    ) -> Result<Proof, Error> {
        let resolved = self.resolve()?;
        if witnesses.len() != resolved.len() {
            return Err(Error::WitnessMismatch {
                statement: witnesses.len().min(resolved.len()),
            });
        }

        let classes = self.equality_classes();
        let shared_scalars: BTreeMap<(usize, usize), Scalar> = classes
            .iter()
            .flat_map(|class| {
                let scalar = Scalar::random(&mut *rng);
                class.iter().map(move |&pair| (pair, scalar))
            })
            .collect();

        let builders = resolved
            .iter()
            .zip(witnesses)
            .enumerate()
            .map(|(i, (statement, witness))| {
                let conjunction_scalars: Vec<Option<Scalar>> = statement
                    .constrainable_indices()
                    .into_iter()
                    .map(|j| shared_scalars.get(&(i, j)).copied())
                    .collect();
                build_statement_proof(&mut *rng, i, statement, witness, &conjunction_scalars)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let challenge = self.challenge(&resolved, &classes, &builders, nonce);
        let statement_proofs = builders
            .into_iter()
            .map(|builder| builder.generate_proof_response(challenge))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Proof { statement_proofs })
    }

    /// Verify a proof made under this spec with the same `nonce`.
    ///
    /// For MAC statements this checks only the public part; the issuer must separately accept
    /// the [`Proof::keyed_proofs`].
    pub fn verify(&self, proof: &Proof, nonce: Option<&[u8]>) -> Result<bool, Error> {
        let resolved = self.resolve()?;
        if proof.statement_proofs.len() != resolved.len() {
            return Ok(false);
        }

        let classes = self.equality_classes();
        let challenge = self.challenge(&resolved, &classes, &proof.statement_proofs, nonce);

        for (statement_proof, statement) in proof.statement_proofs.iter().zip(&resolved) {
            if !statement_proof.verify(statement, challenge)? {
                return Ok(false);
            }
        }

        for class in &classes {
            let mut responses = class.iter().map(|&(statement, message)| {
                let position = resolved[statement]
                    .constrainable_indices()
                    .iter()
                    .position(|&j| j == message);
                position.and_then(|p| {
                    proof.statement_proofs[statement]
                        .conjunction_response_scalars()
                        .get(p)
                        .copied()
                })
            });
            let first = match responses.next() {
                Some(Some(first)) => first,
                _ => return Ok(false),
            };
            if !responses.all(|response| response == Some(first)) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn consume_optional_bytes(builder: &mut ChallengeBuilder, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            builder.consume_bytes([1]);
            builder.consume_prefixed_bytes(bytes);
        }
        None => builder.consume_bytes([0]),
    }
}

fn build_statement_proof(
    rng: &mut impl Rng,
    index: usize,
    statement: &Resolved<'_>,
    witness: &Witness,
    conjunction_scalars: &[Option<Scalar>],
) -> Result<StatementProofBuilder, Error> {
    let mismatch = Error::WitnessMismatch { statement: index };
    Ok(match (*statement, witness) {
        (
            Resolved::Ps {
                public_key,
                revealed,
            },
            Witness::PsSignature { signature, hidden },
        ) => {
            check_partition(public_key.message_count(), revealed, hidden).map_err(|_| mismatch)?;
            StatementProofBuilder::Ps(SignatureProofBuilder::generate_proof_commitments(
                rng,
                hidden,
                *signature,
                conjunction_scalars,
                public_key,
            )?)
        }
        (Resolved::Bbs { params, revealed, .. }, Witness::BbsSignature { signature, hidden }) => {
            check_partition(params.message_count(), revealed, hidden).map_err(|_| mismatch)?;
            StatementProofBuilder::Bbs(BbsSignatureProofBuilder::generate_proof_commitments(
                rng,
                params,
                revealed,
                hidden,
                *signature,
                conjunction_scalars,
            )?)
        }
        (
            Resolved::BbsPlus { params, revealed, .. },
            Witness::BbsPlusSignature { signature, hidden },
        ) => {
            check_partition(params.message_count(), revealed, hidden).map_err(|_| mismatch)?;
            StatementProofBuilder::BbsPlus(
                BbsPlusSignatureProofBuilder::generate_proof_commitments(
                    rng,
                    params,
                    revealed,
                    hidden,
                    *signature,
                    conjunction_scalars,
                )?,
            )
        }
        (Resolved::Mac { params, revealed, .. }, Witness::MacSignature { mac, hidden }) => {
            check_partition(params.message_count(), revealed, hidden).map_err(|_| mismatch)?;
            StatementProofBuilder::Mac(
                BbsPlusSignatureProofBuilder::generate_mac_proof_commitments(
                    rng,
                    params,
                    revealed,
                    hidden,
                    *mac,
                    conjunction_scalars,
                )?,
            )
        }
        (
            Resolved::Pedersen { params, .. },
            Witness::PedersenCommitment {
                blinding_factor,
                opening,
            },
        ) => {
            if opening.len() != params.message_len() {
                return Err(mismatch);
            }
            StatementProofBuilder::Pedersen {
                builder: CommitmentProofBuilder::generate_proof_commitments(
                    rng,
                    conjunction_scalars,
                    params,
                )?,
                opening: opening.clone(),
                blinding_factor: *blinding_factor,
            }
        }
        _ => return Err(mismatch),
    })
}

/// A [`ProofSpec`] whose statements and setup parameters are carried as encoded bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSpecEnvelope {
    /// Encoded [`Statement`]s.
    pub statements: Vec<Vec<u8>>,
    /// Equality constraints, as in [`ProofSpec::equalities`].
    pub equalities: Vec<BTreeSet<(usize, usize)>>,
    /// Encoded [`SetupParam`]s.
    pub setup_params: Vec<Vec<u8>>,
    /// Public data bound into the challenge.
    pub context: Option<Vec<u8>>,
}

impl ProofSpecEnvelope {
    /// Decode into a typed [`ProofSpec`].
    pub fn to_proof_spec(&self) -> Result<ProofSpec, Error> {
        Ok(ProofSpec {
            statements: self
                .statements
                .iter()
                .map(|bytes| decode(bytes))
                .collect::<Result<_, _>>()?,
            equalities: self.equalities.clone(),
            setup_params: self
                .setup_params
                .iter()
                .map(|bytes| decode(bytes))
                .collect::<Result<_, _>>()?,
            context: self.context.clone(),
        })
    }
}

/// Generate an encoded composite proof from an encoded spec and encoded [`Witness`]es.
pub fn generate_proof(
    rng: &mut impl Rng,
    spec: &ProofSpecEnvelope,
    witnesses: &[Vec<u8>],
    nonce: Option<&[u8]>,
) -> Result<Vec<u8>, Error> {
    let spec = spec.to_proof_spec()?;
    let witnesses = witnesses
        .iter()
        .map(|bytes| decode(bytes))
        .collect::<Result<Vec<Witness>, _>>()?;
    encode(&spec.prove(rng, &witnesses, nonce)?)
}

/// Verify an encoded composite proof against an encoded spec.
///
/// Every failure, including malformed input, is reported in the result rather than as an error.
pub fn verify_proof(proof: &[u8], spec: &ProofSpecEnvelope, nonce: Option<&[u8]>) -> VerifyResult {
    let outcome = spec.to_proof_spec().and_then(|spec| {
        let proof: Proof = decode(proof)?;
        spec.verify(&proof, nonce)
    });
    match outcome {
        Ok(true) => VerifyResult::success(),
        Ok(false) => VerifyResult::failure("proof did not verify"),
        Err(error) => VerifyResult::failure(error.to_string()),
    }
}

/// Extract the keyed proofs from an encoded composite proof.
pub fn keyed_proofs(proof: &[u8]) -> Result<BTreeMap<usize, KeyedProof>, Error> {
    decode::<Proof>(proof).map(|proof| proof.keyed_proofs())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    fn set(pairs: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn overlapping_equalities_are_merged() {
        let spec = ProofSpec::new(
            Vec::new(),
            vec![set(&[(0, 1), (1, 2)]), set(&[(2, 0)]), set(&[(1, 2), (2, 0)])],
        );
        assert_eq!(
            spec.equality_classes(),
            vec![set(&[(0, 1), (1, 2), (2, 0)])]
        );
    }

    #[test]
    fn missing_setup_param_is_rejected() {
        let spec = ProofSpec::new(
            vec![Statement::BbsSignature {
                params: ParamsRef::Setup(0),
                public_key: ParamsRef::Setup(1),
                revealed: BTreeMap::new(),
            }],
            Vec::new(),
        );
        assert_eq!(spec.validate(), Err(Error::InvalidSetupParam { index: 0 }));
    }

    #[test]
    fn wrongly_typed_setup_param_is_rejected() {
        let mut rng = rng();
        let params = bbs::Params::new(&mut rng, 2);
        let mut spec = ProofSpec::new(
            vec![Statement::BbsSignature {
                params: ParamsRef::Setup(0),
                public_key: ParamsRef::Setup(0),
                revealed: BTreeMap::new(),
            }],
            Vec::new(),
        );
        spec.setup_params.push(SetupParam::BbsParams(params));
        assert_eq!(spec.validate(), Err(Error::InvalidSetupParam { index: 0 }));
    }

    #[test]
    fn equality_on_revealed_message_is_rejected() {
        let mut rng = rng();
        let params = bbs::Params::new(&mut rng, 3);
        let kp = bbs::KeyPair::new(&mut rng, &params);
        let msg = Message::random(&mut rng, 3);
        let (revealed, _) = msg.split(&[1]).unwrap();
        let statement = Statement::BbsSignature {
            params: ParamsRef::Inline(params),
            public_key: ParamsRef::Inline(*kp.public_key()),
            revealed,
        };

        let spec = ProofSpec::new(vec![statement.clone()], vec![set(&[(0, 1), (0, 2)])]);
        assert_eq!(
            spec.validate(),
            Err(Error::RevealedMessageInEquality {
                statement: 0,
                message: 1
            })
        );
        let spec = ProofSpec::new(vec![statement], vec![set(&[(0, 0), (3, 2)])]);
        assert_eq!(
            spec.validate(),
            Err(Error::StatementOutOfRange {
                statement: 3,
                count: 1
            })
        );
    }

    #[test]
    fn witness_of_wrong_kind_is_rejected() {
        let mut rng = rng();
        let params = PedersenParameters::<G1Projective>::new(&mut rng, 2);
        let msg = Message::random(&mut rng, 2);
        let bf = BlindingFactor::new(&mut rng);
        let spec = ProofSpec::new(
            vec![Statement::PedersenCommitment {
                params: ParamsRef::Inline(params.clone()),
                commitment: params.commit(&msg, bf).unwrap(),
            }],
            Vec::new(),
        );
        let witness = Witness::PedersenCommitment {
            blinding_factor: bf,
            opening: Message::random(&mut rng, 3),
        };
        assert_eq!(
            spec.prove(&mut rng, &[witness], None).unwrap_err(),
            Error::WitnessMismatch { statement: 0 }
        );
        assert_eq!(
            spec.prove(&mut rng, &[], None).unwrap_err(),
            Error::WitnessMismatch { statement: 0 }
        );
    }
}
