/*!
Proof specifications and the byte contract with the proof engine.

A [`ProofSpec`] gathers statements, equality meta statements, shared setup parameters and an
optional context. This crate validates a specification and hands it to a [`ProofEngine`] as bytes;
it never looks inside the engine's encoding of statements, witnesses or proofs.
*/

use crate::{
    meta_statements::MetaStatements,
    scheme::{PublicKey, SignatureParams, VerificationKey},
    statements::{Statement, StatementKind, Witness},
    types::*,
    Error, Rng, VerifyResult,
};
use anoncred_crypto::{
    composite::{self, ProofSpecEnvelope, SetupParam},
    mac::KeyedProof,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters shared among the statements of a [`ProofSpec`], stored once and referred to by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupParams(Vec<Vec<u8>>);

impl SetupParams {
    /// Store `param`, reusing the index of an identical one.
    fn add(&mut self, param: &SetupParam) -> Result<usize, Error> {
        let bytes = anoncred_crypto::encode(param)?;
        if let Some(index) = self.0.iter().position(|stored| *stored == bytes) {
            return Ok(index);
        }
        self.0.push(bytes);
        Ok(self.0.len() - 1)
    }

    /// Store the parameters and public key of `key`, returning their indices.
    ///
    /// Pointcheval-Sanders keys hold their own generators, so both indices name the public key.
    pub fn add_verification_key(&mut self, key: &VerificationKey) -> Result<(usize, usize), Error> {
        let (params, public_key) = match (&key.params, &key.public_key) {
            (SignatureParams::Bbs(params), PublicKey::Bbs(public_key)) => (
                SetupParam::BbsParams(params.clone()),
                SetupParam::BbsPublicKey(*public_key),
            ),
            (SignatureParams::BbsPlus(params), PublicKey::BbsPlus(public_key)) => (
                SetupParam::BbsPlusParams(params.clone()),
                SetupParam::BbsPlusPublicKey(*public_key),
            ),
            (SignatureParams::Mac(params), PublicKey::Mac(public_key)) => (
                SetupParam::MacParams(params.clone()),
                SetupParam::MacPublicKey(*public_key),
            ),
            (SignatureParams::Ps(_), PublicKey::Ps(public_key)) => {
                let index = self.add(&SetupParam::PsPublicKey(public_key.clone()))?;
                return Ok((index, index));
            }
            (params, public_key) => {
                return Err(Error::SchemeMismatch {
                    expected: params.scheme(),
                    got: public_key.scheme(),
                })
            }
        };
        Ok((self.add(&params)?, self.add(&public_key)?))
    }

    /// Store Pedersen commitment parameters, returning their index.
    pub fn add_pedersen_parameters(
        &mut self,
        params: &PedersenParameters<G1Projective>,
    ) -> Result<usize, Error> {
        self.add(&SetupParam::PedersenParameters(params.clone()))
    }

    /// The number of stored parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The statements of a proof specification, in index order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statements(Vec<Statement>);

impl Statements {
    /// No statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a statement and return its index.
    pub fn add(&mut self, statement: Statement) -> usize {
        self.0.push(statement);
        self.0.len() - 1
    }

    /// The statements in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.0.iter()
    }

    /// The number of statements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no statements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Statement>> for Statements {
    fn from(statements: Vec<Statement>) -> Self {
        Self(statements)
    }
}

/// Witnesses for the statements of a proof specification, in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witnesses(Vec<Witness>);

impl Witnesses {
    /// No witnesses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the witness for the next statement and return its index.
    pub fn add(&mut self, witness: Witness) -> usize {
        self.0.push(witness);
        self.0.len() - 1
    }

    /// The number of witnesses.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no witnesses.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode for the engine.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let witnesses: Vec<&[u8]> = self.0.iter().map(Witness::as_bytes).collect();
        Ok(anoncred_crypto::encode(&witnesses)?)
    }
}

impl From<Vec<Witness>> for Witnesses {
    fn from(witnesses: Vec<Witness>) -> Self {
        Self(witnesses)
    }
}

/// An encoded composite proof. Written as base64 in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof(#[serde(with = "crate::serde_base64")] Vec<u8>);

impl Proof {
    /// Wrap engine proof bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The engine encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A complete description of what a composite proof shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSpec {
    statements: Statements,
    meta_statements: MetaStatements,
    setup_params: SetupParams,
    context: Option<Vec<u8>>,
}

impl ProofSpec {
    /// Assemble a specification. Use [`ProofSpec::validate`] to check it.
    pub fn new(
        statements: Statements,
        meta_statements: MetaStatements,
        setup_params: SetupParams,
        context: Option<Vec<u8>>,
    ) -> Self {
        Self {
            statements,
            meta_statements,
            setup_params,
            context,
        }
    }

    /// The statements.
    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// The equality constraints.
    pub fn meta_statements(&self) -> &MetaStatements {
        &self.meta_statements
    }

    /// The shared setup parameters.
    pub fn setup_params(&self) -> &SetupParams {
        &self.setup_params
    }

    /// The public context bound into the proof.
    pub fn context(&self) -> Option<&[u8]> {
        self.context.as_deref()
    }

    /// Check that every meta statement names an existing, hidden message of an existing statement.
    pub fn validate(&self) -> Result<(), Error> {
        let statements = &self.statements.0;
        for (i, meta_statement) in self.meta_statements.iter().enumerate() {
            if meta_statement.pairs().is_empty() {
                return Err(Error::InvalidProofSpec(format!(
                    "meta statement {} is empty",
                    i
                )));
            }
            for &(statement, message) in meta_statement.pairs() {
                let target = statements.get(statement).ok_or_else(|| {
                    Error::InvalidProofSpec(format!(
                        "meta statement {} refers to statement {} of {}",
                        i,
                        statement,
                        statements.len()
                    ))
                })?;
                if message >= target.message_count() {
                    return Err(Error::InvalidProofSpec(format!(
                        "meta statement {} refers to message {} of statement {}, which has {}",
                        i,
                        message,
                        statement,
                        target.message_count()
                    )));
                }
                if target.revealed_indices().contains(&message) {
                    return Err(Error::InvalidProofSpec(format!(
                        "meta statement {} constrains message {} of statement {}, which is revealed",
                        i, message, statement
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether [`ProofSpec::validate`] passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Encode for the engine.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let envelope = ProofSpecEnvelope {
            statements: self
                .statements
                .iter()
                .map(|statement| statement.as_bytes().to_vec())
                .collect(),
            equalities: self
                .meta_statements
                .iter()
                .map(|meta_statement| meta_statement.clone().into_pairs())
                .collect(),
            setup_params: self.setup_params.0.clone(),
            context: self.context.clone(),
        };
        Ok(anoncred_crypto::encode(&envelope)?)
    }

    /// Generate a proof of this specification from `witnesses`, bound to `nonce`.
    pub fn generate(
        &self,
        engine: &impl ProofEngine,
        rng: &mut impl Rng,
        witnesses: &Witnesses,
        nonce: Option<&[u8]>,
    ) -> Result<Proof, Error> {
        self.validate()?;
        if witnesses.len() != self.statements.len() {
            return Err(Error::InvalidProofSpec(format!(
                "expected {} witnesses, got {}",
                self.statements.len(),
                witnesses.len()
            )));
        }
        let kinds: Vec<StatementKind> = self.statements.iter().map(Statement::kind).collect();
        if let Some(i) = (0..kinds.len()).find(|&i| witnesses.0[i].kind() != kinds[i]) {
            return Err(anoncred_crypto::Error::WitnessMismatch { statement: i }.into());
        }

        let proof = engine.generate_proof(rng, &self.to_bytes()?, &witnesses.to_bytes()?, nonce)?;
        tracing::debug!(
            statements = self.statements.len(),
            meta_statements = self.meta_statements.len(),
            "generated composite proof"
        );
        Ok(Proof(proof))
    }

    /// Verify `proof` against this specification and `nonce`.
    pub fn verify(
        &self,
        engine: &impl ProofEngine,
        proof: &Proof,
        nonce: Option<&[u8]>,
    ) -> VerifyResult {
        let result = match self.validate().and_then(|()| self.to_bytes()) {
            Ok(spec) => engine.verify_proof(proof.as_bytes(), &spec, nonce),
            Err(error) => VerifyResult::failure(error.to_string()),
        };
        if !result.verified {
            tracing::warn!(reason = ?result.error, "composite proof did not verify");
        }
        result
    }
}

/// The byte-level interface of a proof engine.
pub trait ProofEngine {
    /// Generate an encoded proof from an encoded [`ProofSpec`] and encoded [`Witnesses`].
    fn generate_proof(
        &self,
        rng: &mut impl Rng,
        spec: &[u8],
        witnesses: &[u8],
        nonce: Option<&[u8]>,
    ) -> Result<Vec<u8>, Error>;

    /// Verify an encoded proof. Malformed input is a failed verification, not an error.
    fn verify_proof(&self, proof: &[u8], spec: &[u8], nonce: Option<&[u8]>) -> VerifyResult;

    /// The keyed proofs of MAC statements in an encoded proof, by statement index.
    fn keyed_proofs(&self, proof: &[u8]) -> Result<BTreeMap<usize, KeyedProof>, Error>;
}

/// The `anoncred-crypto` engine, called in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl ProofEngine for NativeEngine {
    fn generate_proof(
        &self,
        rng: &mut impl Rng,
        spec: &[u8],
        witnesses: &[u8],
        nonce: Option<&[u8]>,
    ) -> Result<Vec<u8>, Error> {
        let spec: ProofSpecEnvelope = anoncred_crypto::decode(spec)?;
        let witnesses: Vec<Vec<u8>> = anoncred_crypto::decode(witnesses)?;
        Ok(composite::generate_proof(rng, &spec, &witnesses, nonce)?)
    }

    fn verify_proof(&self, proof: &[u8], spec: &[u8], nonce: Option<&[u8]>) -> VerifyResult {
        match anoncred_crypto::decode::<ProofSpecEnvelope>(spec) {
            Ok(spec) => composite::verify_proof(proof, &spec, nonce),
            Err(error) => VerifyResult::failure(error.to_string()),
        }
    }

    fn keyed_proofs(&self, proof: &[u8]) -> Result<BTreeMap<usize, KeyedProof>, Error> {
        Ok(composite::keyed_proofs(proof)?)
    }
}
