/*!
Blind issuance: the issuer signs a credential without learning some of its attributes.

The holder starts from an unsigned [`Credential`] and names the attributes to hide. [`request`]
commits to those attributes and proves knowledge of the commitment openings, producing a
[`BlindSignatureRequest`] for the issuer and a [`Committed`] state that keeps the blinding. The
issuer checks the request with [`BlindSignatureRequest::verify`] and answers with a
[`BlindSignature`], which the holder [`complete()`](Committed::complete())s into a signed
credential.

BBS+ and MAC requests commit to all hidden attributes at once. Pointcheval-Sanders requests also
commit to each hidden attribute separately, linked to the joint commitment by equality
constraints, and keep one blinding factor per attribute. BBS has no blind issuance: its request
hides nothing, carries no commitment, and the issuer simply signs the revealed attributes.
*/

use crate::{
    credential::{
        Credential, CRYPTO_VERSION, CRYPTO_VERSION_FIELD, PROOF_FIELD, PROOF_TYPE_FIELD,
        SCHEMA_FIELD,
    },
    disclosure::{encode_revealed, partition},
    meta_statements::{MetaStatement, MetaStatements},
    proof_spec::{Proof, ProofEngine, ProofSpec, SetupParams, Statements, Witnesses},
    schema::Schema,
    scheme::{PublicKey, Signature, SignatureParams, SignatureScheme, VerificationKey},
    statements::{commitment_statement, commitment_witness},
    types::*,
    BlindingFactor, Error, Message, Rng,
};
use anoncred_crypto::pedersen::Commitment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Context bound into the proof of a blind signature request.
const REQUEST_CONTEXT: &[u8] = b"anoncred blind signature request";

/// Attributes the issuer must see to know what it signs.
const ISSUER_VISIBLE: [&str; 3] = [CRYPTO_VERSION_FIELD, SCHEMA_FIELD, "proof.type"];

/// A holder's request to sign a credential with some attributes hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlindSignatureRequest {
    scheme: SignatureScheme,
    blinded_attributes: BTreeSet<String>,
    known_attributes: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    commitment: Option<Commitment<G1Projective>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    index_commitments: BTreeMap<usize, Commitment<G1Projective>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof: Option<Proof>,
}

/// The holder's blinding, kept until the signature arrives.
#[derive(Debug, Clone)]
enum Blinding {
    None,
    Joint(BlindingFactor),
    PerIndex(BTreeMap<usize, BlindingFactor>),
}

/// A holder that sent a [`BlindSignatureRequest`] and awaits the [`BlindSignature`].
#[derive(Debug, Clone)]
pub struct Committed {
    credential: Credential,
    scheme: SignatureScheme,
    blinding: Blinding,
}

/// A signature on a credential with hidden attributes, still bound to the holder's blinding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BlindSignature {
    /// A plain BBS signature on attributes the issuer saw in full.
    Bbs(bbs::Signature),
    /// A blind BBS+ signature.
    BbsPlus(bbs_plus::BlindSignature),
    /// A blind Pointcheval-Sanders signature.
    Ps(ps::BlindSignature),
    /// A blind MAC with its proof of validity.
    Mac(mac::BlindMac),
}

fn commitment_parameters(
    key: &VerificationKey,
    blinded: &BTreeSet<usize>,
) -> Result<PedersenParameters<G1Projective>, Error> {
    Ok(match (&key.params, &key.public_key) {
        (SignatureParams::BbsPlus(params), _) => params.commitment_parameters(blinded)?,
        (SignatureParams::Mac(params), _) => params.commitment_parameters(blinded)?,
        (_, PublicKey::Ps(public_key)) => public_key
            .to_g1_pedersen_parameters(&blinded.iter().copied().collect::<Vec<_>>())?,
        _ => {
            return Err(Error::Unsupported(format!(
                "{} signatures cannot be issued blindly",
                key.scheme()
            )))
        }
    })
}

/// The proof specification of a request: knowledge of the joint commitment opening and, for
/// Pointcheval-Sanders, of each per-attribute commitment with its message equal to the matching
/// position of the joint one.
fn request_spec(
    key: &VerificationKey,
    blinded: &BTreeSet<usize>,
    commitment: Commitment<G1Projective>,
    index_commitments: &BTreeMap<usize, Commitment<G1Projective>>,
) -> Result<ProofSpec, Error> {
    let mut statements = Statements::new();
    let mut meta_statements = MetaStatements::new();
    let joint = statements.add(commitment_statement(
        &commitment_parameters(key, blinded)?,
        commitment,
    )?);

    if let PublicKey::Ps(public_key) = &key.public_key {
        if !index_commitments.keys().eq(blinded.iter()) {
            return Err(anoncred_crypto::Error::InvalidBlindingIndices {
                length: public_key.message_count(),
            }
            .into());
        }
        let index_params = public_key.index_commitment_parameters(&commitment);
        for (position, index_commitment) in index_commitments.values().enumerate() {
            let statement = statements.add(commitment_statement(&index_params, *index_commitment)?);
            let _ = meta_statements.add(MetaStatement::equality(vec![
                (joint, position),
                (statement, 0),
            ]));
        }
    }

    Ok(ProofSpec::new(
        statements,
        meta_statements,
        SetupParams::default(),
        Some(REQUEST_CONTEXT.to_vec()),
    ))
}

/// Commit to the `blinded` attributes of `credential` and prove knowledge of the commitment
/// openings, bound to `nonce`.
///
/// The credential version, schema and proof type must stay visible to the issuer.
pub fn request(
    rng: &mut impl Rng,
    engine: &impl ProofEngine,
    credential: Credential,
    key: &VerificationKey,
    blinded: &BTreeSet<String>,
    nonce: Option<&[u8]>,
) -> Result<(BlindSignatureRequest, Committed), Error> {
    let scheme = key.scheme();
    if !scheme.supports_blind_issuance() {
        if !blinded.is_empty() {
            return Err(Error::Unsupported(format!(
                "{} signatures cannot be issued blindly",
                scheme
            )));
        }
        return plaintext_request(credential, scheme);
    }
    if let Some(name) = ISSUER_VISIBLE.iter().find(|name| blinded.contains(**name)) {
        return Err(Error::ReservedFieldName(name.to_string()));
    }

    let schema = credential.schema();
    let blinded_indices = schema.indices_of(blinded.iter().map(String::as_str))?;
    if blinded_indices.is_empty() {
        return Err(anoncred_crypto::Error::InvalidBlindingIndices {
            length: schema.message_count(),
        }
        .into());
    }
    let known: BTreeSet<String> = schema
        .leaves()
        .iter()
        .map(|(path, _)| path.clone())
        .filter(|path| !blinded.contains(path))
        .collect();
    let parts = partition(&credential.serialize_for_signing(scheme)?, schema, &known)?;
    let hidden = Message::new(parts.unrevealed.values().copied().collect());

    let params = commitment_parameters(key, &blinded_indices)?;
    let joint_blinding = BlindingFactor::new(&mut *rng);
    let commitment = params.commit(&hidden, joint_blinding)?;
    let mut witnesses = Witnesses::new();
    let _ = witnesses.add(commitment_witness(joint_blinding, hidden)?);

    let mut index_commitments = BTreeMap::new();
    let blinding = match &key.public_key {
        PublicKey::Ps(public_key) => {
            let index_params = public_key.index_commitment_parameters(&commitment);
            let mut factors = BTreeMap::new();
            for (&i, message) in &parts.unrevealed {
                let bf = BlindingFactor::new(&mut *rng);
                let opening = Message::from(*message);
                let _ = index_commitments.insert(i, index_params.commit(&opening, bf)?);
                let _ = witnesses.add(commitment_witness(bf, opening)?);
                let _ = factors.insert(i, bf);
            }
            Blinding::PerIndex(factors)
        }
        _ => Blinding::Joint(joint_blinding),
    };

    let spec = request_spec(key, &blinded_indices, commitment, &index_commitments)?;
    let proof = spec.generate(engine, rng, &witnesses, nonce)?;
    tracing::info!(
        %scheme,
        hidden = blinded_indices.len(),
        "created blind signature request"
    );

    Ok((
        BlindSignatureRequest {
            scheme,
            blinded_attributes: blinded.clone(),
            known_attributes: parts.revealed_values,
            commitment: Some(commitment),
            index_commitments,
            proof: Some(proof),
        },
        Committed {
            credential,
            scheme,
            blinding,
        },
    ))
}

/// The request of a scheme without blind issuance: every attribute in the clear.
fn plaintext_request(
    credential: Credential,
    scheme: SignatureScheme,
) -> Result<(BlindSignatureRequest, Committed), Error> {
    let schema = credential.schema();
    let all = schema.leaves().iter().map(|(path, _)| path.clone()).collect();
    let parts = partition(&credential.serialize_for_signing(scheme)?, schema, &all)?;
    tracing::info!(%scheme, "created plaintext signature request");
    Ok((
        BlindSignatureRequest {
            scheme,
            blinded_attributes: BTreeSet::new(),
            known_attributes: parts.revealed_values,
            commitment: None,
            index_commitments: BTreeMap::new(),
            proof: None,
        },
        Committed {
            credential,
            scheme,
            blinding: Blinding::None,
        },
    ))
}

/// A request whose proof the issuer has checked, with the attributes to sign.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    /// The scheme to sign under.
    pub scheme: SignatureScheme,
    /// Indices of the hidden attributes.
    pub blinded: BTreeSet<usize>,
    /// Encoded visible attributes by index.
    pub known: BTreeMap<usize, Scalar>,
    /// The joint commitment to the hidden attributes. Absent for plaintext requests.
    pub commitment: Option<Commitment<G1Projective>>,
    /// Per-attribute commitments, for Pointcheval-Sanders.
    pub index_commitments: BTreeMap<usize, Commitment<G1Projective>>,
}

impl VerifiedRequest {
    /// The joint commitment, which every blind scheme requires.
    pub fn commitment(&self) -> Result<&Commitment<G1Projective>, Error> {
        self.commitment.as_ref().ok_or_else(|| {
            Error::Unsupported(format!("{} signatures cannot be issued blindly", self.scheme))
        })
    }
}

impl BlindSignatureRequest {
    /// The scheme the holder asks to be signed under.
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Names of the hidden attributes.
    pub fn blinded_attributes(&self) -> &BTreeSet<String> {
        &self.blinded_attributes
    }

    /// The visible attributes, nested as in the credential.
    pub fn known_attributes(&self) -> &Value {
        &self.known_attributes
    }

    /// Check the request against the issuer's key and schema and the nonce the issuer sent.
    ///
    /// Fails with [`Error::VerificationFailed`] if the proof does not hold or the visible
    /// attributes do not name this schema and scheme.
    pub fn verify(
        &self,
        engine: &impl ProofEngine,
        key: &VerificationKey,
        schema: &Schema,
        nonce: Option<&[u8]>,
    ) -> Result<VerifiedRequest, Error> {
        if key.scheme() != self.scheme {
            return Err(Error::SchemeMismatch {
                expected: key.scheme(),
                got: self.scheme,
            });
        }

        let expected_schema = Value::String(schema.to_canonical_json()?);
        if self.known_attributes[CRYPTO_VERSION_FIELD] != CRYPTO_VERSION
            || self.known_attributes[SCHEMA_FIELD] != expected_schema
            || self.known_attributes[PROOF_FIELD][PROOF_TYPE_FIELD] != self.scheme.proof_type()
        {
            return Err(Error::VerificationFailed(
                "request does not show the expected version, schema and proof type".to_string(),
            ));
        }

        let blinded = schema.indices_of(self.blinded_attributes.iter().map(String::as_str))?;
        let known = encode_revealed(&self.known_attributes, schema)?;
        match (self.commitment, &self.proof) {
            (Some(commitment), Some(proof)) if !blinded.is_empty() => {
                let spec = request_spec(key, &blinded, commitment, &self.index_commitments)?;
                let result = spec.verify(engine, proof, nonce);
                if !result.verified {
                    return Err(Error::VerificationFailed(
                        result
                            .error
                            .unwrap_or_else(|| "blind signature request".to_string()),
                    ));
                }
            }
            (None, None) if blinded.is_empty() && self.index_commitments.is_empty() => {}
            _ => {
                return Err(Error::VerificationFailed(
                    "request commitment does not match its hidden attributes".to_string(),
                ))
            }
        }
        if blinded.len() + known.len() != schema.message_count()
            || blinded.iter().any(|index| known.contains_key(index))
        {
            return Err(anoncred_crypto::Error::InvalidBlindingIndices {
                length: schema.message_count(),
            }
            .into());
        }

        Ok(VerifiedRequest {
            scheme: self.scheme,
            blinded,
            known,
            commitment: self.commitment,
            index_commitments: self.index_commitments.clone(),
        })
    }
}

impl Committed {
    /// The credential being issued, without its signature.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Remove the blinding from the issuer's signature and check the result.
    pub fn complete(
        self,
        blind_signature: BlindSignature,
        key: &VerificationKey,
    ) -> Result<Credential, Error> {
        let signature = match (blind_signature, &self.blinding, &key.public_key) {
            (BlindSignature::Bbs(signature), Blinding::None, PublicKey::Bbs(_)) => {
                Signature::Bbs(signature)
            }
            (BlindSignature::BbsPlus(blind), Blinding::Joint(bf), PublicKey::BbsPlus(_)) => {
                Signature::BbsPlus(blind.unblind(*bf))
            }
            (BlindSignature::Mac(blind), Blinding::Joint(bf), PublicKey::Mac(_)) => {
                Signature::Mac {
                    mac: blind.unblind(*bf),
                    validity: blind.proof_of_validity(),
                }
            }
            (BlindSignature::Ps(blind), Blinding::PerIndex(factors), PublicKey::Ps(public_key)) => {
                Signature::Ps(blind.unblind(public_key, factors)?)
            }
            _ => {
                return Err(Error::SchemeMismatch {
                    expected: self.scheme,
                    got: key.scheme(),
                })
            }
        };

        let credential = self.credential.with_signature(signature);
        let result = credential.verify(key);
        if !result.verified {
            return Err(Error::VerificationFailed(
                result
                    .error
                    .unwrap_or_else(|| "unblinded signature".to_string()),
            ));
        }
        tracing::info!(scheme = %self.scheme, "completed blind issuance");
        Ok(credential)
    }
}
