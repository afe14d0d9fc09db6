//! Keyed-verification anonymous credentials: a BBS+ style algebraic MAC in G1 only.
//!
//! A MAC is a triple `(A, e, s)` with `A = (g0 + h0·s + Σ h_i·m_i) · 1/(x + e)`. Only the holder
//! of `x` can check a MAC or the keyed half of a proof of knowledge of one, so verification needs
//! no pairing. The issuer publishes `X = g·x` and attaches a [`ProofOfValidity`] to every MAC it
//! hands out, so holders can tell the MAC was formed under that key.
//!
//! See Barki, Brunet, Desmoulins and Traoré, ["Improved Algebraic MACs and Practical
//! Keyed-Verification Anonymous Credentials"](https://eprint.iacr.org/2016/1018).

use crate::{
    common::*,
    generators,
    pedersen::{inner_product, Commitment, PedersenParameters},
    proofs::{Challenge, ChallengeBuilder, ChallengeInput},
    serde::SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Public parameters for MACs over messages of a fixed length.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Base point of the MACed value.
    #[serde(with = "SerializeElement")]
    pub(crate) g0: G1Affine,
    /// Base point of the public key.
    #[serde(with = "SerializeElement")]
    pub(crate) g: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) h0: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) hs: Vec<G1Affine>,
}

impl Params {
    /// Generate parameters for `length` messages uniformly at random.
    pub fn new(rng: &mut impl Rng, length: usize) -> Self {
        let mut next = || -> G1Affine { random_non_identity::<G1Projective>(&mut *rng).into() };
        let g0 = next();
        let g = next();
        let h0 = next();
        let hs = (0..length).map(|_| next()).collect();
        Self { g0, g, h0, hs }
    }

    /// Derive parameters for `length` messages deterministically from a public label.
    pub fn generate_using_label(label: &[u8], length: usize) -> Self {
        Self {
            g0: generators::derive::<G1Projective>(label, b"MAC g0", 0).into(),
            g: generators::derive::<G1Projective>(label, b"MAC g", 0).into(),
            h0: generators::derive::<G1Projective>(label, b"MAC h0", 0).into(),
            hs: generators::derive_many::<G1Projective>(label, b"MAC h", length)
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }

    /// The number of messages these parameters cover.
    pub fn message_count(&self) -> usize {
        self.hs.len()
    }

    /// Pedersen parameters a holder uses to commit to the messages at `hidden_indices` before
    /// blind issuance.
    pub fn commitment_parameters(
        &self,
        hidden_indices: &BTreeSet<usize>,
    ) -> Result<PedersenParameters<G1Projective>, Error> {
        let gs = hidden_indices
            .iter()
            .map(|&i| {
                self.hs
                    .get(i)
                    .map(G1Projective::from)
                    .ok_or(Error::IndexOutOfRange {
                        index: i,
                        length: self.hs.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PedersenParameters::from_generators(self.h0.into(), gs))
    }

    /// Compute `g0 + h0·s + Σ h_i·m_i`; callers check the message length.
    pub(crate) fn maced_value(&self, msg: &[Scalar], s: Scalar) -> G1Projective {
        let hs: Vec<G1Projective> = self.hs.iter().map(G1Projective::from).collect();
        self.g0 + self.h0 * s + inner_product(&hs, msg)
    }
}

impl ChallengeInput for Params {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.g0);
        builder.consume(&self.g);
        builder.consume(&self.h0);
        builder.consume(self.hs.as_slice());
    }
}

/// MAC secret key. Required for every verification.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SecretKey(#[serde(with = "SerializeElement")] Scalar);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<private>)")
    }
}

/// MAC public key `X = g·x`, used only to check proofs of validity.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(with = "SerializeElement")]
    pub(crate) x: G1Affine,
}

impl ChallengeInput for PublicKey {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.x);
    }
}

/// A keypair formed from a [`SecretKey`] and a [`PublicKey`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyPair {
    sk: SecretKey,
    pk: PublicKey,
}

impl KeyPair {
    /// Generate a new `KeyPair` under the given parameters.
    pub fn new(rng: &mut impl Rng, params: &Params) -> Self {
        let x = random_nonzero_scalar(rng);
        KeyPair {
            sk: SecretKey(x),
            pk: PublicKey {
                x: (params.g * x).into(),
            },
        }
    }

    /// Get the public portion of the `KeyPair`
    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Get the secret portion of the `KeyPair`
    pub fn secret_key(&self) -> &SecretKey {
        &self.sk
    }

    /// Compute a MAC on a message.
    pub fn try_mac(&self, rng: &mut impl Rng, params: &Params, msg: &Message) -> Result<Mac, Error> {
        if msg.len() != params.message_count() {
            return Err(Error::MessageLengthMismatch {
                expected: params.message_count(),
                got: msg.len(),
            });
        }
        let s = Scalar::random(&mut *rng);
        let (a, e) = self.mac_value(rng, params.maced_value(msg, s));
        Ok(Mac { a, e, s })
    }

    /// Compute a MAC on a message, some of whose entries are hidden inside `commitment`.
    ///
    /// `commitment` must have been formed under [`Params::commitment_parameters`] for exactly the
    /// `blinded` indices; `known` supplies every other message.
    pub fn blind_mac(
        &self,
        rng: &mut impl Rng,
        params: &Params,
        commitment: &Commitment<G1Projective>,
        blinded: &BTreeSet<usize>,
        known: &BTreeMap<usize, Scalar>,
    ) -> Result<BlindMac, Error> {
        let length = params.message_count();
        let covers = blinded.len() + known.len() == length
            && blinded.iter().all(|i| *i < length && !known.contains_key(i))
            && known.keys().all(|i| *i < length);
        if blinded.is_empty() || !covers {
            return Err(Error::InvalidBlindingIndices { length });
        }

        let s = Scalar::random(&mut *rng);
        let known_combination = known
            .iter()
            .map(|(&i, m)| params.hs[i] * m)
            .sum::<G1Projective>();
        let b = params.g0 + commitment.to_element() + params.h0 * s + known_combination;
        let (a, e) = self.mac_value(&mut *rng, b);
        let mac = Mac { a, e, s };
        let proof = self.prove_value(rng, params, &mac, b);
        Ok(BlindMac { mac, proof })
    }

    /// Prove that `mac` was computed under this key.
    pub fn prove_validity(
        &self,
        rng: &mut impl Rng,
        params: &Params,
        msg: &Message,
        mac: &Mac,
    ) -> ProofOfValidity {
        self.prove_value(rng, params, mac, params.maced_value(msg, mac.s))
    }

    /// Prove validity of `mac` on the MACed value `b`.
    fn prove_value(
        &self,
        rng: &mut impl Rng,
        params: &Params,
        mac: &Mac,
        b: G1Projective,
    ) -> ProofOfValidity {
        let k = Scalar::random(rng);
        let t1 = params.g * k;
        let t2 = mac.a * k;
        let y = b - mac.a * mac.e;
        let challenge = validity_challenge(params, &self.pk, mac.a, y, t1, t2);
        ProofOfValidity {
            challenge: challenge.to_scalar(),
            response: k + challenge.to_scalar() * self.sk.0,
        }
    }

    fn mac_value(&self, rng: &mut impl Rng, b: G1Projective) -> (G1Affine, Scalar) {
        loop {
            let e = Scalar::random(&mut *rng);
            if let Some(inverse) = invert(self.sk.0 + e) {
                return ((b * inverse).into(), e);
            }
        }
    }
}

impl SecretKey {
    /// Check a MAC on a message.
    pub fn verify(&self, params: &Params, msg: &Message, mac: &Mac) -> bool {
        if msg.len() != params.message_count() || bool::from(mac.a.is_identity()) {
            return false;
        }
        mac.a * (self.0 + mac.e) == params.maced_value(msg, mac.s)
    }

    /// Check the keyed half of a proof of knowledge of a MAC.
    pub fn verify_keyed_proof(&self, proof: &KeyedProof) -> bool {
        !bool::from(proof.a_prime.is_identity())
            && G1Projective::from(proof.a_bar) == proof.a_prime * self.0
    }
}

/// A MAC `(A, e, s)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Mac {
    #[serde(with = "SerializeElement")]
    pub(crate) a: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) e: Scalar,
    #[serde(with = "SerializeElement")]
    pub(crate) s: Scalar,
}

/// A MAC on a partially hidden message. Its `s` is missing the holder's blinding factor.
///
/// The attached proof of validity already holds for the completed MAC.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlindMac {
    mac: Mac,
    proof: ProofOfValidity,
}

impl BlindMac {
    /// Complete the MAC using the blinding factor of the holder's commitment.
    pub fn unblind(self, bf: BlindingFactor) -> Mac {
        Mac {
            s: self.mac.s + bf.to_scalar(),
            ..self.mac
        }
    }

    /// The issuer's proof that the completed MAC is valid under its public key.
    pub fn proof_of_validity(&self) -> ProofOfValidity {
        self.proof
    }
}

/// Non-interactive proof that `A·x = b - A·e` for the `x` behind a [`PublicKey`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProofOfValidity {
    #[serde(with = "SerializeElement")]
    challenge: Scalar,
    #[serde(with = "SerializeElement")]
    response: Scalar,
}

impl ProofOfValidity {
    /// Check the proof against the MAC and message it was issued for.
    pub fn verify(&self, params: &Params, public_key: &PublicKey, msg: &Message, mac: &Mac) -> bool {
        if msg.len() != params.message_count() || bool::from(mac.a.is_identity()) {
            return false;
        }
        let y = params.maced_value(msg, mac.s) - mac.a * mac.e;
        let t1 = params.g * self.response - public_key.x * self.challenge;
        let t2 = mac.a * self.response - y * self.challenge;
        validity_challenge(params, public_key, mac.a, y, t1, t2).to_scalar() == self.challenge
    }
}

fn validity_challenge(
    params: &Params,
    public_key: &PublicKey,
    a: G1Affine,
    y: G1Projective,
    t1: G1Projective,
    t2: G1Projective,
) -> Challenge {
    ChallengeBuilder::new()
        .with_bytes(b"MAC proof of validity")
        .with(params)
        .with(public_key)
        .with(&a)
        .with(&y)
        .with(&t1)
        .with(&t2)
        .finish()
}

/// The part of a proof of knowledge of a MAC that only the key holder can check: `a_bar` must
/// equal `a_prime·x`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyedProof {
    #[serde(with = "SerializeElement")]
    pub(crate) a_prime: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) a_bar: G1Affine,
}
