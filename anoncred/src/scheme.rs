/*!
The signature schemes a credential can be issued under.

Each enum here has one variant per [`SignatureScheme`], wrapping the matching engine type. Mixing
variants of different schemes is reported as [`Error::SchemeMismatch`].
*/

use crate::{types::*, Error, Message, Rng, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signature scheme supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureScheme {
    /// BBS signatures.
    Bbs,
    /// BBS+ signatures.
    BbsPlus,
    /// Pointcheval-Sanders signatures.
    Ps,
    /// Keyed-verification MACs.
    Mac,
}

impl SignatureScheme {
    /// Every supported scheme.
    pub const ALL: [SignatureScheme; 4] = [
        SignatureScheme::Bbs,
        SignatureScheme::BbsPlus,
        SignatureScheme::Ps,
        SignatureScheme::Mac,
    ];

    /// The `type` written into a credential's proof block.
    pub fn proof_type(self) -> &'static str {
        match self {
            SignatureScheme::Bbs => "Bls12381BBSSignature2023",
            SignatureScheme::BbsPlus => "Bls12381BBS+Signature2022",
            SignatureScheme::Ps => "Bls12381PSSignature2023",
            SignatureScheme::Mac => "Bls12381BBDT16MAC2024",
        }
    }

    /// The scheme named by a proof `type`.
    pub fn from_proof_type(proof_type: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.proof_type() == proof_type)
    }

    /// Whether an issuer can sign messages it only sees committed.
    pub fn supports_blind_issuance(self) -> bool {
        !matches!(self, SignatureScheme::Bbs)
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignatureScheme::Bbs => "BBS",
            SignatureScheme::BbsPlus => "BBS+",
            SignatureScheme::Ps => "PS",
            SignatureScheme::Mac => "MAC",
        })
    }
}

fn mismatch(expected: SignatureScheme, got: SignatureScheme) -> Error {
    Error::SchemeMismatch { expected, got }
}

/// Public parameters of a scheme.
///
/// Pointcheval-Sanders keys carry their own message generators, so its parameters do not fix a
/// message count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum SignatureParams {
    /// BBS parameters.
    Bbs(bbs::Params),
    /// BBS+ parameters.
    BbsPlus(bbs_plus::Params),
    /// Pointcheval-Sanders parameters.
    Ps(ps::Params),
    /// MAC parameters.
    Mac(mac::Params),
}

impl SignatureParams {
    /// Generate random parameters for `message_count` messages.
    pub fn new(rng: &mut impl Rng, scheme: SignatureScheme, message_count: usize) -> Self {
        match scheme {
            SignatureScheme::Bbs => SignatureParams::Bbs(bbs::Params::new(rng, message_count)),
            SignatureScheme::BbsPlus => {
                SignatureParams::BbsPlus(bbs_plus::Params::new(rng, message_count))
            }
            SignatureScheme::Ps => SignatureParams::Ps(ps::Params::new(rng)),
            SignatureScheme::Mac => SignatureParams::Mac(mac::Params::new(rng, message_count)),
        }
    }

    /// Derive parameters for `message_count` messages from a public label, so that anyone can
    /// recompute them.
    pub fn generate_using_label(
        scheme: SignatureScheme,
        label: &[u8],
        message_count: usize,
    ) -> Self {
        match scheme {
            SignatureScheme::Bbs => {
                SignatureParams::Bbs(bbs::Params::generate_using_label(label, message_count))
            }
            SignatureScheme::BbsPlus => SignatureParams::BbsPlus(
                bbs_plus::Params::generate_using_label(label, message_count),
            ),
            SignatureScheme::Ps => SignatureParams::Ps(ps::Params::generate_using_label(label)),
            SignatureScheme::Mac => {
                SignatureParams::Mac(mac::Params::generate_using_label(label, message_count))
            }
        }
    }

    /// The scheme these parameters belong to.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            SignatureParams::Bbs(_) => SignatureScheme::Bbs,
            SignatureParams::BbsPlus(_) => SignatureScheme::BbsPlus,
            SignatureParams::Ps(_) => SignatureScheme::Ps,
            SignatureParams::Mac(_) => SignatureScheme::Mac,
        }
    }

    /// The number of messages covered, if the parameters fix one.
    pub fn message_count(&self) -> Option<usize> {
        match self {
            SignatureParams::Bbs(params) => Some(params.message_count()),
            SignatureParams::BbsPlus(params) => Some(params.message_count()),
            SignatureParams::Ps(_) => None,
            SignatureParams::Mac(params) => Some(params.message_count()),
        }
    }
}

/// A signer's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicKey {
    /// BBS public key.
    Bbs(bbs::PublicKey),
    /// BBS+ public key.
    BbsPlus(bbs_plus::PublicKey),
    /// Pointcheval-Sanders public key.
    Ps(ps::PublicKey),
    /// MAC public key; it only checks proofs of validity.
    Mac(mac::PublicKey),
}

impl PublicKey {
    /// The scheme this key belongs to.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            PublicKey::Bbs(_) => SignatureScheme::Bbs,
            PublicKey::BbsPlus(_) => SignatureScheme::BbsPlus,
            PublicKey::Ps(_) => SignatureScheme::Ps,
            PublicKey::Mac(_) => SignatureScheme::Mac,
        }
    }
}

/// A signer's keypair.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPair {
    /// BBS keypair.
    Bbs(bbs::KeyPair),
    /// BBS+ keypair.
    BbsPlus(bbs_plus::KeyPair),
    /// Pointcheval-Sanders keypair.
    Ps(ps::KeyPair),
    /// MAC keypair.
    Mac(mac::KeyPair),
}

impl KeyPair {
    /// Generate a keypair for `message_count` messages under `params`.
    pub fn new(
        rng: &mut impl Rng,
        params: &SignatureParams,
        message_count: usize,
    ) -> Result<Self, Error> {
        if let Some(expected) = params.message_count() {
            if expected != message_count {
                return Err(anoncred_crypto::Error::MessageLengthMismatch {
                    expected,
                    got: message_count,
                }
                .into());
            }
        }
        Ok(match params {
            SignatureParams::Bbs(params) => KeyPair::Bbs(bbs::KeyPair::new(rng, params)),
            SignatureParams::BbsPlus(params) => {
                KeyPair::BbsPlus(bbs_plus::KeyPair::new(rng, params))
            }
            SignatureParams::Ps(params) => KeyPair::Ps(ps::KeyPair::new(rng, params, message_count)),
            SignatureParams::Mac(params) => KeyPair::Mac(mac::KeyPair::new(rng, params)),
        })
    }

    /// The scheme this keypair belongs to.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            KeyPair::Bbs(_) => SignatureScheme::Bbs,
            KeyPair::BbsPlus(_) => SignatureScheme::BbsPlus,
            KeyPair::Ps(_) => SignatureScheme::Ps,
            KeyPair::Mac(_) => SignatureScheme::Mac,
        }
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Bbs(kp) => PublicKey::Bbs(*kp.public_key()),
            KeyPair::BbsPlus(kp) => PublicKey::BbsPlus(*kp.public_key()),
            KeyPair::Ps(kp) => PublicKey::Ps(kp.public_key().clone()),
            KeyPair::Mac(kp) => PublicKey::Mac(*kp.public_key()),
        }
    }

    /// Sign `msg`. MACs come with a proof of validity under the public key.
    pub fn sign(
        &self,
        rng: &mut impl Rng,
        params: &SignatureParams,
        msg: &Message,
    ) -> Result<Signature, Error> {
        match (self, params) {
            (KeyPair::Bbs(kp), SignatureParams::Bbs(params)) => {
                Ok(Signature::Bbs(kp.try_sign(rng, params, msg)?))
            }
            (KeyPair::BbsPlus(kp), SignatureParams::BbsPlus(params)) => {
                Ok(Signature::BbsPlus(kp.try_sign(rng, params, msg)?))
            }
            (KeyPair::Ps(kp), SignatureParams::Ps(_)) => Ok(Signature::Ps(kp.try_sign(rng, msg)?)),
            (KeyPair::Mac(kp), SignatureParams::Mac(params)) => {
                let mac = kp.try_mac(&mut *rng, params, msg)?;
                let validity = kp.prove_validity(rng, params, msg, &mac);
                Ok(Signature::Mac { mac, validity })
            }
            _ => Err(mismatch(self.scheme(), params.scheme())),
        }
    }

    /// Verify `sig` on `msg` with the secret key where the scheme needs one.
    pub fn verify(&self, params: &SignatureParams, msg: &Message, sig: &Signature) -> VerifyResult {
        match (self, params, sig) {
            (KeyPair::Mac(kp), SignatureParams::Mac(params), Signature::Mac { mac, .. }) => {
                if kp.secret_key().verify(params, msg, mac) {
                    VerifyResult::success()
                } else {
                    VerifyResult::failure("MAC did not verify")
                }
            }
            _ => VerificationKey {
                params: params.clone(),
                public_key: self.public_key(),
            }
            .verify(msg, sig),
        }
    }
}

/// A signature or MAC on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signature {
    /// BBS signature.
    Bbs(bbs::Signature),
    /// BBS+ signature.
    BbsPlus(bbs_plus::Signature),
    /// Pointcheval-Sanders signature.
    Ps(ps::Signature),
    /// MAC, with the issuer's proof that it is valid under the public key.
    Mac {
        /// The MAC.
        mac: mac::Mac,
        /// Proof of validity of `mac`.
        validity: mac::ProofOfValidity,
    },
}

impl Signature {
    /// The scheme this signature belongs to.
    pub fn scheme(&self) -> SignatureScheme {
        match self {
            Signature::Bbs(_) => SignatureScheme::Bbs,
            Signature::BbsPlus(_) => SignatureScheme::BbsPlus,
            Signature::Ps(_) => SignatureScheme::Ps,
            Signature::Mac { .. } => SignatureScheme::Mac,
        }
    }

    /// Encode for transport.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(anoncred_crypto::encode(self)?)
    }

    /// Decode a signature written by [`Signature::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(anoncred_crypto::decode(bytes)?)
    }
}

/// Everything a verifier needs from an issuer: parameters and public key of one scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    /// Signature parameters.
    pub params: SignatureParams,
    /// Issuer's public key.
    pub public_key: PublicKey,
}

impl VerificationKey {
    /// Pair parameters with a public key of the same scheme.
    pub fn new(params: SignatureParams, public_key: PublicKey) -> Result<Self, Error> {
        if params.scheme() != public_key.scheme() {
            return Err(mismatch(params.scheme(), public_key.scheme()));
        }
        Ok(Self { params, public_key })
    }

    /// The scheme of this key.
    pub fn scheme(&self) -> SignatureScheme {
        self.params.scheme()
    }

    /// The number of messages this key signs.
    pub fn message_count(&self) -> usize {
        match (&self.params, &self.public_key) {
            (_, PublicKey::Ps(pk)) => pk.message_count(),
            (params, _) => params.message_count().unwrap_or_default(),
        }
    }

    /// Verify `sig` on `msg`. MACs are checked through their proof of validity.
    pub fn verify(&self, msg: &Message, sig: &Signature) -> VerifyResult {
        let verified = match (&self.params, &self.public_key, sig) {
            (SignatureParams::Bbs(params), PublicKey::Bbs(pk), Signature::Bbs(sig)) => {
                pk.verify(params, msg, sig)
            }
            (SignatureParams::BbsPlus(params), PublicKey::BbsPlus(pk), Signature::BbsPlus(sig)) => {
                pk.verify(params, msg, sig)
            }
            (SignatureParams::Ps(_), PublicKey::Ps(pk), Signature::Ps(sig)) => pk.verify(msg, sig),
            (SignatureParams::Mac(params), PublicKey::Mac(pk), Signature::Mac { mac, validity }) => {
                msg.len() == params.message_count() && validity.verify(params, pk, msg, mac)
            }
            _ => {
                return VerifyResult::failure(mismatch(self.scheme(), sig.scheme()).to_string());
            }
        };
        if verified {
            VerifyResult::success()
        } else {
            tracing::warn!(scheme = %self.scheme(), "signature did not verify");
            VerifyResult::failure(format!("{} signature did not verify", self.scheme()))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;

    #[test]
    fn every_scheme_signs_and_verifies() {
        let mut rng = rng();
        for &scheme in &SignatureScheme::ALL {
            let params = SignatureParams::generate_using_label(scheme, b"scheme test", 3);
            let kp = KeyPair::new(&mut rng, &params, 3).unwrap();
            let msg = Message::random(&mut rng, 3);
            let sig = kp.sign(&mut rng, &params, &msg).unwrap();
            assert_eq!(sig.scheme(), scheme);

            let key = VerificationKey::new(params.clone(), kp.public_key()).unwrap();
            assert!(key.verify(&msg, &sig).verified, "{}", scheme);
            assert!(kp.verify(&params, &msg, &sig).verified, "{}", scheme);

            let other = Message::random(&mut rng, 3);
            assert!(!key.verify(&other, &sig).verified, "{}", scheme);
            assert!(!kp.verify(&params, &other, &sig).verified, "{}", scheme);
        }
    }

    #[test]
    fn mixed_schemes_are_rejected() {
        let mut rng = rng();
        let bbs = SignatureParams::new(&mut rng, SignatureScheme::Bbs, 2);
        let mac = SignatureParams::new(&mut rng, SignatureScheme::Mac, 2);
        let kp = KeyPair::new(&mut rng, &bbs, 2).unwrap();
        let msg = Message::random(&mut rng, 2);

        assert_eq!(
            kp.sign(&mut rng, &mac, &msg),
            Err(Error::SchemeMismatch {
                expected: SignatureScheme::Bbs,
                got: SignatureScheme::Mac
            })
        );
        assert!(VerificationKey::new(mac, kp.public_key()).is_err());
    }

    #[test]
    fn keypair_length_must_match_params() {
        let mut rng = rng();
        let params = SignatureParams::new(&mut rng, SignatureScheme::BbsPlus, 2);
        assert!(KeyPair::new(&mut rng, &params, 3).is_err());
    }

    #[test]
    fn proof_types_round_trip() {
        for &scheme in &SignatureScheme::ALL {
            assert_eq!(
                SignatureScheme::from_proof_type(scheme.proof_type()),
                Some(scheme)
            );
        }
        assert_eq!(SignatureScheme::from_proof_type("Ed25519Signature2020"), None);
    }
}
