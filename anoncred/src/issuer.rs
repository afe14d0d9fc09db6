/*!
The issuer's side of issuance and of keyed verification.

An issuer [`Config`] holds the signature parameters and keypair for one schema and scheme. It
signs complete credentials, answers checked [`BlindSignatureRequest`]s, and for MACs runs the
checks that need its secret key.
*/

use crate::{
    blind::{BlindSignature, BlindSignatureRequest},
    credential::Credential,
    presentation::Presentation,
    proof_spec::ProofEngine,
    schema::Schema,
    scheme::{KeyPair, SignatureParams, SignatureScheme, VerificationKey},
    Error, Message, Rng, VerifyResult,
};

/// Signing material of an issuer.
#[derive(Debug)]
pub struct Config {
    params: SignatureParams,
    key_pair: KeyPair,
}

impl Config {
    /// Generate a keypair for credentials of `schema` under `scheme`, using the schema's
    /// deterministic parameters.
    pub fn new(rng: &mut impl Rng, scheme: SignatureScheme, schema: &Schema) -> Result<Self, Error> {
        let params = schema.signature_params(scheme);
        let key_pair = KeyPair::new(rng, &params, schema.message_count())?;
        tracing::info!(%scheme, messages = schema.message_count(), "generated issuer keys");
        Ok(Self { params, key_pair })
    }

    /// Use existing parameters and keypair.
    pub fn from_parts(params: SignatureParams, key_pair: KeyPair) -> Result<Self, Error> {
        if params.scheme() != key_pair.scheme() {
            return Err(Error::SchemeMismatch {
                expected: params.scheme(),
                got: key_pair.scheme(),
            });
        }
        Ok(Self { params, key_pair })
    }

    /// The scheme this issuer signs under.
    pub fn scheme(&self) -> SignatureScheme {
        self.key_pair.scheme()
    }

    /// The signature parameters.
    pub fn params(&self) -> &SignatureParams {
        &self.params
    }

    /// What holders and verifiers need to check this issuer's signatures.
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey {
            params: self.params.clone(),
            public_key: self.key_pair.public_key(),
        }
    }

    /// Sign a credential whose every attribute the issuer knows.
    pub fn issue(&self, rng: &mut impl Rng, credential: Credential) -> Result<Credential, Error> {
        credential.sign(rng, &self.key_pair, &self.params)
    }

    /// Check a blind signature request against `schema` and `nonce`, then sign it.
    pub fn blind_sign(
        &self,
        rng: &mut impl Rng,
        engine: &impl ProofEngine,
        schema: &Schema,
        request: &BlindSignatureRequest,
        nonce: Option<&[u8]>,
    ) -> Result<BlindSignature, Error> {
        let checked = request.verify(engine, &self.verification_key(), schema, nonce)?;
        let blind_signature = match (&self.key_pair, &self.params) {
            (KeyPair::Bbs(kp), SignatureParams::Bbs(params)) => {
                let messages = Message::new(checked.known.values().copied().collect());
                BlindSignature::Bbs(kp.try_sign(rng, params, &messages)?)
            }
            (KeyPair::BbsPlus(kp), SignatureParams::BbsPlus(params)) => {
                BlindSignature::BbsPlus(kp.blind_sign(
                    rng,
                    params,
                    checked.commitment()?,
                    &checked.blinded,
                    &checked.known,
                )?)
            }
            (KeyPair::Ps(kp), SignatureParams::Ps(_)) => BlindSignature::Ps(kp.blind_sign(
                checked.commitment()?,
                &checked.index_commitments,
                &checked.known,
            )?),
            (KeyPair::Mac(kp), SignatureParams::Mac(params)) => BlindSignature::Mac(
                kp.blind_mac(rng, params, checked.commitment()?, &checked.blinded, &checked.known)?,
            ),
            _ => {
                return Err(Error::Unsupported(format!(
                    "{} signatures cannot be issued blindly",
                    self.scheme()
                )))
            }
        };
        tracing::info!(
            scheme = %self.scheme(),
            hidden = checked.blinded.len(),
            "issued blind signature"
        );
        Ok(blind_signature)
    }

    /// Verify a credential signed by this issuer. MACs are checked with the secret key.
    pub fn verify_credential(&self, credential: &Credential) -> VerifyResult {
        let signature = match credential.signature() {
            Some(signature) => signature,
            None => return VerifyResult::failure(Error::MissingSignature.to_string()),
        };
        match credential.encode(signature.scheme()) {
            Ok(encoded) => self
                .key_pair
                .verify(&self.params, encoded.messages(), signature),
            Err(error) => VerifyResult::failure(error.to_string()),
        }
    }

    /// Verify a presentation, including the keyed half of the proof for every MAC credential
    /// issued under this key.
    ///
    /// `keys` lists the verification key of each presented credential, in order.
    pub fn verify_presentation(
        &self,
        engine: &impl ProofEngine,
        presentation: &Presentation,
        keys: &[VerificationKey],
        nonce: Option<&[u8]>,
    ) -> VerifyResult {
        let result = presentation.verify(engine, keys, nonce);
        if !result.verified {
            return result;
        }
        let secret_key = match &self.key_pair {
            KeyPair::Mac(kp) => kp.secret_key(),
            _ => return result,
        };

        let own_key = self.verification_key();
        let keyed = match presentation.keyed_proofs(engine) {
            Ok(keyed) => keyed,
            Err(error) => return VerifyResult::failure(error.to_string()),
        };
        for (i, key) in keys.iter().enumerate() {
            if *key != own_key {
                continue;
            }
            match keyed.get(&i) {
                Some(proof) if secret_key.verify_keyed_proof(proof) => {}
                _ => {
                    tracing::warn!(credential = i, "keyed proof did not verify");
                    return VerifyResult::failure(format!(
                        "keyed proof of credential {} did not verify",
                        i
                    ));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        encoding::EncodingKind, presentation::PresentationBuilder, proof_spec::NativeEngine,
        test::rng,
    };
    use serde_json::json;

    fn schema() -> Schema {
        let subject = vec![
            ("name".to_string(), EncodingKind::String.into()),
            ("age".to_string(), EncodingKind::Integer { minimum: 0, maximum: Some(150) }.into()),
        ]
        .into_iter()
        .collect();
        Schema::for_credential(subject).unwrap()
    }

    fn credential() -> Credential {
        Credential::new(schema(), json!({"name": "Ann", "age": 33}))
    }

    #[test]
    fn issued_credentials_verify_for_every_scheme() {
        let mut rng = rng();
        for &scheme in &SignatureScheme::ALL {
            let issuer = Config::new(&mut rng, scheme, &schema()).unwrap();
            let credential = issuer.issue(&mut rng, credential()).unwrap();
            assert!(credential.verify(&issuer.verification_key()).verified);
            assert!(issuer.verify_credential(&credential).verified, "{}", scheme);
        }
    }

    #[test]
    fn parts_must_share_a_scheme() {
        let mut rng = rng();
        let params = schema().signature_params(SignatureScheme::Bbs);
        let bbs_plus = schema().signature_params(SignatureScheme::BbsPlus);
        let key_pair = KeyPair::new(&mut rng, &bbs_plus, schema().message_count()).unwrap();
        assert!(matches!(
            Config::from_parts(params, key_pair),
            Err(Error::SchemeMismatch { .. })
        ));
    }

    #[test]
    fn mac_issuer_checks_keyed_proofs() {
        let mut rng = rng();
        let issuer = Config::new(&mut rng, SignatureScheme::Mac, &schema()).unwrap();
        let other = Config::new(&mut rng, SignatureScheme::Mac, &schema()).unwrap();
        let credential = issuer.issue(&mut rng, credential()).unwrap();
        let key = issuer.verification_key();

        let mut builder = PresentationBuilder::new();
        let i = builder.add_credential(&credential, &key).unwrap();
        builder.mark_revealed(i, vec!["credentialSubject.name"]).unwrap();
        let presentation = builder.finalize(&mut rng, &NativeEngine, None).unwrap();
        let keys = [key.clone()];

        assert!(presentation.verify(&NativeEngine, &keys, None).verified);
        assert!(issuer
            .verify_presentation(&NativeEngine, &presentation, &keys, None)
            .verified);

        assert!(!other
            .verify_presentation(&NativeEngine, &presentation, &keys, Some(&b"nonce"[..]))
            .verified);
    }
}
