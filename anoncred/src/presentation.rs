/*!
Presentations: a proof of possession of one or more credentials, revealing some attributes and
proving others equal across credentials.

The holder collects credentials in a [`PresentationBuilder`], marks what to reveal and which
attributes must match, and finalizes into a [`Presentation`]. The credential version, schema and
proof type are always revealed, so the verifier can resolve attribute names and check that the
presented schema is the signed one. Both sides derive the proof specification from the same
public data, so the [`ProofSpec`] itself never travels.
*/

use crate::{
    credential::{
        Credential, CRYPTO_VERSION, CRYPTO_VERSION_FIELD, PROOF_FIELD, PROOF_TYPE_FIELD,
        SCHEMA_FIELD,
    },
    disclosure::{encode_revealed, partition},
    meta_statements::{build_equality, MetaStatements},
    proof_spec::{Proof, ProofEngine, ProofSpec, SetupParams, Statements, Witnesses},
    schema::Schema,
    scheme::{SignatureScheme, VerificationKey},
    statements::{signature_statement, signature_witness, KeySource},
    types::*,
    Error, Rng, VerifyResult,
};
use anoncred_crypto::mac::KeyedProof;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Attributes revealed in every presentation.
pub const ALWAYS_REVEALED: [&str; 3] = [CRYPTO_VERSION_FIELD, SCHEMA_FIELD, "proof.type"];

/// An equality constraint: `(credential index, attribute name)` pairs that hold the same value.
pub type Equality = BTreeSet<(usize, String)>;

#[derive(Debug)]
struct Entry<'a> {
    credential: &'a Credential,
    scheme: SignatureScheme,
    key: &'a VerificationKey,
    revealed: BTreeSet<String>,
}

/// Collects credentials and disclosure choices for a [`Presentation`].
#[derive(Debug, Default)]
pub struct PresentationBuilder<'a> {
    entries: Vec<Entry<'a>>,
    equalities: Vec<Equality>,
    context: Option<String>,
}

/// One credential as seen by the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedCredential {
    /// The credential's schema.
    pub schema: Schema,
    /// The scheme the credential was signed under.
    pub scheme: SignatureScheme,
    /// The revealed attribute values, nested as in the credential.
    pub revealed: Value,
}

/// A proof of possession of credentials with selective disclosure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    credentials: Vec<PresentedCredential>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    equalities: Vec<Equality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    proof: Proof,
}

/// Assemble the proof specification of a presentation from public data.
///
/// Keys shared by several credentials are stored once in the setup parameters.
fn assemble(
    credentials: &[(&Schema, &VerificationKey, BTreeMap<usize, Scalar>)],
    equalities: &[Equality],
    context: Option<&str>,
) -> Result<ProofSpec, Error> {
    let mut setup_params = SetupParams::default();
    let mut statements = Statements::new();
    for (_, key, revealed) in credentials {
        let source = KeySource::setup(key, &mut setup_params)?;
        let _ = statements.add(signature_statement(source, revealed)?);
    }

    let mut meta_statements = MetaStatements::new();
    for equality in equalities {
        let mut by_credential: BTreeMap<usize, (Vec<String>, &Schema)> = BTreeMap::new();
        for (i, name) in equality {
            let (schema, _, _) = credentials.get(*i).ok_or(Error::IndexOutOfRange {
                index: *i,
                count: credentials.len(),
            })?;
            by_credential
                .entry(*i)
                .or_insert_with(|| (Vec::new(), *schema))
                .0
                .push(name.clone());
        }
        let _ = meta_statements.add(build_equality(&by_credential)?);
    }

    Ok(ProofSpec::new(
        statements,
        meta_statements,
        setup_params,
        context.map(|context| context.as_bytes().to_vec()),
    ))
}

impl<'a> PresentationBuilder<'a> {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signed credential with its issuer's key, returning its index in the presentation.
    pub fn add_credential(
        &mut self,
        credential: &'a Credential,
        key: &'a VerificationKey,
    ) -> Result<usize, Error> {
        let scheme = credential.scheme().ok_or(Error::MissingSignature)?;
        if scheme != key.scheme() {
            return Err(Error::SchemeMismatch {
                expected: key.scheme(),
                got: scheme,
            });
        }
        self.entries.push(Entry {
            credential,
            scheme,
            key,
            revealed: ALWAYS_REVEALED.iter().map(|name| name.to_string()).collect(),
        });
        Ok(self.entries.len() - 1)
    }

    /// Reveal the named attributes of credential `index`.
    pub fn mark_revealed<S: Into<String>>(
        &mut self,
        index: usize,
        names: impl IntoIterator<Item = S>,
    ) -> Result<(), Error> {
        let count = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, count })?;
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let _ = entry
            .credential
            .schema()
            .indices_of(names.iter().map(String::as_str))?;
        entry.revealed.extend(names);
        Ok(())
    }

    /// Require the named attributes, each given with its credential index, to be equal. Returns
    /// the index of the constraint.
    pub fn enforce_equality<S: Into<String>>(
        &mut self,
        attributes: impl IntoIterator<Item = (usize, S)>,
    ) -> Result<usize, Error> {
        let equality: Equality = attributes
            .into_iter()
            .map(|(i, name)| (i, name.into()))
            .collect();
        if equality.len() < 2 {
            return Err(Error::InvalidProofSpec(
                "an equality needs at least two attributes".to_string(),
            ));
        }

        let mut unknown = Vec::new();
        for (i, name) in &equality {
            let entry = self.entries.get(*i).ok_or(Error::IndexOutOfRange {
                index: *i,
                count: self.entries.len(),
            })?;
            if entry.credential.schema().index_of(name).is_none() {
                unknown.push(name.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(Error::UnknownFieldName {
                count: unknown.len(),
                names: unknown,
            });
        }

        self.equalities.push(equality);
        Ok(self.equalities.len() - 1)
    }

    /// Bind the presentation to an application context, such as the verifier's domain.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check every equality constraint against the credentials' values.
    fn check_equalities(&self) -> Result<(), Error> {
        for equality in &self.equalities {
            let mut values = Vec::with_capacity(equality.len());
            for (i, name) in equality {
                let entry = &self.entries[*i];
                let value = entry
                    .credential
                    .encode(entry.scheme)?
                    .get(name)
                    .ok_or(Error::UnknownFieldName {
                        count: 1,
                        names: vec![name.clone()],
                    })?;
                values.push((*i, name, value));
            }
            if let Some((j, other, expected)) = values.first() {
                if let Some((i, name, _)) = values.iter().find(|(_, _, value)| value != expected) {
                    return Err(Error::EqualityViolation(format!(
                        "`{}` of credential {} differs from `{}` of credential {}",
                        name, i, other, j
                    )));
                }
            }
        }
        Ok(())
    }

    /// Prove possession of the credentials, bound to `nonce`.
    ///
    /// Fails with [`Error::EqualityViolation`] before proving if constrained attributes differ.
    pub fn finalize(
        self,
        rng: &mut impl Rng,
        engine: &impl ProofEngine,
        nonce: Option<&[u8]>,
    ) -> Result<Presentation, Error> {
        if self.entries.is_empty() {
            return Err(Error::InvalidProofSpec(
                "a presentation needs at least one credential".to_string(),
            ));
        }
        self.check_equalities()?;

        let mut parts = Vec::with_capacity(self.entries.len());
        let mut witnesses = Witnesses::new();
        let mut presented = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let schema = entry.credential.schema();
            let object = entry.credential.serialize_for_signing(entry.scheme)?;
            let partition = partition(&object, schema, &entry.revealed)?;
            let signature = entry.credential.signature().ok_or(Error::MissingSignature)?;
            let _ = witnesses.add(signature_witness(entry.key, signature, &partition.unrevealed)?);
            parts.push((schema, entry.key, partition.revealed));
            presented.push(PresentedCredential {
                schema: schema.clone(),
                scheme: entry.scheme,
                revealed: partition.revealed_values,
            });
        }

        let spec = assemble(&parts, &self.equalities, self.context.as_deref())?;
        let proof = spec.generate(engine, rng, &witnesses, nonce)?;
        tracing::info!(
            credentials = presented.len(),
            equalities = self.equalities.len(),
            "created presentation"
        );

        Ok(Presentation {
            credentials: presented,
            equalities: self.equalities,
            context: self.context,
            proof,
        })
    }
}

impl Presentation {
    /// The presented credentials, in the order they were added.
    pub fn credentials(&self) -> &[PresentedCredential] {
        &self.credentials
    }

    /// The equality constraints proven.
    pub fn equalities(&self) -> &[Equality] {
        &self.equalities
    }

    /// The application context, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The composite proof.
    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    fn check_reserved(credential: &PresentedCredential) -> Result<(), Error> {
        let revealed = &credential.revealed;
        if revealed[CRYPTO_VERSION_FIELD] != CRYPTO_VERSION {
            return Err(Error::VerificationFailed(
                "unsupported credential version".to_string(),
            ));
        }
        if revealed[SCHEMA_FIELD] != Value::String(credential.schema.to_canonical_json()?) {
            return Err(Error::VerificationFailed(
                "presented schema is not the signed schema".to_string(),
            ));
        }
        if revealed[PROOF_FIELD][PROOF_TYPE_FIELD] != credential.scheme.proof_type() {
            return Err(Error::VerificationFailed(
                "proof type does not match the scheme".to_string(),
            ));
        }
        Ok(())
    }

    fn spec(&self, keys: &[VerificationKey]) -> Result<ProofSpec, Error> {
        if keys.len() != self.credentials.len() {
            return Err(Error::InvalidProofSpec(format!(
                "expected {} verification keys, got {}",
                self.credentials.len(),
                keys.len()
            )));
        }
        let mut parts = Vec::with_capacity(keys.len());
        for (credential, key) in self.credentials.iter().zip(keys) {
            if credential.scheme != key.scheme() {
                return Err(Error::SchemeMismatch {
                    expected: key.scheme(),
                    got: credential.scheme,
                });
            }
            Self::check_reserved(credential)?;
            let revealed = encode_revealed(&credential.revealed, &credential.schema)?;
            parts.push((&credential.schema, key, revealed));
        }
        assemble(&parts, &self.equalities, self.context.as_deref())
    }

    /// Verify the presentation against the issuers' keys, one per credential in order, and the
    /// nonce the verifier sent.
    ///
    /// MAC credentials are only checked up to the public proof of validity; the issuer completes
    /// the check with [`Config::verify_presentation`](crate::issuer::Config::verify_presentation).
    pub fn verify(
        &self,
        engine: &impl ProofEngine,
        keys: &[VerificationKey],
        nonce: Option<&[u8]>,
    ) -> VerifyResult {
        let result = match self.spec(keys) {
            Ok(spec) => spec.verify(engine, &self.proof, nonce),
            Err(error) => VerifyResult::failure(error.to_string()),
        };
        if result.verified {
            tracing::info!(credentials = self.credentials.len(), "verified presentation");
        } else {
            tracing::warn!(reason = ?result.error, "presentation did not verify");
        }
        result
    }

    /// The keyed halves of the proofs of MAC credentials, by credential index.
    pub fn keyed_proofs(
        &self,
        engine: &impl ProofEngine,
    ) -> Result<BTreeMap<usize, KeyedProof>, Error> {
        engine.keyed_proofs(self.proof.as_bytes())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a presentation written by [`Presentation::to_json`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
