/*!
Credentials: a subject, optional status and top-level fields, signed under a [`Schema`].

Before signing, a credential is serialized into a canonical object carrying the crypto version, the
canonical JSON of its schema, its subject, its top-level fields, its status block if any, and a
proof block holding only the proof `type`. That object is what the schema encodes and the issuer
signs, so the signature also covers the schema and the scheme.

In JSON, the signature travels base64-encoded as `proof.proofValue`.
*/

use crate::{
    schema::{EncodedMessages, Schema},
    scheme::{KeyPair, Signature, SignatureParams, SignatureScheme, VerificationKey},
    Error, Rng, VerifyResult,
};
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::convert::{TryFrom, TryInto};

/// Version of the credential format written by this crate.
pub const CRYPTO_VERSION: &str = "0.1.0";

/// Field holding the credential format version.
pub const CRYPTO_VERSION_FIELD: &str = "cryptoVersion";
/// Field holding the canonical JSON of the schema.
pub const SCHEMA_FIELD: &str = "credentialSchema";
/// Field holding the subject.
pub const SUBJECT_FIELD: &str = "credentialSubject";
/// Field holding the status block.
pub const STATUS_FIELD: &str = "credentialStatus";
/// Field holding the proof block.
pub const PROOF_FIELD: &str = "proof";
/// Member of the proof block naming the signature scheme.
pub const PROOF_TYPE_FIELD: &str = "type";
/// Member of the proof block holding the encoded signature.
pub const PROOF_VALUE_FIELD: &str = "proofValue";

/// Top-level names that carry credential structure and cannot be used as plain fields.
pub const RESERVED_FIELDS: [&str; 5] = [
    CRYPTO_VERSION_FIELD,
    SCHEMA_FIELD,
    SUBJECT_FIELD,
    STATUS_FIELD,
    PROOF_FIELD,
];

/// A credential, signed or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    crypto_version: String,
    schema: Schema,
    subject: Value,
    status: Option<Value>,
    top_level_fields: Map<String, Value>,
    signature: Option<Signature>,
}

impl Credential {
    /// Start an unsigned credential about `subject`.
    pub fn new(schema: Schema, subject: Value) -> Self {
        Self {
            crypto_version: CRYPTO_VERSION.to_string(),
            schema,
            subject,
            status: None,
            top_level_fields: Map::new(),
            signature: None,
        }
    }

    /// Attach a status block, such as a revocation registry entry.
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = Some(status);
        self
    }

    /// Set a top-level field.
    pub fn with_top_level_field(mut self, name: &str, value: Value) -> Result<Self, Error> {
        if RESERVED_FIELDS.contains(&name) {
            return Err(Error::ReservedFieldName(name.to_string()));
        }
        let _ = self.top_level_fields.insert(name.to_string(), value);
        Ok(self)
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The subject.
    pub fn subject(&self) -> &Value {
        &self.subject
    }

    /// The status block, if any.
    pub fn status(&self) -> Option<&Value> {
        self.status.as_ref()
    }

    /// Top-level fields other than the reserved ones.
    pub fn top_level_fields(&self) -> &Map<String, Value> {
        &self.top_level_fields
    }

    /// The signature, once signed.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// The scheme the credential is signed under, once signed.
    pub fn scheme(&self) -> Option<SignatureScheme> {
        self.signature.as_ref().map(Signature::scheme)
    }

    /// The canonical object signed under `scheme`.
    pub fn serialize_for_signing(&self, scheme: SignatureScheme) -> Result<Value, Error> {
        let mut object = Map::new();
        let _ = object.insert(
            CRYPTO_VERSION_FIELD.to_string(),
            Value::String(self.crypto_version.clone()),
        );
        let _ = object.insert(
            SCHEMA_FIELD.to_string(),
            Value::String(self.schema.to_canonical_json()?),
        );
        let _ = object.insert(SUBJECT_FIELD.to_string(), self.subject.clone());
        for (name, value) in &self.top_level_fields {
            let _ = object.insert(name.clone(), value.clone());
        }
        if let Some(status) = &self.status {
            let _ = object.insert(STATUS_FIELD.to_string(), status.clone());
        }
        let mut proof = Map::new();
        let _ = proof.insert(
            PROOF_TYPE_FIELD.to_string(),
            Value::String(scheme.proof_type().to_string()),
        );
        let _ = object.insert(PROOF_FIELD.to_string(), Value::Object(proof));
        Ok(Value::Object(object))
    }

    /// Encode the canonical object for `scheme` against the schema.
    pub fn encode(&self, scheme: SignatureScheme) -> Result<EncodedMessages, Error> {
        self.schema.encode(&self.serialize_for_signing(scheme)?)
    }

    /// Sign the credential. Fails with [`Error::SchemaMismatch`] before any signing if the
    /// credential does not fit its schema.
    pub fn sign(
        self,
        rng: &mut impl Rng,
        key_pair: &KeyPair,
        params: &SignatureParams,
    ) -> Result<Self, Error> {
        let encoded = self.encode(key_pair.scheme())?;
        let signature = key_pair.sign(rng, params, encoded.messages())?;
        tracing::info!(
            scheme = %key_pair.scheme(),
            messages = encoded.len(),
            "signed credential"
        );
        Ok(self.with_signature(signature))
    }

    pub(crate) fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Verify the signature under the issuer's key.
    pub fn verify(&self, key: &VerificationKey) -> VerifyResult {
        let signature = match &self.signature {
            Some(signature) => signature,
            None => return VerifyResult::failure(Error::MissingSignature.to_string()),
        };
        match self.encode(signature.scheme()) {
            Ok(encoded) => key.verify(encoded.messages(), signature),
            Err(error) => VerifyResult::failure(error.to_string()),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialJson {
    crypto_version: String,
    credential_schema: String,
    credential_subject: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential_status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proof: Option<ProofJson>,
    #[serde(flatten)]
    top_level_fields: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProofJson {
    #[serde(rename = "type")]
    proof_type: String,
    #[serde(with = "crate::serde_base64")]
    proof_value: Vec<u8>,
}

impl TryFrom<&Credential> for CredentialJson {
    type Error = Error;

    fn try_from(credential: &Credential) -> Result<Self, Error> {
        let proof = match &credential.signature {
            Some(signature) => Some(ProofJson {
                proof_type: signature.scheme().proof_type().to_string(),
                proof_value: signature.to_bytes()?,
            }),
            None => None,
        };
        Ok(Self {
            crypto_version: credential.crypto_version.clone(),
            credential_schema: credential.schema.to_canonical_json()?,
            credential_subject: credential.subject.clone(),
            credential_status: credential.status.clone(),
            proof,
            top_level_fields: credential.top_level_fields.clone(),
        })
    }
}

impl TryFrom<CredentialJson> for Credential {
    type Error = Error;

    fn try_from(json: CredentialJson) -> Result<Self, Error> {
        let signature = match json.proof {
            Some(proof) => {
                let signature = Signature::from_bytes(&proof.proof_value)?;
                if signature.scheme().proof_type() != proof.proof_type {
                    return Err(Error::Serialization(format!(
                        "proof type `{}` does not match a {} signature",
                        proof.proof_type,
                        signature.scheme()
                    )));
                }
                Some(signature)
            }
            None => None,
        };
        Ok(Self {
            crypto_version: json.crypto_version,
            schema: Schema::from_json(&json.credential_schema)?,
            subject: json.credential_subject,
            status: json.credential_status,
            top_level_fields: json.top_level_fields,
            signature,
        })
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CredentialJson::try_from(self)
            .map_err(ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        CredentialJson::deserialize(deserializer)?
            .try_into()
            .map_err(de::Error::custom)
    }
}
