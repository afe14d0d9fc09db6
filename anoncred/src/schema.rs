/*!
Schemas: the shape of a credential and the encoding of each of its leaves.

A [`Schema`] is a tree of named nodes and lists whose leaves carry an [`EncodingKind`]. Flattening
it yields every leaf path (`a.b`, `items.0.name`) in lexicographic order; the position of a path in
that order is the message index of its value. Issuer, holder and verifier all derive the same
indices from the same schema, which is why field names may not contain `.` and why the canonical
JSON form of a schema is signed into every credential.
*/

use crate::{
    credential::{
        CRYPTO_VERSION_FIELD, PROOF_FIELD, PROOF_TYPE_FIELD, RESERVED_FIELDS, SCHEMA_FIELD,
        STATUS_FIELD, SUBJECT_FIELD,
    },
    encoding::EncodingKind,
    scheme::{SignatureParams, SignatureScheme},
    types::*,
    Error, Message,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    convert::TryFrom,
};

/// Version written into schemas created by this crate.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Label for signature parameters when a schema names none.
pub const DEFAULT_PARAMETER_LABEL: &[u8] = b"anoncred default signature parameters";

/// A node of a schema.
///
/// A leaf is written as an object with a `type` member, as in `{"type": "string"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageStructure {
    /// A single encoded value.
    Leaf(EncodingKind),
    /// Positional children, addressed by their index.
    List(Vec<MessageStructure>),
    /// Named children.
    Node(BTreeMap<String, MessageStructure>),
}

impl From<EncodingKind> for MessageStructure {
    fn from(kind: EncodingKind) -> Self {
        MessageStructure::Leaf(kind)
    }
}

/// A validated schema, with its flattened leaves cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSchema", into = "UncheckedSchema")]
pub struct Schema {
    version: String,
    structure: BTreeMap<String, MessageStructure>,
    parameter_label: Option<String>,
    leaves: Vec<(String, EncodingKind)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedSchema {
    version: String,
    structure: BTreeMap<String, MessageStructure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameter_label: Option<String>,
}

impl TryFrom<UncheckedSchema> for Schema {
    type Error = Error;

    fn try_from(unchecked: UncheckedSchema) -> Result<Self, Self::Error> {
        let mut leaves = Vec::new();
        if unchecked.structure.is_empty() {
            return Err(Error::InvalidSchema("schema has no fields".to_string()));
        }
        for (name, child) in &unchecked.structure {
            flatten_structure(&join("", name)?, child, &mut leaves)?;
        }
        leaves.sort_by(|(a, _), (b, _)| a.cmp(b));

        Ok(Self {
            version: unchecked.version,
            structure: unchecked.structure,
            parameter_label: unchecked.parameter_label,
            leaves,
        })
    }
}

impl From<Schema> for UncheckedSchema {
    fn from(schema: Schema) -> Self {
        Self {
            version: schema.version,
            structure: schema.structure,
            parameter_label: schema.parameter_label,
        }
    }
}

fn join(prefix: &str, segment: &str) -> Result<String, Error> {
    if segment.is_empty() || segment.contains('.') {
        return Err(Error::InvalidSchema(format!(
            "field name `{}` under `{}` must be non-empty and contain no `.`",
            segment, prefix
        )));
    }
    Ok(if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    })
}

fn flatten_structure(
    path: &str,
    structure: &MessageStructure,
    leaves: &mut Vec<(String, EncodingKind)>,
) -> Result<(), Error> {
    match structure {
        MessageStructure::Leaf(kind) => {
            kind.validate(path)?;
            leaves.push((path.to_string(), kind.clone()))
        }
        MessageStructure::List(items) if items.is_empty() => {
            return Err(Error::InvalidSchema(format!("list `{}` is empty", path)))
        }
        MessageStructure::Node(children) if children.is_empty() => {
            return Err(Error::InvalidSchema(format!("node `{}` is empty", path)))
        }
        MessageStructure::List(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_structure(&join(path, &i.to_string())?, item, leaves)?;
            }
        }
        MessageStructure::Node(children) => {
            for (name, child) in children {
                flatten_structure(&join(path, name)?, child, leaves)?;
            }
        }
    }
    Ok(())
}

/// Flatten a JSON value into its leaf paths. Objects and arrays are structure; everything else is
/// a leaf.
pub(crate) fn flatten_value<'a>(
    path: String,
    value: &'a Value,
    leaves: &mut BTreeMap<String, &'a Value>,
) {
    let child = |segment: &str| {
        if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", path, segment)
        }
    };
    match value {
        Value::Object(members) => {
            for (name, member) in members {
                flatten_value(child(name), member, leaves);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_value(child(&i.to_string()), item, leaves);
            }
        }
        _ => {
            let _ = leaves.insert(path, value);
        }
    }
}

/// An object encoded against a schema: leaf paths and their field elements, in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessages {
    names: Vec<String>,
    messages: Message,
}

impl EncodedMessages {
    /// Leaf paths in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The encoded message vector.
    pub fn messages(&self) -> &Message {
        &self.messages
    }

    /// Consume into the encoded message vector.
    pub fn into_messages(self) -> Message {
        self.messages
    }

    /// The number of encoded leaves.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no encoded leaves.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The encoded value at leaf `name`.
    pub fn get(&self, name: &str) -> Option<Scalar> {
        self.names
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .ok()
            .map(|i| self.messages[i])
    }
}

impl Schema {
    /// Create a schema from its top-level fields.
    pub fn new(structure: BTreeMap<String, MessageStructure>) -> Result<Self, Error> {
        Self::try_from(UncheckedSchema {
            version: SCHEMA_VERSION.to_string(),
            structure,
            parameter_label: None,
        })
    }

    /// Create a schema for a credential whose subject has the given fields.
    ///
    /// The schema also declares the fields every credential carries: the crypto version, the
    /// schema itself and the proof type.
    pub fn for_credential(subject: BTreeMap<String, MessageStructure>) -> Result<Self, Error> {
        let mut structure = BTreeMap::new();
        let _ = structure.insert(
            CRYPTO_VERSION_FIELD.to_string(),
            EncodingKind::ReversibleString.into(),
        );
        let _ = structure.insert(SCHEMA_FIELD.to_string(), EncodingKind::String.into());
        let _ = structure.insert(
            SUBJECT_FIELD.to_string(),
            MessageStructure::Node(subject),
        );
        let mut proof = BTreeMap::new();
        let _ = proof.insert(PROOF_TYPE_FIELD.to_string(), EncodingKind::String.into());
        let _ = structure.insert(PROOF_FIELD.to_string(), MessageStructure::Node(proof));
        Self::new(structure)
    }

    /// Add a credential status block with the given fields.
    pub fn with_status(self, status: BTreeMap<String, MessageStructure>) -> Result<Self, Error> {
        self.with_field(STATUS_FIELD, MessageStructure::Node(status))
    }

    /// Add a top-level credential field, such as an issuance date.
    pub fn with_top_level_field(
        self,
        name: &str,
        structure: MessageStructure,
    ) -> Result<Self, Error> {
        if RESERVED_FIELDS.contains(&name) {
            return Err(Error::ReservedFieldName(name.to_string()));
        }
        self.with_field(name, structure)
    }

    fn with_field(self, name: &str, structure: MessageStructure) -> Result<Self, Error> {
        let mut unchecked = UncheckedSchema::from(self);
        let _ = unchecked.structure.insert(name.to_string(), structure);
        Self::try_from(unchecked)
    }

    /// Derive signature parameters from this label instead of the default one.
    pub fn with_parameter_label(mut self, label: impl Into<String>) -> Self {
        self.parameter_label = Some(label.into());
        self
    }

    /// Schema version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Top-level fields.
    pub fn structure(&self) -> &BTreeMap<String, MessageStructure> {
        &self.structure
    }

    /// Every leaf path with its encoding, in index order.
    pub fn leaves(&self) -> &[(String, EncodingKind)] {
        &self.leaves
    }

    /// The number of messages a credential under this schema signs.
    pub fn message_count(&self) -> usize {
        self.leaves.len()
    }

    /// Message index of leaf `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.leaves
            .binary_search_by(|(path, _)| path.as_str().cmp(name))
            .ok()
    }

    /// Encoding of leaf `name`.
    pub fn kind_of(&self, name: &str) -> Option<&EncodingKind> {
        self.index_of(name).map(|i| &self.leaves[i].1)
    }

    /// Indices of the leaves `names`, failing with every name that is not a leaf.
    pub fn indices_of<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<BTreeSet<usize>, Error> {
        let mut indices = BTreeSet::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.index_of(name) {
                Some(i) => {
                    let _ = indices.insert(i);
                }
                None => unknown.push(name.to_string()),
            }
        }
        if unknown.is_empty() {
            Ok(indices)
        } else {
            Err(Error::UnknownFieldName {
                count: unknown.len(),
                names: unknown,
            })
        }
    }

    /// Encode `object`, whose leaf paths must be exactly those of the schema.
    pub fn encode(&self, object: &Value) -> Result<EncodedMessages, Error> {
        let mut values = BTreeMap::new();
        flatten_value(String::new(), object, &mut values);

        let missing: Vec<String> = self
            .leaves
            .iter()
            .filter(|(path, _)| !values.contains_key(path))
            .map(|(path, _)| path.clone())
            .collect();
        let unexpected: Vec<String> = values
            .keys()
            .filter(|path| self.index_of(path).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            tracing::debug!(?missing, ?unexpected, "object does not match schema");
            return Err(Error::SchemaMismatch {
                missing,
                unexpected,
            });
        }

        let messages = self
            .leaves
            .iter()
            .map(|(path, kind)| kind.encode(path, values[path]))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(leaves = messages.len(), "encoded object against schema");

        Ok(EncodedMessages {
            names: self.leaves.iter().map(|(path, _)| path.clone()).collect(),
            messages: Message::new(messages),
        })
    }

    /// The canonical JSON form: keys sorted at every level, no insignificant whitespace.
    pub fn to_canonical_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a schema from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Signature parameters for credentials under this schema, derived from its label.
    pub fn signature_params(&self, scheme: SignatureScheme) -> SignatureParams {
        let label = self
            .parameter_label
            .as_ref()
            .map(String::as_bytes)
            .unwrap_or(DEFAULT_PARAMETER_LABEL);
        SignatureParams::generate_using_label(scheme, label, self.message_count())
    }
}
