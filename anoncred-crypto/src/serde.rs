//! Utilities for serializing and deserializing `anoncred_crypto` types using Serde.
//!
//! [`SerializeElement`] looks to Serde like a "module" which can be used with the `#[serde(with =
//! "SerializeElement")]` syntax in order to add serialization/deserialization functionality to
//! bls12-381 types which otherwise do not provide `Serialize` and `Deserialize` implementations.
//! It is also implemented for the containers this crate keeps elements in: vectors of elements and
//! maps from message index to element.

use crate::common::*;
use serde::{
    de::{self, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{collections::BTreeMap, fmt, marker::PhantomData};

#[derive(Serialize)]
#[serde(transparent)]
struct SerWrapper<'a, G: SerializeElement>(
    #[serde(serialize_with = "<G as SerializeElement>::serialize")] &'a G,
);

#[derive(Deserialize)]
#[serde(transparent)]
struct DeWrapper<G: SerializeElement>(#[serde(with = "SerializeElement")] G);

/// Serialization/deserialization functionality for external `bls12_381` types.
///
/// Currently, serialization/deserialization for BLS12 `G1` and `G2` elements rely on the
/// `bls12_381` crate's compressed encoding scheme.
pub trait SerializeElement: Sized {
    /// Proxy serialization function telling serde how to serialize the implementing type.
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer;

    /// Proxy deserialization function telling serde how to deserialize the implementing type.
    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>;
}

/// Compressed encoding for an affine point type, with its projective form going through it.
macro_rules! compressed_point {
    ($affine:ty, $projective:ty) => {
        impl SerializeElement for $affine {
            fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serde_big_array::BigArray::serialize(&this.to_compressed(), serializer)
            }

            fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let bytes = serde_big_array::BigArray::deserialize(deserializer)?;
                Option::<$affine>::from(<$affine>::from_compressed(&bytes))
                    .ok_or_else(|| de::Error::custom("invalid element encoding"))
            }
        }

        impl SerializeElement for $projective {
            fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                <$affine as SerializeElement>::serialize(&this.into(), serializer)
            }

            fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                <$affine as SerializeElement>::deserialize(deserializer).map(Into::into)
            }
        }
    };
}

compressed_point!(G1Affine, G1Projective);
compressed_point!(G2Affine, G2Projective);

impl SerializeElement for Scalar {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        this.to_bytes().serialize(serializer)
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        let maybe_scalar: Option<Scalar> = Scalar::from_bytes(&bytes).into();
        maybe_scalar.ok_or_else(|| de::Error::custom("invalid scalar encoding"))
    }
}

impl<G: SerializeElement> SerializeElement for Vec<G> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(this.len()))?;
        for g in this {
            seq.serialize_element(&SerWrapper(g))?;
        }
        seq.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ElementVisitor<G> {
            _phantom: PhantomData<G>,
        }

        impl<'de, G> Visitor<'de> for ElementVisitor<G>
        where
            G: SerializeElement,
        {
            type Value = Vec<G>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of elements")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                // Cap the preallocation; the hint comes from untrusted input.
                let mut elems = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
                while let Some(elem) = seq.next_element::<DeWrapper<G>>()? {
                    elems.push(elem.0);
                }
                Ok(elems)
            }
        }

        let visitor = ElementVisitor {
            _phantom: PhantomData,
        };

        deserializer.deserialize_seq(visitor)
    }
}

impl<G: SerializeElement> SerializeElement for BTreeMap<usize, G> {
    fn serialize<S>(this: &Self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(this.len()))?;
        for (index, g) in this {
            map.serialize_entry(index, &SerWrapper(g))?;
        }
        map.end()
    }

    fn deserialize<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wrapped = BTreeMap::<usize, DeWrapper<G>>::deserialize(deserializer)?;
        Ok(wrapped.into_iter().map(|(index, g)| (index, g.0)).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::rng;
    use ff::Field;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Elements {
        #[serde(with = "SerializeElement")]
        g1: G1Projective,
        #[serde(with = "SerializeElement")]
        g2: G2Affine,
        #[serde(with = "SerializeElement")]
        revealed: BTreeMap<usize, Scalar>,
    }

    #[test]
    fn elements_survive_bincode() {
        let mut rng = rng();
        let mut revealed = BTreeMap::new();
        let _ = revealed.insert(3, Scalar::random(&mut rng));
        let _ = revealed.insert(7, Scalar::random(&mut rng));
        let elements = Elements {
            g1: random_non_identity(&mut rng),
            g2: G2Projective::random(&mut rng).into(),
            revealed,
        };

        let bytes = crate::encode(&elements).unwrap();
        let decoded: Elements = crate::decode(&bytes).unwrap();
        assert_eq!(elements, decoded);
    }

    #[test]
    fn non_canonical_scalar_is_rejected() {
        let bytes = crate::encode(&[0xffu8; 32]).unwrap();
        let decoded: Result<DeWrapper<Scalar>, _> = crate::decode(&bytes);
        assert!(decoded.is_err(), "scalar above the modulus was accepted");
    }
}
