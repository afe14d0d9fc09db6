/*!
Encodings of JSON leaf values as field elements.

Every leaf of a [`Schema`](crate::schema::Schema) declares one [`EncodingKind`]. Encoding is
deterministic and injective within a kind: strings and byte strings are hashed, numbers are shifted
by their declared minimum so that they land in `0..2^64`, and short strings can be packed
reversibly so a verifier can read them back from a revealed message.
*/

use crate::{types::*, Error};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Sha3_512};
use std::convert::TryFrom;

/// Milliseconds from the Unix epoch to `0001-01-01T00:00:00Z`, the earliest encodable timestamp.
pub const TIMESTAMP_MINIMUM: i64 = -62_135_596_800_000;

/// The longest string, in bytes, that [`EncodingKind::ReversibleString`] accepts.
pub const MAX_REVERSIBLE_STRING_LEN: usize = 30;

/// Largest scaled decimal that an `f64` still represents exactly.
const MAX_EXACT_DECIMAL: f64 = 9_007_199_254_740_992.0;

/// The most decimal places a [`EncodingKind::Decimal`] may declare.
pub const MAX_DECIMAL_PLACES: u32 = 15;

const STRING_DOMAIN: &[u8] = b"anoncred string encoding";
const BYTES_DOMAIN: &[u8] = b"anoncred bytes encoding";

/// How a leaf value is turned into a field element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EncodingKind {
    /// Any string, hashed.
    String,
    /// A UTF-8 string of at most [`MAX_REVERSIBLE_STRING_LEN`] bytes, packed so it can be decoded.
    ReversibleString,
    /// A whole number in `minimum..=maximum`.
    Integer {
        /// Smallest admitted value.
        minimum: i64,
        /// Largest admitted value, if bounded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    /// A number with at most `decimal_places` digits after the point, at least `minimum`.
    #[serde(rename_all = "camelCase")]
    Decimal {
        /// Smallest admitted value.
        minimum: f64,
        /// Number of digits kept after the decimal point.
        decimal_places: u32,
    },
    /// An RFC 3339 date-time, a `YYYY-MM-DD` date, or milliseconds since the Unix epoch.
    Timestamp,
    /// `true` or `false`.
    Boolean,
    /// A standard base64 string, hashed as the decoded bytes.
    Bytes,
}

impl EncodingKind {
    /// Check the kind's own parameters, for the leaf at `path`.
    pub fn validate(&self, path: &str) -> Result<(), Error> {
        match self {
            EncodingKind::Integer {
                minimum,
                maximum: Some(maximum),
            } if maximum < minimum => Err(Error::InvalidSchema(format!(
                "`{}` has maximum {} below minimum {}",
                path, maximum, minimum
            ))),
            EncodingKind::Decimal { decimal_places, .. } if *decimal_places > MAX_DECIMAL_PLACES => {
                Err(Error::InvalidSchema(format!(
                    "`{}` declares {} decimal places, at most {} are supported",
                    path, decimal_places, MAX_DECIMAL_PLACES
                )))
            }
            EncodingKind::Decimal {
                minimum,
                decimal_places,
            } => match serde_json::Number::from_f64(*minimum).and_then(|n| fraction_digits(&n)) {
                Some(digits) if digits <= *decimal_places as usize => Ok(()),
                _ => Err(Error::InvalidSchema(format!(
                    "`{}` has a minimum that is not a number with {} decimal places",
                    path, decimal_places
                ))),
            },
            _ => Ok(()),
        }
    }

    /// Encode `value`, found at `path`, as a field element.
    pub fn encode(&self, path: &str, value: &Value) -> Result<Scalar, Error> {
        let fail = |reason: &str| Error::EncodingRangeError {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        match self {
            EncodingKind::String => {
                let s = value.as_str().ok_or_else(|| fail("expected a string"))?;
                Ok(hash_to_scalar(STRING_DOMAIN, s.as_bytes()))
            }
            EncodingKind::ReversibleString => {
                let s = value.as_str().ok_or_else(|| fail("expected a string"))?;
                pack_string(s).ok_or_else(|| {
                    fail(&format!(
                        "reversible strings hold at most {} bytes",
                        MAX_REVERSIBLE_STRING_LEN
                    ))
                })
            }
            EncodingKind::Integer { minimum, maximum } => {
                let n = value.as_i64().ok_or_else(|| fail("expected an integer"))?;
                if n < *minimum {
                    return Err(fail(&format!("{} is below the minimum {}", n, minimum)));
                }
                if let Some(maximum) = maximum {
                    if n > *maximum {
                        return Err(fail(&format!("{} is above the maximum {}", n, maximum)));
                    }
                }
                Ok(Scalar::from((i128::from(n) - i128::from(*minimum)) as u64))
            }
            EncodingKind::Decimal {
                minimum,
                decimal_places,
            } => {
                let number = match value {
                    Value::Number(number) => number,
                    _ => return Err(fail("expected a number")),
                };
                let digits = fraction_digits(number).ok_or_else(|| fail("expected a number"))?;
                if digits > *decimal_places as usize {
                    return Err(fail(&format!(
                        "more than {} decimal places",
                        decimal_places
                    )));
                }
                let n = number.as_f64().ok_or_else(|| fail("expected a number"))?;
                if n < *minimum {
                    return Err(fail(&format!("{} is below the minimum {}", n, minimum)));
                }
                let scaled = ((n - minimum) * decimal_scale(*decimal_places)).round();
                if !scaled.is_finite() || scaled > MAX_EXACT_DECIMAL {
                    return Err(fail("value is too large"));
                }
                Ok(Scalar::from(scaled as u64))
            }
            EncodingKind::Timestamp => {
                let millis = timestamp_millis(value).ok_or_else(|| fail("expected a timestamp"))?;
                if millis < TIMESTAMP_MINIMUM {
                    return Err(fail("timestamps before 0001-01-01 are not encodable"));
                }
                Ok(Scalar::from(
                    (i128::from(millis) - i128::from(TIMESTAMP_MINIMUM)) as u64,
                ))
            }
            EncodingKind::Boolean => {
                let b = value.as_bool().ok_or_else(|| fail("expected a boolean"))?;
                Ok(Scalar::from(b as u64))
            }
            EncodingKind::Bytes => {
                let s = value
                    .as_str()
                    .ok_or_else(|| fail("expected a base64 string"))?;
                let bytes = base64::decode(s).map_err(|e| fail(&e.to_string()))?;
                Ok(hash_to_scalar(BYTES_DOMAIN, &bytes))
            }
        }
    }

    /// Recover the JSON value behind an encoded field element.
    ///
    /// Hashed kinds cannot be decoded. Timestamps decode to milliseconds since the Unix epoch.
    pub fn decode(&self, encoded: Scalar) -> Result<Value, Error> {
        let out_of_range = || Error::Serialization("encoded value is out of range".to_string());

        match self {
            EncodingKind::String | EncodingKind::Bytes => Err(Error::Unsupported(
                "hashed encodings cannot be decoded".to_string(),
            )),
            EncodingKind::ReversibleString => unpack_string(encoded)
                .map(Value::String)
                .ok_or_else(out_of_range),
            EncodingKind::Integer { minimum, .. } => {
                let n = i128::from(small_scalar(encoded).ok_or_else(out_of_range)?)
                    + i128::from(*minimum);
                i64::try_from(n)
                    .map(Value::from)
                    .map_err(|_| out_of_range())
            }
            EncodingKind::Decimal {
                minimum,
                decimal_places,
            } => {
                let scaled = small_scalar(encoded).ok_or_else(out_of_range)? as f64;
                Ok(Value::from(
                    scaled / decimal_scale(*decimal_places) + minimum,
                ))
            }
            EncodingKind::Timestamp => {
                let n = i128::from(small_scalar(encoded).ok_or_else(out_of_range)?)
                    + i128::from(TIMESTAMP_MINIMUM);
                i64::try_from(n)
                    .map(Value::from)
                    .map_err(|_| out_of_range())
            }
            EncodingKind::Boolean => match small_scalar(encoded) {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(out_of_range()),
            },
        }
    }
}

fn decimal_scale(decimal_places: u32) -> f64 {
    10f64.powi(decimal_places.min(MAX_DECIMAL_PLACES) as i32)
}

/// Digits after the point in the shortest decimal text of `number`, once any exponent is applied.
fn fraction_digits(number: &serde_json::Number) -> Option<usize> {
    let text = number.to_string();
    let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
        Some(at) => (&text[..at], text[at + 1..].parse::<i64>().ok()?),
        None => (text.as_str(), 0),
    };
    let fraction = match mantissa.find('.') {
        Some(at) => mantissa[at + 1..].trim_end_matches('0').len() as i64,
        None => 0,
    };
    usize::try_from((fraction - exponent).max(0)).ok()
}

/// Hash arbitrary bytes to a field element under a domain separator.
pub(crate) fn hash_to_scalar(domain: &[u8], bytes: &[u8]) -> Scalar {
    let digest = Sha3_512::new().chain(domain).chain(bytes).finalize();
    let mut wide = [0; 64];
    wide.copy_from_slice(&digest);
    Scalar::from_bytes_wide(&wide)
}

fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .ok()
            .or_else(|| {
                let midnight = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)?;
                Some(Utc.from_utc_datetime(&midnight).timestamp_millis())
            }),
        _ => None,
    }
}

/// Little-endian length byte followed by the string bytes; the top byte stays zero, so the value is
/// always below the field modulus.
fn pack_string(s: &str) -> Option<Scalar> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_REVERSIBLE_STRING_LEN {
        return None;
    }
    let mut repr = [0; 32];
    repr[0] = bytes.len() as u8;
    repr[1..=bytes.len()].copy_from_slice(bytes);
    Scalar::from_bytes(&repr).into()
}

fn unpack_string(encoded: Scalar) -> Option<String> {
    let repr = encoded.to_bytes();
    let len = repr[0] as usize;
    if len > MAX_REVERSIBLE_STRING_LEN || repr[len + 1..].iter().any(|&b| b != 0) {
        return None;
    }
    String::from_utf8(repr[1..=len].to_vec()).ok()
}

/// The value of `encoded` if it fits in a `u64`.
fn small_scalar(encoded: Scalar) -> Option<u64> {
    let repr = encoded.to_bytes();
    if repr[8..].iter().any(|&b| b != 0) {
        return None;
    }
    let mut low = [0; 8];
    low.copy_from_slice(&repr[..8]);
    Some(u64::from_le_bytes(low))
}
