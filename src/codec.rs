//! Canonical serialization.
//!
//! Every persisted value (store, entry, key, envelope, encapsulated data)
//! is encoded as compact JSON with camelCase field names. Byte fields are
//! standard padded base64 strings and are decoded strictly, so a
//! non-canonical encoding is a decode error rather than a silent change.
//!
//! Decoding ignores unknown fields and defaults missing optional ones.

use base64ct::{Base64, Encoding};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode `value` to its canonical byte form.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a value from its canonical byte form.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serde adapter for `Vec<u8>` fields as base64 strings.
pub(crate) mod base64_bytes {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        decode_canonical(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Decode base64, accepting only the one encoding `Base64` would produce.
fn decode_canonical(encoded: &str) -> std::result::Result<Vec<u8>, String> {
    let decoded = Base64::decode_vec(encoded).map_err(|e| e.to_string())?;
    if Base64::encode_string(&decoded) != encoded {
        return Err("non-canonical base64".to_string());
    }
    Ok(decoded)
}

/// Serde adapter for `Option<Vec<u8>>` fields as optional base64 strings.
pub(crate) mod base64_bytes_opt {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&Base64::encode_string(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| decode_canonical(&encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        #[serde(with = "base64_bytes")]
        raw_value: Vec<u8>,
        #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
        maybe: Option<Vec<u8>>,
    }

    #[test]
    fn bytes_are_base64_strings() {
        let s = Sample {
            raw_value: vec![0xfb, 0xff],
            maybe: None,
        };
        let encoded = to_bytes(&s).unwrap();
        assert_eq!(encoded, br#"{"rawValue":"+/8="}"#);
        assert_eq!(from_bytes::<Sample>(&encoded).unwrap(), s);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let decoded: Sample = from_bytes(br#"{"rawValue":"AQ==","future":1}"#).unwrap();
        assert_eq!(decoded.raw_value, vec![1]);
        assert!(decoded.maybe.is_none());
    }

    #[test]
    fn non_canonical_base64_is_rejected() {
        // "AR==" carries non-zero trailing bits.
        assert!(from_bytes::<Sample>(br#"{"rawValue":"AR=="}"#).is_err());
    }
}
