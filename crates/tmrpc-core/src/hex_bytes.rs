//! Hex-encoded byte strings for parameters such as transactions and hashes.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};

/// Bytes that travel as a `0x`-prefixed hex string.
///
/// Encodes upper-case; decodes either case, with or without the prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    pub fn parse(s: &str) -> Result<Self, hex::FromHexError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        hex::decode(digits).map(Self)
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl std::fmt::Display for HexBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode_upper(&self.0))
    }
}

impl From<HexBytes> for serde_json::Value {
    fn from(bytes: HexBytes) -> Self {
        Self::String(bytes.to_string())
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_prefix() {
        let b = HexBytes(vec![0x0a, 0xff]);
        assert_eq!(serde_json::to_string(&b).unwrap(), r#""0x0AFF""#);
    }

    #[test]
    fn decodes_any_case_and_prefix() {
        for s in [r#""0x0aff""#, r#""0AFF""#, r#""0X0aFf""#] {
            let b: HexBytes = serde_json::from_str(s).unwrap();
            assert_eq!(b.as_bytes(), &[0x0a, 0xff]);
        }
        assert!(serde_json::from_str::<HexBytes>(r#""0xzz""#).is_err());
    }

    #[test]
    fn empty_bytes() {
        let b: HexBytes = serde_json::from_str(r#""0x""#).unwrap();
        assert!(b.0.is_empty());
    }
}
