//! Serde adapters for JSON quantities that appear as either a hex string or a
//! bare number.
//!
//! Both shapes are observed in the wild for the post-Cancun blob-gas header
//! fields, so every quantity the wire parser touches goes through these.

use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u128),
    Text(String),
}

fn parse_quantity(q: Quantity) -> Result<u128, String> {
    match q {
        Quantity::Number(n) => Ok(n),
        Quantity::Text(s) => {
            let trimmed = s.trim();
            if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                u128::from_str_radix(hex, 16)
                    .map_err(|e| format!("invalid hex quantity {trimmed:?}: {e}"))
            } else {
                trimmed
                    .parse::<u128>()
                    .map_err(|e| format!("invalid decimal quantity {trimmed:?}: {e}"))
            }
        }
    }
}

/// `u64` from either `"0x20000"` or `131072`.
pub mod flex_u64 {
    use super::*;

    /// Deserializes a flexible `u64` quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = parse_quantity(Quantity::deserialize(deserializer)?).map_err(de::Error::custom)?;
        u64::try_from(raw).map_err(|_| de::Error::custom(format!("quantity {raw} overflows u64")))
    }

    /// Serializes as a bare number.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }
}

/// Optional variant of [flex_u64]; combine with `#[serde(default)]`.
pub mod flex_u64_opt {
    use super::*;

    /// Deserializes an optional flexible `u64` quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u64>, D::Error> {
        match Option::<Quantity>::deserialize(deserializer)? {
            None => Ok(None),
            Some(q) => {
                let raw = parse_quantity(q).map_err(de::Error::custom)?;
                u64::try_from(raw)
                    .map(Some)
                    .map_err(|_| de::Error::custom(format!("quantity {raw} overflows u64")))
            }
        }
    }

    /// Serializes as a bare number or null.
    pub fn serialize<S: Serializer>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_u64(*v),
            None => serializer.serialize_none(),
        }
    }
}

/// Optional `u128` variant, for gas-price fields.
pub mod flex_u128_opt {
    use super::*;

    /// Deserializes an optional flexible `u128` quantity.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u128>, D::Error> {
        match Option::<Quantity>::deserialize(deserializer)? {
            None => Ok(None),
            Some(q) => parse_quantity(q).map(Some).map_err(de::Error::custom),
        }
    }

    /// Serializes as a bare number or null.
    pub fn serialize<S: Serializer>(
        value: &Option<u128>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_u128(*v),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod test {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(with = "super::flex_u64")]
        value: u64,
        #[serde(default, with = "super::flex_u64_opt")]
        maybe: Option<u64>,
    }

    #[test]
    fn accepts_hex_string_and_number() {
        let hex: Wrapper = serde_json::from_str(r#"{"value": "0x20000"}"#).unwrap();
        assert_eq!(hex.value, 131072);
        let num: Wrapper = serde_json::from_str(r#"{"value": 131072}"#).unwrap();
        assert_eq!(num.value, 131072);
        assert_eq!(hex.maybe, None);
    }

    #[test]
    fn accepts_decimal_string() {
        let w: Wrapper = serde_json::from_str(r#"{"value": "131072"}"#).unwrap();
        assert_eq!(w.value, 131072);
    }

    #[test]
    fn optional_field_decodes_both_shapes() {
        let w: Wrapper = serde_json::from_str(r#"{"value": 1, "maybe": "0x20000"}"#).unwrap();
        assert_eq!(w.maybe, Some(131072));
        let w: Wrapper = serde_json::from_str(r#"{"value": 1, "maybe": 131072}"#).unwrap();
        assert_eq!(w.maybe, Some(131072));
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": "0xzz"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": "words"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"value": true}"#).is_err());
    }
}
