use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use crate::util::{duration_to_millis, millis_to_duration};

/// Serializes Duration as whole milliseconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration_to_millis(*duration).serialize(serializer)
}

/// Deserializes Duration from whole milliseconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(millis_to_duration(millis))
}

/// Serializes a CAN identifier as a hex string such as `"0x02E"`
pub fn serialize_can_id<S>(id: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    format!("0x{:03X}", id).serialize(serializer)
}

/// Deserializes a CAN identifier from either a number or a hex string
pub fn deserialize_can_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u32),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => {
            let trimmed = text.trim();
            let parsed = match trimmed
                .strip_prefix("0x")
                .or_else(|| trimmed.strip_prefix("0X"))
            {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => trimmed.parse::<u32>(),
            };
            parsed.map_err(|e| serde::de::Error::custom(format!("invalid CAN id {:?}: {}", text, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json;

    #[derive(Serialize, Deserialize)]
    struct Test {
        #[serde(serialize_with = "serialize_duration")]
        #[serde(deserialize_with = "deserialize_duration")]
        period: Duration,
        #[serde(serialize_with = "serialize_can_id")]
        #[serde(deserialize_with = "deserialize_can_id")]
        id: u32,
    }

    #[test]
    fn test_duration_serialization() {
        let original = Test {
            period: Duration::from_millis(1500),
            id: 0x2E,
        };

        let serialized = serde_json::to_string(&original).unwrap();
        assert_eq!(serialized, r#"{"period":1500,"id":"0x02E"}"#);

        let deserialized: Test = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.period, original.period);
        assert_eq!(deserialized.id, 0x2E);
    }

    #[test]
    fn test_can_id_accepts_numbers() {
        let parsed: Test = serde_json::from_str(r#"{"period":50,"id":46}"#).unwrap();
        assert_eq!(parsed.id, 0x2E);

        let parsed: Test = serde_json::from_str(r#"{"period":50,"id":"72"}"#).unwrap();
        assert_eq!(parsed.id, 72);

        assert!(serde_json::from_str::<Test>(r#"{"period":50,"id":"0xZZ"}"#).is_err());
    }
}
