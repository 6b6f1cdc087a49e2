//! JSON encoding for values stored in the remote tier.
//!
//! The remote tier only ever holds text. Everything that crosses that boundary
//! goes through [`encode`] on the way in and [`decode`] on the way out.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;

/// Encode a value to its remote-tier text form.
pub fn encode<V: Serialize + ?Sized>(key: &str, value: &V) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|source| CacheError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Decode a remote-tier text value back into `V`.
pub fn decode<V: DeserializeOwned>(key: &str, raw: &str) -> Result<V, CacheError> {
    serde_json::from_str(raw).map_err(|source| CacheError::Decode {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
        tags: Vec<String>,
        manager: Option<u64>,
    }

    #[test]
    fn test_scalars_round_trip() {
        let raw = encode("k", "abc").unwrap();
        assert_eq!(raw, "\"abc\"");
        assert_eq!(decode::<String>("k", &raw).unwrap(), "abc");

        let raw = encode("k", &42_i64).unwrap();
        assert_eq!(decode::<i64>("k", &raw).unwrap(), 42);

        let raw = encode("k", &true).unwrap();
        assert!(decode::<bool>("k", &raw).unwrap());

        let raw = encode("k", &1.5_f64).unwrap();
        assert_eq!(decode::<f64>("k", &raw).unwrap(), 1.5);
    }

    #[test]
    fn test_struct_round_trip() {
        let profile = Profile {
            id: 7,
            name: "ada".to_string(),
            tags: vec!["admin".to_string(), "ops".to_string()],
            manager: None,
        };

        let raw = encode("profile:7", &profile).unwrap();
        assert!(raw.contains("\"name\":\"ada\""));
        assert_eq!(decode::<Profile>("profile:7", &raw).unwrap(), profile);
    }

    #[test]
    fn test_decode_wrong_shape_reports_key() {
        let err = decode::<Profile>("profile:9", "\"not a profile\"").unwrap_err();
        assert!(matches!(err, CacheError::Decode { ref key, .. } if key == "profile:9"));
    }
}
