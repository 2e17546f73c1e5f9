use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};

/// A 20-byte hex owner address (`0x` + 40 hex chars), normalized to
/// lowercase. Used both as the rate-limit key and for instance ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerAddress(String);

impl OwnerAddress {
    pub fn parse(raw: &str) -> CacheResult<Self> {
        let trimmed = raw.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| CacheError::Unauthorized("owner address must start with 0x".into()))?;

        let bytes = hex::decode(hex_part)
            .map_err(|_| CacheError::Unauthorized("owner address is not valid hex".into()))?;
        if bytes.len() != 20 {
            return Err(CacheError::Unauthorized(
                "owner address must encode exactly 20 bytes".into(),
            ));
        }
        Ok(Self(format!("0x{}", hex_part.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the `x-owner-address` header when present, failing only on a
/// malformed value.
pub fn optional_owner(headers: &HeaderMap) -> CacheResult<Option<OwnerAddress>> {
    match headers.get("x-owner-address").and_then(|v| v.to_str().ok()) {
        Some(raw) if !raw.trim().is_empty() => Ok(Some(OwnerAddress::parse(raw)?)),
        _ => Ok(None),
    }
}

/// Like `optional_owner` but the header is mandatory.
pub fn required_owner(headers: &HeaderMap) -> CacheResult<OwnerAddress> {
    optional_owner(headers)?
        .ok_or_else(|| CacheError::Unauthorized("x-owner-address header is required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const ADDR: &str = "0x00112233445566778899aabbccddeeff00112233";

    #[test]
    fn test_parse_normalizes_case() {
        let upper = format!("0x{}", ADDR[2..].to_ascii_uppercase());
        let parsed = OwnerAddress::parse(&upper).unwrap();
        assert_eq!(parsed.as_str(), ADDR);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(OwnerAddress::parse("not-an-address").is_err());
        assert!(OwnerAddress::parse("0x1234").is_err());
        assert!(OwnerAddress::parse("0xzz112233445566778899aabbccddeeff00112233").is_err());
    }

    #[test]
    fn test_required_owner_missing_header() {
        let err = required_owner(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_optional_owner_present() {
        let mut headers = HeaderMap::new();
        headers.insert("x-owner-address", HeaderValue::from_static(ADDR));
        let owner = optional_owner(&headers).unwrap().unwrap();
        assert_eq!(owner.as_str(), ADDR);
    }
}
