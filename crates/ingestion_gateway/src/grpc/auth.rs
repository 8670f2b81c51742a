use common::domain::{DomainError, DomainResult};
use tonic::metadata::MetadataMap;

/// Metadata key carrying the shared secret
pub const API_TOKEN_METADATA_KEY: &str = "x-api-token";

/// Check the session's shared secret before any frame is read
pub fn validate_api_token(metadata: &MetadataMap, expected: &str) -> DomainResult<()> {
    let value = metadata
        .get(API_TOKEN_METADATA_KEY)
        .ok_or_else(|| DomainError::Unauthenticated("missing x-api-token".to_string()))?;

    let presented = value
        .to_str()
        .map_err(|_| DomainError::Unauthenticated("invalid x-api-token".to_string()))?;

    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(DomainError::Unauthenticated("invalid x-api-token".to_string()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
