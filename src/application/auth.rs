// ============================================================
// Layer 2 — Internal Key Gate
// ============================================================
// Every call from the backend carries `x-internal-key`. The
// gate runs before any other step of a use case; a rejected
// request never touches the store or the cache.

use crate::error::{ServiceError, ServiceResult};

/// The configured shared secret.
#[derive(Clone)]
pub struct InternalKey {
    secret: String,
}

impl InternalKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Missing or mismatching keys are both `Unauthorized`.
    pub fn check(&self, provided: Option<&str>) -> ServiceResult<()> {
        match provided {
            Some(key) if constant_time_compare(&self.secret, key) => Ok(()),
            _ => {
                tracing::warn!("rejected request with invalid internal key");
                Err(ServiceError::Unauthorized)
            }
        }
    }
}

impl std::fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InternalKey(***)")
    }
}

/// Byte comparison whose running time depends only on the lengths.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
