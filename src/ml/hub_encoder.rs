// ============================================================
// Layer 5 — Hub Encoder Table
// ============================================================
// hub_encoder.json is a flat JSON object:
//
//   { "cpp": [0.1, 0.9, ...], "finance": [0.4, 0.0, ...] }
//
// Every vector has the same length (hub_dim). Hubs missing
// from the table encode to a zero vector of that length.

use std::{collections::HashMap, fs, path::Path};

use crate::error::{ServiceError, ServiceResult, Stage};

#[derive(Debug, Clone)]
pub struct HubEncoder {
    table:   HashMap<String, Vec<f32>>,
    hub_dim: usize,
    zero:    Vec<f32>,
}

impl HubEncoder {
    pub fn from_file(path: &Path) -> ServiceResult<Self> {
        let raw = fs::read(path).map_err(|e| {
            ServiceError::backend(Stage::HubEncoder, format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> ServiceResult<Self> {
        let table: HashMap<String, Vec<f32>> = serde_json::from_slice(raw)
            .map_err(|e| ServiceError::backend(Stage::HubEncoder, e))?;
        Self::from_table(table)
    }

    /// Build from an in-memory table. All vectors must share one length.
    pub fn from_table(table: HashMap<String, Vec<f32>>) -> ServiceResult<Self> {
        let hub_dim = table.values().next().map_or(0, Vec::len);
        if let Some((hub, vec)) = table.iter().find(|(_, v)| v.len() != hub_dim) {
            return Err(ServiceError::backend(
                Stage::HubEncoder,
                format!("hub '{hub}' has {} dims, expected {hub_dim}", vec.len()),
            ));
        }
        tracing::debug!(hubs = table.len(), hub_dim, "hub encoder loaded");
        Ok(Self { table, hub_dim, zero: vec![0.0; hub_dim] })
    }

    pub fn hub_dim(&self) -> usize {
        self.hub_dim
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Exact lookup. Never fails.
    pub fn encode(&self, hub: &str) -> &[f32] {
        self.table.get(hub).map_or(self.zero.as_slice(), Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_hub() {
        let enc = HubEncoder::from_json(br#"{"cpp":[1.0,0.0],"finance":[0.0,1.0]}"#).unwrap();
        assert_eq!(enc.hub_dim(), 2);
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.encode("finance"), &[0.0, 1.0]);
        assert_eq!(enc.encode("nonexistent-hub"), &[0.0, 0.0]);
    }

    #[test]
    fn test_empty_table_has_zero_dim() {
        let enc = HubEncoder::from_json(b"{}").unwrap();
        assert!(enc.is_empty());
        assert_eq!(enc.hub_dim(), 0);
        assert!(enc.encode("anything").is_empty());
    }

    #[test]
    fn test_ragged_table_rejected() {
        let err = HubEncoder::from_json(br#"{"a":[1.0],"b":[1.0,2.0]}"#).unwrap_err();
        assert!(matches!(err, ServiceError::Backend { stage: Stage::HubEncoder, .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = HubEncoder::from_json(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, ServiceError::Backend { stage: Stage::HubEncoder, .. }));
    }
}
