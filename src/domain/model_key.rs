// ============================================================
// Layer 3 — ModelKey
// ============================================================
// The name of one artifact in the store and one cache slot:
//   "{model_name}.{extension}"   e.g. "BoWDSSM.zip"
//
// A key is validated once at construction and is immutable
// afterwards, so every component downstream can use it as a
// plain file name without re-checking it.

use std::fmt;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    file_name: String,
    name_len:  usize,
}

impl ModelKey {
    /// Build a key from a bare model name and the configured extension.
    /// A leading dot on the extension is tolerated.
    pub fn new(model_name: &str, extension: &str) -> ServiceResult<Self> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(ServiceError::invalid("model extension is empty"));
        }
        validate_name(model_name)?;
        Ok(Self {
            file_name: format!("{model_name}.{extension}"),
            name_len:  model_name.len(),
        })
    }

    /// Parse a file name (as found in a directory or bucket listing)
    /// back into a key. Returns `None` when the file does not carry
    /// the expected extension.
    pub fn from_file_name(file_name: &str, extension: &str) -> Option<Self> {
        let extension = extension.trim_start_matches('.');
        let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
        Self::new(stem, extension).ok()
    }

    /// The artifact file name, which is also the object key.
    pub fn as_str(&self) -> &str {
        &self.file_name
    }

    /// The model name with the extension stripped.
    pub fn model_name(&self) -> &str {
        &self.file_name[..self.name_len]
    }
}

fn validate_name(model_name: &str) -> ServiceResult<()> {
    if model_name.trim().is_empty() {
        return Err(ServiceError::invalid("model_name is empty"));
    }
    if model_name.contains(['/', '\\']) || model_name == "." || model_name.contains("..") {
        return Err(ServiceError::invalid(format!(
            "model_name '{model_name}' must not contain path components"
        )));
    }
    Ok(())
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}
