// ============================================================
// Layer 6 — Artifact Bundle Codec
// ============================================================
// A model artifact is a zip archive with four parts:
//
//   hub_encoder.json                 hub name → vector
//   text_encoder.json | .onnx        text → vector graph
//   predictor.json    | .onnx        vector → probability graph
//   metadata.json                    dims + version (optional)
//
// This module reads bundles (extraction into a scratch dir)
// and writes them (the `pack` command and test fixtures).
// It knows nothing about what the parts mean.

use std::{
    fs::{self, File},
    io::{Seek, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ServiceError, ServiceResult, Stage};

pub const HUB_ENCODER_FILE: &str = "hub_encoder.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const TEXT_ENCODER_STEM: &str = "text_encoder";
pub const PREDICTOR_STEM: &str = "predictor";

/// Serialization of a graph part inside the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Portable JSON graph evaluated natively.
    Json,
    /// ONNX graph evaluated with onnxruntime.
    Onnx,
}

impl GraphFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            GraphFormat::Json => "json",
            GraphFormat::Onnx => "onnx",
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(GraphFormat::Json),
            "onnx" => Some(GraphFormat::Onnx),
            _ => None,
        }
    }
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub text_encoder_dim:    usize,
    pub hub_encoder_dim:     usize,
    pub predictor_input_dim: usize,
    pub version:             String,
}

/// Unpack `archive` into `dest`. Entries whose names would escape
/// `dest` are rejected by the zip reader.
pub fn extract_bundle(archive: &Path, dest: &Path) -> ServiceResult<()> {
    let file = File::open(archive)
        .map_err(|e| ServiceError::backend(Stage::Extract, format!("{}: {e}", archive.display())))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| ServiceError::backend(Stage::Extract, format!("not a bundle: {e}")))?;
    zip.extract(dest)
        .map_err(|e| ServiceError::backend(Stage::Extract, e))?;

    tracing::debug!(
        "Extracted {} entries from '{}' into '{}'",
        zip.len(),
        archive.display(),
        dest.display()
    );
    Ok(())
}

/// Locate a graph part (`stem.json` or `stem.onnx`) in an extracted
/// bundle. JSON wins when both are present.
pub fn find_graph(dir: &Path, stem: &str) -> Option<(PathBuf, GraphFormat)> {
    [GraphFormat::Json, GraphFormat::Onnx]
        .into_iter()
        .map(|format| (dir.join(format!("{stem}.{}", format.extension())), format))
        .find(|(path, _)| path.is_file())
}

// ─── BundleWriter ─────────────────────────────────────────────────────────────
/// Assembles the parts of a bundle and writes them as one archive.
#[derive(Debug, Default)]
pub struct BundleWriter {
    entries: Vec<(String, Vec<u8>)>,
}

impl BundleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry under an explicit archive name. A later entry with
    /// the same name replaces the earlier one.
    pub fn entry(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        self.entries.retain(|(existing, _)| *existing != name);
        self.entries.push((name, bytes.into()));
        self
    }

    pub fn hub_encoder(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.entry(HUB_ENCODER_FILE, bytes)
    }

    pub fn text_encoder(self, format: GraphFormat, bytes: impl Into<Vec<u8>>) -> Self {
        self.entry(format!("{TEXT_ENCODER_STEM}.{}", format.extension()), bytes)
    }

    pub fn predictor(self, format: GraphFormat, bytes: impl Into<Vec<u8>>) -> Self {
        self.entry(format!("{PREDICTOR_STEM}.{}", format.extension()), bytes)
    }

    pub fn metadata(self, metadata: &BundleMetadata) -> Result<Self> {
        Ok(self.entry(METADATA_FILE, serde_json::to_vec_pretty(metadata)?))
    }

    /// Read a graph file from disk; its extension decides the format.
    pub fn graph_file(self, stem: &str, path: &Path) -> Result<Self> {
        let format = GraphFormat::from_path(path).with_context(|| {
            format!("'{}' must have a .json or .onnx extension", path.display())
        })?;
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(self.entry(format!("{stem}.{}", format.extension()), bytes))
    }

    pub fn file(self, name: &str, path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(self.entry(name, bytes))
    }

    fn has_graph(&self, stem: &str) -> bool {
        self.entries.iter().any(|(name, _)| {
            GraphFormat::from_path(Path::new(name)).is_some()
                && Path::new(name).file_stem().and_then(|s| s.to_str()) == Some(stem)
        })
    }

    /// Check that every part needed for scoring is present.
    pub fn validate(&self) -> Result<()> {
        if !self.entries.iter().any(|(name, _)| name == HUB_ENCODER_FILE) {
            bail!("bundle is missing {HUB_ENCODER_FILE}");
        }
        for stem in [TEXT_ENCODER_STEM, PREDICTOR_STEM] {
            if !self.has_graph(stem) {
                bail!("bundle is missing {stem}.json or {stem}.onnx");
            }
        }
        Ok(())
    }

    /// Write the archive to `writer`.
    pub fn write<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;
        Ok(())
    }

    /// Validate and write the archive to `out`. The file appears under
    /// its final name only once it is complete.
    pub fn write_to(&self, out: &Path) -> Result<()> {
        self.validate()?;
        let dir = match out.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        self.write(tmp.as_file_mut())?;
        tmp.persist(out)
            .with_context(|| format!("Cannot write bundle to '{}'", out.display()))?;

        tracing::info!("Wrote bundle '{}' ({} parts)", out.display(), self.entries.len());
        Ok(())
    }
}
