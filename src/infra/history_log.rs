// ============================================================
// Layer 6 — Request History Log
// ============================================================
// Appends one CSV row per served request.
//
// Example output (history.csv):
//   request_id,endpoint,status_code,timestamp,latency_ms,text_length
//   5f0c…,/v0/forward,200,2026-10-19T09:12:44.120Z,37,412
//   9a11…,/v0/models,403,2026-10-19T09:12:45.002Z,0,0
//
// Logging is best-effort: the HTTP layer reports a failing
// write at warn level and still returns the primary response.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use parking_lot::Mutex;

use crate::domain::{HistoryRecord, HistorySink};

const HEADER: &str = "request_id,endpoint,status_code,timestamp,latency_ms,text_length";

pub struct CsvHistoryLog {
    csv_path: PathBuf,
    /// Serialises appends so rows from concurrent requests never interleave.
    write_lock: Mutex<()>,
}

impl CsvHistoryLog {
    /// Open (or create) the CSV file, writing the header for new files.
    pub fn open(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created history CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path, write_lock: Mutex::new(()) })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl HistorySink for CsvHistoryLog {
    fn record(&self, r: &HistoryRecord) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{},{},{},{}",
            r.request_id,
            r.endpoint,
            r.status_code,
            r.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            r.latency_ms,
            r.text_length,
        )?;
        Ok(())
    }
}
