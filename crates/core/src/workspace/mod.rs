//! Run directory layout and manifest writing.
//!
//! Every invocation gets its own directory under `<root>/runs/` so repeated
//! downloads never clobber each other:
//!
//! ```text
//! runs/<run_id>/raw/excel/   downloaded workbooks
//! runs/<run_id>/raw/parsed/  reserved for downstream extraction
//! runs/<run_id>/raw/logs/    screenshots and diagnostics
//! ```

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::AgentError;

/// Paths for a single run, all pre-created.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub dataset: String,
    pub period_ym: String,
    pub snapshot_date: String,
    pub run_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub excel_dir: PathBuf,
    pub parsed_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RunContext {
    pub fn manifest_path(&self) -> PathBuf {
        self.raw_dir.join("manifest.json")
    }

    /// Serialize the manifest next to the downloaded files.
    pub fn write_manifest(&self, manifest: &serde_json::Value) -> Result<(), AgentError> {
        let text = serde_json::to_string_pretty(manifest)
            .map_err(|e| AgentError::Workspace(format!("failed to serialize manifest: {e}")))?;
        std::fs::write(self.manifest_path(), text)?;
        Ok(())
    }
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..4)
        .map(|_| ALPHABET[fastrand::usize(..ALPHABET.len())] as char)
        .collect()
}

/// Create the directory tree for a new run.
///
/// `period_ym` must be a 6-digit YYYYMM string and `snapshot_date` an
/// 8-digit YYYYMMDD string. The run id embeds a timestamp plus a short
/// random suffix so concurrent runs cannot collide.
pub fn create_run(
    root: &Path,
    dataset: &str,
    period_ym: &str,
    snapshot_date: &str,
) -> Result<RunContext, AgentError> {
    if period_ym.len() != 6 || !period_ym.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AgentError::Workspace(format!(
            "invalid period {period_ym}, expected YYYYMM"
        )));
    }
    if snapshot_date.len() != 8 || !snapshot_date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AgentError::Workspace(format!(
            "invalid snapshot date {snapshot_date}, expected YYYYMMDD"
        )));
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let run_id = format!("{stamp}_{dataset}_{period_ym}_{}", random_suffix());

    let run_dir = root.join("runs").join(&run_id);
    let raw_dir = run_dir.join("raw");
    let excel_dir = raw_dir.join("excel");
    let parsed_dir = raw_dir.join("parsed");
    let logs_dir = raw_dir.join("logs");
    for dir in [&excel_dir, &parsed_dir, &logs_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let ctx = RunContext {
        run_id,
        dataset: dataset.to_string(),
        period_ym: period_ym.to_string(),
        snapshot_date: snapshot_date.to_string(),
        run_dir,
        raw_dir,
        excel_dir,
        parsed_dir,
        logs_dir,
    };

    ctx.write_manifest(&serde_json::json!({
        "run_id": ctx.run_id,
        "dataset": ctx.dataset,
        "period": ctx.period_ym,
        "snapshot_date": ctx.snapshot_date,
        "status": "created",
    }))?;

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_run_builds_the_tree() {
        let root = tempfile::tempdir().unwrap();
        let ctx = create_run(root.path(), "se004_bulanan", "202501", "20250215").unwrap();
        assert!(ctx.excel_dir.is_dir());
        assert!(ctx.parsed_dir.is_dir());
        assert!(ctx.logs_dir.is_dir());
        assert!(ctx.manifest_path().is_file());
        assert!(ctx.run_id.contains("se004_bulanan_202501"));
    }

    #[test]
    fn create_run_rejects_malformed_period() {
        let root = tempfile::tempdir().unwrap();
        assert!(create_run(root.path(), "se004_bulanan", "2025-01", "20250215").is_err());
        assert!(create_run(root.path(), "se004_bulanan", "202501", "2025").is_err());
    }

    #[test]
    fn run_ids_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = create_run(root.path(), "se004_bulanan", "202501", "20250215").unwrap();
        let b = create_run(root.path(), "se004_bulanan", "202501", "20250215").unwrap();
        assert_ne!(a.run_id, b.run_id);
    }
}
