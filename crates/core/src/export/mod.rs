//! Export trigger and download arbitration.
//!
//! Clicking "export" on the portal has three possible endings: a file lands
//! in the download directory, a "no data" dialog appears, or some other
//! dialog blocks the page. The download watch is armed before the click so
//! a fast download cannot slip past the poll.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::page::Page;
use crate::report::ReportSelectors;

/// How long to wait for either a file or a dialog after the export click.
pub const EXPORT_POLL_WINDOW: Duration = Duration::from_secs(60);
/// Poll step inside the window.
pub const EXPORT_POLL_STEP: Duration = Duration::from_secs(2);

/// Terminal state of a single export attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// File downloaded, verified non-empty and moved to its final path.
    Saved(PathBuf),
    /// The portal reported no rows for this filter combination.
    NoData,
    /// Anything else: timeout, blocking dialog, empty file, click failure.
    Failed(String),
}

impl ExportOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, ExportOutcome::Saved(_))
    }
}

fn move_into_place(from: &Path, to: &Path) -> std::io::Result<()> {
    // Rename fails across filesystems; fall back to copy.
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)?;
            Ok(())
        }
    }
}

/// Trigger one export and watch for its ending.
///
/// The returned outcome is final for this attempt; retries are the
/// caller's concern.
pub async fn export_once<P: Page + ?Sized>(
    page: &P,
    selectors: &ReportSelectors,
    target_path: &Path,
) -> ExportOutcome {
    if let Err(e) = page.arm_download_watch().await {
        return ExportOutcome::Failed(format!("failed to arm download watch: {e}"));
    }

    if let Err(e) = crate::page::click_target(page, &selectors.export_button).await {
        return ExportOutcome::Failed(format!("export button: {e}"));
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Err(e) = crate::page::click_target(page, &selectors.excel_option).await {
        return ExportOutcome::Failed(format!("excel option: {e}"));
    }

    let deadline = tokio::time::Instant::now() + EXPORT_POLL_WINDOW;
    loop {
        match page.poll_download().await {
            Ok(Some(downloaded)) => {
                if let Err(e) = move_into_place(&downloaded, target_path) {
                    return ExportOutcome::Failed(format!(
                        "failed to move download into place: {e}"
                    ));
                }
                match std::fs::metadata(target_path) {
                    Ok(meta) if meta.len() > 0 => {
                        info!(path = %target_path.display(), bytes = meta.len(), "export saved");
                        return ExportOutcome::Saved(target_path.to_path_buf());
                    }
                    Ok(_) => {
                        let _ = std::fs::remove_file(target_path);
                        return ExportOutcome::Failed("downloaded file is empty".into());
                    }
                    Err(e) => {
                        return ExportOutcome::Failed(format!("saved file not readable: {e}"));
                    }
                }
            }
            Ok(None) => {}
            Err(e) => return ExportOutcome::Failed(format!("download watch: {e}")),
        }

        if let Ok(Some(text)) = crate::page::text_of_target(page, &selectors.dialog).await {
            let lowered = text.to_lowercase();
            if lowered.contains(selectors.no_data_pattern) {
                debug!("portal reported no data for this filter");
                return ExportOutcome::NoData;
            }
            // Dismiss so the page is usable for the next attempt.
            let _ = crate::page::click_target(page, &selectors.dialog_dismiss).await;
            let trimmed: String = text.chars().take(120).collect();
            return ExportOutcome::Failed(format!("blocked by dialog: {trimmed}"));
        }

        if tokio::time::Instant::now() >= deadline {
            return ExportOutcome::Failed(format!(
                "no download or dialog within {}s",
                EXPORT_POLL_WINDOW.as_secs()
            ));
        }
        tokio::time::sleep(EXPORT_POLL_STEP).await;
    }
}
