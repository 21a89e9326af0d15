//! Batch download orchestration over one browser session.
//!
//! One run sets the period once, then walks the unit list (times the
//! kelompok list on pages that have one), exporting each combination
//! through the retry policy. Per-combination failures are recorded and the
//! walk continues; only login and navigation failures abort the batch.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::auth::{self, Authenticator, CodePrompt};
use crate::config::Config;
use crate::error::AgentError;
use crate::export::{export_once, ExportOutcome};
use crate::filter::FilterSetter;
use crate::nav::Navigator;
use crate::page::Page;
use crate::report::{Period, ReportKind, SelectionUnit};
use crate::retry::{RetryPolicy, Screenshots};
use crate::workspace::RunContext;

/// A browser session the batch runs against. Tracks whether this process
/// created the browser, so shutdown never kills a session it merely
/// borrowed.
pub struct PortalSession<P: Page> {
    page: P,
    authenticated: bool,
    created_here: bool,
}

impl<P: Page> PortalSession<P> {
    /// A fresh browser this process owns; login still required.
    pub fn new(page: P) -> Self {
        Self {
            page,
            authenticated: false,
            created_here: true,
        }
    }

    /// An existing, already authenticated session borrowed from elsewhere.
    pub fn resumed(page: P) -> Self {
        Self {
            page,
            authenticated: true,
            created_here: false,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Close the browser, but only if this process created it.
    pub async fn shutdown(self) {
        if self.created_here {
            if let Err(e) = self.page.close().await {
                warn!(error = %e, "browser close failed");
            }
        }
    }

    pub fn into_page(self) -> P {
        self.page
    }
}

/// What to download: one report kind, one period, an ordered unit list.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub report: ReportKind,
    pub period: Period,
    pub units: Vec<SelectionUnit>,
}

/// One failed or empty (unit, kelompok) combination.
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kelompok: Option<String>,
    /// True when the portal reported no rows rather than failing.
    pub no_data: bool,
    pub message: String,
}

/// Aggregate outcome of a batch run. Every planned combination ends up in
/// exactly one of `files` or `errors`.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub no_data: usize,
    pub files: Vec<PathBuf>,
    pub errors: Vec<BatchError>,
}

impl BatchResult {
    /// Combinations accounted for so far.
    pub fn recorded(&self) -> usize {
        self.files.len() + self.errors.len()
    }

    /// True when not a single file was produced.
    pub fn nothing_downloaded(&self) -> bool {
        self.files.is_empty()
    }

    /// Surface an all-empty batch as the distinct
    /// [`AgentError::NothingDownloaded`] condition.
    pub fn require_any_file(&self) -> Result<(), AgentError> {
        if self.nothing_downloaded() {
            Err(AgentError::NothingDownloaded)
        } else {
            Ok(())
        }
    }

    fn record_saved(&mut self, path: PathBuf) {
        self.success += 1;
        self.files.push(path);
    }

    fn record_no_data(&mut self, unit: &str, kelompok: Option<&str>) {
        self.no_data += 1;
        self.errors.push(BatchError {
            unit: unit.to_string(),
            kelompok: kelompok.map(str::to_string),
            no_data: true,
            message: "Data tidak ditemukan".into(),
        });
    }

    fn record_failed(&mut self, unit: &str, kelompok: Option<&str>, message: String) {
        self.failed += 1;
        self.errors.push(BatchError {
            unit: unit.to_string(),
            kelompok: kelompok.map(str::to_string),
            no_data: false,
            message,
        });
    }
}

/// Orchestrates one batch against one session.
pub struct Batch<'a> {
    config: &'a Config,
    ctx: &'a RunContext,
    policy: RetryPolicy,
}

impl<'a> Batch<'a> {
    pub fn new(config: &'a Config, ctx: &'a RunContext) -> Self {
        Self {
            config,
            ctx,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the whole batch. Returns `Ok` with per-combination results even
    /// when every combination failed; `Err` only for faults that make the
    /// rest of the batch pointless (login, navigation, page readiness).
    pub async fn run<P: Page>(
        &self,
        session: &mut PortalSession<P>,
        req: &BatchRequest,
        prompt: &dyn CodePrompt,
    ) -> Result<BatchResult, AgentError> {
        let shots = Screenshots::new(&self.ctx.logs_dir);
        let page = &session.page;

        if !session.authenticated {
            let creds = auth::load_credentials(std::path::Path::new(".")).ok_or_else(|| {
                AgentError::Auth("no credentials file found".into())
            })?;
            Authenticator::new(page, self.config, &shots)
                .login(&creds, prompt)
                .await?;
            session.authenticated = true;
        } else {
            info!("using existing browser session");
        }

        Navigator::new(page, self.config, &shots)
            .to_report_subsystem()
            .await?;

        let url = self
            .config
            .get_str(req.report.url_config_key(), req.report.default_url());
        info!(report = req.report.slug(), url = %url, "opening report page");
        page.goto(&url).await?;
        page.settle(std::time::Duration::from_secs(10)).await?;
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        let selectors = req.report.selectors();
        let filters = FilterSetter::new(page, &selectors);
        filters.ensure_ready().await?;
        filters.set_period(&req.period).await?;

        let kelompok = req.report.kelompok();
        let per_unit = kelompok.len().max(1);
        let mut result = BatchResult {
            total: req.units.len() * per_unit,
            ..BatchResult::default()
        };

        for unit in &req.units {
            info!(unit = %unit.code, "processing unit");
            if let Err(e) = filters.set_unit(&unit.text).await {
                // The whole unit is lost; every planned combination under it
                // gets the same cause.
                error!(unit = %unit.code, error = %e, "unit filter failed, skipping unit");
                if kelompok.is_empty() {
                    result.record_failed(&unit.code, None, e.to_string());
                } else {
                    for k in kelompok {
                        result.record_failed(&unit.code, Some(k.slug()), e.to_string());
                    }
                }
                continue;
            }

            if kelompok.is_empty() {
                let file_name = req.report.file_name(&req.period, &unit.code, None);
                let target = self.ctx.excel_dir.join(&file_name);
                let tag = format!("download_{}", unit.code);
                let (sel, path) = (&selectors, &target);
                let outcome = self
                    .policy
                    .run(page, &shots, &tag, move || export_once(page, sel, path))
                    .await;
                self.record(&mut result, &unit.code, None, outcome);
            } else {
                for k in kelompok {
                    if let Err(e) = filters.set_kelompok(*k).await {
                        error!(unit = %unit.code, kelompok = k.slug(), error = %e,
                            "kelompok filter failed, skipping combination");
                        result.record_failed(&unit.code, Some(k.slug()), e.to_string());
                        continue;
                    }
                    let file_name = req.report.file_name(&req.period, &unit.code, Some(*k));
                    let target = self.ctx.excel_dir.join(&file_name);
                    let tag = format!("download_{}_{}", unit.code, k.slug());
                    let (sel, path) = (&selectors, &target);
                    let outcome = self
                        .policy
                        .run(page, &shots, &tag, move || export_once(page, sel, path))
                        .await;
                    self.record(&mut result, &unit.code, Some(k.slug()), outcome);
                }
            }
        }

        debug_assert_eq!(result.recorded(), result.total);
        self.write_manifest(req, &result, &url)?;
        if result.nothing_downloaded() {
            warn!("batch produced no files at all");
        }
        info!(
            total = result.total,
            success = result.success,
            failed = result.failed,
            no_data = result.no_data,
            "batch finished"
        );
        Ok(result)
    }

    fn record(
        &self,
        result: &mut BatchResult,
        unit_code: &str,
        kelompok: Option<&str>,
        outcome: ExportOutcome,
    ) {
        match outcome {
            ExportOutcome::Saved(path) => result.record_saved(path),
            ExportOutcome::NoData => result.record_no_data(unit_code, kelompok),
            ExportOutcome::Failed(msg) => result.record_failed(unit_code, kelompok, msg),
        }
    }

    fn write_manifest(
        &self,
        req: &BatchRequest,
        result: &BatchResult,
        url: &str,
    ) -> Result<(), AgentError> {
        let files: Vec<String> = result
            .files
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        self.ctx.write_manifest(&serde_json::json!({
            "run_id": self.ctx.run_id,
            "type": req.report.slug(),
            "period": req.period.to_string(),
            "month": req.period.month_name(),
            "year": req.period.year(),
            "url": url,
            "download_date": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "units_count": req.units.len(),
            "kelompok_count": req.report.kelompok().len(),
            "files_expected": result.total,
            "files_downloaded": result.files.len(),
            "files": files,
            "errors": &result.errors,
        }))
    }
}

/// One-shot entry point: open a browser, run the batch, always shut the
/// browser down. A batch that produced zero files is an error here, since
/// a one-shot caller has nothing to resume with.
#[cfg(feature = "webdriver")]
pub async fn run_report(
    config: &Config,
    ctx: &RunContext,
    req: &BatchRequest,
    prompt: &dyn CodePrompt,
) -> Result<BatchResult, AgentError> {
    use crate::page::webdriver::{BrowserOptions, WebDriverPage};

    let options = BrowserOptions {
        webdriver_url: config.get_str("runtime.webdriver_url", "http://localhost:9515"),
        headless: config.get_bool("runtime.headless", true),
        download_dir: ctx.excel_dir.join("incoming"),
        page_load_timeout: std::time::Duration::from_secs(60),
    };
    let page = WebDriverPage::open(&options).await?;
    let mut session = PortalSession::new(page);

    let outcome = Batch::new(config, ctx).run(&mut session, req, prompt).await;
    session.shutdown().await;

    let result = outcome?;
    result.require_any_file()?;
    Ok(result)
}
