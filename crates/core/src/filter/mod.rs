//! Filter controls on a report page: period, unit, kelompok.
//!
//! Every setter reports which dimension failed, so a batch can tell a bad
//! unit apart from a bad month. Dropdowns are native `<select>` elements
//! first, with a rich-widget fallback for pages that hide the select.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::AgentError;
use crate::page::{self, Page, Strategy, Target};
use crate::report::{Kelompok, Period, ReportSelectors};

const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const READY_PROBE_STEP: Duration = Duration::from_millis(500);

/// The filter dimension a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    Unit,
    Kelompok,
    Month,
    Year,
}

impl FilterDimension {
    pub fn name(&self) -> &'static str {
        match self {
            FilterDimension::Unit => "unit",
            FilterDimension::Kelompok => "kelompok",
            FilterDimension::Month => "month",
            FilterDimension::Year => "year",
        }
    }
}

pub struct FilterSetter<'a, P: Page + ?Sized> {
    page: &'a P,
    selectors: &'a ReportSelectors,
}

impl<'a, P: Page + ?Sized> FilterSetter<'a, P> {
    pub fn new(page: &'a P, selectors: &'a ReportSelectors) -> Self {
        Self { page, selectors }
    }

    async fn probe_ready(&self) -> Result<bool, AgentError> {
        let deadline = tokio::time::Instant::now() + READY_PROBE_TIMEOUT;
        loop {
            if page::target_exists(self.page, &self.selectors.ready_probe).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(READY_PROBE_STEP).await;
        }
    }

    /// Wait until the filter controls exist. Reloads once if the first
    /// render never produced them, which the portal does intermittently.
    pub async fn ensure_ready(&self) -> Result<(), AgentError> {
        if self.probe_ready().await? {
            return Ok(());
        }
        warn!("filter controls absent, reloading page once");
        self.page.reload().await?;
        self.page.settle(Duration::from_secs(10)).await?;
        if self.probe_ready().await? {
            return Ok(());
        }
        Err(AgentError::Filter {
            dimension: FilterDimension::Month.name(),
            detail: "filter controls never appeared, even after reload".into(),
        })
    }

    /// Select month then year. Set once per batch; the portal keeps the
    /// period across unit changes.
    pub async fn set_period(&self, period: &Period) -> Result<(), AgentError> {
        debug!(month = period.month_name(), year = period.year(), "setting period");
        page::select_target(self.page, &self.selectors.month_select, period.month_name())
            .await
            .map_err(|e| AgentError::Filter {
                dimension: FilterDimension::Month.name(),
                detail: e.to_string(),
            })?;
        tokio::time::sleep(Duration::from_millis(500)).await;

        page::select_target(self.page, &self.selectors.year_select, &period.year_label())
            .await
            .map_err(|e| AgentError::Filter {
                dimension: FilterDimension::Year.name(),
                detail: e.to_string(),
            })?;
        // The page re-queries after a period change.
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    pub async fn set_unit(&self, label: &str) -> Result<(), AgentError> {
        debug!(unit = label, "setting unit filter");
        self.select_with_fallback(
            FilterDimension::Unit,
            &self.selectors.unit_select,
            &self.selectors.unit_trigger,
            label,
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    pub async fn set_kelompok(&self, kelompok: Kelompok) -> Result<(), AgentError> {
        debug!(kelompok = kelompok.label(), "setting kelompok filter");
        self.select_with_fallback(
            FilterDimension::Kelompok,
            &self.selectors.kelompok_select,
            &self.selectors.kelompok_trigger,
            kelompok.label(),
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    /// Native select first. When that fails and a trigger is configured,
    /// open the rich widget and click the option by its visible label.
    async fn select_with_fallback(
        &self,
        dimension: FilterDimension,
        select: &Target,
        trigger: &Target,
        label: &str,
    ) -> Result<(), AgentError> {
        match page::select_target(self.page, select, label).await {
            Ok(()) => Ok(()),
            Err(native_err) => {
                if trigger.is_empty() {
                    return Err(AgentError::Filter {
                        dimension: dimension.name(),
                        detail: native_err.to_string(),
                    });
                }
                debug!(dimension = dimension.name(), "native select failed, trying rich widget");
                page::click_target(self.page, trigger)
                    .await
                    .map_err(|e| AgentError::Filter {
                        dimension: dimension.name(),
                        detail: format!("native select failed ({native_err}); trigger: {e}"),
                    })?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                self.page
                    .click(&Strategy::visible_text(label))
                    .await
                    .map_err(|e| AgentError::Filter {
                        dimension: dimension.name(),
                        detail: format!("option '{label}' not clickable in rich widget: {e}"),
                    })
            }
        }
    }
}
