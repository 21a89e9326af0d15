//! Navigation from the main portal into the report subsystem.
//!
//! The subsystem lives on its own host, reached through a tile on the
//! portal home page. The hop goes through an auth redirect, so the URL is
//! polled rather than awaited once. Landing on `/login` means the session
//! died; a hop that never leaves the redirect is a timeout.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::page::{self, Page, Strategy, Target};
use crate::retry::Screenshots;

const HOP_POLLS: u32 = 10;
const HOP_POLL_STEP: Duration = Duration::from_secs(1);

fn subsystem_tile() -> Target {
    Target::new(
        "report subsystem tile",
        vec![
            Strategy::xpath("//p[contains(normalize-space(.), 'APKT-SS')]"),
            Strategy::xpath("//a[contains(normalize-space(.), 'APKT-SS')]"),
        ],
    )
}

pub struct Navigator<'a, P: Page + ?Sized> {
    page: &'a P,
    shots: &'a Screenshots,
    report_host: String,
    home_url: String,
}

impl<'a, P: Page + ?Sized> Navigator<'a, P> {
    pub fn new(page: &'a P, config: &Config, shots: &'a Screenshots) -> Self {
        Self {
            page,
            shots,
            report_host: config.get_str("apkt.report_host", "new-apktss.pln.co.id"),
            home_url: config.get_str("apkt.report_home_url", "https://new-apktss.pln.co.id/home"),
        }
    }

    fn on_subsystem(&self, url: &str) -> bool {
        url.contains(&self.report_host) && !url.contains("/login") && !url.contains("/auth")
    }

    /// Move the page onto the report subsystem. Idempotent: already being
    /// there is a no-op. Fatal exits leave a `nav_fail.png` diagnostic.
    pub async fn to_report_subsystem(&self) -> Result<(), AgentError> {
        match self.navigate().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shots.capture(self.page, "nav_fail.png").await;
                Err(err)
            }
        }
    }

    async fn navigate(&self) -> Result<(), AgentError> {
        let url = self.page.current_url().await?;
        if self.on_subsystem(&url) {
            return Ok(());
        }

        match page::click_target(self.page, &subsystem_tile()).await {
            Ok(()) => {
                self.page.settle(Duration::from_secs(10)).await?;
                self.await_hop().await?;
            }
            Err(e) => {
                // Tile missing on some portal builds; go straight to the
                // subsystem home and let its auth redirect sort us out.
                warn!(error = %e, "subsystem tile not found, navigating directly");
                self.page.goto(&self.home_url).await?;
                self.page.settle(Duration::from_secs(10)).await?;
                self.classify(&self.page.current_url().await?)?;
            }
        }

        info!("on report subsystem");
        Ok(())
    }

    /// Poll through the auth redirect. `/auth` URLs are transient and
    /// tolerated mid-hop, but a hop that never settles on the subsystem is
    /// an error, classified by where it got stuck.
    async fn await_hop(&self) -> Result<(), AgentError> {
        for _ in 0..HOP_POLLS {
            let url = self.page.current_url().await?;
            if self.on_subsystem(&url) {
                return Ok(());
            }
            tokio::time::sleep(HOP_POLL_STEP).await;
        }
        self.classify(&self.page.current_url().await?)
    }

    fn classify(&self, url: &str) -> Result<(), AgentError> {
        if self.on_subsystem(url) {
            return Ok(());
        }
        if url.contains("/login") {
            return Err(AgentError::SessionExpired);
        }
        Err(AgentError::Navigation(format!(
            "did not reach report subsystem (last URL: {url})"
        )))
    }
}
