//! Browser page abstraction.
//!
//! All portal interaction goes through the [`Page`] trait so that the
//! authenticator, navigator, filter setter and export arbiter can be driven
//! against a scripted fake in tests. The real implementation lives in
//! [`webdriver`].
//!
//! UI targets are described as ordered lists of locator strategies
//! ([`Target`]), tried in sequence with a cheap existence check. The tables
//! themselves live next to the component that owns them (auth selectors in
//! `auth`, per-report selectors in `report`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

#[cfg(feature = "webdriver")]
pub mod webdriver;

/// How long [`wait_for_url`] sleeps between URL probes.
const URL_POLL_STEP: Duration = Duration::from_millis(500);

/// Errors raised by the browser transport layer.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("interaction failed: {0}")]
    Interaction(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("browser transport error: {0}")]
    Transport(String),
}

/// A single way of locating an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Css(String),
    XPath(String),
    LinkText(String),
}

impl Strategy {
    pub fn css(s: impl Into<String>) -> Self {
        Strategy::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Strategy::XPath(s.into())
    }

    /// XPath matching any element whose visible text contains `text`.
    /// Used for option rows in custom dropdown widgets.
    pub fn visible_text(text: &str) -> Self {
        Strategy::XPath(format!(
            "//*[contains(normalize-space(.), '{}')][not(.//*[contains(normalize-space(.), '{}')])]",
            text, text
        ))
    }

    /// Raw selector string, used by fakes to match scripted behavior.
    pub fn raw(&self) -> &str {
        match self {
            Strategy::Css(s) | Strategy::XPath(s) | Strategy::LinkText(s) => s,
        }
    }
}

/// A logical UI target with its ordered fallback strategies.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: &'static str,
    pub strategies: Vec<Strategy>,
}

impl Target {
    pub fn new(name: &'static str, strategies: Vec<Strategy>) -> Self {
        Self { name, strategies }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// One live browser page bound to a remote host and a download directory.
///
/// Implementations are expected to be cheap to share (`&self` methods with
/// interior mutability where state is needed).
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), PageError>;

    async fn reload(&self) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Wait for the page to reach a network-quiet state, bounded by
    /// `timeout`. Implementations may approximate (document ready state plus
    /// a settle delay); the contract is "safe to interact after this".
    async fn settle(&self, timeout: Duration) -> Result<(), PageError>;

    async fn exists(&self, strategy: &Strategy) -> Result<bool, PageError>;

    async fn click(&self, strategy: &Strategy) -> Result<(), PageError>;

    async fn fill(&self, strategy: &Strategy, value: &str) -> Result<(), PageError>;

    async fn clear(&self, strategy: &Strategy) -> Result<(), PageError>;

    async fn press_enter(&self, strategy: &Strategy) -> Result<(), PageError>;

    /// Select the option with the given visible label in a native `<select>`.
    async fn select_by_label(&self, strategy: &Strategy, label: &str) -> Result<(), PageError>;

    /// Visible text of the first matching element, or `None` when absent.
    async fn text_of(&self, strategy: &Strategy) -> Result<Option<String>, PageError>;

    /// Snapshot current download-directory state. Must be called before the
    /// export click so a finished transfer can never be missed.
    async fn arm_download_watch(&self) -> Result<(), PageError>;

    /// A completed transfer that appeared since [`Page::arm_download_watch`],
    /// if any. In-progress temp files are never reported.
    async fn poll_download(&self) -> Result<Option<PathBuf>, PageError>;

    async fn screenshot(&self, path: &Path) -> Result<(), PageError>;

    /// Tear down the underlying browser session.
    async fn close(&self) -> Result<(), PageError>;
}

/// First strategy of `target` that currently matches an element.
pub async fn find_strategy<'t, P: Page + ?Sized>(
    page: &P,
    target: &'t Target,
) -> Result<&'t Strategy, PageError> {
    for strategy in &target.strategies {
        if page.exists(strategy).await? {
            return Ok(strategy);
        }
    }
    Err(PageError::NotFound(target.name.to_string()))
}

pub async fn target_exists<P: Page + ?Sized>(page: &P, target: &Target) -> Result<bool, PageError> {
    Ok(find_strategy(page, target).await.is_ok())
}

pub async fn click_target<P: Page + ?Sized>(page: &P, target: &Target) -> Result<(), PageError> {
    let strategy = find_strategy(page, target).await?;
    page.click(strategy).await
}

pub async fn fill_target<P: Page + ?Sized>(
    page: &P,
    target: &Target,
    value: &str,
) -> Result<(), PageError> {
    let strategy = find_strategy(page, target).await?;
    page.fill(strategy, value).await
}

pub async fn select_target<P: Page + ?Sized>(
    page: &P,
    target: &Target,
    label: &str,
) -> Result<(), PageError> {
    let strategy = find_strategy(page, target).await?;
    page.select_by_label(strategy, label).await
}

/// Text of the first matching strategy of `target`, or `None`.
pub async fn text_of_target<P: Page + ?Sized>(
    page: &P,
    target: &Target,
) -> Result<Option<String>, PageError> {
    for strategy in &target.strategies {
        if let Some(text) = page.text_of(strategy).await? {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

/// Poll the current URL until `accept` returns true, bounded by `timeout`.
/// Returns the accepted URL, or a `Timeout` error naming `what`.
pub async fn wait_for_url<P, F>(
    page: &P,
    what: &str,
    timeout: Duration,
    accept: F,
) -> Result<String, PageError>
where
    P: Page + ?Sized,
    F: Fn(&str) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let url = page.current_url().await?;
        if accept(&url) {
            return Ok(url);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(PageError::Timeout(format!("{what} (last URL: {url})")));
        }
        tokio::time::sleep(URL_POLL_STEP).await;
    }
}
