//! [`Page`] backed by a chromedriver session via thirtyfour.
//!
//! Downloads are observed through the browser's download directory: the
//! watch snapshots the directory before the export click, and the poll
//! reports the first completed file that appeared since.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::components::SelectElement;
use thirtyfour::error::WebDriverError;
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, Key, WebDriver};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Page, PageError, Strategy};

/// Partial download extensions that must never be reported as complete.
const IN_PROGRESS_SUFFIXES: &[&str] = &[".crdownload", ".part", ".tmp"];

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// chromedriver endpoint.
    pub webdriver_url: String,
    pub headless: bool,
    /// Where the browser drops completed downloads.
    pub download_dir: PathBuf,
    pub page_load_timeout: Duration,
}

pub struct WebDriverPage {
    driver: WebDriver,
    download_dir: PathBuf,
    /// Directory entries present when the watch was armed.
    watch: Mutex<HashSet<OsString>>,
}

fn transport(e: WebDriverError) -> PageError {
    PageError::Transport(e.to_string())
}

fn interaction(e: WebDriverError) -> PageError {
    PageError::Interaction(e.to_string())
}

fn locator(strategy: &Strategy) -> By {
    match strategy {
        Strategy::Css(s) => By::Css(s.as_str()),
        Strategy::XPath(s) => By::XPath(s.as_str()),
        Strategy::LinkText(s) => By::LinkText(s.as_str()),
    }
}

impl WebDriverPage {
    /// Start a browser session configured for unattended downloads.
    pub async fn open(options: &BrowserOptions) -> Result<Self, PageError> {
        std::fs::create_dir_all(&options.download_dir)
            .map_err(|e| PageError::Transport(format!("download directory: {e}")))?;

        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--no-sandbox").map_err(transport)?;
        caps.add_arg("--disable-dev-shm-usage").map_err(transport)?;
        caps.add_arg("--window-size=1600,1000").map_err(transport)?;
        if options.headless {
            caps.add_arg("--headless=new").map_err(transport)?;
        }
        caps.add_experimental_option(
            "prefs",
            serde_json::json!({
                "download.default_directory": options.download_dir.to_string_lossy(),
                "download.prompt_for_download": false,
                "safebrowsing.enabled": true,
            }),
        )
        .map_err(transport)?;

        let driver = WebDriver::new(&options.webdriver_url, caps)
            .await
            .map_err(transport)?;
        driver
            .set_page_load_timeout(options.page_load_timeout)
            .await
            .map_err(transport)?;
        info!(url = %options.webdriver_url, headless = options.headless, "browser session started");

        Ok(Self {
            driver,
            download_dir: options.download_dir.clone(),
            watch: Mutex::new(HashSet::new()),
        })
    }

    fn in_progress(name: &OsString) -> bool {
        let name = name.to_string_lossy();
        IN_PROGRESS_SUFFIXES.iter().any(|s| name.ends_with(s))
    }

    fn list_downloads(&self) -> Result<HashSet<OsString>, PageError> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(&self.download_dir)
            .map_err(|e| PageError::Transport(format!("download directory: {e}")))?
        {
            let entry = entry.map_err(|e| PageError::Transport(e.to_string()))?;
            names.insert(entry.file_name());
        }
        Ok(names)
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.driver.goto(url).await.map_err(transport)
    }

    async fn reload(&self) -> Result<(), PageError> {
        self.driver.refresh().await.map_err(transport)
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.driver
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(transport)
    }

    async fn settle(&self, timeout: Duration) -> Result<(), PageError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let ready = self
                .driver
                .execute("return document.readyState", Vec::new())
                .await
                .map_err(transport)?;
            if ready.json().as_str() == Some("complete") {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PageError::Timeout("document ready state".into()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        // Ready state says nothing about in-flight XHR; give the page a
        // moment to render what it fetched.
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn exists(&self, strategy: &Strategy) -> Result<bool, PageError> {
        self.driver
            .find_all(locator(strategy))
            .await
            .map(|elems| !elems.is_empty())
            .map_err(transport)
    }

    async fn click(&self, strategy: &Strategy) -> Result<(), PageError> {
        let elem = self
            .driver
            .find(locator(strategy))
            .await
            .map_err(|_| PageError::NotFound(strategy.raw().to_string()))?;
        elem.click().await.map_err(interaction)
    }

    async fn fill(&self, strategy: &Strategy, value: &str) -> Result<(), PageError> {
        let elem = self
            .driver
            .find(locator(strategy))
            .await
            .map_err(|_| PageError::NotFound(strategy.raw().to_string()))?;
        elem.clear().await.map_err(interaction)?;
        elem.send_keys(value).await.map_err(interaction)
    }

    async fn clear(&self, strategy: &Strategy) -> Result<(), PageError> {
        let elem = self
            .driver
            .find(locator(strategy))
            .await
            .map_err(|_| PageError::NotFound(strategy.raw().to_string()))?;
        elem.clear().await.map_err(interaction)
    }

    async fn press_enter(&self, strategy: &Strategy) -> Result<(), PageError> {
        let elem = self
            .driver
            .find(locator(strategy))
            .await
            .map_err(|_| PageError::NotFound(strategy.raw().to_string()))?;
        elem.send_keys(char::from(Key::Enter).to_string())
            .await
            .map_err(interaction)
    }

    async fn select_by_label(&self, strategy: &Strategy, label: &str) -> Result<(), PageError> {
        let elem = self
            .driver
            .find(locator(strategy))
            .await
            .map_err(|_| PageError::NotFound(strategy.raw().to_string()))?;
        let select = SelectElement::new(&elem).await.map_err(interaction)?;
        select
            .select_by_exact_text(label)
            .await
            .map_err(|e| PageError::Interaction(format!("option '{label}': {e}")))
    }

    async fn text_of(&self, strategy: &Strategy) -> Result<Option<String>, PageError> {
        let elems = self
            .driver
            .find_all(locator(strategy))
            .await
            .map_err(transport)?;
        match elems.first() {
            Some(elem) => elem.text().await.map(Some).map_err(interaction),
            None => Ok(None),
        }
    }

    async fn arm_download_watch(&self) -> Result<(), PageError> {
        let names = self.list_downloads()?;
        debug!(existing = names.len(), "download watch armed");
        *self.watch.lock().await = names;
        Ok(())
    }

    async fn poll_download(&self) -> Result<Option<PathBuf>, PageError> {
        let baseline = self.watch.lock().await;
        for name in self.list_downloads()? {
            if baseline.contains(&name) || Self::in_progress(&name) {
                continue;
            }
            let path = self.download_dir.join(&name);
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if meta.is_file() && meta.len() > 0 {
                debug!(file = %path.display(), "download completed");
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    async fn screenshot(&self, path: &Path) -> Result<(), PageError> {
        self.driver.screenshot(path).await.map_err(transport)
    }

    async fn close(&self) -> Result<(), PageError> {
        // quit() consumes; WebDriver handles are cheap clones of one session.
        self.driver.clone().quit().await.map_err(transport)
    }
}
