//! Scripted in-memory page used to drive the batch logic without a browser.

// Each test binary exercises a different slice of the fake's surface.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apkt_core::auth::CodePrompt;
use apkt_core::page::{Page, PageError, Strategy};
use async_trait::async_trait;

/// What the next armed download watch will observe.
#[derive(Debug, Clone)]
pub enum DownloadScript {
    /// A file with these bytes appears in the download directory.
    File(Vec<u8>),
    /// A dialog with this text blocks the page instead.
    Dialog(String),
    /// Nothing happens; the poll window runs out.
    Silence,
}

#[derive(Default)]
struct State {
    url: String,
    /// URLs handed out by successive `current_url` calls; the last one
    /// sticks. Empty means the current URL is returned unchanged.
    url_timeline: VecDeque<String>,
    /// Selector substrings that match no element.
    missing: Vec<String>,
    /// Removed from `missing` after the first reload.
    reveal_on_reload: Vec<String>,
    /// Selector substrings whose native select interaction fails.
    failing_selects: Vec<String>,
    scripts: VecDeque<DownloadScript>,
    active: Option<DownloadScript>,
    arm_count: usize,
    file_seq: usize,
    calls: Vec<String>,
    screenshots: Vec<PathBuf>,
    closed: bool,
}

/// Clones share state, so a handle kept outside a consumed
/// `PortalSession` still observes everything the session did.
#[derive(Clone)]
pub struct FakePage {
    download_dir: PathBuf,
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl FakePage {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            state: Arc::new(Mutex::new(State {
                url: "https://new-apktss.pln.co.id/home".into(),
                ..State::default()
            })),
        }
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.into();
    }

    pub fn queue_urls(&self, urls: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.url_timeline = urls.iter().map(|u| u.to_string()).collect();
    }

    pub fn set_missing(&self, substrings: &[&str]) {
        self.state.lock().unwrap().missing = substrings.iter().map(|s| s.to_string()).collect();
    }

    pub fn reveal_on_reload(&self, substrings: &[&str]) {
        self.state.lock().unwrap().reveal_on_reload =
            substrings.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_failing_selects(&self, substrings: &[&str]) {
        self.state.lock().unwrap().failing_selects =
            substrings.iter().map(|s| s.to_string()).collect();
    }

    pub fn push_download(&self, script: DownloadScript) {
        self.state.lock().unwrap().scripts.push_back(script);
    }

    pub fn arm_count(&self) -> usize {
        self.state.lock().unwrap().arm_count
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn matches_any(raw: &str, needles: &[String]) -> bool {
        needles.iter().any(|n| raw.contains(n.as_str()))
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.calls.push(format!("goto:{url}"));
        Ok(())
    }

    async fn reload(&self) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("reload".into());
        let reveal = std::mem::take(&mut state.reveal_on_reload);
        state.missing.retain(|m| !reveal.contains(m));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = state.url_timeline.pop_front() {
            state.url = next;
        }
        Ok(state.url.clone())
    }

    async fn settle(&self, _timeout: Duration) -> Result<(), PageError> {
        Ok(())
    }

    async fn exists(&self, strategy: &Strategy) -> Result<bool, PageError> {
        let state = self.state.lock().unwrap();
        Ok(!Self::matches_any(strategy.raw(), &state.missing))
    }

    async fn click(&self, strategy: &Strategy) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        if Self::matches_any(strategy.raw(), &state.missing) {
            return Err(PageError::NotFound(strategy.raw().to_string()));
        }
        state.calls.push(format!("click:{}", strategy.raw()));
        Ok(())
    }

    async fn fill(&self, strategy: &Strategy, value: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        if Self::matches_any(strategy.raw(), &state.missing) {
            return Err(PageError::NotFound(strategy.raw().to_string()));
        }
        state.calls.push(format!("fill:{}={value}", strategy.raw()));
        Ok(())
    }

    async fn clear(&self, strategy: &Strategy) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("clear:{}", strategy.raw()));
        Ok(())
    }

    async fn press_enter(&self, strategy: &Strategy) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("enter:{}", strategy.raw()));
        Ok(())
    }

    async fn select_by_label(&self, strategy: &Strategy, label: &str) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        if Self::matches_any(strategy.raw(), &state.missing) {
            return Err(PageError::NotFound(strategy.raw().to_string()));
        }
        if Self::matches_any(strategy.raw(), &state.failing_selects) {
            return Err(PageError::Interaction(format!(
                "option '{label}' not selectable"
            )));
        }
        state.calls.push(format!("select:{}={label}", strategy.raw()));
        Ok(())
    }

    async fn text_of(&self, strategy: &Strategy) -> Result<Option<String>, PageError> {
        let state = self.state.lock().unwrap();
        let raw = strategy.raw();
        let is_dialog = raw.contains("swal") || raw.contains("dialog") || raw.contains("modal");
        if is_dialog {
            if let Some(DownloadScript::Dialog(text)) = &state.active {
                return Ok(Some(text.clone()));
            }
        }
        Ok(None)
    }

    async fn arm_download_watch(&self) -> Result<(), PageError> {
        let mut state = self.state.lock().unwrap();
        state.arm_count += 1;
        state.active = Some(state.scripts.pop_front().unwrap_or(DownloadScript::Silence));
        Ok(())
    }

    async fn poll_download(&self) -> Result<Option<PathBuf>, PageError> {
        let mut state = self.state.lock().unwrap();
        match state.active.take() {
            Some(DownloadScript::File(bytes)) => {
                state.file_seq += 1;
                let path = self.download_dir.join(format!("incoming_{}.xlsx", state.file_seq));
                std::fs::write(&path, bytes).map_err(|e| PageError::Transport(e.to_string()))?;
                Ok(Some(path))
            }
            other => {
                state.active = other;
                Ok(None)
            }
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), PageError> {
        self.state.lock().unwrap().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<(), PageError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Prompt that never gets asked in these tests.
pub struct NoPrompt;

impl CodePrompt for NoPrompt {
    fn code(&self) -> io::Result<String> {
        Ok(String::new())
    }
}

/// Minimal valid configuration for batch tests.
#[allow(dead_code)]
pub const TEST_CONFIG: &str = r#"
apkt:
  login_url: "https://portal.example/login"
  iam_login_url: "https://iam.example/login"
  iam_totp_url_prefix: "https://iam.example/totp"
datasets: {}
workspace:
  root: "workspace"
runtime:
  headless: true
"#;
