//! Portal login: SSO handoff, identity-provider credentials, optional OTP.
//!
//! The happy path is login page, SSO button, credential form on the IdP
//! host, then back to the application host. A TOTP challenge may appear in
//! between; a wrong code leaves the browser on the challenge URL, which is
//! the only signal the portal gives.

use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::AgentError;
use crate::page::{self, Page, Strategy, Target};
use crate::retry::Screenshots;

const IDP_REDIRECT_TIMEOUT: Duration = Duration::from_secs(30);
const APP_REDIRECT_TIMEOUT: Duration = Duration::from_secs(15);
const OTP_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(serde::Deserialize)]
struct CredentialsFile {
    username: Option<String>,
    password: Option<String>,
}

/// Look for `credentials/credentials.yaml`, then `credentials.yaml`, under
/// the given directory. Returns `None` when neither file yields a full pair.
pub fn load_credentials(base: &Path) -> Option<Credentials> {
    let candidates = [
        base.join("credentials").join("credentials.yaml"),
        base.join("credentials.yaml"),
    ];
    for path in candidates {
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_yaml::from_str::<CredentialsFile>(&text) {
            Ok(parsed) => {
                if let (Some(username), Some(password)) = (parsed.username, parsed.password) {
                    info!(path = %path.display(), "loaded credentials");
                    return Some(Credentials { username, password });
                }
                warn!(path = %path.display(), "credentials file is incomplete");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "unreadable credentials file"),
        }
    }
    None
}

/// Source of one-time codes during the OTP challenge. Abstracted so tests
/// can script codes instead of reading stdin.
pub trait CodePrompt: Send + Sync {
    fn code(&self) -> io::Result<String>;
}

/// Prompts on stderr and reads a code from stdin.
pub struct StdinPrompt;

impl CodePrompt for StdinPrompt {
    fn code(&self) -> io::Result<String> {
        eprint!("Enter OTP code: ");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

fn sso_button() -> Target {
    Target::new(
        "SSO login button",
        vec![
            Strategy::xpath("//button[contains(normalize-space(.), 'SSO')]"),
            Strategy::xpath("//a[contains(normalize-space(.), 'SSO')]"),
            Strategy::xpath("//button[contains(normalize-space(.), 'Login dengan SSO')]"),
        ],
    )
}

fn username_field() -> Target {
    Target::new(
        "username field",
        vec![
            Strategy::css("input[name='username']"),
            Strategy::css("input[name='email']"),
            Strategy::css("input[type='text']"),
        ],
    )
}

fn password_field() -> Target {
    Target::new(
        "password field",
        vec![
            Strategy::css("input[name='password']"),
            Strategy::css("input[type='password']"),
        ],
    )
}

fn submit_button() -> Target {
    Target::new(
        "login submit button",
        vec![
            Strategy::css("button[type='submit']"),
            Strategy::xpath("//button[contains(normalize-space(.), 'Masuk')]"),
            Strategy::xpath("//button[contains(normalize-space(.), 'Login')]"),
        ],
    )
}

fn otp_field() -> Target {
    Target::new(
        "OTP code field",
        vec![
            Strategy::css("input[name='otp']"),
            Strategy::css("input[name='totp']"),
            Strategy::css("input[name='code']"),
            Strategy::css("input[autocomplete='one-time-code']"),
        ],
    )
}

fn otp_submit() -> Target {
    Target::new(
        "OTP submit button",
        vec![
            Strategy::css("button[type='submit']"),
            Strategy::xpath("//button[contains(normalize-space(.), 'Konfirmasi')]"),
            Strategy::xpath("//button[contains(normalize-space(.), 'Verify')]"),
        ],
    )
}

/// Drives the full login sequence against one page.
pub struct Authenticator<'a, P: Page + ?Sized> {
    page: &'a P,
    shots: &'a Screenshots,
    login_url: String,
    iam_host: String,
    totp_url_prefix: String,
    app_host: String,
}

impl<'a, P: Page + ?Sized> Authenticator<'a, P> {
    pub fn new(page: &'a P, config: &Config, shots: &'a Screenshots) -> Self {
        Self {
            page,
            shots,
            login_url: config.get_str("apkt.login_url", ""),
            iam_host: config.get_str("apkt.iam_host", "iam.pln.co.id"),
            totp_url_prefix: config.get_str("apkt.iam_totp_url_prefix", ""),
            app_host: config.get_str("apkt.app_host", "new-apkt.pln.co.id"),
        }
    }

    fn on_totp_challenge(&self, url: &str) -> bool {
        url.contains("/totp")
            || (!self.totp_url_prefix.is_empty() && url.starts_with(&self.totp_url_prefix))
    }

    /// Run the login sequence to completion or a fatal [`AgentError`].
    /// Any fatal exit leaves an `auth_fail.png` diagnostic behind.
    pub async fn login(
        &self,
        creds: &Credentials,
        prompt: &dyn CodePrompt,
    ) -> Result<(), AgentError> {
        match self.run_login(creds, prompt).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shots.capture(self.page, "auth_fail.png").await;
                Err(err)
            }
        }
    }

    async fn run_login(
        &self,
        creds: &Credentials,
        prompt: &dyn CodePrompt,
    ) -> Result<(), AgentError> {
        info!(url = %self.login_url, "opening login page");
        self.page.goto(&self.login_url).await?;
        self.page.settle(Duration::from_secs(10)).await?;

        if page::click_target(self.page, &sso_button()).await.is_err() {
            return Err(AgentError::Auth("SSO login button not found".into()));
        }

        let iam = self.iam_host.clone();
        page::wait_for_url(self.page, "identity provider", IDP_REDIRECT_TIMEOUT, |u| {
            u.contains(&iam)
        })
        .await
        .map_err(|e| AgentError::Auth(format!("never reached identity provider: {e}")))?;

        self.page.settle(Duration::from_secs(10)).await?;
        page::fill_target(self.page, &username_field(), &creds.username)
            .await
            .map_err(|e| AgentError::Auth(format!("username field: {e}")))?;
        page::fill_target(self.page, &password_field(), &creds.password)
            .await
            .map_err(|e| AgentError::Auth(format!("password field: {e}")))?;
        page::click_target(self.page, &submit_button())
            .await
            .map_err(|e| AgentError::Auth(format!("login submit: {e}")))?;
        self.page.settle(Duration::from_secs(10)).await?;

        let url = self.page.current_url().await?;
        if self.on_totp_challenge(&url) {
            self.solve_totp(prompt).await?;
        }

        self.wait_for_app().await
    }

    /// OTP challenge loop. A wrong code leaves the browser on the challenge
    /// URL; the field is cleared and the next attempt uses a fresh code.
    async fn solve_totp(&self, prompt: &dyn CodePrompt) -> Result<(), AgentError> {
        info!("OTP challenge detected");
        for attempt in 1..=OTP_MAX_ATTEMPTS {
            let code = prompt
                .code()
                .map_err(|e| AgentError::Auth(format!("failed to read OTP code: {e}")))?;
            if code.is_empty() {
                warn!(attempt, "empty OTP code entered");
                continue;
            }

            page::fill_target(self.page, &otp_field(), &code)
                .await
                .map_err(|e| AgentError::Auth(format!("OTP field: {e}")))?;
            if page::click_target(self.page, &otp_submit()).await.is_err() {
                // Some IdP builds submit the form on enter instead.
                if let Ok(strategy) = page::find_strategy(self.page, &otp_field()).await {
                    self.page.press_enter(strategy).await?;
                }
            }
            self.page.settle(Duration::from_secs(5)).await?;
            tokio::time::sleep(Duration::from_secs(2)).await;

            let url = self.page.current_url().await?;
            if !self.on_totp_challenge(&url) {
                return Ok(());
            }
            warn!(attempt, "still on OTP challenge, code was rejected");
            if let Ok(strategy) = page::find_strategy(self.page, &otp_field()).await {
                let _ = self.page.clear(strategy).await;
            }
        }
        Err(AgentError::Auth(format!(
            "OTP challenge not passed after {OTP_MAX_ATTEMPTS} attempts"
        )))
    }

    /// Wait for the application host, retrying the SSO handoff once if the
    /// IdP dropped us back on a login page.
    async fn wait_for_app(&self) -> Result<(), AgentError> {
        let app = self.app_host.clone();
        let reached = page::wait_for_url(self.page, "application", APP_REDIRECT_TIMEOUT, |u| {
            u.contains(&app)
        })
        .await;

        if reached.is_err() {
            let url = self.page.current_url().await?;
            if url.contains(&self.iam_host) {
                warn!("stuck on identity provider, retrying SSO handoff");
                self.page.goto(&self.login_url).await?;
                self.page.settle(Duration::from_secs(10)).await?;
                let _ = page::click_target(self.page, &sso_button()).await;
                let app = self.app_host.clone();
                let _ = page::wait_for_url(
                    self.page,
                    "application (retry)",
                    APP_REDIRECT_TIMEOUT,
                    |u| u.contains(&app),
                )
                .await;
            }
        }

        let url = self.page.current_url().await?;
        if url.contains(&self.app_host) {
            info!("login complete");
            Ok(())
        } else {
            Err(AgentError::Auth(format!(
                "login did not reach the application (last URL: {url})"
            )))
        }
    }
}
