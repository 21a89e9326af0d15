//! Browser-driven extraction of SAIDI/SAIFI reports from the APKT portal.
//!
//! The portal offers its reliability reports only through an interactive
//! web UI, so this crate drives a real browser: log in through SSO, hop
//! into the report subsystem, set filters, trigger the Excel export and
//! collect the downloaded files into a per-run workspace.
//!
//! All page interaction goes through the [`page::Page`] trait; the
//! batch logic is testable against a scripted fake, while production runs
//! use the chromedriver-backed implementation behind the `webdriver`
//! feature.

pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod nav;
pub mod page;
pub mod report;
pub mod retry;
pub mod workspace;

pub use batch::{Batch, BatchRequest, BatchResult, PortalSession};
pub use config::Config;
pub use error::AgentError;
pub use export::ExportOutcome;
pub use report::{Kelompok, Period, ReportKind, SelectionUnit};
pub use workspace::{create_run, RunContext};
