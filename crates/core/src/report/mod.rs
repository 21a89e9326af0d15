//! Report-page metadata: periods, units, kelompok and per-page selector sets.
//!
//! Each report page on the portal carries its own selector names (the month
//! dropdown is `vc-component-4` on the kumulatif and bulanan pages but
//! `vc-component-9` on the detail-gangguan page, and so on). These
//! differences are kept as data in [`ReportSelectors`] rather than branches
//! in the control flow.

use std::path::Path;

use serde::Deserialize;

use crate::error::AgentError;
use crate::page::{Strategy, Target};

/// Indonesian month names, indexed by month number minus one.
pub const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// A reporting period, canonically a 6-digit YYYYMM string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Result<Self, AgentError> {
        if !(1..=12).contains(&month) {
            return Err(AgentError::Config(format!(
                "invalid month in period: {month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse a YYYYMM string.
    pub fn parse(s: &str) -> Result<Self, AgentError> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AgentError::Config(format!(
                "invalid period format: {s} (expected YYYYMM)"
            )));
        }
        let parse_err = || AgentError::Config(format!("invalid period: {s}"));
        let year: u16 = s[..4].parse().map_err(|_| parse_err())?;
        let month: u8 = s[4..].parse().map_err(|_| parse_err())?;
        Self::new(year, month)
    }

    /// Rebuild a period from its display parts.
    pub fn from_parts(month_name: &str, year: u16) -> Option<Self> {
        let idx = MONTH_NAMES.iter().position(|m| *m == month_name)?;
        Some(Self {
            year,
            month: idx as u8 + 1,
        })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Localized month name used to match the dropdown option label.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month as usize - 1]
    }

    pub fn year_label(&self) -> String {
        self.year.to_string()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

/// Fault-group dimension on the detail-gangguan page. Iteration order is
/// this enumeration order, not alphabetical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kelompok {
    Distribusi,
    Transmisi,
    Pembangkit,
}

impl Kelompok {
    pub const ALL: [Kelompok; 3] = [
        Kelompok::Distribusi,
        Kelompok::Transmisi,
        Kelompok::Pembangkit,
    ];

    /// Display label as it appears in the dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            Kelompok::Distribusi => "DISTRIBUSI",
            Kelompok::Transmisi => "TRANSMISI",
            Kelompok::Pembangkit => "PEMBANGKIT",
        }
    }

    /// Lower-case filename fragment.
    pub fn slug(&self) -> &'static str {
        match self {
            Kelompok::Distribusi => "distribusi",
            Kelompok::Transmisi => "transmisi",
            Kelompok::Pembangkit => "pembangkit",
        }
    }
}

/// One row of the unit selection list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SelectionUnit {
    /// Internal option value on the portal.
    pub value: String,
    /// Display label used to match the dropdown option.
    pub text: String,
    /// Machine code used in filenames.
    pub code: String,
}

#[derive(Deserialize)]
struct UnitsFile {
    #[serde(default)]
    selected_units: Vec<SelectionUnit>,
}

/// Units without per-kelompok data on the detail-gangguan page.
pub const EXCLUDED_UNIT_CODES: &[&str] = &["REG_SUMKAL"];

/// Load the ordered unit list from a YAML file (`selected_units:` key).
/// With `exclude_regional`, units in [`EXCLUDED_UNIT_CODES`] are dropped.
pub fn load_units(path: &Path, exclude_regional: bool) -> Result<Vec<SelectionUnit>, AgentError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AgentError::Config(format!("failed to read unit list {}: {e}", path.display()))
    })?;
    let parsed: UnitsFile = serde_yaml::from_str(&text)
        .map_err(|e| AgentError::Config(format!("failed to parse unit list: {e}")))?;
    let mut units = parsed.selected_units;
    if exclude_regional {
        units.retain(|u| !EXCLUDED_UNIT_CODES.contains(&u.code.as_str()));
    }
    Ok(units)
}

/// Selector tables for one report page. Kept per page because the portal's
/// pages drift independently; update the data, not the control flow.
#[derive(Debug, Clone)]
pub struct ReportSelectors {
    /// Probed to decide the page is ready for filtering.
    pub ready_probe: Target,
    pub month_select: Target,
    pub year_select: Target,
    pub unit_select: Target,
    /// Custom dropdown trigger used when the native unit select is hidden.
    pub unit_trigger: Target,
    pub kelompok_select: Target,
    pub kelompok_trigger: Target,
    pub export_button: Target,
    pub excel_option: Target,
    /// Blocking dialog container, probed during the export poll.
    pub dialog: Target,
    pub dialog_dismiss: Target,
    /// Substring identifying the "no data for this filter" dialog.
    pub no_data_pattern: &'static str,
}

fn dialog_targets() -> (Target, Target) {
    let dialog = Target::new(
        "blocking dialog",
        vec![
            Strategy::css(".swal2-popup"),
            Strategy::css("[role='dialog']"),
            Strategy::css(".modal-content"),
        ],
    );
    let dismiss = Target::new(
        "dialog dismiss button",
        vec![
            Strategy::css(".swal2-confirm"),
            Strategy::xpath("//div[@role='dialog']//button[contains(normalize-space(.), 'OK')]"),
            Strategy::xpath("//div[@role='dialog']//button"),
        ],
    );
    (dialog, dismiss)
}

fn saidi_saifi_selectors() -> ReportSelectors {
    let (dialog, dialog_dismiss) = dialog_targets();
    ReportSelectors {
        ready_probe: Target::new(
            "month selector probe",
            vec![Strategy::css("select[name='vc-component-4']")],
        ),
        month_select: Target::new(
            "month dropdown",
            vec![Strategy::css("select[name='vc-component-4']")],
        ),
        year_select: Target::new(
            "year dropdown",
            vec![Strategy::css("select[name='vc-component-6']")],
        ),
        unit_select: Target::new(
            "unit dropdown",
            vec![
                Strategy::css("select#unitInduk"),
                Strategy::css("select[name='unitInduk']"),
            ],
        ),
        unit_trigger: Target::new("unit dropdown trigger", vec![]),
        kelompok_select: Target::new("kelompok dropdown", vec![]),
        kelompok_trigger: Target::new("kelompok dropdown trigger", vec![]),
        export_button: Target::new(
            "export button",
            vec![
                Strategy::xpath("//button[contains(normalize-space(.), 'Eksport')]"),
                Strategy::xpath("//button[contains(normalize-space(.), 'Export')]"),
            ],
        ),
        excel_option: Target::new(
            "excel format option",
            vec![
                Strategy::xpath("//*[@role='menuitem'][contains(normalize-space(.), 'Excel')]"),
                Strategy::xpath("//button[contains(normalize-space(.), 'Excel')]"),
                Strategy::xpath("//a[contains(normalize-space(.), 'Excel')]"),
            ],
        ),
        dialog,
        dialog_dismiss,
        no_data_pattern: "data tidak ditemukan",
    }
}

fn detail_gangguan_selectors() -> ReportSelectors {
    let (dialog, dialog_dismiss) = dialog_targets();
    ReportSelectors {
        ready_probe: Target::new(
            "month selector probe",
            vec![Strategy::css("select[name='vc-component-9']")],
        ),
        month_select: Target::new(
            "month dropdown",
            vec![
                Strategy::css("select[name='vc-component-9']"),
                Strategy::css("select#vc-component-9"),
            ],
        ),
        year_select: Target::new(
            "year dropdown",
            vec![
                Strategy::css("select[name='vc-component-11']"),
                Strategy::css("select#vc-component-11"),
            ],
        ),
        unit_select: Target::new(
            "unit dropdown",
            vec![
                Strategy::css("select#unitInduk"),
                Strategy::css("select[name='unitInduk']"),
            ],
        ),
        unit_trigger: Target::new(
            "unit dropdown trigger",
            vec![
                Strategy::xpath(
                    "//label[@for='unitInduk']/..//div[@data-rich-select-focusable]",
                ),
                Strategy::xpath("//span[contains(normalize-space(.), 'Pilih Unit Induk')]"),
            ],
        ),
        kelompok_select: Target::new(
            "kelompok dropdown",
            vec![
                Strategy::css("select#kelompok"),
                Strategy::css("select[name='kelompok']"),
            ],
        ),
        kelompok_trigger: Target::new(
            "kelompok dropdown trigger",
            vec![
                Strategy::xpath(
                    "//label[@for='kelompok']/..//div[@data-rich-select-focusable]",
                ),
                Strategy::xpath("//span[contains(normalize-space(.), 'Pilih Kelompok')]"),
            ],
        ),
        export_button: Target::new(
            "export button",
            vec![
                Strategy::css("#headlessui-menu-button-v-2"),
                Strategy::xpath("//button[contains(normalize-space(.), 'Eksport')]"),
            ],
        ),
        excel_option: Target::new(
            "excel format option",
            vec![
                Strategy::xpath("//*[@role='menuitem'][contains(normalize-space(.), 'Excel')]"),
                Strategy::xpath("//button[contains(normalize-space(.), 'Excel')]"),
                Strategy::xpath("//a[contains(normalize-space(.), 'Excel')]"),
            ],
        ),
        dialog,
        dialog_dismiss,
        no_data_pattern: "data tidak ditemukan",
    }
}

/// The report pages this agent knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// SAIDI/SAIFI cumulative report.
    Kumulatif,
    /// SAIDI/SAIFI single-month report.
    Bulanan,
    /// Per-fault-code detail report, one file per (unit, kelompok).
    DetailGangguan,
}

impl ReportKind {
    /// Dataset identifier used in manifests and run directories.
    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Kumulatif => "se004_kumulatif",
            ReportKind::Bulanan => "se004_bulanan",
            ReportKind::DetailGangguan => "se004_detail_gangguan",
        }
    }

    /// Filename prefix. Downstream parsing recovers metadata from these
    /// names, so the contract is exact.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportKind::Kumulatif => "se004_kumulatif",
            ReportKind::Bulanan => "se004_bulanan",
            ReportKind::DetailGangguan => "se004_detail",
        }
    }

    /// Config key holding the report page URL.
    pub fn url_config_key(&self) -> &'static str {
        match self {
            ReportKind::Kumulatif => "datasets.se004_kumulatif.url",
            ReportKind::Bulanan => "datasets.se004_bulanan.url",
            ReportKind::DetailGangguan => "datasets.se004_detail_gangguan.url",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            ReportKind::Kumulatif => {
                "https://new-apktss.pln.co.id/home/laporan-saidi-saifi-kumulatif-se004"
            }
            ReportKind::Bulanan => "https://new-apktss.pln.co.id/home/laporan-saidi-saifi-se004",
            ReportKind::DetailGangguan => {
                "https://new-apktss.pln.co.id/home/laporan-detil-kode-gangguan-se004"
            }
        }
    }

    /// Kelompok values iterated per unit; empty for reports without the
    /// kelompok dimension.
    pub fn kelompok(&self) -> &'static [Kelompok] {
        match self {
            ReportKind::DetailGangguan => &Kelompok::ALL,
            _ => &[],
        }
    }

    pub fn selectors(&self) -> ReportSelectors {
        match self {
            ReportKind::Kumulatif | ReportKind::Bulanan => saidi_saifi_selectors(),
            ReportKind::DetailGangguan => detail_gangguan_selectors(),
        }
    }

    /// Deterministic export filename:
    /// `<prefix>_<period>_<unit_code>[_<kelompok>].xlsx`.
    pub fn file_name(
        &self,
        period: &Period,
        unit_code: &str,
        kelompok: Option<Kelompok>,
    ) -> String {
        match kelompok {
            Some(k) => format!("{}_{}_{}_{}.xlsx", self.file_prefix(), period, unit_code, k.slug()),
            None => format!("{}_{}_{}.xlsx", self.file_prefix(), period, unit_code),
        }
    }
}
