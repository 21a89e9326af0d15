mod common;

use apkt_core::export::{export_once, ExportOutcome};
use apkt_core::report::ReportKind;
use common::{DownloadScript, FakePage};
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn saved_file_is_moved_to_its_final_name() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.push_download(DownloadScript::File(b"workbook".to_vec()));

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("se004_kumulatif_202501_WIL_ACEH.xlsx");
    let outcome = export_once(&page, &selectors, &target).await;

    assert_eq!(outcome, ExportOutcome::Saved(target.clone()));
    assert_eq!(std::fs::read(&target).unwrap(), b"workbook");
}

#[tokio::test(start_paused = true)]
async fn no_data_dialog_is_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.push_download(DownloadScript::Dialog(
        "Data tidak ditemukan untuk periode ini".into(),
    ));

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("out.xlsx");
    let outcome = export_once(&page, &selectors, &target).await;

    assert_eq!(outcome, ExportOutcome::NoData);
    assert!(!target.exists());
}

#[tokio::test(start_paused = true)]
async fn other_dialogs_block_the_export() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.push_download(DownloadScript::Dialog("Terjadi kesalahan pada server".into()));

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("out.xlsx");
    let outcome = export_once(&page, &selectors, &target).await;

    match outcome {
        ExportOutcome::Failed(msg) => {
            assert!(msg.contains("blocked by dialog"));
            assert!(msg.contains("Terjadi kesalahan"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    // The dialog was dismissed so the page stays usable.
    assert!(page
        .calls()
        .iter()
        .any(|c| c.starts_with("click:") && c.contains("swal2-confirm")));
}

#[tokio::test(start_paused = true)]
async fn empty_download_counts_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.push_download(DownloadScript::File(Vec::new()));

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("out.xlsx");
    let outcome = export_once(&page, &selectors, &target).await;

    match outcome {
        ExportOutcome::Failed(msg) => assert!(msg.contains("empty")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(!target.exists());
}

#[tokio::test(start_paused = true)]
async fn silence_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.push_download(DownloadScript::Silence);

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("out.xlsx");

    let started = tokio::time::Instant::now();
    let outcome = export_once(&page, &selectors, &target).await;
    let elapsed = started.elapsed();

    match outcome {
        ExportOutcome::Failed(msg) => assert!(msg.contains("60")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(elapsed >= std::time::Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn missing_export_button_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    page.set_missing(&["Eksport", "Export"]);

    let selectors = ReportKind::Kumulatif.selectors();
    let target = dir.path().join("out.xlsx");
    let outcome = export_once(&page, &selectors, &target).await;

    match outcome {
        ExportOutcome::Failed(msg) => assert!(msg.contains("export button")),
        other => panic!("expected Failed, got {other:?}"),
    }
    // The watch is armed before the click, never after.
    assert_eq!(page.arm_count(), 1);
}
