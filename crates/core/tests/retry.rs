mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use apkt_core::export::ExportOutcome;
use apkt_core::retry::{RetryPolicy, Screenshots};
use common::FakePage;
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn succeeds_without_using_the_full_budget() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    let shots = Screenshots::new(dir.path());
    let policy = RetryPolicy::default();

    let attempts = AtomicU32::new(0);
    let outcome = policy
        .run(&page, &shots, "download_WIL_ACEH", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    ExportOutcome::Failed("transient".into())
                } else {
                    ExportOutcome::Saved("out.xlsx".into())
                }
            }
        })
        .await;

    assert!(outcome.is_saved());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Screenshots only for the two failed attempts.
    let names: Vec<String> = page
        .screenshots()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "download_WIL_ACEH_attempt_1.png",
            "download_WIL_ACEH_attempt_2.png",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn no_data_is_final_on_the_first_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    let shots = Screenshots::new(dir.path());
    let policy = RetryPolicy::default();

    let attempts = AtomicU32::new(0);
    let outcome = policy
        .run(&page, &shots, "download_WIL_ACEH", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { ExportOutcome::NoData }
        })
        .await;

    assert_eq!(outcome, ExportOutcome::NoData);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(page.screenshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backoff_waits_between_attempts_but_not_after_the_last() {
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new(dir.path());
    let shots = Screenshots::new(dir.path());
    let policy = RetryPolicy::default();

    let started = tokio::time::Instant::now();
    let outcome = policy
        .run(&page, &shots, "dl", || async {
            ExportOutcome::Failed("still broken".into())
        })
        .await;
    let elapsed = started.elapsed();

    match outcome {
        ExportOutcome::Failed(msg) => {
            assert!(msg.contains("after 3 attempts"));
            assert!(msg.contains("still broken"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    // 2s after the first failure, 5s after the second, nothing after the
    // third.
    assert!(elapsed >= Duration::from_secs(7));
    assert!(elapsed < Duration::from_secs(17));
}

#[test]
fn delay_schedule_is_non_decreasing() {
    let policy = RetryPolicy::default();
    let delays: Vec<Duration> = (1..=3).map(|n| policy.delay_for(n)).collect();
    let mut sorted = delays.clone();
    sorted.sort();
    assert_eq!(delays, sorted);
    assert_eq!(policy.delay_for(99), *delays.last().unwrap());
}
