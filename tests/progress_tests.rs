//! Tests for the progress module functionality.
//!
//! Progress bar styling, the terminal display and the aggregated view.

use haul::progress::{
    ProgressAggregator, ProgressBarOpts, ProgressDisplay, ProgressSnapshot, StyleOptions,
};
use haul::{TaskId, TaskState};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::helpers::*;

fn snapshot(id: usize, state: TaskState, bytes: u64) -> ProgressSnapshot {
    ProgressSnapshot {
        task_id: TaskId(id),
        state,
        bytes_downloaded: bytes,
        total_bytes: Some(1000),
        speed: 50.0,
        eta: Some(Duration::from_secs((1000 - bytes) / 50)),
    }
}

#[test]
fn test_style_options_default() {
    let style = StyleOptions::default();
    assert!(style.is_enabled());
    assert_progress_opts_enabled(style.main());
    assert_progress_opts_enabled(style.child());
}

#[test]
fn test_style_options_disabled() {
    assert!(!StyleOptions::hidden().is_enabled());
}

#[test]
fn test_style_options_setters() {
    let mut style = StyleOptions::default();
    style.set_main(ProgressBarOpts::hidden());
    style.set_child(ProgressBarOpts::with_task_style());

    // The child bar keeps the style enabled.
    assert!(style.is_enabled());
    assert_progress_opts_disabled(style.main());
}

#[test]
fn test_progress_bar_opts_new() {
    let opts = create_custom_progress_opts("{bar} {pos}/{len}", "abc");
    assert_progress_opts_enabled(&opts);
    assert_eq!(opts.to_progress_bar(100).length(), Some(100));
}

#[test]
fn test_progress_bar_opts_set_clear() {
    let mut opts = ProgressBarOpts::default();
    opts.set_clear(false);
    assert_progress_opts_enabled(&opts);
    opts.set_clear(true);
    assert_progress_opts_enabled(&opts);
}

#[test]
fn test_progress_display_single_file() {
    let display = ProgressDisplay::new(create_test_style_options(), 1, true);
    assert!(display.main().is_hidden());
}

#[test]
fn test_progress_display_multiple_files() {
    let display = ProgressDisplay::new(create_test_style_options(), 3, true);
    assert_eq!(display.main().length(), Some(3));
    display.increment_main();
    assert_eq!(display.main().position(), 1);
}

#[test]
fn test_progress_display_tracks_children() {
    let display = ProgressDisplay::new(StyleOptions::hidden(), 2, false);
    display.set_label(TaskId(0), "a.bin");
    display.apply(&snapshot(0, TaskState::InProgress, 100));
    display.apply(&snapshot(1, TaskState::InProgress, 200));
    assert_eq!(display.active_children(), 2);

    display.apply(&snapshot(0, TaskState::Failed, 100));
    assert_eq!(display.active_children(), 1);
    display.finish();
    assert_eq!(display.active_children(), 0);
}

#[tokio::test]
async fn test_display_follows_aggregator() {
    let progress = ProgressAggregator::new(16);
    let display = Arc::new(ProgressDisplay::new(StyleOptions::hidden(), 2, false));
    let stop = haul::CancellationToken::new();
    let follower = tokio::spawn(Arc::clone(&display).follow(progress.subscribe(), stop.clone()));

    progress.report(snapshot(0, TaskState::InProgress, 10));
    progress.report(snapshot(1, TaskState::InProgress, 20));
    progress.report(snapshot(1, TaskState::Completed, 1000));

    stop.cancel();
    follower.await.unwrap();
    assert_eq!(display.active_children(), 1);
}

#[test]
fn test_overall_progress_merges_tasks() {
    let progress = ProgressAggregator::new(16);
    progress.report(snapshot(0, TaskState::InProgress, 500));
    progress.report(snapshot(1, TaskState::InProgress, 900));
    progress.report(snapshot(2, TaskState::Paused, 100));
    progress.report(snapshot(3, TaskState::Completed, 1000));

    let overall = progress.overall();
    assert_eq!(overall.active, 3);
    assert_eq!(overall.finished, 1);
    assert_eq!(overall.bytes_downloaded, 1500);
    assert_eq!(overall.total_bytes, 3000);
    assert_eq!(overall.speed, 150.0);
    assert_eq!(overall.eta, Some(Duration::from_secs(18)));
}

#[tokio::test]
async fn test_lagging_subscriber_never_blocks_reports() {
    let progress = ProgressAggregator::new(4);
    let mut slow = progress.subscribe();

    for bytes in 0..100 {
        progress.report(snapshot(0, TaskState::InProgress, bytes));
    }

    let first = slow.recv().await.unwrap();
    assert_eq!(first.bytes_downloaded, 96);
    assert_eq!(slow.dropped(), 96);
    assert_eq!(progress.snapshot(TaskId(0)).unwrap().bytes_downloaded, 99);
}
