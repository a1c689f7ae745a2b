//! ExportWorker: one job at a time, cancellation and terminal events.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use clipforge_core::error::EditError;
use clipforge_core::quality::EncodeParams;
use clipforge_media::worker::{ExportEvent, ExportWorker};

use common::{clip, entries, timeline, Gated, Panicking, Recording, Synthetic};

const WAIT: Duration = Duration::from_secs(10);

/// Collect events for `job` up to and including its terminal one.
fn wait_for_end(worker: &ExportWorker, job: uuid::Uuid) -> Vec<ExportEvent> {
    let mut events = Vec::new();
    loop {
        let ev = worker.rx.recv_timeout(WAIT).expect("worker went quiet");
        assert_eq!(ev.job_id(), job);
        let done = ev.is_terminal();
        events.push(ev);
        if done {
            return events;
        }
    }
}

#[test]
fn finished_job_reports_done_and_frees_the_slot() {
    let dir    = tempfile::tempdir().unwrap();
    let out    = dir.path().join("out.mp4");
    let worker = ExportWorker::new(Arc::new(Synthetic), Arc::new(Recording::default()));
    let snap   = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job    = worker.start(snap.clone(), out.clone(), EncodeParams::default()).unwrap();
    let events = wait_for_end(&worker, job);

    assert_eq!(events.last(), Some(&ExportEvent::Done { job_id: job, path: out.clone() }));
    let percents: Vec<u8> = events.iter()
        .filter_map(|e| match e { ExportEvent::Progress { percent, .. } => Some(*percent), _ => None })
        .collect();
    assert_eq!(percents, vec![0, 50, 75, 100]);
    assert!(out.exists());

    // The slot is cleared before the terminal event goes out.
    assert!(!worker.is_busy());
    let again = worker.start(snap, dir.path().join("again.mp4"), EncodeParams::default()).unwrap();
    assert_ne!(again, job);
    assert!(matches!(wait_for_end(&worker, again).last(), Some(ExportEvent::Done { .. })));
}

#[test]
fn second_start_while_running_is_busy() {
    let dir     = tempfile::tempdir().unwrap();
    let gate    = Gated::default();
    let release = Arc::clone(&gate.release);
    let worker  = ExportWorker::new(Arc::new(Synthetic), Arc::new(gate));
    let snap    = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job = worker.start(snap.clone(), dir.path().join("a.mp4"), EncodeParams::default()).unwrap();
    assert_eq!(worker.active_job(), Some(job));

    match worker.start(snap, dir.path().join("b.mp4"), EncodeParams::default()) {
        Err(EditError::ExportBusy(running)) => assert_eq!(running, job),
        other => panic!("expected ExportBusy, got {other:?}"),
    }

    release.store(true, Ordering::Relaxed);
    assert!(matches!(wait_for_end(&worker, job).last(), Some(ExportEvent::Done { .. })));
    assert_eq!(entries(dir.path()), vec![dir.path().join("a.mp4")]);
}

#[test]
fn cancel_reports_cancelled_failure_without_output() {
    let dir    = tempfile::tempdir().unwrap();
    let out    = dir.path().join("out.mp4");
    let worker = ExportWorker::new(Arc::new(Synthetic), Arc::new(Gated::default()));
    let snap   = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job = worker.start(snap, out.clone(), EncodeParams::default()).unwrap();
    // Unknown ids are ignored.
    worker.cancel(uuid::Uuid::new_v4());
    worker.cancel(job);

    match wait_for_end(&worker, job).pop() {
        Some(ExportEvent::Failed { cancelled, .. }) => assert!(cancelled),
        other => panic!("expected a cancelled failure, got {other:?}"),
    }
    assert!(!out.exists());
    assert!(entries(dir.path()).is_empty());
    assert!(!worker.is_busy());
}

#[test]
fn failed_export_is_not_marked_cancelled() {
    let dir    = tempfile::tempdir().unwrap();
    let worker = ExportWorker::new(Arc::new(Synthetic), Arc::new(Recording::default()));
    let snap   = timeline(vec![clip("broken.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job = worker.start(snap, dir.path().join("out.mp4"), EncodeParams::default()).unwrap();
    match wait_for_end(&worker, job).pop() {
        Some(ExportEvent::Failed { cancelled, msg, .. }) => {
            assert!(!cancelled);
            assert!(msg.contains("broken.mp4"));
        }
        other => panic!("expected a failure, got {other:?}"),
    }
}

#[test]
fn shutdown_cancels_and_joins_the_running_job() {
    let dir    = tempfile::tempdir().unwrap();
    let worker = ExportWorker::new(Arc::new(Synthetic), Arc::new(Gated::default()));
    let snap   = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job = worker.start(snap, dir.path().join("out.mp4"), EncodeParams::default()).unwrap();
    worker.shutdown();

    assert!(!worker.is_busy());
    let last = worker.rx.try_iter().last();
    assert!(matches!(last, Some(ExportEvent::Failed { job_id, cancelled: true, .. }) if job_id == job));
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn panicking_encoder_fails_the_job_and_frees_the_slot() {
    let dir    = tempfile::tempdir().unwrap();
    let worker = ExportWorker::new(Arc::new(Synthetic), Arc::new(Panicking));
    let snap   = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]).export_snapshot();

    let job = worker.start(snap.clone(), dir.path().join("out.mp4"), EncodeParams::default()).unwrap();
    match wait_for_end(&worker, job).pop() {
        Some(ExportEvent::Failed { cancelled, msg, .. }) => {
            assert!(!cancelled);
            assert!(msg.contains("codec bug"), "{msg}");
        }
        other => panic!("expected a failure, got {other:?}"),
    }
    assert!(!worker.is_busy());
    // The temp file is removed while the panic unwinds.
    assert!(entries(dir.path()).is_empty());

    // The worker accepts the next job.
    let again = worker.start(snap, dir.path().join("again.mp4"), EncodeParams::default()).unwrap();
    assert!(matches!(wait_for_end(&worker, again).last(), Some(ExportEvent::Failed { .. })));
    worker.shutdown();
}
