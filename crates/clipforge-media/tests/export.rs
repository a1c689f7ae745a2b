//! ExportPipeline against in-memory media: progress, failure cleanup and
//! cancellation.

mod common;

use std::fs;
use std::sync::atomic::Ordering;

use clipforge_core::error::EditError;
use clipforge_core::quality::EncodeParams;
use clipforge_core::timeline::Timeline;
use clipforge_media::export::{ExportPipeline, ExportState};

use common::{clip, entries, timeline, Failing, Gated, Recording, Synthetic};

#[test]
fn single_clip_duration_is_within_one_frame() {
    let dir    = tempfile::tempdir().unwrap();
    let out    = dir.path().join("out.mp4");
    let params = EncodeParams::default();
    let tl     = timeline(vec![clip("a.mp4", 0.0, (2.0, 5.0))]);
    let enc    = Recording::default();

    let mut pipeline = ExportPipeline::new(&Synthetic, &enc);
    let path = pipeline.export(&tl.export_snapshot(), &out, &params, |_| {}).unwrap();

    assert_eq!(path, out);
    assert!(out.exists());
    assert_eq!(pipeline.state(), ExportState::Done);

    let (frames, duration, _) = enc.last.lock().clone().unwrap();
    assert_eq!(frames, 90);
    assert!((duration - 3.0).abs() <= params.frame_interval());
    // Only the final file is left in the directory.
    assert_eq!(entries(dir.path()), vec![out]);
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let dir = tempfile::tempdir().unwrap();
    let tl  = timeline(vec![
        clip("a.mp4", 0.0, (0.0, 3.0)),
        clip("b.mp4", 3.0, (0.0, 2.0)),
    ]);

    let mut seen = Vec::new();
    ExportPipeline::new(&Synthetic, &Recording::default())
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |p| seen.push(p))
        .unwrap();

    assert_eq!(seen, vec![0, 25, 50, 75, 100]);
}

#[test]
fn empty_snapshot_is_rejected_before_touching_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut seen = Vec::new();
    let err = ExportPipeline::new(&Synthetic, &Recording::default())
        .export(&Timeline::new().export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |p| seen.push(p))
        .unwrap_err();

    assert!(matches!(err, EditError::EmptyInput));
    assert!(seen.is_empty());
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn failing_clip_is_named_and_nothing_is_written() {
    let dir    = tempfile::tempdir().unwrap();
    let broken = clip("broken.mp4", 3.0, (0.0, 1.0));
    let id     = broken.id();
    let tl     = timeline(vec![clip("a.mp4", 0.0, (0.0, 3.0)), broken]);

    let recording = Recording::default();
    let mut pipeline = ExportPipeline::new(&Synthetic, &recording);
    let err = pipeline
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap_err();

    match err {
        EditError::ClipResolution { clip, name, source } => {
            assert_eq!(clip, id);
            assert_eq!(name, "broken.mp4");
            assert!(matches!(*source, EditError::MediaLoad { .. }));
        }
        other => panic!("expected ClipResolution, got {other:?}"),
    }
    assert_eq!(pipeline.state(), ExportState::Failed);
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn encoder_failure_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let tl  = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]);

    let err = ExportPipeline::new(&Synthetic, &Failing)
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap_err();

    assert!(matches!(err, EditError::Encode { .. }));
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn cancel_during_encode_discards_output() {
    let dir  = tempfile::tempdir().unwrap();
    let out  = dir.path().join("out.mp4");
    let tl   = timeline(vec![clip("a.mp4", 0.0, (0.0, 2.0))]);
    let gate = Gated::default();

    let mut pipeline = ExportPipeline::new(&Synthetic, &gate);
    let cancel = pipeline.cancel_flag();
    let mut seen = Vec::new();
    let err = pipeline
        .export(&tl.export_snapshot(), &out, &EncodeParams::default(), |p| {
            seen.push(p);
            if p == 75 {
                cancel.store(true, Ordering::Relaxed);
            }
        })
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(seen.last(), Some(&75));
    assert!(!out.exists());
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn cancel_before_start_stops_at_first_check() {
    let dir = tempfile::tempdir().unwrap();
    let tl  = timeline(vec![clip("a.mp4", 0.0, (0.0, 2.0))]);
    let enc = Recording::default();

    let mut pipeline = ExportPipeline::new(&Synthetic, &enc);
    pipeline.cancel_flag().store(true, Ordering::Relaxed);
    let err = pipeline
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(enc.last.lock().is_none());
}

#[test]
fn all_empty_streams_is_no_valid_clips() {
    let dir = tempfile::tempdir().unwrap();
    let tl  = timeline(vec![clip("empty.mp4", 0.0, (0.0, 2.0))]);

    let err = ExportPipeline::new(&Synthetic, &Recording::default())
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap_err();

    assert!(matches!(err, EditError::NoValidClips));
    assert!(entries(dir.path()).is_empty());
}

#[test]
fn empty_streams_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let tl  = timeline(vec![
        clip("a.mp4", 0.0, (0.0, 1.0)),
        clip("empty.mp4", 1.0, (0.0, 5.0)),
    ]);
    let enc = Recording::default();

    ExportPipeline::new(&Synthetic, &enc)
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap();

    let (frames, _, _) = enc.last.lock().clone().unwrap();
    assert_eq!(frames, 30);
}

#[test]
fn export_replaces_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.mp4");
    fs::write(&out, b"old render").unwrap();
    let tl = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]);

    ExportPipeline::new(&Synthetic, &Recording::default())
        .export(&tl.export_snapshot(), &out, &EncodeParams::default(), |_| {})
        .unwrap();

    assert_eq!(fs::read(&out).unwrap().len(), 30);
}

#[test]
fn encoder_sees_a_temp_path_with_the_output_extension() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.mkv");
    let tl  = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0))]);
    let enc = Recording::default();

    ExportPipeline::new(&Synthetic, &enc)
        .export(&tl.export_snapshot(), &out, &EncodeParams::default(), |_| {})
        .unwrap();

    let (_, _, written) = enc.last.lock().clone().unwrap();
    assert_ne!(written, out);
    assert_eq!(written.parent(), out.parent());
    assert_eq!(written.extension().and_then(|e| e.to_str()), Some("mkv"));
}

#[test]
fn decode_failure_mid_encode_names_the_clip() {
    let dir = tempfile::tempdir().unwrap();
    let bad = clip("truncated.mp4", 1.0, (0.0, 2.0));
    let id  = bad.id();
    let tl  = timeline(vec![clip("a.mp4", 0.0, (0.0, 1.0)), bad]);

    let recording = Recording::default();
    let mut pipeline = ExportPipeline::new(&Synthetic, &recording);
    let err = pipeline
        .export(&tl.export_snapshot(), &dir.path().join("out.mp4"), &EncodeParams::default(), |_| {})
        .unwrap_err();

    match err {
        EditError::ClipResolution { clip, name, source } => {
            assert_eq!(clip, id);
            assert_eq!(name, "truncated.mp4");
            assert!(matches!(*source, EditError::MediaLoad { .. }));
        }
        other => panic!("expected ClipResolution, got {other:?}"),
    }
    assert_eq!(pipeline.state(), ExportState::Failed);
    assert!(entries(dir.path()).is_empty());
}
