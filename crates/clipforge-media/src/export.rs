// crates/clipforge-media/src/export.rs
//
// Timeline → file export pipeline.
//
// State machine (each transition is logged):
//
//   Idle ─► Resolving ─► Concatenating ─► Encoding ─► Done
//              │              │               │
//              └──────────────┴───────────────┴──► Failed
//
// Progress contract:
//   0 .. 50   Resolving, linear per clip
//   50        Concatenating
//   75        Encoding
//   100       output persisted at its final path
//
// Memory:
//   Resolving opens every clip (one decoder each, one frame read ahead) and
//   decodes its audio. Concatenating lays out the frame grid and mixes audio.
//   Encoding pulls composited frames one at a time, so video is never held
//   whole.
//
// Output safety:
//   The encoder writes to a temp file beside the output path. It is renamed
//   over the output only after a successful encode, so a failed or cancelled
//   export never leaves a partial file behind. An empty snapshot is rejected
//   before anything touches the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clipforge_core::error::{EditError, Result};
use clipforge_core::media_types::{CancelFlag, MediaSource, StreamEncoder};
use clipforge_core::quality::EncodeParams;
use clipforge_core::timeline::TimelineSnapshot;

use crate::concat::{Concat, Segment};

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Resolving,
    Concatenating,
    Encoding,
    Done,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportState::Idle          => "idle",
            ExportState::Resolving     => "resolving",
            ExportState::Concatenating => "concatenating",
            ExportState::Encoding      => "encoding",
            ExportState::Done          => "done",
            ExportState::Failed        => "failed",
        };
        f.write_str(s)
    }
}

// ── Progress ──────────────────────────────────────────────────────────────────

/// Upper bound on progress while clips are still being resolved.
pub const RESOLVE_SHARE: u8 = 50;
pub const CONCAT_PERCENT: u8 = 50;
pub const ENCODE_PERCENT: u8 = 75;

/// Filters raw percentages into a sink so listeners only ever see
/// non-decreasing, non-repeating values in [0, 100].
pub struct ProgressReporter<F: FnMut(u8)> {
    sink:    F,
    last:    Option<u8>,
    ceiling: u8,
}

impl<F: FnMut(u8)> ProgressReporter<F> {
    pub fn new(sink: F) -> Self {
        Self { sink, last: None, ceiling: RESOLVE_SHARE }
    }

    /// Lift the cap once resolution is over.
    pub fn unlock(&mut self) {
        self.ceiling = 100;
    }

    pub fn report(&mut self, percent: u8) {
        let p = percent.min(self.ceiling);
        if self.last.is_some_and(|last| p <= last) {
            return;
        }
        self.last = Some(p);
        (self.sink)(p);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct ExportPipeline<'a> {
    media:   &'a dyn MediaSource,
    encoder: &'a dyn StreamEncoder,
    cancel:  CancelFlag,
    state:   ExportState,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(media: &'a dyn MediaSource, encoder: &'a dyn StreamEncoder) -> Self {
        Self {
            media,
            encoder,
            cancel: Arc::new(AtomicBool::new(false)),
            state:  ExportState::Idle,
        }
    }

    /// Share an externally owned cancel flag (used by the export worker).
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Render `snapshot` to `output`. Returns the final output path.
    ///
    /// `progress` receives non-decreasing percentages; 100 is sent only once
    /// the file exists at `output`.
    pub fn export<F: FnMut(u8)>(
        &mut self,
        snapshot: &TimelineSnapshot,
        output:   &Path,
        params:   &EncodeParams,
        progress: F,
    ) -> Result<PathBuf> {
        let mut reporter = ProgressReporter::new(progress);
        let result = self.run(snapshot, output, params, &mut reporter);
        match &result {
            Ok(path) => {
                self.transition(ExportState::Done);
                log::info!("[export] wrote {}", path.display());
            }
            Err(e) => {
                self.transition(ExportState::Failed);
                if e.is_cancelled() {
                    log::warn!("[export] cancelled, nothing written to {}", output.display());
                } else {
                    log::error!("[export] {e}");
                }
            }
        }
        result
    }

    fn run<F: FnMut(u8)>(
        &mut self,
        snapshot: &TimelineSnapshot,
        output:   &Path,
        params:   &EncodeParams,
        reporter: &mut ProgressReporter<F>,
    ) -> Result<PathBuf> {
        if snapshot.is_empty() {
            return Err(EditError::EmptyInput);
        }

        // ── Resolving ─────────────────────────────────────────────────────────
        self.transition(ExportState::Resolving);
        reporter.report(0);

        let n = snapshot.len();
        let mut segments = Vec::with_capacity(n);
        for (i, clip) in snapshot.iter().enumerate() {
            self.check_cancel()?;
            let opened = clip.open(self.media).map_err(|e| EditError::ClipResolution {
                clip:   clip.id(),
                name:   clip.name().to_string(),
                source: Box::new(e),
            })?;
            match opened {
                Some(stream) => segments.push(Segment {
                    clip:       clip.id(),
                    name:       clip.name().to_string(),
                    start_time: clip.start_time(),
                    end_time:   clip.end_time(),
                    stream,
                }),
                None => log::warn!("[export] skipping '{}' ({}): empty stream", clip.name(), clip.id()),
            }
            reporter.report(((i + 1) * RESOLVE_SHARE as usize / n) as u8);
        }
        if segments.is_empty() {
            return Err(EditError::NoValidClips);
        }

        // ── Concatenating ─────────────────────────────────────────────────────
        self.check_cancel()?;
        self.transition(ExportState::Concatenating);
        reporter.unlock();
        reporter.report(CONCAT_PERCENT);
        let mut stream = Concat::new(segments, params);
        log::info!("[export] {} frames, {:.3}s at {} fps", stream.frame_count(), stream.duration(), params.fps);

        // ── Encoding ──────────────────────────────────────────────────────────
        self.check_cancel()?;
        self.transition(ExportState::Encoding);
        reporter.report(ENCODE_PERCENT);

        let tmp = temp_output(output)?;
        self.encoder.encode(&mut stream, &tmp, params, &self.cancel)?;
        // Cancellation that lands after the last frame still discards the file.
        self.check_cancel()?;
        tmp.persist(output).map_err(|e| EditError::io(output, e.error))?;

        reporter.report(100);
        Ok(output.to_path_buf())
    }

    fn transition(&mut self, next: ExportState) {
        log::info!("[export] {} → {}", self.state, next);
        self.state = next;
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(EditError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Temp path in the output's directory, keeping its extension so the muxer
/// picks the right container. Deleted on drop unless persisted.
fn temp_output(output: &Path) -> Result<tempfile::TempPath> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let suffix = output.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix(".clipforge-export-")
        .suffix(&suffix)
        .tempfile_in(dir)
        .map_err(|e| EditError::io(dir, e))?;
    Ok(file.into_temp_path())
}

/// Convenience for callers that do not need a cancel handle or state.
pub fn export_timeline<F: FnMut(u8)>(
    media:    &dyn MediaSource,
    encoder:  &dyn StreamEncoder,
    snapshot: &TimelineSnapshot,
    output:   &Path,
    params:   &EncodeParams,
    progress: F,
) -> Result<PathBuf> {
    ExportPipeline::new(media, encoder).export(snapshot, output, params, progress)
}
