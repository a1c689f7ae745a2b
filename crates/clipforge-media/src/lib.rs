// crates/clipforge-media/src/lib.rs
//
// Export side of clipforge: concatenation, the export pipeline and the
// background worker. These only talk to media through the clipforge-core
// traits, so they build and test without FFmpeg.
//
// snapshot.rs writes preview frames as PNG.
//
// The `ffmpeg` feature adds the in-process backend (probe, decode, encode)
// and the `clipforge` CLI.

pub mod concat;
pub mod export;
pub mod snapshot;
pub mod worker;

#[cfg(feature = "ffmpeg")]
pub mod backend;
#[cfg(feature = "ffmpeg")]
pub mod decode;
#[cfg(feature = "ffmpeg")]
pub mod encode;
#[cfg(feature = "ffmpeg")]
pub mod probe;
#[cfg(feature = "ffmpeg")]
mod helpers;

pub use export::{export_timeline, ExportPipeline, ExportState, ProgressReporter};
pub use worker::{ExportEvent, ExportWorker};

#[cfg(feature = "ffmpeg")]
pub use backend::{FfmpegEncoder, FfmpegMedia};
