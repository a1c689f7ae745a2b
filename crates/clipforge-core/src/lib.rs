// crates/clipforge-core/src/lib.rs
//
// Pure project data and algorithms. No ffmpeg, no threads, no global state:
// decoding and encoding come in through the MediaSource / StreamEncoder traits
// in media_types.rs, implemented by clipforge-media.
//
// To add a new edit:
//   1. Implement it on Clip (invariants) and/or Timeline (cross-clip rules)
//   2. Add an EditCommand variant in commands.rs so it is undoable

pub mod clip;
pub mod clip_stream;
pub mod commands;
pub mod effects;
pub mod error;
pub mod helpers;
pub mod history;
pub mod media_types;
pub mod preview;
pub mod project;
pub mod quality;
pub mod timeline;

pub use clip::{Clip, ClipEffects, ClipId, ClipRecord, EffectPatch};
pub use clip_stream::ClipStream;
pub use effects::{EffectPipeline, EffectStage};
pub use error::{EditError, Result};
pub use history::History;
pub use media_types::{
    AudioBuffer, CancelFlag, EncodeInput, Frame, FrameReader, MediaInfo, MediaSource, MediaStream,
    SourceRange, StreamEncoder,
};
pub use project::{ProjectFile, TimelineView};
pub use quality::{EncodeParams, QualityProfile};
pub use timeline::{OverlapPolicy, Timeline, TimelineSnapshot};
