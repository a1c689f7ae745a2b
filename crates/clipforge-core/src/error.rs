// crates/clipforge-core/src/error.rs
//
// Error taxonomy shared by every clipforge crate.
//
// Structural violations (bad trim/split/effect arguments) are rejected at the
// call that would create them. Export failures abort the whole job and carry
// enough context (clip identity or file path) for a user-facing message.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Error, Debug)]
pub enum EditError {
    /// Source media unreadable, unsupported, or of zero/unknown duration.
    #[error("could not load media '{}': {reason}", path.display())]
    MediaLoad { path: PathBuf, reason: String },

    /// Trim/split/effect arguments that would break a clip invariant.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Placement refused by `OverlapPolicy::Reject`.
    #[error("clip {clip} would overlap clip {other}")]
    Overlap { clip: Uuid, other: Uuid },

    #[error("no clip with id {0} on the timeline")]
    UnknownClip(Uuid),

    #[error("nothing to export: clip list is empty")]
    EmptyInput,

    #[error("nothing to export: every clip resolved to an empty stream")]
    NoValidClips,

    /// A specific clip failed while being materialized for export.
    #[error("clip '{name}' ({clip}) failed to resolve: {source}")]
    ClipResolution {
        clip:   Uuid,
        name:   String,
        #[source]
        source: Box<EditError>,
    },

    /// Writer or codec failure.
    #[error("encode to '{}' failed: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    /// Malformed or unparseable project file.
    #[error("malformed project file: {0}")]
    ProjectFormat(String),

    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The export was cancelled by the caller. Not a failure of the media.
    #[error("cancelled")]
    Cancelled,

    /// A second export was requested while one is still running.
    #[error("export job {0} is still running")]
    ExportBusy(Uuid),
}

impl EditError {
    pub fn media_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EditError::MediaLoad { path: path.into(), reason: reason.to_string() }
    }

    pub fn encode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        EditError::Encode { path: path.into(), reason: reason.to_string() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EditError::Io { path: path.into(), source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EditError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_resolution_names_the_clip_and_cause() {
        let id = Uuid::new_v4();
        let err = EditError::ClipResolution {
            clip:   id,
            name:   "beach.mp4".into(),
            source: Box::new(EditError::media_load("/tmp/beach.mp4", "file vanished")),
        };
        let msg = err.to_string();
        assert!(msg.contains("beach.mp4"));
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("file vanished"));
    }

    #[test]
    fn cancelled_is_distinguishable() {
        assert!(EditError::Cancelled.is_cancelled());
        assert!(!EditError::EmptyInput.is_cancelled());
    }
}
