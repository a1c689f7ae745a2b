// crates/clipforge-core/src/project.rs
//
// JSON project file.
//
//   {
//     "metadata": { "name", "created", "modified", "version" },
//     "data": {
//       "clips": [ ClipRecord, ... ],
//       "timeline_data": { "zoom_level", "scroll_position" }
//     },
//     "version": "1.0"
//   }
//
// Loading is lenient: anything but `data.clips[].filepath` and
// `data.clips[].start_time` may be missing and falls back to a default.
// Saving is atomic: the JSON lands in a temp file beside the target and is
// renamed over it only once fully written.

use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::clip::ClipRecord;
use crate::error::{EditError, Result};
use crate::media_types::MediaSource;
use crate::timeline::{OverlapPolicy, Timeline};

pub const PROJECT_VERSION: &str = "1.0";

/// Base horizontal scale of the timeline view at zoom 1.0.
pub const PIXELS_PER_SECOND: f64 = 50.0;

const ZOOM_STEP: f64 = 1.5;
const ZOOM_MIN:  f64 = 0.1;
const ZOOM_MAX:  f64 = 10.0;

// ── View state ────────────────────────────────────────────────────────────────

/// Timeline viewport persisted with the project.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineView {
    #[serde(default = "default_zoom")]
    pub zoom_level:      f64,
    /// Horizontal scroll offset in pixels, ≥ 0.
    #[serde(default)]
    pub scroll_position: f64,
}

fn default_zoom() -> f64 { 1.0 }

impl Default for TimelineView {
    fn default() -> Self {
        Self { zoom_level: 1.0, scroll_position: 0.0 }
    }
}

impl TimelineView {
    /// ```
    /// use clipforge_core::project::TimelineView;
    /// let mut v = TimelineView::default();
    /// v.zoom_in();
    /// assert_eq!(v.zoom_level, 1.5);
    /// ```
    pub fn zoom_in(&mut self) {
        self.zoom_level = (self.zoom_level * ZOOM_STEP).min(ZOOM_MAX);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_level = (self.zoom_level / ZOOM_STEP).max(ZOOM_MIN);
    }

    /// Scroll by `delta` pixels, never past the timeline origin.
    pub fn scroll_by(&mut self, delta: f64) {
        self.scroll_position = (self.scroll_position + delta).max(0.0);
    }

    pub fn pixels_per_second(&self) -> f64 {
        PIXELS_PER_SECOND * self.zoom_level
    }

    /// Screen x (relative to the view's left edge) of timeline time `t`.
    pub fn time_to_x(&self, t: f64) -> f64 {
        t * self.pixels_per_second() - self.scroll_position
    }

    /// Inverse of `time_to_x`.
    pub fn x_to_time(&self, x: f64) -> f64 {
        (x + self.scroll_position) / self.pixels_per_second()
    }
}

// ── File schema ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default = "default_name")]
    pub name:     String,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub created:  String,
    /// RFC 3339 timestamp, refreshed on every save.
    #[serde(default)]
    pub modified: String,
    #[serde(default = "default_version")]
    pub version:  String,
}

fn default_name() -> String { "Untitled Project".into() }
fn default_version() -> String { PROJECT_VERSION.into() }

impl Default for ProjectMetadata {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            name:     default_name(),
            created:  now.clone(),
            modified: now,
            version:  default_version(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub clips:         Vec<ClipRecord>,
    #[serde(default)]
    pub timeline_data: TimelineView,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub metadata: ProjectMetadata,
    #[serde(default)]
    pub data:     ProjectData,
    #[serde(default = "default_version")]
    pub version:  String,
}

impl ProjectFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ProjectMetadata { name: name.into(), ..ProjectMetadata::default() },
            data:     ProjectData::default(),
            version:  default_version(),
        }
    }

    pub fn from_timeline(name: impl Into<String>, timeline: &Timeline, view: TimelineView) -> Self {
        let mut project = Self::new(name);
        project.set_timeline(timeline, view);
        project
    }

    /// Replace the stored clips and view, keeping the metadata.
    pub fn set_timeline(&mut self, timeline: &Timeline, view: TimelineView) {
        self.data.clips = timeline.iter().map(|c| c.to_record()).collect();
        self.data.timeline_data = view;
    }

    /// Rebuild the timeline. Records without a stored source duration are
    /// probed through `media`.
    pub fn into_timeline(&self, media: &dyn MediaSource, policy: OverlapPolicy) -> Result<Timeline> {
        let mut timeline = Timeline::with_policy(policy);
        for record in &self.data.clips {
            timeline.add(record.clone().into_clip(media)?)?;
        }
        Ok(timeline)
    }

    pub fn view(&self) -> TimelineView {
        self.data.timeline_data
    }

    // ── I/O ───────────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EditError::ProjectFormat(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EditError::ProjectFormat(e.to_string()))
    }

    /// Bump `modified` and write the project to `path` atomically.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.metadata.modified = Utc::now().to_rfc3339();
        let json = self.to_json()?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| EditError::io(dir, e))?;
        tmp.write_all(json.as_bytes()).map_err(|e| EditError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| EditError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| EditError::io(path, e.error))?;

        log::info!("[project] saved '{}' ({} clips) to {}",
            self.metadata.name, self.data.clips.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| EditError::io(path, e))?;
        let project = Self::from_json(&json)?;
        log::info!("[project] loaded '{}' ({} clips) from {}",
            project.metadata.name, project.data.clips.len(), path.display());
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, EffectPatch};

    #[test]
    fn zoom_is_bounded() {
        let mut v = TimelineView::default();
        for _ in 0..20 { v.zoom_in(); }
        assert_eq!(v.zoom_level, 10.0);
        for _ in 0..40 { v.zoom_out(); }
        assert_eq!(v.zoom_level, 0.1);
    }

    #[test]
    fn scroll_never_negative() {
        let mut v = TimelineView::default();
        v.scroll_by(30.0);
        v.scroll_by(-100.0);
        assert_eq!(v.scroll_position, 0.0);
        v.scroll_by(25.0);
        assert_eq!(v.x_to_time(v.time_to_x(3.0)), 3.0);
    }

    #[test]
    fn minimal_file_loads_with_defaults() {
        let p = ProjectFile::from_json(r#"{"data": {"clips": [{"filepath": "a.mp4", "start_time": 1.5}]}}"#).unwrap();
        assert_eq!(p.metadata.name, "Untitled Project");
        assert_eq!(p.metadata.version, "1.0");
        assert_eq!(p.view(), TimelineView::default());
        assert_eq!(p.data.clips[0].speed, 1.0);
        assert_eq!(p.data.clips[0].trim_start, None);
    }

    #[test]
    fn malformed_json_is_a_format_error() {
        assert!(matches!(ProjectFile::from_json("{ nope"), Err(EditError::ProjectFormat(_))));
        assert!(matches!(ProjectFile::from_json(r#"{"data": {"clips": 3}}"#), Err(EditError::ProjectFormat(_))));
    }

    #[test]
    fn save_then_load_keeps_clips_bit_exact() {
        let mut tl = Timeline::new();
        let mut c = Clip::with_duration(Path::new("/m/clip one.mov"), 10.1, 0.3).unwrap();
        c.trim(0.1 + 0.2, 7.7).unwrap();
        c.update_effects(&EffectPatch { brightness: Some(-12.345), speed: Some(1.0 / 3.0), ..Default::default() }).unwrap();
        tl.add(c.clone()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        let mut view = TimelineView::default();
        view.zoom_in();
        let mut p = ProjectFile::from_timeline("demo", &tl, view);
        p.save(&path).unwrap();

        let back = ProjectFile::load(&path).unwrap();
        assert_eq!(back.view().zoom_level, 1.5);
        let restored = back.data.clips[0].clone().into_clip_with_duration(10.1).unwrap();
        assert_eq!(restored, c);
        // Only the project file remains; the temp file was renamed into place.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ProjectFile::load(&dir.path().join("none.json")), Err(EditError::Io { .. })));
    }
}
