// crates/clipforge-core/src/clip.rs
//
// One trimmed, effect-parameterized reference to a source file, positioned on
// the timeline.
//
// Time model (all seconds, f64):
//
//   source file:  0 ─────── trim_start ════════ trim_end ─────── source_duration
//   timeline:                start_time ════════ end_time
//
//   duration() = trim_end - trim_start        (derived, never stored)
//   end_time() = start_time + duration()
//
// Every mutating operation validates first and assigns last, so a rejected
// call leaves the clip exactly as it was.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clip_stream::ClipStream;
use crate::effects::EffectPipeline;
use crate::error::{EditError, Result};
use crate::media_types::{MediaSource, MediaStream};

pub type ClipId = Uuid;

// ── Effect parameters ─────────────────────────────────────────────────────────

/// Per-clip adjustment set. Owned by exactly one clip; copied by value on split.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipEffects {
    /// Additive, recommended range [-100, 100]. 0 = neutral.
    pub brightness: f64,
    /// Multiplicative, ≥ 0. 1 = neutral.
    pub contrast:   f64,
    /// Multiplicative, ≥ 0. 1 = neutral.
    pub saturation: f64,
    /// Audio gain, ≥ 0. 1 = neutral.
    pub volume:     f64,
    /// Playback-rate multiplier, > 0. 1 = neutral.
    pub speed:      f64,
    /// Seconds, ≥ 0.
    pub fade_in:    f64,
    /// Seconds, ≥ 0.
    pub fade_out:   f64,
}

impl Default for ClipEffects {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast:   1.0,
            saturation: 1.0,
            volume:     1.0,
            speed:      1.0,
            fade_in:    0.0,
            fade_out:   0.0,
        }
    }
}

impl ClipEffects {
    pub fn has_color_adjustment(&self) -> bool {
        self.brightness != 0.0 || self.contrast != 1.0 || self.saturation != 1.0
    }

    /// Shrink the fade windows so `fade_in + fade_out ≤ duration`.
    /// Fade-in keeps priority; fade-out gets what is left.
    fn clamp_fades(&mut self, duration: f64) {
        self.fade_in  = self.fade_in.min(duration).max(0.0);
        self.fade_out = self.fade_out.min(duration - self.fade_in).max(0.0);
    }
}

/// Sparse effect update: only `Some` fields are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectPatch {
    #[serde(default)]
    pub brightness: Option<f64>,
    #[serde(default)]
    pub contrast:   Option<f64>,
    #[serde(default)]
    pub saturation: Option<f64>,
    #[serde(default)]
    pub volume:     Option<f64>,
    #[serde(default)]
    pub speed:      Option<f64>,
    #[serde(default)]
    pub fade_in:    Option<f64>,
    #[serde(default)]
    pub fade_out:   Option<f64>,
}

// ── Clip ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    id:              ClipId,
    source:          PathBuf,
    name:            String,
    source_duration: f64,
    start_time:      f64,
    trim_start:      f64,
    trim_end:        f64,
    effects:         ClipEffects,
}

impl Clip {
    /// Open `source` through the media collaborator to learn its duration and
    /// place the full-length clip at `start_time`.
    pub fn create(source: &Path, start_time: f64, media: &dyn MediaSource) -> Result<Self> {
        let info = media.probe(source)?;
        if !(info.duration.is_finite() && info.duration > 0.0) {
            return Err(EditError::media_load(source, "zero or unknown duration"));
        }
        log::info!("[clip] imported {} ({:.3}s)", source.display(), info.duration);
        Self::with_duration(source, info.duration, start_time)
    }

    /// Build a full-length clip for a source whose duration is already known.
    pub fn with_duration(source: &Path, source_duration: f64, start_time: f64) -> Result<Self> {
        if !(source_duration.is_finite() && source_duration > 0.0) {
            return Err(EditError::media_load(source, "zero or unknown duration"));
        }
        check_start(start_time)?;

        let name = source.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self {
            id: Uuid::new_v4(),
            source: source.to_path_buf(),
            name,
            source_duration,
            start_time,
            trim_start: 0.0,
            trim_end:   source_duration,
            effects:    ClipEffects::default(),
        })
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn id(&self)              -> ClipId       { self.id }
    pub fn source(&self)          -> &Path        { &self.source }
    pub fn name(&self)            -> &str         { &self.name }
    pub fn source_duration(&self) -> f64          { self.source_duration }
    pub fn start_time(&self)      -> f64          { self.start_time }
    pub fn trim_start(&self)      -> f64          { self.trim_start }
    pub fn trim_end(&self)        -> f64          { self.trim_end }
    pub fn effects(&self)         -> &ClipEffects { &self.effects }

    pub fn duration(&self) -> f64 {
        self.trim_end - self.trim_start
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    /// Half-open `[start_time, end_time)` containment.
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    /// True if the two clips share any timeline instant.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.start_time < other.end_time() && other.start_time < self.end_time()
    }

    // ── Materialize ───────────────────────────────────────────────────────────

    /// Open this clip for export: the source restricted to the trim range,
    /// read one frame at a time through speed → color → volume → fades.
    ///
    /// Returns `Ok(None)` when the source yields nothing for the range. Never
    /// mutates the clip, so it is safe to call repeatedly.
    pub fn open(&self, media: &dyn MediaSource) -> Result<Option<ClipStream>> {
        let range    = media.open_range(&self.source, self.trim_start, self.trim_end)?;
        let pipeline = self.pipeline();
        let duration = self.duration() / pipeline.speed();
        let stream   = ClipStream::new(range, pipeline, duration)?;
        if stream.is_none() {
            log::warn!("[clip] {} produced an empty stream for [{:.3}, {:.3})",
                self.name, self.trim_start, self.trim_end);
        }
        Ok(stream)
    }

    /// `open`, read into memory. For short ranges and tests.
    pub fn materialize(&self, media: &dyn MediaSource) -> Result<Option<MediaStream>> {
        self.open(media)?.map(ClipStream::collect).transpose()
    }

    /// The default effect composition for this clip's current parameters.
    pub fn pipeline(&self) -> EffectPipeline {
        EffectPipeline::for_clip(&self.effects)
    }

    // ── Structural edits ──────────────────────────────────────────────────────

    /// Split at `offset` seconds from the clip's start.
    ///
    /// Returns `None` (and changes nothing) unless `0 < offset < duration`.
    /// On success `self` keeps `[trim_start, trim_start + offset]` and the
    /// returned clip covers the rest, placed at `start_time + offset` with a
    /// copy of the effects and a fresh id.
    pub fn split(&mut self, offset: f64) -> Option<Clip> {
        if !(offset > 0.0 && offset < self.duration()) {
            return None;
        }

        let cut = self.trim_start + offset;

        // Both halves get every parameter by value; only the fade windows
        // shrink to fit each half.
        let mut head_fx = self.effects;
        head_fx.clamp_fades(cut - self.trim_start);

        let mut tail_fx = self.effects;
        tail_fx.clamp_fades(self.trim_end - cut);

        let tail = Clip {
            id:              Uuid::new_v4(),
            source:          self.source.clone(),
            name:            self.name.clone(),
            source_duration: self.source_duration,
            start_time:      self.start_time + offset,
            trim_start:      cut,
            trim_end:        self.trim_end,
            effects:         tail_fx,
        };

        self.trim_end = cut;
        self.effects  = head_fx;
        Some(tail)
    }

    /// Set the source in/out points, clamped to the source bounds.
    ///
    /// `trim_start = max(0, new_start)`, `trim_end = min(source_duration, new_end)`.
    /// Non-finite bounds and a resulting duration ≤ 0 are rejected and the
    /// clip is left untouched.
    pub fn trim(&mut self, new_start: f64, new_end: f64) -> Result<()> {
        if !(new_start.is_finite() && new_end.is_finite()) {
            return Err(EditError::InvalidRange(format!(
                "trim [{new_start}, {new_end}] is not a finite range"
            )));
        }
        let start = new_start.max(0.0);
        let end   = new_end.min(self.source_duration);
        if !(end - start > 0.0) {
            return Err(EditError::InvalidRange(format!(
                "trim [{new_start}, {new_end}] leaves no media in '{}'", self.name
            )));
        }
        self.trim_start = start;
        self.trim_end   = end;
        self.effects.clamp_fades(end - start);
        Ok(())
    }

    /// Move the clip on the timeline. Overlap with other clips is the
    /// timeline's concern, not the clip's.
    pub fn reposition(&mut self, new_start_time: f64) -> Result<()> {
        check_start(new_start_time)?;
        self.start_time = new_start_time;
        Ok(())
    }

    /// Merge the `Some` fields of `patch` into the effect set.
    ///
    /// The whole patch is validated before anything is written. Fades are
    /// clamped afterwards so the two windows never overlap.
    pub fn update_effects(&mut self, patch: &EffectPatch) -> Result<()> {
        let mut fx = self.effects;
        if let Some(v) = patch.brightness { fx.brightness = v; }
        if let Some(v) = patch.contrast   { fx.contrast   = v; }
        if let Some(v) = patch.saturation { fx.saturation = v; }
        if let Some(v) = patch.volume     { fx.volume     = v; }
        if let Some(v) = patch.speed      { fx.speed      = v; }
        if let Some(v) = patch.fade_in    { fx.fade_in    = v; }
        if let Some(v) = patch.fade_out   { fx.fade_out   = v; }

        validate_effects(&fx)?;
        fx.clamp_fades(self.duration());
        self.effects = fx;
        Ok(())
    }

    // ── Serialization ─────────────────────────────────────────────────────────

    pub fn to_record(&self) -> ClipRecord {
        ClipRecord {
            id:                Some(self.id),
            filepath:          self.source.clone(),
            start_time:        self.start_time,
            trim_start:        Some(self.trim_start),
            trim_end:          Some(self.trim_end),
            source_duration:   Some(self.source_duration),
            brightness:        self.effects.brightness,
            contrast:          self.effects.contrast,
            saturation:        self.effects.saturation,
            volume:            self.effects.volume,
            speed:             self.effects.speed,
            fade_in_duration:  self.effects.fade_in,
            fade_out_duration: self.effects.fade_out,
        }
    }
}

fn check_start(t: f64) -> Result<()> {
    if !(t.is_finite() && t >= 0.0) {
        return Err(EditError::InvalidRange(format!("start time {t} must be a finite value ≥ 0")));
    }
    Ok(())
}

fn validate_effects(fx: &ClipEffects) -> Result<()> {
    let checks = [
        ("brightness", fx.brightness, fx.brightness.is_finite()),
        ("contrast",   fx.contrast,   fx.contrast   >= 0.0 && fx.contrast.is_finite()),
        ("saturation", fx.saturation, fx.saturation >= 0.0 && fx.saturation.is_finite()),
        ("volume",     fx.volume,     fx.volume     >= 0.0 && fx.volume.is_finite()),
        ("speed",      fx.speed,      fx.speed      >  0.0 && fx.speed.is_finite()),
        ("fade_in",    fx.fade_in,    fx.fade_in    >= 0.0 && fx.fade_in.is_finite()),
        ("fade_out",   fx.fade_out,   fx.fade_out   >= 0.0 && fx.fade_out.is_finite()),
    ];
    match checks.iter().find(|(_, _, ok)| !ok) {
        Some((name, value, _)) => Err(EditError::InvalidRange(format!("{name} = {value} is out of range"))),
        None => Ok(()),
    }
}

// ── On-disk record ────────────────────────────────────────────────────────────

/// Serialized form of a clip inside a project file.
///
/// Every field except `filepath` and `start_time` is optional on load and
/// falls back to its neutral default. `source_duration` lets a project reopen
/// without probing; when it is missing the source is probed once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:                Option<Uuid>,
    pub filepath:          PathBuf,
    pub start_time:        f64,
    #[serde(default)]
    pub trim_start:        Option<f64>,
    #[serde(default)]
    pub trim_end:          Option<f64>,
    #[serde(default)]
    pub source_duration:   Option<f64>,
    #[serde(default)]
    pub brightness:        f64,
    #[serde(default = "one")]
    pub contrast:          f64,
    #[serde(default = "one")]
    pub saturation:        f64,
    #[serde(default = "one")]
    pub volume:            f64,
    #[serde(default = "one")]
    pub speed:             f64,
    #[serde(default)]
    pub fade_in_duration:  f64,
    #[serde(default)]
    pub fade_out_duration: f64,
}

fn one() -> f64 { 1.0 }

impl ClipRecord {
    /// Rebuild the clip. Probes `media` only if the record lacks a source duration.
    pub fn into_clip(self, media: &dyn MediaSource) -> Result<Clip> {
        let source_duration = match self.source_duration {
            Some(d) => d,
            None    => media.probe(&self.filepath)?.duration,
        };
        self.into_clip_with_duration(source_duration)
    }

    pub fn into_clip_with_duration(self, source_duration: f64) -> Result<Clip> {
        let mut clip = Clip::with_duration(&self.filepath, source_duration, self.start_time)?;
        if let Some(id) = self.id {
            clip.id = id;
        }

        let trim_start = self.trim_start.unwrap_or(0.0);
        let trim_end   = self.trim_end.unwrap_or(source_duration);
        if !(trim_start >= 0.0 && trim_end <= source_duration && trim_end > trim_start) {
            return Err(EditError::InvalidRange(format!(
                "stored trim [{trim_start}, {trim_end}] does not fit source '{}' ({source_duration}s)",
                self.filepath.display()
            )));
        }
        clip.trim_start = trim_start;
        clip.trim_end   = trim_end;

        let fx = ClipEffects {
            brightness: self.brightness,
            contrast:   self.contrast,
            saturation: self.saturation,
            volume:     self.volume,
            speed:      self.speed,
            fade_in:    self.fade_in_duration,
            fade_out:   self.fade_out_duration,
        };
        validate_effects(&fx)?;
        clip.effects = fx;
        clip.effects.clamp_fades(clip.duration());
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(len: f64) -> Clip {
        Clip::with_duration(Path::new("/media/a.mp4"), len, 0.0).unwrap()
    }

    #[test]
    fn new_clip_spans_whole_source() {
        let c = clip(12.5);
        assert_eq!(c.trim_start(), 0.0);
        assert_eq!(c.trim_end(), 12.5);
        assert_eq!(c.duration(), 12.5);
        assert_eq!(c.name(), "a.mp4");
    }

    #[test]
    fn zero_duration_source_is_a_load_error() {
        let err = Clip::with_duration(Path::new("x.mp4"), 0.0, 0.0).unwrap_err();
        assert!(matches!(err, EditError::MediaLoad { .. }));
    }

    #[test]
    fn split_tiles_range_and_copies_effects() {
        let mut a = clip(10.0);
        a.reposition(5.0).unwrap();
        a.update_effects(&EffectPatch { brightness: Some(20.0), speed: Some(1.5), ..Default::default() }).unwrap();

        let b = a.split(4.0).expect("valid split");
        assert_eq!(a.trim_end(), b.trim_start());
        assert_eq!(a.duration() + b.duration(), 10.0);
        assert_eq!(b.start_time(), 9.0);
        assert_eq!(a.end_time(), b.start_time());
        assert_eq!(b.effects().brightness, 20.0);
        assert_eq!(b.effects().speed, 1.5);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn split_outside_bounds_is_noop() {
        let mut a = clip(10.0);
        let before = a.clone();
        for off in [0.0, -1.0, 10.0, 11.0, f64::NAN] {
            assert!(a.split(off).is_none());
            assert_eq!(a, before);
        }
    }

    #[test]
    fn split_copies_every_effect_to_both_halves() {
        let mut a = clip(10.0);
        let patch = EffectPatch {
            brightness: Some(12.0), saturation: Some(0.5), volume: Some(0.8), speed: Some(1.5),
            fade_in: Some(1.0), fade_out: Some(1.0),
            ..Default::default()
        };
        a.update_effects(&patch).unwrap();
        let before = *a.effects();
        let b = a.split(5.0).unwrap();
        assert_eq!(*a.effects(), before);
        assert_eq!(*b.effects(), before);
    }

    #[test]
    fn split_clamps_copied_fades_to_each_half() {
        let mut a = clip(10.0);
        a.update_effects(&EffectPatch { fade_in: Some(3.0), fade_out: Some(3.0), ..Default::default() }).unwrap();
        let b = a.split(2.0).unwrap();
        // Head is 2 s long: the fade-in fills it and leaves no room for a fade-out.
        assert_eq!((a.effects().fade_in, a.effects().fade_out), (2.0, 0.0));
        assert_eq!((b.effects().fade_in, b.effects().fade_out), (3.0, 3.0));
    }

    #[test]
    fn trim_clamps_to_source() {
        let mut a = clip(10.0);
        a.trim(-2.0, 50.0).unwrap();
        assert_eq!((a.trim_start(), a.trim_end()), (0.0, 10.0));
        a.trim(2.0, 6.0).unwrap();
        assert_eq!(a.duration(), 4.0);
    }

    #[test]
    fn non_finite_trim_is_rejected_without_change() {
        let mut a = clip(10.0);
        a.trim(1.0, 9.0).unwrap();
        let before = a.clone();
        for (s, e) in [(f64::NAN, f64::NAN), (f64::NAN, 5.0), (2.0, f64::INFINITY), (f64::NEG_INFINITY, 5.0)] {
            assert!(matches!(a.trim(s, e), Err(EditError::InvalidRange(_))), "trim({s}, {e})");
        }
        assert_eq!(a, before);
    }

    #[test]
    fn degenerate_trim_is_rejected_without_change() {
        let mut a = clip(10.0);
        a.trim(1.0, 9.0).unwrap();
        let before = a.clone();
        assert!(matches!(a.trim(5.0, 5.0), Err(EditError::InvalidRange(_))));
        assert!(matches!(a.trim(7.0, 3.0), Err(EditError::InvalidRange(_))));
        assert!(matches!(a.trim(12.0, 20.0), Err(EditError::InvalidRange(_))));
        assert_eq!(a, before);
    }

    #[test]
    fn negative_reposition_rejected() {
        let mut a = clip(3.0);
        assert!(a.reposition(-0.1).is_err());
        assert!(a.reposition(f64::INFINITY).is_err());
        a.reposition(7.0).unwrap();
        assert_eq!(a.end_time(), 10.0);
    }

    #[test]
    fn patch_is_sparse() {
        let mut a = clip(10.0);
        a.update_effects(&EffectPatch { contrast: Some(1.5), ..Default::default() }).unwrap();
        a.update_effects(&EffectPatch { volume: Some(0.2), ..Default::default() }).unwrap();
        assert_eq!(a.effects().contrast, 1.5);
        assert_eq!(a.effects().volume, 0.2);
        assert_eq!(a.effects().saturation, 1.0);
    }

    #[test]
    fn invalid_patch_changes_nothing() {
        let mut a = clip(10.0);
        let before = *a.effects();
        let bad = EffectPatch { brightness: Some(50.0), speed: Some(0.0), ..Default::default() };
        assert!(matches!(a.update_effects(&bad), Err(EditError::InvalidRange(_))));
        assert_eq!(*a.effects(), before);
        assert!(a.update_effects(&EffectPatch { volume: Some(-1.0), ..Default::default() }).is_err());
    }

    #[test]
    fn fades_clamped_to_duration_without_overlap() {
        let mut a = clip(4.0);
        a.update_effects(&EffectPatch { fade_in: Some(3.0), fade_out: Some(3.0), ..Default::default() }).unwrap();
        assert_eq!(a.effects().fade_in, 3.0);
        assert_eq!(a.effects().fade_out, 1.0);

        a.trim(0.0, 2.0).unwrap();
        assert_eq!(a.effects().fade_in, 2.0);
        assert_eq!(a.effects().fade_out, 0.0);
    }

    #[test]
    fn record_without_optional_fields_uses_neutral_defaults() {
        let rec: ClipRecord = serde_json::from_str(r#"{"filepath": "/m/a.mp4", "start_time": 2.0}"#).unwrap();
        let c = rec.into_clip_with_duration(8.0).unwrap();
        assert_eq!(c.trim_end(), 8.0);
        assert_eq!(*c.effects(), ClipEffects::default());
        assert_eq!(c.start_time(), 2.0);
    }

    #[test]
    fn record_with_impossible_trim_is_rejected() {
        let rec: ClipRecord = serde_json::from_str(
            r#"{"filepath": "/m/a.mp4", "start_time": 0.0, "trim_start": 3.0, "trim_end": 2.0}"#
        ).unwrap();
        assert!(rec.into_clip_with_duration(8.0).is_err());
    }
}
