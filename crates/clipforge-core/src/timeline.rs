// crates/clipforge-core/src/timeline.rs
//
// Ordered clip collection plus the derived queries the UI and the exporter
// need. Clips are stored in insertion order; render order is by start_time
// and is only materialized in `export_snapshot`.
//
// Edits route through Clip so every invariant check lives in one place. The
// timeline adds the cross-clip rule (OverlapPolicy) on top.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipId, EffectPatch};
use crate::error::{EditError, Result};

/// How clips sharing a timeline instant are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Overlap is allowed; `clip_at` returns the first match in insertion order.
    #[default]
    Allow,
    /// Overlap is allowed; `clip_at` returns the match that starts latest.
    LatestStartWins,
    /// Placement that would overlap another clip is refused.
    Reject,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Timeline {
    clips:   Vec<Clip>,
    overlap: OverlapPolicy,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(overlap: OverlapPolicy) -> Self {
        Self { clips: Vec::new(), overlap }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.overlap
    }

    // ── Collection ────────────────────────────────────────────────────────────

    pub fn add(&mut self, clip: Clip) -> Result<ClipId> {
        if !(clip.start_time() >= 0.0) {
            return Err(EditError::InvalidRange(format!(
                "clip '{}' starts at {} (must be ≥ 0)", clip.name(), clip.start_time()
            )));
        }
        self.check_overlap(&clip, None)?;
        let id = clip.id();
        self.clips.push(clip);
        Ok(id)
    }

    /// Remove a clip by id. Absent ids are a no-op.
    pub fn remove(&mut self, id: ClipId) -> Option<Clip> {
        let idx = self.index_of(id)?;
        Some(self.clips.remove(idx))
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    /// Clips in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Clip> {
        self.clips.iter()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clear(&mut self) {
        self.clips.clear();
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Latest end time across all clips; 0 when empty.
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(Clip::end_time).fold(0.0, f64::max)
    }

    /// The clip whose `[start_time, end_time)` contains `time`, resolved per
    /// the overlap policy.
    pub fn clip_at(&self, time: f64) -> Option<&Clip> {
        let mut hits = self.clips.iter().filter(|c| c.contains(time));
        match self.overlap {
            OverlapPolicy::Allow | OverlapPolicy::Reject => hits.next(),
            // Ties go to the later insertion.
            OverlapPolicy::LatestStartWins => hits.fold(None, |best: Option<&Clip>, c| match best {
                Some(b) if b.start_time() > c.start_time() => Some(b),
                _ => Some(c),
            }),
        }
    }

    // ── Edits ─────────────────────────────────────────────────────────────────

    /// Split clip `id` at `offset` seconds into it. The tail is inserted right
    /// after the head. `Ok(None)` when the offset is outside `(0, duration)`.
    pub fn split(&mut self, id: ClipId, offset: f64) -> Result<Option<ClipId>> {
        let idx = self.index_of(id).ok_or(EditError::UnknownClip(id))?;
        Ok(self.clips[idx].split(offset).map(|tail| {
            let tail_id = tail.id();
            self.clips.insert(idx + 1, tail);
            tail_id
        }))
    }

    /// Cut the clip under the playhead at timeline time `time`.
    pub fn split_at(&mut self, time: f64) -> Result<Option<ClipId>> {
        let Some((id, offset)) = self.clip_at(time).map(|c| (c.id(), time - c.start_time())) else {
            return Ok(None);
        };
        self.split(id, offset)
    }

    pub fn trim(&mut self, id: ClipId, new_start: f64, new_end: f64) -> Result<()> {
        let idx = self.index_of(id).ok_or(EditError::UnknownClip(id))?;
        if self.overlap == OverlapPolicy::Reject {
            // Trimming can lengthen a clip, so check the result before committing.
            let mut probe = self.clips[idx].clone();
            probe.trim(new_start, new_end)?;
            self.check_overlap(&probe, Some(id))?;
            self.clips[idx] = probe;
            return Ok(());
        }
        self.clips[idx].trim(new_start, new_end)
    }

    pub fn reposition(&mut self, id: ClipId, new_start_time: f64) -> Result<()> {
        let idx = self.index_of(id).ok_or(EditError::UnknownClip(id))?;
        let mut moved = self.clips[idx].clone();
        moved.reposition(new_start_time)?;
        self.check_overlap(&moved, Some(id))?;
        self.clips[idx] = moved;
        Ok(())
    }

    pub fn update_effects(&mut self, id: ClipId, patch: &EffectPatch) -> Result<()> {
        let idx = self.index_of(id).ok_or(EditError::UnknownClip(id))?;
        self.clips[idx].update_effects(patch)
    }

    /// Immutable copy of the clips, ordered by start_time (stable for ties).
    pub fn export_snapshot(&self) -> TimelineSnapshot {
        let mut clips = self.clips.clone();
        clips.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        TimelineSnapshot(clips.into())
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn index_of(&self, id: ClipId) -> Option<usize> {
        self.clips.iter().position(|c| c.id() == id)
    }

    fn check_overlap(&self, clip: &Clip, ignore: Option<ClipId>) -> Result<()> {
        if self.overlap != OverlapPolicy::Reject {
            return Ok(());
        }
        match self.clips.iter()
            .filter(|c| Some(c.id()) != ignore)
            .find(|c| c.overlaps(clip))
        {
            Some(other) => Err(EditError::Overlap { clip: clip.id(), other: other.id() }),
            None => Ok(()),
        }
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a Clip;
    type IntoIter = std::slice::Iter<'a, Clip>;

    fn into_iter(self) -> Self::IntoIter {
        self.clips.iter()
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Start-ordered, immutable view of the timeline handed to export. Cheap to
/// clone and safe to move to a worker thread; later edits never reach it.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineSnapshot(Arc<[Clip]>);

impl TimelineSnapshot {
    pub fn clips(&self) -> &[Clip] {
        &self.0
    }

    pub fn total_duration(&self) -> f64 {
        self.0.iter().map(Clip::end_time).fold(0.0, f64::max)
    }
}

impl Deref for TimelineSnapshot {
    type Target = [Clip];

    fn deref(&self) -> &[Clip] {
        &self.0
    }
}

impl From<Vec<Clip>> for TimelineSnapshot {
    fn from(mut clips: Vec<Clip>) -> Self {
        clips.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        TimelineSnapshot(clips.into())
    }
}
