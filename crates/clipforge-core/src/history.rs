// crates/clipforge-core/src/history.rs
//
// Snapshot-based undo/redo. The caller pushes the timeline state *before* a
// user-visible edit (never during continuous drag updates); undo/redo swap the
// live timeline with the stored snapshot.
//
// Timeline is plain data, so a snapshot is just a clone.

use std::collections::VecDeque;

use crate::timeline::Timeline;

/// Default number of undo levels kept.
pub const DEFAULT_HISTORY_DEPTH: usize = 100;

#[derive(Clone, Debug)]
struct Entry {
    label:    String,
    timeline: Timeline,
}

#[derive(Clone, Debug)]
pub struct History {
    undo:  VecDeque<Entry>,
    redo:  Vec<Entry>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `depth` undo levels (minimum 1).
    pub fn with_depth(depth: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), depth: depth.max(1) }
    }

    /// Record `timeline` as the state before the edit named `label`.
    /// Any redo branch is discarded.
    pub fn push(&mut self, label: impl Into<String>, timeline: &Timeline) {
        if self.undo.len() == self.depth {
            self.undo.pop_front();
        }
        self.undo.push_back(Entry { label: label.into(), timeline: timeline.clone() });
        self.redo.clear();
    }

    /// Restore the most recent snapshot. Returns the label of the undone edit.
    pub fn undo(&mut self, timeline: &mut Timeline) -> Option<String> {
        let mut entry = self.undo.pop_back()?;
        std::mem::swap(&mut entry.timeline, timeline);
        let label = entry.label.clone();
        self.redo.push(entry);
        Some(label)
    }

    /// Re-apply the most recently undone edit. Returns its label.
    pub fn redo(&mut self, timeline: &mut Timeline) -> Option<String> {
        let mut entry = self.redo.pop()?;
        std::mem::swap(&mut entry.timeline, timeline);
        let label = entry.label.clone();
        self.undo.push_back(entry);
        Some(label)
    }

    pub fn can_undo(&self) -> bool { !self.undo.is_empty() }
    pub fn can_redo(&self) -> bool { !self.redo.is_empty() }

    pub fn undo_len(&self) -> usize { self.undo.len() }
    pub fn redo_len(&self) -> usize { self.redo.len() }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Clip;
    use std::path::Path;

    fn clip(start: f64) -> Clip {
        Clip::with_duration(Path::new("a.mp4"), 4.0, start).unwrap()
    }

    #[test]
    fn undo_then_redo_restores_both_states() {
        let mut tl = Timeline::new();
        let mut h  = History::new();

        h.push("add clip", &tl);
        let id = tl.add(clip(0.0)).unwrap();
        h.push("split", &tl);
        tl.split(id, 1.0).unwrap();
        assert_eq!(tl.len(), 2);

        assert_eq!(h.undo(&mut tl).as_deref(), Some("split"));
        assert_eq!(tl.len(), 1);
        assert_eq!(h.undo(&mut tl).as_deref(), Some("add clip"));
        assert!(tl.is_empty());
        assert!(!h.can_undo());

        assert_eq!(h.redo(&mut tl).as_deref(), Some("add clip"));
        assert_eq!(tl.len(), 1);
        assert_eq!(h.redo(&mut tl).as_deref(), Some("split"));
        assert_eq!(tl.len(), 2);
        assert!(!h.can_redo());
    }

    #[test]
    fn new_edit_discards_redo_branch() {
        let mut tl = Timeline::new();
        let mut h  = History::new();
        h.push("add", &tl);
        tl.add(clip(0.0)).unwrap();
        h.undo(&mut tl);
        assert!(h.can_redo());

        h.push("add other", &tl);
        tl.add(clip(9.0)).unwrap();
        assert!(!h.can_redo());
        assert!(h.redo(&mut tl).is_none());
    }

    #[test]
    fn depth_is_bounded() {
        let tl = Timeline::new();
        let mut h = History::with_depth(3);
        for i in 0..10 {
            h.push(format!("edit {i}"), &tl);
        }
        assert_eq!(h.undo_len(), 3);
        let mut live = Timeline::new();
        assert_eq!(h.undo(&mut live).as_deref(), Some("edit 9"));
        h.clear();
        assert!(!h.can_undo() && !h.can_redo());
    }
}
