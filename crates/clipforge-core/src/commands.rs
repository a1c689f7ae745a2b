// crates/clipforge-core/src/commands.rs
//
// Every user edit is expressed as an EditCommand. A front end builds these
// and hands them to `apply`, which performs the edit and records undo history
// in one place. Adding a new edit = add a variant here + one match arm below.

use uuid::Uuid;

use crate::clip::{Clip, EffectPatch};
use crate::error::Result;
use crate::history::History;
use crate::timeline::Timeline;

#[derive(Debug, Clone)]
pub enum EditCommand {
    // ── Timeline ─────────────────────────────────────────────────────────────
    AddClip(Clip),
    RemoveClip(Uuid),
    MoveClip   { id: Uuid, new_start: f64 },
    TrimClip   { id: Uuid, trim_start: f64, trim_end: f64 },
    SplitClip  { id: Uuid, offset: f64 },
    /// Cut whichever clip is under the playhead.
    SplitAt(f64),
    SetEffects { id: Uuid, patch: EffectPatch },
    ClearTimeline,

    // ── Undo / Redo ───────────────────────────────────────────────────────────
    Undo,
    Redo,
}

/// What an applied command changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The timeline changed; carries the id of a clip the edit created, if any.
    Edited(Option<Uuid>),
    /// The command was valid but had nothing to do (bad split offset, absent id,
    /// empty undo stack).
    Unchanged,
    Undone(String),
    Redone(String),
}

impl EditCommand {
    /// Label stored in the undo history.
    pub fn label(&self) -> &'static str {
        match self {
            EditCommand::AddClip(_)          => "Add clip",
            EditCommand::RemoveClip(_)       => "Remove clip",
            EditCommand::MoveClip { .. }     => "Move clip",
            EditCommand::TrimClip { .. }     => "Trim clip",
            EditCommand::SplitClip { .. }    => "Split clip",
            EditCommand::SplitAt(_)          => "Split at playhead",
            EditCommand::SetEffects { .. }   => "Change effects",
            EditCommand::ClearTimeline       => "Clear timeline",
            EditCommand::Undo                => "Undo",
            EditCommand::Redo                => "Redo",
        }
    }

    /// Run the command against `timeline`. A successful edit pushes the prior
    /// state onto `history`; a rejected one leaves both untouched.
    pub fn apply(self, timeline: &mut Timeline, history: &mut History) -> Result<CommandOutcome> {
        let label  = self.label();
        let before = timeline.clone();

        let outcome = match self {
            EditCommand::Undo => {
                return Ok(history.undo(timeline).map_or(CommandOutcome::Unchanged, CommandOutcome::Undone));
            }
            EditCommand::Redo => {
                return Ok(history.redo(timeline).map_or(CommandOutcome::Unchanged, CommandOutcome::Redone));
            }

            EditCommand::AddClip(clip) => CommandOutcome::Edited(Some(timeline.add(clip)?)),
            EditCommand::RemoveClip(id) => match timeline.remove(id) {
                Some(_) => CommandOutcome::Edited(None),
                None    => CommandOutcome::Unchanged,
            },
            EditCommand::MoveClip { id, new_start } => {
                timeline.reposition(id, new_start)?;
                CommandOutcome::Edited(None)
            }
            EditCommand::TrimClip { id, trim_start, trim_end } => {
                timeline.trim(id, trim_start, trim_end)?;
                CommandOutcome::Edited(None)
            }
            EditCommand::SplitClip { id, offset } => match timeline.split(id, offset)? {
                Some(tail) => CommandOutcome::Edited(Some(tail)),
                None       => CommandOutcome::Unchanged,
            },
            EditCommand::SplitAt(t) => match timeline.split_at(t)? {
                Some(tail) => CommandOutcome::Edited(Some(tail)),
                None       => CommandOutcome::Unchanged,
            },
            EditCommand::SetEffects { id, patch } => {
                timeline.update_effects(id, &patch)?;
                CommandOutcome::Edited(None)
            }
            EditCommand::ClearTimeline => {
                if timeline.is_empty() {
                    CommandOutcome::Unchanged
                } else {
                    timeline.clear();
                    CommandOutcome::Edited(None)
                }
            }
        };

        if let CommandOutcome::Edited(_) = outcome {
            history.push(label, &before);
        }
        Ok(outcome)
    }
}
