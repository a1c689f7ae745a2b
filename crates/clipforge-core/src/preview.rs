// crates/clipforge-core/src/preview.rs
//
// Single-frame preview at a timeline position.
//
// Only per-frame work is done here: the clip's color correction and the fade
// gain for that instant. Speed affects which source frame is fetched, not the
// pixels. Full-stream stages (volume, reverse) have no meaning for one frame.

use crate::clip::Clip;
use crate::effects::color;
use crate::effects::helpers::fade_gain;
use crate::error::Result;
use crate::media_types::{Frame, MediaSource};
use crate::timeline::Timeline;

/// Source-file position shown at timeline time `time` for `clip`, clamped to
/// the trim range.
///
/// ```
/// use clipforge_core::clip::{Clip, EffectPatch};
/// use clipforge_core::preview::source_time;
/// use std::path::Path;
///
/// let mut c = Clip::with_duration(Path::new("a.mp4"), 20.0, 10.0).unwrap();
/// c.trim(4.0, 12.0).unwrap();
/// c.update_effects(&EffectPatch { speed: Some(2.0), ..Default::default() }).unwrap();
/// assert_eq!(source_time(&c, 11.0), 6.0);
/// assert_eq!(source_time(&c, 17.0), 12.0);
/// ```
pub fn source_time(clip: &Clip, time: f64) -> f64 {
    let offset = (time - clip.start_time()) * clip.effects().speed;
    (clip.trim_start() + offset).clamp(clip.trim_start(), clip.trim_end())
}

/// Decode and adjust the frame visible at `time`. `Ok(None)` when no clip
/// covers that instant.
pub fn preview_frame(timeline: &Timeline, time: f64, media: &dyn MediaSource) -> Result<Option<Frame>> {
    let Some(clip) = timeline.clip_at(time) else {
        return Ok(None);
    };

    let src       = source_time(clip, time);
    let mut frame = media.frame_at(clip.source(), src)?;
    let fx        = clip.effects();

    if fx.has_color_adjustment() {
        color::color_correct(&mut frame, fx.brightness, fx.contrast, fx.saturation);
    }

    if fx.fade_in > 0.0 || fx.fade_out > 0.0 {
        // Fades are measured on the retimed (output) clock.
        let out_t   = (src - clip.trim_start()) / fx.speed;
        let out_dur = clip.duration() / fx.speed;
        let gain    = fade_gain(out_t, out_dur, fx.fade_in, fx.fade_out);
        if gain < 1.0 {
            color::scale(&mut frame, gain);
        }
    }

    Ok(Some(frame))
}
