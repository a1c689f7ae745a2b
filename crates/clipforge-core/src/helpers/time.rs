// crates/clipforge-core/src/helpers/time.rs
//
// Time formatting and frame arithmetic shared by the CLI, export and preview.

/// Format a duration in seconds as `MM:SS:FF` (minutes, seconds, frames at 30 fps).
///
/// Used wherever frame-level precision matters (timeline ruler, clip listings).
///
/// ```
/// use clipforge_core::helpers::time::format_time;
/// assert_eq!(format_time(0.0),    "00:00:00");
/// assert_eq!(format_time(61.5),   "01:01:15");
/// assert_eq!(format_time(3599.0), "59:59:00");
/// ```
pub fn format_time(s: f64) -> String {
    let m  = (s / 60.0) as u32;
    let sc = (s % 60.0) as u32;
    let fr = ((s * 30.0) as u32) % 30;
    format!("{m:02}:{sc:02}:{fr:02}")
}

/// Format a duration in seconds as a compact human-readable string.
///
/// | Range         | Format       | Example   |
/// |---------------|--------------|-----------|
/// | ≥ 3600 s      | `H:MM:SS`    | `1:04:35` |
/// | ≥ 60 s        | `M:SS`       | `3:07`    |
/// | < 60 s        | `S.Xs`       | `4.2s`    |
///
/// ```
/// use clipforge_core::helpers::time::format_duration;
/// assert_eq!(format_duration(4.2),    "4.2s");
/// assert_eq!(format_duration(187.0),  "3:07");
/// assert_eq!(format_duration(3875.0), "1:04:35");
/// ```
pub fn format_duration(secs: f64) -> String {
    if secs >= 3600.0 {
        format!(
            "{}:{:02}:{:02}",
            secs as u64 / 3600,
            (secs as u64 % 3600) / 60,
            secs as u64 % 60,
        )
    } else if secs >= 60.0 {
        format!("{}:{:02}", secs as u64 / 60, secs as u64 % 60)
    } else {
        format!("{secs:.1}s")
    }
}

/// Number of output frames needed to cover `duration` seconds at `fps`.
///
/// ```
/// use clipforge_core::helpers::time::frame_count;
/// assert_eq!(frame_count(2.0, 30.0), 60);
/// assert_eq!(frame_count(0.01, 30.0), 1);
/// assert_eq!(frame_count(0.0, 30.0), 0);
/// ```
pub fn frame_count(duration: f64, fps: f64) -> usize {
    if duration <= 0.0 || fps <= 0.0 {
        return 0;
    }
    // Tolerate float noise so 2.0 s at 30 fps is 60 frames, not 61.
    (duration * fps - 1e-9).ceil().max(0.0) as usize
}

/// Index of the source frame displayed at `t` seconds in a stream at `fps`,
/// clamped to `[0, len)`. `None` for an empty stream.
pub fn frame_index(t: f64, fps: f64, len: usize) -> Option<usize> {
    if len == 0 || fps <= 0.0 {
        return None;
    }
    let i = (t * fps + 1e-9).floor().max(0.0) as usize;
    Some(i.min(len - 1))
}
