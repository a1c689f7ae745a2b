// crates/clipforge-media/src/helpers/seek.rs
//
// Seek helper shared by range decode and single-frame preview decode.
//
// Seeks go BACKWARD (`..=ts`) to the keyframe at or before the target. The
// pre-roll frames between that keyframe and the target are dropped by the
// caller's PTS filter, so the first kept frame is the one at the target. A
// forward seek could land seconds past a mid-GOP target and silently lose
// those frames.
//
// A target of 0 skips the seek: the demuxer already starts there, and
// avformat_seek_file(max_ts = 0) fails with EPERM on some platforms.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to `target_secs`. Returns `false` if the demuxer refused; the
/// caller then decodes from the current position and its PTS filter skips
/// the pre-roll.
pub fn seek_to_secs(
    ictx:        &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label:       &str,
) -> bool {
    if target_secs <= 0.0 {
        return true;
    }

    let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[seek] soft-fail in {label} at {target_secs:.3}s: {e}; decoding from current position");
            false
        }
    }
}
