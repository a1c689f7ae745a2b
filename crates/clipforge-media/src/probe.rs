// crates/clipforge-media/src/probe.rs
//
// In-process FFmpeg probing: duration, frame rate, video dimensions, audio
// presence. One demuxer open per call, no decoding.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::media::Type;

use clipforge_core::media_types::MediaInfo;

/// Fallback frame rate for streams that report none (still images, some VFR).
pub const DEFAULT_FPS: f64 = 30.0;

pub fn probe(path: &Path) -> Result<MediaInfo> {
    let ctx = input(path).with_context(|| format!("open '{}'", path.display()))?;

    let mut duration = ctx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
    if !(duration > 0.0) {
        // Fall back to stream duration
        duration = ctx.streams().best(Type::Video)
            .or_else(|| ctx.streams().best(Type::Audio))
            .map(|s| s.duration() as f64 * f64::from(s.time_base()))
            .unwrap_or(0.0);
    }
    if !(duration.is_finite() && duration > 0.0) {
        return Err(anyhow!("duration unknown"));
    }

    let (width, height, fps) = match ctx.streams().best(Type::Video) {
        Some(stream) => {
            let params = stream.parameters();
            let rate   = f64::from(stream.avg_frame_rate());
            let fps    = if rate.is_finite() && rate > 0.0 { rate } else { DEFAULT_FPS };
            (params.width() as u32, params.height() as u32, fps)
        }
        None => (0, 0, DEFAULT_FPS),
    };
    let has_audio = ctx.streams().best(Type::Audio).is_some();

    log::info!("[media] {} → {duration:.2}s {width}x{height} @ {fps:.3} fps{}",
        path.display(), if has_audio { " +audio" } else { "" });

    Ok(MediaInfo { duration, fps, width, height, has_audio })
}
