// crates/clipforge-media/src/decode.rs
//
// Source decoding for the FfmpegMedia backend.
//
//   VideoReader    : frames in [start, end) as packed RGB24, decoded on demand.
//                     Holds its own demuxer and decoder between calls, the way
//                     a live preview decoder does, so a clip is never decoded
//                     ahead of the encoder.
//   decode_audio   : every sample in [start, end), interleaved f32 stereo at
//                     44.1 kHz, read in one pass.
//   decode_frame_at: the single frame shown at a timestamp, for preview.
//
// Video and audio are read through separate demuxer contexts. Each lane
// filters on its own timestamps and stops on its own out-point, so audio
// interleaved after the last in-range video packet is still read. Frames are
// scaled at the stream's *display* size (codec parameters), not the coded
// size, so macroblock padding rows never leak in.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;

use clipforge_core::media_types::{AudioBuffer, Frame};

use crate::helpers::seek::seek_to_secs;
use crate::probe::DEFAULT_FPS;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Decoded audio rate. Matches the AAC encoder rate in encode.rs.
pub const OUT_RATE: u32 = 44_100;

/// Interleaved f32: plane 0 holds all channels, matching `AudioBuffer`.
const OUT_FMT: Sample = Sample::F32(SampleType::Packed);

const OUT_LAYOUT: ChannelLayout = ChannelLayout::STEREO;

// ── Range open ────────────────────────────────────────────────────────────────

/// An opened source range. `video` is `None` for audio-only files.
pub struct RangeDecode {
    pub video: Option<VideoReader>,
    pub audio: AudioBuffer,
}

pub fn open_range(path: &Path, start: f64, end: f64) -> Result<RangeDecode> {
    let video = VideoReader::open(path, start, end)?;
    let audio = decode_audio(path, start, end)?;
    if video.is_none() && audio.is_none() {
        return Err(anyhow!("no audio or video stream"));
    }
    log::debug!("[media] opened [{start:.3}, {end:.3}) of {}", path.display());
    Ok(RangeDecode {
        video,
        audio: audio.unwrap_or_else(|| AudioBuffer::silent(OUT_RATE, 2)),
    })
}

// ── Video ─────────────────────────────────────────────────────────────────────

pub struct VideoReader {
    ictx:      ffmpeg::format::context::Input,
    video_idx: usize,
    lane:      VideoLane,
    start:     f64,
    end:       f64,
    /// Out-point reached or decoder flushed at EOF.
    done:      bool,
}

impl VideoReader {
    /// Open the best video stream and seek to `start`. `Ok(None)` when the
    /// file has no video.
    pub fn open(path: &Path, start: f64, end: f64) -> Result<Option<Self>> {
        let mut ictx = input(path).with_context(|| format!("open '{}'", path.display()))?;
        let Some(video_idx) = ictx.streams().best(MediaType::Video).map(|s| s.index()) else {
            return Ok(None);
        };

        // Decoders are built from a second context: Parameters borrows from the
        // stream, and ictx is needed mutably for seek + packets.
        let ictx2  = input(path)?;
        let stream = ictx2.stream(video_idx).ok_or_else(|| anyhow!("video stream vanished"))?;
        let tb     = f64::from(stream.time_base());
        let rate   = f64::from(stream.avg_frame_rate());
        let fps    = if rate.is_finite() && rate > 0.0 { rate } else { DEFAULT_FPS };
        let params = stream.parameters();
        let (w, h) = (params.width() as u32, params.height() as u32);
        let ctx    = ffmpeg::codec::context::Context::from_parameters(params)?;
        let dec    = ctx.decoder().video().context("open video decoder")?;
        let (w, h) = if w > 0 && h > 0 { (w, h) } else { (dec.width(), dec.height()) };

        seek_to_secs(&mut ictx, start, "video range");

        Ok(Some(Self {
            ictx,
            video_idx,
            lane: VideoLane { dec, tb, fps, width: w, height: h, scaler: None, ready: VecDeque::new() },
            start,
            end,
            done: false,
        }))
    }

    pub fn fps(&self) -> f64 {
        self.lane.fps
    }

    /// Next frame in the range, `Ok(None)` past the out-point or at EOF.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.lane.ready.is_empty() && !self.done {
            self.fill()?;
        }
        Ok(self.lane.ready.pop_front())
    }

    /// Feed packets until the decoder has produced at least one in-range
    /// frame, or the range is over. `packets()` resumes wherever the demuxer
    /// stopped on the previous call.
    fn fill(&mut self) -> Result<()> {
        let half_frame = 0.5 / self.lane.fps;
        for result in self.ictx.packets() {
            let (stream, packet) = result.context("read video packet")?;
            if stream.index() != self.video_idx { continue; }

            self.lane.dec.send_packet(&packet).context("send video packet to decoder")?;
            if self.lane.drain(self.start, self.end, half_frame)? {
                self.done = true;
                return Ok(());
            }
            if !self.lane.ready.is_empty() {
                return Ok(());
            }
        }

        // Codecs with B-frames hold frames back until EOF.
        let _ = self.lane.dec.send_eof();
        self.lane.drain(self.start, self.end, half_frame)?;
        self.done = true;
        Ok(())
    }
}

struct VideoLane {
    dec:    ffmpeg::decoder::video::Video,
    tb:     f64,
    fps:    f64,
    width:  u32,
    height: u32,
    scaler: Option<SwsContext>,
    ready:  VecDeque<Frame>,
}

impl VideoLane {
    /// Pull every ready frame. Returns `true` once a frame at or past `end`
    /// has been seen.
    fn drain(&mut self, start: f64, end: f64, half_frame: f64) -> Result<bool> {
        let mut decoded = VideoFrame::empty();
        while self.dec.receive_frame(&mut decoded).is_ok() {
            let t = decoded.pts().map(|p| p as f64 * self.tb).unwrap_or(0.0);
            if t < start - half_frame { continue; }
            if t >= end { return Ok(true); }

            if self.scaler.is_none() {
                self.scaler = Some(SwsContext::get(
                    decoded.format(), self.width, self.height,
                    Pixel::RGB24,     self.width, self.height,
                    Flags::BILINEAR,
                ).context("create swscale context")?);
            }
            if let Some(sc) = self.scaler.as_mut() {
                self.ready.push_back(scale_to_rgb(sc, &decoded, self.width, self.height)?);
            }
        }
        Ok(false)
    }
}

// ── Audio ─────────────────────────────────────────────────────────────────────

/// Decode the audio of `[start, end)`. `Ok(None)` when the file has no audio
/// stream; a decoder that will not open is logged and also gives `None`, so
/// the clip plays silent instead of failing.
pub fn decode_audio(path: &Path, start: f64, end: f64) -> Result<Option<AudioBuffer>> {
    let mut ictx = input(path).with_context(|| format!("open '{}'", path.display()))?;
    let Some(audio_idx) = ictx.streams().best(MediaType::Audio).map(|s| s.index()) else {
        return Ok(None);
    };

    let ictx2  = input(path)?;
    let stream = ictx2.stream(audio_idx).ok_or_else(|| anyhow!("audio stream vanished"))?;
    let tb     = f64::from(stream.time_base());
    let dec = match ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .and_then(|c| c.decoder().audio())
    {
        Ok(dec) => dec,
        Err(e)  => {
            log::warn!("[media] audio decoder open failed for '{}': {e}", path.display());
            return Ok(None);
        }
    };
    let mut lane = AudioLane { dec, tb, resampler: None, samples: Vec::new() };

    seek_to_secs(&mut ictx, start, "audio range");

    let mut reached_end = false;
    for result in ictx.packets() {
        let (stream, packet) = result
            .with_context(|| format!("read packet from '{}'", path.display()))?;
        if stream.index() != audio_idx { continue; }
        // Soft-fail: a bad audio packet should not abort the read.
        if lane.dec.send_packet(&packet).is_err() { continue; }
        if lane.drain(start, end)? {
            reached_end = true;
            break;
        }
    }
    if !reached_end {
        let _ = lane.dec.send_eof();
        lane.drain(start, end)?;
    }

    Ok(Some(AudioBuffer { sample_rate: OUT_RATE, channels: 2, samples: lane.samples }))
}

struct AudioLane {
    dec:       ffmpeg::decoder::audio::Audio,
    tb:        f64,
    resampler: Option<resampling::Context>,
    samples:   Vec<f32>,
}

impl AudioLane {
    /// Pull every ready frame. Returns `true` once a frame starting at or
    /// past `end` has been seen: nothing after it can be in range.
    fn drain(&mut self, start: f64, end: f64) -> Result<bool> {
        let mut raw = AudioFrame::empty();
        while self.dec.receive_frame(&mut raw).is_ok() {
            let t0 = raw.pts().map(|p| p as f64 * self.tb).unwrap_or(0.0);
            let mut chunk = Vec::new();
            append_resampled(&raw, &mut self.resampler, &mut chunk)?;
            if keep_in_range(t0, &chunk, start, end, &mut self.samples) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Append the stereo sample pairs of `chunk` (first pair at `t0`) whose own
/// timestamp lies in `[start, end)`. Returns `true` when the chunk starts at
/// or after `end`.
fn keep_in_range(t0: f64, chunk: &[f32], start: f64, end: f64, out: &mut Vec<f32>) -> bool {
    if t0 >= end {
        return true;
    }
    for (k, pair) in chunk.chunks_exact(2).enumerate() {
        let t = t0 + k as f64 / OUT_RATE as f64;
        if t >= start && t < end {
            out.extend_from_slice(pair);
        }
    }
    false
}

/// Resample `frame` to 44.1 kHz interleaved f32 stereo and append to `out`.
/// Builds `resampler` on first use.
fn append_resampled(
    frame:     &AudioFrame,
    resampler: &mut Option<resampling::Context>,
    out:       &mut Vec<f32>,
) -> Result<()> {
    let src_channels = frame.ch_layout().channels();
    let needs_resample = frame.format() != OUT_FMT
        || frame.rate()                != OUT_RATE
        || src_channels                != 2;

    if !needs_resample {
        append_packed_f32(frame, out);
        return Ok(());
    }

    if resampler.is_none() {
        // Mono sources must be declared as MONO or swr misreads the layout.
        let src_layout = if src_channels >= 2 { frame.ch_layout() } else { ChannelLayout::MONO };
        *resampler = Some(resampling::Context::get2(
            frame.format(), src_layout, frame.rate(),
            OUT_FMT,        OUT_LAYOUT, OUT_RATE,
        ).context("create audio resampler")?);
    }

    if let Some(rs) = resampler.as_mut() {
        let mut resampled = AudioFrame::empty();
        if rs.run(frame, &mut resampled).is_ok() && resampled.samples() > 0 {
            append_packed_f32(&resampled, out);
        }
    }
    Ok(())
}

/// Copy packed f32 samples (all channels in plane 0) into `out`.
fn append_packed_f32(frame: &AudioFrame, out: &mut Vec<f32>) {
    let n = frame.samples() * 2;
    let data = frame.data(0);
    out.extend(
        data.chunks_exact(4)
            .take(n)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
}

/// Scale one decoded frame to RGB24 and strip the stride padding.
fn scale_to_rgb(sc: &mut SwsContext, decoded: &VideoFrame, w: u32, h: u32) -> Result<Frame> {
    let mut rgb = VideoFrame::empty();
    sc.run(decoded, &mut rgb).context("scale video frame")?;
    let stride    = rgb.stride(0);
    let raw       = rgb.data(0);
    let row_bytes = w as usize * 3;
    let data: Vec<u8> = (0..h as usize)
        .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
        .copied()
        .collect();
    Ok(Frame::new(w, h, data))
}

// ── Single frame ──────────────────────────────────────────────────────────────

pub fn decode_frame_at(path: &Path, timestamp: f64) -> Result<Frame> {
    let mut ictx = input(path).with_context(|| format!("open '{}'", path.display()))?;
    let video_idx = ictx.streams().best(MediaType::Video)
        .ok_or_else(|| anyhow!("no video stream"))?
        .index();

    let ictx2  = input(path)?;
    let stream = ictx2.stream(video_idx).ok_or_else(|| anyhow!("stream gone"))?;
    let tb     = f64::from(stream.time_base());
    let params = stream.parameters();
    let (w, h) = (params.width() as u32, params.height() as u32);
    let mut decoder = ffmpeg::codec::context::Context::from_parameters(params)?
        .decoder().video()?;
    let (w, h) = if w > 0 && h > 0 { (w, h) } else { (decoder.width(), decoder.height()) };

    let mut scaler = SwsContext::get(
        decoder.format(), w, h,
        Pixel::RGB24,     w, h,
        Flags::BILINEAR,
    )?;

    seek_to_secs(&mut ictx, timestamp, "decode_frame_at");

    // The most recent frame, in case EOF arrives before the target (asking for
    // the very last frame of a file).
    let mut last_good: Option<Frame> = None;

    for (stream, packet) in ictx.packets().flatten() {
        if stream.index() != video_idx { continue; }
        if decoder.send_packet(&packet).is_err() { continue; }
        let mut decoded = VideoFrame::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let frame = scale_to_rgb(&mut scaler, &decoded, w, h)?;
            let t = decoded.pts().map(|p| p as f64 * tb).unwrap_or(timestamp);
            // Keyframe-aligned seek lands early; skip up to the target.
            if t + 1e-3 < timestamp {
                last_good = Some(frame);
                continue;
            }
            return Ok(frame);
        }
    }

    last_good.ok_or_else(|| anyhow!("no frame found at t={timestamp:.3}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_cut_on_their_own_timestamps() {
        let rate  = OUT_RATE as f64;
        let chunk = vec![0.5f32; 200];
        let mut out = Vec::new();

        // 100 pairs starting 50 samples before the in-point.
        assert!(!keep_in_range(1.0 - 50.0 / rate, &chunk, 1.0, 2.0, &mut out));
        assert_eq!(out.len(), 100);

        // Straddling the out-point keeps only the pairs before it.
        out.clear();
        assert!(!keep_in_range(2.0 - 30.0 / rate, &chunk, 1.0, 2.0, &mut out));
        assert_eq!(out.len(), 60);
    }

    #[test]
    fn chunk_at_the_out_point_ends_the_read() {
        let mut out = Vec::new();
        assert!(keep_in_range(2.0, &[0.1; 8], 1.0, 2.0, &mut out));
        assert!(out.is_empty());
    }
}
