// crates/clipforge-media/src/encode.rs
//
// H.264 + AAC encode of the composited export, pulled one frame at a time
// from an EncodeInput.
//
// Stream layout in the output container:
//   Stream 0: H.264 video (YUV420P, bitrate and x264 preset from EncodeParams)
//   Stream 1: AAC audio  (FLTP stereo, 44100 Hz, AUDIO_BITRATE_KBPS)
//
// PTS strategy:
//   Video: frame counter in 1/fps.
//   Audio: sample counter in 1/44100.
//   The input is already concatenated, so both start at zero and never jump.
//
// Audio FIFO:
//   AAC takes exactly `encoder.frame_size()` (typically 1024) samples per
//   input frame. Resampled PCM is pushed into a stereo FLTP buffer; full
//   frames are popped from the front and the tail is zero-padded at the end.
//
// Cancellation and input errors:
//   `cancel` is checked before every video frame. A set flag returns
//   `EditError::Cancelled` wrapped in anyhow. Errors raised by the input while
//   it is being pulled are EditErrors too; backend.rs downcasts both back so
//   the export layer sees them unchanged, not as encode failures.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Context, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::{Pixel, Sample, output as open_output};
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use clipforge_core::error::EditError;
use clipforge_core::helpers::geometry::even_dimensions;
use clipforge_core::media_types::{AudioBuffer, EncodeInput, Frame};
use clipforge_core::quality::EncodeParams;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Output audio sample rate for all exports.
const AUDIO_RATE: i32 = 44100;

/// Source samples (per channel) fed to the resampler per call.
const AUDIO_CHUNK: usize = 4096;

/// Canvas size used for audio-only streams; H.264 needs some picture.
const BLANK_SIZE: (u32, u32) = (320, 240);

// ── Audio FIFO ────────────────────────────────────────────────────────────────

/// Stereo FLTP sample buffer. Mono frames are duplicated to both channels.
struct AudioFifo {
    left:  Vec<f32>,
    right: Vec<f32>,
}

impl AudioFifo {
    fn new() -> Self { Self { left: Vec::new(), right: Vec::new() } }

    fn len(&self) -> usize { self.left.len() }

    /// Append one resampled FLTP frame.
    fn push(&mut self, frame: &AudioFrame) {
        let n = frame.samples();
        if n == 0 { return; }
        unsafe {
            let l_bytes = frame.data(0);
            let l_f32 = std::slice::from_raw_parts(l_bytes.as_ptr() as *const f32, n);
            self.left.extend_from_slice(l_f32);

            let r_bytes = if frame.ch_layout().channels() >= 2 { frame.data(1) } else { frame.data(0) };
            let r_f32 = std::slice::from_raw_parts(r_bytes.as_ptr() as *const f32, n);
            self.right.extend_from_slice(r_f32);
        }
    }

    /// Pop one encoder-sized frame, zero-padding a short tail. PTS is
    /// `sample_idx` in 1/44100.
    fn pop_frame(&mut self, n: usize, sample_idx: i64) -> AudioFrame {
        let available = self.left.len().min(n);

        let mut frame = AudioFrame::new(
            Sample::F32(SampleType::Planar),
            n,
            ChannelLayoutMask::STEREO,
        );
        frame.set_rate(AUDIO_RATE as u32);
        frame.set_pts(Some(sample_idx));

        unsafe {
            let ldata = frame.data_mut(0);
            let ldst  = std::slice::from_raw_parts_mut(ldata.as_mut_ptr() as *mut f32, n);
            ldst[..available].copy_from_slice(&self.left[..available]);
            if available < n { ldst[available..].fill(0.0); }

            let rdata = frame.data_mut(1);
            let rdst  = std::slice::from_raw_parts_mut(rdata.as_mut_ptr() as *mut f32, n);
            rdst[..available].copy_from_slice(&self.right[..available]);
            if available < n { rdst[available..].fill(0.0); }
        }

        self.left.drain(..available);
        self.right.drain(..available);
        frame
    }
}

// ── Audio encoder state ───────────────────────────────────────────────────────

struct AudioEncState {
    encoder:        ffmpeg::encoder::Audio,
    /// Next output frame's PTS in samples (1/44100).
    out_sample_idx: i64,
    frame_size:     usize,
    fifo:           AudioFifo,
    audio_tb:       Rational,
    /// The muxer-assigned timebase for stream 1 (may differ from audio_tb).
    ost_audio_tb:   Rational,
}

impl AudioEncState {
    /// Encode buffered samples. With `flush` the partial tail is padded and sent.
    fn drain_fifo(&mut self, octx: &mut ffmpeg::format::context::Output, flush: bool) -> Result<()> {
        while self.fifo.len() >= self.frame_size
            || (flush && self.fifo.len() > 0)
        {
            let frame = self.fifo.pop_frame(self.frame_size, self.out_sample_idx);
            self.out_sample_idx += self.frame_size as i64;

            self.encoder.send_frame(&frame).context("send audio frame to encoder")?;
            self.drain_packets(octx)?;
        }
        Ok(())
    }

    /// Encode exactly one full frame from the FIFO, if one is buffered.
    fn drain_one(&mut self, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
        if self.fifo.len() < self.frame_size { return Ok(()); }
        let frame = self.fifo.pop_frame(self.frame_size, self.out_sample_idx);
        self.out_sample_idx += self.frame_size as i64;
        self.encoder.send_frame(&frame).context("send audio frame to encoder")?;
        self.drain_packets(octx)
    }

    fn drain_packets(&mut self, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
        let mut pkt = Packet::empty();
        while self.encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(1);
            pkt.rescale_ts(self.audio_tb, self.ost_audio_tb);
            pkt.write_interleaved(octx).context("write audio packet")?;
        }
        Ok(())
    }

    fn flush_encoder(&mut self, octx: &mut ffmpeg::format::context::Output) -> Result<()> {
        self.encoder.send_eof().context("send EOF to audio encoder")?;
        self.drain_packets(octx)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Encode everything `input` yields into `output`. Blocking.
pub fn encode_stream(
    input:  &mut dyn EncodeInput,
    output: &Path,
    params: &EncodeParams,
    cancel: &AtomicBool,
) -> Result<()> {
    if params.fps == 0 {
        bail!("output frame rate must be positive");
    }

    let (width, height) = match (params.width, params.height, input.size()) {
        (Some(w), Some(h), _) => even_dimensions(w, h),
        (_, _, Some((w, h)))  => even_dimensions(w, h),
        _                     => BLANK_SIZE,
    };

    // ── Output context ────────────────────────────────────────────────────────
    let mut octx = open_output(output)
        .with_context(|| format!("could not open output '{}'", output.display()))?;

    // ── Video encoder (stream 0) ──────────────────────────────────────────────
    let frame_tb = Rational::new(1, params.fps as i32);

    let h264 = encoder::find(CodecId::H264)
        .ok_or_else(|| anyhow!("H.264 encoder not found; is libx264 available?"))?;

    let mut ost_video = octx.add_stream(h264).context("add video stream")?;
    ost_video.set_time_base(frame_tb);

    let mut video_enc = codec::context::Context::new_with_codec(h264)
        .encoder().video()
        .context("create video encoder context")?;

    video_enc.set_width(width);
    video_enc.set_height(height);
    video_enc.set_format(Pixel::YUV420P);
    video_enc.set_time_base(frame_tb);
    video_enc.set_frame_rate(Some(Rational::new(params.fps as i32, 1)));
    video_enc.set_bit_rate(params.video_bitrate_kbps as usize * 1000);

    let mut opts = ffmpeg::Dictionary::new();
    opts.set("preset", params.preset.as_x264());

    let mut video_encoder = video_enc.open_as_with(h264, opts)
        .with_context(|| format!("open {} encoder", params.codec))?;

    // libavcodec resets the SAR during open, so square pixels are forced on
    // the opened context.
    video_encoder.set_aspect_ratio(Rational::new(1, 1));

    // encoder::Video does not implement AsPtr<AVCodecParameters>, so the
    // stream parameters are copied through FFI.
    unsafe {
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
            video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        );
        if ret < 0 {
            bail!("avcodec_parameters_from_context (video) failed: {ret}");
        }
    }

    // ── Audio encoder (stream 1) ──────────────────────────────────────────────
    let audio_tb = Rational::new(1, AUDIO_RATE);

    let aac = encoder::find(CodecId::AAC).ok_or_else(|| anyhow!("AAC encoder not found"))?;

    let mut ost_audio = octx.add_stream(aac).context("add audio stream")?;
    ost_audio.set_time_base(audio_tb);

    let mut audio_enc = codec::context::Context::new_with_codec(aac)
        .encoder().audio()
        .context("create audio encoder context")?;

    audio_enc.set_rate(AUDIO_RATE);
    audio_enc.set_ch_layout(ChannelLayout::STEREO);
    audio_enc.set_format(Sample::F32(SampleType::Planar));
    audio_enc.set_bit_rate(params.audio_bitrate_kbps as usize * 1000);

    let audio_encoder = audio_enc.open_as_with(aac, ffmpeg::Dictionary::new())
        .context("open AAC encoder")?;
    let audio_frame_size = (audio_encoder.frame_size() as usize).max(1024);

    let ost_audio_tb = octx.stream(1).ok_or_else(|| anyhow!("audio stream missing"))?.time_base();

    unsafe {
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            (**(*octx.as_mut_ptr()).streams.add(1)).codecpar,
            audio_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        );
        if ret < 0 {
            bail!("avcodec_parameters_from_context (audio) failed: {ret}");
        }
    }

    octx.write_header().context("write output header")?;
    let ost_video_tb = octx.stream(0).ok_or_else(|| anyhow!("video stream missing"))?.time_base();

    let mut audio_state = AudioEncState {
        encoder:        audio_encoder,
        out_sample_idx: 0,
        frame_size:     audio_frame_size,
        fifo:           AudioFifo::new(),
        audio_tb,
        ost_audio_tb,
    };

    // ── Audio → FIFO ──────────────────────────────────────────────────────────
    // The whole buffer is resampled up front; the FIFO is drained alongside the
    // video loop so packets stay interleaved.
    push_audio(input.audio(), &mut audio_state.fifo)?;

    // ── Video loop ────────────────────────────────────────────────────────────
    // Audio-only input: black frames for the length of the audio.
    let blank_count = match input.size() {
        Some(_) => None,
        None    => Some((input.audio().duration() * params.fps as f64).ceil().max(1.0) as usize),
    };
    let blank = Frame::black(width, height);

    let mut scaler: Option<ScaleCtx> = None;
    let mut scaler_src = (0u32, 0u32);
    let samples_per_frame = AUDIO_RATE as f64 / params.fps as f64;

    let mut idx = 0usize;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(EditError::Cancelled.into());
        }

        let pulled;
        let frame: &Frame = match blank_count {
            Some(n) if idx < n => &blank,
            Some(_)            => break,
            None => match input.next_frame()? {
                Some(f) => { pulled = f; &pulled }
                None    => break,
            },
        };

        // Rebuild the scaler if a source frame size changes mid-stream.
        if scaler.is_none() || scaler_src != (frame.width, frame.height) {
            scaler = Some(ScaleCtx::get(
                Pixel::RGB24,   frame.width, frame.height,
                Pixel::YUV420P, width,       height,
                ScaleFlags::BILINEAR,
            ).context("create swscale context")?);
            scaler_src = (frame.width, frame.height);
        }
        let Some(sc) = scaler.as_mut() else { break };

        let rgb = rgb_frame(frame);
        let mut yuv = VideoFrame::empty();
        sc.run(&rgb, &mut yuv).context("scale video frame")?;
        yuv.set_pts(Some(idx as i64));
        unsafe {
            (*yuv.as_mut_ptr()).sample_aspect_ratio =
                ffmpeg::ffi::AVRational { num: 1, den: 1 };
        }

        video_encoder.send_frame(&yuv).context("send video frame to encoder")?;
        let mut pkt = Packet::empty();
        while video_encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(frame_tb, ost_video_tb);
            pkt.write_interleaved(&mut octx).context("write video packet")?;
        }

        // Keep audio roughly one frame ahead of video in the muxer queue.
        let audio_due = ((idx + 1) as f64 * samples_per_frame) as i64;
        while audio_state.out_sample_idx < audio_due && audio_state.fifo.len() >= audio_state.frame_size {
            audio_state.drain_one(&mut octx)?;
        }
        idx += 1;
    }

    // ── Flush ─────────────────────────────────────────────────────────────────
    video_encoder.send_eof().context("send EOF to video encoder")?;
    let mut pkt = Packet::empty();
    while video_encoder.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(0);
        pkt.rescale_ts(frame_tb, ost_video_tb);
        pkt.write_interleaved(&mut octx).context("write flush video packet")?;
    }

    audio_state.drain_fifo(&mut octx, true)?;
    audio_state.flush_encoder(&mut octx)?;

    octx.write_trailer().context("write trailer")?;

    log::info!("[export] encoded {} frames {width}x{height} @ {} fps → {}",
        idx, params.fps, output.display());
    Ok(())
}

/// Copy a packed RGB24 frame into an ffmpeg frame, honouring its row stride.
fn rgb_frame(frame: &Frame) -> VideoFrame {
    let mut out = VideoFrame::new(Pixel::RGB24, frame.width, frame.height);
    let stride    = out.stride(0);
    let row_bytes = frame.width as usize * 3;
    let dst       = out.data_mut(0);
    for (row, src) in frame.data.chunks_exact(row_bytes).enumerate() {
        dst[row * stride..row * stride + row_bytes].copy_from_slice(src);
    }
    out
}

/// Resample interleaved f32 PCM to FLTP stereo 44100 and push it into `fifo`.
fn push_audio(audio: &AudioBuffer, fifo: &mut AudioFifo) -> Result<()> {
    if audio.is_empty() || audio.sample_rate == 0 {
        return Ok(());
    }
    let channels = audio.channels.max(1) as usize;
    let (src_mask, src_layout) = if channels >= 2 {
        (ChannelLayoutMask::STEREO, ChannelLayout::STEREO)
    } else {
        (ChannelLayoutMask::MONO, ChannelLayout::MONO)
    };
    // Anything beyond two channels is folded to the first two.
    let src_channels = channels.min(2);

    let mut rs = resampling::Context::get2(
        Sample::F32(SampleType::Packed), src_layout,            audio.sample_rate,
        Sample::F32(SampleType::Planar), ChannelLayout::STEREO, AUDIO_RATE as u32,
    ).context("create audio resampler")?;

    for chunk in audio.samples.chunks(AUDIO_CHUNK * channels) {
        let n = chunk.len() / channels;
        if n == 0 { continue; }

        let mut src = AudioFrame::new(Sample::F32(SampleType::Packed), n, src_mask);
        src.set_rate(audio.sample_rate);
        unsafe {
            let data = src.data_mut(0);
            let dst  = std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut f32, n * src_channels);
            for (i, sample_frame) in chunk.chunks_exact(channels).enumerate() {
                dst[i * src_channels..(i + 1) * src_channels]
                    .copy_from_slice(&sample_frame[..src_channels]);
            }
        }

        let mut resampled = AudioFrame::empty();
        rs.run(&src, &mut resampled).context("resample audio")?;
        fifo.push(&resampled);
    }

    // Drain what the resampler still holds.
    let mut tail = AudioFrame::empty();
    if rs.flush(&mut tail).is_ok() {
        fifo.push(&tail);
    }
    Ok(())
}
