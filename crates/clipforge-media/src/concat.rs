// crates/clipforge-media/src/concat.rs
//
// Join opened clip streams into the single stream the encoder pulls from.
//
// Layout rules:
//   • Segments arrive ordered by timeline start_time.
//   • Each segment is laid end to end after the previous one; gaps between
//     clips on the timeline are NOT reproduced.
//   • If a segment's timeline range overlaps its predecessor's, it is pulled
//     back by the overlap and drawn on top of the predecessor's tail. Audio in
//     the overlap is summed and clipped to [-1, 1].
//
// Normalisation:
//   Video: each segment is resampled to the output fps by timestamp (nearest
//           earlier source frame) and letterboxed onto one canvas: the largest
//           width/height among segments, unless EncodeParams pins a size.
//   Audio: resampled (nearest sample) to the first segment's rate and mapped
//           to its channel count.
//
// Positions are computed on the integer output-frame grid so a single clip
// comes out within one frame of its processed duration.
//
// Video is composited on demand: `Concat` builds output frame j only when the
// encoder asks for it, and each segment keeps just the source frame it last
// read. A segment's decoder is dropped as soon as the output moves past it.
// Audio is mixed once, in `Concat::new`.

use clipforge_core::clip::ClipId;
use clipforge_core::clip_stream::ClipStream;
use clipforge_core::error::{EditError, Result};
use clipforge_core::helpers::geometry::{even_dimensions, letterbox};
use clipforge_core::helpers::time::frame_count;
use clipforge_core::media_types::{AudioBuffer, EncodeInput, Frame, FrameReader, MediaStream};
use clipforge_core::quality::EncodeParams;

/// Audio rate used when no segment carries audio.
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// One opened clip and where it sat on the timeline.
pub struct Segment {
    pub clip:       ClipId,
    pub name:       String,
    pub start_time: f64,
    pub end_time:   f64,
    pub stream:     ClipStream,
}

/// Where a segment lands on the output frame grid.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Placement {
    first_frame: usize,
    frames:      usize,
}

impl Placement {
    fn covers(&self, j: usize) -> bool {
        j >= self.first_frame && j < self.first_frame + self.frames
    }
}

fn place(segments: &[Segment], fps: f64) -> Vec<Placement> {
    let mut out      = Vec::with_capacity(segments.len());
    let mut cursor   = 0usize;
    let mut prev_end = None::<f64>;

    for seg in segments {
        let frames  = frame_count(seg.stream.duration(), fps);
        let overlap = prev_end
            .map(|end| ((end - seg.start_time).max(0.0) * fps).round() as usize)
            .unwrap_or(0);
        let first_frame = cursor.saturating_sub(overlap);

        out.push(Placement { first_frame, frames });
        cursor   = cursor.max(first_frame + frames);
        prev_end = Some(prev_end.map_or(seg.end_time, |e| e.max(seg.end_time)));
    }
    out
}

/// Output canvas: pinned by `params`, else the largest frame among segments.
/// `None` when no segment has video and no size is pinned.
pub fn canvas_size(segments: &[Segment], params: &EncodeParams) -> Option<(u32, u32)> {
    if let (Some(w), Some(h)) = (params.width, params.height) {
        return Some(even_dimensions(w, h));
    }
    segments.iter()
        .filter_map(|s| s.stream.size())
        .reduce(|(aw, ah), (bw, bh)| (aw.max(bw), ah.max(bh)))
        .map(|(w, h)| even_dimensions(w, h))
}

// ── Lane ──────────────────────────────────────────────────────────────────────

/// Read position inside one segment.
struct Lane {
    clip:      ClipId,
    name:      String,
    placement: Placement,
    /// `None` once the output has moved past this segment.
    stream:    Option<ClipStream>,
    fps:       f64,
    /// Last source frame read and its index in the segment.
    held:      Option<(usize, Frame)>,
    exhausted: bool,
}

impl Lane {
    /// Source frame shown at `t` seconds into the segment. Reads forward as
    /// needed; past the end of the source the last frame is held.
    fn frame_at(&mut self, t: f64) -> Result<Option<&Frame>> {
        let want = (t * self.fps + 1e-9).floor().max(0.0) as usize;
        while !self.exhausted && self.held.as_ref().map_or(true, |(i, _)| *i < want) {
            let Some(stream) = self.stream.as_mut() else { break };
            match stream.next_frame() {
                Ok(Some(frame)) => {
                    let index = self.held.as_ref().map_or(0, |(i, _)| i + 1);
                    self.held = Some((index, frame));
                }
                Ok(None) => self.exhausted = true,
                Err(e)   => return Err(self.resolution_error(e)),
            }
        }
        Ok(self.held.as_ref().map(|(_, f)| f))
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("[concat] done with '{}'", self.name);
        }
        self.held = None;
    }

    fn resolution_error(&self, source: EditError) -> EditError {
        match source {
            EditError::Cancelled => EditError::Cancelled,
            source => EditError::ClipResolution {
                clip:   self.clip,
                name:   self.name.clone(),
                source: Box::new(source),
            },
        }
    }
}

// ── Concat ────────────────────────────────────────────────────────────────────

/// The composited export stream. Implements `EncodeInput`.
pub struct Concat {
    lanes:  Vec<Lane>,
    fps:    f64,
    canvas: Option<(u32, u32)>,
    total:  usize,
    next:   usize,
    audio:  AudioBuffer,
}

impl Concat {
    /// Lay out `segments` (ordered by start_time) at `params.fps` and mix
    /// their audio. No video is read yet.
    pub fn new(mut segments: Vec<Segment>, params: &EncodeParams) -> Self {
        let fps        = params.fps.max(1) as f64;
        let placements = place(&segments, fps);
        let total      = placements.iter().map(|p| p.first_frame + p.frames).max().unwrap_or(0);
        let canvas     = canvas_size(&segments, params);

        // ── Audio ─────────────────────────────────────────────────────────────
        let (rate, channels) = segments.iter()
            .map(|s| s.stream.audio())
            .find(|a| a.sample_rate > 0 && a.channels > 0)
            .map(|a| (a.sample_rate, a.channels))
            .unwrap_or((FALLBACK_SAMPLE_RATE, 2));

        let ch          = channels as usize;
        let total_audio = (total as f64 / fps * rate as f64).round() as usize;
        let mut mix     = vec![0.0f32; total_audio * ch];

        for (seg, p) in segments.iter_mut().zip(&placements) {
            let src    = resample(&seg.stream.take_audio(), rate, channels);
            let offset = (p.first_frame as f64 / fps * rate as f64).round() as usize;
            let limit  = ((p.first_frame + p.frames) as f64 / fps * rate as f64).round() as usize;
            let start  = offset * ch;
            let end    = (limit.min(total_audio) * ch).min(start + src.len());
            if start >= end { continue; }
            for (dst, s) in mix[start..end].iter_mut().zip(&src) {
                *dst = (*dst + *s).clamp(-1.0, 1.0);
            }
        }

        // ── Video lanes ───────────────────────────────────────────────────────
        let lanes = segments.into_iter().zip(placements)
            .map(|(seg, placement)| Lane {
                clip:      seg.clip,
                name:      seg.name,
                placement,
                fps:       seg.stream.fps(),
                stream:    Some(seg.stream),
                held:      None,
                exhausted: false,
            })
            .collect();

        Self {
            lanes,
            fps,
            canvas,
            total,
            next: 0,
            audio: AudioBuffer { sample_rate: rate, channels, samples: mix },
        }
    }

    /// Number of output frames.
    pub fn frame_count(&self) -> usize {
        if self.canvas.is_some() { self.total } else { 0 }
    }

    pub fn duration(&self) -> f64 {
        self.total as f64 / self.fps
    }

    /// Read the whole composite into memory. For short renders and tests.
    pub fn collect(mut self) -> Result<MediaStream> {
        let mut frames = Vec::with_capacity(self.frame_count());
        while let Some(frame) = FrameReader::next_frame(&mut self)? {
            frames.push(frame);
        }
        Ok(MediaStream { fps: self.fps, frames, audio: self.audio })
    }
}

impl FrameReader for Concat {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some((canvas_w, canvas_h)) = self.canvas else {
            return Ok(None);
        };
        if self.next >= self.total {
            return Ok(None);
        }
        let j = self.next;
        self.next += 1;

        for lane in &mut self.lanes {
            let p = lane.placement;
            if j >= p.first_frame + p.frames {
                lane.release();
            }
        }

        // Later segments win: search from the back.
        let fps = self.fps;
        for lane in self.lanes.iter_mut().rev() {
            if !lane.placement.covers(j) { continue; }
            let t = (j - lane.placement.first_frame) as f64 / fps;
            if let Some(frame) = lane.frame_at(t)? {
                return Ok(Some(letterbox(frame, canvas_w, canvas_h)));
            }
        }
        Ok(Some(Frame::black(canvas_w, canvas_h)))
    }
}

impl EncodeInput for Concat {
    fn size(&self) -> Option<(u32, u32)> {
        self.canvas
    }

    fn audio(&self) -> &AudioBuffer {
        &self.audio
    }
}

/// Composite `segments` straight into memory.
pub fn concatenate(segments: Vec<Segment>, params: &EncodeParams) -> Result<MediaStream> {
    Concat::new(segments, params).collect()
}

/// Nearest-sample rate conversion plus channel mapping (missing channels copy
/// the last source channel, extra ones are dropped).
fn resample(audio: &AudioBuffer, rate: u32, channels: u16) -> Vec<f32> {
    let src_ch = audio.channels.max(1) as usize;
    let dst_ch = channels.max(1) as usize;
    let n_in   = audio.frame_count();
    if n_in == 0 || audio.sample_rate == 0 {
        return Vec::new();
    }
    if audio.sample_rate == rate && src_ch == dst_ch {
        return audio.samples.clone();
    }

    let ratio = audio.sample_rate as f64 / rate as f64;
    let n_out = (n_in as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(n_out * dst_ch);
    for i in 0..n_out {
        let j = ((i as f64 * ratio) as usize).min(n_in - 1);
        for c in 0..dst_ch {
            out.push(audio.samples[j * src_ch + c.min(src_ch - 1)]);
        }
    }
    out
}
