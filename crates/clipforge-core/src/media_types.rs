// crates/clipforge-core/src/media_types.rs
//
// Types that flow between the core and the media collaborators.
// No ffmpeg here: just plain data plus the two traits a backend implements.
//
//   MediaSource  : open a file, report duration, open a trimmed range for
//                   frame-by-frame reading, decode a single frame for preview.
//   StreamEncoder: pull a composited export stream and write it to a
//                   container file.
//
// Video moves through export one frame at a time (FrameReader / EncodeInput);
// only audio is held whole. MediaStream is the in-memory form used by tests
// and short ranges.
//
// clipforge-media provides the FFmpeg implementations; tests provide
// in-memory ones.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::Result;
use crate::quality::EncodeParams;

/// Shared cancellation flag, checked by long-running export work.
pub type CancelFlag = Arc<AtomicBool>;

/// One decoded video frame, packed RGB24 (no stride padding).
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3,
            "Frame::new: buffer length does not match {width}x{height} RGB24");
        Self { width, height, data }
    }

    pub fn black(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0; width as usize * height as usize * 3] }
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb.iter().copied().cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self { width, height, data }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Interleaved f32 PCM in [-1, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels:    u16,
    pub samples:     Vec<f32>,
}

impl AudioBuffer {
    pub fn silent(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels, samples: Vec::new() }
    }

    /// Number of sample frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 { return 0.0; }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A decoded audio/video stream, fully in memory.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaStream {
    pub fps:    f64,
    pub frames: Vec<Frame>,
    pub audio:  AudioBuffer,
}

impl MediaStream {
    /// Duration in seconds. Video-less streams fall back to the audio length.
    pub fn duration(&self) -> f64 {
        if !self.frames.is_empty() && self.fps > 0.0 {
            self.frames.len() as f64 / self.fps
        } else {
            self.audio.duration()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.audio.is_empty()
    }

    /// Dimensions of the first frame, if any.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| (f.width, f.height))
    }

    /// Wrap the frames in a reader, keeping the audio.
    pub fn into_range(self) -> SourceRange {
        SourceRange {
            video: Box::new(VecFrames::new(self.fps, self.frames)),
            audio: self.audio,
        }
    }
}

// ── Frame-by-frame reading ────────────────────────────────────────────────────

/// Pull-based video source. Frames come out in display order; `Ok(None)`
/// marks the end and every later call returns it too.
pub trait FrameReader {
    /// Rate the yielded frames are spaced at.
    fn fps(&self) -> f64;

    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Reader over frames that are already decoded.
pub struct VecFrames {
    fps:    f64,
    frames: std::vec::IntoIter<Frame>,
}

impl VecFrames {
    pub fn new(fps: f64, frames: Vec<Frame>) -> Self {
        Self { fps, frames: frames.into_iter() }
    }
}

impl FrameReader for VecFrames {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.next())
    }
}

/// A source range opened for export: video decoded on demand, audio in full.
pub struct SourceRange {
    pub video: Box<dyn FrameReader>,
    pub audio: AudioBuffer,
}

impl SourceRange {
    /// Drain the reader into memory.
    pub fn into_stream(mut self) -> Result<MediaStream> {
        let fps = self.video.fps();
        let mut frames = Vec::new();
        while let Some(frame) = self.video.next_frame()? {
            frames.push(frame);
        }
        Ok(MediaStream { fps, frames, audio: self.audio })
    }
}

/// The composited export stream an encoder consumes: frames pulled at
/// `fps()` until `next_frame` returns `None`, audio already mixed.
pub trait EncodeInput: FrameReader {
    /// Canvas every frame is drawn on. `None` for an audio-only export.
    fn size(&self) -> Option<(u32, u32)>;

    fn audio(&self) -> &AudioBuffer;
}

/// What a probe reports about a source file.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub duration:  f64,
    pub fps:       f64,
    pub width:     u32,
    pub height:    u32,
    pub has_audio: bool,
}

/// Decoding collaborator. Every failure surfaces as `EditError::MediaLoad`.
pub trait MediaSource: Send + Sync {
    /// Open `path` and report its duration and stream layout.
    fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Decode the source restricted to `[start, end)` seconds into memory.
    fn read_range(&self, path: &Path, start: f64, end: f64) -> Result<MediaStream>;

    /// Open `[start, end)` for frame-by-frame reading. Export goes through
    /// this, so backends for real media override it with a decoder that
    /// holds one frame at a time. The default reads the whole range.
    fn open_range(&self, path: &Path, start: f64, end: f64) -> Result<SourceRange> {
        Ok(self.read_range(path, start, end)?.into_range())
    }

    /// Decode the frame displayed at `timestamp` seconds, for preview.
    fn frame_at(&self, path: &Path, timestamp: f64) -> Result<Frame>;
}

/// Encoding collaborator. Every failure surfaces as `EditError::Encode`.
///
/// Implementations pull every frame from `input`, must release codec
/// resources on every return path and should poll `cancel` once per frame,
/// returning `EditError::Cancelled`. Errors raised by `input` itself (a source
/// failing mid-decode) are returned unchanged.
pub trait StreamEncoder: Send + Sync {
    fn encode(
        &self,
        input:  &mut dyn EncodeInput,
        output: &Path,
        params: &EncodeParams,
        cancel: &AtomicBool,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_duration_prefers_video() {
        let s = MediaStream {
            fps:    25.0,
            frames: vec![Frame::black(2, 2); 50],
            audio:  AudioBuffer { sample_rate: 100, channels: 2, samples: vec![0.0; 100] },
        };
        assert!((s.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn audio_only_stream_uses_audio_length() {
        let s = MediaStream {
            fps:    30.0,
            frames: Vec::new(),
            audio:  AudioBuffer { sample_rate: 10, channels: 2, samples: vec![0.0; 40] },
        };
        assert!((s.duration() - 2.0).abs() < 1e-12);
        assert!(!s.is_empty());
    }

    #[test]
    fn range_reader_yields_frames_then_stays_done() {
        let s = MediaStream {
            fps:    10.0,
            frames: (0..3).map(|i| Frame::filled(1, 1, [i, i, i])).collect(),
            audio:  AudioBuffer::silent(100, 2),
        };
        let mut range = s.clone().into_range();
        assert_eq!(range.video.fps(), 10.0);
        assert_eq!(range.video.next_frame().unwrap(), Some(s.frames[0].clone()));

        let rest = range.into_stream().unwrap();
        assert_eq!(rest.frames, s.frames[1..]);

        let mut empty = VecFrames::new(10.0, Vec::new());
        assert_eq!(empty.next_frame().unwrap(), None);
        assert_eq!(empty.next_frame().unwrap(), None);
    }

    #[test]
    fn filled_frame_repeats_colour() {
        let f = Frame::filled(3, 2, [1, 2, 3]);
        assert_eq!(f.data.len(), 18);
        assert_eq!(f.pixel(2, 1), [1, 2, 3]);
    }
}
