// crates/clipforge-core/src/clip_stream.rs
//
// ClipStream: one clip opened for export, read frame by frame.
//
//   video: pulled from the source's FrameReader on demand; every frame goes
//          through the clip's per-frame stages and its fade gain at the
//          frame's output timestamp before it is handed out.
//   audio: decoded and processed once when the stream is opened.
//
// Apart from audio, a ClipStream holds at most one decoded frame (the one
// read ahead by `new` to learn the size).

use crate::effects::EffectPipeline;
use crate::error::Result;
use crate::media_types::{AudioBuffer, Frame, FrameReader, MediaStream, SourceRange};

pub struct ClipStream {
    reader:   Box<dyn FrameReader>,
    pipeline: EffectPipeline,
    /// Output rate: source rate times speed.
    fps:      f64,
    /// Output length the fades are measured against.
    duration: f64,
    size:     Option<(u32, u32)>,
    peeked:   Option<Frame>,
    /// Frames handed out so far.
    index:    usize,
    audio:    AudioBuffer,
}

impl ClipStream {
    /// Wrap an opened source range. `duration` is the processed (output)
    /// length of the range.
    ///
    /// Returns `Ok(None)` when the range holds neither video nor audio.
    /// A pipeline that is not streamable (it reverses) is run over the whole
    /// range here instead, which buffers that one clip.
    pub fn new(range: SourceRange, pipeline: EffectPipeline, duration: f64) -> Result<Option<Self>> {
        if !pipeline.is_streamable() {
            let processed = pipeline.apply(range.into_stream()?);
            let duration  = processed.duration();
            return Self::new(processed.into_range(), EffectPipeline::new(), duration);
        }

        let SourceRange { video: mut reader, mut audio } = range;
        let peeked = reader.next_frame()?;
        if peeked.is_none() && audio.is_empty() {
            return Ok(None);
        }

        pipeline.process_audio(&mut audio, duration);
        Ok(Some(Self {
            fps:   reader.fps() * pipeline.speed(),
            size:  peeked.as_ref().map(|f| (f.width, f.height)),
            reader,
            pipeline,
            duration,
            peeked,
            index: 0,
            audio,
        }))
    }

    /// An already processed in-memory stream, passed through unchanged.
    pub fn from_stream(stream: MediaStream) -> Result<Option<Self>> {
        let duration = stream.duration();
        Self::new(stream.into_range(), EffectPipeline::new(), duration)
    }

    pub fn fps(&self)      -> f64                { self.fps }
    pub fn duration(&self) -> f64                { self.duration }
    pub fn size(&self)     -> Option<(u32, u32)> { self.size }
    pub fn audio(&self)    -> &AudioBuffer       { &self.audio }

    /// Move the processed audio out, leaving a silent buffer at the same rate.
    pub fn take_audio(&mut self) -> AudioBuffer {
        let silent = AudioBuffer::silent(self.audio.sample_rate, self.audio.channels);
        std::mem::replace(&mut self.audio, silent)
    }

    /// Next processed frame, `Ok(None)` once the source is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let raw = match self.peeked.take() {
            Some(frame) => Some(frame),
            None        => self.reader.next_frame()?,
        };
        let Some(mut frame) = raw else {
            return Ok(None);
        };

        let t = if self.fps > 0.0 { self.index as f64 / self.fps } else { 0.0 };
        self.pipeline.process_frame(&mut frame, t, self.duration);
        self.index += 1;
        Ok(Some(frame))
    }

    /// Read everything that is left into memory.
    pub fn collect(mut self) -> Result<MediaStream> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(MediaStream { fps: self.fps, frames, audio: self.audio })
    }
}
