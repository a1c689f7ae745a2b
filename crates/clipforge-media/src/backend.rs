// crates/clipforge-media/src/backend.rs
//
// FFmpeg implementations of the core media traits.
//
// The decode/encode/probe modules speak anyhow; this is the one place their
// errors are mapped onto EditError. Decode failures become MediaLoad, and
// encode failures become Encode. EditErrors raised by the encoder's input
// (Cancelled, or a clip failing mid-stream) pass through unchanged.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use clipforge_core::error::{EditError, Result};
use clipforge_core::media_types::{
    EncodeInput, Frame, FrameReader, MediaInfo, MediaSource, MediaStream,
    SourceRange, StreamEncoder, VecFrames,
};
use clipforge_core::quality::EncodeParams;

use crate::decode::VideoReader;
use crate::probe::DEFAULT_FPS;
use crate::{decode, encode, probe};

/// Initialise libav* once per process. Safe to call more than once.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_the_third::init()?;
    ffmpeg_the_third::util::log::set_level(ffmpeg_the_third::util::log::Level::Error);
    Ok(())
}

/// Decodes sources in-process with libavformat/libavcodec.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegMedia;

impl MediaSource for FfmpegMedia {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        probe::probe(path).map_err(|e| EditError::media_load(path, format!("{e:#}")))
    }

    fn read_range(&self, path: &Path, start: f64, end: f64) -> Result<MediaStream> {
        self.open_range(path, start, end)?.into_stream()
    }

    fn open_range(&self, path: &Path, start: f64, end: f64) -> Result<SourceRange> {
        let range = decode::open_range(path, start, end)
            .map_err(|e| EditError::media_load(path, format!("{e:#}")))?;
        let video: Box<dyn FrameReader> = match range.video {
            Some(reader) => Box::new(FfmpegFrames { path: path.to_path_buf(), reader }),
            None         => Box::new(VecFrames::new(DEFAULT_FPS, Vec::new())),
        };
        Ok(SourceRange { video, audio: range.audio })
    }

    fn frame_at(&self, path: &Path, timestamp: f64) -> Result<Frame> {
        decode::decode_frame_at(path, timestamp)
            .map_err(|e| EditError::media_load(path, format!("{e:#}")))
    }
}

/// A decoding VideoReader behind the FrameReader seam.
struct FfmpegFrames {
    path:   PathBuf,
    reader: VideoReader,
}

impl FrameReader for FfmpegFrames {
    fn fps(&self) -> f64 {
        self.reader.fps()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.reader.next_frame()
            .map_err(|e| EditError::media_load(&self.path, format!("{e:#}")))
    }
}

/// H.264 + AAC writer.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegEncoder;

impl StreamEncoder for FfmpegEncoder {
    fn encode(
        &self,
        input:  &mut dyn EncodeInput,
        output: &Path,
        params: &EncodeParams,
        cancel: &AtomicBool,
    ) -> Result<()> {
        encode::encode_stream(input, output, params, cancel).map_err(|e| {
            match e.downcast::<EditError>() {
                Ok(edit) => edit,
                Err(e)   => EditError::encode(output, format!("{e:#}")),
            }
        })
    }
}
