//! In-memory media doubles shared by the export and worker tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use clipforge_core::clip::Clip;
use clipforge_core::error::{EditError, Result};
use clipforge_core::media_types::{
    AudioBuffer, EncodeInput, Frame, FrameReader, MediaInfo, MediaSource, MediaStream, SourceRange,
    StreamEncoder,
};
use clipforge_core::quality::EncodeParams;
use clipforge_core::timeline::Timeline;

pub const FPS:  f64 = 10.0;
pub const RATE: u32 = 100;

/// Ten-second sources at 10 fps, 4x2 frames. `broken.mp4` fails to open;
/// `truncated.mp4` opens but its decoder fails after three frames;
/// `empty.mp4` decodes to nothing.
pub struct Synthetic;

impl MediaSource for Synthetic {
    fn probe(&self, _path: &Path) -> Result<MediaInfo> {
        Ok(MediaInfo { duration: 10.0, fps: FPS, width: 4, height: 2, has_audio: true })
    }

    fn read_range(&self, path: &Path, start: f64, end: f64) -> Result<MediaStream> {
        if path.ends_with("broken.mp4") {
            return Err(EditError::media_load(path, "corrupt header"));
        }
        if path.ends_with("empty.mp4") {
            return Ok(MediaStream { fps: FPS, frames: Vec::new(), audio: AudioBuffer::silent(RATE, 2) });
        }
        let first   = (start * FPS).round() as usize;
        let last    = (end * FPS).round() as usize;
        let n_audio = ((end - start) * RATE as f64).round() as usize;
        Ok(MediaStream {
            fps:    FPS,
            frames: (first..last).map(|i| Frame::filled(4, 2, [i as u8; 3])).collect(),
            audio:  AudioBuffer { sample_rate: RATE, channels: 2, samples: vec![0.25; n_audio * 2] },
        })
    }

    fn open_range(&self, path: &Path, start: f64, end: f64) -> Result<SourceRange> {
        if path.ends_with("truncated.mp4") {
            return Ok(SourceRange {
                video: Box::new(Truncated { path: path.to_path_buf(), left: 3 }),
                audio: AudioBuffer::silent(RATE, 2),
            });
        }
        Ok(self.read_range(path, start, end)?.into_range())
    }

    fn frame_at(&self, _path: &Path, t: f64) -> Result<Frame> {
        Ok(Frame::filled(4, 2, [(t * FPS) as u8; 3]))
    }
}

struct Truncated {
    path: PathBuf,
    left: usize,
}

impl FrameReader for Truncated {
    fn fps(&self) -> f64 {
        FPS
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.left == 0 {
            return Err(EditError::media_load(&self.path, "invalid NAL unit"));
        }
        self.left -= 1;
        Ok(Some(Frame::black(4, 2)))
    }
}

/// Pull every frame, as a real encoder does. Returns how many there were.
fn drain(input: &mut dyn EncodeInput) -> Result<usize> {
    let mut n = 0;
    while input.next_frame()?.is_some() {
        n += 1;
    }
    Ok(n)
}

/// Pulls every frame, writes one byte per frame and remembers what it saw:
/// frame count, duration and the path it wrote to.
#[derive(Default)]
pub struct Recording {
    pub last: Mutex<Option<(usize, f64, PathBuf)>>,
}

impl StreamEncoder for Recording {
    fn encode(&self, input: &mut dyn EncodeInput, output: &Path, _: &EncodeParams, _: &AtomicBool) -> Result<()> {
        let frames = drain(input)?;
        fs::write(output, vec![0u8; frames]).map_err(|e| EditError::io(output, e))?;
        *self.last.lock() = Some((frames, frames as f64 / input.fps(), output.to_path_buf()));
        Ok(())
    }
}

/// Writes a partial file, then fails.
pub struct Failing;

impl StreamEncoder for Failing {
    fn encode(&self, _: &mut dyn EncodeInput, output: &Path, _: &EncodeParams, _: &AtomicBool) -> Result<()> {
        fs::write(output, b"partial").map_err(|e| EditError::io(output, e))?;
        Err(EditError::encode(output, "codec exploded"))
    }
}

/// Writes a partial file, then waits for either `release` or the cancel
/// flag. Polls like a real encoder checking once per frame.
#[derive(Default)]
pub struct Gated {
    pub release: Arc<AtomicBool>,
}

impl StreamEncoder for Gated {
    fn encode(&self, _: &mut dyn EncodeInput, output: &Path, _: &EncodeParams, cancel: &AtomicBool) -> Result<()> {
        fs::write(output, b"partial").map_err(|e| EditError::io(output, e))?;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(EditError::Cancelled);
            }
            if self.release.load(Ordering::Relaxed) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Writes a partial file, then panics like a backend bug would.
pub struct Panicking;

impl StreamEncoder for Panicking {
    fn encode(&self, _: &mut dyn EncodeInput, output: &Path, _: &EncodeParams, _: &AtomicBool) -> Result<()> {
        fs::write(output, b"partial").map_err(|e| EditError::io(output, e))?;
        panic!("codec bug");
    }
}

pub fn clip(name: &str, start: f64, trim: (f64, f64)) -> Clip {
    let mut c = Clip::create(Path::new(name), start, &Synthetic).unwrap();
    c.trim(trim.0, trim.1).unwrap();
    c
}

pub fn timeline(clips: Vec<Clip>) -> Timeline {
    let mut t = Timeline::new();
    for c in clips {
        t.add(c).unwrap();
    }
    t
}

/// Every entry in `dir`, sorted.
pub fn entries(dir: &Path) -> Vec<PathBuf> {
    let mut v: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
    v.sort();
    v
}
