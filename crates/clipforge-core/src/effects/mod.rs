// crates/clipforge-core/src/effects/mod.rs
//
// Effect system for clipforge.
//
// ── Architecture ─────────────────────────────────────────────────────────────
//
//   Layer 1: Kernels  (color.rs, convolve.rs, temporal.rs)
//             Pure algorithms on `Frame` / `AudioBuffer` / `MediaStream`. No
//             knowledge of clips or pipelines.
//
//   Layer 2: `EffectStage`
//             Closed set of transform capabilities. Each variant carries its
//             own parameters and knows which kernel to run.
//
//   Layer 3: `EffectPipeline`
//             Ordered list of stages. `for_clip` builds the fixed default
//             composition used by `Clip::open`; callers may splice in the
//             optional stylize stages with `push` / `insert`.
//
// Two ways to run a pipeline:
//   apply                        : whole in-memory MediaStream, any stages.
//   process_audio + process_frame: export path. Audio once up front, then
//                                  each frame on its own at its output time.
//                                  Needs `is_streamable()` (no Reverse).
//
// Adding an effect:
//   1. Write the kernel in the matching Layer 1 file.
//   2. Add a variant to `EffectStage` and one arm to `apply` / `label`.
//   Clip and the export pipeline need no changes.

pub mod color;
pub mod convolve;
pub mod helpers;
pub mod temporal;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::clip::ClipEffects;
use crate::media_types::{AudioBuffer, Frame, MediaStream};

/// One transform in an effect pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EffectStage {
    /// Playback-rate multiplier (> 0).
    Speed(f64),
    /// Brightness (additive, [-100, 100]), contrast and saturation (multiplicative).
    Color { brightness: f64, contrast: f64, saturation: f64 },
    /// Audio gain.
    Volume(f64),
    /// Fade durations in seconds of output time.
    Fade { fade_in: f64, fade_out: f64 },
    /// Gaussian blur, sigma in pixels.
    Blur { radius: f32 },
    Sharpen,
    Sepia,
    Grayscale,
    Invert,
    /// Temporal reversal.
    Reverse,
}

impl EffectStage {
    pub fn label(&self) -> &'static str {
        match self {
            EffectStage::Speed(_)      => "Speed",
            EffectStage::Color { .. }  => "Color Correction",
            EffectStage::Volume(_)     => "Volume",
            EffectStage::Fade { .. }   => "Fade",
            EffectStage::Blur { .. }   => "Blur",
            EffectStage::Sharpen       => "Sharpen",
            EffectStage::Sepia         => "Sepia",
            EffectStage::Grayscale     => "Black & White",
            EffectStage::Invert        => "Invert",
            EffectStage::Reverse       => "Reverse",
        }
    }

    /// True for stages that transform each frame independently of time.
    pub fn is_per_frame(&self) -> bool {
        matches!(self,
            EffectStage::Color { .. } | EffectStage::Blur { .. } | EffectStage::Sharpen
            | EffectStage::Sepia | EffectStage::Grayscale | EffectStage::Invert)
    }

    /// Apply a per-frame stage to one frame. Stream-level stages are a no-op here.
    pub fn apply_frame(&self, frame: &mut Frame) {
        match self {
            EffectStage::Color { brightness, contrast, saturation } =>
                color::color_correct(frame, *brightness, *contrast, *saturation),
            EffectStage::Blur { radius } => convolve::gaussian_blur(frame, *radius),
            EffectStage::Sharpen         => convolve::sharpen(frame),
            EffectStage::Sepia           => color::sepia(frame),
            EffectStage::Grayscale       => color::grayscale(frame),
            EffectStage::Invert          => color::invert(frame),
            EffectStage::Speed(_)
            | EffectStage::Volume(_)
            | EffectStage::Fade { .. }
            | EffectStage::Reverse => {}
        }
    }

    pub fn apply(&self, stream: &mut MediaStream) {
        match self {
            EffectStage::Speed(speed)                => temporal::change_speed(stream, *speed),
            EffectStage::Volume(gain)                => temporal::scale_volume(&mut stream.audio, *gain),
            EffectStage::Fade { fade_in, fade_out }  => temporal::apply_fades(stream, *fade_in, *fade_out),
            EffectStage::Reverse                     => temporal::reverse(stream),
            per_frame => {
                stream.frames.par_iter_mut().for_each(|f| per_frame.apply_frame(f));
            }
        }
    }
}

/// Ordered list of stages applied front to back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectPipeline {
    stages: Vec<EffectStage>,
}

impl EffectPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default composition for a clip: speed → color → volume → fades.
    ///
    /// Stages whose parameters are neutral are left out entirely, so a clip
    /// with default effects produces an empty pipeline.
    pub fn for_clip(fx: &ClipEffects) -> Self {
        let mut stages = Vec::new();
        if fx.speed != 1.0 {
            stages.push(EffectStage::Speed(fx.speed));
        }
        if fx.has_color_adjustment() {
            stages.push(EffectStage::Color {
                brightness: fx.brightness,
                contrast:   fx.contrast,
                saturation: fx.saturation,
            });
        }
        if fx.volume != 1.0 {
            stages.push(EffectStage::Volume(fx.volume));
        }
        if fx.fade_in > 0.0 || fx.fade_out > 0.0 {
            stages.push(EffectStage::Fade { fade_in: fx.fade_in, fade_out: fx.fade_out });
        }
        Self { stages }
    }

    pub fn push(&mut self, stage: EffectStage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Insert at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, stage: EffectStage) -> &mut Self {
        let i = index.min(self.stages.len());
        self.stages.insert(i, stage);
        self
    }

    pub fn stages(&self) -> &[EffectStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&self, mut stream: MediaStream) -> MediaStream {
        for stage in &self.stages {
            stage.apply(&mut stream);
        }
        stream
    }

    /// Combined playback-rate multiplier of every Speed stage.
    pub fn speed(&self) -> f64 {
        self.stages.iter()
            .filter_map(|s| match s {
                EffectStage::Speed(v) if *v > 0.0 => Some(*v),
                _ => None,
            })
            .product()
    }

    /// True when no stage needs the whole stream at once.
    pub fn is_streamable(&self) -> bool {
        !self.stages.iter().any(|s| matches!(s, EffectStage::Reverse))
    }

    /// Audio half of the pipeline, in stage order. `duration` is the output
    /// length the fades are measured against.
    pub fn process_audio(&self, audio: &mut AudioBuffer, duration: f64) {
        for stage in &self.stages {
            match stage {
                EffectStage::Speed(speed)               => temporal::retime_audio(audio, *speed),
                EffectStage::Volume(gain)               => temporal::scale_volume(audio, *gain),
                EffectStage::Fade { fade_in, fade_out } => temporal::fade_audio(audio, duration, *fade_in, *fade_out),
                EffectStage::Reverse                    => temporal::reverse_audio(audio),
                _ => {}
            }
        }
    }

    /// Video half for one frame shown at output time `t` of a stream lasting
    /// `duration`: per-frame stages and fades, in stage order.
    pub fn process_frame(&self, frame: &mut Frame, t: f64, duration: f64) {
        for stage in &self.stages {
            match stage {
                EffectStage::Fade { fade_in, fade_out } =>
                    temporal::fade_frame(frame, t, duration, *fade_in, *fade_out),
                other => other.apply_frame(frame),
            }
        }
    }

    /// Run only the per-frame stages on a single frame (preview path).
    pub fn apply_frame(&self, frame: &mut Frame) {
        for stage in self.stages.iter().filter(|s| s.is_per_frame()) {
            stage.apply_frame(frame);
        }
    }
}
