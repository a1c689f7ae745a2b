// crates/clipforge-core/src/effects/temporal.rs
//
// Time-dependent stages: speed, volume, fades, reverse.
//
// Each stage has an audio half working on a whole `AudioBuffer` and, where it
// touches pixels, a per-frame half taking the frame's output timestamp. The
// `MediaStream` wrappers run both for in-memory streams; export calls the
// halves separately so video never has to be held whole.

use rayon::prelude::*;

use crate::effects::color;
use crate::effects::helpers::fade_gain;
use crate::media_types::{AudioBuffer, Frame, MediaStream};

// ── Speed ─────────────────────────────────────────────────────────────────────

/// Retime by `speed`: frame rate is multiplied, duration divided.
pub fn change_speed(stream: &mut MediaStream, speed: f64) {
    if speed <= 0.0 || speed == 1.0 { return; }
    stream.fps *= speed;
    retime_audio(&mut stream.audio, speed);
}

/// Resample by nearest-sample picking, so pitch moves with speed.
pub fn retime_audio(audio: &mut AudioBuffer, speed: f64) {
    if speed <= 0.0 || speed == 1.0 { return; }

    let ch      = audio.channels.max(1) as usize;
    let n_in    = audio.frame_count();
    if n_in == 0 { return; }
    let n_out   = ((n_in as f64) / speed).round() as usize;
    let src     = std::mem::take(&mut audio.samples);
    let mut out = Vec::with_capacity(n_out * ch);
    for i in 0..n_out {
        let j = ((i as f64 * speed) as usize).min(n_in - 1);
        out.extend_from_slice(&src[j * ch..j * ch + ch]);
    }
    audio.samples = out;
}

// ── Volume ────────────────────────────────────────────────────────────────────

/// Multiply every sample by `gain`, clipped to [-1, 1].
pub fn scale_volume(audio: &mut AudioBuffer, gain: f64) {
    let g = gain as f32;
    for s in audio.samples.iter_mut() {
        *s = (*s * g).clamp(-1.0, 1.0);
    }
}

// ── Fades ─────────────────────────────────────────────────────────────────────

/// Linear fade from/to black (video) and silence (audio).
pub fn apply_fades(stream: &mut MediaStream, fade_in: f64, fade_out: f64) {
    if fade_in <= 0.0 && fade_out <= 0.0 { return; }

    let duration = stream.duration();
    let fps      = stream.fps;
    if fps > 0.0 {
        stream.frames.par_iter_mut().enumerate().for_each(|(i, frame)| {
            fade_frame(frame, i as f64 / fps, duration, fade_in, fade_out);
        });
    }
    fade_audio(&mut stream.audio, duration, fade_in, fade_out);
}

/// Darken one frame shown at `t` seconds of a stream lasting `duration`.
pub fn fade_frame(frame: &mut Frame, t: f64, duration: f64, fade_in: f64, fade_out: f64) {
    let gain = fade_gain(t, duration, fade_in, fade_out);
    if gain < 1.0 {
        color::scale(frame, gain);
    }
}

pub fn fade_audio(audio: &mut AudioBuffer, duration: f64, fade_in: f64, fade_out: f64) {
    if fade_in <= 0.0 && fade_out <= 0.0 { return; }

    let rate = audio.sample_rate as f64;
    let ch   = audio.channels.max(1) as usize;
    if rate <= 0.0 { return; }
    for (j, chunk) in audio.samples.chunks_mut(ch).enumerate() {
        let gain = fade_gain(j as f64 / rate, duration, fade_in, fade_out);
        for s in chunk { *s *= gain; }
    }
}

// ── Reverse ───────────────────────────────────────────────────────────────────

/// Play the stream backwards: frame order and audio sample frames reversed.
pub fn reverse(stream: &mut MediaStream) {
    stream.frames.reverse();
    reverse_audio(&mut stream.audio);
}

pub fn reverse_audio(audio: &mut AudioBuffer) {
    let ch = audio.channels.max(1) as usize;
    let reversed: Vec<f32> = audio.samples
        .chunks(ch)
        .rev()
        .flatten()
        .copied()
        .collect();
    audio.samples = reversed;
}
