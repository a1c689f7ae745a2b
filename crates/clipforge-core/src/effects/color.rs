// crates/clipforge-core/src/effects/color.rs
//
// Per-pixel colour kernels on packed RGB24 frames.
//
// `color_correct` is the default-path adjustment; sepia, grayscale and invert
// are the optional stylize stages. Every kernel mutates the frame in place and
// is called once per frame from `EffectStage::apply_frame`.

use crate::effects::helpers::{clamp01, from_unit, luma, saturate_byte, to_unit, LUMA_WEIGHTS};
use crate::media_types::Frame;

/// Sepia tone matrix, rows produce R, G, B from the input (R, G, B).
pub const SEPIA_MATRIX: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Brightness, contrast, saturation, in that fixed order.
///
/// Works in normalized [0, 1] space with a clip after every step:
///   1. `v + brightness / 100`
///   2. `(v - 0.5) * contrast + 0.5`
///   3. `luma + (v - luma) * saturation`
pub fn color_correct(frame: &mut Frame, brightness: f64, contrast: f64, saturation: f64) {
    let b = (brightness / 100.0) as f32;
    let c = contrast as f32;
    let s = saturation as f32;

    for px in frame.data.chunks_exact_mut(3) {
        let mut rgb = [to_unit(px[0]), to_unit(px[1]), to_unit(px[2])];

        for v in &mut rgb { *v = clamp01(*v + b); }
        for v in &mut rgb { *v = clamp01((*v - 0.5) * c + 0.5); }

        let l = luma(rgb);
        for v in &mut rgb { *v = clamp01(l + (*v - l) * s); }

        px[0] = from_unit(rgb[0]);
        px[1] = from_unit(rgb[1]);
        px[2] = from_unit(rgb[2]);
    }
}

pub fn sepia(frame: &mut Frame) {
    for px in frame.data.chunks_exact_mut(3) {
        let rgb = [px[0] as f32, px[1] as f32, px[2] as f32];
        for (out, row) in px.iter_mut().zip(SEPIA_MATRIX.iter()) {
            *out = saturate_byte(row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]);
        }
    }
}

pub fn grayscale(frame: &mut Frame) {
    for px in frame.data.chunks_exact_mut(3) {
        let l = px[0] as f32 * LUMA_WEIGHTS[0]
            + px[1] as f32 * LUMA_WEIGHTS[1]
            + px[2] as f32 * LUMA_WEIGHTS[2];
        let g = saturate_byte(l);
        px.fill(g);
    }
}

pub fn invert(frame: &mut Frame) {
    for v in frame.data.iter_mut() {
        *v = 255 - *v;
    }
}

/// Multiply every channel by `gain` ∈ [0, 1]. Used by the fade stage.
pub fn scale(frame: &mut Frame, gain: f32) {
    if gain >= 1.0 { return; }
    for v in frame.data.iter_mut() {
        *v = saturate_byte(*v as f32 * gain);
    }
}
