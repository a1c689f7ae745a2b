// crates/clipforge-core/src/effects/helpers.rs
//
// Math utilities for effect kernels.
//
// All functions operate on plain f32 or raw bytes. No ffmpeg, no rayon.
//
// Organised into sections:
//   - Clamp
//   - Byte <-> unit conversion
//   - Luma
//   - Fade envelope

// ── Clamp ────────────────────────────────────────────────────────────────────

/// Clamp `v` to [0.0, 1.0].
#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

// ── Byte <-> unit conversion ─────────────────────────────────────────────────

/// Map a byte channel value to [0.0, 1.0].
#[inline]
pub fn to_unit(v: u8) -> f32 {
    v as f32 / 255.0
}

/// Map a [0.0, 1.0] value back to a byte, rounding to nearest.
///
/// Rounding (rather than truncating) makes `from_unit(to_unit(v)) == v` for
/// every byte, so neutral adjustments are bit-exact.
#[inline]
pub fn from_unit(v: f32) -> u8 {
    (clamp01(v) * 255.0).round() as u8
}

/// Round and saturate a value already in byte scale.
#[inline]
pub fn saturate_byte(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ── Luma ─────────────────────────────────────────────────────────────────────

/// Rec.601 luma weights, used by saturation and grayscale.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

#[inline]
pub fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_WEIGHTS[0] + rgb[1] * LUMA_WEIGHTS[1] + rgb[2] * LUMA_WEIGHTS[2]
}

// ── Fade envelope ────────────────────────────────────────────────────────────

/// Gain in [0, 1] applied at time `t` of a stream lasting `duration` seconds.
///
/// Fade-in ramps up from 0 over `[0, fade_in)`. Fade-out ramps down to 0 over
/// the last `fade_out` seconds, but never starts before the fade-in has
/// finished, so the two windows cannot overlap.
///
/// ```
/// use clipforge_core::effects::helpers::fade_gain;
/// assert_eq!(fade_gain(0.0, 10.0, 2.0, 0.0), 0.0);
/// assert_eq!(fade_gain(1.0, 10.0, 2.0, 0.0), 0.5);
/// assert_eq!(fade_gain(5.0, 10.0, 2.0, 2.0), 1.0);
/// assert_eq!(fade_gain(9.0, 10.0, 0.0, 2.0), 0.5);
/// ```
pub fn fade_gain(t: f64, duration: f64, fade_in: f64, fade_out: f64) -> f32 {
    if fade_in > 0.0 && t < fade_in {
        return (t / fade_in).clamp(0.0, 1.0) as f32;
    }
    if fade_out > 0.0 {
        let out_start = (duration - fade_out).max(fade_in);
        if t >= out_start {
            let window = duration - out_start;
            if window <= 0.0 { return 0.0; }
            return ((duration - t) / window).clamp(0.0, 1.0) as f32;
        }
    }
    1.0
}
