// crates/clipforge-core/src/effects/convolve.rs
//
// Spatial kernels: separable gaussian blur and a fixed 3×3 sharpen.
// Edge pixels are handled by clamping sample coordinates into the frame.

use crate::effects::helpers::saturate_byte;
use crate::media_types::Frame;

/// High-pass sharpen kernel (sums to 1, so flat areas are unchanged).
pub const SHARPEN_KERNEL: [[f32; 3]; 3] = [
    [-1.0, -1.0, -1.0],
    [-1.0,  9.0, -1.0],
    [-1.0, -1.0, -1.0],
];

/// Normalised 1-D gaussian weights for `sigma`, covering ±3σ.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (sigma * 3.0).ceil().max(1.0) as i32;
    let two_s2 = 2.0 * sigma * sigma;
    let mut k: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / two_s2).exp())
        .collect();
    let sum: f32 = k.iter().sum();
    for w in &mut k { *w /= sum; }
    k
}

/// Gaussian blur with `sigma = radius`. A non-positive radius is a no-op.
pub fn gaussian_blur(frame: &mut Frame, radius: f32) {
    if radius <= 0.0 || frame.width == 0 || frame.height == 0 { return; }

    let kernel = gaussian_kernel(radius);
    let half   = (kernel.len() / 2) as i64;
    let w      = frame.width  as i64;
    let h      = frame.height as i64;

    // Horizontal pass into a float scratch buffer, vertical pass back to bytes.
    let mut tmp = vec![0f32; frame.data.len()];
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = (x + k as i64 - half).clamp(0, w - 1);
                    acc += weight * frame.data[((y * w + sx) * 3 + c) as usize] as f32;
                }
                tmp[((y * w + x) * 3 + c) as usize] = acc;
            }
        }
    }
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = (y + k as i64 - half).clamp(0, h - 1);
                    acc += weight * tmp[((sy * w + x) * 3 + c) as usize];
                }
                frame.data[((y * w + x) * 3 + c) as usize] = saturate_byte(acc);
            }
        }
    }
}

pub fn sharpen(frame: &mut Frame) {
    if frame.width == 0 || frame.height == 0 { return; }

    let w   = frame.width  as i64;
    let h   = frame.height as i64;
    let src = frame.data.clone();

    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0.0;
                for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                    let sy = (y + ky as i64 - 1).clamp(0, h - 1);
                    for (kx, weight) in row.iter().enumerate() {
                        let sx = (x + kx as i64 - 1).clamp(0, w - 1);
                        acc += weight * src[((sy * w + sx) * 3 + c) as usize] as f32;
                    }
                }
                frame.data[((y * w + x) * 3 + c) as usize] = saturate_byte(acc);
            }
        }
    }
}
