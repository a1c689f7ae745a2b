// crates/clipforge-core/src/helpers/geometry.rs
//
// Frame-fitting utilities shared by export compositing and preview.
//
// Every stream on an exported timeline is placed on one canvas. Sources with a
// different size are scaled to fit (aspect preserved) and centred on black.

use crate::media_types::Frame;

/// Largest rect with the source's aspect ratio that fits inside the canvas,
/// centred. Returns `(x, y, w, h)` in canvas pixels.
///
/// ```
/// use clipforge_core::helpers::geometry::fit_rect;
/// // 4:3 into 16:9 → pillarbox
/// assert_eq!(fit_rect(640, 480, 1920, 1080), (240, 0, 1440, 1080));
/// // same size → full canvas
/// assert_eq!(fit_rect(1280, 720, 1280, 720), (0, 0, 1280, 720));
/// ```
pub fn fit_rect(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32, u32, u32) {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return (0, 0, 0, 0);
    }
    let scale = (dst_w as f64 / src_w as f64).min(dst_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, dst_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, dst_h);
    ((dst_w - w) / 2, (dst_h - h) / 2, w, h)
}

/// Round both dimensions down to even values (min 2), as 4:2:0 encoders require.
///
/// ```
/// use clipforge_core::helpers::geometry::even_dimensions;
/// assert_eq!(even_dimensions(1279, 721), (1278, 720));
/// assert_eq!(even_dimensions(1, 1), (2, 2));
/// ```
pub fn even_dimensions(w: u32, h: u32) -> (u32, u32) {
    ((w & !1).max(2), (h & !1).max(2))
}

/// Scale `frame` (nearest neighbour) into a `canvas_w × canvas_h` black canvas,
/// preserving aspect. Frames already at canvas size are returned unchanged.
pub fn letterbox(frame: &Frame, canvas_w: u32, canvas_h: u32) -> Frame {
    if frame.width == canvas_w && frame.height == canvas_h {
        return frame.clone();
    }
    let mut out = Frame::black(canvas_w, canvas_h);
    let (ox, oy, w, h) = fit_rect(frame.width, frame.height, canvas_w, canvas_h);
    if w == 0 || h == 0 {
        return out;
    }

    let cw = canvas_w as usize;
    for y in 0..h {
        let sy = ((y as u64 * frame.height as u64) / h as u64) as u32;
        for x in 0..w {
            let sx  = ((x as u64 * frame.width as u64) / w as u64) as u32;
            let src = (sy as usize * frame.width as usize + sx as usize) * 3;
            let dst = ((oy + y) as usize * cw + (ox + x) as usize) * 3;
            out.data[dst..dst + 3].copy_from_slice(&frame.data[src..src + 3]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_centres_and_pads_black() {
        let src = Frame::filled(2, 2, [200, 100, 50]);
        let out = letterbox(&src, 8, 4);
        // 2x2 → 4x4 centred at x = 2..6
        assert_eq!(out.pixel(0, 0), [0, 0, 0]);
        assert_eq!(out.pixel(7, 3), [0, 0, 0]);
        assert_eq!(out.pixel(2, 0), [200, 100, 50]);
        assert_eq!(out.pixel(5, 3), [200, 100, 50]);
    }

    #[test]
    fn same_size_is_untouched() {
        let src = Frame::filled(3, 3, [1, 2, 3]);
        assert_eq!(letterbox(&src, 3, 3), src);
    }
}
