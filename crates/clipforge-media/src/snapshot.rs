// crates/clipforge-media/src/snapshot.rs
//
// Write a preview frame to disk as an 8-bit RGB PNG.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use clipforge_core::media_types::Frame;

pub fn save_png(frame: &Frame, dest: &Path) -> Result<()> {
    ensure!(frame.width > 0 && frame.height > 0, "cannot save an empty frame");

    let file = File::create(dest).with_context(|| format!("create '{}'", dest.display()))?;
    let w    = &mut BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.data)?;

    log::info!("[media] PNG saved → {}", dest.display());
    Ok(())
}
