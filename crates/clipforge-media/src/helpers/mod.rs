// crates/clipforge-media/src/helpers/mod.rs
//
// Internal helper modules for the FFmpeg backend.
// Not re-exported from lib.rs: decode/encode implementation details only.

pub mod seek;
