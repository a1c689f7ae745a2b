// crates/clipforge-core/src/helpers/mod.rs
//
// Small pure utilities shared by clipforge-core and clipforge-media.

pub mod geometry;
pub mod time;
