//! Data model shared by the RISE analysis service crates.

pub mod analysis;
pub mod types;
