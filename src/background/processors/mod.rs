//! Processors module - domain-specific processing logic
//!
//! - `image`: decoding, width-driven scaling and re-encoding of raster images

pub mod image;
