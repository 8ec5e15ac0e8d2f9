//! vidmix Frame Model
//!
//! Raw video frames and the operations the mixer needs from them:
//! - **Formats:** planar YUV 4:2:0 and packed 32-bit RGB
//! - **Geometry:** frame sizes and pixel rectangles
//! - **Frames:** allocation, solid fills, and same-size copies
//! - **Conversion:** aspect-fit and center-crop blits into a rectangle
//!
//! Blits use nearest-neighbour sampling; both frames must share a pixel
//! format. Coordinates are in luma pixels, chroma planes are addressed by
//! shifting with the format's subsampling.

pub mod convert;
pub mod format;
pub mod frame;
pub mod geometry;

pub use convert::*;
pub use format::*;
pub use frame::*;
pub use geometry::*;
