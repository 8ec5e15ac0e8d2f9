//! vidmix Mixer Engine
//!
//! Produces a personalized composite video frame for every participant, each
//! at that participant's own frame rate:
//!
//! - **Registry** ([`Mixer`]): enabled sources in participant-index order,
//!   the shared pixel format and every participant's latest input frame
//! - **Sources** ([`Source`]): output buffer, preferences, focus and a
//!   scheduling thread per participant
//! - **Layout** ([`layout`]): strip, grid and picture-in-picture tiling
//! - **Composition** ([`compose`]): executes a layout against the inputs
//!
//! ```text
//! producer --put--> [registry inputs] <--compose-- source loop --on_frame--> consumer
//! ```
//!
//! Producers and consumers never block each other for longer than one
//! composition pass.

pub mod compose;
mod focus;
pub mod layout;
pub mod registry;
mod scheduler;
pub mod source;

pub use compose::{compose, pick_content, InputFrames};
pub use layout::{calc_rows, plan, Blit, Participant, Tile, View};
pub use registry::Mixer;
pub use source::{FrameHandler, Source, SourceBuilder, SourceStats};

pub use vidmix_common::error::{VidmixError, VidmixResult};
pub use vidmix_frame::{PixelFormat, Rect, Rgb, Size, VideoFrame};
