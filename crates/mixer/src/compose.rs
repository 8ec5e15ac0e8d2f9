//! Composition pass: executes a layout plan against the input buffers.
//!
//! Called with the registry lock held, so the set of participants and
//! their input buffers form a consistent snapshot for the whole pass.

use std::collections::HashMap;
use std::sync::Arc;

use vidmix_frame::{blit_aspect, blit_center, blit_full, VideoFrame};

use crate::layout::{plan, Blit, Participant, View};

/// Input buffers keyed by participant index.
pub type InputFrames = HashMap<u32, Arc<VideoFrame>>;

/// Compose the personalized frame for `view` into `out`.
///
/// Returns the number of tiles drawn. Participants without an input buffer
/// leave their tile black.
pub fn compose<'a>(
    out: &mut VideoFrame,
    view: &View,
    members: impl IntoIterator<Item = &'a Participant>,
    inputs: &InputFrames,
) -> usize {
    out.clear();

    let tiles = plan(out.size(), view, members);
    let mut drawn = 0;

    for tile in tiles {
        let Some(input) = inputs.get(&tile.pidx) else {
            continue;
        };

        let result = match tile.blit {
            Blit::Full => blit_full(out, input),
            Blit::Fit(rect) => blit_aspect(out, input, rect),
            Blit::Crop(rect) => blit_center(out, input, rect),
        };

        match result {
            Ok(()) => drawn += 1,
            Err(e) => {
                // Output buffer allocated before a format change
                tracing::debug!(
                    viewer = view.pidx,
                    pidx = tile.pidx,
                    error = %e,
                    "Skipping tile"
                );
            }
        }
    }

    drawn
}

/// Content forwarding: the input of the first other content participant
/// that has one.
pub fn pick_content<'a>(
    pidx: u32,
    members: impl IntoIterator<Item = &'a Participant>,
    inputs: &InputFrames,
) -> Option<Arc<VideoFrame>> {
    members
        .into_iter()
        .filter(|p| p.content && p.pidx != pidx)
        .find_map(|p| inputs.get(&p.pidx).cloned())
}

#[cfg(test)]
mod tests {
    use vidmix_frame::{PixelFormat, Rgb, Size};

    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);
    const GREEN: Rgb = Rgb::new(0, 255, 0);
    const BLUE: Rgb = Rgb::new(0, 0, 255);

    fn participant(pidx: u32) -> Participant {
        Participant {
            pidx,
            content: false,
        }
    }

    fn input(color: Rgb, size: Size) -> Arc<VideoFrame> {
        Arc::new(VideoFrame::filled(PixelFormat::Rgb32, size, color).unwrap())
    }

    fn viewer(pidx: u32) -> View {
        View {
            pidx,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_strips_center_cropped() {
        let members = [participant(1), participant(2), participant(3)];
        let mut inputs = InputFrames::new();
        inputs.insert(1, input(RED, Size::new(640, 480)));
        inputs.insert(2, input(GREEN, Size::new(640, 480)));
        inputs.insert(3, input(BLUE, Size::new(640, 480)));

        let mut out = VideoFrame::filled(PixelFormat::Rgb32, Size::new(640, 480), RED).unwrap();
        let drawn = compose(&mut out, &viewer(1), &members, &inputs);

        assert_eq!(drawn, 2);
        // Cropped strips cover the full height, no letterbox bars
        assert!(out.pixel_is(0, 0, GREEN));
        assert!(out.pixel_is(319, 479, GREEN));
        assert!(out.pixel_is(320, 0, BLUE));
        assert!(out.pixel_is(639, 479, BLUE));
    }

    #[test]
    fn test_grid_tiles_letterboxed() {
        let members: Vec<Participant> = (1..=4).map(participant).collect();
        let mut inputs = InputFrames::new();
        for p in &members {
            // Wide inputs letterboxed into 4:3 tiles
            inputs.insert(p.pidx, input(RED, Size::new(320, 120)));
        }

        let mut out = VideoFrame::new(PixelFormat::Rgb32, Size::new(640, 480)).unwrap();
        let drawn = compose(&mut out, &viewer(99), &members, &inputs);

        assert_eq!(drawn, 4);
        // Tile (0,0,320,240) holds a 320x120 image at rows 60..180
        assert!(out.pixel_is(10, 10, Rgb::BLACK));
        assert!(out.pixel_is(10, 100, RED));
        assert!(out.pixel_is(330, 250, Rgb::BLACK));
        assert!(out.pixel_is(330, 400, RED));
        assert!(out.pixel_is(330, 470, Rgb::BLACK));
    }

    #[test]
    fn test_missing_input_leaves_tile_black() {
        let members = [participant(1), participant(2)];
        let mut inputs = InputFrames::new();
        inputs.insert(2, input(BLUE, Size::new(100, 100)));

        let mut out = VideoFrame::filled(PixelFormat::Rgb32, Size::new(200, 100), RED).unwrap();
        let drawn = compose(&mut out, &viewer(99), &members, &inputs);

        assert_eq!(drawn, 1);
        assert!(out.pixel_is(50, 50, Rgb::BLACK));
        assert!(out.pixel_is(150, 50, BLUE));
    }

    #[test]
    fn test_focus_full_background() {
        let members = [participant(1), participant(2)];
        let mut inputs = InputFrames::new();
        inputs.insert(1, input(RED, Size::new(1200, 600)));
        inputs.insert(2, input(BLUE, Size::new(1200, 600)));

        let view = View {
            focus: Some(1),
            focus_full: true,
            ..viewer(99)
        };
        let mut out = VideoFrame::new(PixelFormat::Rgb32, Size::new(1200, 600)).unwrap();
        compose(&mut out, &view, &members, &inputs);

        // Target copied over the whole frame, one 200x100 thumbnail top right
        assert!(out.pixel_is(0, 0, RED));
        assert!(out.pixel_is(999, 599, RED));
        assert!(out.pixel_is(1100, 50, BLUE));
        assert!(out.pixel_is(1100, 150, RED));
    }

    #[test]
    fn test_format_mismatch_skips_tile() {
        let members = [participant(1)];
        let mut inputs = InputFrames::new();
        inputs.insert(1, input(RED, Size::new(64, 64)));

        let mut out = VideoFrame::new(PixelFormat::Yuv420p, Size::new(64, 64)).unwrap();
        assert_eq!(compose(&mut out, &viewer(99), &members, &inputs), 0);
        assert!(out.pixel_is(0, 0, Rgb::BLACK));
    }

    #[test]
    fn test_pick_content_skips_self_and_empty() {
        let members = [
            Participant {
                pidx: 1,
                content: true,
            },
            Participant {
                pidx: 2,
                content: true,
            },
            Participant {
                pidx: 3,
                content: true,
            },
        ];
        let mut inputs = InputFrames::new();
        inputs.insert(1, input(RED, Size::new(8, 8)));
        inputs.insert(3, input(BLUE, Size::new(8, 8)));

        let picked = pick_content(1, &members, &inputs).unwrap();
        assert!(picked.pixel_is(0, 0, BLUE));

        let picked = pick_content(2, &members, &inputs).unwrap();
        assert!(picked.pixel_is(0, 0, RED));

        let nothing = pick_content(1, &members[..2], &inputs);
        assert!(nothing.is_none());
    }
}
