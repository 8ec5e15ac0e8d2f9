//! Scaling blits between frames of the same pixel format.
//!
//! All blits sample nearest-neighbour and clip the destination rectangle to
//! the destination frame. Pixels of the destination outside the drawn
//! region are left untouched.

use vidmix_common::error::{VidmixError, VidmixResult};

use crate::frame::VideoFrame;
use crate::geometry::{Rect, Size};

/// Scale all of `src` into `rect`, preserving its aspect ratio.
///
/// The image is centered in `rect`; the bars are not painted.
pub fn blit_aspect(dst: &mut VideoFrame, src: &VideoFrame, rect: Rect) -> VidmixResult<()> {
    check_format(dst, src)?;
    let target = rect.fit_aspect(src.size());
    scale_region(dst, target, src, Rect::full(src.size()));
    Ok(())
}

/// Scale the centered part of `src` with the aspect ratio of `rect` so it
/// covers `rect` completely.
pub fn blit_center(dst: &mut VideoFrame, src: &VideoFrame, rect: Rect) -> VidmixResult<()> {
    check_format(dst, src)?;
    let crop = rect.crop_source(src.size());
    scale_region(dst, rect, src, crop);
    Ok(())
}

/// Cover the whole destination: a plain copy when the sizes match, an
/// aspect-fit otherwise.
pub fn blit_full(dst: &mut VideoFrame, src: &VideoFrame) -> VidmixResult<()> {
    if dst.has_size(src.size()) {
        dst.copy_from(src)
    } else {
        let rect = Rect::full(dst.size());
        blit_aspect(dst, src, rect)
    }
}

fn check_format(dst: &VideoFrame, src: &VideoFrame) -> VidmixResult<()> {
    if dst.format() != src.format() {
        return Err(VidmixError::format_mismatch(format!(
            "cannot blit {} into {}",
            src.format(),
            dst.format()
        )));
    }
    Ok(())
}

/// Nearest-neighbour scale of `src_rect` of `src` onto `dst_rect` of `dst`,
/// plane by plane.
fn scale_region(dst: &mut VideoFrame, dst_rect: Rect, src: &VideoFrame, src_rect: Rect) {
    let dst_rect = dst_rect.clip_to(dst.size());
    let src_rect = src_rect.clip_to(src.size());
    if dst_rect.is_empty() || src_rect.is_empty() {
        return;
    }

    for (dplane, splane) in dst.planes_mut().iter_mut().zip(src.planes()) {
        let layout = *dplane.layout();
        let bps = layout.bytes_per_sample as usize;

        let d = dst_rect
            .subsampled(layout.shift_x, layout.shift_y)
            .clip_to(Size::new(layout.width, layout.height));
        let s = src_rect
            .subsampled(layout.shift_x, layout.shift_y)
            .clip_to(Size::new(splane.layout().width, splane.layout().height));
        if d.is_empty() || s.is_empty() {
            continue;
        }

        // Source column offsets are identical for every row
        let columns: Vec<usize> = (0..d.w as u64)
            .map(|i| (s.x as u64 + i * s.w as u64 / d.w as u64) as usize * bps)
            .collect();

        let dstride = dplane.stride();
        let sstride = splane.stride();
        let sdata = splane.data();
        let ddata = dplane.data_mut();

        for j in 0..d.h as u64 {
            let sy = (s.y as u64 + j * s.h as u64 / d.h as u64) as usize;
            let srow = &sdata[sy * sstride..(sy + 1) * sstride];
            let drow_start = (d.y as usize + j as usize) * dstride + d.x as usize * bps;
            let drow = &mut ddata[drow_start..drow_start + d.w as usize * bps];

            for (out, &sx) in drow.chunks_exact_mut(bps).zip(&columns) {
                out.copy_from_slice(&srow[sx..sx + bps]);
            }
        }
    }
}
