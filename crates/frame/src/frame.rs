//! Raw video frames.

use vidmix_common::error::{VidmixError, VidmixResult};

use crate::format::{PixelFormat, PlaneLayout, Rgb};
use crate::geometry::Size;

/// One plane of pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    layout: PlaneLayout,
    data: Vec<u8>,
}

impl Plane {
    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes of a single sample.
    pub fn sample(&self, x: u32, y: u32) -> &[u8] {
        let bps = self.layout.bytes_per_sample as usize;
        let offset = y as usize * self.stride() + x as usize * bps;
        &self.data[offset..offset + bps]
    }
}

/// A video frame: pixel format, dimensions, and tightly packed planes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    format: PixelFormat,
    size: Size,
    planes: Vec<Plane>,
}

impl VideoFrame {
    /// Allocate a zeroed frame.
    ///
    /// Fails with `InvalidArgument` for an empty size and `OutOfMemory` if
    /// the pixel buffer cannot be reserved.
    pub fn new(format: PixelFormat, size: Size) -> VidmixResult<Self> {
        if size.is_empty() {
            return Err(VidmixError::invalid_argument(format!(
                "frame size must be non-zero, got {size}"
            )));
        }

        let mut planes = Vec::new();
        for layout in format.planes(size) {
            let len = layout.len();
            let mut data = Vec::new();
            data.try_reserve_exact(len).map_err(|e| {
                VidmixError::out_of_memory(format!("{format} {size} plane of {len} bytes: {e}"))
            })?;
            data.resize(len, 0);
            planes.push(Plane { layout, data });
        }

        Ok(Self {
            format,
            size,
            planes,
        })
    }

    /// Wrap existing pixel data, one byte vector per plane.
    ///
    /// Planes must be tightly packed (stride equals width times bytes per
    /// sample) and match the plane count and lengths of `format` at `size`.
    pub fn from_planes(format: PixelFormat, size: Size, data: Vec<Vec<u8>>) -> VidmixResult<Self> {
        if size.is_empty() {
            return Err(VidmixError::invalid_argument(format!(
                "frame size must be non-zero, got {size}"
            )));
        }

        let layouts = format.planes(size);
        if layouts.len() != data.len() {
            return Err(VidmixError::invalid_argument(format!(
                "{format} needs {} planes, got {}",
                layouts.len(),
                data.len()
            )));
        }

        let mut planes = Vec::with_capacity(layouts.len());
        for (index, (layout, data)) in layouts.into_iter().zip(data).enumerate() {
            if data.len() != layout.len() {
                return Err(VidmixError::size_mismatch(format!(
                    "{format} {size} plane {index} needs {} bytes, got {}",
                    layout.len(),
                    data.len()
                )));
            }
            planes.push(Plane { layout, data });
        }

        Ok(Self {
            format,
            size,
            planes,
        })
    }

    /// Allocate a frame filled with a solid color.
    pub fn filled(format: PixelFormat, size: Size, color: Rgb) -> VidmixResult<Self> {
        let mut frame = Self::new(format, size)?;
        frame.fill(color);
        Ok(frame)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Whether this frame has exactly the given dimensions.
    pub fn has_size(&self, size: Size) -> bool {
        self.size == size
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    /// Mutable planes for writing pixel data in place. Plane layouts are
    /// fixed by the frame's format and size.
    pub fn planes_mut(&mut self) -> &mut [Plane] {
        &mut self.planes
    }

    /// Fill the whole frame with one color.
    pub fn fill(&mut self, color: Rgb) {
        match self.format {
            PixelFormat::Yuv420p => {
                let (y, u, v) = color.to_yuv();
                for (plane, value) in self.planes.iter_mut().zip([y, u, v]) {
                    plane.data.fill(value);
                }
            }
            PixelFormat::Rgb32 => {
                let pixel = [color.b, color.g, color.r, 0xff];
                for chunk in self.planes[0].data.chunks_exact_mut(4) {
                    chunk.copy_from_slice(&pixel);
                }
            }
        }
    }

    /// Clear to black.
    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    /// Copy pixel data from a frame of identical format and size.
    pub fn copy_from(&mut self, src: &VideoFrame) -> VidmixResult<()> {
        if self.format != src.format {
            return Err(VidmixError::format_mismatch(format!(
                "cannot copy {} into {}",
                src.format, self.format
            )));
        }
        if self.size != src.size {
            return Err(VidmixError::size_mismatch(format!(
                "cannot copy {} into {}",
                src.size, self.size
            )));
        }

        for (dst, src) in self.planes.iter_mut().zip(&src.planes) {
            dst.data.copy_from_slice(&src.data);
        }
        Ok(())
    }

    /// Color of the pixel at `(x, y)`, as raw samples per plane.
    ///
    /// For YUV formats this returns `[y, u, v]`; for RGB32 `[r, g, b]`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        match self.format {
            PixelFormat::Yuv420p => [
                self.planes[0].sample(x, y)[0],
                self.planes[1].sample(x >> 1, y >> 1)[0],
                self.planes[2].sample(x >> 1, y >> 1)[0],
            ],
            PixelFormat::Rgb32 => {
                let s = self.planes[0].sample(x, y);
                [s[2], s[1], s[0]]
            }
        }
    }

    /// Whether the pixel at `(x, y)` matches `color` after conversion to
    /// this frame's format.
    pub fn pixel_is(&self, x: u32, y: u32, color: Rgb) -> bool {
        let expected = match self.format {
            PixelFormat::Yuv420p => {
                let (y, u, v) = color.to_yuv();
                [y, u, v]
            }
            PixelFormat::Rgb32 => [color.r, color.g, color.b],
        };
        self.pixel(x, y) == expected
    }
}
