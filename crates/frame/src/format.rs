//! Pixel formats and their plane layouts.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vidmix_common::error::VidmixError;

use crate::geometry::Size;

/// Pixel format of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, three planes (Y, U, V), chroma halved in both axes.
    #[default]
    Yuv420p,
    /// Packed 32-bit RGB, one plane, bytes in B, G, R, A order.
    Rgb32,
}

/// Layout of one plane of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
    /// Bytes per sample.
    pub bytes_per_sample: u32,
    /// Horizontal subsampling as a power of two.
    pub shift_x: u32,
    /// Vertical subsampling as a power of two.
    pub shift_y: u32,
}

impl PlaneLayout {
    /// Bytes per row (rows are tightly packed).
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_sample as usize
    }

    /// Bytes for the whole plane.
    pub fn len(&self) -> usize {
        self.stride() * self.height as usize
    }
}

impl PixelFormat {
    /// All supported formats.
    pub const ALL: [PixelFormat; 2] = [PixelFormat::Yuv420p, PixelFormat::Rgb32];

    /// Short lowercase name, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Rgb32 => "rgb32",
        }
    }

    /// Plane layouts for a frame of the given size.
    pub fn planes(&self, size: Size) -> Vec<PlaneLayout> {
        match self {
            PixelFormat::Yuv420p => {
                let chroma = PlaneLayout {
                    width: size.w.div_ceil(2),
                    height: size.h.div_ceil(2),
                    bytes_per_sample: 1,
                    shift_x: 1,
                    shift_y: 1,
                };
                vec![
                    PlaneLayout {
                        width: size.w,
                        height: size.h,
                        bytes_per_sample: 1,
                        shift_x: 0,
                        shift_y: 0,
                    },
                    chroma,
                    chroma,
                ]
            }
            PixelFormat::Rgb32 => vec![PlaneLayout {
                width: size.w,
                height: size.h,
                bytes_per_sample: 4,
                shift_x: 0,
                shift_y: 0,
            }],
        }
    }

    /// Total buffer size in bytes for a frame of the given size.
    pub fn buffer_len(&self, size: Size) -> usize {
        self.planes(size).iter().map(PlaneLayout::len).sum()
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = VidmixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yuv420p" | "i420" => Ok(PixelFormat::Yuv420p),
            "rgb32" | "bgra" => Ok(PixelFormat::Rgb32),
            other => Err(VidmixError::invalid_argument(format!(
                "unknown pixel format '{other}'"
            ))),
        }
    }
}

/// An RGB color used for solid fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Studio-range BT.601 conversion.
    pub fn to_yuv(&self) -> (u8, u8, u8) {
        let (r, g, b) = (self.r as i32, self.g as i32, self.b as i32);
        let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
        let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
        let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
        (
            y.clamp(0, 255) as u8,
            u.clamp(0, 255) as u8,
            v.clamp(0, 255) as u8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("yuv420p".parse::<PixelFormat>().unwrap(), PixelFormat::Yuv420p);
        assert_eq!(" RGB32 ".parse::<PixelFormat>().unwrap(), PixelFormat::Rgb32);
        assert!(matches!(
            "nv12".parse::<PixelFormat>(),
            Err(VidmixError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_yuv420p_planes_odd_size() {
        let planes = PixelFormat::Yuv420p.planes(Size::new(5, 3));
        assert_eq!(planes.len(), 3);
        assert_eq!((planes[0].width, planes[0].height), (5, 3));
        assert_eq!((planes[1].width, planes[1].height), (3, 2));
        assert_eq!(PixelFormat::Yuv420p.buffer_len(Size::new(5, 3)), 15 + 6 + 6);
    }

    #[test]
    fn test_rgb32_planes() {
        let planes = PixelFormat::Rgb32.planes(Size::new(4, 2));
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].stride(), 16);
        assert_eq!(planes[0].len(), 32);
    }

    #[test]
    fn test_black_is_studio_black() {
        assert_eq!(Rgb::BLACK.to_yuv(), (16, 128, 128));
        assert_eq!(Rgb::WHITE.to_yuv(), (235, 128, 128));
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&PixelFormat::Rgb32).unwrap();
        assert_eq!(json, "\"rgb32\"");
    }
}
