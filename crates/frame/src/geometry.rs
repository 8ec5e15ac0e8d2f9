//! Frame sizes and pixel rectangles.

use serde::{Deserialize, Serialize};

/// Dimensions of a frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    /// Number of pixels.
    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// A rectangle in pixel coordinates; `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle covering a whole frame.
    pub const fn full(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            w: size.w,
            h: size.h,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Intersect with the bounds of a frame.
    pub fn clip_to(&self, size: Size) -> Rect {
        let x = self.x.min(size.w);
        let y = self.y.min(size.h);
        Rect {
            x,
            y,
            w: self.right().min(size.w) - x,
            h: self.bottom().min(size.h) - y,
        }
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Largest rectangle with the aspect ratio of `content` that fits in
    /// this one, centered (letterbox or pillarbox).
    pub fn fit_aspect(&self, content: Size) -> Rect {
        if content.is_empty() || self.is_empty() {
            return Rect::new(self.x, self.y, 0, 0);
        }

        let (cw, ch) = (content.w as u64, content.h as u64);
        let (rw, rh) = (self.w as u64, self.h as u64);

        let (w, h) = if cw * rh > ch * rw {
            // Content is wider than the box
            (rw, rw * ch / cw)
        } else {
            (rh * cw / ch, rh)
        };

        Rect {
            x: self.x + ((rw - w) / 2) as u32,
            y: self.y + ((rh - h) / 2) as u32,
            w: w as u32,
            h: h as u32,
        }
    }

    /// Centered region of `content` that has this rectangle's aspect ratio.
    pub fn crop_source(&self, content: Size) -> Rect {
        if content.is_empty() || self.is_empty() {
            return Rect::new(0, 0, 0, 0);
        }

        let (cw, ch) = (content.w as u64, content.h as u64);
        let (rw, rh) = (self.w as u64, self.h as u64);

        let (w, h) = if cw * rh > ch * rw {
            // Content is wider than the box: trim left and right
            ((ch * rw / rh).max(1), ch)
        } else {
            (cw, (cw * rh / rw).max(1))
        };

        Rect {
            x: ((cw - w) / 2) as u32,
            y: ((ch - h) / 2) as u32,
            w: w as u32,
            h: h as u32,
        }
    }

    /// Project onto a plane subsampled by `1 << shift_x` horizontally and
    /// `1 << shift_y` vertically. Partially covered samples are included.
    pub fn subsampled(&self, shift_x: u32, shift_y: u32) -> Rect {
        let x0 = self.x >> shift_x;
        let y0 = self.y >> shift_y;
        let x1 = (self.right() as u64 + (1u64 << shift_x) - 1) >> shift_x;
        let y1 = (self.bottom() as u64 + (1u64 << shift_y) - 1) >> shift_y;
        Rect {
            x: x0,
            y: y0,
            w: (x1 as u32).saturating_sub(x0),
            h: (y1 as u32).saturating_sub(y0),
        }
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_to() {
        let r = Rect::new(600, 400, 100, 100).clip_to(Size::new(640, 480));
        assert_eq!(r, Rect::new(600, 400, 40, 80));

        let outside = Rect::new(700, 10, 50, 50).clip_to(Size::new(640, 480));
        assert!(outside.is_empty());
    }

    #[test]
    fn test_fit_aspect_pillarbox() {
        // 4:3 content into a 16:9 box
        let r = Rect::new(0, 0, 1280, 720).fit_aspect(Size::new(640, 480));
        assert_eq!(r, Rect::new(160, 0, 960, 720));
    }

    #[test]
    fn test_fit_aspect_letterbox() {
        // 16:9 content into a square box
        let r = Rect::new(100, 100, 400, 400).fit_aspect(Size::new(1280, 720));
        assert_eq!(r, Rect::new(100, 187, 400, 225));
    }

    #[test]
    fn test_fit_aspect_same_ratio() {
        let r = Rect::new(10, 20, 320, 240).fit_aspect(Size::new(640, 480));
        assert_eq!(r, Rect::new(10, 20, 320, 240));
    }

    #[test]
    fn test_crop_source_wide_content() {
        // Tall strip (320x480) cut out of 640x480 content: keep the middle
        let crop = Rect::new(0, 0, 320, 480).crop_source(Size::new(640, 480));
        assert_eq!(crop, Rect::new(160, 0, 320, 480));
    }

    #[test]
    fn test_crop_source_tall_content() {
        let crop = Rect::new(0, 0, 400, 200).crop_source(Size::new(400, 400));
        assert_eq!(crop, Rect::new(0, 100, 400, 200));
    }

    #[test]
    fn test_subsampled() {
        let r = Rect::new(3, 5, 10, 7).subsampled(1, 1);
        assert_eq!(r, Rect::new(1, 2, 6, 4));

        let same = Rect::new(3, 5, 10, 7).subsampled(0, 0);
        assert_eq!(same, Rect::new(3, 5, 10, 7));
    }

    #[test]
    fn test_contains_rect() {
        let outer = Rect::new(0, 0, 100, 100);
        assert!(outer.contains_rect(&Rect::new(10, 10, 90, 90)));
        assert!(!outer.contains_rect(&Rect::new(10, 10, 91, 90)));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fit_aspect_stays_inside(
                x in 0u32..1000, y in 0u32..1000,
                w in 1u32..2000, h in 1u32..2000,
                cw in 1u32..4000, ch in 1u32..4000,
            ) {
                let rect = Rect::new(x, y, w, h);
                let fitted = rect.fit_aspect(Size::new(cw, ch));
                prop_assert!(rect.contains_rect(&fitted));
                // One dimension always spans the box
                prop_assert!(fitted.w == w || fitted.h == h);
            }

            #[test]
            fn crop_source_stays_inside_content(
                w in 1u32..2000, h in 1u32..2000,
                cw in 1u32..4000, ch in 1u32..4000,
            ) {
                let content = Size::new(cw, ch);
                let crop = Rect::new(0, 0, w, h).crop_source(content);
                prop_assert!(Rect::full(content).contains_rect(&crop));
                prop_assert!(crop.w == cw || crop.h == ch);
            }
        }
    }
}
