//! Tile layout for one composite.
//!
//! Layout is computed from participant identities only; no pixels are
//! touched here. [`crate::compose`] executes the resulting plan.

use serde::{Deserialize, Serialize};
use vidmix_frame::{Rect, Size};

/// A registered participant as seen by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant index.
    pub pidx: u32,
    /// Whether the participant shares content rather than a camera feed.
    pub content: bool,
}

/// Layout preferences of the source a composite is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct View {
    /// Participant index of the viewer.
    pub pidx: u32,
    /// Include the viewer's own input.
    pub selfview: bool,
    /// Exclude content participants.
    pub content_hide: bool,
    /// Resolved focus target, if any.
    pub focus: Option<u32>,
    /// Focus target covers the whole composite.
    pub focus_full: bool,
}

impl View {
    /// Whether a participant contributes to this viewer's composite.
    pub fn is_visible(&self, p: &Participant) -> bool {
        if p.pidx == self.pidx && !self.selfview {
            return false;
        }
        if p.content && self.content_hide {
            return false;
        }
        true
    }

    fn is_focus(&self, pidx: u32) -> bool {
        self.focus == Some(pidx)
    }
}

/// How a participant's input is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Blit {
    /// Cover the whole composite (copy when sizes match, else aspect-fit).
    Full,
    /// Aspect-fit into the rectangle.
    Fit(Rect),
    /// Center-crop into the rectangle.
    Crop(Rect),
}

impl Blit {
    /// Destination area of this blit within a composite of `size`.
    pub fn rect(&self, size: Size) -> Rect {
        match self {
            Blit::Full => Rect::full(size),
            Blit::Fit(rect) | Blit::Crop(rect) => *rect,
        }
    }
}

/// One drawing step of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub pidx: u32,
    pub blit: Blit,
}

/// Smallest `r >= 1` with `n <= r * r`.
pub fn calc_rows(n: u32) -> u32 {
    let mut rows: u32 = 1;
    while (rows as u64) * (rows as u64) < n as u64 {
        rows += 1;
    }
    rows
}

/// Plan the composite for `view` over `members` (in registry order).
///
/// Tiles are returned in drawing order: a full-screen focus target first,
/// then every other visible participant. Participants whose tile falls off
/// the picture-in-picture strips are omitted.
pub fn plan<'a>(
    size: Size,
    view: &View,
    members: impl IntoIterator<Item = &'a Participant>,
) -> Vec<Tile> {
    let visible: Vec<&Participant> = members.into_iter().filter(|p| view.is_visible(p)).collect();
    let n = visible.len() as u32;
    let mut tiles = Vec::with_capacity(visible.len());

    if view.focus_full {
        if let Some(target) = visible.iter().find(|p| view.is_focus(p.pidx)) {
            tiles.push(Tile {
                pidx: target.pidx,
                blit: Blit::Full,
            });
        }
    }

    let rows = calc_rows(n);
    let mut idx = 0;

    for p in visible {
        let focus_this = view.is_focus(p.pidx);
        if focus_this && view.focus_full {
            continue;
        }

        if let Some(blit) = place(size, n, rows, idx, view, focus_this) {
            tiles.push(Tile { pidx: p.pidx, blit });
        }

        if !focus_this {
            idx += 1;
        }
    }

    tiles
}

/// Geometry of tile `idx` among `n` visible participants.
fn place(size: Size, n: u32, rows: u32, idx: u32, view: &View, focus_this: bool) -> Option<Blit> {
    let (w, h) = (size.w as u64, size.h as u64);

    if view.focus.is_some() {
        let nmin = if view.focus_full { 12 } else { 6 };
        let n = ((n as u64 + 1).max(nmin) / 2).max(1);

        if focus_this {
            return Some(Blit::Fit(Rect::new(
                0,
                0,
                (w * (n - 1) / n) as u32,
                (h * (n - 1) / n) as u32,
            )));
        }

        let (tw, th) = (w / n, h / n);
        let idx = idx as u64;

        let (x, y) = if idx < n {
            // Right edge, top to bottom
            (w - tw, th * idx)
        } else if idx < n * 2 - 1 {
            // Bottom edge, right to left
            (tw * (n * 2 - 2 - idx), h - th)
        } else {
            return None;
        };

        return Some(Blit::Fit(Rect::new(
            x as u32,
            y as u32,
            tw as u32,
            th as u32,
        )));
    }

    if rows == 1 {
        return Some(Blit::Full);
    }

    if n <= 3 {
        let tw = size.w / n;
        return Some(Blit::Crop(Rect::new(tw * (idx % n), 0, tw, size.h)));
    }

    let (tw, th) = (size.w / rows, size.h / rows);
    Some(Blit::Fit(Rect::new(
        tw * (idx % rows),
        th * (idx / rows),
        tw,
        th,
    )))
}
