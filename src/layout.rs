//! Tiling layouts.
//!
//! [`arrange`] is a pure function: given how many tiled clients there are,
//! their gaps, the usable screen area and the workspace's master ratio it
//! returns one rectangle per client, in list order.  Applying those
//! rectangles to windows is the caller's job.
//!
//! Every layout first splits the area into *cells* that partition it
//! exactly, then insets each cell by the client's gap and border.  Because
//! the inset rectangle always lies inside its cell, no two results overlap.

use crate::client::Rect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of layouts a workspace can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// Every client gets the whole area; only the focused one is visible.
    Zoom,
    /// Clients share the area in a near-square grid.
    Grid,
    /// Master column on the left, the rest stacked in rows on the right.
    #[default]
    HStack,
    /// Master row on top, the rest side by side underneath.
    VStack,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 4] = [
        LayoutKind::Zoom,
        LayoutKind::Grid,
        LayoutKind::HStack,
        LayoutKind::VStack,
    ];

    /// Look a layout up by its numeric tag.
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The next layout, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// The previous layout, wrapping around.
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Whether the master ratio has a visible effect.
    pub fn is_stack(self) -> bool {
        matches!(self, LayoutKind::HStack | LayoutKind::VStack)
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutKind::Zoom => write!(f, "zoom"),
            LayoutKind::Grid => write!(f, "grid"),
            LayoutKind::HStack => write!(f, "hstack"),
            LayoutKind::VStack => write!(f, "vstack"),
        }
    }
}

/// Inputs shared by every client in one [`arrange`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub kind: LayoutKind,
    /// Screen minus the bar.
    pub area: Rect,
    pub master_ratio: f64,
    pub border: u16,
    /// Apply client gaps in the zoom layout too.
    pub zoom_gap: bool,
}

/// Exclusive lower bound of the master ratio.
pub const MIN_MASTER_RATIO: f64 = 0.1;
/// Exclusive upper bound of the master ratio.
pub const MAX_MASTER_RATIO: f64 = 1.0;

/// Apply a percentage delta to a master ratio.
///
/// Returns `None` if the result would leave the open interval
/// `(MIN_MASTER_RATIO, MAX_MASTER_RATIO)`.
pub fn adjust_master_ratio(ratio: f64, percent: i32) -> Option<f64> {
    let next = ratio + f64::from(percent) / 100.0;
    if next >= MAX_MASTER_RATIO || next <= MIN_MASTER_RATIO {
        None
    } else {
        Some(next)
    }
}

/// Compute one rectangle per tiled client.
///
/// `gaps[i]` is the gap of the `i`-th tiled client; the output has the same
/// length and order.
pub fn arrange(params: &LayoutParams, gaps: &[u16]) -> Vec<Rect> {
    let n = gaps.len();
    if n == 0 {
        return Vec::new();
    }
    let cells = match params.kind {
        LayoutKind::Zoom => vec![params.area; n],
        LayoutKind::Grid if n == 1 => vec![params.area],
        LayoutKind::Grid => grid_cells(params.area, n),
        LayoutKind::HStack => hstack_cells(params.area, params.master_ratio, n),
        LayoutKind::VStack => vstack_cells(params.area, params.master_ratio, n),
    };
    let zoomed = params.kind == LayoutKind::Zoom || (params.kind == LayoutKind::Grid && n == 1);
    cells
        .into_iter()
        .zip(gaps)
        .map(|(cell, &gap)| {
            let gap = if zoomed && !params.zoom_gap { 0 } else { gap };
            inset(cell, gap, params.border)
        })
        .collect()
}

/// Shrink a cell by `gap` on every side and by the border on both axes.
fn inset(cell: Rect, gap: u16, border: u16) -> Rect {
    let shrink = gap.saturating_mul(2).saturating_add(border.saturating_mul(2));
    Rect {
        x: cell.x.saturating_add(gap),
        y: cell.y.saturating_add(gap),
        w: cell.w.saturating_sub(shrink),
        h: cell.h.saturating_sub(shrink),
    }
}

/// Start and length of slice `i` when `total` pixels are cut into `parts`.
///
/// Slice boundaries are `i * total / parts`, so the slices partition the
/// whole range with no gaps and no overlaps.
fn slice(start: u16, total: u16, i: usize, parts: usize) -> (u16, u16) {
    let total = total as usize;
    let from = i * total / parts;
    let to = (i + 1) * total / parts;
    (start + from as u16, (to - from) as u16)
}

fn master_extent(total: u16, ratio: f64) -> u16 {
    ((f64::from(total) * ratio) as u16).min(total)
}

fn hstack_cells(area: Rect, ratio: f64, n: usize) -> Vec<Rect> {
    let master_w = master_extent(area.w, ratio);
    let mut cells = Vec::with_capacity(n);
    cells.push(Rect::new(area.x, area.y, master_w, area.h));
    let stack = n - 1;
    for i in 0..stack {
        let (y, h) = slice(area.y, area.h, i, stack);
        cells.push(Rect::new(area.x + master_w, y, area.w - master_w, h));
    }
    cells
}

fn vstack_cells(area: Rect, ratio: f64, n: usize) -> Vec<Rect> {
    let master_h = master_extent(area.h, ratio);
    let mut cells = Vec::with_capacity(n);
    cells.push(Rect::new(area.x, area.y, area.w, master_h));
    let stack = n - 1;
    for i in 0..stack {
        let (x, w) = slice(area.x, area.w, i, stack);
        cells.push(Rect::new(x, area.y + master_h, w, area.h - master_h));
    }
    cells
}

/// Column-major grid.  The trailing columns take one extra row when `n`
/// does not divide evenly.
fn grid_cells(area: Rect, n: usize) -> Vec<Rect> {
    let cols = (1..=n).find(|c| c * c >= n).unwrap_or(n);
    let base_rows = n / cols;
    // Columns with index >= `tall_from` hold one extra client.
    let tall_from = cols - n % cols;
    let mut cells = Vec::with_capacity(n);
    for col in 0..cols {
        let rows = if col >= tall_from { base_rows + 1 } else { base_rows };
        let (x, w) = slice(area.x, area.w, col, cols);
        for row in 0..rows {
            let (y, h) = slice(area.y, area.h, row, rows);
            cells.push(Rect::new(x, y, w, h));
        }
    }
    cells
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    const AREA: Rect = Rect::new(0, 20, 1920, 1060);

    fn params(kind: LayoutKind) -> LayoutParams {
        LayoutParams {
            kind,
            area: AREA,
            master_ratio: 0.6,
            border: 0,
            zoom_gap: true,
        }
    }

    fn assert_disjoint(rects: &[Rect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    fn assert_inside(rects: &[Rect], area: Rect) {
        for r in rects {
            assert!(r.x >= area.x && r.y >= area.y, "{r:?} starts outside {area:?}");
            assert!(r.x as u32 + r.w as u32 <= area.x as u32 + area.w as u32, "{r:?} too wide");
            assert!(r.y as u32 + r.h as u32 <= area.y as u32 + area.h as u32, "{r:?} too tall");
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        for kind in LayoutKind::ALL {
            assert!(arrange(&params(kind), &[]).is_empty());
        }
    }

    #[test]
    fn zoom_gives_everyone_the_full_area() {
        let rects = arrange(&params(LayoutKind::Zoom), &[0, 0, 0]);
        assert_eq!(rects, vec![AREA; 3]);
    }

    #[test]
    fn zoom_gap_is_optional() {
        let mut p = params(LayoutKind::Zoom);
        p.zoom_gap = false;
        assert_eq!(arrange(&p, &[10]), vec![AREA]);
        p.zoom_gap = true;
        assert_eq!(arrange(&p, &[10]), vec![Rect::new(10, 30, 1900, 1040)]);
    }

    #[test]
    fn hstack_produces_one_rect_per_client() {
        for k in 1..=7 {
            let rects = arrange(&params(LayoutKind::HStack), &vec![0; k]);
            assert_eq!(rects.len(), k);
        }
    }

    #[test]
    fn hstack_master_width_follows_ratio() {
        for k in 1..=5 {
            let rects = arrange(&params(LayoutKind::HStack), &vec![0; k]);
            let expected = 1920.0 * 0.6;
            assert!((f64::from(rects[0].w) - expected).abs() <= 1.0, "k={k}: {:?}", rects[0]);
            assert_eq!(rects[0].h, AREA.h);
            assert_eq!((rects[0].x, rects[0].y), (AREA.x, AREA.y));
        }
    }

    #[test]
    fn hstack_rows_split_the_right_column() {
        let rects = arrange(&params(LayoutKind::HStack), &[0, 0, 0, 0]);
        let master_w = rects[0].w;
        let total: u32 = rects[1..].iter().map(|r| r.h as u32).sum();
        assert_eq!(total, AREA.h as u32);
        for r in &rects[1..] {
            assert_eq!(r.x, master_w);
            assert_eq!(r.w, AREA.w - master_w);
        }
        assert_disjoint(&rects);
    }

    #[test]
    fn hstack_with_gaps_never_overlaps() {
        let mut p = params(LayoutKind::HStack);
        p.border = 2;
        let rects = arrange(&p, &[5, 0, 12, 7, 3]);
        assert_eq!(rects.len(), 5);
        assert_disjoint(&rects);
        assert_inside(&rects, AREA);
    }

    #[test]
    fn vstack_master_height_follows_ratio() {
        let rects = arrange(&params(LayoutKind::VStack), &[0, 0, 0]);
        assert_eq!(rects[0].h, (1060.0 * 0.6) as u16);
        assert_eq!(rects[0].w, AREA.w);
        assert_eq!(rects[1].y, rects[2].y);
        assert_eq!(rects[1].w + rects[2].w, AREA.w);
        assert_disjoint(&rects);
    }

    #[test]
    fn grid_of_one_is_zoom() {
        assert_eq!(arrange(&params(LayoutKind::Grid), &[0]), vec![AREA]);
    }

    #[test]
    fn grid_of_five_uses_three_columns() {
        let rects = arrange(&params(LayoutKind::Grid), &[0; 5]);
        assert_eq!(rects.len(), 5);
        let mut xs: Vec<u16> = rects.iter().map(|r| r.x).collect();
        xs.dedup();
        assert_eq!(xs.len(), 3);
        assert_disjoint(&rects);
        assert_inside(&rects, AREA);
        let area: u32 = rects.iter().map(|r| r.w as u32 * r.h as u32).sum();
        assert_eq!(area, AREA.w as u32 * AREA.h as u32);
    }

    #[test]
    fn oversized_gap_collapses_instead_of_overflowing() {
        let rects = arrange(&params(LayoutKind::HStack), &[u16::MAX, 0]);
        assert_eq!(rects[0].w, 0);
        assert_eq!(rects[0].h, 0);
    }

    #[test]
    fn ratio_adjustment_respects_bounds() {
        let r = adjust_master_ratio(0.6, 5).unwrap();
        assert!((r - 0.65).abs() < 1e-9);
        assert!(adjust_master_ratio(0.6, 40).is_none());
        assert!(adjust_master_ratio(0.6, 50).is_none());
        assert!(adjust_master_ratio(0.6, -50).is_none());
        assert!(adjust_master_ratio(0.6, -55).is_none());
        assert!(adjust_master_ratio(0.6, -45).is_some());
    }

    #[test]
    fn layout_cycle_wraps() {
        assert_eq!(LayoutKind::VStack.next(), LayoutKind::Zoom);
        assert_eq!(LayoutKind::Zoom.prev(), LayoutKind::VStack);
        assert_eq!(LayoutKind::from_index(2), Some(LayoutKind::HStack));
        assert_eq!(LayoutKind::from_index(4), None);
        assert_eq!(LayoutKind::from_index(-1), None);
    }
}
