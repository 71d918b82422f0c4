use crate::window::ClippedTile;

/// Default bracket arm length in pixels; arms shrink to fit smaller tiles.
pub const BRACKET_ARM: u32 = 5;
/// Opaque highlight color, RGBA.
pub const HIGHLIGHT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// One solid-color, 1-pixel-thick line of a corner bracket, in display
/// space. `(x, y)` is the segment's bottom-left pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub x: u32,
    pub y: u32,
    pub len: u32,
    pub orientation: Orientation,
    pub color: [f32; 4],
}

impl Segment {
    pub fn width(&self) -> u32 {
        match self.orientation {
            Orientation::Horizontal => self.len,
            Orientation::Vertical => 1,
        }
    }

    pub fn height(&self) -> u32 {
        match self.orientation {
            Orientation::Horizontal => 1,
            Orientation::Vertical => self.len,
        }
    }
}

/// Corner brackets for a tile in progress: one horizontal and one vertical
/// arm per corner, eight segments total, clamped to the rectangle's extent.
pub fn bracket_segments(clip: &ClippedTile, arm: u32) -> Vec<Segment> {
    let x0 = clip.dest_x0;
    let y0 = clip.dest_y0;
    let x1 = clip.dest_x1();
    let y1 = clip.dest_y1();

    let w = arm.min(clip.take_x);
    let h = arm.min(clip.take_y);

    let hline = |x, y, len| Segment {
        x,
        y,
        len,
        orientation: Orientation::Horizontal,
        color: HIGHLIGHT_COLOR,
    };
    let vline = |x, y, len| Segment {
        x,
        y,
        len,
        orientation: Orientation::Vertical,
        color: HIGHLIGHT_COLOR,
    };

    vec![
        // Top-left corner.
        hline(x0, y1, w),
        vline(x0, y1 + 1 - h, h),
        // Top-right corner.
        hline(x1 + 1 - w, y1, w),
        vline(x1, y1 + 1 - h, h),
        // Bottom-left corner.
        hline(x0, y0, w),
        vline(x0, y0, h),
        // Bottom-right corner.
        hline(x1 + 1 - w, y0, w),
        vline(x1, y0, h),
    ]
}
