use crate::error::{TilewireError, TilewireResult};
use crate::protocol::{TileData, TileRect};

/// Crop border as normalized fractions of the full resolution, each in
/// `[0, 1]` with `min <= max` per axis. Fractions are measured from the
/// display origin (bottom-left), so the Y axis flips when the border is
/// resolved against renderer image space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropBorder {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl CropBorder {
    pub fn validate(&self) -> TilewireResult<()> {
        let in_range = |v: f32| (0.0..=1.0).contains(&v);
        if !in_range(self.min_x)
            || !in_range(self.min_y)
            || !in_range(self.max_x)
            || !in_range(self.max_y)
        {
            return Err(TilewireError::validation(
                "crop border fractions must lie in [0, 1]",
            ));
        }
        if self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(TilewireError::validation(
                "crop border min must not exceed max",
            ));
        }
        Ok(())
    }
}

/// The sub-rectangle of the image actually being rendered, in image pixel
/// coordinates with inclusive bounds. Validated once at construction; a
/// degenerate or out-of-range window never reaches the streaming loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderWindow {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl RenderWindow {
    /// Window covering the full `width x height` image.
    pub fn full(width: u32, height: u32) -> TilewireResult<Self> {
        Self::from_bounds(
            0,
            0,
            i64::from(width) - 1,
            i64::from(height) - 1,
            width,
            height,
        )
    }

    /// Window for a normalized crop border. The border's bottom-up fractions
    /// are converted to the renderer's top-down pixel rows here, once.
    pub fn with_border(width: u32, height: u32, border: CropBorder) -> TilewireResult<Self> {
        border.validate()?;
        let w = f64::from(width);
        let h = f64::from(height);
        let min_x = (f64::from(border.min_x) * w) as i64;
        let min_y = i64::from(height) - (f64::from(border.max_y) * h) as i64;
        let max_x = (f64::from(border.max_x) * w) as i64 - 1;
        let max_y = i64::from(height) - (f64::from(border.min_y) * h) as i64 - 1;
        Self::from_bounds(min_x, min_y, max_x, max_y, width, height)
    }

    /// Explicit inclusive bounds, checked against the image extent.
    pub fn from_bounds(
        min_x: i64,
        min_y: i64,
        max_x: i64,
        max_y: i64,
        width: u32,
        height: u32,
    ) -> TilewireResult<Self> {
        if width == 0 || height == 0 {
            return Err(TilewireError::validation("image extent must be non-zero"));
        }
        let ok_x = 0 <= min_x && min_x <= max_x && max_x < i64::from(width);
        let ok_y = 0 <= min_y && min_y <= max_y && max_y < i64::from(height);
        if !ok_x || !ok_y {
            return Err(TilewireError::validation(format!(
                "render window [{min_x}, {max_x}] x [{min_y}, {max_y}] is degenerate or outside {width}x{height}"
            )));
        }
        Ok(Self {
            min_x: min_x as u32,
            min_y: min_y as u32,
            max_x: max_x as u32,
            max_y: max_y as u32,
        })
    }

    pub fn min_x(&self) -> u32 {
        self.min_x
    }

    pub fn min_y(&self) -> u32 {
        self.min_y
    }

    pub fn max_x(&self) -> u32 {
        self.max_x
    }

    pub fn max_y(&self) -> u32 {
        self.max_y
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Intersects a renderer-space tile with the window.
    ///
    /// Returns `None` when the tile lies fully outside. Otherwise the result
    /// carries the source offsets to skip inside the tile's row-major data
    /// and the destination rectangle in display space, whose origin is
    /// bottom-left: the source's bottom row (`iy1`) becomes the lowest
    /// destination row.
    pub fn clip(&self, tile: &TileRect) -> Option<ClippedTile> {
        if tile.width == 0 || tile.height == 0 {
            return None;
        }

        let (tx0, ty0) = (u64::from(tile.x), u64::from(tile.y));
        let tx1 = tx0 + u64::from(tile.width) - 1;
        let ty1 = ty0 + u64::from(tile.height) - 1;
        let (min_x, min_y) = (u64::from(self.min_x), u64::from(self.min_y));
        let (max_x, max_y) = (u64::from(self.max_x), u64::from(self.max_y));

        if tx0 > max_x || tx1 < min_x || ty0 > max_y || ty1 < min_y {
            return None;
        }

        let ix0 = tx0.max(min_x);
        let iy0 = ty0.max(min_y);
        let ix1 = tx1.min(max_x);
        let iy1 = ty1.min(max_y);

        Some(ClippedTile {
            skip_x: (ix0 - tx0) as u32,
            skip_y: (iy0 - ty0) as u32,
            take_x: (ix1 - ix0 + 1) as u32,
            take_y: (iy1 - iy0 + 1) as u32,
            dest_x0: (ix0 - min_x) as u32,
            dest_y0: (max_y - iy1) as u32,
        })
    }
}

/// Result of clipping a tile against the render window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClippedTile {
    /// Columns to skip at the left of the incoming tile.
    pub skip_x: u32,
    /// Rows to skip at the top of the incoming tile.
    pub skip_y: u32,
    /// Clipped width.
    pub take_x: u32,
    /// Clipped height.
    pub take_y: u32,
    /// Left edge in display space, window-relative.
    pub dest_x0: u32,
    /// Bottom edge in display space, window-relative.
    pub dest_y0: u32,
}

impl ClippedTile {
    /// Right edge in display space, inclusive.
    pub fn dest_x1(&self) -> u32 {
        self.dest_x0 + self.take_x - 1
    }

    /// Top edge in display space, inclusive.
    pub fn dest_y1(&self) -> u32 {
        self.dest_y0 + self.take_y - 1
    }
}

/// Copies the clipped region out of a tile's samples, reversing row order so
/// destination row 0 is the visual bottom. Channels stay interleaved.
pub fn extract_pixels(tile: &TileData, clip: &ClippedTile) -> TilewireResult<Vec<f32>> {
    let channels = tile.channels as usize;
    let stride = tile.rect.width as usize * channels;
    let expected = tile.rect.height as usize * stride;
    if tile.samples.len() != expected {
        return Err(TilewireError::protocol(format!(
            "tile carries {} samples, header implies {expected}",
            tile.samples.len()
        )));
    }

    let take_x = clip.take_x as usize;
    let take_y = clip.take_y as usize;
    let skip_x = clip.skip_x as usize;
    let skip_y = clip.skip_y as usize;

    let mut out = Vec::with_capacity(take_x * take_y * channels);
    for row in (0..take_y).rev() {
        let start = (skip_y + row) * stride + skip_x * channels;
        out.extend_from_slice(&tile.samples[start..start + take_x * channels]);
    }
    Ok(out)
}
