use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::TilewireResult;
use crate::highlight::{self, BRACKET_ARM};
use crate::process::RendererProcess;
use crate::protocol::{Chunk, ProtocolDecoder, TileData, TileHighlight};
use crate::window::{self, RenderWindow};

/// Cooperative stop flag shared with whoever requested the render. Polled
/// once per chunk; it cannot interrupt a blocking read, so a stuck child is
/// freed by the forced termination at loop exit instead.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One rectangle handed to the display sink: `width * height * channels`
/// interleaved samples, row-major, row 0 at the visual bottom. `(x, y)` is
/// window-relative in display space (bottom-left origin).
#[derive(Clone, Debug, PartialEq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

/// Receives finished pixel rectangles and highlight segments. Each call is a
/// complete begin/commit unit; implementations need no external locking.
pub trait DisplaySink {
    fn commit(&mut self, rect: &PixelRect) -> TilewireResult<()>;
}

/// Cumulative render progress, owned by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub rendered_pixels: u64,
    pub total_pixels: u64,
}

impl ProgressState {
    pub fn fraction(&self) -> f32 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        (self.rendered_pixels as f64 / self.total_pixels as f64).min(1.0) as f32
    }
}

/// How the streaming loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// The renderer closed its stream at a chunk boundary.
    Completed,
    /// Cancellation was requested and observed.
    Canceled,
    /// The stream closed mid-chunk; the renderer died or was killed.
    Truncated { detail: String },
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Truncated { detail } => write!(f, "ended early ({detail})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    pub end: StreamEnd,
    pub rendered_pixels: u64,
}

/// The control loop: pulls chunks until the stream ends, cancellation is
/// requested, or decoding fails, delivering clipped tiles and highlight
/// brackets to the display sink and fractions to the progress callback.
///
/// Whatever way the loop exits, the attached renderer process is terminated
/// before the summary is returned.
pub struct StreamDriver<'a, R> {
    decoder: ProtocolDecoder<R>,
    window: RenderWindow,
    progress: ProgressState,
    cancel: CancelToken,
    process: Option<RendererProcess>,
    sink: &'a mut dyn DisplaySink,
    on_progress: Option<Box<dyn FnMut(f32) + 'a>>,
}

impl<'a, R: Read> StreamDriver<'a, R> {
    pub fn new(
        decoder: ProtocolDecoder<R>,
        window: RenderWindow,
        total_pixels: u64,
        sink: &'a mut dyn DisplaySink,
    ) -> Self {
        Self {
            decoder,
            window,
            progress: ProgressState {
                rendered_pixels: 0,
                total_pixels,
            },
            cancel: CancelToken::new(),
            process: None,
            sink,
            on_progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attaches the child process so the driver can guarantee its
    /// termination on every exit path.
    pub fn with_process(mut self, process: RendererProcess) -> Self {
        self.process = Some(process);
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(f32) + 'a) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Runs the loop to completion.
    ///
    /// Truncation is not propagated as an error: the process is killed and
    /// the summary says the render ended early, so the caller can surface a
    /// single terminal message. Sink and I/O failures do propagate.
    #[tracing::instrument(skip(self))]
    pub fn run(mut self) -> TilewireResult<StreamSummary> {
        let outcome = self.stream();
        self.shutdown();

        match outcome {
            Ok(end) => Ok(StreamSummary {
                end,
                rendered_pixels: self.progress.rendered_pixels,
            }),
            Err(err) if err.is_truncation() => {
                tracing::warn!(%err, "render stream ended early");
                Ok(StreamSummary {
                    end: StreamEnd::Truncated {
                        detail: err.to_string(),
                    },
                    rendered_pixels: self.progress.rendered_pixels,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn stream(&mut self) -> TilewireResult<StreamEnd> {
        loop {
            if self.cancel.is_canceled() {
                return Ok(StreamEnd::Canceled);
            }

            match self.decoder.next_chunk()? {
                None => return Ok(StreamEnd::Completed),
                Some(Chunk::TileData(tile)) => self.handle_tile_data(tile)?,
                Some(Chunk::TileHighlight(tile)) => self.handle_tile_highlight(tile)?,
                Some(Chunk::Unknown { kind, size }) => {
                    tracing::debug!(kind, size, "skipped unknown chunk");
                }
            }
        }
    }

    fn handle_tile_data(&mut self, tile: TileData) -> TilewireResult<()> {
        tracing::debug!(
            x = tile.rect.x,
            y = tile.rect.y,
            w = tile.rect.width,
            h = tile.rect.height,
            channels = tile.channels,
            "received tile"
        );

        let Some(clip) = self.window.clip(&tile.rect) else {
            return Ok(());
        };

        let data = window::extract_pixels(&tile, &clip)?;
        self.sink.commit(&PixelRect {
            x: clip.dest_x0,
            y: clip.dest_y0,
            width: clip.take_x,
            height: clip.take_y,
            channels: tile.channels,
            data,
        })?;

        self.progress.rendered_pixels += u64::from(clip.take_x) * u64::from(clip.take_y);
        let fraction = self.progress.fraction();
        if let Some(callback) = self.on_progress.as_mut() {
            callback(fraction);
        }
        Ok(())
    }

    fn handle_tile_highlight(&mut self, tile: TileHighlight) -> TilewireResult<()> {
        let Some(clip) = self.window.clip(&tile.rect) else {
            return Ok(());
        };

        for segment in highlight::bracket_segments(&clip, BRACKET_ARM) {
            let mut data = Vec::with_capacity(segment.len as usize * 4);
            for _ in 0..segment.len {
                data.extend_from_slice(&segment.color);
            }
            self.sink.commit(&PixelRect {
                x: segment.x,
                y: segment.y,
                width: segment.width(),
                height: segment.height(),
                channels: 4,
                data,
            })?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(mut process) = self.process.take()
            && let Err(err) = process.terminate()
        {
            tracing::warn!(%err, "failed to terminate renderer process");
        }
    }
}
