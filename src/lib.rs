#![forbid(unsafe_code)]

pub mod chunk;
pub mod driver;
pub mod error;
pub mod highlight;
pub mod process;
pub mod protocol;
pub mod session;
pub mod window;

pub use chunk::{ChunkReader, ReadStatus};
pub use driver::{
    CancelToken, DisplaySink, PixelRect, ProgressState, StreamDriver, StreamEnd, StreamSummary,
};
pub use error::{TilewireError, TilewireResult};
pub use highlight::{BRACKET_ARM, HIGHLIGHT_COLOR, Orientation, Segment, bracket_segments};
pub use process::RendererProcess;
pub use protocol::{
    ByteOrder, Chunk, ChunkHeader, ProtocolDecoder, TileData, TileHighlight, TileRect,
};
pub use session::{RenderConfig, Renderer};
pub use window::{ClippedTile, CropBorder, RenderWindow, extract_pixels};
