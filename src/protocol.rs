use std::io::Read;

use crate::chunk::{ChunkReader, ReadStatus};
use crate::error::{TilewireError, TilewireResult};

/// Chunk kind for a finished tile with pixel data.
pub const CHUNK_TILE_DATA: u32 = 1;
/// Chunk kind for a tile-in-progress highlight, header only.
pub const CHUNK_TILE_HIGHLIGHT: u32 = 2;

/// Byte order of the wire stream, applied to every header field and to the
/// f32 pixel samples. The renderer writes little-endian; `Big` exists for
/// captures produced by big-endian builds. This is an explicit part of the
/// protocol configuration, never inferred from the host platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn decode_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    fn decode_f32(self, bytes: [u8; 4]) -> f32 {
        match self {
            Self::Little => f32::from_le_bytes(bytes),
            Self::Big => f32::from_be_bytes(bytes),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub kind: u32,
    /// Payload byte length; only consulted when skipping unknown kinds.
    pub size: u32,
}

/// A tile rectangle in renderer image space: top-left origin, rows
/// increasing downward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A finished tile: rectangle plus `width * height * channels` samples,
/// row-major with channels interleaved per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct TileData {
    pub rect: TileRect,
    pub channels: u32,
    pub samples: Vec<f32>,
}

/// A tile the renderer has started but not finished; drawn as an outline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileHighlight {
    pub rect: TileRect,
}

/// One decoded protocol unit. Kind dispatch happens exactly once, here;
/// downstream code matches on the variant instead of re-deriving meaning
/// from the raw kind field.
#[derive(Clone, Debug, PartialEq)]
pub enum Chunk {
    TileData(TileData),
    TileHighlight(TileHighlight),
    /// Forward-compatible skip: the payload was consumed and discarded.
    Unknown { kind: u32, size: u32 },
}

/// Decodes the renderer's chunked stdout stream into typed records.
pub struct ProtocolDecoder<R> {
    reader: ChunkReader<R>,
    order: ByteOrder,
}

impl<R: Read> ProtocolDecoder<R> {
    pub fn new(source: R) -> Self {
        Self::with_byte_order(source, ByteOrder::default())
    }

    pub fn with_byte_order(source: R, order: ByteOrder) -> Self {
        Self {
            reader: ChunkReader::new(source),
            order,
        }
    }

    /// Decodes the next chunk.
    ///
    /// `Ok(None)` means the source closed at a chunk boundary, which is how
    /// the stream ends normally. Closure anywhere inside a chunk is a
    /// [`TilewireError::TruncatedStream`].
    pub fn next_chunk(&mut self) -> TilewireResult<Option<Chunk>> {
        let mut raw = [0u8; 8];
        match self.reader.fill(&mut raw)? {
            ReadStatus::Closed { received: 0 } => return Ok(None),
            ReadStatus::Closed { received } => {
                return Err(TilewireError::truncated(format!(
                    "stream closed {received} bytes into an 8-byte chunk header"
                )));
            }
            ReadStatus::Complete => {}
        }

        let header = ChunkHeader {
            kind: u32_field(self.order, &raw, 0),
            size: u32_field(self.order, &raw, 1),
        };

        match header.kind {
            CHUNK_TILE_DATA => Ok(Some(Chunk::TileData(self.decode_tile_data()?))),
            CHUNK_TILE_HIGHLIGHT => Ok(Some(Chunk::TileHighlight(self.decode_tile_highlight()?))),
            kind => {
                self.skip(header.size)?;
                Ok(Some(Chunk::Unknown {
                    kind,
                    size: header.size,
                }))
            }
        }
    }

    fn decode_tile_data(&mut self) -> TilewireResult<TileData> {
        let mut raw = [0u8; 20];
        self.fill_or_truncated(&mut raw, "a tile data header")?;

        let rect = TileRect {
            x: u32_field(self.order, &raw, 0),
            y: u32_field(self.order, &raw, 1),
            width: u32_field(self.order, &raw, 2),
            height: u32_field(self.order, &raw, 3),
        };
        let channels = u32_field(self.order, &raw, 4);

        let payload_len = u64::from(rect.width)
            .checked_mul(u64::from(rect.height))
            .and_then(|n| n.checked_mul(u64::from(channels)))
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                TilewireError::protocol(format!(
                    "tile dimensions overflow: {}x{}x{channels}",
                    rect.width, rect.height
                ))
            })?;

        let mut payload = vec![0u8; payload_len];
        self.fill_or_truncated(&mut payload, "a tile data payload")?;

        let samples = payload
            .chunks_exact(4)
            .map(|b| self.order.decode_f32([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(TileData {
            rect,
            channels,
            samples,
        })
    }

    fn decode_tile_highlight(&mut self) -> TilewireResult<TileHighlight> {
        let mut raw = [0u8; 16];
        self.fill_or_truncated(&mut raw, "a tile highlight header")?;

        Ok(TileHighlight {
            rect: TileRect {
                x: u32_field(self.order, &raw, 0),
                y: u32_field(self.order, &raw, 1),
                width: u32_field(self.order, &raw, 2),
                height: u32_field(self.order, &raw, 3),
            },
        })
    }

    /// Consumes exactly `size` payload bytes of an unrecognized chunk.
    fn skip(&mut self, size: u32) -> TilewireResult<()> {
        let mut remaining = size as usize;
        let mut scratch = [0u8; 512];
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            self.fill_or_truncated(&mut scratch[..n], "an unknown chunk payload")?;
            remaining -= n;
        }
        Ok(())
    }

    fn fill_or_truncated(&mut self, buf: &mut [u8], what: &str) -> TilewireResult<()> {
        match self.reader.fill(buf)? {
            ReadStatus::Complete => Ok(()),
            ReadStatus::Closed { received } => Err(TilewireError::truncated(format!(
                "stream closed {received} bytes into {what} ({} expected)",
                buf.len()
            ))),
        }
    }
}

fn u32_field(order: ByteOrder, buf: &[u8], index: usize) -> u32 {
    let o = index * 4;
    order.decode_u32([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]])
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::TilewireError;

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn tile_data_chunk(x: u32, y: u32, w: u32, h: u32, c: u32, samples: &[f32]) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, CHUNK_TILE_DATA);
        push_u32(&mut buf, 20 + samples.len() as u32 * 4);
        for v in [x, y, w, h, c] {
            push_u32(&mut buf, v);
        }
        for &s in samples {
            push_f32(&mut buf, s);
        }
        buf
    }

    fn highlight_chunk(x: u32, y: u32, w: u32, h: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        push_u32(&mut buf, CHUNK_TILE_HIGHLIGHT);
        push_u32(&mut buf, 16);
        for v in [x, y, w, h] {
            push_u32(&mut buf, v);
        }
        buf
    }

    #[test]
    fn empty_stream_is_a_clean_end() {
        let mut decoder = ProtocolDecoder::new(Cursor::new(Vec::new()));
        assert_eq!(decoder.next_chunk().unwrap(), None);
    }

    #[test]
    fn decodes_a_tile_data_chunk() {
        let stream = tile_data_chunk(3, 4, 2, 1, 2, &[0.5, 1.0, 1.5, 2.0]);
        let mut decoder = ProtocolDecoder::new(Cursor::new(stream));

        let chunk = decoder.next_chunk().unwrap().unwrap();
        let Chunk::TileData(tile) = chunk else {
            panic!("expected a tile data chunk");
        };
        assert_eq!(
            tile.rect,
            TileRect {
                x: 3,
                y: 4,
                width: 2,
                height: 1
            }
        );
        assert_eq!(tile.channels, 2);
        assert_eq!(tile.samples, vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(decoder.next_chunk().unwrap(), None);
    }

    #[test]
    fn decodes_a_highlight_chunk() {
        let mut decoder = ProtocolDecoder::new(Cursor::new(highlight_chunk(8, 16, 32, 32)));

        let chunk = decoder.next_chunk().unwrap().unwrap();
        assert_eq!(
            chunk,
            Chunk::TileHighlight(TileHighlight {
                rect: TileRect {
                    x: 8,
                    y: 16,
                    width: 32,
                    height: 32
                }
            })
        );
    }

    #[test]
    fn unknown_chunk_consumes_exactly_its_size() {
        let mut stream = Vec::new();
        push_u32(&mut stream, 99);
        push_u32(&mut stream, 12);
        stream.extend_from_slice(&[0xAB; 12]);
        stream.extend_from_slice(&highlight_chunk(0, 0, 4, 4));

        let mut decoder = ProtocolDecoder::new(Cursor::new(stream));
        assert_eq!(
            decoder.next_chunk().unwrap(),
            Some(Chunk::Unknown { kind: 99, size: 12 })
        );
        assert!(matches!(
            decoder.next_chunk().unwrap(),
            Some(Chunk::TileHighlight(_))
        ));
        assert_eq!(decoder.next_chunk().unwrap(), None);
    }

    #[test]
    fn closure_mid_header_is_truncation() {
        let mut decoder = ProtocolDecoder::new(Cursor::new(vec![1, 0, 0]));
        let err = decoder.next_chunk().unwrap_err();
        assert!(matches!(err, TilewireError::TruncatedStream(_)), "{err}");
    }

    #[test]
    fn closure_mid_payload_is_truncation() {
        // A 4x4x1 tile declares 64 payload bytes but only 32 arrive.
        let mut stream = tile_data_chunk(0, 0, 4, 4, 1, &[0.0; 16]);
        stream.truncate(8 + 20 + 32);

        let mut decoder = ProtocolDecoder::new(Cursor::new(stream));
        let err = decoder.next_chunk().unwrap_err();
        assert!(err.is_truncation(), "{err}");
    }

    #[test]
    fn big_endian_streams_decode_when_configured() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&CHUNK_TILE_HIGHLIGHT.to_be_bytes());
        stream.extend_from_slice(&16u32.to_be_bytes());
        for v in [1u32, 2, 3, 4] {
            stream.extend_from_slice(&v.to_be_bytes());
        }

        let mut decoder = ProtocolDecoder::with_byte_order(Cursor::new(stream), ByteOrder::Big);
        assert_eq!(
            decoder.next_chunk().unwrap(),
            Some(Chunk::TileHighlight(TileHighlight {
                rect: TileRect {
                    x: 1,
                    y: 2,
                    width: 3,
                    height: 4
                }
            }))
        );
    }
}
