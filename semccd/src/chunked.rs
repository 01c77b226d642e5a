//! Chunked bulk transfer of image payloads.
//!
//! After an acquisition request the peer reports the payload geometry and
//! how many chunks it will stream. The first chunk follows immediately;
//! every later chunk is released by a `GS_ChunkHandshake` packet, which the
//! peer does not answer. Samples are unsigned 16-bit in wire byte order.

use semccd_proto::{Function, Message};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Bytes per image sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Geometry the peer announces before streaming an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Total samples in the payload.
    pub samples: usize,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Number of chunks the payload is split into.
    pub chunks: usize,
}

impl ChunkHeader {
    /// Creates a header from explicit values.
    pub const fn new(samples: usize, width: usize, height: usize, chunks: usize) -> Self {
        Self {
            samples,
            width,
            height,
            chunks,
        }
    }

    /// Reads `[status, samples, width, height, chunks]` from an acquisition
    /// response.
    pub fn from_response(response: &Message) -> Result<Self> {
        let field = |index: usize, name: &str| {
            usize::try_from(response.long(index)).map_err(|_| {
                Error::ProtocolDesync(format!("negative {name} {}", response.long(index)))
            })
        };
        Ok(Self {
            samples: field(1, "sample count")?,
            width: field(2, "width")?,
            height: field(3, "height")?,
            chunks: field(4, "chunk count")?,
        })
    }

    /// Payload length in bytes.
    pub fn byte_len(&self) -> Result<usize> {
        self.samples
            .checked_mul(BYTES_PER_SAMPLE)
            .ok_or_else(|| Error::ProtocolDesync(format!("{} samples overflow", self.samples)))
    }

    /// Nominal bytes per chunk; the last chunk may be shorter.
    ///
    /// Every chunk must carry at least one byte, so a count that would
    /// leave trailing empty chunks is rejected before any handshake.
    pub fn chunk_size(&self) -> Result<usize> {
        if self.chunks == 0 {
            return Err(Error::ProtocolDesync("peer announced zero chunks".into()));
        }
        let total = self.byte_len()?;
        let size = total.div_ceil(self.chunks);
        if size * (self.chunks - 1) >= total {
            return Err(Error::ProtocolDesync(format!(
                "{} chunks cannot split {total} bytes",
                self.chunks
            )));
        }
        Ok(size)
    }
}

/// Destination buffer plus a running fill offset.
struct Transfer {
    /// Pre-sized payload buffer.
    buf: Vec<u8>,
    /// Bytes written so far.
    offset: usize,
    /// Nominal chunk length.
    chunk_size: usize,
}

impl Transfer {
    /// Bytes still owed by the peer.
    const fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Receives the next chunk into the buffer.
    fn fill_chunk(&mut self, transport: &mut Transport) -> Result<usize> {
        let len = self.remaining().min(self.chunk_size);
        let end = self.offset + len;
        transport.receive_exact(&mut self.buf[self.offset..end])?;
        self.offset = end;
        Ok(len)
    }
}

/// Reads a chunked image payload described by `header`.
///
/// Any inconsistency leaves the session desynchronized; a partially filled
/// image is never returned.
pub fn read_image(transport: &mut Transport, header: ChunkHeader) -> Result<Image> {
    let result = receive_payload(transport, header);
    if result.is_err() {
        transport.mark_desynced();
    }
    let buf = result?;

    let order = transport.byte_order();
    let pixels = buf
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|s| order.read_u16([s[0], s[1]]))
        .collect();
    Ok(Image {
        width: header.width,
        height: header.height,
        pixels,
    })
}

/// Runs the chunk loop and checks the result against the header.
fn receive_payload(transport: &mut Transport, header: ChunkHeader) -> Result<Vec<u8>> {
    let pixels = header.width.checked_mul(header.height);
    if pixels != Some(header.samples) {
        return Err(Error::ProtocolDesync(format!(
            "{} samples do not fill a {}x{} image",
            header.samples, header.width, header.height
        )));
    }

    let total = header.byte_len()?;
    let mut transfer = Transfer {
        buf: vec![0; total],
        offset: 0,
        chunk_size: header.chunk_size()?,
    };
    debug!(
        width = header.width,
        height = header.height,
        chunks = header.chunks,
        chunk_size = transfer.chunk_size,
        "receiving image"
    );

    let handshake = Message::call(Function::ChunkHandshake);
    for index in 0..header.chunks {
        if index > 0 {
            transport.post(&handshake)?;
        }
        let len = transfer.fill_chunk(transport)?;
        trace!(index, len, offset = transfer.offset, "chunk received");
    }

    if transfer.offset != total {
        return Err(Error::ProtocolDesync(format!(
            "image buffer filled {} of {total} bytes",
            transfer.offset
        )));
    }
    Ok(transfer.buf)
}

/// A 16-bit image in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Pixels per row.
    width: usize,
    /// Number of rows.
    height: usize,
    /// Row-major samples, `width * height` long.
    pixels: Vec<u16>,
}

impl Image {
    /// Wraps row-major samples; `None` if the length does not match.
    pub fn new(width: usize, height: usize, pixels: Vec<u16>) -> Option<Self> {
        (width.checked_mul(height) == Some(pixels.len())).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    /// Pixels per row.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// All samples in row-major order.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Consumes the image, returning its samples.
    pub fn into_pixels(self) -> Vec<u16> {
        self.pixels
    }

    /// Sample at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<u16> {
        if col >= self.width {
            return None;
        }
        self.pixels.get(row * self.width + col).copied()
    }

    /// One row of samples.
    pub fn row(&self, row: usize) -> Option<&[u16]> {
        if row >= self.height {
            return None;
        }
        let start = row * self.width;
        self.pixels.get(start..start + self.width)
    }

    /// Iterates over rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u16]> {
        self.pixels.chunks_exact(self.width.max(1))
    }

    /// Copies the image into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<u16>> {
        self.rows().map(<[u16]>::to_vec).collect()
    }
}
