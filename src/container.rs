use crc32fast::Hasher;

use crate::binary_utils::{get_value_be, update_value_be};
use crate::detect::FormatError;
use crate::types::{Format, RawImage};

pub const IHDR_SIG: [u8; 4] = *b"IHDR";
pub const IDAT_SIG: [u8; 4] = *b"IDAT";
pub const IEND_SIG: [u8; 4] = *b"IEND";

pub const PNG_SIGNATURE_SIZE: usize = 8;
pub const LENGTH_FIELD_SIZE: usize = 4;
pub const TYPE_FIELD_SIZE: usize = 4;
pub const CRC_FIELD_SIZE: usize = 4;
pub const CHUNK_OVERHEAD: usize = 12;

pub const JPEG_SOI_SIZE: usize = 2;
const MARKER_PREFIX_SIZE: usize = 2;
pub const SOS_MARKER: u8 = 0xDA;
const EOI_MARKER: u8 = 0xD9;

const GIF_HEADER_SIZE: usize = 6;
const GIF_SCREEN_DESCRIPTOR_SIZE: usize = 7;
pub const GIF_SCREEN_DESCRIPTOR_END: usize = GIF_HEADER_SIZE + GIF_SCREEN_DESCRIPTOR_SIZE;
const GIF_TRAILER_BYTE: u8 = 0x3B;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GifBlock {
    Header,
    ScreenDescriptor,
    GlobalColorTable,
    Trailer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCode {
    /// PNG chunk type name.
    Chunk([u8; 4]),
    /// JPEG marker byte (the byte following 0xFF).
    Marker(u8),
    Gif(GifBlock),
}

/// One structural unit of a container, described against the input buffer.
/// `declared_len` is the value of the unit's own length field: PNG chunk
/// data length, JPEG segment length (which counts its own two bytes), or
/// the fixed byte size of a GIF region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub code: SegmentCode,
    pub start: usize,
    pub declared_len: usize,
}

impl Segment {
    /// Offset one past the unit's last byte, framing included.
    pub fn end(&self) -> usize {
        match self.code {
            SegmentCode::Chunk(_) => self.start + CHUNK_OVERHEAD + self.declared_len,
            SegmentCode::Marker(_) => self.start + MARKER_PREFIX_SIZE + self.declared_len,
            SegmentCode::Gif(_) => self.start + self.declared_len,
        }
    }
}

pub fn parse_segments(image: &RawImage) -> Result<Vec<Segment>, FormatError> {
    match image.format {
        Format::Png => parse_png_chunks(&image.bytes),
        Format::Jpeg => parse_jpeg_segments(&image.bytes),
        Format::Gif => parse_gif_blocks(&image.bytes),
    }
}

/// Walk the chunk stream after the 8-byte signature, stopping at (and
/// including) IEND or at buffer end, whichever comes first.
pub fn parse_png_chunks(data: &[u8]) -> Result<Vec<Segment>, FormatError> {
    let mut segments = Vec::new();
    let mut chunk_start = PNG_SIGNATURE_SIZE;

    while chunk_start < data.len() {
        if CHUNK_OVERHEAD > data.len() - chunk_start {
            return Err(FormatError::Truncated { offset: chunk_start });
        }

        let declared_len = get_value_be(data, chunk_start, LENGTH_FIELD_SIZE)
            .map_err(|_| FormatError::Truncated { offset: chunk_start })?
            as usize;
        if declared_len > data.len() - chunk_start - CHUNK_OVERHEAD {
            return Err(FormatError::Truncated { offset: chunk_start });
        }

        let name_index = chunk_start + LENGTH_FIELD_SIZE;
        let mut code = [0u8; 4];
        code.copy_from_slice(&data[name_index..name_index + TYPE_FIELD_SIZE]);

        segments.push(Segment {
            code: SegmentCode::Chunk(code),
            start: chunk_start,
            declared_len,
        });
        chunk_start += CHUNK_OVERHEAD + declared_len;

        if code == IEND_SIG {
            break;
        }
    }

    Ok(segments)
}

/// Walk marker segments after SOI. Standalone markers (TEM, RSTn) carry no
/// length field; the walk ends at SOS (entropy-coded data follows) or EOI.
pub fn parse_jpeg_segments(data: &[u8]) -> Result<Vec<Segment>, FormatError> {
    let mut segments = Vec::new();
    let mut pos = JPEG_SOI_SIZE;

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            // fill byte
            pos += 1;
            continue;
        }

        match marker {
            0x01 | 0xD0..=0xD7 => {
                segments.push(Segment {
                    code: SegmentCode::Marker(marker),
                    start: pos,
                    declared_len: 0,
                });
                pos += MARKER_PREFIX_SIZE;
            }
            EOI_MARKER => {
                segments.push(Segment {
                    code: SegmentCode::Marker(marker),
                    start: pos,
                    declared_len: 0,
                });
                break;
            }
            _ => {
                if pos + MARKER_PREFIX_SIZE + 2 > data.len() {
                    return Err(FormatError::Truncated { offset: pos });
                }
                let declared_len = get_value_be(data, pos + MARKER_PREFIX_SIZE, 2)
                    .map_err(|_| FormatError::Truncated { offset: pos })?
                    as usize;
                if declared_len < 2 || declared_len > data.len() - pos - MARKER_PREFIX_SIZE {
                    return Err(FormatError::Truncated { offset: pos });
                }
                segments.push(Segment {
                    code: SegmentCode::Marker(marker),
                    start: pos,
                    declared_len,
                });
                if marker == SOS_MARKER {
                    break;
                }
                pos += MARKER_PREFIX_SIZE + declared_len;
            }
        }
    }

    Ok(segments)
}

/// Record the header, logical screen descriptor, the global color table when
/// flagged, and the trailer byte. Sub-block parsing of image data is not
/// needed: injection only targets the header and trailer regions.
pub fn parse_gif_blocks(data: &[u8]) -> Result<Vec<Segment>, FormatError> {
    if data.len() < GIF_SCREEN_DESCRIPTOR_END {
        return Err(FormatError::Truncated { offset: data.len() });
    }

    let mut segments = vec![
        Segment {
            code: SegmentCode::Gif(GifBlock::Header),
            start: 0,
            declared_len: GIF_HEADER_SIZE,
        },
        Segment {
            code: SegmentCode::Gif(GifBlock::ScreenDescriptor),
            start: GIF_HEADER_SIZE,
            declared_len: GIF_SCREEN_DESCRIPTOR_SIZE,
        },
    ];

    let packed = data[10];
    if packed & 0x80 != 0 {
        let table_len = 3usize << ((packed & 0x07) + 1);
        if table_len > data.len() - GIF_SCREEN_DESCRIPTOR_END {
            return Err(FormatError::Truncated {
                offset: GIF_SCREEN_DESCRIPTOR_END,
            });
        }
        segments.push(Segment {
            code: SegmentCode::Gif(GifBlock::GlobalColorTable),
            start: GIF_SCREEN_DESCRIPTOR_END,
            declared_len: table_len,
        });
    }

    if data.last() == Some(&GIF_TRAILER_BYTE) {
        segments.push(Segment {
            code: SegmentCode::Gif(GifBlock::Trailer),
            start: data.len() - 1,
            declared_len: 1,
        });
    }

    Ok(segments)
}

/// Recompute a PNG chunk's CRC over its type and data fields, trusting the
/// declared length currently in the buffer.
pub fn refresh_chunk_crc(data: &mut [u8], chunk_start: usize) -> Result<(), FormatError> {
    let declared_len = get_value_be(data, chunk_start, LENGTH_FIELD_SIZE)
        .map_err(|_| FormatError::Truncated { offset: chunk_start })? as usize;

    let type_index = chunk_start + LENGTH_FIELD_SIZE;
    let crc_index = type_index + TYPE_FIELD_SIZE + declared_len;
    if crc_index + CRC_FIELD_SIZE > data.len() {
        return Err(FormatError::Truncated { offset: chunk_start });
    }

    let mut hasher = Hasher::new();
    hasher.update(&data[type_index..crc_index]);
    let crc = hasher.finalize();
    update_value_be(data, crc_index, crc, CRC_FIELD_SIZE)
        .map_err(|_| FormatError::Truncated { offset: crc_index })?;

    Ok(())
}
