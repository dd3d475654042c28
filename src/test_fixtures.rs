//! Fixture builders shared by the unit tests. Compiled only for tests.

use png::{BitDepth, ColorType, Encoder};

use crate::detect::PNG_SIG;
use crate::dos::png_chunk;

/// Encode a gradient RGB PNG with the `png` crate.
pub fn encode_rgb_png(width: u32, height: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for i in 0..(width * height) {
        let v = (i % 251) as u8;
        rgb.extend_from_slice(&[v, v.wrapping_add(85), v.wrapping_add(170)]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgb);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header().expect("header");
        writer.write_image_data(&rgb).expect("data");
    }
    out
}

/// SOI + APP0 (JFIF) + SOS + two entropy bytes + EOI.
pub fn minimal_jpeg() -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    out.extend_from_slice(b"JFIF\0");
    out.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    out.extend_from_slice(&[0x12, 0x34]);
    out.push(0xFF);
    out.push(0xD9);
    out
}

/// 1x1 GIF89a with a two-entry global color table and a trailer byte.
pub fn minimal_gif() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00]);
    out.extend_from_slice(&[0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF]);
    out.extend_from_slice(&[0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    out.extend_from_slice(&[0x02, 0x02, 0x4C, 0x01, 0x00]);
    out.push(0x3B);
    out
}

/// Signature + IHDR + IEND, no image data: exercises the degenerate
/// body-anchor fallback.
pub fn png_without_idat() -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIG);
    out.extend_from_slice(&png_chunk(b"IHDR", &ihdr));
    out.extend_from_slice(&png_chunk(b"IEND", &[]));
    out
}
