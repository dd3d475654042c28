use thiserror::Error;

use crate::types::{Format, RawImage};

pub const PNG_SIG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const GIF87A_SIG: [u8; 6] = *b"GIF87a";
const GIF89A_SIG: [u8; 6] = *b"GIF89a";

/// Shortest magic we can match (JPEG SOI).
const MIN_SIGNATURE_SIZE: usize = 2;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("file too small to hold any supported image signature")]
    TooShort,
    #[error("unrecognized image signature")]
    Unsupported,
    #[error("declared segment length at offset 0x{offset:X} exceeds the file size")]
    Truncated { offset: usize },
}

/// Classify a byte buffer by its magic signature. Pure and idempotent.
pub fn detect_format(data: &[u8]) -> Result<Format, FormatError> {
    if data.len() < MIN_SIGNATURE_SIZE {
        return Err(FormatError::TooShort);
    }
    if data.len() >= PNG_SIG.len() && data[..PNG_SIG.len()] == PNG_SIG {
        return Ok(Format::Png);
    }
    if data[..JPEG_SOI.len()] == JPEG_SOI {
        return Ok(Format::Jpeg);
    }
    if data.len() >= GIF87A_SIG.len()
        && (data[..GIF87A_SIG.len()] == GIF87A_SIG || data[..GIF89A_SIG.len()] == GIF89A_SIG)
    {
        return Ok(Format::Gif);
    }
    Err(FormatError::Unsupported)
}

/// Wrap raw bytes into a [`RawImage`] tagged with their detected format.
pub fn classify(bytes: Vec<u8>) -> Result<RawImage, FormatError> {
    let format = detect_format(&bytes)?;
    Ok(RawImage { bytes, format })
}
