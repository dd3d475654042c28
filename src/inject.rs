use crate::binary_utils::{get_value_be, update_value_be};
use crate::container::{
    self, GifBlock, IDAT_SIG, JPEG_SOI_SIZE, LENGTH_FIELD_SIZE, PNG_SIGNATURE_SIZE, SOS_MARKER,
    Segment, SegmentCode, TYPE_FIELD_SIZE,
};
use crate::detect::FormatError;
use crate::types::{Format, InjectionPoint, RawImage};

/// Whether the CRC of a length-patched PNG chunk is recomputed or left as
/// the original, now stale, value. Strict readers reject stale CRCs;
/// lenient ones ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcPolicy {
    #[default]
    Recompute,
    Stale,
}

/// Where one payload copy goes: the byte offset of the insertion, plus the
/// start offset of the PNG chunk whose declared-length field must absorb
/// the payload, when the offset lands inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplicePlan {
    pub offset: usize,
    pub extend: Option<usize>,
}

/// The three canonical insertion points resolved for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionMap {
    pub header: SplicePlan,
    pub body: SplicePlan,
    pub trailer: SplicePlan,
}

impl InjectionMap {
    pub fn get(&self, point: InjectionPoint) -> SplicePlan {
        match point {
            InjectionPoint::Header => self.header,
            InjectionPoint::Body => self.body,
            InjectionPoint::Trailer => self.trailer,
        }
    }
}

fn chunk_data_start(segment: &Segment) -> usize {
    segment.start + LENGTH_FIELD_SIZE + TYPE_FIELD_SIZE
}

/// Compute the header/body/trailer offsets for an image. Deterministic;
/// when a body anchor (IDAT, SOS, GIF trailer byte) is absent, body falls
/// back to the trailer offset.
pub fn resolve_points(image: &RawImage) -> Result<InjectionMap, FormatError> {
    let segments = container::parse_segments(image)?;
    let end = image.bytes.len();
    let trailer = SplicePlan {
        offset: end,
        extend: None,
    };

    let (header, body) = match image.format {
        Format::Png => {
            // Header payload leads the first chunk's data field; body payload
            // leads the IDAT stream. Both extend the enclosing chunk.
            let header = match segments.first() {
                Some(first) => SplicePlan {
                    offset: chunk_data_start(first),
                    extend: Some(first.start),
                },
                None => SplicePlan {
                    offset: PNG_SIGNATURE_SIZE,
                    extend: None,
                },
            };
            let body = segments
                .iter()
                .find(|s| s.code == SegmentCode::Chunk(IDAT_SIG))
                .map_or(trailer, |idat| SplicePlan {
                    offset: chunk_data_start(idat),
                    extend: Some(idat.start),
                });
            (header, body)
        }
        Format::Jpeg => {
            let header = SplicePlan {
                offset: JPEG_SOI_SIZE,
                extend: None,
            };
            let body = segments
                .iter()
                .find(|s| s.code == SegmentCode::Marker(SOS_MARKER))
                .map(|sos| sos.start)
                .or_else(|| segments.last().map(Segment::end))
                .map_or(trailer, |offset| SplicePlan {
                    offset,
                    extend: None,
                });
            (header, body)
        }
        Format::Gif => {
            let header = SplicePlan {
                offset: container::GIF_SCREEN_DESCRIPTOR_END,
                extend: None,
            };
            let body = segments
                .iter()
                .find(|s| s.code == SegmentCode::Gif(GifBlock::Trailer))
                .map_or(trailer, |t| SplicePlan {
                    offset: t.start,
                    extend: None,
                });
            (header, body)
        }
    };

    Ok(InjectionMap {
        header,
        body,
        trailer,
    })
}

fn extend_chunk_length(data: &mut [u8], chunk_start: usize, added: usize) -> Result<(), FormatError> {
    let old_len = get_value_be(data, chunk_start, LENGTH_FIELD_SIZE)
        .map_err(|_| FormatError::Truncated { offset: chunk_start })? as usize;
    let new_len = u32::try_from(old_len + added)
        .map_err(|_| FormatError::Truncated { offset: chunk_start })?;
    update_value_be(data, chunk_start, new_len, LENGTH_FIELD_SIZE)
        .map_err(|_| FormatError::Truncated { offset: chunk_start })
}

/// Pure insertion: `bytes[..offset] ++ payload ++ bytes[offset..]`, plus the
/// declared-length patch (and CRC refresh, per policy) when the plan names a
/// chunk to extend. Output length is exactly input + payload.
pub fn splice(
    image: &RawImage,
    plan: SplicePlan,
    payload: &[u8],
    crc_policy: CrcPolicy,
) -> Result<Vec<u8>, FormatError> {
    let data = &image.bytes;
    if plan.offset > data.len() {
        return Err(FormatError::Truncated {
            offset: plan.offset,
        });
    }

    let mut out = Vec::with_capacity(data.len() + payload.len());
    out.extend_from_slice(&data[..plan.offset]);
    out.extend_from_slice(payload);
    out.extend_from_slice(&data[plan.offset..]);

    if let Some(chunk_start) = plan.extend {
        extend_chunk_length(&mut out, chunk_start, payload.len())?;
        if crc_policy == CrcPolicy::Recompute {
            container::refresh_chunk_crc(&mut out, chunk_start)?;
        }
    }

    Ok(out)
}

/// One artifact per canonical injection point, in Header/Body/Trailer order.
pub fn splice_all(
    image: &RawImage,
    payload: &[u8],
    crc_policy: CrcPolicy,
) -> Result<Vec<(InjectionPoint, Vec<u8>)>, FormatError> {
    let map = resolve_points(image)?;
    InjectionPoint::ALL
        .iter()
        .map(|&point| splice(image, map.get(point), payload, crc_policy).map(|out| (point, out)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{CrcPolicy, resolve_points, splice, splice_all};
    use crate::container::{IDAT_SIG, IHDR_SIG, SegmentCode, parse_png_chunks};
    use crate::detect::classify;
    use crate::test_fixtures::{encode_rgb_png, minimal_gif, minimal_jpeg, png_without_idat};
    use crate::types::InjectionPoint;

    const PAYLOAD: &[u8] = b"<script>alert(1)</script>";

    #[test]
    fn png_points_extend_ihdr_and_idat() {
        let image = classify(encode_rgb_png(16, 16)).expect("classify");
        let segments = parse_png_chunks(&image.bytes).expect("parse");
        let idat = segments
            .iter()
            .find(|s| s.code == SegmentCode::Chunk(IDAT_SIG))
            .expect("idat");

        let map = resolve_points(&image).expect("resolve");
        assert_eq!(map.header.offset, 16);
        assert_eq!(map.header.extend, Some(8));
        assert_eq!(map.body.offset, idat.start + 8);
        assert_eq!(map.body.extend, Some(idat.start));
        assert_eq!(map.trailer.offset, image.bytes.len());
        assert_eq!(map.trailer.extend, None);
    }

    #[test]
    fn jpeg_points_follow_soi_and_sos() {
        let image = classify(minimal_jpeg()).expect("classify");
        let map = resolve_points(&image).expect("resolve");

        assert_eq!(map.header.offset, 2);
        // body lands on the SOS marker's first byte
        assert_eq!(&image.bytes[map.body.offset..map.body.offset + 2], &[0xFF, 0xDA]);
        assert_eq!(map.trailer.offset, image.bytes.len());
        assert!(map.header.extend.is_none() && map.body.extend.is_none());
    }

    #[test]
    fn gif_points_follow_screen_descriptor_and_trailer() {
        let image = classify(minimal_gif()).expect("classify");
        let map = resolve_points(&image).expect("resolve");

        assert_eq!(map.header.offset, 13);
        assert_eq!(map.body.offset, image.bytes.len() - 1);
        assert_eq!(map.trailer.offset, image.bytes.len());
    }

    #[test]
    fn missing_idat_degrades_body_to_trailer() {
        let image = classify(png_without_idat()).expect("classify");
        let map = resolve_points(&image).expect("resolve");
        assert_eq!(map.body, map.trailer);
    }

    #[test]
    fn artifacts_grow_by_exactly_the_payload_length() {
        for bytes in [
            encode_rgb_png(16, 16),
            minimal_jpeg(),
            minimal_gif(),
        ] {
            let image = classify(bytes).expect("classify");
            let artifacts = splice_all(&image, PAYLOAD, CrcPolicy::Recompute).expect("splice");
            assert_eq!(artifacts.len(), 3);
            for (_, artifact) in &artifacts {
                assert_eq!(artifact.len(), image.bytes.len() + PAYLOAD.len());
            }
        }
    }

    #[test]
    fn trailer_artifact_preserves_the_original_bytes() {
        for bytes in [
            encode_rgb_png(16, 16),
            minimal_jpeg(),
            minimal_gif(),
        ] {
            let image = classify(bytes).expect("classify");
            let map = resolve_points(&image).expect("resolve");
            let artifact =
                splice(&image, map.trailer, PAYLOAD, CrcPolicy::Recompute).expect("splice");
            assert_eq!(&artifact[..image.bytes.len()], image.bytes.as_slice());
            assert_eq!(&artifact[image.bytes.len()..], PAYLOAD);
        }
    }

    #[test]
    fn patched_chunk_length_reads_back_extended() {
        let image = classify(encode_rgb_png(16, 16)).expect("classify");
        let before = parse_png_chunks(&image.bytes).expect("parse");
        let map = resolve_points(&image).expect("resolve");

        for (plan, sig) in [(map.header, IHDR_SIG), (map.body, IDAT_SIG)] {
            let artifact = splice(&image, plan, PAYLOAD, CrcPolicy::Recompute).expect("splice");
            let after = parse_png_chunks(&artifact).expect("reparse");

            let old = before
                .iter()
                .find(|s| s.code == SegmentCode::Chunk(sig))
                .expect("chunk before");
            let new = after
                .iter()
                .find(|s| s.code == SegmentCode::Chunk(sig))
                .expect("chunk after");
            assert_eq!(new.declared_len, old.declared_len + PAYLOAD.len());
        }
    }

    #[test]
    fn crc_policy_controls_the_patched_chunk_crc() {
        let image = classify(encode_rgb_png(16, 16)).expect("classify");
        let map = resolve_points(&image).expect("resolve");

        let recomputed =
            splice(&image, map.header, PAYLOAD, CrcPolicy::Recompute).expect("splice");
        let stale = splice(&image, map.header, PAYLOAD, CrcPolicy::Stale).expect("splice");

        let chunks = parse_png_chunks(&recomputed).expect("reparse");
        let ihdr = chunks[0];
        let crc_index = ihdr.end() - 4;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&recomputed[ihdr.start + 4..crc_index]);
        let expected = hasher.finalize().to_be_bytes();
        assert_eq!(&recomputed[crc_index..crc_index + 4], expected.as_slice());

        // stale output keeps the pre-injection CRC bytes, which no longer match
        let original_crc = &image.bytes[8 + 4 + 4 + 13..8 + 4 + 4 + 13 + 4];
        assert_eq!(&stale[crc_index..crc_index + 4], original_crc);
        assert_ne!(&stale[crc_index..crc_index + 4], expected.as_slice());
    }

    #[test]
    fn header_artifact_tags_cover_all_points() {
        let image = classify(minimal_gif()).expect("classify");
        let artifacts = splice_all(&image, b"x", CrcPolicy::Recompute).expect("splice");
        let points: Vec<_> = artifacts.iter().map(|(p, _)| *p).collect();
        assert_eq!(points, InjectionPoint::ALL.to_vec());
    }
}
