//! JPEG marker-segment surgery.
//!
//! The provenance record travels in an APP11 segment whose body starts with
//! a namespace tag, inserted immediately after SOI. Everything here works at
//! segment granularity: pre-existing metadata and the entropy-coded image
//! data are never re-encoded, so stripping the provenance segment
//! reconstructs the pre-embedding byte stream bit-for-bit.

use crate::error::{AuthError, Result};

/// Namespace tag that opens the provenance segment body.
pub const NAMESPACE: &[u8] = b"PhotoAuthentication\0";

/// APP11 carries vendor metadata payloads.
pub const PROVENANCE_MARKER: u8 = 0xEB;

const MARKER_PREFIX: u8 = 0xFF;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;

/// A sized marker segment. `start..end` covers the marker, the length field
/// and the body.
#[derive(Clone, Copy, Debug)]
pub struct MarkerSegment {
    pub marker: u8,
    pub start: usize,
    pub end: usize,
}

impl MarkerSegment {
    pub fn body<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        &bytes[self.start + 4..self.end]
    }

    /// APPn segments are the container's metadata dictionary.
    pub fn is_app(&self) -> bool {
        (0xE0..=0xEF).contains(&self.marker)
    }

    pub(crate) fn is_provenance(&self, bytes: &[u8]) -> bool {
        self.marker == PROVENANCE_MARKER && self.body(bytes).starts_with(NAMESPACE)
    }
}

/// Walks the sized marker segments between SOI and the first SOS/EOI.
///
/// Returns the segments and the offset where the opaque tail (scan data
/// onward) begins. The tail is never parsed; segment insertion and removal
/// leave it untouched.
pub fn marker_segments(bytes: &[u8]) -> Result<(Vec<MarkerSegment>, usize)> {
    if bytes.len() < 2 || bytes[0] != MARKER_PREFIX || bytes[1] != SOI {
        return Err(AuthError::EmbedFailed(
            "not a JPEG container (missing SOI)".into(),
        ));
    }

    let mut segments = Vec::new();
    let mut pos = 2usize;
    loop {
        if pos + 2 > bytes.len() {
            return Err(AuthError::EmbedFailed(
                "truncated JPEG: no scan or EOI marker".into(),
            ));
        }
        if bytes[pos] != MARKER_PREFIX {
            return Err(AuthError::EmbedFailed(format!(
                "malformed JPEG: expected marker at offset {}",
                pos
            )));
        }

        let marker = bytes[pos + 1];
        match marker {
            // Fill byte before a marker.
            MARKER_PREFIX => pos += 1,
            SOS | EOI => return Ok((segments, pos)),
            SOI => {
                return Err(AuthError::EmbedFailed("malformed JPEG: nested SOI".into()));
            }
            // Standalone markers carry no length field.
            TEM | 0xD0..=0xD7 => pos += 2,
            _ => {
                if pos + 4 > bytes.len() {
                    return Err(AuthError::EmbedFailed(
                        "truncated JPEG: segment length cut off".into(),
                    ));
                }
                let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
                if len < 2 {
                    return Err(AuthError::EmbedFailed(format!(
                        "malformed JPEG: segment length {} at offset {}",
                        len, pos
                    )));
                }
                let end = pos + 2 + len;
                if end > bytes.len() {
                    return Err(AuthError::EmbedFailed(
                        "truncated JPEG: segment body cut off".into(),
                    ));
                }
                segments.push(MarkerSegment { marker, start: pos, end });
                pos = end;
            }
        }
    }
}

/// Builds the APP11 provenance segment around `payload`.
pub fn provenance_segment(payload: &[u8]) -> Result<Vec<u8>> {
    let body_len = NAMESPACE.len() + payload.len();
    // Length field counts itself.
    let seg_len = body_len + 2;
    if seg_len > u16::MAX as usize {
        return Err(AuthError::EmbedFailed(format!(
            "record too large for a marker segment ({} bytes)",
            body_len
        )));
    }

    let mut out = Vec::with_capacity(body_len + 4);
    out.extend_from_slice(&[MARKER_PREFIX, PROVENANCE_MARKER]);
    out.extend_from_slice(&(seg_len as u16).to_be_bytes());
    out.extend_from_slice(NAMESPACE);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Splices `segment` in immediately after SOI. The caller has already
/// validated the container via `marker_segments`.
pub fn insert_after_soi(bytes: &[u8], segment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + segment.len());
    out.extend_from_slice(&bytes[..2]);
    out.extend_from_slice(segment);
    out.extend_from_slice(&bytes[2..]);
    out
}

/// Extracts every provenance payload and reconstructs the pre-embedding
/// byte stream with those segments removed.
///
/// An image that carries no provenance segment comes back unchanged.
pub fn extract_provenance(bytes: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u8>)> {
    let (segments, _tail) = marker_segments(bytes)?;
    let provenance: Vec<MarkerSegment> = segments
        .iter()
        .copied()
        .filter(|seg| seg.is_provenance(bytes))
        .collect();

    if provenance.is_empty() {
        return Ok((Vec::new(), bytes.to_vec()));
    }

    let payloads = provenance
        .iter()
        .map(|seg| seg.body(bytes)[NAMESPACE.len()..].to_vec())
        .collect();

    let mut stripped = Vec::with_capacity(bytes.len());
    let mut cursor = 0usize;
    for seg in &provenance {
        stripped.extend_from_slice(&bytes[cursor..seg.start]);
        cursor = seg.end;
    }
    stripped.extend_from_slice(&bytes[cursor..]);
    Ok((payloads, stripped))
}

/// Structurally valid JPEG for tests: SOI, one APP0, then an opaque scan
/// tail.
#[cfg(test)]
pub(crate) fn sample_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x08]);
    bytes.extend_from_slice(b"JFIF\0\x01");
    bytes.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, 0x01, 0x02]);
    bytes.extend_from_slice(&[0x11, 0x22, 0x33, 0x44]);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_app_segments_up_to_the_scan() -> Result<()> {
        let jpeg = sample_jpeg();
        let (segments, tail) = marker_segments(&jpeg)?;

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].marker, 0xE0);
        assert!(segments[0].is_app());
        assert_eq!(segments[0].body(&jpeg), b"JFIF\0\x01");
        assert_eq!(jpeg[tail], 0xFF);
        assert_eq!(jpeg[tail + 1], 0xDA);
        Ok(())
    }

    #[test]
    fn rejects_non_jpeg_input() {
        assert!(marker_segments(b"not a jpeg").is_err());
        assert!(marker_segments(&[0xFF, 0xD8]).is_err());
        assert!(marker_segments(&[]).is_err());
    }

    #[test]
    fn rejects_truncated_segment_bodies() {
        // APP0 claiming 0x100 bytes of body in a 10-byte file.
        let bytes = [0xFF, 0xD8, 0xFF, 0xE0, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(marker_segments(&bytes).is_err());
    }

    #[test]
    fn insert_then_extract_is_identity() -> Result<()> {
        let original = sample_jpeg();
        let segment = provenance_segment(b"{\"k\":1}")?;
        let sealed = insert_after_soi(&original, &segment);

        let (payloads, stripped) = extract_provenance(&sealed)?;
        assert_eq!(payloads, vec![b"{\"k\":1}".to_vec()]);
        assert_eq!(stripped, original);
        Ok(())
    }

    #[test]
    fn extract_without_provenance_returns_input_unchanged() -> Result<()> {
        let original = sample_jpeg();
        let (payloads, stripped) = extract_provenance(&original)?;
        assert!(payloads.is_empty());
        assert_eq!(stripped, original);
        Ok(())
    }

    #[test]
    fn foreign_app11_segments_are_left_alone() -> Result<()> {
        let original = sample_jpeg();
        let mut foreign = vec![0xFF, 0xEB, 0x00, 0x06];
        foreign.extend_from_slice(b"JUMB");
        let with_foreign = insert_after_soi(&original, &foreign);

        let (payloads, stripped) = extract_provenance(&with_foreign)?;
        assert!(payloads.is_empty());
        assert_eq!(stripped, with_foreign);
        Ok(())
    }

    #[test]
    fn oversized_payload_is_refused() {
        let payload = vec![0u8; 70_000];
        assert!(provenance_segment(&payload).is_err());
    }
}
