//! JPEG marker-segment walker and scrubber.
//!
//! A JPEG file is a sequence of marker segments up to Start-Of-Scan; after
//! SOS the entropy-coded data may contain byte pairs that look like markers,
//! so the walker hands everything from SOS onward back as one opaque segment.
//! Scrubbing drops the application segments (APP0-APP15) that carry EXIF,
//! XMP, ICC, IPTC and thumbnails, and copies everything else byte for byte.

use crate::scrubber::ScrubError;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const TEM: u8 = 0x01;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP13: u8 = 0xED;
const APP15: u8 = 0xEF;

const JFIF_IDENT: &[u8] = b"JFIF\0";
const EXIF_IDENT: &[u8] = b"Exif\0\0";
const XMP_IDENT: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const XMP_EXTENSION_IDENT: &[u8] = b"http://ns.adobe.com/xmp/extension/\0";
const ICC_IDENT: &[u8] = b"ICC_PROFILE\0";
const IPTC_IDENT: &[u8] = b"Photoshop 3.0\0";

/// Length field value of a JFIF APP0 segment without a thumbnail.
const JFIF_MINIMAL_LENGTH: u16 = 16;

/// What an application segment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// JFIF header without a thumbnail; structural, safe to keep.
    Jfif,
    /// JFIF header carrying an embedded thumbnail.
    JfifThumbnail,
    Exif,
    Xmp,
    Icc,
    Iptc,
    /// Any other APPn segment; holds the `n`.
    Other(u8),
}

impl MetadataKind {
    pub fn is_identifying(&self) -> bool {
        !matches!(self, MetadataKind::Jfif)
    }
}

impl std::fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataKind::Jfif => f.write_str("JFIF"),
            MetadataKind::JfifThumbnail => f.write_str("JFIF thumbnail"),
            MetadataKind::Exif => f.write_str("EXIF"),
            MetadataKind::Xmp => f.write_str("XMP"),
            MetadataKind::Icc => f.write_str("ICC profile"),
            MetadataKind::Iptc => f.write_str("IPTC"),
            MetadataKind::Other(n) => write!(f, "APP{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Metadata(MetadataKind),
    /// Length-prefixed segment that is not application data (DQT, SOFn, DHT, COM, ...).
    Structural,
    /// Marker without a payload (SOI, RSTn, TEM).
    Standalone,
    /// SOS header and everything after it.
    Scan,
    /// Bytes that do not start with a marker; everything to the end of the buffer.
    Raw,
    /// End-Of-Image.
    End,
}

/// One walked segment. `bytes` starts at the marker's `0xFF` (fill bytes
/// excluded) and includes the length field and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub marker: Option<u8>,
    pub kind: SegmentKind,
    pub bytes: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Payload after the marker and length field.
    pub fn payload(&self) -> &'a [u8] {
        self.bytes.get(4..).unwrap_or_default()
    }
}

/// Iterator over the marker segments of a JPEG buffer.
pub struct SegmentReader<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> SegmentReader<'a> {
    /// Start walking `data`. Fails when the buffer does not begin with SOI.
    pub fn new(data: &'a [u8]) -> Result<Self, ScrubError> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
            return Err(ScrubError::InvalidContainer(
                "missing start-of-image marker".to_string(),
            ));
        }
        Ok(Self {
            data,
            pos: 0,
            done: false,
        })
    }

    /// Read the next segment. `Ok(None)` once the scan data or EOI has been returned.
    pub fn next_segment(&mut self) -> Result<Option<Segment<'a>>, ScrubError> {
        if self.done {
            return Ok(None);
        }

        let result = self.read_segment();
        match &result {
            Ok(segment) => {
                if matches!(
                    segment.kind,
                    SegmentKind::Scan | SegmentKind::Raw | SegmentKind::End
                ) {
                    self.done = true;
                }
            }
            Err(_) => self.done = true,
        }
        result.map(Some)
    }

    fn read_segment(&mut self) -> Result<Segment<'a>, ScrubError> {
        let data = self.data;
        let len = data.len();

        if self.pos >= len {
            return Err(ScrubError::InvalidContainer(
                "unexpected end of data before start of scan".to_string(),
            ));
        }

        if data[self.pos] != 0xFF {
            let raw = &data[self.pos..];
            self.pos = len;
            return Ok(Segment {
                marker: None,
                kind: SegmentKind::Raw,
                bytes: raw,
            });
        }

        // Any number of 0xFF fill bytes may precede a marker.
        let mut start = self.pos;
        while start + 1 < len && data[start + 1] == 0xFF {
            start += 1;
        }
        if start + 1 >= len {
            return Err(ScrubError::InvalidContainer("truncated marker".to_string()));
        }

        let marker = data[start + 1];
        match marker {
            0x00 => Err(ScrubError::InvalidContainer(
                "stuffed byte outside scan data".to_string(),
            )),
            SOI | TEM | RST0..=RST7 | EOI => {
                let end = start + 2;
                self.pos = end;
                let kind = if marker == EOI {
                    SegmentKind::End
                } else {
                    SegmentKind::Standalone
                };
                Ok(Segment {
                    marker: Some(marker),
                    kind,
                    bytes: &data[start..end],
                })
            }
            _ => {
                let end = Self::segment_end(data, start, marker)?;
                if marker == SOS {
                    self.pos = len;
                    return Ok(Segment {
                        marker: Some(marker),
                        kind: SegmentKind::Scan,
                        bytes: &data[start..],
                    });
                }

                self.pos = end;
                let bytes = &data[start..end];
                let kind = if (APP0..=APP15).contains(&marker) {
                    SegmentKind::Metadata(classify_app_segment(marker, &bytes[4..]))
                } else {
                    SegmentKind::Structural
                };
                Ok(Segment {
                    marker: Some(marker),
                    kind,
                    bytes,
                })
            }
        }
    }

    /// End offset of a length-prefixed segment starting at `start`.
    fn segment_end(data: &[u8], start: usize, marker: u8) -> Result<usize, ScrubError> {
        if start + 4 > data.len() {
            return Err(ScrubError::InvalidContainer(format!(
                "truncated length field for marker 0x{:02X}",
                marker
            )));
        }
        let length = u16::from_be_bytes([data[start + 2], data[start + 3]]) as usize;
        if length < 2 {
            return Err(ScrubError::InvalidContainer(format!(
                "invalid segment length {} for marker 0x{:02X}",
                length, marker
            )));
        }
        let end = start + 2 + length;
        if end > data.len() {
            return Err(ScrubError::InvalidContainer(format!(
                "segment for marker 0x{:02X} overruns buffer",
                marker
            )));
        }
        Ok(end)
    }
}

impl<'a> Iterator for SegmentReader<'a> {
    type Item = Result<Segment<'a>, ScrubError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment().transpose()
    }
}

fn classify_app_segment(marker: u8, payload: &[u8]) -> MetadataKind {
    match marker {
        APP0 if payload.starts_with(JFIF_IDENT) => {
            // Thumbnail dimensions live at payload offsets 12 and 13.
            let has_thumbnail = payload.len() > 13 && (payload[12] != 0 || payload[13] != 0);
            if has_thumbnail || payload.len() > JFIF_MINIMAL_LENGTH as usize - 2 {
                MetadataKind::JfifThumbnail
            } else {
                MetadataKind::Jfif
            }
        }
        APP1 if payload.starts_with(EXIF_IDENT) => MetadataKind::Exif,
        APP1 if payload.starts_with(XMP_IDENT) || payload.starts_with(XMP_EXTENSION_IDENT) => {
            MetadataKind::Xmp
        }
        APP2 if payload.starts_with(ICC_IDENT) => MetadataKind::Icc,
        APP13 if payload.starts_with(IPTC_IDENT) => MetadataKind::Iptc,
        _ => MetadataKind::Other(marker - APP0),
    }
}

/// Rewrite a JFIF APP0 segment to the 16-byte header with no thumbnail.
fn minimal_jfif(segment: &Segment<'_>) -> Option<Vec<u8>> {
    let header = segment.payload().get(..12)?;
    let mut out = Vec::with_capacity(2 + JFIF_MINIMAL_LENGTH as usize);
    out.extend_from_slice(&[0xFF, APP0]);
    out.extend_from_slice(&JFIF_MINIMAL_LENGTH.to_be_bytes());
    out.extend_from_slice(header);
    out.extend_from_slice(&[0, 0]);
    Some(out)
}

/// Output of the marker walk.
#[derive(Debug, Clone)]
pub struct JpegScrub {
    pub bytes: Vec<u8>,
    /// Kinds of the segments that were dropped or rewritten, in file order.
    pub removed: Vec<MetadataKind>,
}

/// Remove every identifying application segment from a JPEG.
///
/// Everything from SOS to the end of the buffer is copied unchanged.
pub fn scrub_jpeg(data: &[u8]) -> Result<JpegScrub, ScrubError> {
    let mut bytes = Vec::with_capacity(data.len());
    let mut removed = Vec::new();

    for segment in SegmentReader::new(data)? {
        let segment = segment?;
        match segment.kind {
            SegmentKind::Metadata(MetadataKind::Jfif) => bytes.extend_from_slice(segment.bytes),
            SegmentKind::Metadata(MetadataKind::JfifThumbnail) => {
                let rewritten = minimal_jfif(&segment).ok_or_else(|| {
                    ScrubError::InvalidContainer("truncated JFIF header".to_string())
                })?;
                bytes.extend_from_slice(&rewritten);
                removed.push(MetadataKind::JfifThumbnail);
            }
            SegmentKind::Metadata(kind) => removed.push(kind),
            _ => bytes.extend_from_slice(segment.bytes),
        }
    }

    Ok(JpegScrub { bytes, removed })
}

/// List the application segments present in a JPEG, in file order.
pub fn metadata_segments(data: &[u8]) -> Result<Vec<MetadataKind>, ScrubError> {
    let mut kinds = Vec::new();
    for segment in SegmentReader::new(data)? {
        if let SegmentKind::Metadata(kind) = segment?.kind {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Check that a JPEG carries no identifying application segment.
///
/// Bytes before SOS that do not start with a marker cannot be walked, so
/// they may hide application segments; such a file fails verification.
pub fn verify_clean(data: &[u8]) -> Result<(), ScrubError> {
    for segment in SegmentReader::new(data)? {
        match segment?.kind {
            SegmentKind::Metadata(kind) if kind.is_identifying() => {
                return Err(ScrubError::ScrubFailure(format!(
                    "{} segment remains after scrubbing",
                    kind
                )));
            }
            SegmentKind::Raw => {
                return Err(ScrubError::ScrubFailure(
                    "unparseable bytes before start of scan".to_string(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
