//! JPEG/EXIF plumbing shared by the capture-time reader and the GPS writer.
//!
//! Only the APP1 "Exif" segment is ever touched. Offsets inside the TIFF
//! block stay valid because new IFDs are appended after the existing data
//! and nothing already there is moved.

use crate::encoding::{GpsTagSet, Rational};

pub(crate) const TAG_EXIF_IFD_POINTER: u16 = 0x8769;
pub(crate) const TAG_GPS_IFD_POINTER: u16 = 0x8825;

pub const GPS_VERSION_ID: u16 = 0x0000;
pub const GPS_LATITUDE_REF: u16 = 0x0001;
pub const GPS_LATITUDE: u16 = 0x0002;
pub const GPS_LONGITUDE_REF: u16 = 0x0003;
pub const GPS_LONGITUDE: u16 = 0x0004;
pub const GPS_ALTITUDE_REF: u16 = 0x0005;
pub const GPS_ALTITUDE: u16 = 0x0006;
pub const GPS_IMG_DIRECTION_REF: u16 = 0x0010;
pub const GPS_IMG_DIRECTION: u16 = 0x0011;
/// Camera roll/pitch, signed whole degrees. EXIF has no standard GPS tag for
/// these, so they sit in the private tag range.
pub const GPS_ROLL: u16 = 0xC000;
pub const GPS_PITCH: u16 = 0xC001;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_SRATIONAL: u16 = 10;

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;

pub(crate) const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// The 16-bit segment length also counts its own two bytes
const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

/// IFD0 with no entries, used when a JPEG carries no EXIF at all
const EMPTY_TIFF: [u8; 14] = [b'I', b'I', 42, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0];

type ExifResult<T> = std::result::Result<T, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        }
    }

    fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        }
    }

    fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Marker segment ahead of the scan data. `start` sits on the 0xFF,
/// `end` is exclusive.
struct Segment {
    marker: u8,
    start: usize,
    end: usize,
}

impl Segment {
    fn exif_tiff<'a>(&self, jpeg: &'a [u8]) -> Option<&'a [u8]> {
        if self.marker != MARKER_APP1 {
            return None;
        }
        jpeg[self.start + 4..self.end].strip_prefix(EXIF_HEADER)
    }
}

fn scan_segments(jpeg: &[u8]) -> ExifResult<Vec<Segment>> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != MARKER_SOI {
        return Err("not a JPEG file".to_string());
    }

    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 1 < jpeg.len() {
        if jpeg[pos] != 0xFF {
            return Err(format!("corrupt marker at offset {pos}"));
        }
        let marker = jpeg[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == MARKER_SOS || marker == MARKER_EOI {
            break;
        }
        // Standalone markers carry no length
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }

        let length = jpeg
            .get(pos + 2..pos + 4)
            .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
            .ok_or("truncated segment header")?;
        if length < 2 {
            return Err(format!("bad segment length at offset {pos}"));
        }
        let end = pos + 2 + length;
        if end > jpeg.len() {
            return Err("truncated segment".to_string());
        }
        segments.push(Segment {
            marker,
            start: pos,
            end,
        });
        pos = end;
    }

    Ok(segments)
}

/// TIFF block of the first APP1 "Exif" segment
pub(crate) fn find_exif_tiff(jpeg: &[u8]) -> ExifResult<&[u8]> {
    scan_segments(jpeg)?
        .iter()
        .find_map(|segment| segment.exif_tiff(jpeg))
        .ok_or_else(|| "no EXIF segment".to_string())
}

pub(crate) struct Entry {
    pub tag: u16,
    pub count: usize,
    /// Offset of the 4-byte value/offset field
    pub value_pos: usize,
}

pub(crate) struct Tiff<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Tiff<'a> {
    pub fn new(data: &'a [u8]) -> ExifResult<Self> {
        let order = match data.get(0..2) {
            Some(b"II") => ByteOrder::Little,
            Some(b"MM") => ByteOrder::Big,
            _ => return Err("bad TIFF byte order".to_string()),
        };
        let tiff = Tiff { data, order };
        if tiff.u16(2) != Some(42) {
            return Err("bad TIFF magic".to_string());
        }
        Ok(tiff)
    }

    pub fn u16(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(self.order.read_u16([b[0], b[1]]))
    }

    pub fn u32(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        Some(self.order.read_u32([b[0], b[1], b[2], b[3]]))
    }

    pub fn ifd0(&self) -> ExifResult<usize> {
        self.u32(4)
            .map(|offset| offset as usize)
            .ok_or_else(|| "truncated TIFF header".to_string())
    }

    pub fn entries(&self, ifd: usize) -> Option<Vec<Entry>> {
        let count = self.u16(ifd)? as usize;
        (0..count)
            .map(|i| {
                let pos = ifd + 2 + i * 12;
                Some(Entry {
                    tag: self.u16(pos)?,
                    count: self.u32(pos + 4)? as usize,
                    value_pos: pos + 8,
                })
            })
            .collect()
    }

    pub fn find_entry(&self, ifd: usize, tag: u16) -> Option<Entry> {
        self.entries(ifd)?.into_iter().find(|entry| entry.tag == tag)
    }

    /// Offset stored in a pointer tag (Exif or GPS sub-IFD)
    pub fn sub_ifd(&self, ifd: usize, tag: u16) -> Option<usize> {
        let entry = self.find_entry(ifd, tag)?;
        self.u32(entry.value_pos).map(|offset| offset as usize)
    }

    /// Raw value bytes; values over 4 bytes live at an offset
    fn value(&self, entry: &Entry, unit_size: usize) -> Option<&'a [u8]> {
        let len = entry.count.checked_mul(unit_size)?;
        let start = if len <= 4 {
            entry.value_pos
        } else {
            self.u32(entry.value_pos)? as usize
        };
        self.data.get(start..start.checked_add(len)?)
    }

    /// ASCII value with trailing NULs stripped
    pub fn ascii(&self, entry: &Entry) -> Option<String> {
        let raw = self.value(entry, 1)?;
        let text = String::from_utf8_lossy(raw);
        Some(text.trim_end_matches('\0').to_string())
    }

    pub fn byte(&self, entry: &Entry) -> Option<u8> {
        self.value(entry, 1)?.first().copied()
    }

    pub fn rationals(&self, entry: &Entry) -> Option<Vec<Rational>> {
        let raw = self.value(entry, 8)?;
        Some(
            raw.chunks_exact(8)
                .map(|c| Rational {
                    numerator: self.order.read_u32([c[0], c[1], c[2], c[3]]),
                    denominator: self.order.read_u32([c[4], c[5], c[6], c[7]]),
                })
                .collect(),
        )
    }

    pub fn srational(&self, entry: &Entry) -> Option<(i32, i32)> {
        let c = self.value(entry, 8)?.get(0..8)?;
        Some((
            self.order.read_u32([c[0], c[1], c[2], c[3]]) as i32,
            self.order.read_u32([c[4], c[5], c[6], c[7]]) as i32,
        ))
    }
}

/// Return a copy of `jpeg` whose EXIF carries `tags` as its GPS IFD.
///
/// An existing Exif APP1 keeps every byte it had. A new GPS IFD and a copy of
/// IFD0 pointing at it are appended, then the TIFF header is repointed to the
/// copy. Any earlier GPS IFD is left unreferenced. A JPEG without EXIF gets a
/// fresh APP1 after SOI and any leading APP0 (JFIF) segments.
pub fn embed_gps_tags(jpeg: &[u8], tags: &GpsTagSet) -> ExifResult<Vec<u8>> {
    let segments = scan_segments(jpeg)?;
    let existing = segments
        .iter()
        .find_map(|segment| segment.exif_tiff(jpeg).map(|tiff| (segment, tiff)));

    let (cut_start, cut_end, tiff) = match existing {
        Some((segment, tiff)) => (segment.start, segment.end, rebuild_tiff(tiff, tags)?),
        None => {
            let at = segments
                .iter()
                .take_while(|segment| segment.marker == MARKER_APP0)
                .last()
                .map_or(2, |segment| segment.end);
            (at, at, rebuild_tiff(&EMPTY_TIFF, tags)?)
        }
    };

    let payload_len = EXIF_HEADER.len() + tiff.len();
    if payload_len > MAX_SEGMENT_PAYLOAD {
        return Err(format!(
            "EXIF segment would grow to {payload_len} bytes, over the APP1 limit"
        ));
    }

    let mut out = Vec::with_capacity(jpeg.len() + payload_len + 4);
    out.extend_from_slice(&jpeg[..cut_start]);
    out.extend_from_slice(&[0xFF, MARKER_APP1]);
    out.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[cut_end..]);
    Ok(out)
}

fn rebuild_tiff(original: &[u8], tags: &GpsTagSet) -> ExifResult<Vec<u8>> {
    let tiff = Tiff::new(original)?;
    let order = tiff.order;
    let ifd0 = tiff.ifd0()?;
    let count = tiff.u16(ifd0).ok_or("truncated IFD0")? as usize;

    // Raw entries keep their byte order and any offsets into the old data
    let mut entries = (0..count)
        .map(|i| {
            let pos = ifd0 + 2 + i * 12;
            original
                .get(pos..pos + 12)
                .and_then(|raw| <[u8; 12]>::try_from(raw).ok())
        })
        .collect::<Option<Vec<[u8; 12]>>>()
        .ok_or("truncated IFD0")?;
    let next_ifd = tiff.u32(ifd0 + 2 + count * 12).ok_or("truncated IFD0")?;

    let mut out = original.to_vec();
    pad_to_word(&mut out);
    let gps_ifd = offset_of(&out)?;
    out.extend(build_gps_ifd(tags, order, gps_ifd));
    pad_to_word(&mut out);
    let new_ifd0 = offset_of(&out)?;

    let tag_of = |raw: &[u8; 12]| order.read_u16([raw[0], raw[1]]);
    entries.retain(|raw| tag_of(raw) != TAG_GPS_IFD_POINTER);
    entries.push(ifd_entry(
        order,
        TAG_GPS_IFD_POINTER,
        TYPE_LONG,
        1,
        order.u32_bytes(gps_ifd),
    ));
    entries.sort_by_key(|raw| tag_of(raw));

    out.extend_from_slice(&order.u16_bytes(entries.len() as u16));
    for raw in &entries {
        out.extend_from_slice(raw);
    }
    out.extend_from_slice(&order.u32_bytes(next_ifd));
    out[4..8].copy_from_slice(&order.u32_bytes(new_ifd0));
    Ok(out)
}

fn pad_to_word(buf: &mut Vec<u8>) {
    if buf.len() % 2 == 1 {
        buf.push(0);
    }
}

fn offset_of(buf: &[u8]) -> ExifResult<u32> {
    u32::try_from(buf.len()).map_err(|_| "TIFF block too large".to_string())
}

fn ifd_entry(order: ByteOrder, tag: u16, kind: u16, count: u32, value: [u8; 4]) -> [u8; 12] {
    let mut raw = [0u8; 12];
    raw[0..2].copy_from_slice(&order.u16_bytes(tag));
    raw[2..4].copy_from_slice(&order.u16_bytes(kind));
    raw[4..8].copy_from_slice(&order.u32_bytes(count));
    raw[8..12].copy_from_slice(&value);
    raw
}

struct Field {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl Field {
    fn ascii(tag: u16, text: &str) -> Self {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        Field {
            tag,
            kind: TYPE_ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn byte(tag: u16, values: &[u8]) -> Self {
        Field {
            tag,
            kind: TYPE_BYTE,
            count: values.len() as u32,
            data: values.to_vec(),
        }
    }

    fn rationals(order: ByteOrder, tag: u16, values: &[Rational]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for r in values {
            data.extend_from_slice(&order.u32_bytes(r.numerator));
            data.extend_from_slice(&order.u32_bytes(r.denominator));
        }
        Field {
            tag,
            kind: TYPE_RATIONAL,
            count: values.len() as u32,
            data,
        }
    }

    fn whole_degrees(order: ByteOrder, tag: u16, degrees: i32) -> Self {
        let mut data = Vec::with_capacity(8);
        data.extend_from_slice(&order.u32_bytes(degrees as u32));
        data.extend_from_slice(&order.u32_bytes(1));
        Field {
            tag,
            kind: TYPE_SRATIONAL,
            count: 1,
            data,
        }
    }
}

/// Serialised GPS IFD placed at TIFF offset `base`, entries in tag order.
fn build_gps_ifd(tags: &GpsTagSet, order: ByteOrder, base: u32) -> Vec<u8> {
    let mut fields = vec![
        Field::byte(GPS_VERSION_ID, &[2, 3, 0, 0]),
        Field::ascii(GPS_LATITUDE_REF, &tags.latitude_ref),
        Field::rationals(order, GPS_LATITUDE, &tags.latitude),
        Field::ascii(GPS_LONGITUDE_REF, &tags.longitude_ref),
        Field::rationals(order, GPS_LONGITUDE, &tags.longitude),
        Field::byte(GPS_ALTITUDE_REF, &[tags.altitude_ref]),
        Field::rationals(order, GPS_ALTITUDE, &[tags.altitude]),
        // Bearing from the track is relative to true north
        Field::ascii(GPS_IMG_DIRECTION_REF, "T"),
        Field::rationals(order, GPS_IMG_DIRECTION, &[tags.img_direction]),
    ];
    if let Some(roll) = tags.roll {
        fields.push(Field::whole_degrees(order, GPS_ROLL, roll));
    }
    if let Some(pitch) = tags.pitch {
        fields.push(Field::whole_degrees(order, GPS_PITCH, pitch));
    }

    let directory_len = 2 + fields.len() * 12 + 4;
    let mut out = Vec::with_capacity(directory_len);
    let mut values = Vec::new();

    out.extend_from_slice(&order.u16_bytes(fields.len() as u16));
    for field in &fields {
        let value = if field.data.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..field.data.len()].copy_from_slice(&field.data);
            inline
        } else {
            let offset = base + (directory_len + values.len()) as u32;
            values.extend_from_slice(&field.data);
            pad_to_word(&mut values);
            order.u32_bytes(offset)
        };
        out.extend_from_slice(&ifd_entry(order, field.tag, field.kind, field.count, value));
    }
    out.extend_from_slice(&order.u32_bytes(0));
    out.extend(values);
    out
}

/// GPS tags stored in `jpeg`, or `None` when it has no GPS IFD.
pub fn parse_gps_tags(jpeg: &[u8]) -> ExifResult<Option<GpsTagSet>> {
    let tiff = Tiff::new(find_exif_tiff(jpeg)?)?;
    let Some(gps) = tiff.sub_ifd(tiff.ifd0()?, TAG_GPS_IFD_POINTER) else {
        return Ok(None);
    };
    let entries = tiff.entries(gps).ok_or("truncated GPS IFD")?;

    let unreadable = |tag: u16| format!("missing or unreadable GPS tag 0x{tag:04X}");
    let lookup = |tag: u16| {
        entries
            .iter()
            .find(|entry| entry.tag == tag)
            .ok_or_else(|| unreadable(tag))
    };
    let ascii = |tag: u16| -> ExifResult<String> {
        tiff.ascii(lookup(tag)?).ok_or_else(|| unreadable(tag))
    };
    let single = |tag: u16| -> ExifResult<Rational> {
        tiff.rationals(lookup(tag)?)
            .and_then(|values| values.first().copied())
            .ok_or_else(|| unreadable(tag))
    };
    let triple = |tag: u16| -> ExifResult<[Rational; 3]> {
        let values = tiff.rationals(lookup(tag)?).ok_or_else(|| unreadable(tag))?;
        <[Rational; 3]>::try_from(values).map_err(|_| unreadable(tag))
    };
    let whole_degrees = |tag: u16| -> ExifResult<Option<i32>> {
        let Some(entry) = entries.iter().find(|entry| entry.tag == tag) else {
            return Ok(None);
        };
        match tiff.srational(entry) {
            Some((numerator, denominator)) if denominator != 0 => {
                Ok(Some(numerator / denominator))
            }
            _ => Err(unreadable(tag)),
        }
    };

    Ok(Some(GpsTagSet {
        latitude_ref: ascii(GPS_LATITUDE_REF)?,
        latitude: triple(GPS_LATITUDE)?,
        longitude_ref: ascii(GPS_LONGITUDE_REF)?,
        longitude: triple(GPS_LONGITUDE)?,
        altitude_ref: tiff
            .byte(lookup(GPS_ALTITUDE_REF)?)
            .ok_or_else(|| unreadable(GPS_ALTITUDE_REF))?,
        altitude: single(GPS_ALTITUDE)?,
        img_direction: single(GPS_IMG_DIRECTION)?,
        roll: whole_degrees(GPS_ROLL)?,
        pitch: whole_degrees(GPS_PITCH)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::parse_capture_time;
    use crate::capture::test_support::exif_jpeg;
    use crate::encoding::GpsTagEncoder;
    use crate::types::InterpolatedFix;
    use chrono::NaiveDate;

    fn tags(roll: Option<f64>, pitch: Option<f64>) -> GpsTagSet {
        GpsTagEncoder::default()
            .encode(&InterpolatedFix {
                latitude: 45.0005,
                longitude: -9.0005,
                elevation: 105.25,
                heading: 35.3,
                roll,
                pitch,
            })
            .unwrap()
    }

    #[test]
    fn test_embed_and_read_back_little_endian() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", Some("123"), false);
        let expected = tags(Some(2.7), Some(-4.2));

        let tagged = embed_gps_tags(&jpeg, &expected).unwrap();
        let read = parse_gps_tags(&tagged).unwrap().expect("GPS IFD written");

        assert_eq!(read, expected);
        assert_eq!(read.longitude_ref, "W");
        assert_eq!(read.roll, Some(2));
        assert_eq!(read.pitch, Some(-4));
        assert_eq!(
            read.altitude,
            Rational {
                numerator: 421,
                denominator: 4
            }
        );
    }

    #[test]
    fn test_embed_keeps_capture_time_big_endian() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", Some("500"), true);
        let tagged = embed_gps_tags(&jpeg, &tags(None, None)).unwrap();

        let expected = NaiveDate::from_ymd_opt(2018, 10, 23)
            .unwrap()
            .and_hms_milli_opt(9, 5, 18, 500)
            .unwrap();
        assert_eq!(parse_capture_time(&tagged).unwrap(), expected);

        let read = parse_gps_tags(&tagged).unwrap().unwrap();
        assert_eq!(read.roll, None);
        assert_eq!(read.pitch, None);
        assert_eq!(read, tags(None, None));
    }

    #[test]
    fn test_embed_twice_replaces_gps() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", None, false);
        let first = embed_gps_tags(&jpeg, &tags(Some(5.0), None)).unwrap();
        let second = embed_gps_tags(&first, &tags(None, Some(3.0))).unwrap();

        let read = parse_gps_tags(&second).unwrap().unwrap();
        assert_eq!(read.roll, None);
        assert_eq!(read.pitch, Some(3));

        let tiff = Tiff::new(find_exif_tiff(&second).unwrap()).unwrap();
        let pointers = tiff
            .entries(tiff.ifd0().unwrap())
            .unwrap()
            .into_iter()
            .filter(|entry| entry.tag == TAG_GPS_IFD_POINTER)
            .count();
        assert_eq!(pointers, 1);
        assert!(tiff.find_entry(tiff.ifd0().unwrap(), TAG_EXIF_IFD_POINTER).is_some());
    }

    #[test]
    fn test_embed_into_jpeg_without_exif() {
        let jfif = [
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00, 0xFF, 0xDA, 0x00,
            0x02, 0x12, 0x34, 0xFF, 0xD9,
        ];
        assert_eq!(find_exif_tiff(&jfif).unwrap_err(), "no EXIF segment");

        let tagged = embed_gps_tags(&jfif, &tags(None, None)).unwrap();
        // APP1 lands right after the APP0 segment, scan data untouched
        assert_eq!(&tagged[..11], &jfif[..11]);
        assert_eq!(&tagged[11..13], &[0xFF, MARKER_APP1]);
        assert!(tagged.ends_with(&jfif[11..]));
        assert_eq!(parse_gps_tags(&tagged).unwrap(), Some(tags(None, None)));
    }

    #[test]
    fn test_no_gps_ifd() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", None, false);
        assert_eq!(parse_gps_tags(&jpeg).unwrap(), None);
    }

    #[test]
    fn test_rejects_non_jpeg() {
        assert!(embed_gps_tags(b"\x89PNG\r\n\x1a\n", &tags(None, None)).is_err());
        assert!(parse_gps_tags(&[]).is_err());
    }

    #[test]
    fn test_zero_length_segment_is_corrupt() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x00, 0xFF, 0xD9];
        assert!(find_exif_tiff(&jpeg).unwrap_err().contains("bad segment length"));
    }
}
