//! Capture-time extraction from JPEG EXIF
//!
//! IFD0 → Exif sub-IFD → DateTimeOriginal (+ SubSecTimeOriginal), in either
//! TIFF byte order. Only what geotagging needs is decoded.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::error::{GeotagError, Result};
use crate::exif::{find_exif_tiff, Tiff, TAG_EXIF_IFD_POINTER};

const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_SUB_SEC_TIME_ORIGINAL: u16 = 0x9291;

/// Read the camera's wall-clock capture time (no zone attached).
///
/// Every failure, unreadable file included, is a `CaptureTime` error for
/// this image only.
pub fn read_capture_time(path: &Path) -> Result<NaiveDateTime> {
    let capture_error = |reason: String| GeotagError::CaptureTime {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| capture_error(e.to_string()))?;
    parse_capture_time(&bytes).map_err(capture_error)
}

pub fn parse_capture_time(jpeg: &[u8]) -> std::result::Result<NaiveDateTime, String> {
    let tiff = Tiff::new(find_exif_tiff(jpeg)?)?;

    let exif_ifd = tiff
        .sub_ifd(tiff.ifd0()?, TAG_EXIF_IFD_POINTER)
        .ok_or("no Exif sub-IFD")?;

    let original = tiff
        .find_entry(exif_ifd, TAG_DATE_TIME_ORIGINAL)
        .and_then(|entry| tiff.ascii(&entry))
        .ok_or("no DateTimeOriginal")?;
    let subsec = tiff
        .find_entry(exif_ifd, TAG_SUB_SEC_TIME_ORIGINAL)
        .and_then(|entry| tiff.ascii(&entry));

    let base = NaiveDateTime::parse_from_str(original.trim(), "%Y:%m:%d %H:%M:%S")
        .map_err(|e| format!("bad DateTimeOriginal {original:?}: {e}"))?;

    match subsec {
        Some(digits) => Ok(base + Duration::nanoseconds(subsec_nanos(&digits)?)),
        None => {
            log::debug!("No SubSecTimeOriginal, using whole seconds");
            Ok(base)
        }
    }
}

/// "5" → 0.5 s, "123" → 0.123 s, "1234567891" → truncated to nanoseconds
fn subsec_nanos(digits: &str) -> std::result::Result<i64, String> {
    let digits = digits.trim();
    if digits.is_empty() {
        return Ok(0);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("bad SubSecTimeOriginal {digits:?}"));
    }
    let mut padded: String = digits.chars().take(9).collect();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded
        .parse::<i64>()
        .map_err(|e| format!("bad SubSecTimeOriginal {digits:?}: {e}"))
}

/// Minimal EXIF JPEG builder shared by tests across the crate.
#[cfg(test)]
pub(crate) mod test_support {
    /// SOI + APP1(Exif: IFD0 → Exif IFD with DateTimeOriginal [+ SubSec]) + EOI
    pub fn exif_jpeg(date_time: &str, subsec: Option<&str>, big_endian: bool) -> Vec<u8> {
        let put16 = |out: &mut Vec<u8>, v: u16| {
            if big_endian {
                out.extend_from_slice(&v.to_be_bytes())
            } else {
                out.extend_from_slice(&v.to_le_bytes())
            }
        };
        let put32 = |out: &mut Vec<u8>, v: u32| {
            if big_endian {
                out.extend_from_slice(&v.to_be_bytes())
            } else {
                out.extend_from_slice(&v.to_le_bytes())
            }
        };

        let mut date_bytes = date_time.as_bytes().to_vec();
        date_bytes.push(0);
        let subsec_bytes = subsec.map(|s| {
            let mut b = s.as_bytes().to_vec();
            b.push(0);
            b
        });

        let entries = 1 + subsec_bytes.is_some() as u32;
        let ifd0_offset = 8u32;
        let exif_ifd_offset = ifd0_offset + 2 + 12 + 4;
        let data_offset = exif_ifd_offset + 2 + 12 * entries + 4;

        let mut tiff = Vec::new();
        tiff.extend_from_slice(if big_endian { b"MM" } else { b"II" });
        put16(&mut tiff, 42);
        put32(&mut tiff, ifd0_offset);

        // IFD0
        put16(&mut tiff, 1);
        put16(&mut tiff, super::TAG_EXIF_IFD_POINTER);
        put16(&mut tiff, 4);
        put32(&mut tiff, 1);
        put32(&mut tiff, exif_ifd_offset);
        put32(&mut tiff, 0);

        // Exif IFD
        let mut extra = Vec::new();
        put16(&mut tiff, entries as u16);
        put16(&mut tiff, super::TAG_DATE_TIME_ORIGINAL);
        put16(&mut tiff, 2);
        put32(&mut tiff, date_bytes.len() as u32);
        put32(&mut tiff, data_offset);
        extra.extend_from_slice(&date_bytes);

        if let Some(bytes) = &subsec_bytes {
            put16(&mut tiff, super::TAG_SUB_SEC_TIME_ORIGINAL);
            put16(&mut tiff, 2);
            put32(&mut tiff, bytes.len() as u32);
            if bytes.len() <= 4 {
                let mut inline = bytes.clone();
                inline.resize(4, 0);
                tiff.extend_from_slice(&inline);
            } else {
                put32(&mut tiff, data_offset + extra.len() as u32);
                extra.extend_from_slice(bytes);
            }
        }
        put32(&mut tiff, 0);
        tiff.extend_from_slice(&extra);

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);

        let mut jpeg = vec![0xFF, 0xD8];
        // APP0 JFIF stub ahead of APP1, as many cameras write it
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
        jpeg.extend_from_slice(&[0xFF, 0xE1]);
        jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(&app1);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::exif_jpeg;
    use super::*;
    use chrono::NaiveDate;

    fn expected(millis: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 10, 23)
            .unwrap()
            .and_hms_milli_opt(9, 5, 18, millis)
            .unwrap()
    }

    #[test]
    fn test_little_endian_with_subsec() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", Some("123"), false);
        assert_eq!(parse_capture_time(&jpeg).unwrap(), expected(123));
    }

    #[test]
    fn test_big_endian_long_subsec() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", Some("45000"), true);
        assert_eq!(parse_capture_time(&jpeg).unwrap(), expected(450));
    }

    #[test]
    fn test_without_subsec() {
        let jpeg = exif_jpeg("2018:10:23 09:05:18", None, false);
        assert_eq!(parse_capture_time(&jpeg).unwrap(), expected(0));
    }

    #[test]
    fn test_subsec_nanos() {
        assert_eq!(subsec_nanos("5").unwrap(), 500_000_000);
        assert_eq!(subsec_nanos("123").unwrap(), 123_000_000);
        assert_eq!(subsec_nanos("1234567891").unwrap(), 123_456_789);
        assert_eq!(subsec_nanos("  ").unwrap(), 0);
        assert!(subsec_nanos("1a").is_err());
    }

    #[test]
    fn test_rejects_non_jpeg() {
        assert!(parse_capture_time(b"\x89PNG\r\n\x1a\n").is_err());
        assert!(parse_capture_time(&[]).is_err());
    }

    #[test]
    fn test_jpeg_without_exif() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9];
        let err = parse_capture_time(&jpeg).unwrap_err();
        assert!(err.contains("no EXIF"));
    }

    #[test]
    fn test_bad_date() {
        let jpeg = exif_jpeg("0000:00:00 00:00:00", None, false);
        assert!(parse_capture_time(&jpeg).is_err());
    }

    #[test]
    fn test_read_capture_time_reports_path() {
        let path = std::env::temp_dir().join(format!("geotag_capture_{}.jpg", std::process::id()));
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        let err = read_capture_time(&path).unwrap_err();
        assert!(matches!(err, GeotagError::CaptureTime { .. }));
        assert!(err.is_per_image());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_per_image() {
        let path = std::env::temp_dir().join("geotag_capture_does_not_exist.jpg");
        let err = read_capture_time(&path).unwrap_err();
        assert!(matches!(err, GeotagError::CaptureTime { .. }));
        assert!(err.is_per_image());
    }
}
