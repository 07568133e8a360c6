//! EXIF metadata as a JSON-friendly bag.
//!
//! Parsing is done by `kamadak-exif`; this module only flattens the primary
//! IFD into tag name → value:
//! - ASCII → string (trailing NULs trimmed)
//! - BYTE / SHORT / LONG and their signed forms → integer
//! - RATIONAL / SRATIONAL / FLOAT / DOUBLE → float
//!
//! Single values are stored bare, multiple values as arrays. UNDEFINED blobs
//! and IFD pointers are skipped. Metadata is best-effort: a block that fails
//! to parse yields an empty map.

use std::collections::BTreeMap;
use std::io::Cursor;

use ::exif::{Field, In, Reader, Tag, Value as ExifValue};
use serde_json::Value;

/// EXIF payload carried by the pipeline: tag name → value.
pub type Exif = BTreeMap<String, Value>;

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const MAX_VALUES: usize = 64;

/// Parse a raw TIFF-structured EXIF block, with or without the `Exif\0\0`
/// prefix.
pub fn parse_exif(raw: &[u8]) -> Exif {
    let data = raw.strip_prefix(EXIF_HEADER).unwrap_or(raw);
    match Reader::new().read_raw(data.to_vec()) {
        Ok(exif) => collect(exif.fields()),
        Err(e) => {
            tracing::debug!(error = %e, "unreadable EXIF block");
            Exif::new()
        }
    }
}

/// Read EXIF from a whole container file (JPEG, TIFF, PNG, WebP).
pub fn read_container(bytes: &[u8]) -> Exif {
    match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => collect(exif.fields()),
        Err(e) => {
            tracing::debug!(error = %e, "no EXIF in container");
            Exif::new()
        }
    }
}

fn collect<'a>(fields: impl Iterator<Item = &'a Field>) -> Exif {
    fields
        .filter(|f| f.ifd_num == In::PRIMARY && !is_pointer(f.tag))
        .filter_map(|f| Some((f.tag.to_string(), to_json(&f.value)?)))
        .collect()
}

fn is_pointer(tag: Tag) -> bool {
    matches!(
        tag,
        Tag::ExifIFDPointer | Tag::GPSInfoIFDPointer | Tag::InteropIFDPointer
    )
}

fn to_json(value: &ExifValue) -> Option<Value> {
    let values: Vec<Value> = match value {
        ExifValue::Ascii(strings) => {
            let text = strings
                .iter()
                .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let text = text.trim();
            return (!text.is_empty()).then(|| Value::String(text.to_string()));
        }
        ExifValue::Byte(v) => numbers(v),
        ExifValue::Short(v) => numbers(v),
        ExifValue::Long(v) => numbers(v),
        ExifValue::SByte(v) => numbers(v),
        ExifValue::SShort(v) => numbers(v),
        ExifValue::SLong(v) => numbers(v),
        ExifValue::Rational(v) => v
            .iter()
            .filter(|r| r.denom != 0)
            .map(|r| Value::from(r.to_f64()))
            .collect(),
        ExifValue::SRational(v) => v
            .iter()
            .filter(|r| r.denom != 0)
            .map(|r| Value::from(r.to_f64()))
            .collect(),
        ExifValue::Float(v) => numbers(v),
        ExifValue::Double(v) => numbers(v),
        _ => return None,
    };

    let mut values: Vec<Value> = values.into_iter().take(MAX_VALUES).collect();
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => Some(Value::Array(values)),
    }
}

fn numbers<T: Copy + Into<Value>>(v: &[T]) -> Vec<Value> {
    v.iter().map(|&n| n.into()).collect()
}
