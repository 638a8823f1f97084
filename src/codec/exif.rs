//! Minimal EXIF reader for the TIFF-structured block decoders hand back.
//!
//! Walks IFD0 and, when IFD0 points at one, the Exif sub-IFD (tag 0x8769).
//! Only the value types the metadata model needs are decoded: ASCII, the
//! unsigned integers and unsigned rationals. Malformed entries are skipped
//! one at a time; the block as a whole only fails when the header is bad.

use std::collections::BTreeMap;

pub const TAG_MAKE: u16 = 0x010F;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_DATETIME: u16 = 0x0132;
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_EXPOSURE_TIME: u16 = 0x829A;
pub const TAG_FNUMBER: u16 = 0x829D;
pub const TAG_ISO: u16 = 0x8827;
pub const TAG_DATETIME_ORIGINAL: u16 = 0x9003;
pub const TAG_DATETIME_DIGITIZED: u16 = 0x9004;
pub const TAG_FLASH: u16 = 0x9209;
pub const TAG_FOCAL_LENGTH: u16 = 0x920A;
pub const TAG_EXPOSURE_MODE: u16 = 0xA402;
pub const TAG_WHITE_BALANCE: u16 = 0xA403;
pub const TAG_SCENE_CAPTURE_TYPE: u16 = 0xA406;
pub const TAG_LENS_MODEL: u16 = 0xA434;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Ascii(String),
    /// BYTE, SHORT or LONG; first value only.
    Unsigned(u32),
    /// RATIONAL as (numerator, denominator); first value only.
    Rational(u32, u32),
}

/// Decoded tags from IFD0 and the Exif sub-IFD, keyed by tag number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifTags {
    entries: BTreeMap<u16, ExifValue>,
}

impl ExifTags {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn ascii(&self, tag: u16) -> Option<&str> {
        match self.entries.get(&tag)? {
            ExifValue::Ascii(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn unsigned(&self, tag: u16) -> Option<u32> {
        match self.entries.get(&tag)? {
            ExifValue::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    pub fn rational(&self, tag: u16) -> Option<(u32, u32)> {
        match self.entries.get(&tag)? {
            ExifValue::Rational(n, d) => Some((*n, *d)),
            _ => None,
        }
    }
}

/// Byte-order aware reader over a TIFF block.
struct Tiff<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl Tiff<'_> {
    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        Some(if self.big_endian {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    /// Decode one 12-byte IFD entry. `None` for unsupported types or
    /// out-of-range offsets.
    fn entry(&self, entry_offset: usize) -> Option<(u16, ExifValue)> {
        let tag = self.u16_at(entry_offset)?;
        let typ = self.u16_at(entry_offset + 2)?;
        let count = self.u32_at(entry_offset + 4)? as usize;
        if count == 0 {
            return None;
        }

        let type_size = match typ {
            1 | 2 | 7 => 1, // BYTE, ASCII, UNDEFINED
            3 => 2,         // SHORT
            4 => 4,         // LONG
            5 => 8,         // RATIONAL
            _ => return None,
        };
        let byte_len = count.checked_mul(type_size)?;
        // Values of four bytes or fewer are stored inline.
        let value_offset = if byte_len <= 4 {
            entry_offset + 8
        } else {
            self.u32_at(entry_offset + 8)? as usize
        };
        let raw = self.data.get(value_offset..value_offset.checked_add(byte_len)?)?;

        let value = match typ {
            2 => {
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                ExifValue::Ascii(String::from_utf8_lossy(&raw[..end]).trim().to_string())
            }
            1 | 7 => ExifValue::Unsigned(raw[0] as u32),
            3 => ExifValue::Unsigned(self.u16_at(value_offset)? as u32),
            4 => ExifValue::Unsigned(self.u32_at(value_offset)?),
            5 => ExifValue::Rational(self.u32_at(value_offset)?, self.u32_at(value_offset + 4)?),
            _ => return None,
        };
        Some((tag, value))
    }

    /// Read every decodable entry of the IFD at `offset` into `out`.
    /// Returns the Exif sub-IFD offset when the IFD carries one.
    fn read_ifd(&self, offset: usize, out: &mut BTreeMap<u16, ExifValue>) -> Option<usize> {
        let count = self.u16_at(offset)? as usize;
        let mut sub_ifd = None;
        for i in 0..count {
            let entry_offset = offset + 2 + i * 12;
            if entry_offset + 12 > self.data.len() {
                break;
            }
            match self.entry(entry_offset) {
                Some((TAG_EXIF_IFD, ExifValue::Unsigned(ptr))) => sub_ifd = Some(ptr as usize),
                Some((tag, value)) => {
                    out.insert(tag, value);
                }
                None => continue,
            }
        }
        sub_ifd
    }
}

/// Parse an EXIF block. Accepts the block with or without the
/// `Exif\0\0` APP1 prefix. Returns `None` when the TIFF header is invalid.
pub fn parse(block: &[u8]) -> Option<ExifTags> {
    let data = block.strip_prefix(EXIF_HEADER).unwrap_or(block);
    let big_endian = match data.get(0..2)? {
        b"MM" => true,
        b"II" => false,
        _ => return None,
    };
    let tiff = Tiff { data, big_endian };
    if tiff.u16_at(2)? != 42 {
        return None;
    }

    let mut entries = BTreeMap::new();
    let ifd0 = tiff.u32_at(4)? as usize;
    if let Some(sub) = tiff.read_ifd(ifd0, &mut entries)
        && sub != ifd0
    {
        tiff.read_ifd(sub, &mut entries);
    }
    Some(ExifTags { entries })
}
