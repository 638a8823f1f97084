//! ICC profile header and description reader.
//!
//! Only three things are read: the data color space signature (header bytes
//! 16..20), the creation date (header bytes 24..36) and the `desc` tag,
//! which is either the v2 ASCII `desc` type or the v4 UTF-16 `mluc` type.
//! All integers in an ICC profile are big-endian.

use chrono::{NaiveDate, NaiveDateTime};

const HEADER_LEN: usize = 128;
const DESC_SIGNATURE: &[u8; 4] = b"desc";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IccHeader {
    /// Human name of the data color space (`"RGB"`, `"Grayscale"`, ...).
    pub color_space: Option<&'static str>,
    pub created: Option<NaiveDateTime>,
    pub description: Option<String>,
}

fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let b = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let b = data.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Read what we can from a profile. Never fails; missing pieces are `None`.
pub fn parse(profile: &[u8]) -> IccHeader {
    if profile.len() < HEADER_LEN {
        return IccHeader::default();
    }
    IccHeader {
        color_space: color_space(profile),
        created: creation_date(profile),
        description: description(profile),
    }
}

fn color_space(profile: &[u8]) -> Option<&'static str> {
    match profile.get(16..20)? {
        b"RGB " => Some("RGB"),
        b"GRAY" => Some("Grayscale"),
        b"CMYK" => Some("CMYK"),
        b"Lab " => Some("Lab"),
        _ => None,
    }
}

fn creation_date(profile: &[u8]) -> Option<NaiveDateTime> {
    let field = |i: usize| be_u16(profile, 24 + i * 2).map(u32::from);
    NaiveDate::from_ymd_opt(field(0)? as i32, field(1)?, field(2)?)?
        .and_hms_opt(field(3)?, field(4)?, field(5)?)
}

/// Locate the `desc` tag in the tag table and decode its text.
fn description(profile: &[u8]) -> Option<String> {
    let tag_count = be_u32(profile, HEADER_LEN)? as usize;
    for i in 0..tag_count {
        let entry = HEADER_LEN + 4 + i * 12;
        if profile.get(entry..entry + 4)? != DESC_SIGNATURE {
            continue;
        }
        let offset = be_u32(profile, entry + 4)? as usize;
        let size = be_u32(profile, entry + 8)? as usize;
        let tag = profile.get(offset..offset.checked_add(size)?)?;
        return decode_text_tag(tag);
    }
    None
}

fn decode_text_tag(tag: &[u8]) -> Option<String> {
    let text = match tag.get(0..4)? {
        b"desc" => {
            // textDescriptionType: sig, reserved, ASCII count, ASCII bytes
            let count = be_u32(tag, 8)? as usize;
            let raw = tag.get(12..12 + count)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            String::from_utf8_lossy(&raw[..end]).into_owned()
        }
        b"mluc" => {
            // multiLocalizedUnicodeType: take the first record
            let records = be_u32(tag, 8)?;
            if records == 0 {
                return None;
            }
            let len = be_u32(tag, 16 + 4)? as usize;
            let offset = be_u32(tag, 16 + 8)? as usize;
            let raw = tag.get(offset..offset.checked_add(len)?)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
                .trim_end_matches('\0')
                .to_string()
        }
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a minimal profile with the given color space and a `desc` tag.
    pub(crate) fn build_profile(space: &[u8; 4], desc_tag: Option<Vec<u8>>) -> Vec<u8> {
        let mut p = vec![0u8; HEADER_LEN];
        p[16..20].copy_from_slice(space);
        for (i, v) in [2023u16, 6, 15, 12, 30, 45].iter().enumerate() {
            p[24 + i * 2..26 + i * 2].copy_from_slice(&v.to_be_bytes());
        }
        match desc_tag {
            Some(tag) => {
                p.extend_from_slice(&1u32.to_be_bytes());
                let offset = (HEADER_LEN + 4 + 12) as u32;
                p.extend_from_slice(DESC_SIGNATURE);
                p.extend_from_slice(&offset.to_be_bytes());
                p.extend_from_slice(&(tag.len() as u32).to_be_bytes());
                p.extend_from_slice(&tag);
            }
            None => p.extend_from_slice(&0u32.to_be_bytes()),
        }
        let size = p.len() as u32;
        p[0..4].copy_from_slice(&size.to_be_bytes());
        p
    }

    pub(crate) fn ascii_desc(text: &str) -> Vec<u8> {
        let mut tag = b"desc".to_vec();
        tag.extend_from_slice(&[0; 4]);
        tag.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
        tag.extend_from_slice(text.as_bytes());
        tag.push(0);
        tag
    }

    fn mluc_desc(text: &str) -> Vec<u8> {
        let utf16: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let mut tag = b"mluc".to_vec();
        tag.extend_from_slice(&[0; 4]);
        tag.extend_from_slice(&1u32.to_be_bytes());
        tag.extend_from_slice(&12u32.to_be_bytes());
        tag.extend_from_slice(b"enUS");
        tag.extend_from_slice(&(utf16.len() as u32).to_be_bytes());
        tag.extend_from_slice(&28u32.to_be_bytes());
        tag.extend_from_slice(&utf16);
        tag
    }

    #[test]
    fn short_profile_yields_nothing() {
        assert_eq!(parse(&[0u8; 40]), IccHeader::default());
    }

    #[test]
    fn reads_color_space_and_date() {
        let header = parse(&build_profile(b"RGB ", None));
        assert_eq!(header.color_space, Some("RGB"));
        let created = header.created.unwrap();
        assert_eq!(created.to_string(), "2023-06-15 12:30:45");
        assert_eq!(header.description, None);
    }

    #[test]
    fn reads_v2_ascii_description() {
        let header = parse(&build_profile(b"GRAY", Some(ascii_desc("Dot Gain 20%"))));
        assert_eq!(header.color_space, Some("Grayscale"));
        assert_eq!(header.description.as_deref(), Some("Dot Gain 20%"));
    }

    #[test]
    fn reads_v4_mluc_description() {
        let header = parse(&build_profile(b"RGB ", Some(mluc_desc("Display P3"))));
        assert_eq!(header.description.as_deref(), Some("Display P3"));
    }

    #[test]
    fn unknown_color_space_is_none() {
        let header = parse(&build_profile(b"XYZ ", None));
        assert_eq!(header.color_space, None);
    }

    #[test]
    fn zero_date_is_none() {
        let mut p = build_profile(b"CMYK", None);
        p[24..36].fill(0);
        assert_eq!(parse(&p).created, None);
        assert_eq!(parse(&p).color_space, Some("CMYK"));
    }
}
