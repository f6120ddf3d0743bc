//! ISO Base Media File Format (ISOBMFF) box handling.
//!
//! A box is laid out as `[size: u32][type: 4 ASCII bytes][payload]`. A size
//! field of `0` means the box extends to the end of the buffer; a size field
//! of `1` means a 64-bit size follows the type. All readers in this module
//! are non-throwing for "not found" and "incomplete" cases and only error on
//! a declared size the box header itself cannot satisfy.
//!
//! Reference: ISO 14496-12 (ISO Base Media File Format).

pub mod chunks;
pub mod emsg;
pub mod protection;
pub mod timing;

use crate::{MizukiError, MizukiResult};

/// A 4-character box type code, e.g. `*b"moof"`.
pub type BoxName = [u8; 4];

/// Offsets of one box inside its containing buffer:
/// `[start, content)` is the header, `[content, end)` the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxOffsets {
    pub start: usize,
    pub content: usize,
    pub end: usize,
}

struct RawBox {
    name: BoxName,
    offsets: BoxOffsets,
}

pub(crate) fn be_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn be_u64(buf: &[u8], at: usize) -> u64 {
    ((be_u32(buf, at) as u64) << 32) | be_u32(buf, at + 4) as u64
}

fn display_name(name: &BoxName) -> String {
    String::from_utf8_lossy(name).into_owned()
}

/// Read the box starting at `cursor`.
///
/// `Ok(None)` when there are not enough bytes to read the header, or when
/// the declared size overruns the buffer (the box is incomplete). An error
/// is returned only for a declared size smaller than the header itself.
fn read_box_at(buf: &[u8], cursor: usize) -> MizukiResult<Option<RawBox>> {
    if cursor + 8 > buf.len() {
        return Ok(None);
    }
    let size32 = be_u32(buf, cursor);
    let name: BoxName = [buf[cursor + 4], buf[cursor + 5], buf[cursor + 6], buf[cursor + 7]];

    let (size, content) = match size32 {
        0 => ((buf.len() - cursor) as u64, cursor + 8),
        1 => {
            if cursor + 16 > buf.len() {
                return Ok(None);
            }
            let size64 = be_u64(buf, cursor + 8);
            if size64 < 16 {
                return Err(MizukiError::InvalidBoxSize {
                    name: display_name(&name),
                    size: size64,
                });
            }
            (size64, cursor + 16)
        }
        s if s < 8 => {
            return Err(MizukiError::InvalidBoxSize {
                name: display_name(&name),
                size: s as u64,
            });
        }
        s => (s as u64, cursor + 8),
    };

    let Some(end) = (cursor as u64).checked_add(size) else {
        return Err(MizukiError::InvalidBoxSize {
            name: display_name(&name),
            size,
        });
    };
    if end > buf.len() as u64 {
        return Ok(None);
    }
    let end = end as usize;

    // uuid boxes carry their 128-bit extended type as the first 16 payload
    // bytes; the content proper starts after it.
    let content = if &name == b"uuid" {
        if content + 16 > end {
            return Ok(None);
        }
        content + 16
    } else {
        content
    };

    Ok(Some(RawBox {
        name,
        offsets: BoxOffsets {
            start: cursor,
            content,
            end,
        },
    }))
}

/// Offsets of the first box in `buf`, whatever its type.
pub fn get_next_box_offsets(buf: &[u8]) -> MizukiResult<Option<BoxOffsets>> {
    Ok(read_box_at(buf, 0)?.map(|b| b.offsets))
}

/// Offsets of the first complete box named `name` among the top-level boxes
/// of `buf`.
pub fn get_box_offsets(buf: &[u8], name: BoxName) -> MizukiResult<Option<BoxOffsets>> {
    let mut cursor = 0;
    while cursor < buf.len() {
        let Some(b) = read_box_at(buf, cursor)? else {
            return Ok(None);
        };
        if b.name == name {
            return Ok(Some(b.offsets));
        }
        cursor = b.offsets.end;
    }
    Ok(None)
}

/// The first complete box named `name`, header included.
pub fn get_box<'a>(buf: &'a [u8], name: BoxName) -> MizukiResult<Option<&'a [u8]>> {
    Ok(get_box_offsets(buf, name)?.map(|o| &buf[o.start..o.end]))
}

/// Payload of the first complete box named `name`.
pub fn get_box_content<'a>(buf: &'a [u8], name: BoxName) -> MizukiResult<Option<&'a [u8]>> {
    Ok(get_box_offsets(buf, name)?.map(|o| &buf[o.content..o.end]))
}

/// Payloads of every complete top-level box named `name`, in document order.
pub fn get_boxes_content<'a>(buf: &'a [u8], name: BoxName) -> MizukiResult<Vec<&'a [u8]>> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while cursor < buf.len() {
        let Some(b) = read_box_at(buf, cursor)? else {
            break;
        };
        if b.name == name {
            found.push(&buf[b.offsets.content..b.offsets.end]);
        }
        cursor = b.offsets.end;
    }
    Ok(found)
}

/// Walk a nested `path` of box names and return the payload of the innermost
/// box, e.g. `get_child_box(segment, &[*b"moof", *b"traf", *b"tfdt"])`.
pub fn get_child_box<'a>(buf: &'a [u8], path: &[BoxName]) -> MizukiResult<Option<&'a [u8]>> {
    let mut current = buf;
    for name in path {
        match get_box_content(current, *name)? {
            Some(content) => current = content,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Payload of the first `uuid` box whose 128-bit extended type matches the
/// given four big-endian words. The returned slice starts after the 16-byte
/// UUID field.
pub fn get_uuid_content<'a>(
    buf: &'a [u8],
    id1: u32,
    id2: u32,
    id3: u32,
    id4: u32,
) -> MizukiResult<Option<&'a [u8]>> {
    let mut cursor = 0;
    while cursor < buf.len() {
        let Some(b) = read_box_at(buf, cursor)? else {
            return Ok(None);
        };
        if &b.name == b"uuid" {
            // The extended type sits right before the already-advanced
            // content offset.
            let uuid_at = b.offsets.content - 16;
            if be_u32(buf, uuid_at) == id1
                && be_u32(buf, uuid_at + 4) == id2
                && be_u32(buf, uuid_at + 8) == id3
                && be_u32(buf, uuid_at + 12) == id4
            {
                return Ok(Some(&buf[b.offsets.content..b.offsets.end]));
            }
        }
        cursor = b.offsets.end;
    }
    Ok(None)
}

/// Serialize a box. The 64-bit extended size encoding is selected when the
/// total length does not fit the 32-bit size field.
pub fn create_box(name: BoxName, payload: &[u8]) -> Vec<u8> {
    let total = payload.len() as u64 + 8;
    if total <= u32::MAX as u64 {
        let mut out = Vec::with_capacity(total as usize);
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(payload);
        out
    } else {
        let total = payload.len() as u64 + 16;
        let mut out = Vec::with_capacity(total as usize);
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&name);
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }
}

/// Serialize a container box from already-serialized children.
pub fn create_box_with_children(name: BoxName, children: &[&[u8]]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(children.iter().map(|c| c.len()).sum());
    for child in children {
        payload.extend_from_slice(child);
    }
    create_box(name, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_read_box() {
        let payload = [1u8, 2, 3, 4, 5];
        let sized = create_box(*b"mdat", &payload);
        assert_eq!(sized.len(), 13);
        assert_eq!(get_box_content(&sized, *b"mdat").unwrap().unwrap(), &payload);
        assert_eq!(get_box(&sized, *b"mdat").unwrap().unwrap(), &sized[..]);
    }

    #[test]
    fn test_box_not_found_is_none() {
        let buffer = create_box(*b"mdat", &[0; 4]);
        assert!(get_box_content(&buffer, *b"moof").unwrap().is_none());
    }

    #[test]
    fn test_incomplete_box_is_none() {
        let buffer = create_box(*b"mdat", &[0; 16]);
        // Truncating the declared payload makes the box incomplete, not invalid.
        assert!(get_box(&buffer[..10], *b"mdat").unwrap().is_none());
        assert!(get_box(&buffer[..3], *b"mdat").unwrap().is_none());
    }

    #[test]
    fn test_invalid_declared_size_is_error() {
        let mut buffer = create_box(*b"mdat", &[0; 4]);
        buffer[..4].copy_from_slice(&2u32.to_be_bytes());
        assert!(get_box(&buffer, *b"mdat").is_err());
    }

    #[test]
    fn test_size_zero_extends_to_end() {
        let mut buffer = create_box(*b"mdat", &[9u8; 6]);
        buffer[..4].copy_from_slice(&0u32.to_be_bytes());
        let offsets = get_box_offsets(&buffer, *b"mdat").unwrap().unwrap();
        assert_eq!(offsets.end, buffer.len());
        assert_eq!(get_box_content(&buffer, *b"mdat").unwrap().unwrap(), &[9u8; 6]);
    }

    #[test]
    fn test_extended_size_encoding() {
        // A small box is still allowed to use the 64-bit size form.
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&1u32.to_be_bytes());
        buffer.extend_from_slice(b"mdat");
        buffer.extend_from_slice(&20u64.to_be_bytes());
        buffer.extend_from_slice(&[7u8; 4]);

        let offsets = get_box_offsets(&buffer, *b"mdat").unwrap().unwrap();
        assert_eq!(offsets.content, 16);
        assert_eq!(offsets.end, 20);
        assert_eq!(get_box_content(&buffer, *b"mdat").unwrap().unwrap(), &[7u8; 4]);
    }

    #[test]
    fn test_child_box_walk() {
        let tfdt = create_box(*b"tfdt", &[0u8; 8]);
        let traf = create_box_with_children(*b"traf", &[&tfdt]);
        let moof = create_box_with_children(*b"moof", &[&traf]);

        let content = get_child_box(&moof, &[*b"moof", *b"traf", *b"tfdt"])
            .unwrap()
            .unwrap();
        assert_eq!(content, &[0u8; 8]);
        assert!(get_child_box(&moof, &[*b"moof", *b"trun"]).unwrap().is_none());
    }

    #[test]
    fn test_boxes_content_in_order() {
        let a = create_box(*b"free", &[1]);
        let b = create_box(*b"mdat", &[2]);
        let c = create_box(*b"free", &[3]);
        let buffer = [a, b, c].concat();

        let found = get_boxes_content(&buffer, *b"free").unwrap();
        assert_eq!(found, vec![&[1u8][..], &[3u8][..]]);
    }

    #[test]
    fn test_uuid_content() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x6d1d9b05u32.to_be_bytes());
        payload.extend_from_slice(&0x42d544e6u32.to_be_bytes());
        payload.extend_from_slice(&0x80e2141du32.to_be_bytes());
        payload.extend_from_slice(&0xaff757b2u32.to_be_bytes());
        payload.extend_from_slice(&[0xAB; 3]);
        let buffer = create_box(*b"uuid", &payload);

        let content = get_uuid_content(&buffer, 0x6d1d9b05, 0x42d544e6, 0x80e2141d, 0xaff757b2)
            .unwrap()
            .unwrap();
        assert_eq!(content, &[0xAB; 3]);

        // The reported content offset skips the 16-byte extended type.
        let offsets = get_box_offsets(&buffer, *b"uuid").unwrap().unwrap();
        assert_eq!(offsets.content, 8 + 16);

        assert!(get_uuid_content(&buffer, 0, 0, 0, 0).unwrap().is_none());
    }
}
