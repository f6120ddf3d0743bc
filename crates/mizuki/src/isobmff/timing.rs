//! Timing extraction from segment bytes: `sidx` subsegment tables, `tfdt`
//! decode times, `trun`/`tfhd` durations, `mdhd` timescales, and the Smooth
//! Streaming `tfxd`/`tfrf` vendor boxes.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

use crate::{ByteRange, MizukiError, MizukiResult};

use super::{
    be_u32, be_u64, get_box_offsets, get_boxes_content, get_box_content, get_child_box,
    get_uuid_content,
};

/// One subsegment as described by a `sidx` reference entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidxSegment {
    /// Presentation time, in `timescale` units.
    pub time: u64,
    /// Duration, in `timescale` units.
    pub duration: u64,
    pub timescale: u32,
    /// Byte range of the subsegment inside the whole segment resource.
    pub range: ByteRange,
}

/// Smooth Streaming `tfxd`/`tfrf` fragment time information, in the media
/// timescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentTimeInfo {
    pub time: u64,
    pub duration: u64,
}

// tfxd: 6d1d9b05-42d5-44e6-80e2-141daff757b2
const TFXD_UUID: [u32; 4] = [0x6d1d_9b05, 0x42d5_44e6, 0x80e2_141d, 0xaff7_57b2];
// tfrf: d4807ef2-ca39-4695-8e54-26cb9e46a79f
const TFRF_UUID: [u32; 4] = [0xd480_7ef2, 0xca39_4695, 0x8e54_26cb, 0x9e46_a79f];

fn truncated(name: &'static str) -> impl Fn(std::io::Error) -> MizukiError {
    move |_| MizukiError::TruncatedBox(name)
}

/// Parse the first `sidx` box of `buffer` into subsegment descriptors.
///
/// `sidx_offset` is the byte offset of the `sidx` box inside the whole
/// segment resource; reference byte ranges are expressed relative to that
/// resource. Returns `Ok(None)` when no complete `sidx` is present or its
/// version is unhandled. A reference of type 1 (a reference to another
/// `sidx`) is a hard error.
pub fn get_segments_from_sidx(
    buffer: &[u8],
    sidx_offset: u64,
) -> MizukiResult<Option<Vec<SidxSegment>>> {
    let Some(offsets) = get_box_offsets(buffer, *b"sidx")? else {
        return Ok(None);
    };
    let content = &buffer[offsets.content..offsets.end];
    let mut r = Cursor::new(content);

    let version = r.read_u8().map_err(truncated("sidx"))?;
    r.set_position(4); // flags
    let _reference_id = r.read_u32::<BigEndian>().map_err(truncated("sidx"))?;
    let timescale = r.read_u32::<BigEndian>().map_err(truncated("sidx"))?;

    let (mut time, first_offset) = match version {
        0 => {
            let time = r.read_u32::<BigEndian>().map_err(truncated("sidx"))? as u64;
            let offset = r.read_u32::<BigEndian>().map_err(truncated("sidx"))? as u64;
            (time, offset)
        }
        1 => {
            let time = r.read_u64::<BigEndian>().map_err(truncated("sidx"))?;
            let offset = r.read_u64::<BigEndian>().map_err(truncated("sidx"))?;
            (time, offset)
        }
        version => {
            tracing::warn!(version, "Unhandled sidx version");
            return Ok(None);
        }
    };

    let _reserved = r.read_u16::<BigEndian>().map_err(truncated("sidx"))?;
    let reference_count = r.read_u16::<BigEndian>().map_err(truncated("sidx"))?;

    // References locate bytes after the sidx box itself.
    let mut offset = sidx_offset + (offsets.end - offsets.start) as u64 + first_offset;
    let mut segments = Vec::with_capacity(reference_count as usize);

    for _ in 0..reference_count {
        // 1 bit reference_type, 31 bits reference_size.
        let chunk = r.read_u32::<BigEndian>().map_err(truncated("sidx"))?;
        if chunk & 0x8000_0000 != 0 {
            return Err(MizukiError::HierarchicalSidx);
        }
        let reference_size = (chunk & 0x7FFF_FFFF) as u64;
        let duration = r.read_u32::<BigEndian>().map_err(truncated("sidx"))? as u64;
        let _sap = r.read_u32::<BigEndian>().map_err(truncated("sidx"))?;

        segments.push(SidxSegment {
            time,
            duration,
            timescale,
            range: ByteRange::new(offset, Some(reference_size)),
        });
        time += duration;
        offset += reference_size;
    }

    Ok(Some(segments))
}

/// Base media decode time of the first `moof`/`traf`/`tfdt` found.
pub fn get_track_fragment_decode_time(buffer: &[u8]) -> MizukiResult<Option<u64>> {
    let Some(tfdt) = get_child_box(buffer, &[*b"moof", *b"traf", *b"tfdt"])? else {
        return Ok(None);
    };
    if tfdt.is_empty() {
        return Err(MizukiError::TruncatedBox("tfdt"));
    }
    match tfdt[0] {
        0 if tfdt.len() >= 8 => Ok(Some(be_u32(tfdt, 4) as u64)),
        1 if tfdt.len() >= 12 => Ok(Some(be_u64(tfdt, 4))),
        0 | 1 => Err(MizukiError::TruncatedBox("tfdt")),
        version => {
            tracing::warn!(version, "Unhandled tfdt version");
            Ok(None)
        }
    }
}

/// Total duration covered by every `trun` of every `traf` in `buffer`, in the
/// track timescale.
///
/// `Ok(None)` when any fragment cannot resolve a duration (no per-sample
/// durations and no `tfhd` default); the caller falls back to the
/// manifest-declared duration.
pub fn get_duration_from_trun(buffer: &[u8]) -> MizukiResult<Option<u64>> {
    let mut total = 0u64;
    let mut found_traf = false;
    for moof in get_boxes_content(buffer, *b"moof")? {
        for traf in get_boxes_content(moof, *b"traf")? {
            found_traf = true;
            match duration_from_traf(traf)? {
                Some(duration) => total += duration,
                None => return Ok(None),
            }
        }
    }
    Ok(found_traf.then_some(total))
}

fn duration_from_traf(traf: &[u8]) -> MizukiResult<Option<u64>> {
    let truns = get_boxes_content(traf, *b"trun")?;
    if truns.is_empty() {
        return Ok(None);
    }
    let mut total = 0u64;
    for trun in truns {
        match duration_from_trun(traf, trun)? {
            Some(duration) => total += duration,
            None => return Ok(None),
        }
    }
    Ok(Some(total))
}

fn duration_from_trun(traf: &[u8], trun: &[u8]) -> MizukiResult<Option<u64>> {
    if trun.len() < 8 {
        return Err(MizukiError::TruncatedBox("trun"));
    }
    let version = trun[0];
    if version > 1 {
        tracing::warn!(version, "Unhandled trun version");
        return Ok(None);
    }
    let flags = u32::from_be_bytes([0, trun[1], trun[2], trun[3]]);
    let sample_count = be_u32(trun, 4) as u64;

    if flags & 0x00_0100 == 0 {
        // No per-sample durations; every sample uses the tfhd default.
        let Some(default_duration) = default_sample_duration(traf)? else {
            return Ok(None);
        };
        return Ok(Some(default_duration as u64 * sample_count));
    }

    let mut at = 8;
    if flags & 0x00_0001 != 0 {
        at += 4; // data-offset
    }
    if flags & 0x00_0004 != 0 {
        at += 4; // first-sample-flags
    }
    let mut stride = 4;
    if flags & 0x00_0200 != 0 {
        stride += 4; // sample-size
    }
    if flags & 0x00_0400 != 0 {
        stride += 4; // sample-flags
    }
    if flags & 0x00_0800 != 0 {
        stride += 4; // sample-composition-time-offset
    }

    let mut total = 0u64;
    for i in 0..sample_count as usize {
        let sample_at = at + i * stride;
        if sample_at + 4 > trun.len() {
            tracing::debug!("trun sample table shorter than its declared sample count");
            return Ok(None);
        }
        total += be_u32(trun, sample_at) as u64;
    }
    Ok(Some(total))
}

fn default_sample_duration(traf: &[u8]) -> MizukiResult<Option<u32>> {
    let Some(tfhd) = get_box_content(traf, *b"tfhd")? else {
        return Ok(None);
    };
    if tfhd.len() < 8 {
        return Err(MizukiError::TruncatedBox("tfhd"));
    }
    let flags = u32::from_be_bytes([0, tfhd[1], tfhd[2], tfhd[3]]);
    if flags & 0x00_0008 == 0 {
        return Ok(None);
    }
    let mut at = 8; // version/flags + track_id
    if flags & 0x00_0001 != 0 {
        at += 8; // base-data-offset
    }
    if flags & 0x00_0002 != 0 {
        at += 4; // sample-description-index
    }
    if at + 4 > tfhd.len() {
        return Err(MizukiError::TruncatedBox("tfhd"));
    }
    Ok(Some(be_u32(tfhd, at)))
}

/// Timescale declared by the first `moov`/`trak`/`mdia`/`mdhd`.
pub fn get_mdhd_timescale(buffer: &[u8]) -> MizukiResult<Option<u32>> {
    let Some(mdhd) = get_child_box(buffer, &[*b"moov", *b"trak", *b"mdia", *b"mdhd"])? else {
        return Ok(None);
    };
    if mdhd.is_empty() {
        return Err(MizukiError::TruncatedBox("mdhd"));
    }
    let timescale = match mdhd[0] {
        0 if mdhd.len() >= 16 => be_u32(mdhd, 12),
        1 if mdhd.len() >= 24 => be_u32(mdhd, 20),
        0 | 1 => return Err(MizukiError::TruncatedBox("mdhd")),
        version => {
            tracing::warn!(version, "Unhandled mdhd version");
            return Ok(None);
        }
    };
    Ok((timescale != 0).then_some(timescale))
}

/// Absolute time and duration of a Smooth fragment, from the `tfxd` vendor
/// box inside a `traf` payload.
pub fn parse_tfxd(traf: &[u8]) -> MizukiResult<Option<FragmentTimeInfo>> {
    let Some(content) = get_uuid_content(
        traf,
        TFXD_UUID[0],
        TFXD_UUID[1],
        TFXD_UUID[2],
        TFXD_UUID[3],
    )?
    else {
        return Ok(None);
    };
    if content.is_empty() {
        return Err(MizukiError::TruncatedBox("tfxd"));
    }
    match content[0] {
        0 if content.len() >= 12 => Ok(Some(FragmentTimeInfo {
            time: be_u32(content, 4) as u64,
            duration: be_u32(content, 8) as u64,
        })),
        1 if content.len() >= 20 => Ok(Some(FragmentTimeInfo {
            time: be_u64(content, 4),
            duration: be_u64(content, 12),
        })),
        0 | 1 => Err(MizukiError::TruncatedBox("tfxd")),
        version => {
            tracing::warn!(version, "Unhandled tfxd version");
            Ok(None)
        }
    }
}

/// Upcoming-fragment announcements from the `tfrf` vendor box inside a `traf`
/// payload. Empty when the box is absent or its version unhandled.
pub fn parse_tfrf(traf: &[u8]) -> MizukiResult<Vec<FragmentTimeInfo>> {
    let Some(content) = get_uuid_content(
        traf,
        TFRF_UUID[0],
        TFRF_UUID[1],
        TFRF_UUID[2],
        TFRF_UUID[3],
    )?
    else {
        return Ok(Vec::new());
    };
    if content.len() < 5 {
        return Err(MizukiError::TruncatedBox("tfrf"));
    }
    let version = content[0];
    if version > 1 {
        tracing::warn!(version, "Unhandled tfrf version");
        return Ok(Vec::new());
    }
    let fragment_count = content[4] as usize;
    let entry_size = if version == 1 { 16 } else { 8 };
    if 5 + fragment_count * entry_size > content.len() {
        return Err(MizukiError::TruncatedBox("tfrf"));
    }

    let mut fragments = Vec::with_capacity(fragment_count);
    for i in 0..fragment_count {
        let at = 5 + i * entry_size;
        fragments.push(if version == 1 {
            FragmentTimeInfo {
                time: be_u64(content, at),
                duration: be_u64(content, at + 8),
            }
        } else {
            FragmentTimeInfo {
                time: be_u32(content, at) as u64,
                duration: be_u32(content, at + 4) as u64,
            }
        });
    }
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::super::{create_box, create_box_with_children};
    use super::*;

    fn build_sidx(
        version: u8,
        timescale: u32,
        earliest: u64,
        first_offset: u64,
        references: &[(u32, u32)], // (size, duration)
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(version);
        payload.extend_from_slice(&[0; 3]);
        payload.extend_from_slice(&1u32.to_be_bytes()); // reference_ID
        payload.extend_from_slice(&timescale.to_be_bytes());
        if version == 0 {
            payload.extend_from_slice(&(earliest as u32).to_be_bytes());
            payload.extend_from_slice(&(first_offset as u32).to_be_bytes());
        } else {
            payload.extend_from_slice(&earliest.to_be_bytes());
            payload.extend_from_slice(&first_offset.to_be_bytes());
        }
        payload.extend_from_slice(&0u16.to_be_bytes());
        payload.extend_from_slice(&(references.len() as u16).to_be_bytes());
        for (size, duration) in references {
            payload.extend_from_slice(&size.to_be_bytes());
            payload.extend_from_slice(&duration.to_be_bytes());
            payload.extend_from_slice(&0u32.to_be_bytes());
        }
        create_box(*b"sidx", &payload)
    }

    #[test]
    fn test_sidx_v0() {
        let sidx = build_sidx(0, 1000, 0, 0, &[(100, 10), (200, 20), (300, 30)]);
        let segments = get_segments_from_sidx(&sidx, 50).unwrap().unwrap();
        assert_eq!(segments.len(), 3);

        let base = 50 + sidx.len() as u64;
        assert_eq!(segments[0].time, 0);
        assert_eq!(segments[0].range, ByteRange::new(base, Some(100)));
        assert_eq!(segments[1].time, 10);
        assert_eq!(segments[1].range, ByteRange::new(base + 100, Some(200)));
        assert_eq!(segments[2].time, 30);
        assert_eq!(segments[2].range, ByteRange::new(base + 300, Some(300)));
        assert!(segments.iter().all(|s| s.timescale == 1000));
    }

    #[test]
    fn test_sidx_hierarchical_reference_is_error() {
        let sidx = build_sidx(0, 1000, 0, 0, &[(0x8000_0064, 10)]);
        assert!(get_segments_from_sidx(&sidx, 0).is_err());
    }

    #[test]
    fn test_tfdt_versions() {
        let tfdt_v0 = create_box(*b"tfdt", &{
            let mut p = vec![0, 0, 0, 0];
            p.extend_from_slice(&90000u32.to_be_bytes());
            p
        });
        let moof = create_box_with_children(
            *b"moof",
            &[&create_box_with_children(*b"traf", &[&tfdt_v0])],
        );
        assert_eq!(get_track_fragment_decode_time(&moof).unwrap(), Some(90000));

        let tfdt_v1 = create_box(*b"tfdt", &{
            let mut p = vec![1, 0, 0, 0];
            p.extend_from_slice(&(u32::MAX as u64 + 5).to_be_bytes());
            p
        });
        let moof = create_box_with_children(
            *b"moof",
            &[&create_box_with_children(*b"traf", &[&tfdt_v1])],
        );
        assert_eq!(
            get_track_fragment_decode_time(&moof).unwrap(),
            Some(u32::MAX as u64 + 5)
        );
    }

    fn trun_with_sample_durations(durations: &[u32]) -> Vec<u8> {
        let mut p = vec![0, 0, 0x01, 0x00]; // version 0, sample-duration-present
        p.extend_from_slice(&(durations.len() as u32).to_be_bytes());
        for d in durations {
            p.extend_from_slice(&d.to_be_bytes());
        }
        create_box(*b"trun", &p)
    }

    #[test]
    fn test_trun_per_sample_durations() {
        let trun = trun_with_sample_durations(&[100, 200, 300]);
        let traf = create_box_with_children(*b"traf", &[&trun]);
        let moof = create_box_with_children(*b"moof", &[&traf]);
        assert_eq!(get_duration_from_trun(&moof).unwrap(), Some(600));
    }

    #[test]
    fn test_trun_default_duration_from_tfhd() {
        let mut trun_payload = vec![0, 0, 0, 0]; // no per-sample fields
        trun_payload.extend_from_slice(&5u32.to_be_bytes());
        let trun = create_box(*b"trun", &trun_payload);

        // default-sample-duration present + base-data-offset present shifts
        // the field by 8 bytes.
        let mut tfhd_payload = vec![0, 0, 0, 0x09];
        tfhd_payload.extend_from_slice(&1u32.to_be_bytes()); // track_ID
        tfhd_payload.extend_from_slice(&0u64.to_be_bytes()); // base data offset
        tfhd_payload.extend_from_slice(&250u32.to_be_bytes());
        let tfhd = create_box(*b"tfhd", &tfhd_payload);

        let traf = create_box_with_children(*b"traf", &[&tfhd, &trun]);
        let moof = create_box_with_children(*b"moof", &[&traf]);
        assert_eq!(get_duration_from_trun(&moof).unwrap(), Some(1250));
    }

    #[test]
    fn test_trun_without_duration_information() {
        let mut trun_payload = vec![0, 0, 0, 0];
        trun_payload.extend_from_slice(&5u32.to_be_bytes());
        let trun = create_box(*b"trun", &trun_payload);

        let mut tfhd_payload = vec![0, 0, 0, 0]; // no default duration
        tfhd_payload.extend_from_slice(&1u32.to_be_bytes());
        let tfhd = create_box(*b"tfhd", &tfhd_payload);

        let traf = create_box_with_children(*b"traf", &[&tfhd, &trun]);
        let moof = create_box_with_children(*b"moof", &[&traf]);
        assert_eq!(get_duration_from_trun(&moof).unwrap(), None);
    }

    #[test]
    fn test_mdhd_timescale() {
        let mut p = vec![0, 0, 0, 0];
        p.extend_from_slice(&0u32.to_be_bytes()); // creation
        p.extend_from_slice(&0u32.to_be_bytes()); // modification
        p.extend_from_slice(&48000u32.to_be_bytes());
        p.extend_from_slice(&0u32.to_be_bytes()); // duration
        let mdhd = create_box(*b"mdhd", &p);
        let moov = create_box_with_children(
            *b"moov",
            &[&create_box_with_children(
                *b"trak",
                &[&create_box_with_children(*b"mdia", &[&mdhd])],
            )],
        );
        assert_eq!(get_mdhd_timescale(&moov).unwrap(), Some(48000));
    }

    fn uuid_box(uuid: [u32; 4], content: &[u8]) -> Vec<u8> {
        let mut payload = Vec::new();
        for word in uuid {
            payload.extend_from_slice(&word.to_be_bytes());
        }
        payload.extend_from_slice(content);
        create_box(*b"uuid", &payload)
    }

    #[test]
    fn test_tfxd() {
        let mut content = vec![1, 0, 0, 0];
        content.extend_from_slice(&123456789u64.to_be_bytes());
        content.extend_from_slice(&20000000u64.to_be_bytes());
        let traf = uuid_box(TFXD_UUID, &content);

        let info = parse_tfxd(&traf).unwrap().unwrap();
        assert_eq!(info.time, 123456789);
        assert_eq!(info.duration, 20000000);
    }

    #[test]
    fn test_tfrf() {
        let mut content = vec![1, 0, 0, 0, 2];
        content.extend_from_slice(&100u64.to_be_bytes());
        content.extend_from_slice(&10u64.to_be_bytes());
        content.extend_from_slice(&110u64.to_be_bytes());
        content.extend_from_slice(&10u64.to_be_bytes());
        let traf = uuid_box(TFRF_UUID, &content);

        let fragments = parse_tfrf(&traf).unwrap();
        assert_eq!(
            fragments,
            vec![
                FragmentTimeInfo {
                    time: 100,
                    duration: 10
                },
                FragmentTimeInfo {
                    time: 110,
                    duration: 10
                },
            ]
        );
        assert!(parse_tfrf(&uuid_box(TFXD_UUID, &[0; 12])).unwrap().is_empty());
    }
}
