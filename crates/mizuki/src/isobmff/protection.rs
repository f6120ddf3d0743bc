//! `pssh` ("Protection System Specific Header") extraction.

use bytes::Bytes;

use super::{get_box_offsets, MizukiResult};

/// One DRM initialization payload pulled out of an initialization segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionData {
    /// The protection system identifier, rendered as 32 lowercase hex
    /// characters.
    pub system_id: String,
    /// The complete `pssh` box bytes, copied out before the in-place blanking
    /// so they stay pristine.
    pub data: Bytes,
}

/// Extract every `pssh` box found under the segment's `moov` box.
///
/// Each extracted box is blanked in place: its 4-byte type field is
/// overwritten with `free`, leaving size and payload untouched, so the buffer
/// length and the offsets of every following box are preserved.
///
/// Precondition: the caller hands over the buffer for mutation. A caller that
/// still needs the original `moov` bytes must copy them before calling.
pub fn take_pssh_out(segment: &mut [u8]) -> MizukiResult<Vec<ProtectionData>> {
    let mut extracted = Vec::new();

    let Some(moov) = get_box_offsets(segment, *b"moov")? else {
        return Ok(extracted);
    };

    // Blanked boxes no longer match, so rescanning from the start of moov
    // always lands on the next untouched pssh.
    loop {
        let moov_content = &segment[moov.content..moov.end];
        let Some(pssh) = get_box_offsets(moov_content, *b"pssh")? else {
            return Ok(extracted);
        };

        let start = moov.content + pssh.start;
        let content = moov.content + pssh.content;
        let end = moov.content + pssh.end;

        if let Some(system_id) = get_pssh_system_id(&segment[content..end]) {
            extracted.push(ProtectionData {
                system_id,
                data: Bytes::copy_from_slice(&segment[start..end]),
            });
        }

        segment[start + 4..start + 8].copy_from_slice(b"free");
    }
}

/// Read the protection system id of a `pssh` payload.
///
/// Versions 0 and 1 carry the 16-byte id right after the version/flags word.
/// Later versions are skipped: the box is still blanked and walked over using
/// its declared size, but contributes no system id.
fn get_pssh_system_id(content: &[u8]) -> Option<String> {
    if content.len() < 20 {
        tracing::warn!(len = content.len(), "pssh box too short for a system id");
        return None;
    }
    let version = content[0];
    if version > 1 {
        tracing::warn!(version, "Unsupported pssh version");
        return None;
    }
    Some(hex::encode(&content[4..20]))
}
