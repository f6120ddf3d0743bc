//! `emsg` ("Event Message") box parsing and the DASH manifest-refresh
//! signal it can carry.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{MizukiError, MizukiResult};

use super::{be_u32, get_next_box_offsets};

/// Scheme of the DASH "manifest validity expiration" inband event
/// ([DASH] 5.10.4).
const MANIFEST_VALIDITY_SCHEME: &str = "urn:mpeg:dash:event:2012";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmsgMessage {
    pub scheme_id_uri: String,
    pub value: String,
    pub timescale: u32,
    pub presentation_time_delta: u32,
    pub event_duration: u32,
    pub id: u32,
    pub message_data: Bytes,
}

/// Parse every top-level `emsg` box of `buffer`, in document order.
///
/// Only version 0 is handled; other versions are logged and left out of the
/// result. `Ok(None)` when the buffer contains no `emsg` box at all.
pub fn parse_emsg_boxes(buffer: &[u8]) -> MizukiResult<Option<Vec<EmsgMessage>>> {
    let mut messages = Vec::new();
    let mut found = false;
    let mut cursor = 0;

    while cursor < buffer.len() {
        let Some(offsets) = get_next_box_offsets(&buffer[cursor..])? else {
            break;
        };
        let start = cursor + offsets.start;
        if &buffer[start + 4..start + 8] == b"emsg" {
            found = true;
            let content = &buffer[cursor + offsets.content..cursor + offsets.end];
            if let Some(message) = parse_emsg(content)? {
                messages.push(message);
            }
        }
        cursor += offsets.end;
    }

    Ok(found.then_some(messages))
}

fn parse_emsg(content: &[u8]) -> MizukiResult<Option<EmsgMessage>> {
    if content.len() < 4 {
        return Err(MizukiError::TruncatedBox("emsg"));
    }
    let version = content[0];
    if version != 0 {
        tracing::warn!(version, "Unhandled emsg version");
        return Ok(None);
    }

    let mut at = 4;
    let scheme_id_uri = read_terminated_string(content, &mut at)?;
    let value = read_terminated_string(content, &mut at)?;

    if at + 16 > content.len() {
        return Err(MizukiError::TruncatedBox("emsg"));
    }
    let timescale = be_u32(content, at);
    let presentation_time_delta = be_u32(content, at + 4);
    let event_duration = be_u32(content, at + 8);
    let id = be_u32(content, at + 12);
    let message_data = Bytes::copy_from_slice(&content[at + 16..]);

    Ok(Some(EmsgMessage {
        scheme_id_uri,
        value,
        timescale,
        presentation_time_delta,
        event_duration,
        id,
        message_data,
    }))
}

fn read_terminated_string(content: &[u8], at: &mut usize) -> MizukiResult<String> {
    let rest = &content[*at..];
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(MizukiError::TruncatedBox("emsg"))?;
    let s = String::from_utf8_lossy(&rest[..end]).into_owned();
    *at += end + 1;
    Ok(s)
}

/// Whether an inband event requires the manifest to be re-fetched.
///
/// A "manifest validity expiration" event carries an ISO-8601 timestamp as
/// its message data; the manifest must be refreshed when that timestamp is
/// not older than the publish time of the manifest currently in use.
pub fn needs_manifest_refresh(
    messages: &[EmsgMessage],
    manifest_publish_time: DateTime<Utc>,
) -> bool {
    messages.iter().any(|message| {
        if message.scheme_id_uri != MANIFEST_VALIDITY_SCHEME || message.value != "1" {
            return false;
        }
        let Ok(text) = std::str::from_utf8(&message.message_data) else {
            return false;
        };
        match parse_iso8601(text.trim()) {
            Some(expiration) => expiration >= manifest_publish_time,
            None => {
                tracing::warn!(data = text, "Unparseable manifest expiration timestamp");
                false
            }
        }
    })
}

fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Allow Z suffix for UTC, which is not strictly RFC3339 but used by xsdate
            DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ").map(|dt| dt.with_timezone(&Utc))
        })
        .ok()
}
