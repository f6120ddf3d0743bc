//! Complete-chunk extraction for low-latency segment ingestion.
//!
//! While a segment response is still growing, every `moof` + `mdat` pair it
//! already fully contains can be handed to the buffer sink without waiting
//! for the rest of the response.

use bytes::Bytes;

use crate::MizukiResult;

use super::{get_next_box_offsets, BoxOffsets};

/// Split a possibly partial fragmented-MP4 byte stream into its complete
/// chunks and the remaining partial tail.
///
/// A chunk is `[moof_start, max(moof_end, mdat_end))` for a complete `moof`
/// followed by a complete `mdat` (other boxes may sit between them; they end
/// up inside the chunk). Complete chunks are concatenated in order. The tail
/// starts at the first byte that may still become part of a future chunk, so
/// that feeding `tail + more bytes` back in loses nothing.
pub fn extract_complete_chunks(buffer: &[u8]) -> MizukiResult<(Option<Bytes>, Option<Bytes>)> {
    let mut chunks: Vec<u8> = Vec::new();
    let mut cursor = 0;

    let tail_from = loop {
        // Locate the next complete moof.
        let moof = match scan_for(buffer, cursor, *b"moof")? {
            Scan::Found(offsets) => offsets,
            Scan::Incomplete(at) => break Some(at),
            Scan::Exhausted => break None,
        };

        // Then a complete mdat somewhere after it. Anything incomplete past
        // this point keeps the whole pending chunk in the tail.
        let mdat = match scan_for(buffer, moof.end, *b"mdat")? {
            Scan::Found(offsets) => offsets,
            Scan::Incomplete(_) | Scan::Exhausted => break Some(moof.start),
        };

        let chunk_end = moof.end.max(mdat.end);
        chunks.extend_from_slice(&buffer[moof.start..chunk_end]);
        cursor = chunk_end;
    };

    let chunks = if chunks.is_empty() {
        None
    } else {
        Some(Bytes::from(chunks))
    };
    let tail = match tail_from {
        Some(at) if at < buffer.len() => Some(Bytes::copy_from_slice(&buffer[at..])),
        _ => None,
    };
    Ok((chunks, tail))
}

enum Scan {
    Found(BoxOffsets),
    /// An incomplete box starts here; nothing after it can be read yet.
    Incomplete(usize),
    Exhausted,
}

fn scan_for(buffer: &[u8], mut cursor: usize, name: super::BoxName) -> MizukiResult<Scan> {
    while cursor < buffer.len() {
        let Some(offsets) = get_next_box_offsets(&buffer[cursor..])? else {
            return Ok(Scan::Incomplete(cursor));
        };
        let absolute = BoxOffsets {
            start: cursor + offsets.start,
            content: cursor + offsets.content,
            end: cursor + offsets.end,
        };
        if buffer[absolute.start + 4..absolute.start + 8] == name {
            return Ok(Scan::Found(absolute));
        }
        cursor = absolute.end;
    }
    Ok(Scan::Exhausted)
}
