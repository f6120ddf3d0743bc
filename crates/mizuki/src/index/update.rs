//! Generic helpers over ordered run-length-encoded segment timelines.

use super::timeline::TimelineEntry;

/// Merge a freshly parsed timeline into an already known one, in place.
///
/// Entries of `old` from the point where `new` starts are dropped (the fresh
/// data wins there), the straddling entry — if any — has its repeat count
/// shrunk so it ends exactly where `new` begins, and every `new` entry is
/// appended. Returns `false` when the two timelines cannot be stitched
/// safely: a gap between them, or an overlap that does not fall on the old
/// entry's segment grid.
pub(crate) fn update_segment_timeline(old: &mut Vec<TimelineEntry>, new: &[TimelineEntry]) -> bool {
    let Some(first_new) = new.first() else {
        return true;
    };

    // Drop old entries fully covered by the new data.
    while old.last().is_some_and(|last| last.start >= first_new.start) {
        old.pop();
    }

    if let Some(last) = old.last_mut() {
        let last_end = last.end();
        if last_end < first_new.start {
            return false;
        }
        if last_end > first_new.start {
            let span = first_new.start - last.start;
            if last.duration == 0 || span % last.duration != 0 {
                return false;
            }
            let kept = span / last.duration;
            if kept == 0 {
                old.pop();
            } else {
                last.repeat_count = kept - 1;
            }
        }
    }

    old.extend_from_slice(new);
    true
}

/// If `scaled_time` falls in a gap between two known segments, the start of
/// the next known segment, in the same scale. `None` when the time lands
/// inside a segment, before the first entry is not a gap the player can seek
/// over, or after the last one.
pub(crate) fn check_timeline_discontinuity(
    timeline: &[TimelineEntry],
    scaled_time: u64,
) -> Option<u64> {
    let mut previous_end: Option<u64> = None;
    for entry in timeline {
        if scaled_time < entry.start {
            // Only a gap when we know a segment ended before this one.
            return previous_end.map(|_| entry.start);
        }
        if scaled_time < entry.end() {
            return None;
        }
        previous_end = Some(entry.end());
    }
    None
}
