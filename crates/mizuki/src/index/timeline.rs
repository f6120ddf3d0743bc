//! The segment timeline shared by every Representation of a Smooth
//! Adaptation.

use crate::isobmff::timing::FragmentTimeInfo;

use super::bounds::SyncClock;
use super::update::update_segment_timeline;

/// One run of `repeat_count + 1` consecutive segments of equal duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Start time in timescale units.
    pub start: u64,
    /// Duration of each segment of the run, in timescale units.
    pub duration: u64,
    /// How many *additional* segments follow the first one.
    pub repeat_count: u64,
}

impl TimelineEntry {
    /// End time of the run, in timescale units.
    pub fn end(&self) -> u64 {
        self.start + self.duration * (self.repeat_count + 1)
    }
}

/// Run-length-encoded segment timeline shared by all Representations of one
/// Adaptation.
///
/// Every Representation must expose the exact same segment list, so they all
/// hold a handle to a single instance of this type. Only the manifest-refresh
/// coordinator may call the mutating entry points ([`Self::replace`],
/// [`Self::update`], [`Self::refresh`]), and it must finish doing so before
/// readers run again for the same Adaptation.
#[derive(Debug, Clone)]
pub struct SharedSmoothSegmentTimeline {
    timeline: Vec<TimelineEntry>,
    timescale: u32,
    /// Wall-clock time (unix seconds) at which the timeline was known to be
    /// accurate, i.e. when the manifest carrying it was received.
    validity_time: f64,
    /// DVR window in seconds, when the content has one.
    time_shift_buffer_depth: Option<f64>,
    clock: SyncClock,
}

impl SharedSmoothSegmentTimeline {
    pub fn new(
        timeline: Vec<TimelineEntry>,
        timescale: u32,
        validity_time: f64,
        time_shift_buffer_depth: Option<f64>,
        clock: SyncClock,
    ) -> Self {
        Self {
            timeline,
            timescale,
            validity_time,
            time_shift_buffer_depth,
            clock,
        }
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    pub fn validity_time(&self) -> f64 {
        self.validity_time
    }

    pub fn time_shift_buffer_depth(&self) -> Option<f64> {
        self.time_shift_buffer_depth
    }

    /// End of the last known entry, in timescale units.
    pub fn last_end(&self) -> Option<u64> {
        self.timeline.last().map(TimelineEntry::end)
    }

    /// Adopt a freshly re-fetched timeline, keeping segments this timeline
    /// already knew about that the new one has not announced yet.
    ///
    /// The old timeline is discarded outright whenever a safe merge is not
    /// possible: either side empty, differing timescales, or old entries
    /// that do not line up with the new last entry's segment grid. This
    /// never fails; ambiguity resolves toward the freshest data.
    pub fn replace(&mut self, new: &SharedSmoothSegmentTimeline) {
        if new.validity_time <= self.validity_time {
            // Every Representation of the Adaptation triggers the same merge
            // on refresh; only the first one needs to be applied.
            return;
        }

        let old = std::mem::take(&mut self.timeline);
        let same_timescale = self.timescale == new.timescale;
        self.timeline = new.timeline.clone();
        self.timescale = new.timescale;
        self.validity_time = new.validity_time;
        self.time_shift_buffer_depth = new.time_shift_buffer_depth;

        if old.is_empty() || self.timeline.is_empty() || !same_timescale {
            return;
        }

        let new_end = self.timeline.last().map(TimelineEntry::end).unwrap_or(0);
        for (i, old_entry) in old.iter().enumerate() {
            let old_end = old_entry.end();
            if old_end == new_end {
                // The old timeline had run ahead; keep everything after the
                // point both sides agree on.
                self.timeline.extend_from_slice(&old[i + 1..]);
                return;
            }
            if old_end > new_end {
                let Some(last_new) = self.timeline.last_mut() else {
                    return;
                };
                if old_entry.duration != last_new.duration || last_new.duration == 0 {
                    tracing::warn!(
                        "Smooth timeline merge: mismatched durations, dropping older entries"
                    );
                    return;
                }
                let Some(range_duration) = new_end.checked_sub(old_entry.start) else {
                    // The straddling old entry starts past the new end; no
                    // safe stitch point exists.
                    return;
                };
                if range_duration == 0 || range_duration % last_new.duration != 0 {
                    tracing::warn!(
                        "Smooth timeline merge: off-grid overlap, dropping older entries"
                    );
                    return;
                }
                let repeat_with_new = range_duration / last_new.duration - 1;
                let Some(additional) = old_entry.repeat_count.checked_sub(repeat_with_new) else {
                    return;
                };
                last_new.repeat_count += additional;
                self.timeline.extend_from_slice(&old[i + 1..]);
                return;
            }
        }
    }

    /// Lighter merge for incremental refreshes: append and correct entries
    /// without replacing wholesale.
    pub fn update(&mut self, new: &SharedSmoothSegmentTimeline) {
        if new.validity_time <= self.validity_time {
            return;
        }
        if self.timeline.is_empty() || self.timescale != new.timescale {
            self.timeline = new.timeline.clone();
            self.timescale = new.timescale;
        } else if !update_segment_timeline(&mut self.timeline, &new.timeline) {
            tracing::warn!("Smooth timeline update could not be stitched, replacing wholesale");
            self.timeline = new.timeline.clone();
        }
        self.validity_time = new.validity_time;
        self.time_shift_buffer_depth = new.time_shift_buffer_depth;
    }

    /// Append fragments announced in-band (`tfrf`/`tfxd`) past the current
    /// end of the timeline.
    ///
    /// Announcements that overlap known entries are dropped, and one that
    /// would leave a gap is ignored entirely; the next manifest refresh is
    /// authoritative for those.
    pub fn add_predicted_segments(&mut self, fragments: &[FragmentTimeInfo]) {
        for fragment in fragments {
            if fragment.duration == 0 {
                continue;
            }
            let Some(last_end) = self.last_end() else {
                self.timeline.push(TimelineEntry {
                    start: fragment.time,
                    duration: fragment.duration,
                    repeat_count: 0,
                });
                continue;
            };
            if fragment.time != last_end {
                continue;
            }
            match self.timeline.last_mut() {
                Some(last) if last.duration == fragment.duration => {
                    last.repeat_count += 1;
                }
                _ => self.timeline.push(TimelineEntry {
                    start: fragment.time,
                    duration: fragment.duration,
                    repeat_count: 0,
                }),
            }
        }
    }

    /// Drop entries that slid out of the DVR window, to bound memory.
    pub fn refresh(&mut self) {
        let Some(depth) = self.time_shift_buffer_depth else {
            return;
        };
        let Some(last_end) = self.last_end() else {
            return;
        };

        let elapsed = (self.clock.now_seconds() - self.validity_time).max(0.0);
        let live_edge = last_end as f64 + elapsed * self.timescale as f64;
        let minimum_position = live_edge - depth * self.timescale as f64;
        self.timeline
            .retain(|entry| entry.end() as f64 >= minimum_position);
    }
}
