//! Representation index for Smooth Streaming content.
//!
//! All timeline state lives in the [`SharedSmoothSegmentTimeline`] every
//! Representation of the Adaptation points to; this type only reads it and
//! forwards the refresh-time mutations.

use std::sync::{Arc, RwLock};

use crate::isobmff::timing::FragmentTimeInfo;

use super::segment::{PrivateInfos, Segment};
use super::timeline::SharedSmoothSegmentTimeline;
use super::update::check_timeline_discontinuity;
use super::{IndexEnd, SegmentLoadError};

#[derive(Debug, Clone)]
pub struct SmoothIndexOptions {
    pub is_live: bool,
    /// Server URL pattern, e.g.
    /// `QualityLevels({bitrate})/Fragments(video={start time})`.
    pub media_pattern: Option<String>,
    pub bitrate: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SmoothIndex {
    shared: Arc<RwLock<SharedSmoothSegmentTimeline>>,
    is_live: bool,
    media_pattern: Option<String>,
    bitrate: Option<u64>,
}

impl SmoothIndex {
    pub fn new(
        options: SmoothIndexOptions,
        shared: Arc<RwLock<SharedSmoothSegmentTimeline>>,
    ) -> Self {
        Self {
            shared,
            is_live: options.is_live,
            media_pattern: options.media_pattern,
            bitrate: options.bitrate,
        }
    }

    pub fn shared_timeline(&self) -> &Arc<RwLock<SharedSmoothSegmentTimeline>> {
        &self.shared
    }

    fn resolve_media_url(&self, time: u64) -> Option<String> {
        self.media_pattern.as_ref().map(|pattern| {
            pattern
                .replace("{bitrate}", &self.bitrate.unwrap_or(0).to_string())
                .replace("{start time}", &time.to_string())
        })
    }

    pub fn get_init_segment(&self) -> Segment {
        let timescale = self.shared.read().unwrap().timescale();
        Segment {
            url: None,
            is_init: true,
            time: 0,
            duration: 0,
            timescale,
            range: None,
            index_range: None,
            complete: true,
            private_infos: PrivateInfos::SmoothInit,
        }
    }

    pub fn get_segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        let shared = self.shared.read().unwrap();
        let timescale = shared.timescale();
        let ts = timescale as f64;
        let from_scaled = (from.max(0.0) * ts) as u64;
        let to_scaled = ((from + duration).max(0.0) * ts).ceil() as u64;

        let mut segments = Vec::new();
        for entry in shared.timeline() {
            if entry.duration == 0 || entry.end() <= from_scaled {
                continue;
            }
            if entry.start >= to_scaled {
                break;
            }
            let first_repeat = entry.start.max(from_scaled).saturating_sub(entry.start) / entry.duration;
            for repeat in first_repeat..=entry.repeat_count {
                let time = entry.start + repeat * entry.duration;
                if time >= to_scaled {
                    break;
                }
                segments.push(Segment {
                    url: self.resolve_media_url(time),
                    is_init: false,
                    time,
                    duration: entry.duration,
                    timescale,
                    range: None,
                    index_range: None,
                    complete: true,
                    private_infos: PrivateInfos::SmoothMedia {
                        time,
                        duration: entry.duration,
                    },
                });
            }
        }
        segments
    }

    pub fn get_first_available_position(&self) -> Option<f64> {
        let shared = self.shared.read().unwrap();
        let ts = shared.timescale() as f64;
        shared.timeline().first().map(|entry| entry.start as f64 / ts)
    }

    pub fn get_last_available_position(&self) -> Option<f64> {
        let shared = self.shared.read().unwrap();
        let ts = shared.timescale() as f64;
        shared.last_end().map(|end| end as f64 / ts)
    }

    pub fn get_end(&self) -> IndexEnd {
        if self.is_live {
            return IndexEnd::Undetermined;
        }
        match self.get_last_available_position() {
            Some(end) => IndexEnd::Known(end),
            None => IndexEnd::Finished,
        }
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> Option<bool> {
        if !self.is_live {
            return Some(false);
        }
        let last_end = self.get_last_available_position()?;
        if end <= last_end {
            Some(false)
        } else if start <= last_end {
            // The interval straddles the live frontier; upcoming segments
            // land there.
            Some(true)
        } else {
            None
        }
    }

    pub fn should_refresh(&self, _from: f64, to: f64) -> bool {
        if !self.is_live {
            return false;
        }
        match self.get_last_available_position() {
            Some(last_end) => to > last_end,
            None => true,
        }
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        let shared = self.shared.read().unwrap();
        let timeline = shared.timeline();
        timeline.first()?;

        for entry in timeline {
            if segment.time < entry.start {
                return Some(false);
            }
            if segment.time < entry.end() {
                if entry.duration == 0 {
                    return Some(false);
                }
                let on_grid = (segment.time - entry.start) % entry.duration == 0;
                return Some(on_grid && segment.duration == entry.duration);
            }
        }
        // Past everything we know about; a refresh may still announce it.
        None
    }

    pub fn check_discontinuity(&self, time: f64) -> Option<f64> {
        let shared = self.shared.read().unwrap();
        let ts = shared.timescale() as f64;
        let scaled_time = (time.max(0.0) * ts) as u64;
        check_timeline_discontinuity(shared.timeline(), scaled_time).map(|next| next as f64 / ts)
    }

    pub fn can_be_out_of_sync_error(&self, error: &SegmentLoadError) -> bool {
        self.is_live
            && matches!(
                error,
                SegmentLoadError::Http {
                    status: 404 | 412
                }
            )
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        self.is_live
    }

    /// Feed fragments announced in-band (`tfrf`/`tfxd`) to the shared
    /// timeline. Refresh-coordinator entry point, like
    /// [`SmoothIndex::replace`].
    pub fn add_predicted_segments(&self, fragments: &[FragmentTimeInfo]) {
        self.shared
            .write()
            .unwrap()
            .add_predicted_segments(fragments);
    }

    pub fn replace(&mut self, new: &SmoothIndex) {
        self.is_live = new.is_live;
        self.media_pattern = new.media_pattern.clone();
        self.bitrate = new.bitrate;
        if !Arc::ptr_eq(&self.shared, &new.shared) {
            let fresh = new.shared.read().unwrap().clone();
            self.shared.write().unwrap().replace(&fresh);
        }
    }

    pub fn update(&mut self, new: &SmoothIndex) {
        self.is_live = new.is_live;
        self.media_pattern = new.media_pattern.clone();
        self.bitrate = new.bitrate;
        if !Arc::ptr_eq(&self.shared, &new.shared) {
            let fresh = new.shared.read().unwrap().clone();
            self.shared.write().unwrap().update(&fresh);
        }
    }
}
