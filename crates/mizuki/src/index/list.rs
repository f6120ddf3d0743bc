//! Representation index for explicit, finite segment lists.
//!
//! Every segment is declared by the manifest and available as soon as the
//! manifest is loaded, so most availability queries have constant answers.

use crate::ByteRange;

use super::segment::{PrivateInfos, Segment};
use super::{IndexEnd, SegmentLoadError};

/// One manifest-declared segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ListIndexEntry {
    pub url: String,
    /// Byte range inside the resource, for range-addressed lists.
    pub media_range: Option<ByteRange>,
}

#[derive(Debug, Clone)]
pub struct ListIndexOptions {
    pub timescale: u32,
    /// Duration of each listed segment, in timescale units.
    pub duration: u64,
    pub segments: Vec<ListIndexEntry>,
    pub init_url: Option<String>,
    pub init_range: Option<ByteRange>,
}

#[derive(Debug, Clone)]
pub struct ListIndex {
    timescale: u32,
    duration: u64,
    segments: Vec<ListIndexEntry>,
    init_url: Option<String>,
    init_range: Option<ByteRange>,
}

impl ListIndex {
    pub fn new(options: ListIndexOptions) -> Self {
        Self {
            timescale: options.timescale,
            duration: options.duration,
            segments: options.segments,
            init_url: options.init_url,
            init_range: options.init_range,
        }
    }

    pub fn get_init_segment(&self) -> Segment {
        Segment {
            url: self.init_url.clone(),
            is_init: true,
            time: 0,
            duration: 0,
            timescale: self.timescale,
            range: self.init_range.clone(),
            index_range: None,
            complete: true,
            private_infos: PrivateInfos::None,
        }
    }

    pub fn get_segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        if self.duration == 0 || self.segments.is_empty() {
            return Vec::new();
        }
        let ts = self.timescale as f64;
        let from_scaled = (from.max(0.0) * ts) as u64;
        let to_scaled = ((from + duration).max(0.0) * ts).ceil() as u64;

        let first = (from_scaled / self.duration) as usize;
        let mut out = Vec::new();
        for (i, entry) in self.segments.iter().enumerate().skip(first) {
            let time = i as u64 * self.duration;
            if time >= to_scaled {
                break;
            }
            out.push(Segment {
                url: Some(entry.url.clone()),
                is_init: false,
                time,
                duration: self.duration,
                timescale: self.timescale,
                range: entry.media_range.clone(),
                index_range: None,
                complete: true,
                private_infos: PrivateInfos::None,
            });
        }
        out
    }

    pub fn get_first_available_position(&self) -> Option<f64> {
        Some(0.0)
    }

    pub fn get_last_available_position(&self) -> Option<f64> {
        Some(self.total_duration_seconds())
    }

    pub fn get_end(&self) -> IndexEnd {
        if self.segments.is_empty() {
            IndexEnd::Finished
        } else {
            IndexEnd::Known(self.total_duration_seconds())
        }
    }

    pub fn await_segment_between(&self, _start: f64, _end: f64) -> Option<bool> {
        Some(false)
    }

    pub fn should_refresh(&self, _from: f64, _to: f64) -> bool {
        false
    }

    pub fn is_segment_still_available(&self, _segment: &Segment) -> Option<bool> {
        Some(true)
    }

    pub fn check_discontinuity(&self, _time: f64) -> Option<f64> {
        None
    }

    pub fn can_be_out_of_sync_error(&self, _error: &SegmentLoadError) -> bool {
        false
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        false
    }

    pub fn replace(&mut self, new: &ListIndex) {
        *self = new.clone();
    }

    pub fn update(&mut self, new: &ListIndex) {
        *self = new.clone();
    }

    fn total_duration_seconds(&self) -> f64 {
        (self.segments.len() as u64 * self.duration) as f64 / self.timescale as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_index() -> ListIndex {
        ListIndex::new(ListIndexOptions {
            timescale: 1000,
            duration: 2000,
            segments: (0..5)
                .map(|i| ListIndexEntry {
                    url: format!("https://example.com/seg-{i}.mp4"),
                    media_range: None,
                })
                .collect(),
            init_url: Some("https://example.com/init.mp4".to_string()),
            init_range: None,
        })
    }

    #[test]
    fn test_get_segments() {
        let index = list_index();
        let segments = index.get_segments(3.0, 4.0);
        assert_eq!(
            segments.iter().map(|s| s.time).collect::<Vec<_>>(),
            vec![2000, 4000, 6000]
        );
        assert_eq!(
            segments[0].url.as_deref(),
            Some("https://example.com/seg-1.mp4")
        );
    }

    #[test]
    fn test_trivial_availability() {
        let index = list_index();
        assert_eq!(index.get_first_available_position(), Some(0.0));
        assert_eq!(index.get_last_available_position(), Some(10.0));
        assert_eq!(index.get_end(), IndexEnd::Known(10.0));
        assert_eq!(index.await_segment_between(0.0, 100.0), Some(false));
        assert!(!index.should_refresh(0.0, 100.0));
        assert_eq!(index.check_discontinuity(5.0), None);
        assert!(!index.is_still_awaiting_future_segments());

        let segment = index.get_segments(0.0, 2.0).remove(0);
        assert_eq!(index.is_segment_still_available(&segment), Some(true));
    }
}
