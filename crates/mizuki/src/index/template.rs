//! Representation index for template-addressed content (DASH
//! `SegmentTemplate` without `SegmentTimeline`).
//!
//! No explicit segment list exists; segments are generated from a constant
//! duration, a numbering scheme and the live/DVR bounds.

use std::sync::{Arc, RwLock};

use url::Url;

use crate::url::{merge_baseurls, SegmentUrlTemplate, TemplateContext};

use super::bounds::ManifestBoundsCalculator;
use super::segment::{PrivateInfos, Segment};
use super::{IndexEnd, SegmentLoadError};

#[derive(Debug, Clone)]
pub struct TemplateIndexOptions {
    /// Duration of every segment, in timescale units.
    pub duration: u64,
    pub timescale: u32,
    pub start_number: u64,
    pub end_number: Option<u64>,
    /// Media time mapped to the period start, in timescale units.
    pub presentation_time_offset: u64,
    /// Period start, in seconds.
    pub period_start: f64,
    /// Period end in seconds, once the period has closed.
    pub period_end: Option<f64>,
    pub media_template: String,
    pub init_template: Option<String>,
    /// Base the resolved templates are merged against, when they are
    /// relative.
    pub base_url: Option<Url>,
    pub representation_id: Option<String>,
    pub bandwidth: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TemplateIndex {
    duration: u64,
    timescale: u32,
    start_number: u64,
    end_number: Option<u64>,
    presentation_time_offset: u64,
    period_start: f64,
    period_end: Option<f64>,
    media: SegmentUrlTemplate,
    init: Option<SegmentUrlTemplate>,
    base_url: Option<Url>,
    representation_id: Option<String>,
    bandwidth: Option<u64>,
    bounds: Arc<RwLock<ManifestBoundsCalculator>>,
}

impl TemplateIndex {
    pub fn new(
        options: TemplateIndexOptions,
        bounds: Arc<RwLock<ManifestBoundsCalculator>>,
    ) -> Self {
        Self {
            duration: options.duration,
            timescale: options.timescale,
            start_number: options.start_number,
            end_number: options.end_number,
            presentation_time_offset: options.presentation_time_offset,
            period_start: options.period_start,
            period_end: options.period_end,
            media: SegmentUrlTemplate(options.media_template),
            init: options.init_template.map(SegmentUrlTemplate),
            base_url: options.base_url,
            representation_id: options.representation_id,
            bandwidth: options.bandwidth,
            bounds,
        }
    }

    fn context(&self, number: Option<u64>, time: Option<u64>) -> TemplateContext {
        TemplateContext {
            representation_id: self.representation_id.clone(),
            number,
            time,
            bandwidth: self.bandwidth,
        }
    }

    fn absolute_url(&self, resolved: String) -> String {
        match &self.base_url {
            Some(base) => merge_baseurls(base, &resolved)
                .map(|url| url.to_string())
                .unwrap_or(resolved),
            None => resolved,
        }
    }

    fn segment_duration_seconds(&self) -> f64 {
        self.duration as f64 / self.timescale as f64
    }

    /// Number of addressable segments when `endNumber` bounds the index.
    fn declared_count(&self) -> Option<u64> {
        self.end_number
            .map(|end| end.saturating_sub(self.start_number) + 1)
    }

    pub fn get_init_segment(&self) -> Segment {
        Segment {
            url: self
                .init
                .as_ref()
                .map(|template| self.absolute_url(template.resolve(&self.context(None, None)))),
            is_init: true,
            time: 0,
            duration: 0,
            timescale: self.timescale,
            range: None,
            index_range: None,
            complete: true,
            private_infos: PrivateInfos::None,
        }
    }

    pub fn get_segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        if self.duration == 0 {
            return Vec::new();
        }
        let bounds = self.bounds.read().unwrap();
        let segment_seconds = self.segment_duration_seconds();

        let mut window_start = from.max(self.period_start).max(bounds.minimum_bound());
        let mut window_end = (from + duration)
            .min(bounds.maximum_bound())
            .min(self.period_end.unwrap_or(f64::INFINITY));
        if let Some(count) = self.declared_count() {
            window_end = window_end.min(self.period_start + count as f64 * segment_seconds);
        }
        if window_end <= window_start {
            return Vec::new();
        }
        window_start -= self.period_start;
        window_end -= self.period_start;

        let first = (window_start / segment_seconds).floor() as u64;
        let last = (window_end / segment_seconds).ceil() as u64;

        let mut segments = Vec::with_capacity((last - first) as usize);
        for position in first..last {
            let time = self.presentation_time_offset + position * self.duration;
            let number = self.start_number + position;
            let url =
                self.absolute_url(self.media.resolve(&self.context(Some(number), Some(time))));
            segments.push(Segment {
                url: Some(url),
                is_init: false,
                time,
                duration: self.duration,
                timescale: self.timescale,
                range: None,
                index_range: None,
                complete: true,
                private_infos: PrivateInfos::None,
            });
        }
        segments
    }

    pub fn get_first_available_position(&self) -> Option<f64> {
        let bounds = self.bounds.read().unwrap();
        if !bounds.is_dynamic() {
            return Some(self.period_start);
        }
        let minimum = bounds.minimum_bound().max(self.period_start);
        // Snap down onto the segment grid so the position is an actual
        // segment start.
        let segment_seconds = self.segment_duration_seconds();
        if segment_seconds == 0.0 {
            return Some(minimum);
        }
        let position = ((minimum - self.period_start) / segment_seconds).floor();
        Some(self.period_start + position * segment_seconds)
    }

    pub fn get_last_available_position(&self) -> Option<f64> {
        if let Some(period_end) = self.period_end {
            return Some(period_end);
        }
        self.declared_count().map(|count| {
            self.period_start + count as f64 * self.segment_duration_seconds()
        })
    }

    pub fn get_end(&self) -> IndexEnd {
        match self.get_last_available_position() {
            Some(end) => IndexEnd::Known(end),
            None => IndexEnd::Undetermined,
        }
    }

    pub fn await_segment_between(&self, start: f64, end: f64) -> Option<bool> {
        let bounds = self.bounds.read().unwrap();
        if !bounds.is_dynamic() {
            return Some(false);
        }
        if let Some(last) = self.get_last_available_position() {
            if start >= last {
                return Some(false);
            }
        }
        if end <= bounds.maximum_bound() {
            return Some(false);
        }
        Some(true)
    }

    /// Nothing can be learnt about template-addressed segments from
    /// re-fetching the manifest.
    pub fn should_refresh(&self, _from: f64, _to: f64) -> bool {
        false
    }

    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        if segment.is_init {
            return Some(true);
        }
        if self.duration == 0 || segment.timescale != self.timescale {
            return Some(false);
        }
        let Some(relative) = segment.time.checked_sub(self.presentation_time_offset) else {
            return Some(false);
        };
        if relative % self.duration != 0 {
            return Some(false);
        }
        let number = self.start_number + relative / self.duration;
        if self.end_number.is_some_and(|end| number > end) {
            return Some(false);
        }

        let start_seconds = self.period_start + segment.start_seconds()
            - self.presentation_time_offset as f64 / self.timescale as f64;
        let bounds = self.bounds.read().unwrap();
        if start_seconds + self.segment_duration_seconds() <= bounds.minimum_bound() {
            return Some(false);
        }
        if start_seconds >= bounds.maximum_bound() {
            return Some(false);
        }
        Some(true)
    }

    /// A template index has no explicit segment list, hence no known gaps.
    pub fn check_discontinuity(&self, _time: f64) -> Option<f64> {
        None
    }

    pub fn can_be_out_of_sync_error(&self, _error: &SegmentLoadError) -> bool {
        false
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        let bounds = self.bounds.read().unwrap();
        if !bounds.is_dynamic() {
            return false;
        }
        match self.get_last_available_position() {
            Some(last) => bounds.maximum_bound() < last,
            None => true,
        }
    }

    pub fn replace(&mut self, new: &TemplateIndex) {
        *self = new.clone();
    }

    /// Template parameters carry no incremental state; an update is a full
    /// replacement.
    pub fn update(&mut self, new: &TemplateIndex) {
        self.replace(new);
    }
}
