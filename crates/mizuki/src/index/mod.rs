//! Representation indexes: the per-Representation structures answering
//! "which segments exist, and when".
//!
//! Three addressing modes exist, one per manifest-declared scheme:
//!
//! - [`template::TemplateIndex`] generates segments algorithmically from a
//!   constant duration and a numbering scheme;
//! - [`list::ListIndex`] wraps an explicit, finite segment list;
//! - [`smooth::SmoothIndex`] walks the run-length-encoded timeline shared by
//!   every Representation of a Smooth Adaptation.
//!
//! [`RepresentationIndex`] closes the set behind one dispatching enum.

pub mod bounds;
pub mod list;
pub mod segment;
pub mod smooth;
pub mod template;
pub mod timeline;
mod update;

pub use segment::{PrivateInfos, Segment};

use list::ListIndex;
use smooth::SmoothIndex;
use template::TemplateIndex;

/// Answer of [`RepresentationIndex::get_end`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndexEnd {
    /// The content ends at this position, in seconds.
    Known(f64),
    /// The index is finished but holds no segment to derive an end from.
    Finished,
    /// Cannot be determined yet (e.g. an open live period).
    Undetermined,
}

/// The segment loader's view of a failed request, as far as out-of-sync
/// classification needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentLoadError {
    Http { status: u16 },
    Timeout,
    Other,
}

/// One segment index per Representation.
///
/// Built at manifest-parse time, queried by the segment scheduler, and
/// mutated through [`Self::replace`] / [`Self::update`] on manifest refresh
/// until the Representation is pruned from the manifest.
#[derive(Debug, Clone)]
pub enum RepresentationIndex {
    Template(TemplateIndex),
    List(ListIndex),
    Smooth(SmoothIndex),
}

impl RepresentationIndex {
    /// Descriptor of the initialization data for this Representation.
    pub fn get_init_segment(&self) -> Segment {
        match self {
            Self::Template(index) => index.get_init_segment(),
            Self::List(index) => index.get_init_segment(),
            Self::Smooth(index) => index.get_init_segment(),
        }
    }

    /// Ordered media segments overlapping `[from, from + duration)`, in
    /// seconds. Segment times strictly increase across the result.
    pub fn get_segments(&self, from: f64, duration: f64) -> Vec<Segment> {
        match self {
            Self::Template(index) => index.get_segments(from, duration),
            Self::List(index) => index.get_segments(from, duration),
            Self::Smooth(index) => index.get_segments(from, duration),
        }
    }

    /// Earliest position for which a segment is still available, in seconds.
    pub fn get_first_available_position(&self) -> Option<f64> {
        match self {
            Self::Template(index) => index.get_first_available_position(),
            Self::List(index) => index.get_first_available_position(),
            Self::Smooth(index) => index.get_first_available_position(),
        }
    }

    /// Latest position for which a segment is announced, in seconds.
    pub fn get_last_available_position(&self) -> Option<f64> {
        match self {
            Self::Template(index) => index.get_last_available_position(),
            Self::List(index) => index.get_last_available_position(),
            Self::Smooth(index) => index.get_last_available_position(),
        }
    }

    pub fn get_end(&self) -> IndexEnd {
        match self {
            Self::Template(index) => index.get_end(),
            Self::List(index) => index.get_end(),
            Self::Smooth(index) => index.get_end(),
        }
    }

    /// Whether a segment that is not yet available is expected to appear in
    /// `[start, end)`. `None` when this cannot be determined.
    pub fn await_segment_between(&self, start: f64, end: f64) -> Option<bool> {
        match self {
            Self::Template(index) => index.await_segment_between(start, end),
            Self::List(index) => index.await_segment_between(start, end),
            Self::Smooth(index) => index.await_segment_between(start, end),
        }
    }

    /// Whether re-fetching the manifest may teach us something about
    /// segments in `[from, to)`.
    pub fn should_refresh(&self, from: f64, to: f64) -> bool {
        match self {
            Self::Template(index) => index.should_refresh(from, to),
            Self::List(index) => index.should_refresh(from, to),
            Self::Smooth(index) => index.should_refresh(from, to),
        }
    }

    /// Whether a previously obtained segment can still be fetched. `None`
    /// when the index cannot tell.
    pub fn is_segment_still_available(&self, segment: &Segment) -> Option<bool> {
        match self {
            Self::Template(index) => index.is_segment_still_available(segment),
            Self::List(index) => index.is_segment_still_available(segment),
            Self::Smooth(index) => index.is_segment_still_available(segment),
        }
    }

    /// If `time` falls in a gap between known segments, the position of the
    /// next one, in seconds.
    pub fn check_discontinuity(&self, time: f64) -> Option<f64> {
        match self {
            Self::Template(index) => index.check_discontinuity(time),
            Self::List(index) => index.check_discontinuity(time),
            Self::Smooth(index) => index.check_discontinuity(time),
        }
    }

    /// Whether a segment-load failure may mean this index is out of sync
    /// with the server, so that a manifest refresh could repair it.
    pub fn can_be_out_of_sync_error(&self, error: &SegmentLoadError) -> bool {
        match self {
            Self::Template(index) => index.can_be_out_of_sync_error(error),
            Self::List(index) => index.can_be_out_of_sync_error(error),
            Self::Smooth(index) => index.can_be_out_of_sync_error(error),
        }
    }

    pub fn is_still_awaiting_future_segments(&self) -> bool {
        match self {
            Self::Template(index) => index.is_still_awaiting_future_segments(),
            Self::List(index) => index.is_still_awaiting_future_segments(),
            Self::Smooth(index) => index.is_still_awaiting_future_segments(),
        }
    }

    /// Adopt a re-fetched index wholesale, keeping whatever older knowledge
    /// remains valid. Refresh-coordinator entry point.
    pub fn replace(&mut self, new: &RepresentationIndex) {
        match (self, new) {
            (Self::Template(index), Self::Template(new)) => index.replace(new),
            (Self::List(index), Self::List(new)) => index.replace(new),
            (Self::Smooth(index), Self::Smooth(new)) => index.replace(new),
            (this, new) => {
                tracing::warn!("Representation changed addressing scheme across a refresh");
                *this = new.clone();
            }
        }
    }

    /// Incremental counterpart of [`Self::replace`]. Refresh-coordinator
    /// entry point.
    pub fn update(&mut self, new: &RepresentationIndex) {
        match (self, new) {
            (Self::Template(index), Self::Template(new)) => index.update(new),
            (Self::List(index), Self::List(new)) => index.update(new),
            (Self::Smooth(index), Self::Smooth(new)) => index.update(new),
            (this, new) => {
                tracing::warn!("Representation changed addressing scheme across a refresh");
                *this = new.clone();
            }
        }
    }
}
