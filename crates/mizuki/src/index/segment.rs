use crate::ByteRange;

/// Loader-private details attached to a segment descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PrivateInfos {
    #[default]
    None,
    /// Smooth media segments keep the raw timeline values the server-side
    /// URL pattern is filled with.
    SmoothMedia { time: u64, duration: u64 },
    /// Smooth initialization data is built locally from manifest metadata,
    /// not fetched.
    SmoothInit,
}

/// One concrete, time-addressable segment as computed by a representation
/// index.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Resolved URL, when the segment is fetched over the network.
    pub url: Option<String>,
    pub is_init: bool,
    /// Start time in `timescale` units.
    pub time: u64,
    /// Duration in `timescale` units.
    pub duration: u64,
    pub timescale: u32,
    /// Byte range to request, for range-addressed media.
    pub range: Option<ByteRange>,
    /// Byte range of the segment-index (`sidx`) data, when separate.
    pub index_range: Option<ByteRange>,
    /// Whether the whole duration of the segment is already known to be
    /// available.
    pub complete: bool,
    pub private_infos: PrivateInfos,
}

impl Segment {
    /// Start position in seconds.
    pub fn start_seconds(&self) -> f64 {
        self.time as f64 / self.timescale as f64
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / self.timescale as f64
    }

    /// End position in seconds.
    pub fn end_seconds(&self) -> f64 {
        (self.time + self.duration) as f64 / self.timescale as f64
    }
}
