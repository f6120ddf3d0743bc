//! Segment-index core of an adaptive-streaming client.
//!
//! Turns a manifest's declarative segment addressing (DASH
//! SegmentTemplate/SegmentList, Smooth Streaming timelines) plus ISOBMFF
//! segment bytes into concrete, byte-exact, time-addressable segment
//! descriptors, and keeps those answers consistent while a live manifest is
//! periodically re-fetched and its DVR window slides.
//!
//! Two halves:
//!
//! - [`isobmff`]: box-level reading, construction and patching — `pssh`
//!   extraction, low-latency `moof`+`mdat` chunk splitting, and timing
//!   extraction from `sidx`/`tfdt`/`trun`/`emsg`/`mdhd`.
//! - [`index`]: the [`index::RepresentationIndex`] family answering segment
//!   and availability queries, including the Smooth shared-timeline merge
//!   applied across manifest refreshes.
//!
//! Network fetching, manifest-document parsing, buffer management and DRM
//! exchanges are external collaborators: this crate neither performs I/O nor
//! blocks.

pub mod error;
pub mod index;
pub mod isobmff;
pub mod url;
pub mod util;

pub use error::{MizukiError, MizukiResult};
pub use index::{IndexEnd, PrivateInfos, RepresentationIndex, Segment, SegmentLoadError};
pub use util::range::ByteRange;
