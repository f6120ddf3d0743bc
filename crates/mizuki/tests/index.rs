use std::sync::{Arc, RwLock};

use mizuki::index::bounds::{ManifestBoundsCalculator, SyncClock};
use mizuki::index::list::{ListIndex, ListIndexEntry, ListIndexOptions};
use mizuki::index::smooth::{SmoothIndex, SmoothIndexOptions};
use mizuki::index::template::{TemplateIndex, TemplateIndexOptions};
use mizuki::index::timeline::{SharedSmoothSegmentTimeline, TimelineEntry};
use mizuki::{IndexEnd, RepresentationIndex, SegmentLoadError};

fn entry(start: u64, duration: u64, repeat_count: u64) -> TimelineEntry {
    TimelineEntry {
        start,
        duration,
        repeat_count,
    }
}

fn smooth_index(
    entries: Vec<TimelineEntry>,
    timescale: u32,
    validity_time: f64,
    is_live: bool,
) -> SmoothIndex {
    let shared =
        SharedSmoothSegmentTimeline::new(entries, timescale, validity_time, None, SyncClock::new());
    SmoothIndex::new(
        SmoothIndexOptions {
            is_live,
            media_pattern: Some("QualityLevels({bitrate})/Fragments(video={start time})".into()),
            bitrate: Some(1500000),
        },
        Arc::new(RwLock::new(shared)),
    )
}

#[test]
fn smooth_timeline_merge_preserves_older_knowledge() {
    // The old timeline spans [0, 100); the re-fetched manifest only spans
    // [0, 60). The merge must keep everything the old timeline had learnt.
    let mut old = smooth_index(vec![entry(0, 10, 9)], 10, 1_000.0, true);
    let new = smooth_index(vec![entry(0, 10, 5)], 10, 2_000.0, true);

    old.replace(&new);

    let shared = old.shared_timeline().read().unwrap();
    assert_eq!(shared.timeline(), &[entry(0, 10, 9)]);
    assert_eq!(shared.last_end(), Some(100));
    drop(shared);

    // All ten segments are addressable again after the merge.
    let segments = old.get_segments(0.0, 10.0);
    assert_eq!(segments.len(), 10);
    assert!(segments.windows(2).all(|w| w[0].time < w[1].time));
}

#[test]
fn smooth_merge_discards_unalignable_history() {
    let mut old = smooth_index(vec![entry(0, 7, 19)], 10, 1_000.0, true);
    let new = smooth_index(vec![entry(0, 10, 5)], 10, 2_000.0, true);

    old.replace(&new);

    let shared = old.shared_timeline().read().unwrap();
    assert_eq!(shared.timeline(), &[entry(0, 10, 5)]);
}

#[test]
fn smooth_shared_timeline_is_seen_by_every_representation() {
    let shared = Arc::new(RwLock::new(SharedSmoothSegmentTimeline::new(
        vec![entry(0, 20, 4)],
        10,
        1_000.0,
        None,
        SyncClock::new(),
    )));
    let low = SmoothIndex::new(
        SmoothIndexOptions {
            is_live: true,
            media_pattern: Some("QualityLevels({bitrate})/Fragments(video={start time})".into()),
            bitrate: Some(300000),
        },
        shared.clone(),
    );
    let high = SmoothIndex::new(
        SmoothIndexOptions {
            is_live: true,
            media_pattern: Some("QualityLevels({bitrate})/Fragments(video={start time})".into()),
            bitrate: Some(3000000),
        },
        shared,
    );

    let fresh = smooth_index(vec![entry(0, 20, 4), entry(100, 20, 0)], 10, 2_000.0, true);
    let mut low_mut = low.clone();
    low_mut.replace(&fresh);

    // The merge applied through one Representation is visible to the other.
    assert_eq!(high.get_last_available_position(), Some(12.0));
    assert_eq!(low.get_last_available_position(), Some(12.0));

    // Same segment list, different URLs per bitrate.
    let low_segments = low.get_segments(0.0, 12.0);
    let high_segments = high.get_segments(0.0, 12.0);
    assert_eq!(low_segments.len(), high_segments.len());
    assert_eq!(
        low_segments[0].url.as_deref(),
        Some("QualityLevels(300000)/Fragments(video=0)")
    );
    assert_eq!(
        high_segments[0].url.as_deref(),
        Some("QualityLevels(3000000)/Fragments(video=0)")
    );
}

fn template_index() -> RepresentationIndex {
    let bounds = ManifestBoundsCalculator::new(false, 0.0, None, SyncClock::new());
    RepresentationIndex::Template(TemplateIndex::new(
        TemplateIndexOptions {
            duration: 2000,
            timescale: 1000,
            start_number: 1,
            end_number: None,
            presentation_time_offset: 0,
            period_start: 0.0,
            period_end: Some(10.0),
            media_template: "video/$Number%05d$.m4s".to_string(),
            init_template: Some("video/init.mp4".to_string()),
            base_url: None,
            representation_id: Some("v".to_string()),
            bandwidth: None,
        },
        Arc::new(RwLock::new(bounds)),
    ))
}

#[test]
fn representation_index_dispatch() {
    let template = template_index();
    let segments = template.get_segments(0.0, 100.0);
    assert_eq!(segments.len(), 5);
    assert_eq!(segments[0].url.as_deref(), Some("video/00001.m4s"));
    assert!(!template.should_refresh(0.0, 100.0));
    assert_eq!(template.check_discontinuity(3.0), None);
    assert_eq!(template.get_end(), IndexEnd::Known(10.0));
    assert!(!template.can_be_out_of_sync_error(&SegmentLoadError::Http { status: 404 }));

    let list = RepresentationIndex::List(ListIndex::new(ListIndexOptions {
        timescale: 1000,
        duration: 2000,
        segments: vec![
            ListIndexEntry {
                url: "seg-0.mp4".into(),
                media_range: None,
            },
            ListIndexEntry {
                url: "seg-1.mp4".into(),
                media_range: None,
            },
        ],
        init_url: None,
        init_range: None,
    }));
    assert_eq!(list.get_segments(0.0, 100.0).len(), 2);
    assert_eq!(list.await_segment_between(0.0, 100.0), Some(false));
    assert!(!list.is_still_awaiting_future_segments());

    let smooth = RepresentationIndex::Smooth(smooth_index(
        vec![entry(0, 20, 4)],
        10,
        1_000.0,
        true,
    ));
    assert!(smooth.should_refresh(0.0, 20.0));
    assert!(smooth.can_be_out_of_sync_error(&SegmentLoadError::Http { status: 404 }));
    assert!(smooth.is_still_awaiting_future_segments());
}

#[test]
fn replace_across_addressing_schemes_adopts_the_new_index() {
    let mut index = template_index();
    let list = RepresentationIndex::List(ListIndex::new(ListIndexOptions {
        timescale: 1000,
        duration: 1000,
        segments: vec![ListIndexEntry {
            url: "only.mp4".into(),
            media_range: None,
        }],
        init_url: None,
        init_range: None,
    }));

    index.replace(&list);
    assert_eq!(index.get_segments(0.0, 100.0).len(), 1);
    assert_eq!(index.get_end(), IndexEnd::Known(1.0));
}

#[test]
fn init_segments_are_marked() {
    let template = template_index();
    let init = template.get_init_segment();
    assert!(init.is_init);
    assert_eq!(init.url.as_deref(), Some("video/init.mp4"));
    assert_eq!(template.is_segment_still_available(&init), Some(true));
}
