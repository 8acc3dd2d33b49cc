//! Processing-loop scenarios driven by fake collaborators.
//!
//! These tests exercise the buffer hand-off protocol end to end without
//! camera hardware: the pool is backed by temp-file mappings, the capture
//! source is a stub that completes plain cookie tokens, and the detector and
//! display sink are scripted fakes.

use std::collections::VecDeque;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use facelens::camera::{
    CameraError, FrameLayout, FramePool, Handoff, MappedPlane, SlotState,
};
use facelens::detect::{DetectorError, FaceFinder};
use facelens::display::{DisplayError, FrameSink, KEY_ESCAPE};
use facelens::frame::{FrameView, Region};
use facelens::pipeline::{run_loop, FrameSource, BOX_COLOR};

const LAYOUT: FrameLayout = FrameLayout {
    width: 64,
    height: 48,
    stride: 64 * 3,
};

fn test_pool(buffers: usize) -> FramePool {
    let mappings = (0..buffers)
        .map(|_| {
            let file = tempfile::tempfile().expect("tempfile");
            file.set_len(LAYOUT.byte_len() as u64).expect("set_len");
            MappedPlane::map(file.as_raw_fd(), LAYOUT.byte_len(), 0).expect("map")
        })
        .collect();
    FramePool::new(mappings, LAYOUT).expect("pool")
}

/// Capture-source stub completing plain cookie tokens.
///
/// `refills` controls liveness: that many resubmitted buffers are completed
/// again, which is what a healthy camera does with a requeued request.
struct FakeSource {
    handoff: Arc<Handoff<u64>>,
    resubmitted: Vec<u64>,
    refills: usize,
}

impl FakeSource {
    fn new(handoff: Arc<Handoff<u64>>, refills: usize) -> Self {
        Self {
            handoff,
            resubmitted: Vec::new(),
            refills,
        }
    }
}

impl FrameSource for FakeSource {
    type Completed = u64;

    fn cookie(token: &u64) -> u64 {
        *token
    }

    fn resubmit(&mut self, token: u64) -> Result<(), CameraError> {
        self.resubmitted.push(token);
        if self.refills > 0 {
            self.refills -= 1;
            self.handoff.publish(token);
        }
        Ok(())
    }
}

struct FakeDetector {
    regions: Vec<Region>,
    calls: usize,
    fail: bool,
}

impl FakeDetector {
    fn returning(regions: Vec<Region>) -> Self {
        Self {
            regions,
            calls: 0,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            regions: Vec::new(),
            calls: 0,
            fail: true,
        }
    }
}

impl FaceFinder for FakeDetector {
    fn find(&mut self, _frame: &FrameView<'_>) -> Result<Vec<Region>, DetectorError> {
        self.calls += 1;
        if self.fail {
            return Err(DetectorError::ModelNotFound("stub".into()));
        }
        Ok(self.regions.clone())
    }
}

struct FakeSink {
    shows: usize,
    keys: VecDeque<Option<i32>>,
}

impl FakeSink {
    fn with_keys(keys: Vec<Option<i32>>) -> Self {
        Self {
            shows: 0,
            keys: keys.into(),
        }
    }
}

impl FrameSink for FakeSink {
    fn show(&mut self, _frame: &FrameView<'_>) -> Result<(), DisplayError> {
        self.shows += 1;
        Ok(())
    }

    fn poll_key(&mut self, _timeout_ms: i32) -> Result<Option<i32>, DisplayError> {
        // An exhausted script stops the loop rather than hanging the test.
        Ok(self.keys.pop_front().unwrap_or(Some(KEY_ESCAPE)))
    }
}

#[test]
fn test_newest_completion_wins_older_recycled_unprocessed() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();
    pool.mark_in_flight(1).unwrap();

    let handoff = Arc::new(Handoff::new());
    // Both buffers complete before the consumer wakes.
    handoff.publish(0u64);
    handoff.publish(1u64);

    let mut source = FakeSource::new(Arc::clone(&handoff), 0);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    // Only B was processed; A went straight back to the source.
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.skipped, 1);
    assert_eq!(detector.calls, 1);
    assert_eq!(sink.shows, 1);
    assert_eq!(source.resubmitted, vec![0]);
    assert_eq!(pool.state(0), Some(SlotState::InFlight));
    assert_eq!(pool.state(1), Some(SlotState::Held));
}

#[test]
fn test_zero_detections_still_displays_and_resubmits() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    let mut source = FakeSource::new(Arc::clone(&handoff), 1);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![None, Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    assert_eq!(stats.frames, 2);
    assert_eq!(stats.faces, 0);
    assert_eq!(sink.shows, 2);
    assert_eq!(source.resubmitted, vec![0]);

    // Nothing was drawn: the frame memory is still all zeroes.
    let view = pool.frame_mut(0).unwrap();
    assert!(view.data().iter().all(|&b| b == 0));
}

#[test]
fn test_detections_are_drawn_into_the_buffer() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    let region = Region {
        x: 10,
        y: 10,
        width: 20,
        height: 20,
    };
    let mut source = FakeSource::new(Arc::clone(&handoff), 0);
    let mut detector = FakeDetector::returning(vec![region]);
    let mut sink = FakeSink::with_keys(vec![Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();
    assert_eq!(stats.faces, 1);

    let view = pool.frame_mut(0).unwrap();
    let at = 10 * LAYOUT.stride as usize + 10 * 3;
    assert_eq!(&view.data()[at..at + 3], &BOX_COLOR);
}

#[test]
fn test_exit_key_skips_resubmission() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    let mut source = FakeSource::new(Arc::clone(&handoff), 0);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    assert_eq!(stats.frames, 1);
    assert!(source.resubmitted.is_empty());
    // The buffer stays with the consumer; teardown unmaps it.
    assert_eq!(pool.state(0), Some(SlotState::Held));
}

#[test]
fn test_other_keys_do_not_exit() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    let mut source = FakeSource::new(Arc::clone(&handoff), 1);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![Some('q' as i32), Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();
    assert_eq!(stats.frames, 2);
}

#[test]
fn test_round_trip_liveness_with_healthy_source() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    // A healthy source refills every resubmitted buffer; the loop keeps
    // cycling the same slot until the exit key.
    let mut source = FakeSource::new(Arc::clone(&handoff), 5);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![None, None, None, None, None, Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    assert_eq!(stats.frames, 6);
    assert_eq!(source.resubmitted, vec![0, 0, 0, 0, 0]);
    assert_eq!(pool.state(0), Some(SlotState::Held));
    assert_eq!(pool.state(1), Some(SlotState::Held));
}

#[test]
fn test_unknown_cookie_is_skipped_without_resubmission() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(99u64); // not a pool buffer

    // A real completion arrives a moment later so the loop can finish.
    let publisher = {
        let handoff = Arc::clone(&handoff);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            handoff.publish(0u64);
        })
    };

    let mut source = FakeSource::new(Arc::clone(&handoff), 0);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();
    publisher.join().unwrap();

    // The foreign token was neither processed nor resubmitted.
    assert_eq!(stats.frames, 1);
    assert_eq!(detector.calls, 1);
    assert!(source.resubmitted.is_empty());
    assert_eq!(pool.state(0), Some(SlotState::Held));
}

#[test]
fn test_unknown_displaced_cookie_is_dropped() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(99u64);
    handoff.publish(0u64); // displaces the foreign token

    let mut source = FakeSource::new(Arc::clone(&handoff), 0);
    let mut detector = FakeDetector::returning(Vec::new());
    let mut sink = FakeSink::with_keys(vec![Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    assert_eq!(stats.frames, 1);
    assert_eq!(stats.skipped, 1);
    assert!(source.resubmitted.is_empty());
}

#[test]
fn test_detector_failure_still_displays_and_resubmits() {
    let mut pool = test_pool(2);
    pool.mark_in_flight(0).unwrap();

    let handoff = Arc::new(Handoff::new());
    handoff.publish(0u64);

    let mut source = FakeSource::new(Arc::clone(&handoff), 1);
    let mut detector = FakeDetector::failing();
    let mut sink = FakeSink::with_keys(vec![None, Some(KEY_ESCAPE)]);

    let stats = run_loop(&mut source, &handoff, &mut pool, &mut detector, &mut sink).unwrap();

    // Two iterations despite the detector failing every time: the raw frame
    // is shown and the buffer keeps cycling.
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.faces, 0);
    assert_eq!(detector.calls, 2);
    assert_eq!(sink.shows, 2);
    assert_eq!(source.resubmitted, vec![0]);
}
