//! Fixed pool of memory-mapped frame buffers.
//!
//! The pool owns one mapping per buffer for the whole session and tracks
//! which side of the producer/consumer hand-off currently owns each slot.
//! Views over the mapped memory are only handed out for slots the consumer
//! holds, and they borrow the pool mutably, so a buffer can never be read
//! while it is being resubmitted.

use super::mapping::MappedPlane;
use super::types::{CameraError, FrameLayout, SlotState};
use crate::frame::FrameView;

/// Double-buffering floor: one buffer in flight while another is displayed.
pub const MIN_BUFFERS: usize = 2;

struct Slot {
    mapping: MappedPlane,
    state: SlotState,
}

/// Pool of mapped frame buffers with per-slot ownership tracking.
///
/// Slots start out held by the consumer; the capture session marks them in
/// flight as it queues their requests. All mappings are released together
/// when the pool drops, after the capture session has been stopped.
pub struct FramePool {
    slots: Vec<Slot>,
    layout: FrameLayout,
}

impl FramePool {
    /// Build a pool from pre-established mappings.
    ///
    /// # Errors
    /// * `InsufficientBuffers` - fewer than [`MIN_BUFFERS`] mappings
    /// * `ShortBuffer` - a mapping smaller than one frame of `layout`
    pub fn new(mappings: Vec<MappedPlane>, layout: FrameLayout) -> Result<Self, CameraError> {
        if mappings.len() < MIN_BUFFERS {
            return Err(CameraError::InsufficientBuffers {
                got: mappings.len(),
            });
        }
        for (slot, mapping) in mappings.iter().enumerate() {
            if mapping.len() < layout.byte_len() {
                return Err(CameraError::ShortBuffer { slot });
            }
        }

        Ok(Self {
            slots: mappings
                .into_iter()
                .map(|mapping| Slot {
                    mapping,
                    state: SlotState::Held,
                })
                .collect(),
            layout,
        })
    }

    /// Number of buffers in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Pixel geometry shared by every buffer in the pool.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Current state of a slot, or `None` for an index outside the pool.
    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    /// Resolve a completion cookie to a pool slot.
    ///
    /// The buffer set is closed, so an unknown cookie means the completion
    /// does not belong to this pool and must be skipped without resubmission.
    pub fn slot_for_cookie(&self, cookie: u64) -> Option<usize> {
        let slot = usize::try_from(cookie).ok()?;
        (slot < self.slots.len()).then_some(slot)
    }

    /// Record that a slot's buffer has been handed to the capture source.
    ///
    /// # Errors
    /// `SlotStateViolation` when the slot is already in flight; submitting a
    /// buffer twice would let the device scribble over a frame the consumer
    /// still considers its own.
    pub fn mark_in_flight(&mut self, slot: usize) -> Result<(), CameraError> {
        self.transition(slot, SlotState::Held, SlotState::InFlight)
    }

    /// Record that a slot's buffer has completed and is now consumer-owned.
    ///
    /// # Errors
    /// `SlotStateViolation` when the slot was not in flight, which indicates
    /// a duplicated or stale completion.
    pub fn mark_held(&mut self, slot: usize) -> Result<(), CameraError> {
        self.transition(slot, SlotState::InFlight, SlotState::Held)
    }

    fn transition(
        &mut self,
        slot: usize,
        from: SlotState,
        to: SlotState,
    ) -> Result<(), CameraError> {
        let s = self
            .slots
            .get_mut(slot)
            .ok_or(CameraError::BadSlot(slot))?;
        if s.state != from {
            return Err(CameraError::SlotStateViolation {
                slot,
                expected: from,
            });
        }
        s.state = to;
        Ok(())
    }

    /// Borrow a read/write view over a held slot's frame.
    ///
    /// The view borrows the pool mutably, so it cannot outlive the point
    /// where the buffer is marked in flight again.
    ///
    /// # Errors
    /// * `BadSlot` - index outside the pool
    /// * `SlotStateViolation` - the slot is in flight
    pub fn frame_mut(&mut self, slot: usize) -> Result<FrameView<'_>, CameraError> {
        let layout = self.layout;
        let s = self
            .slots
            .get_mut(slot)
            .ok_or(CameraError::BadSlot(slot))?;
        if s.state != SlotState::Held {
            return Err(CameraError::SlotStateViolation {
                slot,
                expected: SlotState::Held,
            });
        }
        FrameView::new(s.mapping.as_mut_slice(), layout)
            .ok_or(CameraError::ShortBuffer { slot })
    }
}
