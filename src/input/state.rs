//! Translation state
//!
//! Per-device state the event translator carries between events, and the
//! process-wide touch identity counter.

use serde::Serialize;
use tracing::warn;

/// Concurrent touch contacts tracked per device
pub const TOUCH_MAX_SLOTS: usize = 15;

/// Wheel step distance used unless configured otherwise
pub const DEFAULT_SCROLL_DISTANCE: f64 = 15.0;

/// One scroll axis: step distance and the fraction of a step not yet reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollAxisState {
    distance: f64,
    remainder: f64,
}

impl ScrollAxisState {
    /// Axis with the given step distance
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            remainder: 0.0,
        }
    }

    /// Step distance
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Distance accumulated towards the next whole step
    pub fn remainder(&self) -> f64 {
        self.remainder
    }

    /// Accumulate `delta` and return the whole steps it completes
    pub fn accumulate(&mut self, delta: f64) -> i32 {
        self.remainder += delta;
        let clicks = (self.remainder / self.distance).trunc();
        self.remainder -= clicks * self.distance;
        clicks as i32
    }

    fn reset(&mut self) {
        self.remainder = 0.0;
    }
}

/// Mutable state of one device's event conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationState {
    touch_ids: [Option<u32>; TOUCH_MAX_SLOTS],
    horizontal: ScrollAxisState,
    vertical: ScrollAxisState,
    absolute: bool,
}

impl Default for TranslationState {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_DISTANCE, DEFAULT_SCROLL_DISTANCE)
    }
}

impl TranslationState {
    /// State for a relative device with the given wheel step distances
    pub fn new(horizontal_distance: f64, vertical_distance: f64) -> Self {
        Self {
            touch_ids: [None; TOUCH_MAX_SLOTS],
            horizontal: ScrollAxisState::new(horizontal_distance),
            vertical: ScrollAxisState::new(vertical_distance),
            absolute: false,
        }
    }

    /// Whether positional axes are absolute
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Mark positional axes as absolute or relative
    pub fn set_absolute(&mut self, absolute: bool) {
        self.absolute = absolute;
    }

    /// Change wheel step distances; pending remainders are discarded
    pub fn set_scroll_distance(&mut self, horizontal: f64, vertical: f64) {
        self.horizontal = ScrollAxisState::new(horizontal);
        self.vertical = ScrollAxisState::new(vertical);
    }

    /// Horizontal scroll axis
    pub fn horizontal(&mut self) -> &mut ScrollAxisState {
        &mut self.horizontal
    }

    /// Vertical scroll axis
    pub fn vertical(&mut self) -> &mut ScrollAxisState {
        &mut self.vertical
    }

    /// Whether `slot` can hold a contact
    pub fn has_slot(&self, slot: u32) -> bool {
        (slot as usize) < self.touch_ids.len()
    }

    /// Record a new contact on `slot`. Returns false for a slot out of range.
    pub fn begin_touch(&mut self, slot: u32, id: u32) -> bool {
        let Some(entry) = self.touch_ids.get_mut(slot as usize) else {
            return false;
        };
        if let Some(previous) = entry.replace(id) {
            warn!("Touch slot {} reused while touch {} was open", slot, previous);
        }
        true
    }

    /// Identity of the open contact on `slot`
    pub fn touch_id(&self, slot: u32) -> Option<u32> {
        self.touch_ids.get(slot as usize).copied().flatten()
    }

    /// Close the contact on `slot`, returning its identity
    pub fn end_touch(&mut self, slot: u32) -> Option<u32> {
        self.touch_ids.get_mut(slot as usize)?.take()
    }

    /// Number of open contacts
    pub fn open_touches(&self) -> usize {
        self.touch_ids.iter().filter(|id| id.is_some()).count()
    }

    /// Clear per-contact and scroll state across a disable/enable cycle
    pub fn reset(&mut self) {
        self.touch_ids = [None; TOUCH_MAX_SLOTS];
        self.horizontal.reset();
        self.vertical.reset();
    }
}

/// Process-wide source of touch identities. Identities are never reused.
#[derive(Debug, Default)]
pub struct TouchIdAllocator {
    next: u32,
}

impl TouchIdAllocator {
    /// Fresh allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identity
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}
