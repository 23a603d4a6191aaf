//! Consumer event model
//!
//! What the translator hands to the host input pipeline.

use serde::Serialize;

use crate::error::DeviceId;

/// Phase of a touch contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    /// Contact started
    Begin,
    /// Contact moved
    Update,
    /// Contact ended or was cancelled
    End,
}

/// One scroll axis of a scroll event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollAxis {
    /// Linear scroll distance
    pub delta: f64,
    /// Whole wheel steps completed by this event
    pub clicks: i32,
}

/// Events delivered to the consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConsumerEvent {
    /// Relative pointer motion
    RelativeMotion {
        /// Accelerated X delta
        dx: f64,
        /// Accelerated Y delta
        dy: f64,
        /// Unaccelerated deltas, when available
        raw: Option<(f64, f64)>,
    },
    /// Absolute pointer motion in the canonical 0..=65535 range
    AbsoluteMotion {
        /// X
        x: f64,
        /// Y
        y: f64,
    },
    /// Pointer button, consumer numbering
    Button {
        /// Button number
        button: u32,
        /// Press or release
        pressed: bool,
    },
    /// Key, consumer keycode
    Key {
        /// Keycode
        keycode: u32,
        /// Press or release
        pressed: bool,
    },
    /// Scroll on one or both axes
    Scroll {
        /// Horizontal axis
        horizontal: Option<ScrollAxis>,
        /// Vertical axis
        vertical: Option<ScrollAxis>,
    },
    /// Touch contact
    Touch {
        /// Touch identity
        id: u32,
        /// Phase
        phase: TouchPhase,
        /// Position in the canonical range; absent when the contact ends
        position: Option<(f64, f64)>,
    },
}

/// Receiver of translated events
pub trait EventSink {
    /// Deliver one event for `device`
    fn post(&mut self, device: DeviceId, event: ConsumerEvent);
}

impl EventSink for Vec<(DeviceId, ConsumerEvent)> {
    fn post(&mut self, device: DeviceId, event: ConsumerEvent) {
        self.push((device, event));
    }
}
