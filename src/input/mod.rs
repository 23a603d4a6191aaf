//! Input Event Translation
//!
//! Converts raw device events into the consumer's event model.
//!
//! # Features
//!
//! - **Pointer**
//!   - Relative motion with optional unaccelerated deltas
//!   - Absolute motion rescaled into the canonical 0..=65535 range, accepted
//!     only from devices whose axes are absolute
//!   - Kernel button codes mapped to consumer numbering, then through the
//!     device's button remap table
//!   - Wheel, finger and continuous scrolling with per-axis step distance
//!     and whole-step accumulation
//!
//! - **Keyboard**
//!   - Kernel key codes offset by 8 into consumer keycodes
//!
//! - **Touch**
//!   - Slot to identity tracking per device, at most 15 concurrent contacts
//!   - Process-wide identity counter; identities are never reused
//!
//! # Architecture
//!
//! ```text
//! RawEvent (per device)
//!       ↓
//! ┌─────────────────────────┐
//! │  EventTranslator        │ ← touch identity counter, statistics
//! └─────────────────────────┘
//!       ↓                ↑
//! ┌──────────────┐ ┌──────────────────┐
//! │ buttons      │ │ TranslationState │ ← per device: slots, scroll,
//! │ mapping      │ │                  │   absolute flag
//! └──────────────┘ └──────────────────┘
//!       ↓
//! EventSink (consumer)
//! ```

pub mod buttons;
pub mod sink;
pub mod state;
pub mod translator;

pub use sink::{ConsumerEvent, EventSink, ScrollAxis, TouchPhase};
pub use state::{TouchIdAllocator, TranslationState, DEFAULT_SCROLL_DISTANCE, TOUCH_MAX_SLOTS};
pub use translator::{EventTranslator, AXIS_MAX, KEYCODE_OFFSET};
