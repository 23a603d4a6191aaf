//! Event Translator
//!
//! Converts raw device events into consumer events. The translator itself
//! only owns the process-wide touch identity counter and statistics; all
//! per-device state lives in the [`TranslationState`] passed in by the
//! caller.

use tracing::{error, trace};

use super::buttons::linux_to_consumer;
use super::sink::{ConsumerEvent, EventSink, ScrollAxis, TouchPhase};
use super::state::{ScrollAxisState, TouchIdAllocator, TranslationState};
use crate::device::{AbsolutePoint, AxisSource, AxisValue, RawEventKind};
use crate::error::DeviceId;
use crate::options::ButtonMap;

/// Upper bound of the canonical absolute coordinate range
pub const AXIS_MAX: f64 = 65535.0;

/// Offset between kernel key codes and consumer keycodes
pub const KEYCODE_OFFSET: u32 = 8;

/// Raw event to consumer event translator
#[derive(Debug, Default)]
pub struct EventTranslator {
    touch_ids: TouchIdAllocator,
    events_processed: u64,
    events_dropped: u64,
}

impl EventTranslator {
    /// Create a translator with a fresh touch identity counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one event of `device`
    ///
    /// Returns `true` when at least one consumer event was posted.
    pub fn translate(
        &mut self,
        device: DeviceId,
        state: &mut TranslationState,
        button_map: &ButtonMap,
        event: &RawEventKind,
        sink: &mut dyn EventSink,
    ) -> bool {
        self.events_processed += 1;

        let translated = match event {
            RawEventKind::DeviceAdded
            | RawEventKind::DeviceRemoved
            | RawEventKind::TouchFrame => None,

            RawEventKind::PointerMotion {
                dx,
                dy,
                unaccelerated,
            } => Some(ConsumerEvent::RelativeMotion {
                dx: *dx,
                dy: *dy,
                raw: *unaccelerated,
            }),

            RawEventKind::PointerMotionAbsolute { point } => {
                if state.is_absolute() {
                    let (x, y) = canonical(point);
                    Some(ConsumerEvent::AbsoluteMotion { x, y })
                } else {
                    error!("{}: absolute motion on a relative device, dropped", device);
                    None
                }
            }

            RawEventKind::PointerButton { button, state: pressed } => {
                match button_map.map(linux_to_consumer(*button)) {
                    0 => None,
                    button => Some(ConsumerEvent::Button {
                        button,
                        pressed: pressed.is_pressed(),
                    }),
                }
            }

            RawEventKind::KeyboardKey { key, state: pressed } => Some(ConsumerEvent::Key {
                keycode: key + KEYCODE_OFFSET,
                pressed: pressed.is_pressed(),
            }),

            RawEventKind::PointerAxis {
                source,
                horizontal,
                vertical,
            } => translate_axis(state, *source, *horizontal, *vertical),

            RawEventKind::TouchDown { slot, point } => {
                if state.has_slot(*slot) {
                    let id = self.touch_ids.allocate();
                    state.begin_touch(*slot, id);
                    Some(ConsumerEvent::Touch {
                        id,
                        phase: TouchPhase::Begin,
                        position: Some(canonical(point)),
                    })
                } else {
                    error!("{}: touch slot {} out of range, dropped", device, slot);
                    None
                }
            }

            RawEventKind::TouchMotion { slot, point } => match state.touch_id(*slot) {
                Some(id) => Some(ConsumerEvent::Touch {
                    id,
                    phase: TouchPhase::Update,
                    position: Some(canonical(point)),
                }),
                None => {
                    error!("{}: motion on idle touch slot {}, dropped", device, slot);
                    None
                }
            },

            RawEventKind::TouchUp { slot } | RawEventKind::TouchCancel { slot } => {
                match state.end_touch(*slot) {
                    Some(id) => Some(ConsumerEvent::Touch {
                        id,
                        phase: TouchPhase::End,
                        position: None,
                    }),
                    None => {
                        error!("{}: release of idle touch slot {}, dropped", device, slot);
                        None
                    }
                }
            }
        };

        match translated {
            Some(event) => {
                trace!("{}: {:?}", device, event);
                sink.post(device, event);
                true
            }
            None => {
                self.events_dropped += 1;
                false
            }
        }
    }

    /// Count an event dropped before translation
    pub fn record_dropped(&mut self) {
        self.events_processed += 1;
        self.events_dropped += 1;
    }

    /// Total events seen
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Events that produced no consumer event
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped
    }
}

/// Rescale a device position into the canonical range
fn canonical(point: &AbsolutePoint) -> (f64, f64) {
    (point.x_transformed(AXIS_MAX), point.y_transformed(AXIS_MAX))
}

fn translate_axis(
    state: &mut TranslationState,
    source: AxisSource,
    horizontal: Option<AxisValue>,
    vertical: Option<AxisValue>,
) -> Option<ConsumerEvent> {
    let delta = |axis: &ScrollAxisState, value: AxisValue| match source {
        AxisSource::Wheel => value.discrete * axis.distance(),
        _ => value.value,
    };

    match source {
        AxisSource::Wheel | AxisSource::Finger | AxisSource::Continuous => {}
        AxisSource::WheelTilt => return None,
    }

    let horizontal = horizontal.map(|value| {
        let axis = state.horizontal();
        let delta = delta(axis, value);
        ScrollAxis {
            delta,
            clicks: axis.accumulate(delta),
        }
    });
    let vertical = vertical.map(|value| {
        let axis = state.vertical();
        let delta = delta(axis, value);
        ScrollAxis {
            delta,
            clicks: axis.accumulate(delta),
        }
    });

    if horizontal.is_none() && vertical.is_none() {
        return None;
    }
    Some(ConsumerEvent::Scroll {
        horizontal,
        vertical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AxisRange, ButtonState};
    use crate::input::buttons::{BTN_LEFT, BTN_RIGHT, BTN_SIDE};

    const DEVICE: DeviceId = DeviceId(1);

    fn point(x: f64, y: f64) -> AbsolutePoint {
        let range = AxisRange {
            minimum: 0.0,
            maximum: 1000.0,
        };
        AbsolutePoint {
            x,
            y,
            x_range: range,
            y_range: range,
        }
    }

    fn run(
        translator: &mut EventTranslator,
        state: &mut TranslationState,
        events: &[RawEventKind],
    ) -> Vec<ConsumerEvent> {
        let mut sink = Vec::new();
        for event in events {
            translator.translate(DEVICE, state, &ButtonMap::identity(), event, &mut sink);
        }
        sink.into_iter().map(|(_, event)| event).collect()
    }

    #[test]
    fn test_relative_motion_keeps_raw() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[RawEventKind::PointerMotion {
                dx: 1.5,
                dy: -2.0,
                unaccelerated: Some((1.0, -1.0)),
            }],
        );
        assert_eq!(
            out,
            vec![ConsumerEvent::RelativeMotion {
                dx: 1.5,
                dy: -2.0,
                raw: Some((1.0, -1.0)),
            }]
        );
    }

    #[test]
    fn test_absolute_motion_requires_absolute_device() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let event = RawEventKind::PointerMotionAbsolute {
            point: point(500.0, 1000.0),
        };

        assert!(run(&mut translator, &mut state, &[event.clone()]).is_empty());
        assert_eq!(translator.events_dropped(), 1);

        state.set_absolute(true);
        let out = run(&mut translator, &mut state, &[event]);
        assert_eq!(
            out,
            vec![ConsumerEvent::AbsoluteMotion {
                x: 32767.5,
                y: 65535.0
            }]
        );
    }

    #[test]
    fn test_buttons_and_keys() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[
                RawEventKind::PointerButton {
                    button: BTN_RIGHT,
                    state: ButtonState::Pressed,
                },
                RawEventKind::PointerButton {
                    button: BTN_SIDE,
                    state: ButtonState::Released,
                },
                RawEventKind::KeyboardKey {
                    key: 30,
                    state: ButtonState::Pressed,
                },
            ],
        );
        assert_eq!(
            out,
            vec![
                ConsumerEvent::Button {
                    button: 3,
                    pressed: true
                },
                ConsumerEvent::Button {
                    button: 8,
                    pressed: false
                },
                ConsumerEvent::Key {
                    keycode: 38,
                    pressed: true
                },
            ]
        );
    }

    #[test]
    fn test_button_map_applied() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let map = ButtonMap::from_entries(vec![3, 2, 1]).unwrap();
        let mut sink = Vec::new();

        translator.translate(
            DEVICE,
            &mut state,
            &map,
            &RawEventKind::PointerButton {
                button: BTN_LEFT,
                state: ButtonState::Pressed,
            },
            &mut sink,
        );
        assert_eq!(
            sink[0].1,
            ConsumerEvent::Button {
                button: 3,
                pressed: true
            }
        );

        let disabled = ButtonMap::from_entries(vec![0]).unwrap();
        assert!(!translator.translate(
            DEVICE,
            &mut state,
            &disabled,
            &RawEventKind::PointerButton {
                button: BTN_LEFT,
                state: ButtonState::Pressed,
            },
            &mut sink,
        ));
    }

    #[test]
    fn test_wheel_scroll_uses_step_distance() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::new(10.0, 15.0);
        let out = run(
            &mut translator,
            &mut state,
            &[RawEventKind::PointerAxis {
                source: AxisSource::Wheel,
                horizontal: Some(AxisValue {
                    value: 7.0,
                    discrete: -1.0,
                }),
                vertical: Some(AxisValue {
                    value: 30.0,
                    discrete: 2.0,
                }),
            }],
        );
        assert_eq!(
            out,
            vec![ConsumerEvent::Scroll {
                horizontal: Some(ScrollAxis {
                    delta: -10.0,
                    clicks: -1
                }),
                vertical: Some(ScrollAxis {
                    delta: 30.0,
                    clicks: 2
                }),
            }]
        );
    }

    #[test]
    fn test_finger_scroll_unscaled() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let scroll = RawEventKind::PointerAxis {
            source: AxisSource::Finger,
            horizontal: None,
            vertical: Some(AxisValue {
                value: 10.0,
                discrete: 0.0,
            }),
        };
        let out = run(&mut translator, &mut state, &[scroll.clone(), scroll]);
        let clicks: Vec<i32> = out
            .iter()
            .map(|event| match event {
                ConsumerEvent::Scroll {
                    vertical: Some(axis),
                    ..
                } => {
                    assert_eq!(axis.delta, 10.0);
                    axis.clicks
                }
                other => panic!("Expected scroll, got {:?}", other),
            })
            .collect();
        assert_eq!(clicks, vec![0, 1]);
    }

    #[test]
    fn test_tilt_scroll_dropped() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[RawEventKind::PointerAxis {
                source: AxisSource::WheelTilt,
                horizontal: Some(AxisValue {
                    value: 1.0,
                    discrete: 1.0,
                }),
                vertical: None,
            }],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_touch_identity_per_slot() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[
                RawEventKind::TouchDown {
                    slot: 2,
                    point: point(0.0, 0.0),
                },
                RawEventKind::TouchDown {
                    slot: 5,
                    point: point(1000.0, 1000.0),
                },
                RawEventKind::TouchFrame,
                RawEventKind::TouchUp { slot: 2 },
            ],
        );

        let ids: Vec<(u32, TouchPhase)> = out
            .iter()
            .map(|event| match event {
                ConsumerEvent::Touch { id, phase, .. } => (*id, *phase),
                other => panic!("Expected touch, got {:?}", other),
            })
            .collect();

        assert_eq!(ids.len(), 3);
        let (slot2, slot5) = (ids[0].0, ids[1].0);
        assert!(slot5 > slot2);
        assert_eq!(ids[2], (slot2, TouchPhase::End));
        assert_eq!(state.touch_id(5), Some(slot5));
    }

    #[test]
    fn test_touch_cancel_ends_contact() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[
                RawEventKind::TouchDown {
                    slot: 0,
                    point: point(10.0, 10.0),
                },
                RawEventKind::TouchCancel { slot: 0 },
            ],
        );

        assert!(matches!(
            out[1],
            ConsumerEvent::Touch {
                phase: TouchPhase::End,
                position: None,
                ..
            }
        ));
        assert_eq!(state.open_touches(), 0);
    }

    #[test]
    fn test_touch_on_idle_slot_dropped() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[
                RawEventKind::TouchMotion {
                    slot: 3,
                    point: point(1.0, 1.0),
                },
                RawEventKind::TouchUp { slot: 3 },
                RawEventKind::TouchDown {
                    slot: 40,
                    point: point(1.0, 1.0),
                },
            ],
        );
        assert!(out.is_empty());
        assert_eq!(translator.events_dropped(), 3);
    }

    #[test]
    fn test_button_below_side_range_dropped() {
        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(
            &mut translator,
            &mut state,
            &[
                RawEventKind::PointerButton {
                    button: 0x100,
                    state: ButtonState::Pressed,
                },
                RawEventKind::PointerButton {
                    button: BTN_SIDE,
                    state: ButtonState::Pressed,
                },
            ],
        );
        assert_eq!(
            out,
            [ConsumerEvent::Button {
                button: 8,
                pressed: true,
            }]
        );
    }

    #[test]
    fn test_out_of_range_slot_allocates_no_identity() {
        let down = |slot| RawEventKind::TouchDown {
            slot,
            point: point(1.0, 1.0),
        };

        let mut fresh = EventTranslator::new();
        let expected = run(&mut fresh, &mut TranslationState::default(), &[down(0)]);

        let mut translator = EventTranslator::new();
        let mut state = TranslationState::default();
        let out = run(&mut translator, &mut state, &[down(40), down(u32::MAX), down(0)]);

        assert_eq!(out, expected);
        assert_eq!(translator.events_dropped(), 2);
    }
}
