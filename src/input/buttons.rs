//! Button numbering
//!
//! Devices report kernel button codes. The consumer numbers buttons from 1
//! with left, middle and right first, then 4-7 for scrolling, then side
//! buttons from 8 on.

/// Left button
pub const BTN_LEFT: u32 = 0x110;
/// Right button
pub const BTN_RIGHT: u32 = 0x111;
/// Middle button
pub const BTN_MIDDLE: u32 = 0x112;
/// First side button
pub const BTN_SIDE: u32 = 0x113;
/// Extra button
pub const BTN_EXTRA: u32 = 0x114;
/// Forward button
pub const BTN_FORWARD: u32 = 0x115;
/// Back button
pub const BTN_BACK: u32 = 0x116;
/// Task button
pub const BTN_TASK: u32 = 0x117;
/// First code past the mouse button range
pub const BTN_JOYSTICK: u32 = 0x120;

/// First consumer number used for side buttons
const SIDE_BUTTON_BASE: u32 = 8;

/// Kernel button code to consumer button number
///
/// Codes below `BTN_SIDE` other than left, middle and right have no consumer
/// number and map to 0, which the translator drops.
pub fn linux_to_consumer(code: u32) -> u32 {
    match code {
        BTN_LEFT => 1,
        BTN_MIDDLE => 2,
        BTN_RIGHT => 3,
        code if code >= BTN_SIDE => SIDE_BUTTON_BASE + (code - BTN_SIDE),
        _ => 0,
    }
}

/// Consumer button number to kernel button code
///
/// Numbers 4-7 are scroll buttons with no kernel counterpart; they map to
/// 0 like button 0 does. Returns `None` when the number lies past the last
/// representable kernel code.
pub fn consumer_to_linux(button: u32) -> Option<u32> {
    match button {
        0 | 4..=7 => Some(0),
        1 => Some(BTN_LEFT),
        2 => Some(BTN_MIDDLE),
        3 => Some(BTN_RIGHT),
        _ => (button - SIDE_BUTTON_BASE).checked_add(BTN_SIDE),
    }
}
