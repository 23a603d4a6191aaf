//! Device Options
//!
//! String-keyed configuration supplied at device open, the resolved
//! per-device [`OptionSet`], and the two components that keep that set in
//! sync with the device:
//!
//! - [`resolver`]: merges device defaults with user overrides, validating
//!   each value against the device by applying it and reading back on refusal
//! - [`applier`]: pushes a resolved set into the device's live configuration

use enumflags2::BitFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::device::{ClickMethod, ScrollMethod, SendEventsMode};

pub mod applier;
pub mod parse;
pub mod resolver;

pub use applier::{apply, ApplyReport};
pub use resolver::{read_back, resolve};

/// Upper bound of the button remap table
pub const MAX_BUTTONS: usize = 32;

/// Configurable options, named by their configuration key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionKind {
    /// Tap-to-click
    Tapping,
    /// Tap drag-lock
    TappingDragLock,
    /// Pointer acceleration speed
    AccelSpeed,
    /// Natural scrolling
    NaturalScrolling,
    /// Send-events mode
    SendEventsMode,
    /// Left-handed button swap
    LeftHanded,
    /// Scroll method
    ScrollMethod,
    /// Button used for button scrolling
    ScrollButton,
    /// Click method
    ClickMethod,
    /// Middle-button emulation
    MiddleEmulation,
    /// Accessibility key-repeat (halfkey)
    AccessibilityKeyRepeat,
    /// Calibration matrix
    CalibrationMatrix,
    /// Consumer-side button remap
    ButtonMapping,
}

impl OptionKind {
    /// Every option in resolution order
    pub const ALL: [OptionKind; 13] = [
        OptionKind::Tapping,
        OptionKind::TappingDragLock,
        OptionKind::AccelSpeed,
        OptionKind::NaturalScrolling,
        OptionKind::SendEventsMode,
        OptionKind::LeftHanded,
        OptionKind::MiddleEmulation,
        OptionKind::ScrollMethod,
        OptionKind::ScrollButton,
        OptionKind::ClickMethod,
        OptionKind::AccessibilityKeyRepeat,
        OptionKind::CalibrationMatrix,
        OptionKind::ButtonMapping,
    ];

    /// Configuration key
    pub fn key(self) -> &'static str {
        match self {
            OptionKind::Tapping => "Tapping",
            OptionKind::TappingDragLock => "TappingDragLock",
            OptionKind::AccelSpeed => "AccelSpeed",
            OptionKind::NaturalScrolling => "NaturalScrolling",
            OptionKind::SendEventsMode => "SendEventsMode",
            OptionKind::LeftHanded => "LeftHanded",
            OptionKind::ScrollMethod => "ScrollMethod",
            OptionKind::ScrollButton => "ScrollButton",
            OptionKind::ClickMethod => "ClickMethod",
            OptionKind::MiddleEmulation => "MiddleEmulation",
            OptionKind::AccessibilityKeyRepeat => "AccessibilityKeyRepeat",
            OptionKind::CalibrationMatrix => "CalibrationMatrix",
            OptionKind::ButtonMapping => "ButtonMapping",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Key of the required device path option
pub const DEVICE_KEY: &str = "Device";

/// Normalize an option key: lowercase, without `_`, `-` or spaces
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// String-keyed options supplied for one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: BTreeMap<String, String>,
}

impl OptionMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an option
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries.insert(normalize_key(key.as_ref()), value.into());
    }

    /// Builder form of [`OptionMap::insert`]
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Raw text of an option
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(String::as_str)
    }

    /// Raw text of a configurable option. The accessibility key-repeat
    /// option is also accepted under its short name `Halfkey`.
    pub fn option(&self, kind: OptionKind) -> Option<&str> {
        match kind {
            OptionKind::AccessibilityKeyRepeat => {
                self.get(kind.key()).or_else(|| self.get("Halfkey"))
            }
            _ => self.get(kind.key()),
        }
    }

    /// The device node path
    pub fn device_path(&self) -> Option<&str> {
        self.get(DEVICE_KEY).filter(|path| !path.is_empty())
    }

    /// Number of options
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no option is set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OptionMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, OptionValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, value.into_text()))
            .collect())
    }
}

/// TOML scalars accepted as option text
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    fn into_text(self) -> String {
        match self {
            OptionValue::Bool(value) => if value { "on" } else { "off" }.to_string(),
            OptionValue::Integer(value) => value.to_string(),
            OptionValue::Float(value) => value.to_string(),
            OptionValue::Text(value) => value,
        }
    }
}

/// 3x3 row-major affine calibration matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationMatrix(pub [f32; 9]);

impl CalibrationMatrix {
    /// Identity transform
    pub const IDENTITY: CalibrationMatrix =
        CalibrationMatrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// Build from the six user-settable elements
    pub fn from_affine(affine: [f32; 6]) -> Self {
        let mut matrix = Self::IDENTITY;
        matrix.0[..6].copy_from_slice(&affine);
        matrix
    }

    /// The six user-settable elements
    pub fn affine(&self) -> [f32; 6] {
        let mut affine = [0.0; 6];
        affine.copy_from_slice(&self.0[..6]);
        affine
    }

    /// Copy with the bottom row forced to `0 0 1`
    pub fn normalized(mut self) -> Self {
        self.0[6..].copy_from_slice(&[0.0, 0.0, 1.0]);
        self
    }
}

impl Default for CalibrationMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 1-indexed consumer button remap table
///
/// Buttons beyond the table map to themselves. A button mapped to 0 is
/// disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ButtonMap {
    entries: Vec<u32>,
}

impl ButtonMap {
    /// Identity mapping
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build from an explicit table, entry `i` remapping button `i + 1`
    pub fn from_entries(entries: Vec<u32>) -> Option<Self> {
        let valid = entries.len() <= MAX_BUTTONS
            && entries.iter().all(|button| *button as usize <= MAX_BUTTONS);
        valid.then_some(Self { entries })
    }

    /// Remap one consumer button
    pub fn map(&self, button: u32) -> u32 {
        match button.checked_sub(1) {
            Some(index) => self
                .entries
                .get(index as usize)
                .copied()
                .unwrap_or(button),
            None => button,
        }
    }

    /// True when every button maps to itself
    pub fn is_identity(&self) -> bool {
        self.entries
            .iter()
            .enumerate()
            .all(|(index, button)| *button as usize == index + 1)
    }

    /// The explicit table
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }
}

/// Resolved configuration of one device
///
/// Every field mirrors what the device actually holds. Options the device
/// does not support keep their fixed disabled value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSet {
    /// Tap-to-click
    pub tapping: bool,
    /// Tap drag-lock
    pub tap_drag_lock: bool,
    /// Acceleration speed in [-1, 1]
    pub accel_speed: f32,
    /// Natural scrolling
    pub natural_scrolling: bool,
    /// Send-events mode, empty for enabled
    pub send_events: BitFlags<SendEventsMode>,
    /// Left-handed mode
    pub left_handed: bool,
    /// Scroll method
    pub scroll_method: Option<ScrollMethod>,
    /// Scroll button, consumer numbering
    pub scroll_button: u32,
    /// Click method
    pub click_method: Option<ClickMethod>,
    /// Middle-button emulation
    pub middle_emulation: bool,
    /// Accessibility key-repeat
    pub accessibility_key_repeat: bool,
    /// Calibration matrix
    pub calibration: CalibrationMatrix,
    /// Consumer button remap
    pub button_map: ButtonMap,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            tapping: false,
            tap_drag_lock: false,
            accel_speed: 0.0,
            natural_scrolling: false,
            send_events: BitFlags::empty(),
            left_handed: false,
            scroll_method: None,
            scroll_button: 0,
            click_method: None,
            middle_emulation: false,
            accessibility_key_repeat: false,
            calibration: CalibrationMatrix::IDENTITY,
            button_map: ButtonMap::identity(),
        }
    }
}
