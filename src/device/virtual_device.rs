//! In-memory devices and event source
//!
//! [`VirtualDevice`] behaves like a device handle of a real input library:
//! it reports a fixed capability set, holds a live configuration and refuses
//! values the hardware could not take. [`VirtualBackend`] is the shared event
//! source those devices attach to. Events are injected by the owner and
//! become visible after the next dispatch.
//!
//! Both types are cheap handles over shared state, so a test or the replay
//! tool can keep a handle while the driver owns another.

use enumflags2::BitFlags;
use nix::fcntl::OFlag;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{
    log_backend_message, ClickMethod, ConfigStatus, DeviceCapability, DeviceKey, EventSource,
    InputDevice, Led, LogPriority, RawEvent, RawEventKind, ScrollMethod, SendEventsMode,
};
use crate::input::buttons::{BTN_LEFT, BTN_MIDDLE, BTN_RIGHT};
use crate::options::OptionKind;
use crate::registry::OpenRestricted;

/// Descriptor reported by a virtual backend unless overridden
pub const VIRTUAL_EVENT_FD: RawFd = 1024;

/// Factory configuration of a virtual device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualDefaults {
    /// Tap-to-click
    pub tapping: bool,
    /// Tap drag-lock
    pub tap_drag_lock: bool,
    /// Acceleration speed
    pub accel_speed: f64,
    /// Natural scrolling
    pub natural_scrolling: bool,
    /// Send-events mode
    pub send_events: Vec<SendEventsMode>,
    /// Left-handed mode
    pub left_handed: bool,
    /// Scroll method
    pub scroll_method: Option<ScrollMethod>,
    /// Scroll button, kernel code
    pub scroll_button: u32,
    /// Click method
    pub click_method: Option<ClickMethod>,
    /// Calibration
    pub calibration: [f32; 6],
    /// Middle-button emulation
    pub middle_emulation: bool,
    /// Accessibility key-repeat
    pub accessibility_key_repeat: bool,
}

impl Default for VirtualDefaults {
    fn default() -> Self {
        Self {
            tapping: false,
            tap_drag_lock: false,
            accel_speed: 0.0,
            natural_scrolling: false,
            send_events: Vec::new(),
            left_handed: false,
            scroll_method: None,
            scroll_button: 0,
            click_method: None,
            calibration: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            middle_emulation: false,
            accessibility_key_repeat: false,
        }
    }
}

/// Description of a virtual device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualDeviceSpec {
    /// Device node path the device is attached by
    pub path: PathBuf,
    /// Device name
    pub name: String,
    /// Vendor id
    pub vendor: u32,
    /// Product id
    pub product: u32,
    /// Reported modalities
    pub capabilities: Vec<DeviceCapability>,
    /// Fingers usable for tapping
    pub tap_finger_count: u32,
    /// Acceleration is configurable
    pub accel: bool,
    /// Calibration is configurable
    pub calibration: bool,
    /// Left-handed mode is configurable
    pub left_handed: bool,
    /// Natural scrolling is configurable
    pub natural_scroll: bool,
    /// Middle-button emulation is configurable
    pub middle_emulation: bool,
    /// Accessibility key-repeat is configurable
    pub accessibility_key_repeat: bool,
    /// Supported scroll methods
    pub scroll_methods: Vec<ScrollMethod>,
    /// Supported click methods
    pub click_methods: Vec<ClickMethod>,
    /// Supported send-events modes
    pub send_events_modes: Vec<SendEventsMode>,
    /// Kernel button codes
    pub buttons: Vec<u32>,
    /// Factory configuration
    pub defaults: VirtualDefaults,
    /// Options the device refuses with [`ConfigStatus::Invalid`]
    pub reject: Vec<OptionKind>,
}

impl Default for VirtualDeviceSpec {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            name: "Virtual input device".to_string(),
            vendor: 0,
            product: 0,
            capabilities: Vec::new(),
            tap_finger_count: 0,
            accel: false,
            calibration: false,
            left_handed: false,
            natural_scroll: false,
            middle_emulation: false,
            accessibility_key_repeat: false,
            scroll_methods: Vec::new(),
            click_methods: Vec::new(),
            send_events_modes: Vec::new(),
            buttons: Vec::new(),
            defaults: VirtualDefaults::default(),
            reject: Vec::new(),
        }
    }
}

impl VirtualDeviceSpec {
    /// Clickpad with tapping, two-finger and edge scrolling
    pub fn touchpad(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "Virtual Touchpad".to_string(),
            vendor: 0x06cb,
            product: 0x2970,
            capabilities: vec![DeviceCapability::Pointer],
            tap_finger_count: 3,
            accel: true,
            left_handed: true,
            natural_scroll: true,
            middle_emulation: true,
            scroll_methods: vec![ScrollMethod::TwoFinger, ScrollMethod::Edge],
            click_methods: vec![ClickMethod::ButtonAreas, ClickMethod::Clickfinger],
            send_events_modes: vec![
                SendEventsMode::Disabled,
                SendEventsMode::DisabledOnExternalMouse,
            ],
            buttons: vec![BTN_LEFT],
            defaults: VirtualDefaults {
                tap_drag_lock: true,
                scroll_method: Some(ScrollMethod::TwoFinger),
                click_method: Some(ClickMethod::ButtonAreas),
                ..VirtualDefaults::default()
            },
            ..Self::default()
        }
    }

    /// Three-button wheel mouse with button scrolling
    pub fn mouse(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "Virtual Mouse".to_string(),
            vendor: 0x046d,
            product: 0xc077,
            capabilities: vec![DeviceCapability::Pointer],
            accel: true,
            left_handed: true,
            natural_scroll: true,
            middle_emulation: true,
            scroll_methods: vec![ScrollMethod::OnButtonDown],
            send_events_modes: vec![SendEventsMode::Disabled],
            buttons: vec![BTN_LEFT, BTN_RIGHT, BTN_MIDDLE],
            defaults: VirtualDefaults {
                scroll_button: BTN_MIDDLE,
                ..VirtualDefaults::default()
            },
            ..Self::default()
        }
    }

    /// Direct-touch screen with calibration
    pub fn touchscreen(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "Virtual Touchscreen".to_string(),
            vendor: 0x04f3,
            product: 0x2234,
            capabilities: vec![DeviceCapability::Touch],
            calibration: true,
            send_events_modes: vec![SendEventsMode::Disabled],
            ..Self::default()
        }
    }

    /// Absolute pointer such as a graphics tablet in mouse mode
    pub fn absolute_pointer(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "Virtual Absolute Pointer".to_string(),
            vendor: 0x056a,
            product: 0x0357,
            capabilities: vec![DeviceCapability::Pointer],
            calibration: true,
            left_handed: true,
            buttons: vec![BTN_LEFT, BTN_RIGHT, BTN_MIDDLE],
            ..Self::default()
        }
    }

    /// Keyboard with the accessibility key-repeat option
    pub fn keyboard(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: "Virtual Keyboard".to_string(),
            vendor: 0x045e,
            product: 0x07a5,
            capabilities: vec![DeviceCapability::Keyboard],
            accessibility_key_repeat: true,
            send_events_modes: vec![SendEventsMode::Disabled],
            ..Self::default()
        }
    }
}

/// Live configuration of a virtual device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VirtualConfig {
    /// Tap-to-click
    pub tapping: bool,
    /// Tap drag-lock
    pub tap_drag_lock: bool,
    /// Acceleration speed
    pub accel_speed: f64,
    /// Natural scrolling
    pub natural_scrolling: bool,
    /// Send-events mode
    pub send_events: BitFlags<SendEventsMode>,
    /// Left-handed mode
    pub left_handed: bool,
    /// Scroll method
    pub scroll_method: Option<ScrollMethod>,
    /// Scroll button, kernel code
    pub scroll_button: u32,
    /// Click method
    pub click_method: Option<ClickMethod>,
    /// Calibration
    pub calibration: [f32; 6],
    /// Middle-button emulation
    pub middle_emulation: bool,
    /// Accessibility key-repeat
    pub accessibility_key_repeat: bool,
}

impl From<&VirtualDefaults> for VirtualConfig {
    fn from(defaults: &VirtualDefaults) -> Self {
        Self {
            tapping: defaults.tapping,
            tap_drag_lock: defaults.tap_drag_lock,
            accel_speed: defaults.accel_speed,
            natural_scrolling: defaults.natural_scrolling,
            send_events: defaults.send_events.iter().copied().collect(),
            left_handed: defaults.left_handed,
            scroll_method: defaults.scroll_method,
            scroll_button: defaults.scroll_button,
            click_method: defaults.click_method,
            calibration: defaults.calibration,
            middle_emulation: defaults.middle_emulation,
            accessibility_key_repeat: defaults.accessibility_key_repeat,
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    spec: VirtualDeviceSpec,
    capabilities: BitFlags<DeviceCapability>,
    scroll_methods: BitFlags<ScrollMethod>,
    click_methods: BitFlags<ClickMethod>,
    send_events_modes: BitFlags<SendEventsMode>,
    rejected: BTreeSet<OptionKind>,
    config: VirtualConfig,
    leds: BitFlags<Led>,
    set_calls: usize,
}

impl DeviceState {
    /// Outcome of a setter for an option gated by `available`
    fn check(&mut self, kind: OptionKind, available: bool) -> ConfigStatus {
        self.set_calls += 1;
        if !available {
            ConfigStatus::Unsupported
        } else if self.rejected.contains(&kind) {
            ConfigStatus::Invalid
        } else {
            ConfigStatus::Success
        }
    }
}

/// Handle to an in-memory input device
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    key: DeviceKey,
    state: Rc<RefCell<DeviceState>>,
}

impl VirtualDevice {
    /// Create a device with identity `key`
    pub fn new(key: u64, spec: VirtualDeviceSpec) -> Self {
        let state = DeviceState {
            capabilities: spec.capabilities.iter().copied().collect(),
            scroll_methods: spec.scroll_methods.iter().copied().collect(),
            click_methods: spec.click_methods.iter().copied().collect(),
            send_events_modes: spec.send_events_modes.iter().copied().collect(),
            rejected: spec.reject.iter().copied().collect(),
            config: VirtualConfig::from(&spec.defaults),
            leds: BitFlags::empty(),
            set_calls: 0,
            spec,
        };
        Self {
            key: DeviceKey(key),
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Device node path
    pub fn path(&self) -> PathBuf {
        self.state.borrow().spec.path.clone()
    }

    /// Current live configuration
    pub fn config(&self) -> VirtualConfig {
        self.state.borrow().config.clone()
    }

    /// LEDs last set through [`InputDevice::led_update`]
    pub fn leds(&self) -> BitFlags<Led> {
        self.state.borrow().leds
    }

    /// Refuse every later write to `kind` with [`ConfigStatus::Invalid`]
    pub fn reject(&self, kind: OptionKind) {
        self.state.borrow_mut().rejected.insert(kind);
    }

    /// Accept writes to `kind` again
    pub fn accept(&self, kind: OptionKind) {
        self.state.borrow_mut().rejected.remove(&kind);
    }

    /// Number of setter calls made so far
    pub fn set_calls(&self) -> usize {
        self.state.borrow().set_calls
    }
}

impl InputDevice for VirtualDevice {
    fn key(&self) -> DeviceKey {
        self.key
    }

    fn name(&self) -> String {
        self.state.borrow().spec.name.clone()
    }

    fn id_vendor(&self) -> u32 {
        self.state.borrow().spec.vendor
    }

    fn id_product(&self) -> u32 {
        self.state.borrow().spec.product
    }

    fn has_capability(&self, capability: DeviceCapability) -> bool {
        self.state.borrow().capabilities.contains(capability)
    }

    fn pointer_has_button(&self, button: u32) -> bool {
        self.state.borrow().spec.buttons.contains(&button)
    }

    fn led_update(&self, leds: BitFlags<Led>) {
        self.state.borrow_mut().leds = leds;
    }

    fn config_tap_finger_count(&self) -> u32 {
        self.state.borrow().spec.tap_finger_count
    }

    fn config_tap_enabled(&self) -> bool {
        self.state.borrow().config.tapping
    }

    fn config_tap_default_enabled(&self) -> bool {
        self.state.borrow().spec.defaults.tapping
    }

    fn config_tap_set_enabled(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.tap_finger_count > 0;
        let status = state.check(OptionKind::Tapping, available);
        if status.is_success() {
            state.config.tapping = enabled;
        }
        status
    }

    fn config_tap_drag_lock_enabled(&self) -> bool {
        self.state.borrow().config.tap_drag_lock
    }

    fn config_tap_default_drag_lock_enabled(&self) -> bool {
        self.state.borrow().spec.defaults.tap_drag_lock
    }

    fn config_tap_set_drag_lock_enabled(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.tap_finger_count > 0;
        let status = state.check(OptionKind::TappingDragLock, available);
        if status.is_success() {
            state.config.tap_drag_lock = enabled;
        }
        status
    }

    fn config_accel_is_available(&self) -> bool {
        self.state.borrow().spec.accel
    }

    fn config_accel_speed(&self) -> f64 {
        self.state.borrow().config.accel_speed
    }

    fn config_accel_default_speed(&self) -> f64 {
        self.state.borrow().spec.defaults.accel_speed
    }

    fn config_accel_set_speed(&self, speed: f64) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.accel;
        let status = match state.check(OptionKind::AccelSpeed, available) {
            ConfigStatus::Success if !(-1.0..=1.0).contains(&speed) => ConfigStatus::Invalid,
            status => status,
        };
        if status.is_success() {
            state.config.accel_speed = speed;
        }
        status
    }

    fn config_scroll_has_natural_scroll(&self) -> bool {
        self.state.borrow().spec.natural_scroll
    }

    fn config_scroll_natural_scroll_enabled(&self) -> bool {
        self.state.borrow().config.natural_scrolling
    }

    fn config_scroll_default_natural_scroll_enabled(&self) -> bool {
        self.state.borrow().spec.defaults.natural_scrolling
    }

    fn config_scroll_set_natural_scroll_enabled(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.natural_scroll;
        let status = state.check(OptionKind::NaturalScrolling, available);
        if status.is_success() {
            state.config.natural_scrolling = enabled;
        }
        status
    }

    fn config_send_events_modes(&self) -> BitFlags<SendEventsMode> {
        self.state.borrow().send_events_modes
    }

    fn config_send_events_mode(&self) -> BitFlags<SendEventsMode> {
        self.state.borrow().config.send_events
    }

    fn config_send_events_default_mode(&self) -> BitFlags<SendEventsMode> {
        self.state.borrow().spec.defaults.send_events.iter().copied().collect()
    }

    fn config_send_events_set_mode(&self, mode: BitFlags<SendEventsMode>) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.send_events_modes.contains(mode);
        let status = state.check(OptionKind::SendEventsMode, available);
        if status.is_success() {
            state.config.send_events = mode;
        }
        status
    }

    fn config_left_handed_is_available(&self) -> bool {
        self.state.borrow().spec.left_handed
    }

    fn config_left_handed(&self) -> bool {
        self.state.borrow().config.left_handed
    }

    fn config_left_handed_default(&self) -> bool {
        self.state.borrow().spec.defaults.left_handed
    }

    fn config_left_handed_set(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.left_handed;
        let status = state.check(OptionKind::LeftHanded, available);
        if status.is_success() {
            state.config.left_handed = enabled;
        }
        status
    }

    fn config_scroll_methods(&self) -> BitFlags<ScrollMethod> {
        self.state.borrow().scroll_methods
    }

    fn config_scroll_method(&self) -> Option<ScrollMethod> {
        self.state.borrow().config.scroll_method
    }

    fn config_scroll_default_method(&self) -> Option<ScrollMethod> {
        self.state.borrow().spec.defaults.scroll_method
    }

    fn config_scroll_set_method(&self, method: Option<ScrollMethod>) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = method.map_or(true, |m| state.scroll_methods.contains(m));
        let status = state.check(OptionKind::ScrollMethod, available);
        if status.is_success() {
            state.config.scroll_method = method;
        }
        status
    }

    fn config_scroll_button(&self) -> u32 {
        self.state.borrow().config.scroll_button
    }

    fn config_scroll_default_button(&self) -> u32 {
        self.state.borrow().spec.defaults.scroll_button
    }

    fn config_scroll_set_button(&self, button: u32) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.scroll_methods.contains(ScrollMethod::OnButtonDown);
        let status = match state.check(OptionKind::ScrollButton, available) {
            ConfigStatus::Success if button != 0 && !state.spec.buttons.contains(&button) => {
                ConfigStatus::Invalid
            }
            status => status,
        };
        if status.is_success() {
            state.config.scroll_button = button;
        }
        status
    }

    fn config_click_methods(&self) -> BitFlags<ClickMethod> {
        self.state.borrow().click_methods
    }

    fn config_click_method(&self) -> Option<ClickMethod> {
        self.state.borrow().config.click_method
    }

    fn config_click_default_method(&self) -> Option<ClickMethod> {
        self.state.borrow().spec.defaults.click_method
    }

    fn config_click_set_method(&self, method: Option<ClickMethod>) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = method.map_or(true, |m| state.click_methods.contains(m));
        let status = state.check(OptionKind::ClickMethod, available);
        if status.is_success() {
            state.config.click_method = method;
        }
        status
    }

    fn config_calibration_has_matrix(&self) -> bool {
        self.state.borrow().spec.calibration
    }

    fn config_calibration_matrix(&self) -> [f32; 6] {
        self.state.borrow().config.calibration
    }

    fn config_calibration_default_matrix(&self) -> [f32; 6] {
        self.state.borrow().spec.defaults.calibration
    }

    fn config_calibration_set_matrix(&self, matrix: [f32; 6]) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.calibration;
        let status = state.check(OptionKind::CalibrationMatrix, available);
        if status.is_success() {
            state.config.calibration = matrix;
        }
        status
    }

    fn config_middle_emulation_is_available(&self) -> bool {
        self.state.borrow().spec.middle_emulation
    }

    fn config_middle_emulation_enabled(&self) -> bool {
        self.state.borrow().config.middle_emulation
    }

    fn config_middle_emulation_default_enabled(&self) -> bool {
        self.state.borrow().spec.defaults.middle_emulation
    }

    fn config_middle_emulation_set_enabled(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.middle_emulation;
        let status = state.check(OptionKind::MiddleEmulation, available);
        if status.is_success() {
            state.config.middle_emulation = enabled;
        }
        status
    }

    fn config_key_repeat_is_available(&self) -> bool {
        self.state.borrow().spec.accessibility_key_repeat
    }

    fn config_key_repeat_enabled(&self) -> bool {
        self.state.borrow().config.accessibility_key_repeat
    }

    fn config_key_repeat_default_enabled(&self) -> bool {
        self.state.borrow().spec.defaults.accessibility_key_repeat
    }

    fn config_key_repeat_set_enabled(&self, enabled: bool) -> ConfigStatus {
        let mut state = self.state.borrow_mut();
        let available = state.spec.accessibility_key_repeat;
        let status = state.check(OptionKind::AccessibilityKeyRepeat, available);
        if status.is_success() {
            state.config.accessibility_key_repeat = enabled;
        }
        status
    }
}

#[derive(Debug)]
struct BackendState {
    fd: RawFd,
    open_nodes: bool,
    devices: Vec<VirtualDevice>,
    attached: HashMap<DeviceKey, Option<RawFd>>,
    pending: VecDeque<RawEvent>,
    queue: VecDeque<RawEvent>,
    dispatch_errors: VecDeque<io::ErrorKind>,
    dispatch_calls: usize,
}

/// Shared in-memory event source
#[derive(Debug, Clone)]
pub struct VirtualBackend {
    state: Rc<RefCell<BackendState>>,
}

impl VirtualBackend {
    /// Backend serving the given devices, keyed from 1 in order
    pub fn new(specs: impl IntoIterator<Item = VirtualDeviceSpec>) -> Self {
        let devices = specs
            .into_iter()
            .zip(1u64..)
            .map(|(spec, key)| VirtualDevice::new(key, spec))
            .collect();
        Self {
            state: Rc::new(RefCell::new(BackendState {
                fd: VIRTUAL_EVENT_FD,
                open_nodes: false,
                devices,
                attached: HashMap::new(),
                pending: VecDeque::new(),
                queue: VecDeque::new(),
                dispatch_errors: VecDeque::new(),
                dispatch_calls: 0,
            })),
        }
    }

    /// Report `fd` as the pollable descriptor
    pub fn with_fd(self, fd: RawFd) -> Self {
        self.state.borrow_mut().fd = fd;
        self
    }

    /// Open device nodes through the driver's opener on attach
    pub fn with_node_opening(self, enabled: bool) -> Self {
        self.state.borrow_mut().open_nodes = enabled;
        self
    }

    /// Device handle for `path`
    pub fn device(&self, path: impl AsRef<Path>) -> Option<VirtualDevice> {
        let path = path.as_ref();
        self.state
            .borrow()
            .devices
            .iter()
            .find(|device| device.path() == path)
            .cloned()
    }

    /// Queue an event from the device at `path`; visible after the next dispatch
    pub fn push_event(&self, path: impl AsRef<Path>, kind: RawEventKind) -> bool {
        match self.device(path) {
            Some(device) => {
                self.push_raw(RawEvent {
                    device: device.key(),
                    kind,
                });
                true
            }
            None => false,
        }
    }

    /// Queue a raw event
    pub fn push_raw(&self, event: RawEvent) {
        self.state.borrow_mut().pending.push_back(event);
    }

    /// Make the next dispatch fail with `kind`
    pub fn fail_next_dispatch(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().dispatch_errors.push_back(kind);
    }

    /// Whether the device at `path` is attached
    pub fn is_attached(&self, path: impl AsRef<Path>) -> bool {
        self.device(path)
            .is_some_and(|device| self.state.borrow().attached.contains_key(&device.key()))
    }

    /// Number of attached devices
    pub fn attached_count(&self) -> usize {
        self.state.borrow().attached.len()
    }

    /// Number of dispatch calls so far
    pub fn dispatch_calls(&self) -> usize {
        self.state.borrow().dispatch_calls
    }
}

impl EventSource for VirtualBackend {
    type Device = VirtualDevice;

    fn add_device(
        &mut self,
        path: &Path,
        opener: &mut dyn OpenRestricted,
    ) -> io::Result<VirtualDevice> {
        let device = self.device(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no virtual device at {}", path.display()),
            )
        })?;

        let open_nodes = self.state.borrow().open_nodes;
        let fd = if open_nodes {
            let fd = opener
                .open_restricted(path, OFlag::O_RDWR | OFlag::O_NONBLOCK)
                .map_err(io::Error::from)?;
            Some(fd)
        } else {
            None
        };

        let mut state = self.state.borrow_mut();
        state.attached.insert(device.key(), fd);
        state.queue.push_back(RawEvent {
            device: device.key(),
            kind: RawEventKind::DeviceAdded,
        });
        log_backend_message(
            LogPriority::Debug,
            &format!("{}: added virtual device", path.display()),
        );
        Ok(device)
    }

    fn remove_device(&mut self, device: &VirtualDevice, opener: &mut dyn OpenRestricted) {
        let fd = {
            let mut state = self.state.borrow_mut();
            let Some(fd) = state.attached.remove(&device.key()) else {
                return;
            };
            state.queue.push_back(RawEvent {
                device: device.key(),
                kind: RawEventKind::DeviceRemoved,
            });
            fd
        };
        log_backend_message(
            LogPriority::Debug,
            &format!("{}: removed virtual device", device.path().display()),
        );
        if let Some(fd) = fd {
            opener.close_restricted(fd);
        }
    }

    fn fd(&self) -> RawFd {
        self.state.borrow().fd
    }

    fn dispatch(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.dispatch_calls += 1;
        if let Some(kind) = state.dispatch_errors.pop_front() {
            return Err(io::Error::from(kind));
        }
        let pending = std::mem::take(&mut state.pending);
        state.queue.extend(pending);
        Ok(())
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        self.state.borrow_mut().queue.pop_front()
    }
}
