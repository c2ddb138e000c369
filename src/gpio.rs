use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::AppError;

/// Logical on/off value applied uniformly to a group of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinState {
    #[default]
    Active,
    Inactive,
}

impl PinState {
    pub fn toggled(self) -> Self {
        match self {
            PinState::Active => PinState::Inactive,
            PinState::Inactive => PinState::Active,
        }
    }
}

impl From<PinState> for bool {
    fn from(state: PinState) -> Self {
        state == PinState::Active
    }
}

impl From<bool> for PinState {
    fn from(on: bool) -> Self {
        if on {
            PinState::Active
        } else {
            PinState::Inactive
        }
    }
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PinState::Active => "ACTIVE",
            PinState::Inactive => "INACTIVE",
        })
    }
}

pub fn toggle_value(current: PinState) -> PinState {
    current.toggled()
}

/// Line offsets on a single GPIO character device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinSet {
    device: String,
    lines: BTreeSet<u32>,
}

impl PinSet {
    pub fn new(device: impl Into<String>, lines: impl IntoIterator<Item = u32>) -> Self {
        Self {
            device: device.into(),
            lines: lines.into_iter().collect(),
        }
    }

    pub fn single(device: impl Into<String>, line: u32) -> Self {
        Self::new(device, [line])
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Hardware seam. Each call opens its own line request and must release it
/// before returning, on success and on error.
pub trait GpioBackend: Send + Sync {
    fn write_pins(&self, pins: &PinSet, value: PinState) -> Result<(), AppError>;
    fn count_rising_edges(
        &self,
        device: &str,
        line: u32,
        window: Duration,
    ) -> Result<u64, AppError>;
}

/// Serializes every device access behind one lock, so at most one line
/// request is open at a time.
pub struct GpioController<B: GpioBackend> {
    backend: Arc<B>,
    lock: Mutex<()>,
}

impl<B: GpioBackend> GpioController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn set_pins(&self, pins: &PinSet, value: PinState) -> Result<(), AppError> {
        if pins.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock();
        self.backend.write_pins(pins, value)
    }

    pub fn activate_pins(&self, pins: &PinSet) -> Result<(), AppError> {
        self.set_pins(pins, PinState::Active)
    }

    /// Drives every line to the opposite of `current` and returns the new
    /// state. The caller owns the logical state.
    pub fn toggle_pins(&self, pins: &PinSet, current: PinState) -> Result<PinState, AppError> {
        let new = toggle_value(current);
        self.set_pins(pins, new)?;
        Ok(new)
    }

    pub fn toggle_pin(
        &self,
        device: &str,
        line: u32,
        current: PinState,
    ) -> Result<PinState, AppError> {
        self.toggle_pins(&PinSet::single(device, line), current)
    }

    pub fn count_rising_edges(
        &self,
        device: &str,
        line: u32,
        window: Duration,
    ) -> Result<u64, AppError> {
        let _guard = self.lock.lock();
        self.backend.count_rising_edges(device, line, window)
    }
}

/// One logical flag, stored atomically.
#[derive(Debug)]
pub struct AtomicPinState(AtomicBool);

impl AtomicPinState {
    pub const fn new(state: PinState) -> Self {
        Self(AtomicBool::new(matches!(state, PinState::Active)))
    }

    pub fn load(&self) -> PinState {
        self.0.load(Ordering::Relaxed).into()
    }

    pub fn store(&self, state: PinState) {
        self.0.store(state.into(), Ordering::Relaxed);
    }
}

impl Default for AtomicPinState {
    fn default() -> Self {
        Self::new(PinState::default())
    }
}

/// Logical state of the two switchable groups. Both start `Active`.
#[derive(Debug, Default)]
pub struct ControlState {
    pub leds: AtomicPinState,
    pub fan: AtomicPinState,
}
