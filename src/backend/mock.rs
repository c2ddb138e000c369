use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::gpio::{GpioBackend, PinSet, PinState};

/// Device access recorded by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    Open { device: String },
    Write { device: String, line: u32, value: PinState },
    Close { device: String },
}

/// In-memory GPIO device. Records every request it serves so callers can
/// check ordering, and can be told to fail specific devices or lines.
#[derive(Default)]
pub struct MockGpioBackend {
    lines: Mutex<FxHashMap<(String, u32), PinState>>, // keyed by (device, offset)
    rising_edges: Mutex<FxHashMap<(String, u32), u64>>,
    journal: Mutex<Vec<DeviceOp>>,
    failing_devices: Mutex<HashSet<String>>,
    failing_lines: Mutex<HashSet<(String, u32)>>,
    open_handles: AtomicUsize,
    max_open_handles: AtomicUsize,
    write_delay: Duration,
}

struct MockRequest<'a> {
    backend: &'a MockGpioBackend,
    device: &'a str,
}

impl<'a> MockRequest<'a> {
    fn open(backend: &'a MockGpioBackend, device: &'a str) -> Result<Self, AppError> {
        if backend.failing_devices.lock().contains(device) {
            return Err(AppError::Gpio(format!("open chip {device}: no such device")));
        }
        let open = backend.open_handles.fetch_add(1, Ordering::SeqCst) + 1;
        backend.max_open_handles.fetch_max(open, Ordering::SeqCst);
        backend.journal.lock().push(DeviceOp::Open {
            device: device.to_string(),
        });
        Ok(Self { backend, device })
    }
}

impl Drop for MockRequest<'_> {
    fn drop(&mut self) {
        self.backend.journal.lock().push(DeviceOp::Close {
            device: self.device.to_string(),
        });
        self.backend.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockGpioBackend {
    /// Sleep this long per line written, widening race windows in tests.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn value(&self, device: &str, line: u32) -> Option<PinState> {
        self.lines.lock().get(&(device.to_string(), line)).copied()
    }

    pub fn journal(&self) -> Vec<DeviceOp> {
        self.journal.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|op| matches!(op, DeviceOp::Write { .. }))
            .count()
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn max_open_handles(&self) -> usize {
        self.max_open_handles.load(Ordering::SeqCst)
    }

    pub fn fail_device(&self, device: &str) {
        self.failing_devices.lock().insert(device.to_string());
    }

    pub fn fail_line(&self, device: &str, line: u32) {
        self.failing_lines.lock().insert((device.to_string(), line));
    }

    pub fn set_rising_edges(&self, device: &str, line: u32, count: u64) {
        self.rising_edges
            .lock()
            .insert((device.to_string(), line), count);
    }
}

impl GpioBackend for MockGpioBackend {
    fn write_pins(&self, pins: &PinSet, value: PinState) -> Result<(), AppError> {
        let device = pins.device();
        let _request = MockRequest::open(self, device)?;

        for line in pins.lines() {
            if self
                .failing_lines
                .lock()
                .contains(&(device.to_string(), line))
            {
                return Err(AppError::Gpio(format!("set value {line}: I/O error")));
            }
            if !self.write_delay.is_zero() {
                thread::sleep(self.write_delay);
            }
            self.lines.lock().insert((device.to_string(), line), value);
            self.journal.lock().push(DeviceOp::Write {
                device: device.to_string(),
                line,
                value,
            });
        }
        Ok(())
    }

    fn count_rising_edges(
        &self,
        device: &str,
        line: u32,
        window: Duration,
    ) -> Result<u64, AppError> {
        let _request = MockRequest::open(self, device)?;
        thread::sleep(window);
        Ok(self
            .rising_edges
            .lock()
            .get(&(device.to_string(), line))
            .copied()
            .unwrap_or(0))
    }
}
