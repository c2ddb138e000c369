use log::debug;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use libgpiod::{chip::Chip, line, line::EventClock, request};

use crate::error::AppError;
use crate::gpio::{GpioBackend, PinSet, PinState};

const LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY: usize = 64;
// kernel-side queue; the default of 16 events per line saturates within one tach window
const LIBGPIOD_BACKEND_KERNEL_EVENT_BUFFER_SIZE: usize = 1024;

/// Character-device backend. Holds no line requests between calls; every
/// operation opens the chip, requests its lines, and drops the request
/// before returning.
pub struct LibgpiodBackend {
    consumer: String,
}

/// Owned line request, released when dropped.
struct GpiodHandle {
    request: request::Request,
}

impl GpiodHandle {
    fn open(
        chip: &str,
        req_cfg: &request::Config,
        line_cfg: &line::Config,
    ) -> Result<Self, AppError> {
        let chip = Self::open_chip(chip)?;
        let request = chip
            .request_lines(Some(req_cfg), line_cfg)
            .map_err(|e| AppError::Gpio(format!("request lines: {e}")))?;
        Ok(Self { request })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::Gpio(format!("open chip {path}: {e}")))
    }
}

fn request_config(
    consumer: &str,
    event_buffer_size: Option<usize>,
) -> Result<request::Config, AppError> {
    let mut req_cfg =
        request::Config::new().map_err(|e| AppError::Gpio(format!("request config: {e}")))?;
    req_cfg
        .set_consumer(consumer)
        .map_err(|e| AppError::Gpio(format!("request consumer: {e}")))?;
    if let Some(size) = event_buffer_size {
        req_cfg.set_event_buffer_size(size);
    }
    Ok(req_cfg)
}

fn to_line_value(value: PinState) -> line::Value {
    match value {
        PinState::Active => line::Value::Active,
        PinState::Inactive => line::Value::InActive,
    }
}

impl LibgpiodBackend {
    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
        }
    }

    fn output_settings(value: PinState) -> Result<line::Settings, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
        ls.set_output_value(to_line_value(value))
            .map_err(|e| AppError::Gpio(format!("set output value: {e}")))?;
        Ok(ls)
    }

    fn rising_edge_settings() -> Result<line::Settings, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Input)
            .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
        ls.set_edge_detection(Some(line::Edge::Rising))
            .map_err(|e| AppError::Gpio(format!("set edge detection: {e}")))?;
        ls.set_event_clock(EventClock::Monotonic)
            .map_err(|e| AppError::Gpio(format!("set event clock: {e}")))?;
        Ok(ls)
    }

    fn make_line_config(offsets: &[u32], settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg =
            line::Config::new().map_err(|e| AppError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(offsets, settings)
            .map_err(|e| AppError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

impl GpioBackend for LibgpiodBackend {
    fn write_pins(&self, pins: &PinSet, value: PinState) -> Result<(), AppError> {
        let offsets: Vec<u32> = pins.lines().collect();
        let line_cfg = Self::make_line_config(&offsets, Self::output_settings(value)?)?;

        let req_cfg = request_config(&self.consumer, None)?;
        let mut handle = GpiodHandle::open(pins.device(), &req_cfg, &line_cfg)?;
        for offset in &offsets {
            handle
                .request
                .set_value(*offset, to_line_value(value))
                .map_err(|e| AppError::Gpio(format!("set value {offset}: {e}")))?;
        }
        debug!("{} set {offsets:?} to {value}", pins.device());
        Ok(())
    }

    fn count_rising_edges(
        &self,
        device: &str,
        line: u32,
        window: Duration,
    ) -> Result<u64, AppError> {
        let line_cfg = Self::make_line_config(&[line], Self::rising_edge_settings()?)?;
        let req_cfg = request_config(
            &self.consumer,
            Some(LIBGPIOD_BACKEND_KERNEL_EVENT_BUFFER_SIZE),
        )?;
        let handle = GpiodHandle::open(device, &req_cfg, &line_cfg)?;
        let mut buffer = request::Buffer::new(LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY)
            .map_err(|e| AppError::Gpio(format!("event buffer: {e}")))?;

        thread::sleep(window);

        let mut count = 0u64;
        while handle
            .request
            .wait_edge_events(Some(Duration::ZERO))
            .map_err(|e| AppError::Gpio(format!("wait edge events on {line}: {e}")))?
        {
            let events = handle
                .request
                .read_edge_events(&mut buffer)
                .map_err(|e| AppError::Gpio(format!("read edge events on {line}: {e}")))?;
            count += events.filter(|evt| evt.is_ok()).count() as u64;
        }
        Ok(count)
    }
}
