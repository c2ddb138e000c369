use std::time::Duration;

use crate::config::TachConfig;
use crate::error::AppError;
use crate::gpio::{GpioBackend, GpioController};

pub fn rpm_from_edges(edges: u64, window: Duration, pulses_per_revolution: u32) -> f64 {
    let secs = window.as_secs_f64();
    if secs == 0.0 || pulses_per_revolution == 0 {
        return 0.0;
    }
    edges as f64 / secs * 60.0 / f64::from(pulses_per_revolution)
}

/// Counts tach pulses for one window and converts them to revolutions per
/// minute. Returns the raw edge count alongside.
pub fn measure_fan_rpm<B: GpioBackend>(
    controller: &GpioController<B>,
    device: &str,
    tach: &TachConfig,
) -> Result<(u64, f64), AppError> {
    let window = Duration::from_millis(tach.window_ms);
    let edges = controller.count_rising_edges(device, tach.pin, window)?;
    Ok((edges, rpm_from_edges(edges, window, tach.pulses_per_revolution)))
}
