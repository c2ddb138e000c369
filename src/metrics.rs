use log::warn;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::config::MetricsConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub temperature: Option<f64>,
    pub fan_rpm: Option<f64>,
}

impl Metrics {
    pub fn collect(config: &MetricsConfig) -> Self {
        Self {
            temperature: read_temperature(&config.temperature_file),
            fan_rpm: config.fan_rpm_file.as_deref().and_then(read_fan_rpm),
        }
    }
}

/// CPU temperature in degrees Celsius from a thermal-zone file holding
/// millidegrees.
pub fn read_temperature<P: AsRef<Path>>(path: P) -> Option<f64> {
    let path = path.as_ref();
    let text = read_trimmed(path)?;
    match text.parse::<i64>() {
        Ok(millis) => Some(millis as f64 / 1000.0),
        Err(e) => {
            warn!("invalid temperature in {}: {e}", path.display());
            None
        }
    }
}

pub fn read_fan_rpm<P: AsRef<Path>>(path: P) -> Option<f64> {
    let path = path.as_ref();
    let text = read_trimmed(path)?;
    match text.parse::<f64>() {
        Ok(rpm) if rpm.is_finite() => Some(rpm),
        Ok(_) => None,
        Err(e) => {
            warn!("invalid fan rpm in {}: {e}", path.display());
            None
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            warn!("cannot read {}: {e}", path.display());
            None
        }
    }
}
