use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::gpio::PinSet;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GpioConfig {
    pub device: String,
    #[serde(default = "default_consumer")]
    pub consumer: String,
    pub power_led_control_pin: u32,
    pub io_led_control_pin: u32,
    pub fan_control_pin: u32,
}

impl GpioConfig {
    /// Both LED lines, driven together by the LED toggle.
    pub fn led_pins(&self) -> PinSet {
        PinSet::new(
            &self.device,
            [self.power_led_control_pin, self.io_led_control_pin],
        )
    }

    /// Every output line the panel drives, switched on at startup.
    pub fn output_pins(&self) -> PinSet {
        PinSet::new(
            &self.device,
            [
                self.power_led_control_pin,
                self.io_led_control_pin,
                self.fan_control_pin,
            ],
        )
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub file: String,
    pub services: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            file: "/run/pisite/containers.json".to_string(),
            services: vec!["yapper".to_string(), "yoinker".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub temperature_file: String,
    pub fan_rpm_file: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            temperature_file: "/sys/class/thermal/thermal_zone0/temp".to_string(),
            fan_rpm_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TachConfig {
    pub pin: u32,
    pub window_ms: u64,
    pub interval_ms: u64,
    pub pulses_per_revolution: u32,
    pub output: String,
}

impl Default for TachConfig {
    fn default() -> Self {
        Self {
            pin: 22,
            window_ms: 100,
            interval_ms: 900,
            pulses_per_revolution: 1,
            output: "/run/pisite/fan_rpm".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub gpio: GpioConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub tach: TachConfig,
}

fn default_consumer() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        let config: AppConfig = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.http.host.is_none() && self.http.unix_socket.is_none() {
            return Err(AppError::Config(
                "either 'host' or 'unix_socket' must be specified".into(),
            ));
        }
        if self.gpio.device.is_empty() {
            return Err(AppError::Config("gpio device path is empty".into()));
        }

        let mut seen = HashSet::new();
        for name in &self.monitor.services {
            if !is_valid_service_name(name) {
                return Err(AppError::Config(format!("Invalid service name: {name:?}")));
            }
            if !seen.insert(name.as_str()) {
                return Err(AppError::Config(format!("Duplicate service name: {name}")));
            }
        }

        if self.tach.window_ms == 0 || self.tach.interval_ms == 0 {
            return Err(AppError::Config(
                "tach window and interval must be non-zero".into(),
            ));
        }
        if self.tach.pulses_per_revolution == 0 {
            return Err(AppError::Config(
                "tach pulses per revolution must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
