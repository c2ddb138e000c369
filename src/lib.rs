pub mod auth;
pub mod backend;
pub mod config;
mod error;
pub mod gpio;
pub mod metrics;
pub mod monitor;
mod routes;
pub mod tach;

pub use config::{AppConfig, GpioConfig, HttpConfig, MetricsConfig, MonitorConfig, TachConfig};
pub use error::AppError;
pub use gpio::{
    AtomicPinState, ControlState, GpioBackend, GpioController, PinSet, PinState, toggle_value,
};
pub use routes::AppState;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::{DeviceOp, MockGpioBackend};
