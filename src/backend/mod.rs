#[cfg(feature = "hardware-gpio")]
pub mod libgpiod;
pub mod mock;

#[cfg(feature = "hardware-gpio")]
pub use libgpiod::LibgpiodBackend;
pub use mock::{DeviceOp, MockGpioBackend};

#[cfg(not(any(feature = "hardware-gpio", feature = "mock-gpio")))]
compile_error!("enable the `hardware-gpio` feature, or `mock-gpio` for a simulated build");

/// Backend the binaries drive: character devices unless `mock-gpio` is on.
#[cfg(not(feature = "mock-gpio"))]
pub type SelectedBackend = LibgpiodBackend;
#[cfg(feature = "mock-gpio")]
pub type SelectedBackend = MockGpioBackend;

#[cfg(not(feature = "mock-gpio"))]
pub fn selected_backend(consumer: &str) -> SelectedBackend {
    LibgpiodBackend::new(consumer)
}

#[cfg(feature = "mock-gpio")]
pub fn selected_backend(consumer: &str) -> SelectedBackend {
    log::warn!("built with mock-gpio, {consumer} pin access is simulated");
    MockGpioBackend::default()
}
