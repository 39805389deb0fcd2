//! Test doubles for code that talks to a device.

mod mock_device;

pub use mock_device::{MockDevice, MockDeviceBuilder};
