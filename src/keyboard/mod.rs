//! Keyboard event sources and key identity

mod device;
mod event;
pub mod keymap;

#[cfg(target_os = "linux")]
mod evdev_listener;

pub use device::DeviceId;
pub use event::{now_micros, KeyEvent, KeySource, KeyboardListener};
pub use keymap::{get_key_info, KeyCode, KeyInfo, KEYMAP};

#[cfg(target_os = "linux")]
pub use evdev_listener::{EvdevError, EvdevListener};
