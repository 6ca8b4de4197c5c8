//! Raw evdev keyboard listener for Linux
//!
//! Reads key transitions straight from `/dev/input/event*`, which gives kernel
//! timestamps, true scancodes and the vendor/product identity of each device.

use super::event::{send, KeyEvent, KeySource};
use super::keymap::{produced_char, KeyCode};
use super::DeviceId;
use crate::format::CaptureMode;
use evdev::{Device, EventType, InputEvent, Key};
use log::{debug, info, warn};
use nix::libc;
use std::collections::HashSet;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::mpsc::SyncSender;
use std::time::UNIX_EPOCH;
use thiserror::Error;

/// Error type for evdev operations
#[derive(Debug, Error)]
pub enum EvdevError {
    #[error("No keyboard devices found")]
    NoDevices,
    #[error("Permission denied accessing input devices. Try running with sudo or add user to 'input' group.")]
    PermissionDenied,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Largest scancode a per-device record can hold
const MAX_DEVICE_SCANCODE: u16 = u8::MAX as u16;

struct KeyboardDevice {
    path: PathBuf,
    device: Device,
    id: DeviceId,
    pressed: HashSet<u16>,
}

impl KeyboardDevice {
    fn shift_held(&self) -> bool {
        self.pressed
            .iter()
            .any(|code| KeyCode(*code).is_shift())
    }
}

fn is_keyboard(device: &Device) -> bool {
    device.supported_keys().map_or(false, |keys| {
        keys.contains(Key::KEY_A) && keys.contains(Key::KEY_Z) && keys.contains(Key::KEY_ENTER)
    })
}

fn set_nonblocking(device: &Device) -> io::Result<()> {
    let fd = device.as_raw_fd();
    // SAFETY: fd is owned by `device` and stays open for the duration of the call.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Opens every readable keyboard device.
fn find_keyboard_devices() -> Result<Vec<KeyboardDevice>, EvdevError> {
    let input_dir = PathBuf::from("/dev/input");
    if !input_dir.exists() {
        return Err(EvdevError::NoDevices);
    }

    let mut keyboards = Vec::new();
    for (path, device) in evdev::enumerate() {
        if !is_keyboard(&device) {
            continue;
        }
        set_nonblocking(&device)?;
        let input_id = device.input_id();
        let id = DeviceId::new(u32::from(input_id.vendor()), u32::from(input_id.product()));
        debug!(
            "using {} ({}) as device {}",
            path.display(),
            device.name().unwrap_or("unnamed"),
            id
        );
        keyboards.push(KeyboardDevice {
            path,
            device,
            id,
            pressed: HashSet::new(),
        });
    }

    if keyboards.is_empty() {
        // enumerate() skips nodes it cannot open, so an empty result with
        // event nodes present means they were not readable.
        let has_nodes = std::fs::read_dir(&input_dir)?
            .flatten()
            .any(|e| e.file_name().to_string_lossy().starts_with("event"));
        return Err(if has_nodes {
            EvdevError::PermissionDenied
        } else {
            EvdevError::NoDevices
        });
    }

    Ok(keyboards)
}

/// Evdev-based key source
pub struct EvdevListener {
    devices: Vec<KeyboardDevice>,
    mode: CaptureMode,
    per_device: bool,
    event_tx: SyncSender<KeyEvent>,
    oversized: HashSet<u16>,
}

impl EvdevListener {
    /// Opens all keyboards. With `per_device` every transition carries its
    /// device identity and release state, and codes are raw scancodes.
    pub fn new(
        event_tx: SyncSender<KeyEvent>,
        mode: CaptureMode,
        per_device: bool,
    ) -> Result<Self, EvdevError> {
        let devices = find_keyboard_devices()?;
        let ids: Vec<String> = devices.iter().map(|d| d.id.to_string()).collect();
        info!(
            "evdev: {} keyboard device(s) opened [{}]",
            devices.len(),
            ids.join(", ")
        );
        Ok(Self {
            devices,
            mode,
            per_device,
            event_tx,
            oversized: HashSet::new(),
        })
    }

    fn normalize(&mut self, index: usize, raw: &InputEvent) -> Option<KeyEvent> {
        if raw.event_type() != EventType::KEY || raw.value() == 2 {
            return None;
        }
        let device = &mut self.devices[index];
        let code = raw.code();
        let pressed = raw.value() != 0;

        // Drop presses of held keys and releases we never saw pressed.
        let changed = if pressed {
            device.pressed.insert(code)
        } else {
            device.pressed.remove(&code)
        };
        if !changed {
            return None;
        }

        let timestamp = raw
            .timestamp()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_micros()).ok())
            .unwrap_or_else(super::now_micros);

        if self.per_device {
            if code > MAX_DEVICE_SCANCODE {
                if self.oversized.insert(code) {
                    warn!(
                        "{}: scancode {} does not fit a per-device record, not recording it",
                        device.path.display(),
                        code
                    );
                }
                return None;
            }
            return Some(KeyEvent::transition(
                timestamp,
                u32::from(code),
                pressed,
                device.id,
            ));
        }

        if !pressed {
            return None;
        }
        match self.mode {
            CaptureMode::Scancode => Some(KeyEvent::scancode(timestamp, u32::from(code))),
            CaptureMode::Character => {
                produced_char(KeyCode(code), device.shift_held())
                    .map(|c| KeyEvent::character(timestamp, u32::from(c)))
            }
        }
    }
}

impl KeySource for EvdevListener {
    fn poll(&mut self) -> io::Result<usize> {
        let mut sent = 0;
        let mut lost = Vec::new();

        for index in 0..self.devices.len() {
            loop {
                let fetched: io::Result<Vec<InputEvent>> = self.devices[index]
                    .device
                    .fetch_events()
                    .map(|events| events.collect());
                let batch = match fetched {
                    Ok(events) => events,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("{}: {}", self.devices[index].path.display(), e);
                        lost.push(index);
                        break;
                    }
                };
                if batch.is_empty() {
                    break;
                }
                for raw in &batch {
                    if let Some(event) = self.normalize(index, raw) {
                        send(&self.event_tx, event)?;
                        sent += 1;
                    }
                }
            }
        }

        for index in lost.into_iter().rev() {
            let device = self.devices.remove(index);
            info!("{}: device removed", device.path.display());
        }
        if self.devices.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no keyboard devices left",
            ));
        }
        Ok(sent)
    }
}
