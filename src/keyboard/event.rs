//! Normalized key events and the portable polling listener

use super::keymap::{produced_char, KeyCode};
use super::DeviceId;
use crate::format::CaptureMode;
use device_query::{DeviceQuery, DeviceState};
use std::io;
use std::sync::mpsc::SyncSender;

/// A key transition ready to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Microseconds since the Unix epoch
    pub timestamp: i64,
    /// Produced character or scancode, depending on the capture mode
    pub code: u32,
    /// Press/release state; `None` means an implicit press
    pub pressed: Option<bool>,
    /// Originating device, set when logs are split per device
    pub device_id: Option<DeviceId>,
}

impl KeyEvent {
    pub fn character(timestamp: i64, code: u32) -> Self {
        Self {
            timestamp,
            code,
            pressed: None,
            device_id: None,
        }
    }

    /// Same shape as [`KeyEvent::character`]; the log's capture mode, not
    /// the event, says how `code` is read.
    pub fn scancode(timestamp: i64, code: u32) -> Self {
        Self::character(timestamp, code)
    }

    pub fn transition(timestamp: i64, scancode: u32, pressed: bool, device: DeviceId) -> Self {
        Self {
            timestamp,
            code: scancode,
            pressed: Some(pressed),
            device_id: Some(device),
        }
    }

    pub fn is_press(&self) -> bool {
        self.pressed.unwrap_or(true)
    }
}

/// Current wall clock time in microseconds since the Unix epoch
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Something that turns OS input into [`KeyEvent`]s on a channel
pub trait KeySource {
    /// Forwards any pending input. Returns the number of events sent.
    ///
    /// Fails with `BrokenPipe` once the receiving side has gone away.
    fn poll(&mut self) -> io::Result<usize>;
}

impl<S: KeySource + ?Sized> KeySource for Box<S> {
    fn poll(&mut self) -> io::Result<usize> {
        (**self).poll()
    }
}

pub(crate) fn send(tx: &SyncSender<KeyEvent>, event: KeyEvent) -> io::Result<()> {
    tx.send(event)
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "capture session closed"))
}

/// Keyboard listener that polls global key state through device_query
///
/// It cannot tell devices apart, so it only feeds simple-layout logs.
/// Only presses are forwarded.
pub struct KeyboardListener {
    device_state: DeviceState,
    last_keys: Vec<device_query::Keycode>,
    mode: CaptureMode,
    event_tx: SyncSender<KeyEvent>,
}

impl KeyboardListener {
    pub fn new(event_tx: SyncSender<KeyEvent>, mode: CaptureMode) -> Self {
        Self {
            device_state: DeviceState::new(),
            last_keys: Vec::new(),
            mode,
            event_tx,
        }
    }
}

impl KeySource for KeyboardListener {
    fn poll(&mut self) -> io::Result<usize> {
        let now = now_micros();
        let current_keys = self.device_state.get_keys();
        let shift = current_keys
            .iter()
            .filter_map(|k| KeyCode::from_device_query(*k))
            .any(|k| k.is_shift());

        let mut sent = 0;
        for key in current_keys.iter().filter(|k| !self.last_keys.contains(k)) {
            let Some(code) = KeyCode::from_device_query(*key) else {
                continue;
            };
            let event = match self.mode {
                CaptureMode::Scancode => KeyEvent::scancode(now, u32::from(code.as_u16())),
                CaptureMode::Character => match produced_char(code, shift) {
                    Some(c) => KeyEvent::character(now, u32::from(c)),
                    None => continue,
                },
            };
            send(&self.event_tx, event)?;
            sent += 1;
        }

        self.last_keys = current_keys;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn character_events_are_implicit_presses() {
        let event = KeyEvent::character(10, u32::from('a'));
        assert_eq!(event.pressed, None);
        assert!(event.is_press());
        assert_eq!(event.device_id, None);
    }

    #[test]
    fn transitions_carry_device_and_state() {
        let device = DeviceId::new(1, 2);
        let event = KeyEvent::transition(10, 30, false, device);
        assert_eq!(event.device_id, Some(device));
        assert!(!event.is_press());
    }

    #[test]
    fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        let err = send(&tx, KeyEvent::scancode(0, 1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_micros() > 1_577_836_800_000_000);
    }
}
