//! Capture session: event channel in, log records out
//!
//! A source thread pushes [`KeyEvent`]s into a bounded channel and the
//! session drains it on the calling thread, so the recorder itself never
//! runs inside an OS callback.

use crate::error::Result;
use crate::keyboard::{KeyEvent, KeySource};
use crate::recorder::Recorder;
use log::{info, warn};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How often the session re-checks the stop flag while idle
const WAKE_INTERVAL: Duration = Duration::from_millis(100);

/// Shared stop request, set from a signal handler or another thread
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs a key source on its own thread until `stop` is set or the source
/// fails. The source is built on that thread, so it need not be `Send`.
pub fn spawn_source<S, F>(build: F, stop: StopFlag, interval: Duration) -> JoinHandle<io::Result<()>>
where
    S: KeySource,
    F: FnOnce() -> io::Result<S> + Send + 'static,
{
    thread::spawn(move || {
        let mut source = build()?;
        while !stop.is_stopped() {
            match source.poll() {
                Ok(0) => thread::sleep(interval),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => break,
                Err(e) => {
                    warn!("key source stopped: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
}

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub events: u64,
    pub files: Vec<PathBuf>,
}

/// Feeds events from a channel into a [`Recorder`]
pub struct CaptureSession {
    recorder: Recorder,
    events: Receiver<KeyEvent>,
    stop: StopFlag,
}

impl CaptureSession {
    pub fn new(recorder: Recorder, events: Receiver<KeyEvent>, stop: StopFlag) -> Self {
        Self {
            recorder,
            events,
            stop,
        }
    }

    /// Records events until a stop is requested or every sender is gone.
    ///
    /// Events already queued when the stop arrives are still recorded, and
    /// every file is flushed and closed before returning. A failed append
    /// ends the session with that error.
    pub fn run(mut self) -> Result<CaptureSummary> {
        info!("capture started");
        while !self.stop.is_stopped() {
            match self.events.recv_timeout(WAKE_INTERVAL) {
                Ok(event) => self.recorder.append(&event)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        while let Ok(event) = self.events.try_recv() {
            self.recorder.append(&event)?;
        }

        let summary = CaptureSummary {
            events: self.recorder.records(),
            files: self.recorder.files(),
        };
        self.recorder.close()?;
        info!(
            "capture stopped: {} events in {} file(s)",
            summary.events,
            summary.files.len()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CaptureMode, FormatVersions};
    use crate::keyboard::DeviceId;
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct Scripted {
        events: Vec<KeyEvent>,
        tx: mpsc::SyncSender<KeyEvent>,
    }

    impl KeySource for Scripted {
        fn poll(&mut self) -> io::Result<usize> {
            if self.events.is_empty() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script done"));
            }
            let event = self.events.remove(0);
            self.tx
                .send(event)
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
            Ok(1)
        }
    }

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_stopped());
        clone.stop();
        assert!(flag.is_stopped());
    }

    #[test]
    fn session_ends_when_senders_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.log");
        let recorder = Recorder::single(&path, CaptureMode::Scancode, FormatVersions::CURRENT).unwrap();
        let (tx, rx) = mpsc::sync_channel(4);
        for code in [30, 31, 30] {
            tx.send(KeyEvent::scancode(1, code)).unwrap();
        }
        drop(tx);

        let summary = CaptureSession::new(recorder, rx, StopFlag::new()).run().unwrap();
        assert_eq!(summary.events, 3);
        assert_eq!(summary.files, vec![path]);
    }

    #[test]
    fn queued_events_survive_stop() {
        let dir = TempDir::new().unwrap();
        let recorder = Recorder::per_device(dir.path(), FormatVersions::CURRENT).unwrap();
        let (tx, rx) = mpsc::sync_channel(8);
        let device = DeviceId::new(3, 4);
        tx.send(KeyEvent::transition(1, 30, true, device)).unwrap();
        tx.send(KeyEvent::transition(2, 30, false, device)).unwrap();

        let stop = StopFlag::new();
        stop.stop();
        let summary = CaptureSession::new(recorder, rx, stop).run().unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.files, vec![device.log_path(dir.path())]);
        drop(tx);
    }

    #[test]
    fn malformed_event_ends_session() {
        let dir = TempDir::new().unwrap();
        let recorder =
            Recorder::single(dir.path().join("k.log"), CaptureMode::Character, FormatVersions::CURRENT)
                .unwrap();
        let (tx, rx) = mpsc::sync_channel(2);
        tx.send(KeyEvent::character(1, 0x10_0000)).unwrap();
        drop(tx);
        assert!(CaptureSession::new(recorder, rx, StopFlag::new()).run().is_err());
    }

    #[test]
    fn source_thread_feeds_session() {
        let dir = TempDir::new().unwrap();
        let recorder =
            Recorder::single(dir.path().join("k.log"), CaptureMode::Character, FormatVersions::CURRENT)
                .unwrap();
        let (tx, rx) = mpsc::sync_channel(1);
        let script: Vec<KeyEvent> = "hello"
            .chars()
            .enumerate()
            .map(|(i, c)| KeyEvent::character(i as i64, u32::from(c)))
            .collect();

        let stop = StopFlag::new();
        let handle = spawn_source(
            move || Ok(Scripted { events: script, tx }),
            stop.clone(),
            Duration::from_millis(1),
        );
        let summary = CaptureSession::new(recorder, rx, stop).run().unwrap();
        assert_eq!(summary.events, 5);
        assert_eq!(
            handle.join().unwrap().unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }
}
