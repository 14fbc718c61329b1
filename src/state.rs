//! Process-wide connection state.
//!
//! Never persisted: every run starts disconnected, not recording, front side.

use std::sync::Mutex;

use crate::media::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub connected:   bool,
    pub recording:   bool,
    pub active_side: Side,
}

/// Shared handle over [`ConnectionState`].  All mutation goes through the
/// setters; a poisoned lock is recovered since every field is a plain flag.
#[derive(Debug, Default)]
pub struct AppState {
    inner: Mutex<ConnectionState>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut ConnectionState) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.with(|s| *s)
    }

    /// Store the latest connectivity result and return the previous one.
    pub fn set_connected(&self, connected: bool) -> bool {
        self.with(|s| std::mem::replace(&mut s.connected, connected))
    }

    pub fn set_recording(&self, recording: bool) {
        self.with(|s| s.recording = recording);
    }

    /// Flip between the front and rear camera and return the new side.
    pub fn switch_side(&self) -> Side {
        self.with(|s| {
            s.active_side = s.active_side.toggled();
            s.active_side
        })
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot().connected
    }

    pub fn is_recording(&self) -> bool {
        self.snapshot().recording
    }
}
