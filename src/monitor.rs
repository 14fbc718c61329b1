//! Periodic connectivity polling.
//!
//! While running, the monitor probes the camera every `interval` and stores
//! the result in [`AppState`].  A [`ConnectionEvent::Connected`] is emitted
//! only when connectivity flips from absent to present.
//!
//! Each probe runs as its own task: pausing stops the timer, but a probe that
//! is already in flight still completes and applies its result.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::DeviceClient;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The camera at `ip` became reachable.
    Connected { ip: String },
}

pub struct ConnectionMonitor {
    client:   Arc<DeviceClient>,
    state:    Arc<AppState>,
    interval: Duration,
    events:   mpsc::UnboundedSender<ConnectionEvent>,
    timer:    Option<JoinHandle<()>>,
}

impl ConnectionMonitor {
    pub fn new(
        client:   Arc<DeviceClient>,
        state:    Arc<AppState>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let monitor = Self { client, state, interval, events, timer: None };
        (monitor, rx)
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start (or restart) polling.  The first probe fires immediately.
    pub fn resume(&mut self) {
        self.pause();

        let client   = Arc::clone(&self.client);
        let state    = Arc::clone(&self.state);
        let events   = self.events.clone();
        let interval = self.interval;

        debug!("connection polling every {interval:?}");
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tokio::spawn(poll_once(
                    Arc::clone(&client),
                    Arc::clone(&state),
                    events.clone(),
                ));
            }
        }));
    }

    /// Stop the polling timer.
    pub fn pause(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("connection polling paused");
        }
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.pause();
    }
}

async fn poll_once(
    client: Arc<DeviceClient>,
    state:  Arc<AppState>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) -> bool {
    let connected = client.check_connectivity().await;
    let was_connected = state.set_connected(connected);

    match (was_connected, connected) {
        (false, true) => {
            let ip = client.ip();
            info!("dashcam at {ip} connected");
            // receiver gone just means nobody is listening any more
            let _ = events.send(ConnectionEvent::Connected { ip });
        }
        (true, false) => info!("dashcam at {} unreachable", client.ip()),
        _ => {}
    }
    connected
}
