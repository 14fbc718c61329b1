//! Application session: the camera registry, the device client it targets and
//! the live connection state, with the user-level flows built on top.
//!
//! The registry is the only source of the client's target IP; selecting a
//! camera is what retargets the client.

use std::sync::Arc;

use log::{info, warn};

use crate::client::DeviceClient;
use crate::error::{DashcamError, Result};
use crate::media::{Category, Directory, FileCounts, FileRecord, Side};
use crate::registry::{CameraEndpoint, CameraRegistry, NewCamera};
use crate::state::AppState;
use crate::store::KvStore;

pub struct Session<S: KvStore> {
    registry: CameraRegistry<S>,
    client:   Arc<DeviceClient>,
    state:    Arc<AppState>,
}

impl<S: KvStore> Session<S> {
    pub fn new(registry: CameraRegistry<S>, client: DeviceClient) -> Self {
        if let Some(camera) = registry.selected() {
            client.set_ip(&camera.ip);
        }
        Self {
            registry,
            client: Arc::new(client),
            state:  Arc::new(AppState::new()),
        }
    }

    pub fn client(&self) -> &Arc<DeviceClient> {
        &self.client
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn registry(&self) -> &CameraRegistry<S> {
        &self.registry
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    pub fn add_camera(&mut self, camera: NewCamera) -> Result<CameraEndpoint> {
        self.registry.add(camera)
    }

    pub fn remove_camera(&mut self, id: u64) -> Result<()> {
        if self.registry.remove(id)? {
            self.state.set_connected(false);
        }
        Ok(())
    }

    pub fn select_camera(&mut self, id: u64) -> Result<CameraEndpoint> {
        let camera = self.registry.select(id)?;
        self.client.set_ip(&camera.ip);
        // a different camera has to prove itself reachable again
        self.state.set_connected(false);
        Ok(camera)
    }

    /// The selected camera, checked before any device request.
    pub fn require_camera(&self) -> Result<&CameraEndpoint> {
        self.registry.selected().ok_or(DashcamError::NoCameraSelected)
    }

    // ── Connection ────────────────────────────────────────────────────────────

    /// Instructions for joining the camera's WiFi network.
    pub fn wifi_instructions(&self) -> String {
        match self.registry.selected().and_then(|c| c.ssid.as_deref()) {
            Some(ssid) => format!("Please connect to the dashcam WiFi network \"{ssid}\"."),
            None => "Please connect to your dashcam WiFi network \
                     (usually starts with \"DASHCAM\" or similar)."
                .to_string(),
        }
    }

    /// Probe the selected camera once and record the result.
    pub async fn connect(&self) -> Result<bool> {
        let camera = self.require_camera()?;
        let connected = self.client.check_connectivity().await;
        self.state.set_connected(connected);
        if connected {
            info!("connected to {} ({})", camera.name, camera.ip);
        } else {
            warn!("{} ({}) not reachable", camera.name, camera.ip);
        }
        Ok(connected)
    }

    /// Commands need a reachable camera; probe once if we don't know yet.
    async fn ensure_connected(&self) -> Result<()> {
        if self.state.is_connected() || self.connect().await? {
            Ok(())
        } else {
            Err(DashcamError::NotConnected(self.wifi_instructions()))
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub async fn take_photo(&self) -> Result<bool> {
        self.ensure_connected().await?;
        self.client.trigger_snapshot().await
    }

    pub async fn start_recording(&self) -> Result<bool> {
        self.ensure_connected().await?;
        let ok = self.client.start_recording().await?;
        if ok {
            self.state.set_recording(true);
        }
        Ok(ok)
    }

    pub async fn stop_recording(&self) -> Result<bool> {
        self.ensure_connected().await?;
        let ok = self.client.stop_recording().await?;
        if ok {
            self.state.set_recording(false);
        }
        Ok(ok)
    }

    /// Start or stop depending on the current state; returns whether the
    /// camera is recording afterwards.
    pub async fn toggle_recording(&self) -> Result<bool> {
        if self.state.is_recording() {
            self.stop_recording().await?;
        } else {
            self.start_recording().await?;
        }
        Ok(self.state.is_recording())
    }

    // ── Files and streams ─────────────────────────────────────────────────────

    pub async fn file_counts(&self) -> Result<FileCounts> {
        self.require_camera()?;
        Ok(self.client.get_all_file_counts().await)
    }

    pub async fn gallery(&self, category: Category, side: Side) -> Result<Vec<FileRecord>> {
        self.require_camera()?;
        Ok(self.client.gallery_files(category, side).await)
    }

    pub async fn list(&self, dir: Directory, start: u32, end: u32) -> Result<Vec<FileRecord>> {
        self.require_camera()?;
        Ok(self.client.get_file_list(dir, start, end).await)
    }

    /// Live feed URL for `side`, or for the active side if `None`.
    pub fn stream_url(&self, side: Option<Side>) -> Result<String> {
        self.require_camera()?;
        let side = side.unwrap_or_else(|| self.state.snapshot().active_side);
        Ok(self.client.stream_url(side))
    }

    pub fn switch_side(&self) -> Side {
        self.state.switch_side()
    }
}
