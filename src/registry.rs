//! Known cameras and the currently selected one.
//!
//! Persisted in a [`KvStore`] under two keys: the camera list and the selected
//! camera record, both as JSON.

use std::net::Ipv4Addr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_IP;
use crate::error::{DashcamError, Result};
use crate::store::KvStore;

pub const CAMERAS_KEY:  &str = "dashcam_cameras";
pub const SELECTED_KEY: &str = "dashcam_selected";

/// A user-registered dashcam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraEndpoint {
    pub id:   u64,
    pub name: String,
    pub ip:   String,
    /// WiFi network the camera broadcasts; only shown in instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
}

/// Fields for [`CameraRegistry::add`]; anything unset gets a default.
#[derive(Debug, Clone, Default)]
pub struct NewCamera {
    pub name: Option<String>,
    pub ip:   Option<String>,
    pub ssid: Option<String>,
}

pub struct CameraRegistry<S: KvStore> {
    store:    S,
    cameras:  Vec<CameraEndpoint>,
    selected: Option<CameraEndpoint>,
    last_id:  u64,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl<S: KvStore> CameraRegistry<S> {
    /// Load the registry from `store`.  Unreadable entries are logged and
    /// treated as absent.
    pub fn load(store: S) -> Self {
        let cameras: Vec<CameraEndpoint> = store
            .get(CAMERAS_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("ignoring stored camera list: {e}");
                    None
                }
            })
            .unwrap_or_default();

        let selected: Option<CameraEndpoint> = store
            .get(SELECTED_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(c) => c,
                Err(e) => {
                    warn!("ignoring stored camera selection: {e}");
                    None
                }
            });

        let last_id = cameras.iter().map(|c| c.id).max().unwrap_or(0);
        Self { store, cameras, selected, last_id }
    }

    pub fn cameras(&self) -> &[CameraEndpoint] {
        &self.cameras
    }

    pub fn selected(&self) -> Option<&CameraEndpoint> {
        self.selected.as_ref()
    }

    pub fn get(&self, id: u64) -> Option<&CameraEndpoint> {
        self.cameras.iter().find(|c| c.id == id)
    }

    /// Millisecond creation time, bumped past the last id handed out so ids
    /// stay unique when cameras are added within the same millisecond.
    fn next_id(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let id = now.max(self.last_id + 1);
        self.last_id = id;
        id
    }

    pub fn add(&mut self, camera: NewCamera) -> Result<CameraEndpoint> {
        let ip = non_empty(camera.ip).unwrap_or_else(|| DEFAULT_IP.to_string());
        if ip.parse::<Ipv4Addr>().is_err() {
            return Err(DashcamError::InvalidIp(ip));
        }
        let name = non_empty(camera.name)
            .unwrap_or_else(|| format!("DashCam {}", self.cameras.len() + 1));

        let endpoint = CameraEndpoint {
            id: self.next_id(),
            name,
            ip,
            ssid: non_empty(camera.ssid),
        };
        let mut cameras = self.cameras.clone();
        cameras.push(endpoint.clone());
        self.save_cameras(cameras)?;
        info!("added camera {} ({}) as id {}", endpoint.name, endpoint.ip, endpoint.id);
        Ok(endpoint)
    }

    /// Remove camera `id`.  Returns `true` if it was the selected camera, in
    /// which case the selection is cleared.
    pub fn remove(&mut self, id: u64) -> Result<bool> {
        let cameras: Vec<CameraEndpoint> =
            self.cameras.iter().filter(|c| c.id != id).cloned().collect();
        if cameras.len() == self.cameras.len() {
            return Err(DashcamError::UnknownCamera(id));
        }
        self.save_cameras(cameras)?;

        let was_selected = self.selected.as_ref().is_some_and(|c| c.id == id);
        if was_selected {
            self.save_selected(None)?;
        }
        info!("removed camera {id}");
        Ok(was_selected)
    }

    pub fn select(&mut self, id: u64) -> Result<CameraEndpoint> {
        let camera = self.get(id).cloned().ok_or(DashcamError::UnknownCamera(id))?;
        self.save_selected(Some(camera.clone()))?;
        info!("selected camera {} ({})", camera.name, camera.ip);
        Ok(camera)
    }

    // In-memory state changes only once the store accepted the write.

    fn save_cameras(&mut self, cameras: Vec<CameraEndpoint>) -> Result<()> {
        let raw = serde_json::to_string(&cameras)?;
        self.store.set(CAMERAS_KEY, raw)?;
        self.cameras = cameras;
        Ok(())
    }

    fn save_selected(&mut self, selected: Option<CameraEndpoint>) -> Result<()> {
        let raw = serde_json::to_string(&selected)?;
        self.store.set(SELECTED_KEY, raw)?;
        self.selected = selected;
        Ok(())
    }
}
