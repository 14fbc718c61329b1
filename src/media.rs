//! Media items stored on the dashcam SD card.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Camera side.  The rear camera's directories carry a `back_` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Front,
    Rear,
}

impl Side {
    pub fn toggled(self) -> Self {
        match self {
            Side::Front => Side::Rear,
            Side::Rear  => Side::Front,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Front => "front",
            Side::Rear  => "rear",
        })
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" => Ok(Side::Front),
            "rear" | "back" => Ok(Side::Rear),
            other => Err(format!("unknown camera side '{other}' (expected front or rear)")),
        }
    }
}

/// Storage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Continuously overwritten footage.
    Loop,
    /// User-protected footage.
    Locked,
    /// Still images.
    Snapshot,
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loop" | "norm" => Ok(Category::Loop),
            "locked" | "emr" => Ok(Category::Locked),
            "snapshot" | "photo" => Ok(Category::Snapshot),
            other => Err(format!(
                "unknown category '{other}' (expected loop, locked or snapshot)"
            )),
        }
    }
}

/// One of the six device-side directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Directory {
    LoopFront,
    LoopRear,
    LockedFront,
    LockedRear,
    SnapshotFront,
    SnapshotRear,
}

impl Directory {
    /// Fan-out order used for file counts.
    pub const ALL: [Directory; 6] = [
        Directory::LoopFront,
        Directory::LoopRear,
        Directory::LockedFront,
        Directory::LockedRear,
        Directory::SnapshotFront,
        Directory::SnapshotRear,
    ];

    pub fn new(category: Category, side: Side) -> Self {
        match (category, side) {
            (Category::Loop,     Side::Front) => Directory::LoopFront,
            (Category::Loop,     Side::Rear)  => Directory::LoopRear,
            (Category::Locked,   Side::Front) => Directory::LockedFront,
            (Category::Locked,   Side::Rear)  => Directory::LockedRear,
            (Category::Snapshot, Side::Front) => Directory::SnapshotFront,
            (Category::Snapshot, Side::Rear)  => Directory::SnapshotRear,
        }
    }

    /// Name used in `-dir=` query parameters and device paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Directory::LoopFront     => "norm",
            Directory::LoopRear      => "back_norm",
            Directory::LockedFront   => "emr",
            Directory::LockedRear    => "back_emr",
            Directory::SnapshotFront => "photo",
            Directory::SnapshotRear  => "back_photo",
        }
    }
}

impl From<Directory> for &'static str {
    fn from(d: Directory) -> Self {
        d.as_str()
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video clip or still image, decided by the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Photo,
}

/// Extension of the final path segment, without the dot.
pub fn extension(name: &str) -> Option<&str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.rsplit_once('.').map(|(_, ext)| ext)
}

/// `.TS` clips and `.JPG` stills are the only media the camera lists.
pub fn is_media_file(name: &str) -> bool {
    matches!(extension(name), Some(e) if e.eq_ignore_ascii_case("ts") || e.eq_ignore_ascii_case("jpg"))
}

impl MediaKind {
    pub fn from_filename(name: &str) -> Self {
        match extension(name) {
            Some(e) if e.eq_ignore_ascii_case("jpg") => MediaKind::Photo,
            _ => MediaKind::Video,
        }
    }
}

/// One media item on the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Base name, e.g. `2026_01_24_115023_00.TS`.
    pub filename: String,
    pub directory: Directory,
    /// Device-relative path exactly as the camera reports it (the doubled
    /// separator in `sd//norm/...` is significant for playback).
    pub path: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub captured_at: Option<NaiveDateTime>,
}

impl FileRecord {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_filename(&self.filename)
    }
}

/// Per-directory file counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileCounts {
    pub loop_front:     u32,
    pub loop_rear:      u32,
    pub locked_front:   u32,
    pub locked_rear:    u32,
    pub snapshot_front: u32,
    pub snapshot_rear:  u32,
}

impl FileCounts {
    pub fn set(&mut self, dir: Directory, count: u32) {
        let slot = match dir {
            Directory::LoopFront     => &mut self.loop_front,
            Directory::LoopRear      => &mut self.loop_rear,
            Directory::LockedFront   => &mut self.locked_front,
            Directory::LockedRear    => &mut self.locked_rear,
            Directory::SnapshotFront => &mut self.snapshot_front,
            Directory::SnapshotRear  => &mut self.snapshot_rear,
        };
        *slot = count;
    }

    pub fn loop_total(&self) -> u32 {
        self.loop_front.saturating_add(self.loop_rear)
    }

    pub fn locked_total(&self) -> u32 {
        self.locked_front.saturating_add(self.locked_rear)
    }

    pub fn snapshot_total(&self) -> u32 {
        self.snapshot_front.saturating_add(self.snapshot_rear)
    }
}
