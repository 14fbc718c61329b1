//! HiSilicon-style dashcam CGI client.
//!
//! Talks to the camera's embedded web server over the camera's own WiFi
//! network.  Every status/listing call is fail-soft: an unreachable camera,
//! a non-2xx status or a timeout turns into a safe default (`false`, `0`, an
//! empty list) because "not connected" is the normal state of a polling
//! client.  Only the `workmodecmd.cgi` commands report transport errors.

use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;

use crate::config::{ClientConfig, Timeouts};
use crate::error::{DashcamError, Result};
use crate::listing;
use crate::media::{Category, Directory, FileCounts, FileRecord, Side};
use crate::urls;

/// Address the camera's access point hands itself.
pub const DEFAULT_IP: &str = "192.168.0.1";

/// Directory probed by the connectivity check.
const PROBE_DIR: Directory = Directory::LoopFront;

const COUNT_CGI:   &str = "/cgi-bin/hisnet/getdirfilecount.cgi";
const LIST_CGI:    &str = "/cgi-bin/hisnet/getdirfilelist.cgi";
const COMMAND_CGI: &str = "/cgi-bin/hisnet/workmodecmd.cgi";

/// Client bound to one camera IP at a time.
#[derive(Debug)]
pub struct DeviceClient {
    http:      Client,
    /// No total ceiling; stalls are caught per chunk instead.
    transfer:  Client,
    ip:        RwLock<String>,
    http_port: u16,
    rtsp_port: u16,
    timeouts:  Timeouts,
    page_size: u32,
    strict_connectivity: bool,
}

impl DeviceClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let timeouts = cfg.timeouts();
        Ok(Self {
            http:      build_http_client(&timeouts)?,
            transfer:  build_transfer_client(&timeouts)?,
            ip:        RwLock::new(DEFAULT_IP.to_string()),
            http_port: cfg.http_port,
            rtsp_port: cfg.rtsp_port,
            timeouts,
            page_size: cfg.page_size,
            strict_connectivity: cfg.strict_connectivity,
        })
    }

    /// Retarget every following request.
    pub fn set_ip(&self, ip: &str) {
        if let Ok(mut guard) = self.ip.write() {
            *guard = ip.to_string();
        }
    }

    pub fn ip(&self) -> String {
        self.ip
            .read()
            .map(|ip| ip.clone())
            .unwrap_or_else(|_| DEFAULT_IP.to_string())
    }

    pub fn base_url(&self) -> String {
        urls::base_url(&self.ip(), self.http_port)
    }

    pub fn stream_url(&self, side: Side) -> String {
        urls::stream_url(&self.ip(), self.rtsp_port, side)
    }

    async fn get(&self, url: &str, timeout: Duration) -> reqwest::Result<Response> {
        debug!("GET {url}");
        self.http.get(url).timeout(timeout).send().await
    }

    /// Body of a successful response, or `None` for any failure.
    async fn get_text(&self, url: &str, timeout: Duration) -> Option<String> {
        match self.get(url, timeout).await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    debug!("{url} → {body:?}");
                    Some(body)
                }
                Err(e) => {
                    warn!("reading {url}: {e}");
                    None
                }
            },
            Ok(resp) => {
                warn!("{url}: HTTP {}", resp.status());
                None
            }
            Err(e) if e.is_timeout() => {
                debug!("{url}: timed out");
                None
            }
            Err(e) => {
                debug!("{url} failed: {e}");
                None
            }
        }
    }

    fn count_url(&self, dir: Directory) -> String {
        format!("{}{COUNT_CGI}?-dir={dir}", self.base_url())
    }

    fn command_url(&self, cmd: &str) -> String {
        format!("{}{COMMAND_CGI}?-cmd={cmd}", self.base_url())
    }

    // ── Connectivity ──────────────────────────────────────────────────────────

    /// `true` if the camera answers the count endpoint with HTTP 200 (and, in
    /// strict mode, a `count=` marker).  Never errors.
    pub async fn check_connectivity(&self) -> bool {
        let url = self.count_url(PROBE_DIR);
        match self.get(&url, self.timeouts.connect).await {
            Ok(resp) if resp.status() == StatusCode::OK => {
                if !self.strict_connectivity {
                    return true;
                }
                match resp.text().await {
                    Ok(body) => body.contains("count="),
                    Err(e) => {
                        debug!("probe body from {url}: {e}");
                        false
                    }
                }
            }
            Ok(resp) => {
                debug!("probe {url} → {}", resp.status());
                false
            }
            Err(e) => {
                debug!("probe {url} failed: {e}");
                false
            }
        }
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    async fn command(&self, cmd: &str) -> Result<bool> {
        let url = self.command_url(cmd);
        let resp = self.get(&url, self.timeouts.command).await?;
        let status = resp.status();
        debug!("-cmd={cmd} → {status}");
        Ok(status.is_success())
    }

    /// Take a photo.
    pub async fn trigger_snapshot(&self) -> Result<bool> {
        let ok = self.command("trigger").await?;
        if ok {
            info!("snapshot triggered on {}", self.ip());
        }
        Ok(ok)
    }

    pub async fn start_recording(&self) -> Result<bool> {
        let ok = self.command("start").await?;
        if ok {
            info!("recording started on {}", self.ip());
        }
        Ok(ok)
    }

    /// Stop recording.  The camera often stops without answering, so a
    /// timeout counts as success.
    pub async fn stop_recording(&self) -> Result<bool> {
        match self.command("stop").await {
            Err(DashcamError::Http(e)) if e.is_timeout() => {
                warn!("stop command timed out on {}; assuming stopped", self.ip());
                Ok(true)
            }
            other => other,
        }
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    /// Number of files in `dir`; 0 on any failure.
    pub async fn get_file_count(&self, dir: Directory) -> u32 {
        match self.get_text(&self.count_url(dir), self.timeouts.count).await {
            Some(body) => listing::parse_count(&body),
            None => 0,
        }
    }

    /// Counts for all six directories, fetched concurrently.
    pub async fn get_all_file_counts(&self) -> FileCounts {
        let counts = join_all(
            Directory::ALL
                .into_iter()
                .map(|dir| async move { (dir, self.get_file_count(dir).await) }),
        )
        .await;

        let mut out = FileCounts::default();
        for (dir, n) in counts {
            out.set(dir, n);
        }
        out
    }

    /// Files `start..end` of `dir`; empty on any failure.
    pub async fn get_file_list(&self, dir: Directory, start: u32, end: u32) -> Vec<FileRecord> {
        let base = self.base_url();
        let url = format!("{base}{LIST_CGI}?-dir={dir}&-start={start}&-end={end}");
        match self.get_text(&url, self.timeouts.list).await {
            Some(body) => {
                let files = listing::parse_file_list(&body, dir, &base);
                debug!("{dir}: {} file(s)", files.len());
                files
            }
            None => Vec::new(),
        }
    }

    /// First page of a gallery.
    pub async fn gallery_files(&self, category: Category, side: Side) -> Vec<FileRecord> {
        self.get_file_list(Directory::new(category, side), 0, self.page_size)
            .await
    }

    /// Save a file (or its preview) to `dest_dir`, keeping the device name.
    ///
    /// The body is written to `<name>.part` and renamed once complete, so a
    /// failed transfer never leaves a truncated file under the real name.
    pub async fn download(
        &self,
        record:    &FileRecord,
        dest_dir:  &Path,
        thumbnail: bool,
    ) -> Result<PathBuf> {
        let url = if thumbnail { &record.thumbnail_url } else { &record.media_url };
        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DashcamError::NotFound(format!("no file name in {url}")))?;

        debug!("GET {url} (download)");
        let idle = self.timeouts.download_idle;
        let resp = tokio::time::timeout(idle, self.transfer.get(url).send())
            .await
            .map_err(|_| DashcamError::Stalled(format!("no response from {url}")))??
            .error_for_status()?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(name);
        let part = dest_dir.join(format!("{name}.part"));

        let result = async {
            let written = self.stream_to(resp, &part, url).await?;
            tokio::fs::rename(&part, &path).await?;
            Ok::<_, DashcamError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                info!("downloaded {written} bytes from {url} to {}", path.display());
                Ok(path)
            }
            Err(e) => {
                warn!("download of {url} failed: {e}");
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    debug!("removing {}: {rm}", part.display());
                }
                Err(e)
            }
        }
    }

    async fn stream_to(&self, mut resp: Response, part: &Path, url: &str) -> Result<usize> {
        let mut file = tokio::fs::File::create(part).await?;
        let mut written = 0usize;
        loop {
            let chunk = tokio::time::timeout(self.timeouts.download_idle, resp.chunk())
                .await
                .map_err(|_| DashcamError::Stalled(format!("{url} after {written} bytes")))??;
            let Some(chunk) = chunk else { break };
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Build the HTTP client used for all camera calls.  `request` is a ceiling;
/// individual operations apply their own shorter timeouts.
pub fn build_http_client(timeouts: &Timeouts) -> Result<Client> {
    Client::builder()
        .timeout(timeouts.request)
        .build()
        .map_err(DashcamError::Http)
}

/// Client for file downloads: bounded connect, unbounded transfer.
fn build_transfer_client(timeouts: &Timeouts) -> Result<Client> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .build()
        .map_err(DashcamError::Http)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::testutil::{closed_port, FakeDevice, Reply};

    fn client_for(ip: &str, port: u16) -> DeviceClient {
        let cfg = ClientConfig { http_port: port, ..ClientConfig::default() };
        let mut client = DeviceClient::new(&cfg).unwrap();
        client.timeouts = Timeouts {
            connect: Duration::from_millis(300),
            command: Duration::from_millis(300),
            count:   Duration::from_millis(300),
            list:    Duration::from_millis(300),
            request: Duration::from_secs(2),
            download_idle: Duration::from_millis(300),
        };
        client.http = build_http_client(&client.timeouts).unwrap();
        client.transfer = build_transfer_client(&client.timeouts).unwrap();
        client.set_ip(ip);
        client
    }

    async fn device_client(dev: &FakeDevice) -> DeviceClient {
        client_for(&dev.ip(), dev.port())
    }

    #[tokio::test]
    async fn connectivity_true_on_200() {
        let dev = FakeDevice::start(|_| Reply::ok("var count=\"44\";")).await;
        let client = device_client(&dev).await;
        assert!(client.check_connectivity().await);
        assert_eq!(dev.requests(), ["/cgi-bin/hisnet/getdirfilecount.cgi?-dir=norm"]);
    }

    #[tokio::test]
    async fn strict_connectivity_needs_count_marker() {
        let dev = FakeDevice::start(|_| Reply::ok("<html>router login</html>")).await;
        let mut client = device_client(&dev).await;
        assert!(client.check_connectivity().await);
        client.strict_connectivity = true;
        assert!(!client.check_connectivity().await);
    }

    #[tokio::test]
    async fn connectivity_false_when_unreachable() {
        let client = client_for("127.0.0.1", closed_port().await);
        assert!(!client.check_connectivity().await);

        let dev = FakeDevice::start(|_| Reply::ok("count=1").delayed(Duration::from_secs(2))).await;
        let client = device_client(&dev).await;
        let started = Instant::now();
        assert!(!client.check_connectivity().await);
        assert!(started.elapsed() < Duration::from_secs(1));

        let dev = FakeDevice::start(|_| Reply::status(500)).await;
        assert!(!device_client(&dev).await.check_connectivity().await);
    }

    #[tokio::test]
    async fn commands() {
        let dev = FakeDevice::start(|path| {
            if path.ends_with("-cmd=start") { Reply::status(503) } else { Reply::ok("ok") }
        })
        .await;
        let client = device_client(&dev).await;
        assert!(client.trigger_snapshot().await.unwrap());
        assert!(!client.start_recording().await.unwrap());
        assert!(client.stop_recording().await.unwrap());
        assert_eq!(
            dev.requests(),
            [
                "/cgi-bin/hisnet/workmodecmd.cgi?-cmd=trigger",
                "/cgi-bin/hisnet/workmodecmd.cgi?-cmd=start",
                "/cgi-bin/hisnet/workmodecmd.cgi?-cmd=stop",
            ]
        );
    }

    #[tokio::test]
    async fn commands_reject_on_transport_error() {
        let client = client_for("127.0.0.1", closed_port().await);
        assert!(matches!(client.trigger_snapshot().await, Err(DashcamError::Http(_))));
        assert!(client.start_recording().await.is_err());
        assert!(client.stop_recording().await.is_err());
    }

    #[tokio::test]
    async fn stop_timeout_counts_as_stopped() {
        let dev = FakeDevice::start(|_| Reply::ok("").delayed(Duration::from_secs(2))).await;
        let client = device_client(&dev).await;
        assert!(client.stop_recording().await.unwrap());
    }

    #[tokio::test]
    async fn file_counts_fail_soft() {
        let dev = FakeDevice::start(|path| {
            if path.ends_with("-dir=norm") {
                Reply::ok("var count=\"44\";")
            } else if path.ends_with("-dir=back_norm") {
                Reply::ok("count=40")
            } else if path.ends_with("-dir=emr") {
                Reply::ok("var count=\"0\";")
            } else if path.ends_with("-dir=back_emr") {
                Reply::ok("nothing here")
            } else if path.ends_with("-dir=photo") {
                Reply::status(404)
            } else {
                Reply::ok("count=9").delayed(Duration::from_secs(2))
            }
        })
        .await;
        let client = device_client(&dev).await;

        assert_eq!(client.get_file_count(Directory::LoopFront).await, 44);
        assert_eq!(client.get_file_count(Directory::LockedFront).await, 0);
        assert_eq!(client.get_file_count(Directory::LockedRear).await, 0);

        let counts = client.get_all_file_counts().await;
        assert_eq!(counts.loop_front, 44);
        assert_eq!(counts.loop_rear, 40);
        assert_eq!(counts.loop_total(), 84);
        assert_eq!(counts.snapshot_total(), 0);
    }

    #[tokio::test]
    async fn file_list_and_gallery() {
        let dev = FakeDevice::start(|path| {
            if path.contains("-dir=norm") {
                Reply::ok("sd//norm/2026_01_24_115023_00.TS;sd//norm/2026_01_24_114922_01.TS;")
            } else {
                Reply::status(500)
            }
        })
        .await;
        let client = device_client(&dev).await;

        let files = client.gallery_files(Category::Loop, Side::Front).await;
        assert_eq!(files.len(), 2);
        assert_eq!(
            files[0].media_url,
            format!("http://{}/sd//norm/2026_01_24_115023_00.TS", dev.addr)
        );
        assert_eq!(
            dev.requests(),
            ["/cgi-bin/hisnet/getdirfilelist.cgi?-dir=norm&-start=0&-end=50"]
        );

        assert!(client.get_file_list(Directory::LoopRear, 0, 10).await.is_empty());
    }

    #[tokio::test]
    async fn file_list_empty_when_unreachable() {
        let client = client_for("127.0.0.1", closed_port().await);
        assert!(client.get_file_list(Directory::SnapshotFront, 0, 50).await.is_empty());
        assert_eq!(client.get_all_file_counts().await, FileCounts::default());
    }

    #[tokio::test]
    async fn download_writes_file() {
        let dev = FakeDevice::start(|path| {
            if path.ends_with(".THM") { Reply::ok("thumb") } else { Reply::ok("clip-bytes") }
        })
        .await;
        let client = device_client(&dev).await;
        let body = "sd//norm/2026_01_24_115023_00.TS;";
        let record = listing::parse_file_list(body, Directory::LoopFront, &client.base_url())
            .pop()
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let clip = client.download(&record, dir.path(), false).await.unwrap();
        assert_eq!(clip.file_name().unwrap(), "2026_01_24_115023_00.TS");
        assert_eq!(std::fs::read_to_string(&clip).unwrap(), "clip-bytes");

        let thumb = client.download(&record, dir.path(), true).await.unwrap();
        assert_eq!(thumb.file_name().unwrap(), "2026_01_24_115023_00.THM");
        assert_eq!(std::fs::read_to_string(&thumb).unwrap(), "thumb");
    }

    #[tokio::test]
    async fn stalled_download_leaves_no_file() {
        let dev = FakeDevice::start(|_| Reply::ok("0123456789abcdefghij").stall_after(10)).await;
        let client = device_client(&dev).await;
        let record = listing::parse_file_list(
            "sd//norm/2026_01_24_115023_00.TS;",
            Directory::LoopFront,
            &client.base_url(),
        )
        .pop()
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let err = client.download(&record, dir.path(), false).await.unwrap_err();
        assert!(matches!(err, DashcamError::Stalled(_)), "{err:?}");
        assert!(!dir.path().join("2026_01_24_115023_00.TS").exists());
        assert!(!dir.path().join("2026_01_24_115023_00.TS.part").exists());
    }

    #[tokio::test]
    async fn slow_download_outlives_request_ceiling() {
        let body = "x".repeat(64);
        let dev = FakeDevice::start(move |_| {
            Reply::ok(&body).dripped(8, Duration::from_millis(100))
        })
        .await;
        let mut client = device_client(&dev).await;
        client.timeouts.request = Duration::from_millis(300);
        client.http = build_http_client(&client.timeouts).unwrap();
        let record = listing::parse_file_list(
            "sd//photo/2026_01_24_115023_00.JPG;",
            Directory::SnapshotFront,
            &client.base_url(),
        )
        .pop()
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let path = client.download(&record, dir.path(), false).await.unwrap();
        assert!(started.elapsed() > Duration::from_millis(300));
        assert_eq!(std::fs::read(&path).unwrap().len(), 64);
        assert!(!dir.path().join("2026_01_24_115023_00.JPG.part").exists());
    }

    #[tokio::test]
    async fn trigger_and_start_use_command_timeout() {
        let dev = FakeDevice::start(|_| Reply::ok("ok").delayed(Duration::from_secs(2))).await;
        let client = device_client(&dev).await;

        let started = Instant::now();
        match client.trigger_snapshot().await {
            Err(DashcamError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(client.start_recording().await.is_err());
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn retargeting_changes_urls() {
        let client = DeviceClient::new(&ClientConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://192.168.0.1");
        client.set_ip("10.0.0.7");
        assert_eq!(client.base_url(), "http://10.0.0.7");
        assert_eq!(client.stream_url(Side::Rear), "rtsp://10.0.0.7:554/livestream/2");
    }
}
