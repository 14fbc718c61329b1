//! Command-line client for WiFi dashcams with the `hisnet` CGI API.
//!
//! Usage:
//!   dashcam camera add --ip 192.168.0.1 --ssid DASHCAM_1234
//!   dashcam camera select <id>
//!   dashcam list loop --side rear
//!   dashcam watch                  # poll connectivity, interactive controls

mod client;
mod config;
mod error;
mod listing;
mod media;
mod monitor;
mod registry;
mod session;
mod state;
mod store;
mod timestamp;
mod urls;

#[cfg(test)]
mod testutil;

use std::future::Future;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::client::DeviceClient;
use crate::config::ClientConfig;
use crate::error::DashcamError;
use crate::media::{Category, Directory, FileRecord, MediaKind, Side};
use crate::monitor::{ConnectionEvent, ConnectionMonitor};
use crate::registry::{CameraRegistry, NewCamera};
use crate::session::Session;
use crate::store::FileStore;

type AppSession = Session<FileStore>;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "dashcam", about = "Control a WiFi dashcam and browse its recordings")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Log to stderr even if `log_syslog` is enabled.
    #[arg(long)]
    stderr: bool,

    /// Debug-level logging (raw device responses).
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the selected camera is reachable.
    Connect,
    /// Connectivity plus file counts.
    Status,
    /// Take a photo.
    Snapshot,
    /// Start or stop recording.
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
    /// File counts for every directory.
    Counts,
    /// List the files of a gallery.
    List {
        /// loop, locked or snapshot
        category: Category,
        #[arg(long, default_value = "front")]
        side: Side,
        /// First index (defaults to 0).
        #[arg(long)]
        start: Option<u32>,
        /// Last index (defaults to `page_size`).
        #[arg(long)]
        end: Option<u32>,
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Download a file (or its thumbnail).
    Download {
        category: Category,
        filename: String,
        #[arg(long, default_value = "front")]
        side: Side,
        #[arg(long)]
        thumbnail: bool,
        /// Destination directory (defaults to `download_dir`).
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Open the live RTSP feed in the configured player.
    Live {
        #[arg(long, default_value = "front")]
        side: Side,
        /// Only print the stream URL.
        #[arg(long)]
        print: bool,
    },
    /// Poll connectivity and accept interactive commands on stdin.
    Watch,
    /// Manage known cameras.
    Camera {
        #[command(subcommand)]
        action: CameraAction,
    },
}

#[derive(Debug, Subcommand)]
enum RecordAction {
    Start,
    Stop,
}

#[derive(Debug, Subcommand)]
enum CameraAction {
    List,
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        ssid: Option<String>,
    },
    Remove { id: u64 },
    Select { id: u64 },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => config::load_config(path),
        None => config::load_config_or_default(&config::default_config_path()),
    };
    let cfg = match loaded {
        Ok(c) => c,
        Err(e) => {
            eprintln!("dashcam: config error: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("dashcam: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    if let Err(e) = setup_logging(use_syslog, cli.verbose) {
        eprintln!("dashcam: {e}");
        process::exit(1);
    }

    if let Err(e) = run(cli.command, cfg).await {
        match e.downcast_ref::<DashcamError>() {
            Some(DashcamError::NoCameraSelected) => eprintln!(
                "No camera selected. Add one with `dashcam camera add --ip <ip>` \
                 and pick it with `dashcam camera select <id>`."
            ),
            Some(DashcamError::NotConnected(instructions)) => {
                eprintln!("Cannot reach the dashcam. {instructions}")
            }
            _ => {
                error!("{e:#}");
                eprintln!("dashcam: {e:#}");
            }
        }
        process::exit(1);
    }
}

async fn run(command: Command, cfg: ClientConfig) -> anyhow::Result<()> {
    let store = FileStore::open(&cfg.store_file)
        .with_context(|| format!("opening store {}", cfg.store_file.display()))?;
    let client = DeviceClient::new(&cfg)?;
    let mut session = Session::new(CameraRegistry::load(store), client);

    match command {
        Command::Connect => {
            connect(&session).await?;
        }
        Command::Status => {
            if connect(&session).await? {
                print_counts(&session).await?;
            }
        }
        Command::Snapshot => {
            if session.take_photo().await? {
                println!("Photo captured!");
            } else {
                println!("Failed to take photo");
            }
        }
        Command::Record { action } => {
            let (ok, verb) = match action {
                RecordAction::Start => (session.start_recording().await?, "started"),
                RecordAction::Stop  => (session.stop_recording().await?, "stopped"),
            };
            if ok {
                println!("Recording {verb}");
            } else {
                println!("Camera refused the command");
            }
        }
        Command::Counts => print_counts(&session).await?,
        Command::List { category, side, start, end, json } => {
            let files = match (start, end) {
                (None, None) => session.gallery(category, side).await?,
                (start, end) => {
                    let end = end.unwrap_or(cfg.page_size);
                    session
                        .list(Directory::new(category, side), start.unwrap_or(0), end)
                        .await?
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                print_files(&files);
            }
        }
        Command::Download { category, filename, side, thumbnail, output } => {
            let record = find_file(&session, Directory::new(category, side), &filename).await?;
            let dest = output.unwrap_or_else(|| cfg.download_dir.clone());
            let path = session.client().download(&record, &dest, thumbnail).await?;
            println!("Saved {}", path.display());
        }
        Command::Live { side, print } => {
            let url = session.stream_url(Some(side))?;
            if print {
                println!("{url}");
            } else {
                play(&cfg.player, &url).await?;
            }
        }
        Command::Watch => watch(&session, &cfg).await?,
        Command::Camera { action } => camera(&mut session, action)?,
    }
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn connect(session: &AppSession) -> anyhow::Result<bool> {
    let connected = session.connect().await?;
    if connected {
        println!("Connected to dashcam!");
    } else {
        println!("Dashcam not reachable. {}", session.wifi_instructions());
    }
    Ok(connected)
}

async fn print_counts(session: &AppSession) -> anyhow::Result<()> {
    let c = session.file_counts().await?;
    println!("{:<10} {:>6} {:>6} {:>6}", "", "front", "rear", "total");
    println!("{:<10} {:>6} {:>6} {:>6}", "loop", c.loop_front, c.loop_rear, c.loop_total());
    println!("{:<10} {:>6} {:>6} {:>6}", "locked", c.locked_front, c.locked_rear, c.locked_total());
    println!(
        "{:<10} {:>6} {:>6} {:>6}",
        "snapshot", c.snapshot_front, c.snapshot_rear, c.snapshot_total()
    );
    Ok(())
}

fn print_files(files: &[FileRecord]) {
    if files.is_empty() {
        println!("No files");
        return;
    }
    for f in files {
        let label = timestamp::format_label(f.captured_at.as_ref());
        let kind = match f.kind() {
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
        };
        println!("{:<16} {:<5} {:<32} {}", label, kind, f.filename, f.media_url);
    }
}

/// Look `filename` up across the whole directory, not just the first page.
async fn find_file(
    session:  &AppSession,
    dir:      Directory,
    filename: &str,
) -> anyhow::Result<FileRecord> {
    session.require_camera()?;
    let total = session.client().get_file_count(dir).await;
    let end = total.max(1);
    debug!("searching {total} file(s) in {dir} for {filename}");
    session
        .list(dir, 0, end)
        .await?
        .into_iter()
        .find(|f| f.filename == filename)
        .ok_or_else(|| DashcamError::NotFound(format!("{filename} in {dir}")).into())
}

/// Hand the stream to an external player; RTSP is never decoded here.
async fn play(player: &str, url: &str) -> anyhow::Result<()> {
    let mut parts = player.split_whitespace();
    let program = parts.next().context("player is empty")?;
    info!("opening {url} with {program}");
    let status = tokio::process::Command::new(program)
        .args(parts)
        .arg(url)
        .status()
        .await
        .with_context(|| format!("starting player {program}; stream URL is {url}"))?;
    if !status.success() {
        warn!("{program} exited with {status}");
    }
    Ok(())
}

fn camera(session: &mut AppSession, action: CameraAction) -> anyhow::Result<()> {
    match action {
        CameraAction::List => {
            let selected = session.registry().selected().map(|c| c.id);
            if session.registry().cameras().is_empty() {
                println!("No cameras added.");
            }
            for c in session.registry().cameras() {
                let mark = if Some(c.id) == selected { '*' } else { ' ' };
                let ssid = c.ssid.as_deref().unwrap_or("-");
                println!("{mark} {:<14} {:<20} {:<16} {ssid}", c.id, c.name, c.ip);
            }
        }
        CameraAction::Add { name, ip, ssid } => {
            let c = session.add_camera(NewCamera { name, ip, ssid })?;
            println!("Added {} ({}) with id {}", c.name, c.ip, c.id);
        }
        CameraAction::Remove { id } => {
            session.remove_camera(id)?;
            println!("Removed camera {id}");
        }
        CameraAction::Select { id } => {
            let c = session.select_camera(id)?;
            println!("Selected {} ({})", c.name, c.ip);
        }
    }
    Ok(())
}

// ── Watch ─────────────────────────────────────────────────────────────────────

const WATCH_HELP: &str =
    "commands: p = photo, r = toggle recording, s = switch camera, \
     l = live, c = counts, q = quit";

/// Long-running mode: the connection monitor polls in the background while
/// stdin takes single-letter commands.  On Unix, SIGUSR1 pauses polling and
/// SIGUSR2 resumes it with an immediate check.
async fn watch(session: &AppSession, cfg: &ClientConfig) -> anyhow::Result<()> {
    let camera = session.require_camera()?;
    println!("Watching {} ({}). {WATCH_HELP}", camera.name, camera.ip);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("waiting for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    watch_loop(
        session,
        cfg,
        cfg.poll_interval(),
        BufReader::new(tokio::io::stdin()),
        Lifecycle::new()?,
        shutdown,
    )
    .await
}

/// Runs until `q` or `shutdown`.  A closed input only stops command reading.
async fn watch_loop<R, F>(
    session:       &AppSession,
    cfg:           &ClientConfig,
    interval:      Duration,
    input:         R,
    mut lifecycle: Lifecycle,
    shutdown:      F,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let (mut monitor, mut events) = ConnectionMonitor::new(
        session.client().clone(),
        session.state().clone(),
        interval,
    );
    monitor.resume();

    let mut lines = input.lines();
    let mut input_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(ConnectionEvent::Connected { ip }) = events.recv() => {
                println!("Dashcam connected! ({ip})");
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) => {
                    if !watch_command(session, cfg, line.trim()).await {
                        break;
                    }
                }
                None => {
                    input_open = false;
                    info!("stdin closed; polling until Ctrl-C");
                }
            },
            pause = lifecycle.next() => {
                if pause && monitor.is_running() {
                    monitor.pause();
                    println!("Polling paused");
                } else if !pause {
                    monitor.resume();
                    println!("Polling resumed");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    monitor.pause();
    Ok(())
}

/// Run one interactive command; `false` means quit.
async fn watch_command(session: &AppSession, cfg: &ClientConfig, cmd: &str) -> bool {
    if cmd == "q" || cmd == "quit" {
        return false;
    }
    let result: anyhow::Result<()> = async {
        match cmd {
            "" => {}
            "p" => {
                let ok = session.take_photo().await?;
                println!("{}", if ok { "Photo captured!" } else { "Failed to take photo" });
            }
            "r" => {
                let recording = session.toggle_recording().await?;
                println!("{}", if recording { "Recording started" } else { "Recording stopped" });
            }
            "s" => println!("Active camera: {}", session.switch_side()),
            "l" => play(&cfg.player, &session.stream_url(None)?).await?,
            "c" => print_counts(session).await?,
            _ => println!("{WATCH_HELP}"),
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        match e.downcast_ref::<DashcamError>() {
            Some(DashcamError::NotConnected(instructions)) => {
                println!("Cannot reach the dashcam. {instructions}")
            }
            _ => println!("Error: {e:#}"),
        }
    }
    true
}

/// Pause/resume requests delivered by signals.
struct Lifecycle {
    #[cfg(unix)]
    pause:  tokio::signal::unix::Signal,
    #[cfg(unix)]
    resume: tokio::signal::unix::Signal,
}

impl Lifecycle {
    #[cfg(unix)]
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            pause:  signal(SignalKind::user_defined1())?,
            resume: signal(SignalKind::user_defined2())?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// `true` for pause, `false` for resume.
    #[cfg(unix)]
    async fn next(&mut self) -> bool {
        tokio::select! {
            _ = self.pause.recv()  => true,
            _ = self.resume.recv() => false,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> bool {
        std::future::pending().await
    }
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process:  "dashcam".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(level))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .init();
    }
    Ok(())
}
