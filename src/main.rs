//! GrizzlyTime CLI
//!
//! Terminal stand-in for the time-clock window: runs the capture worker,
//! shows its alerts, and forwards typed IDs from stdin.

use clap::Parser;
use grizzlytime::{
    attendance::{AttendanceLedger, LedgerEvent, TracingJournal},
    capture::{FrameSource, MockCamera, MockStep},
    config::FileConfig,
    decode::Code39Decoder,
    metrics::MetricsRegistry,
    pipeline::{self, LoopConfig, LoopExit, Notification},
};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// UI refresh period.
const UI_TICK: Duration = Duration::from_millis(50);

/// Frames a badge stays in view in the simulated feed.
const BADGE_LINGER_FRAMES: usize = 15;

#[derive(Debug, Parser)]
#[command(name = "grizzlytime", version, about = "Attendance time clock")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Length of the simulated camera feed, in frames.
    #[arg(long, default_value_t = 300)]
    frames: usize,

    /// ID to show to the simulated camera (repeatable, in order).
    #[arg(long = "scan")]
    scans: Vec<String>,

    /// Read the attached camera instead of the simulated feed.
    #[arg(long)]
    camera: bool,

    /// Read typed IDs from stdin.
    #[arg(short, long)]
    interactive: bool,

    /// Override the metrics port (0 disables).
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("GrizzlyTime v{}", grizzlytime::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(port) = cli.metrics_port {
        config.output.metrics_port = port;
    }

    let feed = match feed_length(&cli, &config) {
        Ok(feed) => feed,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    let roster = config.roster();
    info!(students = roster.len(), "Roster loaded");
    let ledger = AttendanceLedger::new(roster, TracingJournal)
        .with_guest_fallback(config.attendance.guest_fallback_enabled);

    let source = match open_source(&cli, &config) {
        Ok(source) => source,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    let registry = match MetricsRegistry::new() {
        Ok(registry) => Some(Arc::new(registry)),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };
    if let Some(registry) = &registry {
        start_metrics_server(config.output.metrics_port, Arc::clone(registry));
    }

    let loop_config = LoopConfig::from_file(&config);
    let handle = match pipeline::spawn(source, Code39Decoder::new(), ledger, &loop_config, registry)
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start capture: {}", e);
            std::process::exit(1);
        }
    };

    let token = handle.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let typed = if cli.interactive {
        Some(spawn_stdin_reader())
    } else {
        None
    };

    // The simulated feed ends after its scripted frames plus a grace period.
    let deadline = feed.map(|length| Instant::now() + length + Duration::from_secs(1));
    let mut previews = 0u64;

    'ui: loop {
        if handle.latest_frame().is_some() {
            previews += 1;
        }

        if let Some(rx) = &typed {
            while let Ok(line) = rx.try_recv() {
                if let Err(e) = handle.submit_manual(line) {
                    println!("! {}", e);
                }
            }
        }

        for note in handle.notifications() {
            match note {
                Notification::Accepted { event, source } => match event {
                    LedgerEvent::Login { name, at, .. } => {
                        println!("+ {} logged in at {} ({:?})", name, at.format("%H:%M:%S"), source)
                    }
                    LedgerEvent::Logout {
                        name,
                        session_hours,
                        total_hours,
                        ..
                    } => println!(
                        "- {} logged out: {:.2} h this session, {:.2} h total",
                        name, session_hours, total_hours
                    ),
                },
                Notification::Rejected { input, error, .. } => {
                    println!("! {} rejected: {}", input, error)
                }
                Notification::Shutdown(exit) => {
                    if let LoopExit::DeviceFailed(e) = exit {
                        println!("! Camera stopped: {}", e);
                    }
                    break 'ui;
                }
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) && !cli.interactive {
            handle.cancel();
        }
        std::thread::sleep(UI_TICK);
    }

    let present = handle.ledger().logged_in();
    match handle.join() {
        Ok(report) => info!(
            frames = report.stats.frames,
            decodes = report.stats.decodes,
            logins = report.stats.logins,
            logouts = report.stats.logouts,
            previews,
            "Done"
        ),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    println!("Still logged in: {}", present.len());
    for record in present {
        println!("  {} ({})", record.display_name(), record.identifier());
    }
}

/// Play time of the simulated feed, or `None` for a real camera.
fn feed_length(cli: &Cli, config: &FileConfig) -> Result<Option<Duration>, String> {
    if cli.camera {
        return Ok(None);
    }
    let frames = u32::try_from(cli.frames)
        .map_err(|_| format!("--frames {} is out of range (max {})", cli.frames, u32::MAX))?;
    let length = config
        .capture
        .frame_interval()
        .checked_mul(frames)
        .ok_or_else(|| format!("--frames {} is too long a feed", cli.frames))?;
    Ok(Some(length))
}

/// Picks the attached camera or the simulated feed.
fn open_source(cli: &Cli, config: &FileConfig) -> Result<Box<dyn FrameSource>, String> {
    if cli.camera {
        #[cfg(feature = "camera")]
        {
            return Ok(Box::new(grizzlytime::capture::NativeCamera::new(
                config.capture.clone(),
            )));
        }
        #[cfg(not(feature = "camera"))]
        {
            return Err("built without camera support (enable the `camera` feature)".into());
        }
    }

    let script = demo_script(&cli.scans, cli.frames);
    info!(frames = script.len(), badges = cli.scans.len(), "Using simulated camera");
    Ok(Box::new(
        MockCamera::new(config.capture.clone())
            .with_script(script)
            .then_idle(MockStep::Blank)
            .paced(),
    ))
}

/// Spreads the badges evenly over the feed, each lingering for a while.
fn demo_script(scans: &[String], frames: usize) -> Vec<MockStep> {
    let mut script = vec![MockStep::Blank; frames];
    if scans.is_empty() {
        return script;
    }
    let slot = frames / scans.len();
    for (i, id) in scans.iter().enumerate() {
        let start = i * slot + slot / 4;
        let end = (start + BADGE_LINGER_FRAMES).min(frames);
        for step in script.iter_mut().take(end).skip(start) {
            *step = MockStep::Barcode(id.to_uppercase());
        }
    }
    script
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Typed entry unavailable: {}", e);
    }
    rx
}

#[cfg(feature = "metrics")]
fn start_metrics_server(port: u16, registry: Arc<MetricsRegistry>) {
    use grizzlytime::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return;
    }
    let spawned = std::thread::Builder::new()
        .name("metrics".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Metrics runtime failed: {}", e);
                    return;
                }
            };
            let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
            if let Err(e) = runtime.block_on(server.run()) {
                warn!("Metrics server stopped: {}", e);
            }
        });
    if let Err(e) = spawned {
        warn!("Metrics server not started: {}", e);
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics_server(port: u16, _registry: Arc<MetricsRegistry>) {
    if port != 0 {
        tracing::debug!(port, "Built without the metrics feature; exporter not started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("grizzlytime").chain(args.iter().copied()))
    }

    #[test]
    fn test_feed_length_from_frames() {
        let config = FileConfig::default();
        let length = feed_length(&cli(&["--frames", "60"]), &config).unwrap();
        assert_eq!(length, Some(config.capture.frame_interval() * 60));
        assert_eq!(feed_length(&cli(&["--camera"]), &config).unwrap(), None);
    }

    #[test]
    fn test_feed_length_rejects_out_of_range_frames() {
        let config = FileConfig::default();
        let too_many = (u64::from(u32::MAX) + 1).to_string();
        if usize::try_from(u64::from(u32::MAX) + 1).is_ok() {
            assert!(feed_length(&cli(&["--frames", &too_many]), &config).is_err());
        }
    }

    #[test]
    fn test_demo_script_places_badges() {
        let script = demo_script(&["ab1".to_string()], 40);
        assert_eq!(script.len(), 40);
        assert_eq!(script[10], MockStep::Barcode("AB1".into()));
        assert_eq!(script[0], MockStep::Blank);
    }
}
