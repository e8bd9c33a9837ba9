use anyhow::Result;
use clap::Parser;
use clipcam::detector::{DetectorFactory, DetectorLoader, FaceDetector, MockDetector};
use clipcam::error::DetectorError;
use clipcam::events::{ClipcamEvent, EventBus, EventReceiver};
use clipcam::recording::{ArtifactSnapshot, PassthroughRecorder};
use clipcam::{ClipSession, ClipcamConfig, KeyboardInputHandler, SessionCommand, SyntheticCamera};
use futures::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "clipcam")]
#[command(about = "Webcam clip recorder with live face annotation")]
#[command(version)]
#[command(long_about = "Records timed webcam clips through a lifecycle state machine: \
request the camera, preview with live face annotation, record a bounded or unbounded \
clip and save the finished artifact. Runs against a synthetic capture device so it is \
exercisable on hosts without camera hardware.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "clipcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override the artifact output directory
    #[arg(short, long, value_name = "DIR", help = "Directory finished recordings are written to")]
    output: Option<String>,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting clipcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let mut config = match ClipcamConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(output) = &args.output {
        config.output.dir = output.clone();
    }

    // Validate configuration if requested
    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    run_session(config, args.debug).await
}

async fn run_session(config: ClipcamConfig, debug_events: bool) -> Result<()> {
    let event_bus = Arc::new(if debug_events {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    });

    let mut camera = SyntheticCamera::new(
        config.camera.resolution,
        config.camera.fps,
        Duration::from_millis(config.recording.timeslice_ms),
    );
    if config.camera.simulate_missing_environment {
        camera = camera.with_missing_environment_camera();
    }

    let loader = Arc::new(DetectorLoader::new(demo_detector_factory(
        config.camera.resolution,
    )));

    let output_dir = PathBuf::from(&config.output.dir);
    let (session, handle) = ClipSession::new(
        config,
        Arc::new(camera),
        loader,
        Box::new(PassthroughRecorder::new()),
        Arc::clone(&event_bus),
    );
    let actor = tokio::spawn(session.run());

    let keyboard = KeyboardInputHandler::new(handle.clone(), Arc::clone(&event_bus));
    keyboard.start().await?;

    let mut events = EventReceiver::new(event_bus.subscribe(), "main".to_string());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received - shutting down");
                handle.send(SessionCommand::Shutdown);
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(ClipcamEvent::RecordingFinished { .. }) => {
                        if let Some(snapshot) = handle.artifact().await {
                            match write_artifact(&snapshot, &output_dir) {
                                Ok(path) => info!("Recording saved to {}", path.display()),
                                Err(e) => warn!("Failed to save recording: {}", e),
                            }
                        }
                    }
                    Ok(ClipcamEvent::ShutdownRequested { .. }) => break,
                    Ok(event) => debug!("{}", event.description()),
                    Err(_) => {
                        debug!("Event bus closed; exiting");
                        break;
                    }
                }
            }
        }
    }

    keyboard.stop().await?;
    actor.await?;
    info!("clipcam exited");
    Ok(())
}

/// Demo detector reporting one centered face, with a short simulated load
fn demo_detector_factory(resolution: (u32, u32)) -> DetectorFactory {
    Box::new(move || {
        async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            let detector = MockDetector::single_face(resolution.0 as f32, resolution.1 as f32);
            Ok::<_, DetectorError>(Arc::new(detector) as Arc<dyn FaceDetector>)
        }
        .boxed()
    })
}

/// Write a finished artifact to `dir` under its default filename
fn write_artifact(snapshot: &ArtifactSnapshot, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&snapshot.filename);
    std::fs::write(&path, &snapshot.data)?;
    Ok(path)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clipcam={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        }
        Some("compact") => {
            fmt::layer()
                .compact()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .boxed()
        }
        Some("pretty") | None => {
            fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Clipcam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&ClipcamConfig::default())?);
    Ok(())
}
