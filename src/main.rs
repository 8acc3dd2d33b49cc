use clap::{Parser, Subcommand};
use std::path::PathBuf;

use facelens::camera::{list_cameras, Resolution};
use facelens::config::Config;
use facelens::pipeline::{self, PreviewOptions};

/// Cascade shipped by the OpenCV data package on most distributions.
const DEFAULT_MODEL: &str =
    "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml";
const DEFAULT_WINDOW: &str = "Face Detection";

/// Parse and validate resolution (WIDTHxHEIGHT format)
fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid resolution format '{}'. Use WIDTHxHEIGHT (e.g., 640x480)",
            s
        ));
    }
    let width: u32 = parts[0]
        .parse()
        .map_err(|_| format!("Invalid width '{}' in resolution", parts[0]))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| format!("Invalid height '{}' in resolution", parts[1]))?;
    if width == 0 || height == 0 {
        return Err("Resolution width and height must be greater than 0".to_string());
    }
    if width > 7680 || height > 4320 {
        return Err("Resolution exceeds maximum supported (7680x4320)".to_string());
    }
    Ok(Resolution { width, height })
}

/// facelens: live face detection preview for libcamera devices
#[derive(Parser)]
#[command(name = "facelens")]
#[command(version, about = "Live face detection preview for libcamera devices")]
#[command(after_help = "EXAMPLES:
    # Preview the first camera with the default cascade
    facelens start

    # Pick a camera and resolution
    facelens start --device 1 --resolution 1280x720

    # Use a custom cascade model
    facelens start --model ./haarcascade_frontalface_alt.xml

    # List available cameras
    facelens list-cameras

Press ESC in the preview window (or Ctrl+C) to exit.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List cameras known to libcamera
    ListCameras,

    /// Open a camera and show a live preview with face boxes
    Start {
        /// Camera index (see `facelens list-cameras`)
        #[arg(long, short = 'd')]
        device: Option<usize>,

        /// Capture resolution (WIDTHxHEIGHT, e.g. 640x480)
        #[arg(long, short = 'r', value_parser = parse_resolution)]
        resolution: Option<Resolution>,

        /// Haar cascade model file
        #[arg(long, short = 'm')]
        model: Option<PathBuf>,

        /// Preview window title
        #[arg(long, short = 'w')]
        window: Option<String>,

        /// Custom config file path (default: ~/.config/facelens/config.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn run_list_cameras() -> Result<(), String> {
    let cameras = list_cameras().map_err(|e| e.to_string())?;
    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }
    for camera in &cameras {
        println!("{}", camera);
    }
    Ok(())
}

fn run_start(
    device: Option<usize>,
    resolution: Option<Resolution>,
    model: Option<PathBuf>,
    window: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<(), String> {
    let cfg = Config::load(config_path.as_deref()).map_err(|e| e.to_string())?;

    // Merge settings: CLI args > config file > built-in defaults
    let device = device.or(cfg.camera.device).unwrap_or(0);
    let resolution = resolution
        .or_else(|| match (cfg.camera.width, cfg.camera.height) {
            (Some(width), Some(height)) => Some(Resolution { width, height }),
            _ => None,
        })
        .unwrap_or_default();
    let model = model
        .or(cfg.detector.model)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL));
    let window = window
        .or(cfg.display.window)
        .unwrap_or_else(|| DEFAULT_WINDOW.to_string());

    if let Err(e) = pipeline::setup_ctrlc_handler() {
        eprintln!("Warning: Could not set up Ctrl+C handler: {}", e);
    }

    let opts = PreviewOptions {
        device,
        resolution,
        model,
        window,
    };
    let stats = pipeline::run_preview(&opts).map_err(|e| e.to_string())?;

    println!(
        "Capture stopped. {} frame{} shown ({} skipped).",
        stats.frames,
        if stats.frames == 1 { "" } else { "s" },
        stats.skipped
    );
    Ok(())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListCameras) => {
            if let Err(e) = run_list_cameras() {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Start {
            device,
            resolution,
            model,
            window,
            config,
        }) => {
            if let Err(e) = run_start(device, resolution, model, window, config) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            // Show brief help when no command is provided
            println!("facelens {}", env!("CARGO_PKG_VERSION"));
            println!("Live face detection preview for libcamera devices\n");
            println!("USAGE:");
            println!("    facelens <COMMAND>\n");
            println!("COMMANDS:");
            println!("    start         Open a camera and show a live preview with face boxes");
            println!("    list-cameras  List cameras known to libcamera");
            println!("    help          Print this message or the help of a subcommand\n");
            println!("Run 'facelens --help' for more details and examples.");
        }
    }
}
