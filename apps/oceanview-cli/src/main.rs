mod runs;

use clap::{Parser, Subcommand};
use oceanview_gpu::ResourceKind;
use oceanview_render::{CameraMode, Mesh, RendererConfig};
use runs::SizeArg;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oceanview-cli", about = "Headless tools for the oceanview renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, defaults and resource kinds
    Info,
    /// Generate the ocean grid and report its size
    Mesh {
        /// World units per side
        #[arg(short, long, default_value = "20")]
        size: u32,
        /// Quads per world unit
        #[arg(short, long, default_value = "4")]
        resolution: u32,
    },
    /// Resize the offscreen target through a list of sizes
    Resize {
        /// Comma separated WIDTHxHEIGHT list; non-positive sizes are ignored
        #[arg(long, value_delimiter = ',', default_value = "1280x720,0x0,800x600")]
        sizes: Vec<SizeArg>,
        #[arg(long, default_value = "assets/shaders")]
        shader_dir: PathBuf,
    },
    /// Render frames on the headless backend and report renderer state
    Frames {
        #[arg(short, long, default_value = "60")]
        count: u32,
        /// Seconds per frame
        #[arg(long, default_value = "0.016")]
        dt: f32,
        #[arg(long, default_value = "orbit")]
        camera: CameraMode,
        #[arg(long)]
        wireframe: bool,
        #[arg(long, default_value = "assets/shaders")]
        shader_dir: PathBuf,
    },
}

fn emit<T: Serialize + std::fmt::Debug>(json: bool, report: &T) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report:#?}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info => {
            let defaults = RendererConfig::default();
            println!("oceanview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "grid: {} units, {} quads/unit",
                defaults.grid_size, defaults.grid_resolution
            );
            println!("target: {}x{}", defaults.width, defaults.height);
            println!(
                "formats: colour {:?}, depth {:?}",
                defaults.color_format, defaults.depth_format
            );
            println!(
                "programs: {} (active {})",
                defaults.programs.join(", "),
                defaults.active_program
            );
            println!("camera: {} at {} deg", defaults.camera_mode, defaults.fov_degrees);
            let kinds: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.as_str()).collect();
            println!("resource kinds: {}", kinds.join(", "));
        }
        Commands::Mesh { size, resolution } => {
            let stats = Mesh::grid(size, resolution)?.stats();
            emit(cli.json, &stats)?;
        }
        Commands::Resize { sizes, shader_dir } => {
            let config = RendererConfig {
                shader_dir,
                ..RendererConfig::default()
            };
            let report = runs::resize_run(config, &sizes)?;
            emit(cli.json, &report)?;
        }
        Commands::Frames {
            count,
            dt,
            camera,
            wireframe,
            shader_dir,
        } => {
            let config = RendererConfig {
                shader_dir,
                camera_mode: camera,
                ..RendererConfig::default()
            };
            let report = runs::frame_run(config, count, dt, wireframe)?;
            emit(cli.json, &report)?;
        }
    }

    Ok(())
}
