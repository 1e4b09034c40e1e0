//! nestkit command-line front end

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nestkit::{init_logging, pack_and_generate, preview_layout, Catalog, NestingRequest};
use nestkit_settings::default_config_path;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nestkit")]
#[command(about = "Nest cabinetry parts onto sheets and generate CNC programs")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a job and write programs, previews, labels and manifests
    Pack(JobArgs),

    /// Pack a job and print the layout without writing any file
    Preview(JobArgs),

    /// Write the built-in catalog to a file for editing
    InitConfig {
        /// Destination (.toml or .json); the user configuration path by default
        file: Option<PathBuf>,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Job folder holding the .dxt manifest and DXF files
    job_dir: PathBuf,

    /// Sheet width in mm, for materials missing from the catalog
    #[arg(long, default_value = "2750")]
    width: f64,

    /// Sheet height in mm, for materials missing from the catalog
    #[arg(long, default_value = "1850")]
    height: f64,

    /// Catalog file; the user configuration path by default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Never rotate parts
    #[arg(long)]
    no_rotation: bool,

    /// Plan straight cuts only
    #[arg(long)]
    guillotine: bool,
}

impl JobArgs {
    fn request(&self) -> NestingRequest {
        let mut request = NestingRequest::new(&self.job_dir, self.width, self.height);
        request.allow_rotation = !self.no_rotation;
        request.guillotine = self.guillotine;
        request
    }
}

fn version_string() -> &'static str {
    concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")")
}

fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path().ok(),
    };
    Catalog::load_or_default(path.as_deref()).context("Failed to load catalog")
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Pack(args) => {
            let catalog = load_catalog(args.config.as_deref())?;
            let outcome = pack_and_generate(&args.request(), &catalog)
                .with_context(|| format!("Failed to nest {}", args.job_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Preview(args) => {
            let catalog = load_catalog(args.config.as_deref())?;
            let preview = preview_layout(&args.request(), &catalog)
                .with_context(|| format!("Failed to nest {}", args.job_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        Commands::InitConfig { file } => {
            let path = match file {
                Some(path) => path,
                None => default_config_path()?,
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let catalog = Catalog {
                tools: nestkit_core::default_tools(),
                ..Catalog::default()
            };
            catalog.save_to_file(&path)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
