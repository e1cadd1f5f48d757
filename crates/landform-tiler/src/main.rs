use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

mod cache;
mod config;
mod coordinator;
mod logger;
mod object_store;
mod tileset_json;

use coordinator::{Coordinator, NodeState, TilerInput};
use logger::{LogAbout, LogSev};
use object_store::FileObjectStore;

landform_core::eyre_imports!();

/// Out-of-core planetary-surface tile builder.
#[derive(Parser, Debug)]
#[command(name = "landform-tiler")]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults plus
    /// `LANDFORM__*` environment overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw input meshes to ingest, as PLY files.
    #[arg(long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Source raster for each `--input`, matched positionally. Fewer images
    /// than inputs leaves the remaining inputs untextured; a bare `-` skips
    /// an individual input's image without breaking the positional pairing.
    #[arg(long = "image")]
    images: Vec<String>,

    /// Worker thread count for the coordinator's pool.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    color_eyre::install().ok();
    let cli = Cli::parse();
    logger::init_tracing(cli.verbose);

    let cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            logger::one(None, LogSev::Error, LogAbout::Cli, &format!("config error: {e}"));
            return ExitCode::from(1);
        }
    };

    match run(cfg, &cli.inputs, &cli.images, cli.workers) {
        Ok(true) => {
            logger::system("tiling completed");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            logger::one(None, LogSev::Warn, LogAbout::Cli, "completed with one or more failed tiles");
            ExitCode::from(2)
        }
        Err(e) => {
            logger::one(None, LogSev::Error, LogAbout::Cli, &format!("{e:#}"));
            ExitCode::from(1)
        }
    }
}

fn run(
    cfg: config::TilerConfig,
    input_paths: &[PathBuf],
    image_paths: &[String],
    workers: usize,
) -> eyre::Result<bool> {
    let store = Arc::new(FileObjectStore::new(&cfg.object_store_root)?);
    let mut inputs = Vec::with_capacity(input_paths.len());
    for (i, path) in input_paths.iter().enumerate() {
        let bytes = std::fs::read(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        let mesh = coordinator::parse_ply(&bytes)?;
        let image = match image_paths.get(i).map(String::as_str) {
            None | Some("-") => None,
            Some(image_path) => Some(
                image::open(image_path)
                    .wrap_err_with(|| format!("reading {image_path}"))?
                    .into_rgba8(),
            ),
        };
        inputs.push(TilerInput {
            name: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("input")
                .to_string(),
            mesh,
            image,
        });
    }

    let coordinator = Coordinator::new(cfg, store);
    coordinator.run(&inputs, workers)?;

    let states = coordinator.node_states();
    let failed = states.iter().filter(|(_, s)| *s == NodeState::Failed).count();
    let completed = states.iter().filter(|(_, s)| *s == NodeState::Completed).count();
    logger::system(&format!("{completed} tiles completed, {failed} failed"));
    Ok(failed == 0)
}
