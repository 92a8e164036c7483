//! Command-line trainer.
//!
//! Loads a corpus from a frame index directory, trains a randomized
//! decision tree (optionally resuming a previous run) and writes the result
//! to an `.rdt` container or `.json` mirror. SIGINT stops training at the
//! next safe point and serializes whatever is complete, so a long run can
//! always be resumed with `--reload`.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use bodyparts::props::{Properties, TrainSetup};
use bodyparts::tree::io::{read_tree, write_tree};
use bodyparts::{Corpus, Trainer};

#[derive(Parser)]
#[command(
    name = "bodyparts-train",
    about = "Train a randomized decision tree for per-pixel body-part classification"
)]
struct Args {
    /// Location of training data
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Name of frame index to load
    #[arg(long)]
    index_name: Option<String>,

    /// Filename of tree to write (.rdt, or .json for the textual mirror)
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Reload and continue training a pre-existing tree
    #[arg(long)]
    reload: bool,

    /// Number of pixels to sample per image
    #[arg(long)]
    n_pixels: Option<i64>,

    /// Number of thresholds to test
    #[arg(long)]
    n_thresholds: Option<i64>,

    /// Range of thresholds to test
    #[arg(long)]
    threshold_range: Option<f64>,

    /// Number of UV combinations to test
    #[arg(long)]
    n_uv: Option<i64>,

    /// Range of UV combinations to test
    #[arg(long)]
    uv_range: Option<f64>,

    /// Depth to train tree to
    #[arg(long)]
    max_depth: Option<i64>,

    /// Seed to use for RNG
    #[arg(long)]
    seed: Option<i64>,

    /// Number of threads to spawn (0 = all cores)
    #[arg(long)]
    n_threads: Option<i64>,

    /// Verbose logging output
    #[arg(long)]
    verbose: bool,
}

fn populate_properties(args: &Args) -> Result<Properties, Box<dyn Error>> {
    let mut props = Properties::default();

    if let Some(dir) = &args.data_dir {
        props.set_text("data_dir", &dir.to_string_lossy())?;
    }
    if let Some(name) = &args.index_name {
        props.set_text("index_name", name)?;
    }
    if let Some(out) = &args.out_file {
        props.set_text("out_file", &out.to_string_lossy())?;
    }
    props.set_bool("reload", args.reload)?;
    if let Some(v) = args.n_pixels {
        props.set_int("n_pixels", v)?;
    }
    if let Some(v) = args.n_thresholds {
        props.set_int("n_thresholds", v)?;
    }
    if let Some(v) = args.threshold_range {
        props.set_float("threshold_range", v)?;
    }
    if let Some(v) = args.n_uv {
        props.set_int("n_uv", v)?;
    }
    if let Some(v) = args.uv_range {
        props.set_float("uv_range", v)?;
    }
    if let Some(v) = args.max_depth {
        props.set_int("max_depth", v)?;
    }
    if let Some(v) = args.seed {
        props.set_int("seed", v)?;
    }
    if let Some(v) = args.n_threads {
        props.set_int("n_threads", v)?;
    }
    props.set_bool("verbose", args.verbose)?;

    Ok(props)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let props = populate_properties(args)?;
    let setup = TrainSetup::from_properties(&props)?;

    info!("Scanning training directories...");
    let corpus = Corpus::from_index(&setup.data_dir, &setup.index_name)?;
    info!(
        "Loaded {} images ({}x{}, {} labels)",
        corpus.n_images(),
        corpus.width(),
        corpus.height(),
        corpus.n_labels()
    );

    let checkpoint = if setup.reload {
        match read_tree(&setup.out_file) {
            Ok(tree) => {
                info!("Restoring checkpoint from '{}'", setup.out_file.display());
                Some(tree)
            }
            Err(e) => {
                warn!("Could not reload '{}' ({e}), training from scratch", setup.out_file.display());
                None
            }
        }
    } else {
        None
    };

    let trainer = Trainer::new(setup.params.clone())?;

    let interrupt = trainer.interrupt_flag();
    ctrlc::set_handler(move || {
        interrupt.set();
    })?;

    let outcome = trainer.train(&corpus, checkpoint.as_ref())?;

    info!("Writing output to '{}'...", setup.out_file.display());
    write_tree(&outcome.tree, &setup.out_file)?;

    if outcome.interrupted {
        info!("Interrupted; partial tree saved, resume with --reload");
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
